pub mod mesh;
pub mod triangulate;
pub mod worker;

pub use mesh::*;
pub use triangulate::*;
pub use worker::*;
