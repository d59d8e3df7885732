pub mod globe;
pub mod line;

pub use globe::*;
pub use line::*;
