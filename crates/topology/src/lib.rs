pub mod builder;
pub mod document;
pub mod geojson;

pub use builder::*;
pub use document::*;
pub use geojson::*;
