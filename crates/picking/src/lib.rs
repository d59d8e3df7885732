pub mod asset;
pub mod codec;
pub mod mask;
pub mod raster;

pub use asset::*;
pub use codec::*;
pub use mask::*;
pub use raster::*;
