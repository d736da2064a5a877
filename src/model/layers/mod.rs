mod act;
mod conv3d;
mod norm;
mod padded_conv;
mod upsample;

pub mod join;

pub use act::*;
pub use conv3d::*;
pub use norm::*;
pub use padded_conv::*;
pub use upsample::*;
