pub mod error;
pub mod model;

mod utils;

pub use error::{Error, Result};
pub use model::*;
