//! Problem and device descriptors shared by every convolution solver.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod problem;
pub mod utils;

pub use capabilities::*;
pub use config::*;
pub use error::*;
pub use problem::*;
pub use utils::*;
