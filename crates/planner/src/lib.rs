//! Enumerates registered solvers against a single convolution problem.

pub mod planner;
pub mod summary;

pub use planner::*;
pub use summary::*;
