//! Convolution solvers: applicability rules and launch configuration.

pub mod conv_asm_5x10u2v2f1;
pub mod implicit_gemm_bwd_data_xdlops;
pub mod launch;
pub mod registry;
pub mod solver;

pub use conv_asm_5x10u2v2f1::*;
pub use implicit_gemm_bwd_data_xdlops::*;
pub use launch::*;
pub use registry::*;
pub use solver::*;
