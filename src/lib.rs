//! convforge: picks the convolution solvers that can run a problem on a
//! device and derives how to launch them.

pub use convforge_descriptors as descriptors;
pub use convforge_planner as planner;
pub use convforge_solvers as solvers;

pub mod prelude {
    pub use convforge_descriptors::{
        align_up, conv_output_size, ConvDirection, ConvolutionProblem, DataType, DebugFlags,
        DeviceCapabilities, MetadataVersion, SpatialAxis, TensorLayout,
    };
    pub use convforge_planner::{PlanSummary, PlannedSolution, SolutionPlanner};
    pub use convforge_solvers::{
        CompileOptions, ConvAsm5x10u2v2f1, DefineValue, DynSolver, ImplicitGemmBwdDataV1R1Xdlops,
        KernelAsset, LaunchConfiguration, Solver, SolverError, SolverRegistry,
    };
}
