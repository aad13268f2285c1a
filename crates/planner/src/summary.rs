//! Serializable view of a planning run.

use crate::planner::PlannedSolution;
use convforge_descriptors::{ConvDirection, ConvolutionProblem, DataType, DeviceCapabilities};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionSummary {
    pub solver: String,
    pub kernel_file: String,
    pub kernel_entry: String,
    pub local_work_size: [usize; 3],
    pub global_work_size: [usize; 3],
    pub workspace_bytes: usize,
    pub compile_options: String,
}

impl From<&PlannedSolution> for SolutionSummary {
    fn from(planned: &PlannedSolution) -> Self {
        let launch = &planned.launch;
        Self {
            solver: planned.solver.to_string(),
            kernel_file: launch.kernel.file.clone(),
            kernel_entry: launch.kernel.entry.clone(),
            local_work_size: launch.local_work_size,
            global_work_size: launch.global_work_size,
            workspace_bytes: launch.workspace_bytes,
            compile_options: launch.compile_options.render(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub arch: String,
    pub direction: ConvDirection,
    pub dtype: DataType,
    pub solutions: Vec<SolutionSummary>,
}

impl PlanSummary {
    pub fn new(
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
        planned: &[PlannedSolution],
    ) -> Self {
        Self {
            arch: caps.arch.clone(),
            direction: problem.direction(),
            dtype: problem.dtype(),
            solutions: planned.iter().map(SolutionSummary::from).collect(),
        }
    }

    pub fn solver_names(&self) -> Vec<&str> {
        self.solutions.iter().map(|s| s.solver.as_str()).collect()
    }

    /// Largest workspace any listed solution needs.
    pub fn max_workspace_bytes(&self) -> usize {
        self.solutions
            .iter()
            .map(|s| s.workspace_bytes)
            .max()
            .unwrap_or(0)
    }
}
