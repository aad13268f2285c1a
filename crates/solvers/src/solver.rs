//! The contract every convolution solver implements.

use crate::launch::LaunchConfiguration;
use convforge_descriptors::{ConvolutionProblem, DeviceCapabilities};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("solver {solver} is not applicable: {reason}")]
    NotApplicable {
        solver: &'static str,
        reason: &'static str,
    },
}

/// A single kernel implementation of convolution.
///
/// Solvers are stateless. Every method is a pure function of the problem and
/// the capabilities, so one instance can be shared across threads freely.
pub trait Solver: Send + Sync {
    fn name(&self) -> &'static str;

    /// The first constraint `problem` violates on this device, or `None` when
    /// the solver can run it. Meant for diagnostics; callers that only need
    /// feasibility should use [`Solver::is_applicable`].
    fn rejection_reason(
        &self,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Option<&'static str>;

    fn is_applicable(&self, problem: &ConvolutionProblem, caps: &DeviceCapabilities) -> bool {
        self.rejection_reason(problem, caps).is_none()
    }

    /// Scratch memory in bytes. Only meaningful for applicable problems.
    fn workspace_size(&self, _problem: &ConvolutionProblem, _caps: &DeviceCapabilities) -> usize {
        0
    }

    /// Derive the launch configuration. Fails with
    /// [`SolverError::NotApplicable`] instead of deriving geometry for a
    /// problem the solver cannot run.
    fn solution(
        &self,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Result<LaunchConfiguration, SolverError>;

    fn check_applicable(
        &self,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Result<(), SolverError> {
        match self.rejection_reason(problem, caps) {
            Some(reason) => Err(SolverError::NotApplicable {
                solver: self.name(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

pub type DynSolver = Arc<dyn Solver>;
