//! Solver catalogue handed to the driver that picks a convolution kernel.

use crate::conv_asm_5x10u2v2f1::ConvAsm5x10u2v2f1;
use crate::implicit_gemm_bwd_data_xdlops::ImplicitGemmBwdDataV1R1Xdlops;
use crate::solver::{DynSolver, Solver};
use std::sync::Arc;

/// Ordered list of solvers, iterated in registration order.
///
/// The registry does not rank. A driver that stops at the first applicable
/// solver gets registration order as its preference order, so specialised
/// fixed-shape kernels are registered ahead of generic GEMM ones.
#[derive(Default, Clone)]
pub struct SolverRegistry {
    solvers: Vec<DynSolver>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self {
            solvers: Vec::new(),
        }
    }

    pub fn with_default_solvers() -> Self {
        let mut registry = Self::new();
        registry.register(ConvAsm5x10u2v2f1::new());
        registry.register(ImplicitGemmBwdDataV1R1Xdlops::new());
        registry
    }

    pub fn register<S>(&mut self, solver: S)
    where
        S: Solver + 'static,
    {
        self.solvers.push(Arc::new(solver));
    }

    pub fn solvers(&self) -> &[DynSolver] {
        &self.solvers
    }

    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    /// Looks a solver up by its stable name, e.g. one recorded from a previous run.
    pub fn find(&self, name: &str) -> Option<DynSolver> {
        self.solvers
            .iter()
            .find(|solver| solver.name() == name)
            .map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_lists_solvers_in_registration_order() {
        let registry = SolverRegistry::with_default_solvers();
        let names: Vec<_> = registry.solvers().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "conv_asm_5x10u2v2f1",
                "conv_hip_implicit_gemm_bwd_data_v1r1_xdlops"
            ]
        );
        assert!(registry.find("conv_asm_5x10u2v2f1").is_some());
        assert!(registry.find("missing").is_none());
    }

    #[test]
    fn later_registrations_follow_earlier_ones() {
        let mut registry = SolverRegistry::new();
        assert!(registry.is_empty());
        registry.register(ImplicitGemmBwdDataV1R1Xdlops::new());
        registry.register(ConvAsm5x10u2v2f1::new());
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.solvers()[0].name(),
            "conv_hip_implicit_gemm_bwd_data_v1r1_xdlops"
        );
    }
}
