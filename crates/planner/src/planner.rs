//! Applicability filtering and launch-configuration derivation over a registry.

use anyhow::{anyhow, Context, Result};
use convforge_descriptors::{ConvolutionProblem, DeviceCapabilities};
use convforge_solvers::{DynSolver, LaunchConfiguration, SolverRegistry};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSolution {
    pub solver: &'static str,
    pub launch: LaunchConfiguration,
}

/// Runs every registered solver's applicability test and derives launch
/// configurations for the ones that pass. Choosing among them is left to
/// the caller.
#[derive(Clone)]
pub struct SolutionPlanner {
    registry: SolverRegistry,
}

impl SolutionPlanner {
    pub fn new(registry: SolverRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SolverRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SolverRegistry {
        &mut self.registry
    }

    pub fn applicable_solvers(
        &self,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Vec<DynSolver> {
        self.registry
            .solvers()
            .iter()
            .filter(|solver| accepts(solver, problem, caps))
            .map(Arc::clone)
            .collect()
    }

    /// Solutions of every applicable solver, in registry order.
    pub fn plan(
        &self,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Result<Vec<PlannedSolution>> {
        let planned = self
            .applicable_solvers(problem, caps)
            .iter()
            .map(|solver| plan_one(solver, problem, caps))
            .collect::<Result<Vec<_>>>()?;

        self.log_plan(caps, &planned);
        Ok(planned)
    }

    /// Same result as [`SolutionPlanner::plan`], with launch configurations
    /// derived on the rayon pool. Applicability is still tested on the calling
    /// thread so rejections land in the caller's span.
    pub fn plan_parallel(
        &self,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Result<Vec<PlannedSolution>> {
        let planned = self
            .applicable_solvers(problem, caps)
            .par_iter()
            .map(|solver| plan_one(solver, problem, caps))
            .collect::<Result<Vec<_>>>()?;

        self.log_plan(caps, &planned);
        Ok(planned)
    }

    fn log_plan(&self, caps: &DeviceCapabilities, planned: &[PlannedSolution]) {
        info!(
            arch = %caps.arch,
            candidates = self.registry.len(),
            applicable = planned.len(),
            "planned convolution solutions"
        );
    }

    pub fn solution_for(
        &self,
        name: &str,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Result<PlannedSolution> {
        let solver = self
            .registry
            .find(name)
            .ok_or_else(|| anyhow!("no registered solver named {name}"))?;
        plan_one(&solver, problem, caps)
    }
}

impl Default for SolutionPlanner {
    fn default() -> Self {
        Self::new(SolverRegistry::with_default_solvers())
    }
}

fn accepts(solver: &DynSolver, problem: &ConvolutionProblem, caps: &DeviceCapabilities) -> bool {
    match solver.rejection_reason(problem, caps) {
        Some(reason) => {
            debug!(solver = solver.name(), reason, "solver not applicable");
            false
        }
        None => true,
    }
}

fn plan_one(
    solver: &DynSolver,
    problem: &ConvolutionProblem,
    caps: &DeviceCapabilities,
) -> Result<PlannedSolution> {
    let launch = solver
        .solution(problem, caps)
        .with_context(|| format!("deriving launch configuration for {}", solver.name()))?;
    Ok(PlannedSolution {
        solver: solver.name(),
        launch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use convforge_descriptors::{ConvDirection, SpatialAxis};
    use std::io;
    use std::sync::Mutex;
    use tracing::Level;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut bytes) = self.0.lock() {
                bytes.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn bwd_data_problem() -> ConvolutionProblem {
        ConvolutionProblem::builder()
            .direction(ConvDirection::BackwardData)
            .batch(8)
            .in_channels(128)
            .out_channels(64)
            .height(SpatialAxis::new(16, 3).with_pad(1))
            .width(SpatialAxis::new(16, 3).with_pad(1))
            .build()
            .expect("valid problem")
    }

    #[test]
    fn plan_skips_inapplicable_solvers() -> Result<()> {
        let planner = SolutionPlanner::default();
        let caps = DeviceCapabilities::for_arch("gfx908");
        let planned = planner.plan(&bwd_data_problem(), &caps)?;
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].solver, "conv_hip_implicit_gemm_bwd_data_v1r1_xdlops");
        Ok(())
    }

    #[test]
    fn parallel_plan_matches_sequential_plan() -> Result<()> {
        let planner = SolutionPlanner::default();
        let caps = DeviceCapabilities::for_arch("gfx908");
        let problem = bwd_data_problem();
        assert_eq!(planner.plan(&problem, &caps)?, planner.plan_parallel(&problem, &caps)?);
        Ok(())
    }

    #[test]
    fn parallel_plan_logs_rejections_and_summary() -> Result<()> {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let planned = tracing::subscriber::with_default(subscriber, || {
            SolutionPlanner::default()
                .plan_parallel(&bwd_data_problem(), &DeviceCapabilities::for_arch("gfx908"))
        })?;
        assert_eq!(planned.len(), 1);

        let output = logs.contents();
        assert!(output.contains("solver not applicable"), "{output}");
        assert!(output.contains("conv_asm_5x10u2v2f1"), "{output}");
        assert!(output.contains("planned convolution solutions"), "{output}");
        Ok(())
    }

    #[test]
    fn solution_for_reports_unknown_and_inapplicable_solvers() {
        let planner = SolutionPlanner::default();
        let caps = DeviceCapabilities::for_arch("gfx908");
        let problem = bwd_data_problem();

        let err = planner.solution_for("nope", &problem, &caps).unwrap_err();
        assert!(err.to_string().contains("no registered solver named nope"));

        let err = planner
            .solution_for("conv_asm_5x10u2v2f1", &problem, &caps)
            .unwrap_err();
        assert!(format!("{err:#}").contains("not applicable"));
    }

    #[test]
    fn empty_registry_plans_nothing() -> Result<()> {
        let planner = SolutionPlanner::new(SolverRegistry::new());
        assert!(planner
            .plan(&bwd_data_problem(), &DeviceCapabilities::for_arch("gfx908"))?
            .is_empty());
        Ok(())
    }
}
