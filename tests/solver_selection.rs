use anyhow::Result;
use convforge::prelude::*;
use proptest::prelude::*;
use std::thread;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixed_shape_problem() -> Result<ConvolutionProblem> {
    Ok(ConvolutionProblem::builder()
        .batch(2)
        .in_channels(8)
        .out_channels(64)
        .height(SpatialAxis::new(64, 5).with_stride(2).with_pad(2))
        .width(SpatialAxis::new(128, 10).with_stride(2).with_pad(2))
        .build()?)
}

fn implicit_gemm_problem(dtype: DataType) -> Result<ConvolutionProblem> {
    Ok(ConvolutionProblem::builder()
        .direction(ConvDirection::BackwardData)
        .batch(16)
        .in_channels(256)
        .out_channels(128)
        .height(SpatialAxis::new(28, 3).with_pad(1))
        .width(SpatialAxis::new(28, 3).with_pad(1))
        .dtype(dtype)
        .build()?)
}

#[test]
fn solvers_are_independent() -> Result<()> {
    init_tracing();
    let planner = SolutionPlanner::default();

    let fixed = fixed_shape_problem()?;
    let gemm = implicit_gemm_problem(DataType::F32)?;
    let gfx900 = DeviceCapabilities::for_arch("gfx900");
    let gfx908 = DeviceCapabilities::for_arch("gfx908");

    let names = |problem: &ConvolutionProblem, caps: &DeviceCapabilities| -> Vec<&'static str> {
        planner
            .applicable_solvers(problem, caps)
            .iter()
            .map(|s| s.name())
            .collect()
    };

    assert_eq!(names(&fixed, &gfx900), ["conv_asm_5x10u2v2f1"]);
    assert!(names(&fixed, &gfx908).is_empty());
    assert_eq!(
        names(&gemm, &gfx908),
        ["conv_hip_implicit_gemm_bwd_data_v1r1_xdlops"]
    );
    assert!(names(&gemm, &gfx900).is_empty());
    Ok(())
}

#[test]
fn fixed_shape_plan_is_complete() -> Result<()> {
    init_tracing();
    let problem = fixed_shape_problem()?;
    let caps = DeviceCapabilities::for_arch("gfx803").with_metadata_version(MetadataVersion::V2);
    let planned = SolutionPlanner::default().plan(&problem, &caps)?;
    let launch = &planned[0].launch;

    // out_w = (128 + 4 + 2 - 10) / 2 = 62, out_h = (64 + 4 + 2 - 5) / 2 = 32
    assert_eq!(problem.wo(), 62);
    assert_eq!(problem.ho(), 32);
    assert_eq!(launch.global_work_size, [64, 8 * 32, 2]);
    assert_eq!(launch.work_groups(), [1, 32, 2]);
    assert_eq!(
        launch.compile_options.render(),
        "-Dinp_h=64 -Dinp_w=128 -Dwei_c=8 -Dwei_k=64 -Dwei_layout=0 -Dpad_w=2 -Dpad_h=2 \
         -DROCM_METADATA_VERSION=2"
    );
    Ok(())
}

#[test]
fn implicit_gemm_workspace_tracks_precision() -> Result<()> {
    let planner = SolutionPlanner::default();
    let caps = DeviceCapabilities::for_arch("gfx908");

    for (dtype, expected) in [
        (DataType::F32, 0),
        (DataType::F16, 16 * 256 * 28 * 28 * 4),
        (DataType::BF16, 16 * 256 * 28 * 28 * 4),
    ] {
        let problem = implicit_gemm_problem(dtype)?;
        let planned = planner.solution_for(
            "conv_hip_implicit_gemm_bwd_data_v1r1_xdlops",
            &problem,
            &caps,
        )?;
        assert_eq!(planned.launch.workspace_bytes, expected, "{dtype:?}");

        let summary = PlanSummary::new(&problem, &caps, &[planned]);
        assert_eq!(summary.max_workspace_bytes(), expected);
    }
    Ok(())
}

#[test]
fn debug_overrides_flow_into_compile_options() -> Result<()> {
    let debug = DebugFlags::from_lookup(|name| match name {
        "CONVFORGE_DEBUG_XDLOPS_INLINE_ASM" => Some("1".to_string()),
        _ => None,
    })?;
    let caps = DeviceCapabilities::for_arch("gfx908").with_debug(debug);
    let problem = implicit_gemm_problem(DataType::F16)?;
    let launch = ImplicitGemmBwdDataV1R1Xdlops.solution(&problem, &caps)?;

    assert_eq!(
        launch.compile_options.get("CK_USE_AMD_XDLOPS_INLINE_ASM"),
        Some(DefineValue::Bool(true))
    );
    assert_eq!(
        launch.compile_options.get("CK_PARAM_KPACK_LENGTH"),
        Some(DefineValue::Int(4))
    );

    let disabled = caps.with_debug(DebugFlags {
        xdlops_disabled: true,
        ..DebugFlags::default()
    });
    assert!(!ImplicitGemmBwdDataV1R1Xdlops.is_applicable(&problem, &disabled));
    Ok(())
}

#[test]
fn solvers_are_shareable_across_threads() -> Result<()> {
    let planner = SolutionPlanner::default();
    let problem = implicit_gemm_problem(DataType::BF16)?;
    let caps = DeviceCapabilities::for_arch("gfx908");
    let expected = planner.plan(&problem, &caps)?;
    let (planner, problem, caps) = (&planner, &problem, &caps);

    thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(move || planner.plan(problem, caps)))
            .collect();
        for handle in handles {
            let planned = handle.join().expect("planner thread panicked")?;
            assert_eq!(planned, expected);
        }
        Ok(())
    })
}

proptest! {
    #[test]
    fn applicability_is_pure_and_order_independent(
        batch in 1usize..9,
        k_mult in 1usize..9,
        extent in 10usize..40,
        pad in 0usize..4,
        backward in any::<bool>(),
        arch in prop::sample::select(vec!["gfx803", "gfx900", "gfx906", "gfx908"]),
    ) {
        let direction = if backward {
            ConvDirection::BackwardData
        } else {
            ConvDirection::Forward
        };
        let built = ConvolutionProblem::builder()
            .direction(direction)
            .batch(batch)
            .in_channels(128)
            .out_channels(16 * k_mult)
            .height(SpatialAxis::new(extent, 5).with_stride(2).with_pad(pad))
            .width(SpatialAxis::new(extent, 10).with_stride(2).with_pad(pad))
            .build();
        let Ok(problem) = built else {
            return Ok(());
        };
        let caps = DeviceCapabilities::for_arch(arch);
        let registry = SolverRegistry::with_default_solvers();

        let applicable = |solver: &DynSolver| solver.is_applicable(&problem, &caps);

        let forward: Vec<bool> = registry.solvers().iter().map(applicable).collect();
        let mut reversed: Vec<bool> = registry.solvers().iter().rev().map(applicable).collect();
        reversed.reverse();
        prop_assert_eq!(&forward, &reversed);

        let again: Vec<bool> = registry.solvers().iter().map(applicable).collect();
        prop_assert_eq!(forward, again);
    }
}
