//! Implicit-GEMM backward-data convolution on xdlops hardware (v1r1).
//!
//! The convolution is expressed as a GEMM with `M = C * Y * X` and
//! `N = N * Ho * Wo`, tiled 128x128 per work-group of 256 threads.

use crate::launch::{CompileOptions, KernelAsset, LaunchConfiguration};
use crate::solver::{Solver, SolverError};
use convforge_descriptors::{ConvDirection, ConvolutionProblem, DataType, DeviceCapabilities};
use tracing::debug;

const GEMM_M_PER_BLOCK: usize = 128;
const GEMM_N_PER_BLOCK: usize = 128;
const GEMM_K_PER_BLOCK: usize = 16;
const GEMM_M_PER_WAVE: usize = 64;
const GEMM_N_PER_WAVE: usize = 64;
const BLOCK_SIZE: usize = 256;
const NON_VECTORIZED_K_MULTIPLE: usize = 16;

const GEMM_A_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_K: usize = 4;
const GEMM_A_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_M: usize = 64;
const GEMM_A_BLOCK_COPY_SRC_DATA_PER_READ_GEMM_M: usize = 1;
const GEMM_B_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_K: usize = 8;
const GEMM_B_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_N: usize = 32;
const GEMM_B_BLOCK_COPY_SRC_DATA_PER_READ_GEMM_N: usize = 1;

const KERNEL_NCHW: &str =
    "gridwise_convolution_backward_data_implicit_gemm_v1r1_xdlops_nchw_kcyx_nkhw";
const KERNEL_GNCHW: &str =
    "gridwise_convolution_backward_data_implicit_gemm_v1r1_xdlops_gnchw_gkcyx_gnkhw";

#[derive(Debug, Default, Clone, Copy)]
pub struct ImplicitGemmBwdDataV1R1Xdlops;

impl ImplicitGemmBwdDataV1R1Xdlops {
    pub fn new() -> Self {
        Self
    }

    fn kernel(problem: &ConvolutionProblem) -> KernelAsset {
        let entry = if problem.group_count() > 1 {
            KERNEL_GNCHW
        } else {
            KERNEL_NCHW
        };
        KernelAsset::new(format!("{entry}.cpp"), entry)
    }

    /// Work-groups needed to cover the GEMM. Exact only for applicable
    /// problems; zero when the grid does not fit in `usize`.
    pub fn grid_size(problem: &ConvolutionProblem) -> usize {
        Self::checked_grid_size(problem).unwrap_or(0)
    }

    fn checked_grid_size(problem: &ConvolutionProblem) -> Option<usize> {
        let gemm_m = product(&[problem.in_channels(), problem.y(), problem.x()])?;
        let gemm_n = product(&[problem.batch(), problem.ho(), problem.wo()])?;
        let grid = (gemm_m / GEMM_M_PER_BLOCK).checked_mul(gemm_n / GEMM_N_PER_BLOCK)?;
        grid.checked_mul(BLOCK_SIZE)?;
        Some(grid)
    }
}

fn product(factors: &[usize]) -> Option<usize> {
    factors.iter().try_fold(1usize, |acc, &f| acc.checked_mul(f))
}

impl Solver for ImplicitGemmBwdDataV1R1Xdlops {
    fn name(&self) -> &'static str {
        "conv_hip_implicit_gemm_bwd_data_v1r1_xdlops"
    }

    // F32, F16 and BF16 are all accepted; DataType has no other variant.
    fn rejection_reason(
        &self,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Option<&'static str> {
        if problem.direction() != ConvDirection::BackwardData {
            return Some("only backward-data convolution is implemented");
        }
        if !problem.is_2d() {
            return Some("only 2D convolution is implemented");
        }
        if !caps.xdlops_enabled() {
            return Some("device lacks xdlops");
        }

        let groups = problem.group_count();
        let k = problem.out_channels() / groups;
        let c = problem.in_channels() / groups;

        // Reduced-precision elements are packed along K.
        let epack = caps.element_pack_length(problem.dtype());
        if k % epack != 0 {
            return Some("output channels per group not divisible by the element pack");
        }
        if (k / epack) % NON_VECTORIZED_K_MULTIPLE != 0 {
            return Some("packed output channels per group not a multiple of 16");
        }
        let Some(gemm_n) = product(&[problem.batch(), problem.ho(), problem.wo()]) else {
            return Some("N * Ho * Wo overflows");
        };
        if gemm_n % GEMM_N_PER_BLOCK != 0 {
            return Some("N * Ho * Wo not a multiple of 128");
        }
        let Some(gemm_m) = product(&[c, problem.y(), problem.x()]) else {
            return Some("C * Y * X per group overflows");
        };
        if gemm_m % GEMM_M_PER_BLOCK != 0 {
            return Some("C * Y * X per group not a multiple of 128");
        }
        if Self::checked_grid_size(problem).is_none() {
            return Some("launch grid overflows");
        }
        None
    }

    /// Reduced precision has no atomic add, so the reduction runs in an fp32
    /// buffer the size of the input image that is narrowed afterwards.
    /// Saturates at `usize::MAX` for images too large to address.
    fn workspace_size(&self, problem: &ConvolutionProblem, _caps: &DeviceCapabilities) -> usize {
        match problem.dtype() {
            DataType::F32 => 0,
            DataType::F16 | DataType::BF16 => product(&[
                problem.batch(),
                problem.in_channels(),
                problem.hi(),
                problem.wi(),
                DataType::F32.element_size_bytes(),
            ])
            .unwrap_or(usize::MAX),
        }
    }

    fn solution(
        &self,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Result<LaunchConfiguration, SolverError> {
        self.check_applicable(problem, caps)?;

        let (h, w) = (problem.height(), problem.width());
        let grid_size = Self::grid_size(problem);
        let dtype = problem.dtype();

        let mut options = CompileOptions::new();
        options
            .flag("-std=c++14")
            .define("CK_PARAM_PROBLEM_N", problem.batch())
            .define("CK_PARAM_PROBLEM_K", problem.out_channels())
            .define("CK_PARAM_PROBLEM_C", problem.in_channels())
            .define("CK_PARAM_PROBLEM_HI", problem.hi())
            .define("CK_PARAM_PROBLEM_WI", problem.wi())
            .define("CK_PARAM_PROBLEM_HO", problem.ho())
            .define("CK_PARAM_PROBLEM_WO", problem.wo())
            .define("CK_PARAM_PROBLEM_Y", problem.y())
            .define("CK_PARAM_PROBLEM_X", problem.x())
            .define("CK_PARAM_PROBLEM_CONV_STRIDE_H", h.stride)
            .define("CK_PARAM_PROBLEM_CONV_STRIDE_W", w.stride)
            .define("CK_PARAM_PROBLEM_CONV_DILATION_H", h.dilation)
            .define("CK_PARAM_PROBLEM_CONV_DILATION_W", w.dilation)
            .define("CK_PARAM_PROBLEM_IN_LEFT_PAD_H", h.pad_left)
            .define("CK_PARAM_PROBLEM_IN_LEFT_PAD_W", w.pad_left)
            .define("CK_PARAM_PROBLEM_IN_RIGHT_PAD_H", h.adjusted_right_pad())
            .define("CK_PARAM_PROBLEM_IN_RIGHT_PAD_W", w.adjusted_right_pad())
            .define("CK_PARAM_PROBLEM_CONV_GROUP_COUNTS", problem.group_count())
            .define("CK_PARAM_TUNABLE_BLOCK_SIZE", BLOCK_SIZE)
            .define("CK_PARAM_TUNABLE_GEMM_M_PER_BLOCK", GEMM_M_PER_BLOCK)
            .define("CK_PARAM_TUNABLE_GEMM_N_PER_BLOCK", GEMM_N_PER_BLOCK)
            .define("CK_PARAM_TUNABLE_GEMM_K_PER_BLOCK", GEMM_K_PER_BLOCK)
            .define("CK_PARAM_GEMM_M_PER_WAVE", GEMM_M_PER_WAVE)
            .define("CK_PARAM_GEMM_N_PER_WAVE", GEMM_N_PER_WAVE)
            .define(
                "CK_PARAM_TUNABLE_GEMM_A_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_K",
                GEMM_A_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_K,
            )
            .define(
                "CK_PARAM_TUNABLE_GEMM_A_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_M",
                GEMM_A_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_M,
            )
            .define(
                "CK_PARAM_TUNABLE_GEMM_A_BLOCK_COPY_SRC_DATA_PER_READ_GEMM_M",
                GEMM_A_BLOCK_COPY_SRC_DATA_PER_READ_GEMM_M,
            )
            .define(
                "CK_PARAM_TUNABLE_GEMM_B_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_K",
                GEMM_B_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_K,
            )
            .define(
                "CK_PARAM_TUNABLE_GEMM_B_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_N",
                GEMM_B_BLOCK_COPY_CLUSTER_LENGTHS_GEMM_N,
            )
            .define(
                "CK_PARAM_TUNABLE_GEMM_B_BLOCK_COPY_SRC_DATA_PER_READ_GEMM_N",
                GEMM_B_BLOCK_COPY_SRC_DATA_PER_READ_GEMM_N,
            )
            .define("CK_PARAM_DEPENDENT_GRID_SIZE", grid_size)
            .define(
                "CK_THREADWISE_GEMM_USE_AMD_INLINE_ASM",
                caps.use_inline_asm(dtype),
            )
            .define("CK_USE_AMD_BUFFER_ATOMIC_ADD", caps.use_buffer_atomic_add())
            .define("CK_USE_AMD_XDLOPS", caps.xdlops_enabled())
            .define("CK_USE_AMD_XDLOPS_INLINE_ASM", caps.debug.xdlops_inline_asm)
            .define("CK_USE_AMD_XDLOPS_EMULATE", caps.debug.xdlops_emulate)
            .define("__HIP_PLATFORM_HCC__", true);
        for flag in &caps.general_compile_options {
            options.flag(flag.as_str());
        }

        match dtype {
            DataType::F32 => {
                options
                    .define(
                        "CK_PARAM_TUNABLE_GEMM_A_BLOCK_COPY_DST_DATA_PER_WRITE_GEMM_M",
                        1usize,
                    )
                    .define(
                        "CK_PARAM_TUNABLE_GEMM_B_BLOCK_COPY_DST_DATA_PER_WRITE_GEMM_N",
                        1usize,
                    );
            }
            DataType::F16 | DataType::BF16 => {
                options
                    .define("CK_PARAM_KPACK_LENGTH", caps.element_pack_length(dtype))
                    .define(
                        "CK_PARAM_TUNABLE_GEMM_A_BLOCK_COPY_DST_DATA_PER_WRITE_GEMM_KPACK",
                        1usize,
                    )
                    .define(
                        "CK_PARAM_TUNABLE_GEMM_B_BLOCK_COPY_DST_DATA_PER_WRITE_GEMM_KPACK",
                        1usize,
                    );
            }
        }

        let workspace_bytes = self.workspace_size(problem, caps);
        debug!(
            solver = self.name(),
            grid_size,
            workspace_bytes,
            grouped = problem.group_count() > 1,
            "derived launch configuration"
        );

        Ok(LaunchConfiguration {
            kernel: Self::kernel(problem),
            local_work_size: [BLOCK_SIZE, 1, 1],
            global_work_size: [BLOCK_SIZE * grid_size, 1, 1],
            compile_options: options,
            workspace_bytes,
        })
    }
}
