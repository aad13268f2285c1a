//! Hand-written GCN assembly kernel for forward 10x5 filters with stride 2.

use crate::launch::{CompileOptions, KernelAsset, LaunchConfiguration};
use crate::solver::{Solver, SolverError};
use convforge_descriptors::{
    align_up, conv_output_size, ConvDirection, ConvolutionProblem, DeviceCapabilities,
    TensorLayout,
};
use tracing::debug;

/// gfx8 and gfx900 parts without XNACK.
const SUPPORTED_ARCHS: &[&str] = &["gfx800", "gfx802", "gfx803", "gfx804", "gfx900"];

const FILTER_W: usize = 10;
const FILTER_H: usize = 5;
const STRIDE: usize = 2;
const MAX_PAD: usize = 5;
// Found experimentally.
const MAX_IN_WIDTH: usize = 8192 - 1;
const MAX_IN_HEIGHT: usize = 131077 - 1;
const OUT_CHANNEL_MULTIPLE: usize = 16;

const LOCAL_WORK_SIZE: [usize; 3] = [64, 8, 1];
/// Weight layout code understood by the kernel: 0 = KCHW, 1 = CKHW.
const WEIGHT_LAYOUT_KCHW: usize = 0;

const KERNEL_FILE: &str = "conv5x10u2v2f1.s";
const KERNEL_ENTRY: &str = "conv5x10u2v2f1";

#[derive(Debug, Default, Clone, Copy)]
pub struct ConvAsm5x10u2v2f1;

impl ConvAsm5x10u2v2f1 {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for ConvAsm5x10u2v2f1 {
    fn name(&self) -> &'static str {
        "conv_asm_5x10u2v2f1"
    }

    fn rejection_reason(
        &self,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Option<&'static str> {
        if !caps.assembler_available {
            return Some("assembler toolchain unavailable");
        }
        if !SUPPORTED_ARCHS.contains(&caps.arch.as_str()) {
            return Some("architecture outside the gfx8/gfx900 no-xnack set");
        }
        if problem.direction() != ConvDirection::Forward {
            return Some("only forward convolution is implemented");
        }
        // TODO: accept an explicit KCHW weight layout once the kernel reads wei_layout.
        if problem.weight_layout().is_some() {
            return Some("non-default weight layouts are not supported");
        }
        if !problem.is_2d() {
            return Some("only 2D convolution is implemented");
        }
        if problem.group_count() != 1 {
            return Some("grouped convolution is not implemented");
        }

        let (w, h) = (problem.width(), problem.height());
        if w.stride != STRIDE || h.stride != STRIDE {
            return Some("stride must be 2x2");
        }
        if w.filter != FILTER_W || h.filter != FILTER_H {
            return Some("filter must be 10 wide and 5 high");
        }
        if w.dilation != 1 || h.dilation != 1 {
            return Some("dilation is not supported");
        }
        if !w.is_symmetric() || !h.is_symmetric() {
            return Some("padding must be symmetric");
        }
        if w.pad_left > MAX_PAD || h.pad_left > MAX_PAD {
            return Some("padding must be within [0, 5]");
        }
        if problem.in_channels() < 1 {
            return Some("input channels must be at least 1");
        }
        if problem.out_channels() < 1 || problem.out_channels() % OUT_CHANNEL_MULTIPLE != 0 {
            return Some("output channels must be a positive multiple of 16");
        }

        // The padded image must still hold the whole filter.
        let min_in_width = FILTER_W.saturating_sub(2 * w.pad_left);
        let min_in_height = FILTER_H.saturating_sub(2 * h.pad_left);
        if w.input < min_in_width || w.input > MAX_IN_WIDTH {
            return Some("input width out of range");
        }
        if h.input < min_in_height || h.input > MAX_IN_HEIGHT {
            return Some("input height out of range");
        }
        if problem.layout() != TensorLayout::Nchw {
            return Some("input layout must be NCHW");
        }
        None
    }

    fn solution(
        &self,
        problem: &ConvolutionProblem,
        caps: &DeviceCapabilities,
    ) -> Result<LaunchConfiguration, SolverError> {
        self.check_applicable(problem, caps)?;

        let (w, h) = (problem.width(), problem.height());
        let out_w = conv_output_size(w.input, w.pad_left, FILTER_W, STRIDE);
        let out_h = conv_output_size(h.input, h.pad_left, FILTER_H, STRIDE);
        let k = problem.out_channels();

        let mut options = CompileOptions::new();
        options
            .define("inp_h", h.input)
            .define("inp_w", w.input)
            .define("wei_c", problem.in_channels())
            .define("wei_k", k)
            .define("wei_layout", WEIGHT_LAYOUT_KCHW)
            .define("pad_w", w.pad_left)
            .define("pad_h", h.pad_left)
            .define("ROCM_METADATA_VERSION", caps.metadata_version.code());

        // Each lane produces two output channels.
        let global_work_size = [
            align_up(out_w, 64),
            align_up(out_h, 4) / 4 * align_up(k / 2, 8),
            problem.batch(),
        ];

        debug!(
            solver = self.name(),
            out_w,
            out_h,
            global = ?global_work_size,
            "derived launch configuration"
        );

        Ok(LaunchConfiguration {
            kernel: KernelAsset::new(KERNEL_FILE, KERNEL_ENTRY),
            local_work_size: LOCAL_WORK_SIZE,
            global_work_size,
            compile_options: options,
            workspace_bytes: self.workspace_size(problem, caps),
        })
    }
}
