//! Convolution problem descriptors.

use crate::error::ProblemError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    F32,
    F16,
    BF16,
}

impl DataType {
    pub fn element_size_bytes(&self) -> usize {
        match self {
            DataType::F32 => 4,
            DataType::F16 | DataType::BF16 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConvDirection {
    Forward,
    BackwardData,
    BackwardWeights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TensorLayout {
    Nchw,
    Nhwc,
    Ncdhw,
    Ndhwc,
}

impl TensorLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            TensorLayout::Nchw => "NCHW",
            TensorLayout::Nhwc => "NHWC",
            TensorLayout::Ncdhw => "NCDHW",
            TensorLayout::Ndhwc => "NDHWC",
        }
    }

    /// Number of spatial axes the layout describes.
    pub fn spatial_rank(&self) -> usize {
        match self {
            TensorLayout::Nchw | TensorLayout::Nhwc => 2,
            TensorLayout::Ncdhw | TensorLayout::Ndhwc => 3,
        }
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry of one spatial axis. The output extent is always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialAxis {
    pub input: usize,
    pub filter: usize,
    pub stride: usize,
    pub dilation: usize,
    pub pad_left: usize,
    pub pad_right: usize,
}

impl SpatialAxis {
    pub fn new(input: usize, filter: usize) -> Self {
        Self {
            input,
            filter,
            stride: 1,
            dilation: 1,
            pad_left: 0,
            pad_right: 0,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_dilation(mut self, dilation: usize) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn with_pad(self, pad: usize) -> Self {
        self.with_pads(pad, pad)
    }

    pub fn with_pads(mut self, pad_left: usize, pad_right: usize) -> Self {
        self.pad_left = pad_left;
        self.pad_right = pad_right;
        self
    }

    /// Saturates for axes that failed validation.
    pub fn dilated_filter(&self) -> usize {
        self.checked_dilated_filter().unwrap_or(usize::MAX)
    }

    /// Saturates for axes that failed validation.
    pub fn padded_input(&self) -> usize {
        self.checked_padded_input().unwrap_or(usize::MAX)
    }

    fn checked_dilated_filter(&self) -> Option<usize> {
        self.filter
            .saturating_sub(1)
            .checked_mul(self.dilation)?
            .checked_add(1)
    }

    fn checked_padded_input(&self) -> Option<usize> {
        self.input.checked_add(self.pad_left)?.checked_add(self.pad_right)
    }

    pub fn is_symmetric(&self) -> bool {
        self.pad_left == self.pad_right
    }

    /// Output extent; zero when the dilated filter overhangs the padded input.
    pub fn output(&self) -> usize {
        self.padded_input()
            .checked_sub(self.dilated_filter())
            .map_or(0, |span| span / self.stride + 1)
    }

    /// Right pad actually touched by the last filter window. Trailing pad
    /// that no window reaches is dropped.
    pub fn adjusted_right_pad(&self) -> usize {
        let reached =
            self.dilated_filter() + self.output().saturating_sub(1) * self.stride;
        reached.saturating_sub(self.pad_left + self.input)
    }

    fn validate(&self, axis: &'static str) -> Result<(), ProblemError> {
        let fields = [
            (self.input, "input"),
            (self.filter, "filter"),
            (self.stride, "stride"),
            (self.dilation, "dilation"),
        ];
        if let Some((_, field)) = fields.into_iter().find(|(value, _)| *value == 0) {
            return Err(ProblemError::ZeroAxisField { axis, field });
        }
        let Some(filter) = self.checked_dilated_filter() else {
            return Err(ProblemError::DimensionOverflow {
                axis,
                quantity: "dilated filter",
            });
        };
        let Some(padded) = self.checked_padded_input() else {
            return Err(ProblemError::DimensionOverflow {
                axis,
                quantity: "padded input",
            });
        };
        if padded < filter {
            return Err(ProblemError::FilterExceedsInput {
                axis,
                padded,
                filter,
            });
        }
        Ok(())
    }
}

/// A validated convolution problem. Build one with [`ConvolutionProblem::builder`].
///
/// Channel counts are totals across all groups. `C` is the input-image channel
/// count and `K` the output-image channel count of the forward convolution,
/// whatever the direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConvolutionProblem {
    direction: ConvDirection,
    batch: usize,
    in_channels: usize,
    out_channels: usize,
    group_count: usize,
    depth: Option<SpatialAxis>,
    height: SpatialAxis,
    width: SpatialAxis,
    dtype: DataType,
    layout: TensorLayout,
    weight_layout: Option<TensorLayout>,
}

impl ConvolutionProblem {
    pub fn builder() -> ConvolutionProblemBuilder {
        ConvolutionProblemBuilder::default()
    }

    /// Start a builder pre-filled with this problem, for deriving variants.
    pub fn to_builder(&self) -> ConvolutionProblemBuilder {
        ConvolutionProblemBuilder {
            direction: self.direction,
            batch: self.batch,
            in_channels: self.in_channels,
            out_channels: self.out_channels,
            group_count: self.group_count,
            depth: self.depth,
            height: self.height,
            width: self.width,
            dtype: self.dtype,
            layout: self.layout,
            weight_layout: self.weight_layout,
        }
    }

    pub fn direction(&self) -> ConvDirection {
        self.direction
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// `None` selects the default weight layout.
    pub fn weight_layout(&self) -> Option<TensorLayout> {
        self.weight_layout
    }

    pub fn spatial_rank(&self) -> usize {
        if self.depth.is_some() {
            3
        } else {
            2
        }
    }

    pub fn is_2d(&self) -> bool {
        self.depth.is_none()
    }

    pub fn depth(&self) -> Option<&SpatialAxis> {
        self.depth.as_ref()
    }

    pub fn height(&self) -> &SpatialAxis {
        &self.height
    }

    pub fn width(&self) -> &SpatialAxis {
        &self.width
    }

    pub fn hi(&self) -> usize {
        self.height.input
    }

    pub fn wi(&self) -> usize {
        self.width.input
    }

    pub fn ho(&self) -> usize {
        self.height.output()
    }

    pub fn wo(&self) -> usize {
        self.width.output()
    }

    /// Filter height.
    pub fn y(&self) -> usize {
        self.height.filter
    }

    /// Filter width.
    pub fn x(&self) -> usize {
        self.width.filter
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvolutionProblemBuilder {
    direction: ConvDirection,
    batch: usize,
    in_channels: usize,
    out_channels: usize,
    group_count: usize,
    depth: Option<SpatialAxis>,
    height: SpatialAxis,
    width: SpatialAxis,
    dtype: DataType,
    layout: TensorLayout,
    weight_layout: Option<TensorLayout>,
}

impl Default for ConvolutionProblemBuilder {
    fn default() -> Self {
        Self {
            direction: ConvDirection::Forward,
            batch: 1,
            in_channels: 1,
            out_channels: 1,
            group_count: 1,
            depth: None,
            height: SpatialAxis::new(1, 1),
            width: SpatialAxis::new(1, 1),
            dtype: DataType::F32,
            layout: TensorLayout::Nchw,
            weight_layout: None,
        }
    }
}

impl ConvolutionProblemBuilder {
    pub fn direction(mut self, direction: ConvDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    pub fn in_channels(mut self, channels: usize) -> Self {
        self.in_channels = channels;
        self
    }

    pub fn out_channels(mut self, channels: usize) -> Self {
        self.out_channels = channels;
        self
    }

    pub fn group_count(mut self, groups: usize) -> Self {
        self.group_count = groups;
        self
    }

    pub fn height(mut self, axis: SpatialAxis) -> Self {
        self.height = axis;
        self
    }

    pub fn width(mut self, axis: SpatialAxis) -> Self {
        self.width = axis;
        self
    }

    /// Adding a depth axis turns the problem into a 3D convolution.
    pub fn depth(mut self, axis: Option<SpatialAxis>) -> Self {
        self.depth = axis;
        self
    }

    pub fn dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn weight_layout(mut self, layout: Option<TensorLayout>) -> Self {
        self.weight_layout = layout;
        self
    }

    pub fn build(self) -> Result<ConvolutionProblem, ProblemError> {
        if self.batch == 0 {
            return Err(ProblemError::ZeroDimension("batch"));
        }
        if self.in_channels == 0 {
            return Err(ProblemError::ZeroDimension("input channels"));
        }
        if self.out_channels == 0 {
            return Err(ProblemError::ZeroDimension("output channels"));
        }
        if self.group_count == 0 {
            return Err(ProblemError::ZeroDimension("group count"));
        }
        for (kind, channels) in [("input", self.in_channels), ("output", self.out_channels)] {
            if channels % self.group_count != 0 {
                return Err(ProblemError::UngroupableChannels {
                    kind,
                    channels,
                    groups: self.group_count,
                });
            }
        }

        if let Some(depth) = &self.depth {
            depth.validate("depth")?;
        }
        self.height.validate("height")?;
        self.width.validate("width")?;

        let rank = if self.depth.is_some() { 3 } else { 2 };
        if self.layout.spatial_rank() != rank {
            return Err(ProblemError::LayoutRankMismatch {
                layout: self.layout,
                rank,
            });
        }

        Ok(ConvolutionProblem {
            direction: self.direction,
            batch: self.batch,
            in_channels: self.in_channels,
            out_channels: self.out_channels,
            group_count: self.group_count,
            depth: self.depth,
            height: self.height,
            width: self.width,
            dtype: self.dtype,
            layout: self.layout,
            weight_layout: self.weight_layout,
        })
    }
}
