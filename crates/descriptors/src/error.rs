//! Descriptor validation and configuration errors.

use crate::problem::TensorLayout;
use thiserror::Error;

/// Reasons a convolution problem cannot be described consistently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProblemError {
    #[error("{0} must be non-zero")]
    ZeroDimension(&'static str),

    #[error("{axis} {field} must be non-zero")]
    ZeroAxisField {
        axis: &'static str,
        field: &'static str,
    },

    #[error("{channels} {kind} channels cannot be split into {groups} groups")]
    UngroupableChannels {
        kind: &'static str,
        channels: usize,
        groups: usize,
    },

    #[error("{axis} axis: padded input {padded} is smaller than dilated filter {filter}")]
    FilterExceedsInput {
        axis: &'static str,
        padded: usize,
        filter: usize,
    },

    #[error("{axis} axis: {quantity} does not fit in usize")]
    DimensionOverflow {
        axis: &'static str,
        quantity: &'static str,
    },

    #[error("layout {layout} does not describe a {rank}D problem")]
    LayoutRankMismatch { layout: TensorLayout, rank: usize },
}

/// Errors raised while reading process-wide debug overrides.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{variable}={value:?} is not a recognised on/off value")]
    InvalidToggle {
        variable: &'static str,
        value: String,
    },
}
