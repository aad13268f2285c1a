//! Integer helpers shared by solver geometry code.

/// Round `value` up to the next multiple of `step`.
///
/// # Panics
///
/// Panics if `step` is zero.
pub fn align_up(value: usize, step: usize) -> usize {
    assert!(step > 0, "align_up step must be positive");
    value.div_ceil(step) * step
}

/// Output size along one axis for a symmetric pad and no dilation:
/// `(input + 2 * pad - (kernel - stride)) / stride`.
///
/// Returns zero when the filter does not fit inside the padded input.
///
/// # Panics
///
/// Panics if `stride` is zero.
pub fn conv_output_size(input: usize, pad: usize, kernel: usize, stride: usize) -> usize {
    assert!(stride > 0, "convolution stride must be positive");
    (input + 2 * pad + stride).saturating_sub(kernel) / stride
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_step() {
        assert_eq!(align_up(3, 64), 64);
        assert_eq!(align_up(130, 4), 132);
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(64, 64), 64);
    }

    #[test]
    #[should_panic(expected = "step must be positive")]
    fn align_up_rejects_zero_step() {
        align_up(3, 0);
    }

    #[test]
    fn output_size_matches_convolution_arithmetic() {
        assert_eq!(conv_output_size(14, 0, 10, 2), 3);
        assert_eq!(conv_output_size(224, 1, 3, 1), 224);
        assert_eq!(conv_output_size(4, 0, 10, 2), 0);
    }
}
