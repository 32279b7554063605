//! Policy for rows whose every score is masked out (`-inf`).

use std::str::FromStr;

use crate::softmax::errors::SoftmaxError;

/// What to do when a block, or a whole accumulation, carries no mass.
///
/// A score vector whose every element is `-inf` (a fully masked attention
/// row) has no softmax. The crate never lets this degrade into NaN; the
/// caller picks one of two explicit behaviors:
///
/// - `Error` (default): report [`SoftmaxError::AllMasked`].
/// - `ZeroOutput`: return an all-zero output with `lse = -inf`, the usual
///   convention for masked rows in attention kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskPolicy {
    #[default]
    Error,
    ZeroOutput,
}

impl FromStr for MaskPolicy {
    type Err = SoftmaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(MaskPolicy::Error),
            "zero" | "zero_output" => Ok(MaskPolicy::ZeroOutput),
            other => Err(SoftmaxError::UnknownMaskPolicy { name: other.to_string() }),
        }
    }
}
