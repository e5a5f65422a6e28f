//! Convolution engine abstraction
//!
//! Both software models implement [`ConvEngine`], so the verification harness
//! can compare any pair: direct against tiled today, a hardware backend that
//! returns a decoded ofmap stream later.

use crate::config::TilingConfig;
use crate::error::Result;
use crate::tensor::{Ifmap, Ofmap, Weights};
use std::fmt::{self, Debug};

/// Convolution engine trait
pub trait ConvEngine: Debug {
    /// Engine identifier used in logs and reports
    fn kind(&self) -> EngineKind;

    /// Convolve `ifmap` with `weights` under `cfg`
    ///
    /// Operand extents are checked against `cfg` before any arithmetic.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an operand does not match `cfg`.
    fn convolve(&self, cfg: &TilingConfig, ifmap: &Ifmap, weights: &Weights) -> Result<Ofmap>;
}

/// Engine identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Untiled ground-truth loop nest
    Direct,

    /// Hardware-mirroring tiled loop nest
    Tiled,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Tiled => write!(f, "tiled"),
        }
    }
}

/// One multiply: 16×16 → 32-bit with two's-complement wraparound
#[inline(always)]
pub(crate) fn product(activation: i16, weight: i16) -> i32 {
    i32::from(activation).wrapping_mul(i32::from(weight))
}
