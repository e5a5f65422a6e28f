//! Error types for tiled convolution verification

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for verification operations
pub type Result<T> = std::result::Result<T, TileError>;

/// Errors that can occur while configuring, computing or streaming a layer
///
/// Equivalence mismatches are not errors: they are reported through
/// [`crate::EquivalenceReport`].
#[derive(Debug, Error)]
pub enum TileError {
    /// A tiling parameter is zero, negative or overflows
    #[error("Invalid tiling configuration: {reason}")]
    InvalidConfig {
        /// Reason for rejection
        reason: String,
    },

    /// A flat extent is not a multiple of its tile size
    #[error("{axis} extent {extent} is not divisible by tile size {tile}")]
    NotDivisible {
        /// Axis name (e.g. `OY`)
        axis: &'static str,
        /// Flat extent
        extent: usize,
        /// Inner tile size
        tile: usize,
    },

    /// Operand extents disagree with the configuration
    #[error("{operand} extents {actual:?} do not match configuration (expected {expected:?})")]
    ShapeMismatch {
        /// Operand name (`ifmap`, `weights`, `ofmap`)
        operand: &'static str,
        /// Extents required by the configuration
        expected: Vec<usize>,
        /// Extents of the supplied tensor
        actual: Vec<usize>,
    },

    /// Tensor construction failed
    #[error("Invalid tensor: {reason}")]
    InvalidTensor {
        /// Reason for failure
        reason: String,
    },

    /// A stream token could not be parsed or encoded
    #[error("Token error at line {line}: {reason}")]
    Token {
        /// 1-based line number in the stream (0 when encoding)
        line: usize,
        /// Reason for failure
        reason: String,
    },

    /// Stream length disagrees with the layout
    #[error("{stream} stream has {actual} tokens, expected {expected}")]
    TokenCount {
        /// Stream kind
        stream: &'static str,
        /// Tokens required by the layout
        expected: usize,
        /// Tokens found
        actual: usize,
    },

    /// Two copies of a re-streamed halo element disagree
    #[error("{stream} halo conflict at {index:?}: streamed {first} then {second} (line {line})")]
    HaloConflict {
        /// Stream kind
        stream: &'static str,
        /// Tensor coordinate
        index: Vec<usize>,
        /// Value from the first copy
        first: i64,
        /// Value from the conflicting copy
        second: i64,
        /// 1-based line of the conflicting copy
        line: usize,
    },

    /// Layer preset not present in the zoo
    #[error("Unknown layer preset: {name}")]
    UnknownLayer {
        /// Requested name
        name: String,
    },

    /// Layer parameter file could not be read
    #[error("Layer file not found: {path}")]
    FileNotFound {
        /// Path that was attempted
        path: PathBuf,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Layer parameter JSON could not be parsed
    #[error("Layer JSON error: {source}")]
    Json {
        /// Underlying serde error
        #[from]
        source: serde_json::Error,
    },
}

impl TileError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid tensor error
    pub fn invalid_tensor(reason: impl Into<String>) -> Self {
        Self::InvalidTensor {
            reason: reason.into(),
        }
    }

    /// Create a token error
    pub fn token(line: usize, reason: impl Into<String>) -> Self {
        Self::Token {
            line,
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(operand: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            operand,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// True for errors that reject a layer configuration before computation
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::NotDivisible { .. } | Self::ShapeMismatch { .. }
        )
    }
}
