#![deny(unsafe_code)]

//! Bit-exact software model of a tiled convolution accelerator
//!
//! This crate provides the software half of a hardware/software
//! co-verification flow for a convolution accelerator that computes one
//! layer as a nest of tiles.
//!
//! - [`DirectEngine`]: untiled reference convolution, the ground truth
//! - [`TiledEngine`]: the same arithmetic in the accelerator's tile order
//! - [`EquivalenceChecker`]: element-by-element, zero-tolerance comparison
//! - [`StreamCodec`]: tensors ⇄ hex token streams in interface order
//!
//! All arithmetic is 16-bit operands into 32-bit accumulators with
//! two's-complement wraparound.
//!
//! # Example
//!
//! ```
//! use tilecheck_model::prelude::*;
//! use tilecheck_model::harness::{verify_layer, LayerData, DEFAULT_VALUE_RANGE};
//!
//! # fn main() -> tilecheck_model::Result<()> {
//! let cfg = ZooLayer::Small.config()?;
//! let data = LayerData::random(&cfg, 42, DEFAULT_VALUE_RANGE)?;
//! let verdict = verify_layer(
//!     &cfg,
//!     &data.ifmap,
//!     &data.weights,
//!     &DirectEngine::new(),
//!     &TiledEngine::new(),
//! )?;
//! assert!(verdict.is_pass());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod config;
mod direct;
mod engine;
mod equivalence;
mod error;
pub mod harness;
pub mod params;
pub mod stream;
mod tensor;
mod tiled;
pub mod trace;
pub mod zoo;

pub use config::{ConvShape, LayerParams, TileShape, TilingConfig};
pub use direct::DirectEngine;
pub use engine::{ConvEngine, EngineKind};
pub use equivalence::{EquivalenceChecker, EquivalenceReport, Mismatch};
pub use error::{Result, TileError};
pub use stream::{StreamCodec, StreamKind, TokenFormat};
pub use tensor::{Element, Ifmap, Indices, Ofmap, Tensor, Weights};
pub use tiled::TiledEngine;
pub use trace::{MacEvent, MacTrace, NoTrace, TraceWriter};
pub use zoo::ZooLayer;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        ConvEngine, DirectEngine, EquivalenceChecker, Ifmap, LayerParams, Ofmap, Result,
        StreamCodec, Tensor, TiledEngine, TilingConfig, Weights, ZooLayer,
    };
}
