//! Layer verification harness
//!
//! Drives one layer through a reference and a candidate engine and compares
//! the results. Stream artifacts for the hardware testbench are written and
//! read through [`StreamArtifacts`].

use crate::config::TilingConfig;
use crate::engine::ConvEngine;
use crate::equivalence::{EquivalenceChecker, EquivalenceReport};
use crate::error::{Result, TileError};
use crate::stream::{StreamCodec, StreamKind};
use crate::tensor::{Ifmap, Ofmap, Tensor, Weights};
use crate::trace::TraceWriter;
use rand::prelude::*;
use std::fs::{self, File};
use std::io::BufReader;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Value range of generated operands, matching the C testbench (`rand() % 100`)
pub const DEFAULT_VALUE_RANGE: Range<i16> = 0..100;

/// MAC trace file name
pub const TRACE_FILE: &str = "mac_data.txt";

/// Operands for one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerData {
    /// Input feature map
    pub ifmap: Ifmap,
    /// Filter weights
    pub weights: Weights,
}

impl LayerData {
    /// Seeded random operands with values drawn from `range`
    ///
    /// # Errors
    ///
    /// Returns error if `range` is empty or the extents are invalid.
    pub fn random(cfg: &TilingConfig, seed: u64, range: Range<i16>) -> Result<Self> {
        if range.is_empty() {
            return Err(TileError::invalid_tensor(format!(
                "empty value range {range:?}"
            )));
        }
        let mut rng = SmallRng::seed_from_u64(seed);
        let shape = cfg.shape();
        let ifmap = Tensor::from_fn(shape.ifmap_extents(), |_| {
            rng.random_range(range.clone())
        })?;
        let weights = Tensor::from_fn(shape.weight_extents(), |_| {
            rng.random_range(range.clone())
        })?;
        debug!(
            "Generated {} ifmap and {} weight values (seed {seed}, range {range:?})",
            ifmap.len(),
            weights.len()
        );
        Ok(Self { ifmap, weights })
    }
}

/// Result of verifying one layer
#[derive(Debug, Clone)]
pub struct LayerVerdict {
    /// Candidate compared against reference
    pub report: EquivalenceReport,
    /// Reference output
    pub ofmap: Ofmap,
}

impl LayerVerdict {
    /// True iff the candidate matched the reference exactly
    pub const fn is_pass(&self) -> bool {
        self.report.is_pass()
    }
}

/// Run `reference` and `candidate` on the same operands and compare
///
/// # Errors
///
/// Returns a configuration error if an operand does not match `cfg`.
/// Mismatches are reported in the verdict, not as errors.
pub fn verify_layer(
    cfg: &TilingConfig,
    ifmap: &Ifmap,
    weights: &Weights,
    reference: &dyn ConvEngine,
    candidate: &dyn ConvEngine,
) -> Result<LayerVerdict> {
    let expected = reference.convolve(cfg, ifmap, weights)?;
    let actual = candidate.convolve(cfg, ifmap, weights)?;
    let report = EquivalenceChecker::new().compare(&expected, &actual)?;
    report.log(&format!("{} vs {}", reference.kind(), candidate.kind()));
    Ok(LayerVerdict {
        report,
        ofmap: expected,
    })
}

/// Stream files for one layer inside an output directory
#[derive(Debug, Clone)]
pub struct StreamArtifacts {
    dir: PathBuf,
    codec: StreamCodec,
}

impl StreamArtifacts {
    /// Artifacts in `dir`, encoded with `codec`
    pub fn new(dir: impl Into<PathBuf>, codec: StreamCodec) -> Self {
        Self {
            dir: dir.into(),
            codec,
        }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Codec used for every stream
    pub const fn codec(&self) -> &StreamCodec {
        &self.codec
    }

    /// Path of one stream file
    pub fn path(&self, kind: StreamKind) -> PathBuf {
        self.dir.join(kind.filename())
    }

    /// Path of the MAC trace file
    pub fn trace_path(&self) -> PathBuf {
        self.dir.join(TRACE_FILE)
    }

    /// Open a MAC trace writer on the trace file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created.
    pub fn create_trace(&self) -> Result<TraceWriter<File>> {
        self.ensure_dir()?;
        Ok(TraceWriter::new(File::create(self.trace_path())?))
    }

    /// Write the ifmap and weight streams
    ///
    /// # Errors
    ///
    /// Returns encoding or I/O errors.
    pub fn write_inputs(&self, data: &LayerData) -> Result<()> {
        self.ensure_dir()?;
        self.codec
            .write_ifmap(&data.ifmap, File::create(self.path(StreamKind::Ifmap))?)?;
        self.codec
            .write_weights(&data.weights, File::create(self.path(StreamKind::Weights))?)?;
        info!("Wrote input streams to {}", self.dir.display());
        Ok(())
    }

    /// Write the golden ofmap stream
    ///
    /// # Errors
    ///
    /// Returns encoding or I/O errors.
    pub fn write_ofmap(&self, ofmap: &Ofmap) -> Result<()> {
        self.ensure_dir()?;
        let path = self.path(StreamKind::Ofmap);
        self.codec.write_ofmap(ofmap, File::create(&path)?)?;
        info!("Wrote {}", path.display());
        Ok(())
    }

    /// Read the ifmap and weight streams back
    ///
    /// # Errors
    ///
    /// Returns I/O or decoding errors.
    pub fn read_inputs(&self) -> Result<LayerData> {
        Ok(LayerData {
            ifmap: self.codec.read_ifmap(self.open(StreamKind::Ifmap)?)?,
            weights: self.codec.read_weights(self.open(StreamKind::Weights)?)?,
        })
    }

    /// Read an ofmap stream (golden or captured from hardware)
    ///
    /// # Errors
    ///
    /// Returns I/O or decoding errors.
    pub fn read_ofmap(&self) -> Result<Ofmap> {
        self.codec.read_ofmap(self.open(StreamKind::Ofmap)?)
    }

    fn open(&self, kind: StreamKind) -> Result<BufReader<File>> {
        let path = self.path(kind);
        if !path.exists() {
            return Err(TileError::FileNotFound { path });
        }
        Ok(BufReader::new(File::open(path)?))
    }

    fn ensure_dir(&self) -> Result<()> {
        Ok(fs::create_dir_all(&self.dir)?)
    }
}
