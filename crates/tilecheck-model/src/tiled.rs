// SPDX-License-Identifier: AGPL-3.0-only

//! Tiled convolution: the hardware dataflow model
//!
//! Mirrors an accelerator that holds one `OY0 × OX0 × OC0` output tile in
//! local accumulators while `IC0` input/weight pairs stream through a
//! multiply-accumulate array. Loop nest, outer to inner:
//!
//! ```text
//! OY1 ─ OX1 ─ OC1 ─ IC1 ─ FY ─ FX ─ OY0 ─ OX0 ─ OC0 ─ IC0
//! └──── output tile ───┘ └ reduction ┘ └─ tile (unrolled in HW) ─┘
//! ```
//!
//! Every ofmap element receives exactly `IC1*FY*FX*IC0` contributions, the
//! same multiset the direct engine sums. Wrapping 32-bit addition is
//! associative and commutative, so the two results must be identical; any
//! difference is a bug, never rounding.

use crate::config::TilingConfig;
use crate::engine::{product, ConvEngine, EngineKind};
use crate::error::Result;
use crate::tensor::{Ifmap, Ofmap, Weights};
use crate::trace::{MacEvent, MacTrace, NoTrace};
use tracing::debug;

/// Hardware-mirroring tiled engine
#[derive(Debug, Default, Clone, Copy)]
pub struct TiledEngine;

impl TiledEngine {
    /// Create the tiled engine
    pub const fn new() -> Self {
        Self
    }

    /// Convolve, reporting every multiply-accumulate to `trace`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an operand does not match `cfg`, or
    /// the sink's error if recording fails.
    pub fn convolve_traced<S: MacTrace + ?Sized>(
        &self,
        cfg: &TilingConfig,
        ifmap: &Ifmap,
        weights: &Weights,
        trace: &mut S,
    ) -> Result<Ofmap> {
        cfg.check_ifmap(ifmap)?;
        cfg.check_weights(weights)?;

        debug!("tiled: {} ({} MACs)", cfg, cfg.shape().macs());

        let (oy0_n, ox0_n, oc0_n, ic0_n) = (cfg.oy0(), cfg.ox0(), cfg.oc0(), cfg.ic0());
        let s = cfg.stride();

        // Accumulators start at zero before any tile is visited
        let mut ofmap = Ofmap::zeros(cfg.shape().ofmap_extents())?;

        for oy1 in 0..cfg.oy1() {
            for ox1 in 0..cfg.ox1() {
                for oc1 in 0..cfg.oc1() {
                    for ic1 in 0..cfg.ic1() {
                        for fy in 0..cfg.fy() {
                            for fx in 0..cfg.fx() {
                                for oy0 in 0..oy0_n {
                                    for ox0 in 0..ox0_n {
                                        for oc0 in 0..oc0_n {
                                            let oy = oy1 * oy0_n + oy0;
                                            let ox = ox1 * ox0_n + ox0;
                                            let oc = oc1 * oc0_n + oc0;
                                            for ic0 in 0..ic0_n {
                                                let ic = ic1 * ic0_n + ic0;
                                                let a = ifmap[[s * oy + fy, s * ox + fx, ic]];
                                                let w = weights[[fy, fx, ic, oc]];
                                                let cell = &mut ofmap[[oy, ox, oc]];
                                                let before = *cell;
                                                *cell = before.wrapping_add(product(a, w));
                                                trace.record(&MacEvent {
                                                    index: [oy, ox, oc],
                                                    ic0,
                                                    oc0,
                                                    ifmap: a,
                                                    weight: w,
                                                    ofmap_in: before,
                                                    ofmap_out: *cell,
                                                })?;
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        trace.finish()?;
        Ok(ofmap)
    }
}

impl ConvEngine for TiledEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Tiled
    }

    fn convolve(&self, cfg: &TilingConfig, ifmap: &Ifmap, weights: &Weights) -> Result<Ofmap> {
        self.convolve_traced(cfg, ifmap, weights, &mut NoTrace)
    }
}
