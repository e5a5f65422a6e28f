// SPDX-License-Identifier: AGPL-3.0-only

//! Direct (untiled) convolution: the ground truth
//!
//! ```text
//! ofmap[oy][ox][oc] = Σ ifmap[S*oy + fy][S*ox + fx][ic] * weight[fy][fx][ic][oc]
//!                    ic,fx,fy
//! ```
//!
//! Loop order is fixed as OY, OX, OC, IC, FX, FY. Accumulation is 32-bit
//! two's-complement with wraparound; there is no saturation or rounding.

use crate::config::{ConvShape, TilingConfig};
use crate::engine::{product, ConvEngine, EngineKind};
use crate::error::Result;
use crate::tensor::{Ifmap, Ofmap, Weights};
use tracing::debug;

/// Untiled reference engine
///
/// Only the flattened extents and stride of a [`TilingConfig`] matter here.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectEngine;

impl DirectEngine {
    /// Create the reference engine
    pub const fn new() -> Self {
        Self
    }

    /// Convolve using flattened extents only
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `shape` has a zero extent or an
    /// operand does not match it.
    pub fn convolve_shape(
        &self,
        shape: &ConvShape,
        ifmap: &Ifmap,
        weights: &Weights,
    ) -> Result<Ofmap> {
        shape.validate()?;
        shape.check_ifmap(ifmap)?;
        shape.check_weights(weights)?;

        debug!(
            "direct: {}x{}x{} ofmap, {} MACs",
            shape.oy,
            shape.ox,
            shape.oc,
            shape.macs()
        );

        let s = shape.stride;
        let mut ofmap = Ofmap::zeros(shape.ofmap_extents())?;
        for oy in 0..shape.oy {
            for ox in 0..shape.ox {
                for oc in 0..shape.oc {
                    let mut acc = 0i32;
                    for ic in 0..shape.ic {
                        for fx in 0..shape.fx {
                            for fy in 0..shape.fy {
                                let a = ifmap[[s * oy + fy, s * ox + fx, ic]];
                                let w = weights[[fy, fx, ic, oc]];
                                acc = acc.wrapping_add(product(a, w));
                            }
                        }
                    }
                    ofmap[[oy, ox, oc]] = acc;
                }
            }
        }
        Ok(ofmap)
    }
}

impl ConvEngine for DirectEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Direct
    }

    fn convolve(&self, cfg: &TilingConfig, ifmap: &Ifmap, weights: &Weights) -> Result<Ofmap> {
        self.convolve_shape(&cfg.shape(), ifmap, weights)
    }
}
