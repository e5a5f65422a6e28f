//! Interface traversal orders
//!
//! Each order is a six-deep loop nest; the loop counters are enumerated in
//! row-major order (first counter outermost) and mapped to a tensor
//! coordinate.
//!
//! | Stream | Outer loops | Inner loops |
//! |--------|-------------|-------------|
//! | ifmap | `oy1, ox1, ic1` | `iy0, ix0, ic0` (full receptive field, halo re-streamed) |
//! | weights | `oc1, ic1, fy, fx` | `ic0, oc0` |
//! | ofmap | `oy1, ox1, oc1` | `oy0, ox0, oc0` |

use crate::config::TilingConfig;
use crate::tensor::Indices;
use std::fmt;

/// One of the three accelerator interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Input feature map stream
    Ifmap,
    /// Weight stream
    Weights,
    /// Output feature map stream
    Ofmap,
}

impl StreamKind {
    /// All three interfaces
    pub const ALL: [Self; 3] = [Self::Ifmap, Self::Weights, Self::Ofmap];

    /// Short name used in logs and errors
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ifmap => "ifmap",
            Self::Weights => "weights",
            Self::Ofmap => "ofmap",
        }
    }

    /// Conventional stream file name
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::Ifmap => "ifmap_data.txt",
            Self::Weights => "weight_data.txt",
            Self::Ofmap => "ofmap_data.txt",
        }
    }

    /// Exact number of tokens this stream carries for `cfg`
    pub fn token_count(&self, cfg: &TilingConfig) -> u64 {
        let dims: [usize; 6] = match self {
            Self::Ifmap => [
                cfg.oy1(),
                cfg.ox1(),
                cfg.ic1(),
                cfg.tile_iy(),
                cfg.tile_ix(),
                cfg.ic0(),
            ],
            Self::Weights => [cfg.oc1(), cfg.ic1(), cfg.fy(), cfg.fx(), cfg.ic0(), cfg.oc0()],
            Self::Ofmap => [cfg.oy1(), cfg.ox1(), cfg.oc1(), cfg.oy0(), cfg.ox0(), cfg.oc0()],
        };
        dims.iter().map(|&d| d as u64).product()
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ifmap coordinates in interface order
pub fn ifmap_order(cfg: &TilingConfig) -> impl Iterator<Item = [usize; 3]> {
    let c = *cfg;
    let (s, oy0, ox0, ic0) = (c.stride(), c.oy0(), c.ox0(), c.ic0());
    Indices::new([c.oy1(), c.ox1(), c.ic1(), c.tile_iy(), c.tile_ix(), ic0]).map(
        move |[oy1, ox1, ic1, iy0, ix0, ic0_i]| {
            [
                oy1 * s * oy0 + iy0,
                ox1 * s * ox0 + ix0,
                ic1 * ic0 + ic0_i,
            ]
        },
    )
}

/// Weight coordinates in interface order
pub fn weight_order(cfg: &TilingConfig) -> impl Iterator<Item = [usize; 4]> {
    let c = *cfg;
    let (ic0, oc0) = (c.ic0(), c.oc0());
    Indices::new([c.oc1(), c.ic1(), c.fy(), c.fx(), ic0, oc0]).map(
        move |[oc1, ic1, fy, fx, ic0_i, oc0_i]| [fy, fx, ic1 * ic0 + ic0_i, oc1 * oc0 + oc0_i],
    )
}

/// Ofmap coordinates in interface order
pub fn ofmap_order(cfg: &TilingConfig) -> impl Iterator<Item = [usize; 3]> {
    let c = *cfg;
    let (oy0, ox0, oc0) = (c.oy0(), c.ox0(), c.oc0());
    Indices::new([c.oy1(), c.ox1(), c.oc1(), oy0, ox0, oc0]).map(
        move |[oy1, ox1, oc1, oy0_i, ox0_i, oc0_i]| {
            [oy1 * oy0 + oy0_i, ox1 * ox0 + ox0_i, oc1 * oc0 + oc0_i]
        },
    )
}

/// True if the ifmap stream reaches every ifmap element
///
/// A tile streams its whole input window, so gaps can only open between
/// adjacent tiles: when the stride exceeds the filter extent along an axis
/// split into more than one tile.
pub fn ifmap_fully_streamed(cfg: &TilingConfig) -> bool {
    let rows = cfg.fy() >= cfg.stride() || cfg.oy1() == 1;
    let cols = cfg.fx() >= cfg.stride() || cfg.ox1() == 1;
    rows && cols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayerParams;
    use std::collections::HashSet;

    fn cfg(stride: i64, f: i64) -> TilingConfig {
        TilingConfig::new(LayerParams {
            oy1: 2,
            oy0: 2,
            ox1: 2,
            ox0: 1,
            oc1: 2,
            oc0: 3,
            ic1: 2,
            ic0: 2,
            fy: f,
            fx: f,
            stride,
        })
        .unwrap()
    }

    #[test]
    fn test_orders_match_token_counts() {
        let c = cfg(2, 3);
        assert_eq!(ifmap_order(&c).count() as u64, StreamKind::Ifmap.token_count(&c));
        assert_eq!(weight_order(&c).count() as u64, StreamKind::Weights.token_count(&c));
        assert_eq!(ofmap_order(&c).count() as u64, StreamKind::Ofmap.token_count(&c));
    }

    #[test]
    fn test_ifmap_first_tile_then_halo() {
        // stride 1, 2x2 filter, OY0=2: each tile streams 3 rows, next tile starts at row 2
        let c = cfg(1, 2);
        let first: Vec<_> = ifmap_order(&c).take(3).collect();
        assert_eq!(first, vec![[0, 0, 0], [0, 0, 1], [0, 1, 0]]);

        let per_tile = c.tile_iy() * c.tile_ix() * c.ic0();
        // oy1=0, ox1=0, ic1=1 starts on channel 2
        assert_eq!(ifmap_order(&c).nth(per_tile), Some([0, 0, 2]));
        // oy1=1 begins after ox1 and ic1 tiles, at row S*OY0 = 2
        let tiles_per_row = c.ox1() * c.ic1();
        assert_eq!(ifmap_order(&c).nth(per_tile * tiles_per_row), Some([2, 0, 0]));
    }

    #[test]
    fn test_weight_order_inner_oc0() {
        let c = cfg(1, 1);
        let first: Vec<_> = weight_order(&c).take(4).collect();
        assert_eq!(first, vec![[0, 0, 0, 0], [0, 0, 0, 1], [0, 0, 0, 2], [0, 0, 1, 0]]);
        // second ic1 tile precedes second oc1 tile
        assert_eq!(weight_order(&c).nth(6), Some([0, 0, 2, 0]));
        assert_eq!(weight_order(&c).nth(12), Some([0, 0, 0, 3]));
    }

    #[test]
    fn test_ofmap_order_visits_each_once() {
        let c = cfg(1, 3);
        let seen: HashSet<_> = ofmap_order(&c).collect();
        assert_eq!(seen.len(), c.oy() * c.ox() * c.oc());
        // OX0 = 1, so the fourth token moves to the next output row
        assert_eq!(ofmap_order(&c).nth(3), Some([1, 0, 0]));
    }

    #[test]
    fn test_coverage() {
        assert!(ifmap_fully_streamed(&cfg(1, 3)));
        assert!(ifmap_fully_streamed(&cfg(2, 2)));
        assert!(!ifmap_fully_streamed(&cfg(2, 1)));
    }
}
