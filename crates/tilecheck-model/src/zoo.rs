//! Layer zoo
//!
//! Named tiling presets used by the co-verification testbench. The `resnet_*`
//! layers follow the ResNet-18/34 convolution stages mapped onto a 16×16
//! multiply-accumulate array (`IC0 = OC0 = 16`); the first layer's three RGB
//! channels are zero-padded to 16.
//!
//! | Preset | Output | IC → OC | Filter | Stride |
//! |--------|--------|---------|--------|--------|
//! | `small` | 12×12 | 8 → 16 | 3×3 | 1 |
//! | `resnet_conv1` | 112×112 | 16 → 64 | 7×7 | 2 |
//! | `resnet_conv2_x` | 56×56 | 64 → 64 | 3×3 | 1 |
//! | `resnet_conv3_x` | 28×28 | 128 → 128 | 3×3 | 1 |
//! | `resnet_conv4_x` | 14×14 | 256 → 256 | 3×3 | 1 |
//! | `resnet_conv5_x` | 7×7 | 512 → 512 | 3×3 | 1 |
//! | `resnet_fc` | 1×1 | 512 → 1024 | 1×1 | 1 |
//!
//! ## Usage
//!
//! ```
//! use tilecheck_model::ZooLayer;
//!
//! let layer: ZooLayer = "small".parse().unwrap();
//! let cfg = layer.config().unwrap();
//! assert_eq!(cfg.oy(), 12);
//! ```

use crate::config::{LayerParams, TilingConfig};
use crate::error::{Result, TileError};
use std::fmt;
use std::str::FromStr;

/// Preset layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZooLayer {
    /// Small smoke-test layer, 3×3 filter
    Small,

    // ── ResNet stages ───────────────────────────────────────────────────────
    /// 7×7 stride-2 stem
    ResnetConv1,
    /// Stem at stride 1 (halo-heavy ifmap stream)
    ResnetConv1Stride1,
    /// conv2_x body, 56×56
    ResnetConv2X,
    /// conv3_x body, 28×28
    ResnetConv3X,
    /// conv3_1 downsampling layer
    ResnetConv3_1,
    /// conv4_x body, 14×14
    ResnetConv4X,
    /// conv4_1 downsampling layer
    ResnetConv4_1,
    /// conv5_x body, 7×7
    ResnetConv5X,
    /// conv5_1 downsampling layer
    ResnetConv5_1,
    /// Fully connected classifier as a 1×1 convolution
    ResnetFc,
}

impl ZooLayer {
    /// Preset name used on the command line
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::ResnetConv1 => "resnet_conv1",
            Self::ResnetConv1Stride1 => "resnet_conv1_stride1",
            Self::ResnetConv2X => "resnet_conv2_x",
            Self::ResnetConv3X => "resnet_conv3_x",
            Self::ResnetConv3_1 => "resnet_conv3_1",
            Self::ResnetConv4X => "resnet_conv4_x",
            Self::ResnetConv4_1 => "resnet_conv4_1",
            Self::ResnetConv5X => "resnet_conv5_x",
            Self::ResnetConv5_1 => "resnet_conv5_1",
            Self::ResnetFc => "resnet_fc",
        }
    }

    /// Get layer description
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Small => "12×12×16 output, 8 input channels, 3×3 filter",
            Self::ResnetConv1 => "ResNet stem: 7×7/2, 16 (padded RGB) → 64 channels",
            Self::ResnetConv1Stride1 => "ResNet stem at stride 1, 16 → 64 channels",
            Self::ResnetConv2X => "ResNet conv2_x: 3×3/1, 64 → 64 channels",
            Self::ResnetConv3X => "ResNet conv3_x: 3×3/1, 128 → 128 channels",
            Self::ResnetConv3_1 => "ResNet conv3_1: 3×3/2, 64 → 128 channels",
            Self::ResnetConv4X => "ResNet conv4_x: 3×3/1, 256 → 256 channels",
            Self::ResnetConv4_1 => "ResNet conv4_1: 3×3/2, 128 → 256 channels",
            Self::ResnetConv5X => "ResNet conv5_x: 3×3/1, 512 → 512 channels",
            Self::ResnetConv5_1 => "ResNet conv5_1: 3×3/2, 256 → 512 channels",
            Self::ResnetFc => "ResNet classifier: 512 → 1024 as a 1×1 convolution",
        }
    }

    /// Raw tiling parameters
    pub const fn params(&self) -> LayerParams {
        // (OY1, OY0, OX1, OX0, OC1, OC0, IC1, IC0, FX, FY, STRIDE)
        let (oy1, oy0, ox1, ox0, oc1, oc0, ic1, ic0, fx, fy, stride) = match self {
            Self::Small => (4, 3, 4, 3, 4, 4, 2, 4, 3, 3, 1),
            Self::ResnetConv1 => (8, 14, 8, 14, 4, 16, 1, 16, 7, 7, 2),
            Self::ResnetConv1Stride1 => (8, 14, 8, 14, 4, 16, 1, 16, 7, 7, 1),
            Self::ResnetConv2X => (4, 14, 4, 14, 4, 16, 4, 16, 3, 3, 1),
            Self::ResnetConv3X => (4, 7, 4, 7, 8, 16, 8, 16, 3, 3, 1),
            Self::ResnetConv3_1 => (4, 7, 4, 7, 8, 16, 4, 16, 3, 3, 2),
            Self::ResnetConv4X => (2, 7, 2, 7, 16, 16, 16, 16, 3, 3, 1),
            Self::ResnetConv4_1 => (2, 7, 2, 7, 16, 16, 8, 16, 3, 3, 2),
            Self::ResnetConv5X => (1, 7, 1, 7, 32, 16, 32, 16, 3, 3, 1),
            Self::ResnetConv5_1 => (1, 7, 1, 7, 32, 16, 16, 16, 3, 3, 2),
            Self::ResnetFc => (1, 1, 1, 1, 64, 16, 32, 16, 1, 1, 1),
        };
        LayerParams {
            oy1,
            oy0,
            ox1,
            ox0,
            oc1,
            oc0,
            ic1,
            ic0,
            fy,
            fx,
            stride,
        }
    }

    /// Validated configuration
    ///
    /// # Errors
    ///
    /// Never fails for the built-in presets; the `Result` carries the
    /// configuration check.
    pub fn config(&self) -> Result<TilingConfig> {
        TilingConfig::new(self.params())
    }

    /// Every preset, smallest first
    pub const fn all() -> &'static [Self] {
        &[
            Self::Small,
            Self::ResnetFc,
            Self::ResnetConv5X,
            Self::ResnetConv5_1,
            Self::ResnetConv4X,
            Self::ResnetConv4_1,
            Self::ResnetConv3X,
            Self::ResnetConv3_1,
            Self::ResnetConv2X,
            Self::ResnetConv1,
            Self::ResnetConv1Stride1,
        ]
    }

    /// Look up a preset by name
    ///
    /// # Errors
    ///
    /// Returns [`TileError::UnknownLayer`] if no preset has that name.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|l| l.name() == name)
            .ok_or_else(|| TileError::UnknownLayer {
                name: name.to_string(),
            })
    }
}

impl FromStr for ZooLayer {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for ZooLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
