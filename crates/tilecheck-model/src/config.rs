//! Layer tiling configuration
//!
//! A convolution layer is described by eleven positive integers: outer/inner
//! splits of the output rows (`OY1`, `OY0`), output columns (`OX1`, `OX0`),
//! output channels (`OC1`, `OC0`) and input channels (`IC1`, `IC0`), plus the
//! filter extents (`FY`, `FX`) and the stride.
//!
//! ```text
//! OY = OY1 * OY0        IY = (OY - 1) * STRIDE + FY
//! OX = OX1 * OX0        IX = (OX - 1) * STRIDE + FX
//! OC = OC1 * OC0
//! IC = IC1 * IC0
//! ```
//!
//! Every derived extent is computed with overflow checks when the
//! configuration is built, so the accessors below never overflow.

use crate::error::{Result, TileError};
use crate::tensor::{Element, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Raw layer parameters as they appear in a layer JSON file
///
/// Fields are signed so that negative values in a file are reported as a
/// rejected configuration rather than a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct LayerParams {
    /// Output-row tiles
    pub oy1: i64,
    /// Output rows per tile
    pub oy0: i64,
    /// Output-column tiles
    pub ox1: i64,
    /// Output columns per tile
    pub ox0: i64,
    /// Output-channel tiles
    pub oc1: i64,
    /// Output channels per tile
    pub oc0: i64,
    /// Input-channel tiles
    pub ic1: i64,
    /// Input channels per tile
    pub ic0: i64,
    /// Filter rows
    pub fy: i64,
    /// Filter columns
    pub fx: i64,
    /// Convolution stride
    pub stride: i64,
}

impl LayerParams {
    /// Parameters as `(NAME, value)` pairs in testbench header order
    pub const fn named(&self) -> [(&'static str, i64); 11] {
        [
            ("IC0", self.ic0),
            ("OC0", self.oc0),
            ("IC1", self.ic1),
            ("OC1", self.oc1),
            ("FX", self.fx),
            ("FY", self.fy),
            ("OX0", self.ox0),
            ("OY0", self.oy0),
            ("OX1", self.ox1),
            ("OY1", self.oy1),
            ("STRIDE", self.stride),
        ]
    }
}

/// Flattened convolution extents (no tiling)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConvShape {
    /// Output rows
    pub oy: usize,
    /// Output columns
    pub ox: usize,
    /// Output channels
    pub oc: usize,
    /// Input channels
    pub ic: usize,
    /// Filter rows
    pub fy: usize,
    /// Filter columns
    pub fx: usize,
    /// Stride
    pub stride: usize,
}

impl ConvShape {
    /// Padded input rows covering every receptive field
    pub const fn iy(&self) -> usize {
        (self.oy - 1) * self.stride + self.fy
    }

    /// Padded input columns covering every receptive field
    pub const fn ix(&self) -> usize {
        (self.ox - 1) * self.stride + self.fx
    }

    /// Required ifmap extents
    pub const fn ifmap_extents(&self) -> [usize; 3] {
        [self.iy(), self.ix(), self.ic]
    }

    /// Required weight extents
    pub const fn weight_extents(&self) -> [usize; 4] {
        [self.fy, self.fx, self.ic, self.oc]
    }

    /// Required ofmap extents
    pub const fn ofmap_extents(&self) -> [usize; 3] {
        [self.oy, self.ox, self.oc]
    }

    /// Multiply-accumulate operations in one layer
    pub fn macs(&self) -> u64 {
        [self.oy, self.ox, self.oc, self.ic, self.fy, self.fx]
            .iter()
            .map(|&e| e as u64)
            .product()
    }

    /// Validate that every extent is positive and the ifmap extents fit `usize`
    ///
    /// # Errors
    ///
    /// Returns a configuration error otherwise.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("OY", self.oy),
            ("OX", self.ox),
            ("OC", self.oc),
            ("IC", self.ic),
            ("FY", self.fy),
            ("FX", self.fx),
            ("STRIDE", self.stride),
        ];
        for (name, value) in named {
            if value == 0 {
                return Err(TileError::invalid_config(format!("{name} must be positive")));
            }
        }
        receptive_extent(self.oy, self.stride, self.fy, "IY")?;
        receptive_extent(self.ox, self.stride, self.fx, "IX")?;
        Ok(())
    }

    /// Check the ifmap against the receptive-field covering condition
    ///
    /// # Errors
    ///
    /// Returns [`TileError::ShapeMismatch`] if the extents differ.
    pub fn check_ifmap<T: Element>(&self, ifmap: &Tensor<T, 3>) -> Result<()> {
        check_extents("ifmap", &self.ifmap_extents(), &ifmap.extents())
    }

    /// Check weight extents
    ///
    /// # Errors
    ///
    /// Returns [`TileError::ShapeMismatch`] if the extents differ.
    pub fn check_weights<T: Element>(&self, weights: &Tensor<T, 4>) -> Result<()> {
        check_extents("weights", &self.weight_extents(), &weights.extents())
    }

    /// Check ofmap extents
    ///
    /// # Errors
    ///
    /// Returns [`TileError::ShapeMismatch`] if the extents differ.
    pub fn check_ofmap<T: Element>(&self, ofmap: &Tensor<T, 3>) -> Result<()> {
        check_extents("ofmap", &self.ofmap_extents(), &ofmap.extents())
    }
}

/// Inner tile sizes used to split a [`ConvShape`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileShape {
    /// Output rows per tile
    pub oy0: usize,
    /// Output columns per tile
    pub ox0: usize,
    /// Output channels per tile
    pub oc0: usize,
    /// Input channels per tile
    pub ic0: usize,
}

/// Validated, immutable tiling configuration for one layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LayerParams", into = "LayerParams")]
pub struct TilingConfig {
    oy1: usize,
    oy0: usize,
    ox1: usize,
    ox0: usize,
    oc1: usize,
    oc0: usize,
    ic1: usize,
    ic0: usize,
    fy: usize,
    fx: usize,
    stride: usize,
}

impl TilingConfig {
    /// Build a configuration from raw parameters
    ///
    /// # Errors
    ///
    /// Returns [`TileError::InvalidConfig`] if any parameter is zero or
    /// negative, or if a derived extent overflows.
    pub fn new(params: LayerParams) -> Result<Self> {
        let mut values = [0usize; 11];
        for (slot, (name, raw)) in values.iter_mut().zip(params.named()) {
            if raw <= 0 {
                return Err(TileError::invalid_config(format!(
                    "{name} must be positive, got {raw}"
                )));
            }
            *slot = usize::try_from(raw).map_err(|_| {
                TileError::invalid_config(format!("{name} = {raw} does not fit usize"))
            })?;
        }
        let [ic0, oc0, ic1, oc1, fx, fy, ox0, oy0, ox1, oy1, stride] = values;
        let cfg = Self {
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
        };
        cfg.validate_products()?;
        Ok(cfg)
    }

    /// Split flat extents into outer/inner tiles
    ///
    /// # Errors
    ///
    /// Returns [`TileError::NotDivisible`] if an extent is not a multiple of its
    /// tile size, or a configuration error for zero extents.
    pub fn split(shape: ConvShape, tile: TileShape) -> Result<Self> {
        shape.validate()?;
        let axes = [
            ("OY", shape.oy, tile.oy0),
            ("OX", shape.ox, tile.ox0),
            ("OC", shape.oc, tile.oc0),
            ("IC", shape.ic, tile.ic0),
        ];
        let mut outer = [0usize; 4];
        for (slot, (axis, extent, tile)) in outer.iter_mut().zip(axes) {
            if tile == 0 {
                return Err(TileError::invalid_config(format!(
                    "{axis} tile size must be positive"
                )));
            }
            if extent % tile != 0 {
                return Err(TileError::NotDivisible { axis, extent, tile });
            }
            *slot = extent / tile;
        }
        let [oy1, ox1, oc1, ic1] = outer;
        let cfg = Self {
            oy1,
            oy0: tile.oy0,
            ox1,
            ox0: tile.ox0,
            oc1,
            oc0: tile.oc0,
            ic1,
            ic0: tile.ic0,
            fy: shape.fy,
            fx: shape.fx,
            stride: shape.stride,
        };
        cfg.validate_products()?;
        Ok(cfg)
    }

    /// Parse a layer JSON object (`{"OY1": 4, "OY0": 3, ...}`)
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or the parameters are rejected.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: LayerParams = serde_json::from_str(json)?;
        Self::new(params)
    }

    /// Load a layer JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or its contents are rejected.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TileError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let json = fs::read_to_string(path)?;
        let cfg = Self::from_json_str(&json)?;
        tracing::debug!("Loaded layer {} from {}", cfg, path.display());
        Ok(cfg)
    }

    /// Raw parameters
    #[allow(clippy::cast_possible_wrap)]
    pub const fn params(&self) -> LayerParams {
        LayerParams {
            oy1: self.oy1 as i64,
            oy0: self.oy0 as i64,
            ox1: self.ox1 as i64,
            ox0: self.ox0 as i64,
            oc1: self.oc1 as i64,
            oc0: self.oc0 as i64,
            ic1: self.ic1 as i64,
            ic0: self.ic0 as i64,
            fy: self.fy as i64,
            fx: self.fx as i64,
            stride: self.stride as i64,
        }
    }

    /// Flattened extents consumed by the direct engine
    pub const fn shape(&self) -> ConvShape {
        ConvShape {
            oy: self.oy(),
            ox: self.ox(),
            oc: self.oc(),
            ic: self.ic(),
            fy: self.fy,
            fx: self.fx,
            stride: self.stride,
        }
    }

}

// Raw parameter accessors
#[allow(missing_docs)]
impl TilingConfig {
    pub const fn oy1(&self) -> usize {
        self.oy1
    }
    pub const fn oy0(&self) -> usize {
        self.oy0
    }
    pub const fn ox1(&self) -> usize {
        self.ox1
    }
    pub const fn ox0(&self) -> usize {
        self.ox0
    }
    pub const fn oc1(&self) -> usize {
        self.oc1
    }
    pub const fn oc0(&self) -> usize {
        self.oc0
    }
    pub const fn ic1(&self) -> usize {
        self.ic1
    }
    pub const fn ic0(&self) -> usize {
        self.ic0
    }
    pub const fn fy(&self) -> usize {
        self.fy
    }
    pub const fn fx(&self) -> usize {
        self.fx
    }
    pub const fn stride(&self) -> usize {
        self.stride
    }
}

impl TilingConfig {
    /// Output rows
    pub const fn oy(&self) -> usize {
        self.oy1 * self.oy0
    }

    /// Output columns
    pub const fn ox(&self) -> usize {
        self.ox1 * self.ox0
    }

    /// Output channels
    pub const fn oc(&self) -> usize {
        self.oc1 * self.oc0
    }

    /// Input channels
    pub const fn ic(&self) -> usize {
        self.ic1 * self.ic0
    }

    /// Input rows of one tile's receptive field, halo included
    pub const fn tile_iy(&self) -> usize {
        self.stride * (self.oy0 - 1) + self.fy
    }

    /// Input columns of one tile's receptive field, halo included
    pub const fn tile_ix(&self) -> usize {
        self.stride * (self.ox0 - 1) + self.fx
    }

    /// Check ifmap extents, including the receptive-field covering condition
    ///
    /// # Errors
    ///
    /// Returns [`TileError::ShapeMismatch`] if the extents differ.
    pub fn check_ifmap<T: Element>(&self, ifmap: &Tensor<T, 3>) -> Result<()> {
        self.shape().check_ifmap(ifmap)
    }

    /// Check weight extents
    ///
    /// # Errors
    ///
    /// Returns [`TileError::ShapeMismatch`] if the extents differ.
    pub fn check_weights<T: Element>(&self, weights: &Tensor<T, 4>) -> Result<()> {
        self.shape().check_weights(weights)
    }

    /// Check ofmap extents
    ///
    /// # Errors
    ///
    /// Returns [`TileError::ShapeMismatch`] if the extents differ.
    pub fn check_ofmap<T: Element>(&self, ofmap: &Tensor<T, 3>) -> Result<()> {
        self.shape().check_ofmap(ofmap)
    }

    fn validate_products(&self) -> Result<()> {
        let product = |name: &str, a: usize, b: usize| {
            a.checked_mul(b)
                .ok_or_else(|| TileError::invalid_config(format!("{name} = {a} * {b} overflows")))
        };
        let oy = product("OY", self.oy1, self.oy0)?;
        let ox = product("OX", self.ox1, self.ox0)?;
        product("OC", self.oc1, self.oc0)?;
        product("IC", self.ic1, self.ic0)?;
        receptive_extent(oy, self.stride, self.fy, "IY")?;
        receptive_extent(ox, self.stride, self.fx, "IX")?;
        Ok(())
    }
}

impl TryFrom<LayerParams> for TilingConfig {
    type Error = TileError;

    fn try_from(params: LayerParams) -> Result<Self> {
        Self::new(params)
    }
}

impl From<TilingConfig> for LayerParams {
    fn from(cfg: TilingConfig) -> Self {
        cfg.params()
    }
}

impl fmt::Display for TilingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OY={}x{} OX={}x{} OC={}x{} IC={}x{} F={}x{} S={}",
            self.oy1,
            self.oy0,
            self.ox1,
            self.ox0,
            self.oc1,
            self.oc0,
            self.ic1,
            self.ic0,
            self.fy,
            self.fx,
            self.stride
        )
    }
}

fn receptive_extent(out: usize, stride: usize, filter: usize, name: &str) -> Result<usize> {
    (out - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(filter))
        .ok_or_else(|| TileError::invalid_config(format!("{name} extent overflows")))
}

fn check_extents(operand: &'static str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(TileError::shape_mismatch(operand, expected, actual))
    }
}
