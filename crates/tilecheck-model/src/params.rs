//! Testbench parameter files
//!
//! The hardware testbench and the C golden model take the layer parameters as
//! compile-time constants. Both files list the eleven parameters in the same
//! fixed order (see [`LayerParams::named`]).

use crate::config::{LayerParams, TilingConfig};
use crate::error::Result;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// C header file name
pub const C_HEADER_FILE: &str = "conv_tb_params.h";

/// Verilog include file name
pub const VERILOG_DEFINES_FILE: &str = "layer_params.v";

/// `const int NAME = value;` per parameter
pub fn render_c_header(cfg: &TilingConfig) -> String {
    render(&cfg.params(), |out, name, value| {
        writeln!(out, "const int {name} = {value};")
    })
}

/// `` `define NAME value`` per parameter
pub fn render_verilog_defines(cfg: &TilingConfig) -> String {
    render(&cfg.params(), |out, name, value| {
        writeln!(out, "`define {name} {value}")
    })
}

/// Layer parameters as pretty-printed JSON (upper-case keys)
///
/// # Errors
///
/// Returns error if serialization fails.
pub fn render_json(cfg: &TilingConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(cfg)?)
}

/// Write both parameter files into `dir`, returning their paths
///
/// # Errors
///
/// Returns error if the directory or a file cannot be written.
pub fn write_param_files(cfg: &TilingConfig, dir: impl AsRef<Path>) -> Result<[PathBuf; 2]> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let header = dir.join(C_HEADER_FILE);
    let defines = dir.join(VERILOG_DEFINES_FILE);
    fs::write(&header, render_c_header(cfg))?;
    fs::write(&defines, render_verilog_defines(cfg))?;
    info!("Wrote {} and {}", header.display(), defines.display());
    Ok([header, defines])
}

fn render(
    params: &LayerParams,
    line: impl Fn(&mut String, &str, i64) -> std::fmt::Result,
) -> String {
    let mut out = String::new();
    for (name, value) in params.named() {
        // Writing into a String cannot fail
        let _ = line(&mut out, name, value);
    }
    out
}
