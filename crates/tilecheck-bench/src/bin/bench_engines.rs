//! bench_engines: direct vs tiled convolution wall-clock
//!
//! Times both software engines, the traced tiled engine and the stream codec
//! on zoo presets. Every timed run is also checked for equivalence, so a fast
//! but wrong engine cannot report a number.
//!
//! Usage:
//!   cargo run --release --bin bench_engines                      # presets under 200M MACs
//!   cargo run --release --bin bench_engines -- --layer resnet_conv1
//!   cargo run --release --bin bench_engines -- --iters 5

use anyhow::{bail, Result};
use std::io::sink;
use std::time::{Duration, Instant};
use tilecheck_model::harness::{LayerData, DEFAULT_VALUE_RANGE};
use tilecheck_model::{
    ConvEngine, DirectEngine, EquivalenceChecker, Ofmap, StreamCodec, TiledEngine, TilingConfig,
    TraceWriter, ZooLayer,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_MAC_LIMIT: u64 = 200_000_000;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let iters = arg_value(&args, "--iters")
        .map(str::parse::<u32>)
        .transpose()?
        .unwrap_or(3)
        .max(1);
    let layers: Vec<ZooLayer> = match arg_value(&args, "--layer") {
        Some(name) => vec![ZooLayer::from_name(name)?],
        None => ZooLayer::all()
            .iter()
            .copied()
            .filter(|l| l.config().is_ok_and(|c| c.shape().macs() <= DEFAULT_MAC_LIMIT))
            .collect(),
    };

    println!("── Engine Throughput ─────────────────────────────────────────────────");
    println!("  {iters} iteration(s) per measurement, best time reported");
    println!();
    println!(
        "  {:22} {:>12}  {:>12}  {:>12}  {:>12}  {:>10}",
        "Layer", "direct MAC/s", "tiled MAC/s", "traced MAC/s", "encode MB/s", "tiled/dir"
    );
    println!("  {}", "─".repeat(92));

    for layer in layers {
        let cfg = layer.config()?;
        let data = LayerData::random(&cfg, 1, DEFAULT_VALUE_RANGE)?;
        let macs = cfg.shape().macs() as f64;

        let (t_direct, golden) = best_of(iters, || {
            DirectEngine::new().convolve(&cfg, &data.ifmap, &data.weights)
        })?;
        let (t_tiled, tiled) = best_of(iters, || {
            TiledEngine::new().convolve(&cfg, &data.ifmap, &data.weights)
        })?;
        let (t_traced, traced) = best_of(iters, || {
            let mut trace = TraceWriter::new(sink());
            TiledEngine::new().convolve_traced(&cfg, &data.ifmap, &data.weights, &mut trace)
        })?;
        check(&cfg, &golden, &tiled)?;
        check(&cfg, &golden, &traced)?;

        let codec = StreamCodec::new(cfg);
        let mut bytes = 0usize;
        let (t_encode, ()) = best_of(iters, || {
            bytes = codec.encode_ifmap(&data.ifmap)?.len()
                + codec.encode_weights(&data.weights)?.len()
                + codec.encode_ofmap(&golden)?.len();
            Ok(())
        })?;

        let rate = |t: Duration| macs / t.as_secs_f64();
        println!(
            "  {:22} {:>12.3e}  {:>12.3e}  {:>12.3e}  {:>12.1}  {:>9.2}×",
            layer.name(),
            rate(t_direct),
            rate(t_tiled),
            rate(t_traced),
            bytes as f64 / 1e6 / t_encode.as_secs_f64(),
            t_direct.as_secs_f64() / t_tiled.as_secs_f64()
        );
    }
    println!();
    Ok(())
}

fn best_of<T>(
    iters: u32,
    mut f: impl FnMut() -> tilecheck_model::Result<T>,
) -> Result<(Duration, T)> {
    let mut best = Duration::MAX;
    let mut last = None;
    for _ in 0..iters {
        let t0 = Instant::now();
        let out = f()?;
        best = best.min(t0.elapsed());
        last = Some(out);
    }
    match last {
        Some(out) => Ok((best, out)),
        None => bail!("no iterations run"),
    }
}

fn check(cfg: &TilingConfig, expected: &Ofmap, actual: &Ofmap) -> Result<()> {
    let report = EquivalenceChecker::new().compare(expected, actual)?;
    if !report.is_pass() {
        bail!("{cfg}: engines disagree\n{report}");
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
