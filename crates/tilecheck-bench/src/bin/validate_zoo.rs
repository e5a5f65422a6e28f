// SPDX-License-Identifier: AGPL-3.0-only

//! Zoo Validation Suite
//!
//! Runs every preset layer through both software engines and the stream
//! codec, the same checks the hardware testbench relies on.
//!
//! ## Checks per layer
//!
//! | Check | Claim |
//! |-------|-------|
//! | Equivalence | tiled ofmap identical to direct ofmap |
//! | Streams | weight stream decodes to the original tensor; ifmap too when every position is streamed |
//! | Token counts | each stream carries exactly its layout's token count |
//!
//! ## Usage
//!
//!   cargo run --release --bin validate_zoo              # every preset
//!   cargo run --release --bin validate_zoo -- --quick   # presets under 50M MACs
//!   cargo run --release --bin validate_zoo -- --verbose # show detail for each check

use anyhow::Result;
use std::time::Instant;
use tilecheck_model::harness::{verify_layer, LayerData, DEFAULT_VALUE_RANGE};
use tilecheck_model::stream::ifmap_fully_streamed;
use tilecheck_model::{
    DirectEngine, StreamCodec, StreamKind, TiledEngine, TilingConfig, ZooLayer,
};
use tracing_subscriber::EnvFilter;

const QUICK_MAC_LIMIT: u64 = 50_000_000;
const SEED: u64 = 0x5EED;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let quick = args.iter().any(|a| a == "--quick");
    let verbose = args.iter().any(|a| a == "--verbose");

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  tilecheck Zoo Validation Suite                              ║");
    println!("║  direct vs tiled, stream codec, token counts                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    if quick {
        println!("Mode: quick (layers above {QUICK_MAC_LIMIT} MACs marked [SKIP])");
        println!();
    }

    let mut suite = ValidationSuite::new(verbose);

    for layer in ZooLayer::all() {
        let cfg = match layer.config() {
            Ok(cfg) => cfg,
            Err(e) => {
                suite.run(&format!("{layer}: config"), |_| Err(e.into()));
                continue;
            }
        };
        let macs = cfg.shape().macs();
        println!("── {layer} ({cfg}, {macs} MACs)");

        if quick && macs > QUICK_MAC_LIMIT {
            suite.run(&format!("{layer}: equivalence"), |_| {
                Ok(ValidationResult {
                    passed: false,
                    message: format!("SKIP {macs} MACs above quick limit"),
                })
            });
            continue;
        }

        let data = LayerData::random(&cfg, SEED, DEFAULT_VALUE_RANGE)?;
        suite.run(&format!("{layer}: equivalence"), |_| check_equivalence(&cfg, &data));
        suite.run(&format!("{layer}: stream round trip"), |_| check_streams(&cfg, &data));
        suite.run(&format!("{layer}: token counts"), |_| check_token_counts(&cfg, &data));
    }

    println!();
    suite.finish();
    Ok(())
}

fn check_equivalence(cfg: &TilingConfig, data: &LayerData) -> Result<ValidationResult> {
    let t0 = Instant::now();
    let verdict = verify_layer(
        cfg,
        &data.ifmap,
        &data.weights,
        &DirectEngine::new(),
        &TiledEngine::new(),
    )?;
    let elapsed = t0.elapsed();
    Ok(ValidationResult {
        passed: verdict.is_pass(),
        message: format!("{} ({:.2} s for both engines)", verdict.report, elapsed.as_secs_f64()),
    })
}

fn check_streams(cfg: &TilingConfig, data: &LayerData) -> Result<ValidationResult> {
    let codec = StreamCodec::new(*cfg);
    let weights = codec.encode_weights(&data.weights)?;
    let weights_ok = codec.decode_weights(std::str::from_utf8(&weights)?)? == data.weights;

    let ifmap = codec.encode_ifmap(&data.ifmap)?;
    let decoded = codec.decode_ifmap(std::str::from_utf8(&ifmap)?)?;
    let full = ifmap_fully_streamed(cfg);
    let ifmap_ok = !full || decoded == data.ifmap;

    Ok(ValidationResult {
        passed: weights_ok && ifmap_ok,
        message: format!(
            "weights {}, ifmap {}",
            if weights_ok { "exact" } else { "MISMATCH" },
            match (full, ifmap_ok) {
                (false, _) => "partially streamed (stride > filter)",
                (true, true) => "exact",
                (true, false) => "MISMATCH",
            }
        ),
    })
}

fn check_token_counts(cfg: &TilingConfig, data: &LayerData) -> Result<ValidationResult> {
    let codec = StreamCodec::new(*cfg);
    let ifmap = count_lines(&codec.encode_ifmap(&data.ifmap)?);
    let weights = count_lines(&codec.encode_weights(&data.weights)?);
    let expected = [
        StreamKind::Ifmap.token_count(cfg),
        StreamKind::Weights.token_count(cfg),
    ];
    Ok(ValidationResult {
        passed: [ifmap, weights] == expected,
        message: format!(
            "ifmap {ifmap}/{} weights {weights}/{}",
            expected[0], expected[1]
        ),
    })
}

fn count_lines(bytes: &[u8]) -> u64 {
    bytes.iter().filter(|&&b| b == b'\n').count() as u64
}

// ─── Suite ────────────────────────────────────────────────────────────────────

struct ValidationResult {
    passed: bool,
    message: String,
}

struct ValidationSuite {
    verbose: bool,
    passed: usize,
    failed: usize,
    skipped: usize,
}

impl ValidationSuite {
    fn new(verbose: bool) -> Self {
        Self { verbose, passed: 0, failed: 0, skipped: 0 }
    }

    fn run<F>(&mut self, name: &str, f: F)
    where
        F: FnOnce(&Self) -> Result<ValidationResult>,
    {
        print!("  {name:<44} ");
        match f(self) {
            Ok(ValidationResult { passed: true, message }) => {
                println!("✓ PASS");
                if self.verbose {
                    println!("         {message}");
                }
                self.passed += 1;
            }
            Ok(ValidationResult { passed: false, message }) => {
                if message.starts_with("SKIP") {
                    println!("─ SKIP");
                    if self.verbose {
                        println!("         {message}");
                    }
                    self.skipped += 1;
                } else {
                    println!("✗ FAIL");
                    println!("         {message}");
                    self.failed += 1;
                }
            }
            Err(e) => {
                println!("✗ ERROR");
                println!("         {e}");
                self.failed += 1;
            }
        }
    }

    fn finish(&self) {
        let total = self.passed + self.failed + self.skipped;
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!(
            "Result: {} passed, {} failed, {} skipped  ({}/{})",
            self.passed, self.failed, self.skipped, self.passed, total
        );
        if self.failed == 0 {
            println!("All checks passed ✓");
        } else {
            println!("VALIDATION FAILED: {} check(s) require attention", self.failed);
            std::process::exit(1);
        }
    }
}
