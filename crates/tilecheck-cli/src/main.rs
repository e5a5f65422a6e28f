//! `tilecheck`: co-verification driver for the tiled convolution accelerator.
//!
//! ```text
//! USAGE:
//!   tilecheck run --preset small [--out DIR] [--trace]   Model a layer, compare engines, dump streams
//!   tilecheck compare --preset small --dir DIR           Check a captured ofmap stream against the model
//!   tilecheck encode --layer layer.json --out DIR        Write input and golden output streams only
//!   tilecheck params --preset resnet_conv1 --out DIR     Write conv_tb_params.h and layer_params.v
//!   tilecheck zoo                                        List layer presets
//! ```
//!
//! Exit status is 1 when a comparison fails.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tilecheck_model::harness::{LayerData, StreamArtifacts};
use tilecheck_model::stream::ifmap_fully_streamed;
use tilecheck_model::{
    params, ConvEngine, DirectEngine, EquivalenceChecker, EquivalenceReport, StreamCodec,
    StreamKind, TiledEngine, TilingConfig, TokenFormat, ZooLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tilecheck", about = "Tiled convolution co-verification", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Generate operands, run the direct and tiled engines and compare them.
    Run {
        #[command(flatten)]
        layer: LayerArg,
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        codec: CodecArgs,
        /// Directory for stream files (ifmap_data.txt, weight_data.txt, ofmap_data.txt).
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write a per-MAC trace (mac_data.txt); requires --out.
        #[arg(long, requires = "out")]
        trace: bool,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Compare an ofmap stream (e.g. captured from hardware) against the model.
    ///
    /// The expected output is recomputed from the ifmap and weight streams in
    /// DIR; the candidate is DIR/ofmap_data.txt unless --actual is given.
    Compare {
        #[command(flatten)]
        layer: LayerArg,
        #[command(flatten)]
        codec: CodecArgs,
        /// Directory holding the input streams.
        #[arg(long)]
        dir: PathBuf,
        /// Candidate ofmap stream file.
        #[arg(long)]
        actual: Option<PathBuf>,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Write input streams and the golden ofmap stream without comparing.
    Encode {
        #[command(flatten)]
        layer: LayerArg,
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        codec: CodecArgs,
        /// Output directory.
        #[arg(long)]
        out: PathBuf,
    },
    /// Write testbench parameter files for a layer.
    Params {
        #[command(flatten)]
        layer: LayerArg,
        /// Output directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// List layer presets.
    Zoo,
}

/// Layer selection: a JSON parameter file or a zoo preset.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct LayerArg {
    /// Layer parameter JSON file ({"OY1": 4, "OY0": 3, ...}).
    #[arg(long)]
    layer: Option<PathBuf>,
    /// Zoo preset name (see `tilecheck zoo`).
    #[arg(long)]
    preset: Option<String>,
}

impl LayerArg {
    fn resolve(&self) -> Result<TilingConfig> {
        let cfg = match (&self.layer, &self.preset) {
            (Some(path), _) => TilingConfig::from_json_file(path)
                .with_context(|| format!("loading layer {}", path.display()))?,
            (None, Some(name)) => ZooLayer::from_name(name)?.config()?,
            (None, None) => bail!("either --layer or --preset is required"),
        };
        info!("Layer: {cfg}");
        Ok(cfg)
    }
}

#[derive(Args)]
struct DataArgs {
    /// PRNG seed for operand generation.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Smallest generated operand value.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    min: i16,
    /// One past the largest generated operand value.
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    max: i16,
}

impl DataArgs {
    fn generate(&self, cfg: &TilingConfig) -> Result<LayerData> {
        Ok(LayerData::random(cfg, self.seed, self.min..self.max)?)
    }
}

#[derive(Args)]
struct CodecArgs {
    /// Use interface token widths (8-bit ifmap/weights, 16-bit truncated ofmap).
    #[arg(long)]
    interface: bool,
    /// Override the ofmap token width in bits; out-of-range values are truncated.
    #[arg(long)]
    ofmap_bits: Option<u32>,
}

impl CodecArgs {
    fn codec(&self, cfg: TilingConfig) -> Result<StreamCodec> {
        let mut codec = if self.interface {
            StreamCodec::for_interface(cfg)
        } else {
            StreamCodec::new(cfg)
        };
        if let Some(bits) = self.ofmap_bits {
            codec = codec.with_format(StreamKind::Ofmap, TokenFormat::new(bits)?.truncating());
        }
        Ok(codec)
    }
}

#[derive(Args)]
struct ReportArgs {
    /// Mismatches listed in the report.
    #[arg(long, default_value_t = 16)]
    max_report: usize,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

impl ReportArgs {
    fn print(&self, report: &EquivalenceReport) -> Result<ExitCode> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
        } else {
            println!("{report}");
        }
        Ok(if report.is_pass() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Run {
            layer,
            data,
            codec,
            out,
            trace,
            report,
        } => cmd_run(&layer, &data, &codec, out, trace, &report),
        Cmd::Compare {
            layer,
            codec,
            dir,
            actual,
            report,
        } => cmd_compare(&layer, &codec, dir, actual, &report),
        Cmd::Encode {
            layer,
            data,
            codec,
            out,
        } => cmd_encode(&layer, &data, &codec, out).map(|()| ExitCode::SUCCESS),
        Cmd::Params { layer, out } => cmd_params(&layer, out).map(|()| ExitCode::SUCCESS),
        Cmd::Zoo => {
            cmd_zoo();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_run(
    layer: &LayerArg,
    data_args: &DataArgs,
    codec_args: &CodecArgs,
    out: Option<PathBuf>,
    trace: bool,
    report_args: &ReportArgs,
) -> Result<ExitCode> {
    let cfg = layer.resolve()?;
    let data = data_args.generate(&cfg)?;
    let direct = DirectEngine::new();
    let tiled = TiledEngine::new();
    let golden = direct.convolve(&cfg, &data.ifmap, &data.weights)?;

    let candidate = match out {
        None => tiled.convolve(&cfg, &data.ifmap, &data.weights)?,
        Some(dir) => {
            let artifacts = StreamArtifacts::new(dir, codec_args.codec(cfg)?);
            artifacts.write_inputs(&data)?;
            artifacts.write_ofmap(&golden)?;
            params::write_param_files(&cfg, artifacts.dir())?;
            println!("Streams written to {}", artifacts.dir().display());

            if trace {
                let mut writer = artifacts.create_trace()?;
                let ofmap =
                    tiled.convolve_traced(&cfg, &data.ifmap, &data.weights, &mut writer)?;
                println!(
                    "MAC trace: {} events -> {}",
                    writer.events(),
                    artifacts.trace_path().display()
                );
                ofmap
            } else {
                tiled.convolve(&cfg, &data.ifmap, &data.weights)?
            }
        }
    };

    let report = EquivalenceChecker::new()
        .with_max_recorded(report_args.max_report)
        .compare(&golden, &candidate)?;
    report.log(&format!("{} vs {}", direct.kind(), tiled.kind()));

    println!("{cfg}  ({} MACs)", cfg.shape().macs());
    report_args.print(&report)
}

fn cmd_compare(
    layer: &LayerArg,
    codec_args: &CodecArgs,
    dir: PathBuf,
    actual: Option<PathBuf>,
    report_args: &ReportArgs,
) -> Result<ExitCode> {
    let cfg = layer.resolve()?;
    let codec = codec_args.codec(cfg)?;
    let artifacts = StreamArtifacts::new(dir, codec);
    if !ifmap_fully_streamed(&cfg) {
        println!("note: stride exceeds filter; unstreamed ifmap positions read as zero");
    }
    let data = artifacts
        .read_inputs()
        .with_context(|| format!("reading input streams from {}", artifacts.dir().display()))?;

    // Expected output passes through the same token width as the candidate
    let golden = DirectEngine::new().convolve(&cfg, &data.ifmap, &data.weights)?;
    let expected = codec.decode_ofmap(std::str::from_utf8(&codec.encode_ofmap(&golden)?)?)?;

    let candidate_path = actual.unwrap_or_else(|| artifacts.path(StreamKind::Ofmap));
    let candidate_file = std::fs::File::open(&candidate_path)
        .with_context(|| format!("opening {}", candidate_path.display()))?;
    let candidate = codec
        .read_ofmap(candidate_file)
        .with_context(|| format!("decoding {}", candidate_path.display()))?;

    let report = EquivalenceChecker::new()
        .with_max_recorded(report_args.max_report)
        .compare(&expected, &candidate)?;
    report.log(&candidate_path.display().to_string());
    report_args.print(&report)
}

fn cmd_encode(
    layer: &LayerArg,
    data_args: &DataArgs,
    codec_args: &CodecArgs,
    out: PathBuf,
) -> Result<()> {
    let cfg = layer.resolve()?;
    let data = data_args.generate(&cfg)?;
    let artifacts = StreamArtifacts::new(out, codec_args.codec(cfg)?);
    artifacts.write_inputs(&data)?;
    let golden = DirectEngine::new().convolve(&cfg, &data.ifmap, &data.weights)?;
    artifacts.write_ofmap(&golden)?;

    for kind in StreamKind::ALL {
        println!(
            "{:<8} {:>9} tokens  {}",
            kind.name(),
            kind.token_count(&cfg),
            artifacts.path(kind).display()
        );
    }
    Ok(())
}

fn cmd_params(layer: &LayerArg, out: PathBuf) -> Result<()> {
    let cfg = layer.resolve()?;
    let [header, defines] = params::write_param_files(&cfg, &out)?;
    println!("{}", header.display());
    println!("{}", defines.display());
    Ok(())
}

fn cmd_zoo() {
    println!(
        "{:<22} {:>14} {:>9} {:>7}  Description",
        "Preset", "MACs", "Out", "Stride"
    );
    for layer in ZooLayer::all() {
        let p = layer.params();
        match layer.config() {
            Ok(cfg) => println!(
                "{:<22} {:>14} {:>9} {:>7}  {}",
                layer.name(),
                cfg.shape().macs(),
                format!("{}x{}x{}", cfg.oy(), cfg.ox(), cfg.oc()),
                p.stride,
                layer.description()
            ),
            Err(e) => println!("{:<22} invalid: {e}", layer.name()),
        }
    }
}
