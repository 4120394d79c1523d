use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use xxhash_rust::xxh3::xxh3_64;

use dtx_codecs::default_registry;
use dtx_core::syntax;
use dtx_core::{tag, CodecParams, Dataset, DicomFile, PixelData, TransferSyntax, Transcoder};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "dtx",
    about = "Transcode DICOM datasets between transfer syntaxes and inspect the result",
    version
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcode a dataset file into another transfer syntax
    Transcode {
        /// Source dataset (JSON)
        input: PathBuf,
        /// Destination dataset (JSON)
        output: PathBuf,
        /// Target syntax: a UID or an alias (explicit-le, rle, jpeg-baseline, …)
        #[arg(short, long)]
        to: String,
        /// Parameter for the decoding codec, as key=value (repeatable)
        #[arg(long = "input-param", value_name = "KEY=VALUE")]
        input_params: Vec<String>,
        /// Parameter for the encoding codec, as key=value (repeatable)
        #[arg(long = "output-param", value_name = "KEY=VALUE")]
        output_params: Vec<String>,
        /// JSON file with {"input": {..}, "output": {..}} codec parameters
        #[arg(long)]
        params: Option<PathBuf>,
    },
    /// Print file meta, pixel module and lossy compression history
    Inspect {
        /// Dataset file (JSON)
        file: PathBuf,
        /// Print per-frame sizes and fingerprints
        #[arg(long)]
        frames: bool,
    },
    /// List the known transfer syntaxes and whether a codec is available
    Syntaxes,
    /// List the bundled codecs
    Codecs,
}

/// Codec parameters loaded from `--params`.
#[derive(Debug, Default, Deserialize)]
struct ParamsFile {
    #[serde(default)]
    input: Option<CodecParams>,
    #[serde(default)]
    output: Option<CodecParams>,
}

// ── Helpers ────────────────────────────────────────────────────────────────

const SYNTAX_ALIASES: &[(&str, &TransferSyntax)] = &[
    ("implicit-le", &syntax::IMPLICIT_VR_LITTLE_ENDIAN),
    ("explicit-le", &syntax::EXPLICIT_VR_LITTLE_ENDIAN),
    ("deflated-le", &syntax::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN),
    ("explicit-be", &syntax::EXPLICIT_VR_BIG_ENDIAN),
    ("jpeg-baseline", &syntax::JPEG_BASELINE),
    ("jpeg-extended", &syntax::JPEG_EXTENDED),
    ("jpeg-lossless", &syntax::JPEG_LOSSLESS),
    ("jpeg-lossless-sv1", &syntax::JPEG_LOSSLESS_SV1),
    ("jpeg-ls", &syntax::JPEG_LS_LOSSLESS),
    ("jpeg-ls-near", &syntax::JPEG_LS_NEAR_LOSSLESS),
    ("j2k-lossless", &syntax::JPEG_2000_LOSSLESS),
    ("j2k", &syntax::JPEG_2000),
    ("rle", &syntax::RLE_LOSSLESS),
];

fn syntax_from_arg(arg: &str) -> anyhow::Result<TransferSyntax> {
    let lower = arg.to_ascii_lowercase();
    if let Some((_, ts)) = SYNTAX_ALIASES.iter().find(|(alias, _)| *alias == lower) {
        return Ok((*ts).clone());
    }
    TransferSyntax::from_uid(arg).cloned().ok_or_else(|| {
        let aliases: Vec<&str> = SYNTAX_ALIASES.iter().map(|(a, _)| *a).collect();
        anyhow::anyhow!(
            "unknown transfer syntax '{}'. Use a UID or one of: {}",
            arg,
            aliases.join(", ")
        )
    })
}

fn parse_params(pairs: &[String]) -> anyhow::Result<CodecParams> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| anyhow::anyhow!("codec parameter '{}' is not KEY=VALUE", pair))
        })
        .collect()
}

/// File params first, then command-line pairs on top.
fn merge_params(base: Option<CodecParams>, pairs: &[String]) -> anyhow::Result<Option<CodecParams>> {
    let overrides = parse_params(pairs)?;
    match base {
        None if overrides.is_empty() => Ok(None),
        None => Ok(Some(overrides)),
        Some(mut params) => {
            for (k, v) in overrides.iter() {
                params.set(k, v);
            }
            Ok(Some(params))
        }
    }
}

fn load_file(path: &Path) -> anyhow::Result<DicomFile> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("opening dataset file {:?}", path))?,
    );
    let file: DicomFile =
        serde_json::from_reader(reader).with_context(|| format!("parsing dataset file {:?}", path))?;
    if file.meta.transfer_syntax != *file.dataset.transfer_syntax() {
        anyhow::bail!(
            "{:?}: file meta declares {} but the dataset is {}",
            path,
            file.meta.transfer_syntax,
            file.dataset.transfer_syntax()
        );
    }
    Ok(file)
}

fn save_file(path: &Path, file: &DicomFile) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(
        File::create(path).with_context(|| format!("creating output file {:?}", path))?,
    );
    serde_json::to_writer(&mut writer, file)?;
    writer.flush()?;
    Ok(())
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn pixel_bytes(dataset: &Dataset) -> anyhow::Result<u64> {
    let pixels = PixelData::from_dataset(dataset)?;
    Ok(pixels.frames().map(|f| f.len() as u64).sum())
}

fn print_lossy_history(dataset: &Dataset) {
    match dataset.get_string(tag::LOSSY_IMAGE_COMPRESSION) {
        Some(flag) => {
            let methods = dataset
                .get_strings(tag::LOSSY_IMAGE_COMPRESSION_METHOD)
                .map(|m| m.join("\\"))
                .unwrap_or_default();
            let ratio = dataset.get_string(tag::LOSSY_IMAGE_COMPRESSION_RATIO).unwrap_or("-");
            println!("  lossy          : {} (methods: {}, ratio: {})", flag, methods, ratio);
        }
        None => println!("  lossy          : no"),
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_transcode(
    input: &Path,
    output: &Path,
    to: &str,
    input_pairs: &[String],
    output_pairs: &[String],
    params_path: Option<&Path>,
) -> anyhow::Result<()> {
    let target = syntax_from_arg(to)?;
    let params_file = match params_path {
        Some(path) => {
            let reader = BufReader::new(
                File::open(path).with_context(|| format!("opening params file {:?}", path))?,
            );
            serde_json::from_reader::<_, ParamsFile>(reader)
                .with_context(|| format!("parsing params file {:?}", path))?
        }
        None => ParamsFile::default(),
    };

    let file = load_file(input)?;
    let source = file.dataset.transfer_syntax().clone();

    let mut transcoder = Transcoder::new(Arc::new(default_registry()), source.clone(), target.clone());
    if let Some(params) = merge_params(params_file.input, input_pairs)? {
        transcoder.set_input_params(params);
    }
    if let Some(params) = merge_params(params_file.output, output_pairs)? {
        transcoder.set_output_params(params);
    }

    tracing::info!(from = %source, to = %target, input = ?input, "transcoding");
    let t0 = Instant::now();
    let result = transcoder
        .transcode_file(&file)
        .with_context(|| format!("transcoding {:?} to {}", input, target))?;
    let elapsed = t0.elapsed();

    save_file(output, &result)?;

    let before = pixel_bytes(&file.dataset)?;
    let after = pixel_bytes(&result.dataset)?;
    eprintln!("  from        : {}", source);
    eprintln!("  to          : {}", target);
    eprintln!("  pixel data  : {} -> {}", human_bytes(before), human_bytes(after));
    if let Some(ratio) = result.dataset.get_string(tag::LOSSY_IMAGE_COMPRESSION_RATIO) {
        eprintln!("  lossy ratio : {}", ratio);
    }
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(path: &Path, show_frames: bool) -> anyhow::Result<()> {
    let file = load_file(path)?;
    let dataset = &file.dataset;
    let pixels = PixelData::from_dataset(dataset)?;

    println!("=== Dataset: {:?} ===", path);
    println!();
    println!("  transfer syntax: {}", file.meta.transfer_syntax);
    println!("  sop class      : {}", file.meta.media_storage_sop_class_uid);
    println!("  sop instance   : {}", file.meta.media_storage_sop_instance_uid);
    println!("  elements       : {}", dataset.len());
    println!(
        "  image          : {}x{}, {} sample(s), {} bits allocated, {} stored",
        pixels.columns(),
        pixels.rows(),
        pixels.samples_per_pixel(),
        pixels.bits_allocated(),
        pixels.bits_stored()
    );
    println!("  photometric    : {}", pixels.photometric_interpretation());
    println!("  frames         : {}", pixels.number_of_frames());
    println!(
        "  pixel data     : {}",
        human_bytes(pixels.frames().map(|f| f.len() as u64).sum())
    );
    print_lossy_history(dataset);

    if show_frames {
        println!();
        println!("  {:>8}  {:>12}  {:>16}", "frame", "size", "xxh3");
        println!("  {}", "-".repeat(40));
        for (i, frame) in pixels.frames().enumerate() {
            println!(
                "  {:>8}  {:>12}  {:016x}",
                i,
                human_bytes(frame.len() as u64),
                xxh3_64(frame)
            );
        }
    }
    Ok(())
}

fn run_syntaxes() -> anyhow::Result<()> {
    let registry = default_registry();
    println!(
        "  {:<24}  {:<52}  {:>5}  {:>5}  {:>5}",
        "uid", "name", "encap", "lossy", "codec"
    );
    println!("  {}", "-".repeat(99));
    for ts in TransferSyntax::all() {
        let available = !ts.is_encapsulated() || registry.contains(ts);
        println!(
            "  {:<24}  {:<52}  {:>5}  {:>5}  {:>5}",
            ts.uid(),
            ts.name(),
            if ts.is_encapsulated() { "yes" } else { "no" },
            if ts.is_lossy() { "yes" } else { "no" },
            if available { "yes" } else { "-" }
        );
    }
    Ok(())
}

fn run_codecs() -> anyhow::Result<()> {
    let registry = default_registry();
    for ts in registry.syntaxes() {
        let codec = registry.lookup(&ts)?;
        println!("  {:<16}  {}", codec.name(), ts);
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Transcode {
            input,
            output,
            to,
            input_params,
            output_params,
            params,
        } => run_transcode(
            &input,
            &output,
            &to,
            &input_params,
            &output_params,
            params.as_deref(),
        ),
        Commands::Inspect { file, frames } => run_inspect(&file, frames),
        Commands::Syntaxes => run_syntaxes(),
        Commands::Codecs => run_codecs(),
    }
}
