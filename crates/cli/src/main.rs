//! unredact - Remove overlay redactions from PDF files
//!
//! Writes a copy of each input with every opaque box, image or annotation
//! that merely hides text removed. The text underneath was never deleted
//! from the file; this makes it visible again.

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use memmap2::Mmap;
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use unredact_core::{PdfError, UnredactOptions, UnredactReport, Unredactor, unredact_with_report};

/// Exit status for an input that does not exist.
const EXIT_MISSING_INPUT: u8 = 2;

/// Remove overlay redactions (black boxes, cover images, redaction
/// annotations) that hide text without deleting it.
#[derive(Parser, Debug)]
#[command(name = "unredact")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// One or more paths to PDF files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output path (single input only). Default: <input>_unredacted.pdf
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Print the removal report as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Most indirect objects a document may contain
    #[arg(long = "max-objects")]
    max_objects: Option<usize>,

    /// Largest decoded stream, in bytes
    #[arg(long = "max-stream-bytes")]
    max_stream_bytes: Option<usize>,

    /// Most content operators replayed per page
    #[arg(long = "max-operators")]
    max_operators: Option<usize>,

    /// Slack around an overlay when testing whether it covers a glyph
    #[arg(long)]
    tolerance: Option<f64>,

    /// Rebuild a broken cross-reference index by scanning the file
    #[arg(long = "recover-xref", action = ArgAction::SetTrue)]
    recover_xref: bool,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,
}

impl Args {
    fn options(&self) -> UnredactOptions {
        let mut builder = Unredactor::new().recover_xref(self.recover_xref);
        if let Some(max) = self.max_objects {
            builder = builder.max_objects(max);
        }
        if let Some(max) = self.max_stream_bytes {
            builder = builder.max_content_stream_bytes(max);
        }
        if let Some(max) = self.max_operators {
            builder = builder.max_operators(max);
        }
        if let Some(margin) = self.tolerance {
            builder = builder.tolerance_margin(margin);
        }
        builder.build()
    }
}

/// One processed file, as printed with `--json`.
#[derive(Serialize)]
struct FileSummary<'a> {
    input: &'a Path,
    output: &'a Path,
    #[serde(flatten)]
    report: &'a UnredactReport,
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

/// `dir/name.pdf` becomes `dir/name_unredacted.pdf`.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().map_or_else(
        || "output".to_string(),
        |s| s.to_string_lossy().into_owned(),
    );
    input.with_file_name(format!("{stem}_unredacted.pdf"))
}

fn process_file(path: &Path, output: &Path, options: &UnredactOptions) -> Result<UnredactReport> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    // SAFETY: the map is read-only and dropped before this function returns.
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("failed to map {}", path.display()))?;
    let (bytes, report) = unredact_with_report(&mmap, options)?;
    std::fs::write(output, bytes).with_context(|| format!("failed to write {}", output.display()))?;
    Ok(report)
}

/// User-facing text for a failure: the category for PDF errors, the
/// context chain otherwise.
fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<PdfError>() {
        Some(pdf) => pdf.user_message(),
        None => format!("{err:#}"),
    }
}

fn report_line(args: &Args, input: &Path, output: &Path, report: &UnredactReport) -> Result<String> {
    if args.json {
        let summary = FileSummary { input, output, report };
        return Ok(serde_json::to_string(&summary)?);
    }
    Ok(format!(
        "Removed {} redaction annotations and {} rectangle ops -> {}",
        report.annotations_removed,
        report.content_ranges_removed,
        output.display()
    ))
}

fn run(args: &Args) -> Result<bool> {
    if args.output.is_some() && args.files.len() > 1 {
        bail!("--output can only be used with a single input file");
    }
    let options = args.options();

    let results: Vec<(PathBuf, Result<UnredactReport>)> = args
        .files
        .par_iter()
        .map(|path| {
            let output = args.output.clone().unwrap_or_else(|| default_output_path(path));
            let result = process_file(path, &output, &options);
            (output, result)
        })
        .collect();

    let mut ok = true;
    for (input, (output, result)) in args.files.iter().zip(results) {
        match result {
            Ok(report) => println!("{}", report_line(args, input, &output, &report)?),
            Err(err) => {
                debug!(input = %input.display(), error = ?err, "processing failed");
                eprintln!("Error processing {}: {}", input.display(), describe(&err));
                ok = false;
            }
        }
    }
    Ok(ok)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    if let Some(missing) = args.files.iter().find(|p| !p.is_file()) {
        eprintln!("Error: File not found: {}", missing.display());
        return ExitCode::from(EXIT_MISSING_INPUT);
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
