//! PDF Merger CLI - Command line tool for merging and compressing PDF documents.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_merger_core::{AppConfig, InputFile, PdfMerger, util::output_file_name_now};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "pdf-merge")]
#[command(author, version, about = "Merge PDFs and images, optionally under a size limit", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge PDFs and images into one PDF, in the given order
    Merge {
        /// Input files (PDF, JPEG, PNG, WebP, GIF)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Rasterize the merged document to fit under --max-size
        #[arg(long)]
        compress: bool,

        /// Pixel budget for each image input
        #[arg(long, env = "PDF_MERGER_MAX_PIXELS")]
        max_pixels: Option<u64>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Rasterize an existing PDF to fit under --max-size
    Compress {
        /// Input PDF file
        input: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct CommonArgs {
    /// Output PDF file (default: <YYYYMMDD_HHmmss>.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum output size in bytes
    #[arg(long, env = "PDF_MERGER_MAX_SIZE")]
    max_size: Option<u64>,

    /// Lowest JPEG quality to try, in (0, 1]
    #[arg(long, env = "PDF_MERGER_CUT_QUALITY")]
    cut_quality: Option<f32>,

    /// Page render scale used when rasterizing PDF pages
    #[arg(long, env = "PDF_MERGER_SCALE")]
    scale: Option<f32>,

    /// Print a JSON report instead of a summary line
    #[arg(long)]
    json: bool,
}

impl CommonArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(max_size) = self.max_size {
            config.compression.max_size_bytes = max_size;
        }
        if let Some(cut_quality) = self.cut_quality {
            config.compression.cut_quality = cut_quality;
        }
        if let Some(scale) = self.scale {
            config.render_scale = scale;
        }
    }

    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(output_file_name_now()))
    }
}

#[derive(Debug, Serialize)]
struct Report {
    output: PathBuf,
    pages: usize,
    bytes: u64,
    /// JPEG quality of the compressed output; absent for plain merges
    quality: Option<f32>,
}

impl Report {
    #[allow(clippy::print_stdout)]
    fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
        } else {
            let quality = self
                .quality
                .map(|q| format!(" at quality {q:.3}"))
                .unwrap_or_default();
            println!(
                "Saved {} pages ({} bytes{}) to: {}",
                self.pages,
                self.bytes,
                quality,
                self.output.display()
            );
        }
        Ok(())
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn load_inputs(files: &[PathBuf]) -> Result<Vec<InputFile>> {
    files
        .iter()
        .map(|path| {
            let input = InputFile::from_path(path)
                .context(format!("Failed to read input: {}", path.display()))?;
            info!("Input {} ({})", path.display(), input.media_type());
            Ok(input)
        })
        .collect()
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).context(format!("Failed to write output: {}", path.display()))
}

async fn run_merge(
    merger: &PdfMerger,
    files: &[PathBuf],
    compress: bool,
    common: &CommonArgs,
) -> Result<()> {
    let inputs = load_inputs(files)?;
    let total = inputs.len();

    let pb = spinner(&format!("Merging {total} files"));
    let progress_pb = pb.clone();
    let progress = Box::new(move |done: usize, total: usize| {
        progress_pb.set_message(format!("Merged {done}/{total} files"));
    });

    let output_path = common.output_path();
    let report = if compress {
        let compressed = merger
            .merge_and_compress(inputs, Some(progress))
            .await
            .context("Failed to merge and compress")?;
        pb.finish_and_clear();
        write_output(&output_path, &compressed.bytes)?;
        Report {
            output: output_path,
            pages: compressed.page_count,
            bytes: compressed.byte_len(),
            quality: Some(compressed.quality.value()),
        }
    } else {
        let merged = merger
            .merge(inputs, Some(progress))
            .await
            .context("Failed to merge inputs")?;
        pb.finish_and_clear();
        write_output(&output_path, &merged.bytes)?;
        Report {
            output: output_path,
            pages: merged.page_count,
            bytes: merged.bytes.len() as u64,
            quality: None,
        }
    };

    report.print(common.json)
}

fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).context(format!("Failed to read PDF: {}", path.display()))
}

async fn run_compress(merger: &PdfMerger, input: &Path, common: &CommonArgs) -> Result<()> {
    info!("Loading PDF: {}", input.display());
    let bytes = read_pdf(input)?;

    let pb = spinner(&format!("Compressing {}", input.display()));
    let compressed = merger
        .compress_pdf(bytes)
        .await
        .context(format!("Failed to compress {}", input.display()))?;
    pb.finish_and_clear();
    info!("Document has {} pages", compressed.page_count);

    let output_path = common.output_path();
    write_output(&output_path, &compressed.bytes)?;

    Report {
        output: output_path,
        pages: compressed.page_count,
        bytes: compressed.byte_len(),
        quality: Some(compressed.quality.value()),
    }
    .print(common.json)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    let common = match &args.command {
        Command::Merge {
            max_pixels, common, ..
        } => {
            if let Some(max_pixels) = *max_pixels {
                config.raster.max_pixels = max_pixels;
            }
            common
        }
        Command::Compress { common, .. } => common,
    };
    common.apply(&mut config);

    let merger = PdfMerger::new(config).context("Invalid configuration")?;

    let result = match &args.command {
        Command::Merge {
            files,
            compress,
            common,
            ..
        } => run_merge(&merger, files, *compress, common).await,
        Command::Compress { input, common } => run_compress(&merger, input, common).await,
    };

    if let Err(err) = &result
        && err
            .downcast_ref::<pdf_merger_core::Error>()
            .is_some_and(pdf_merger_core::Error::is_size_constraint)
    {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("hint: raise --max-size or lower --cut-quality");
        }
    }

    result
}
