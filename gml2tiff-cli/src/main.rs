use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

use gml2tiff::BatchConverter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source directory containing GML elevation documents
    #[arg(short, long, value_name = "DIR", default_value = "gmls")]
    source: PathBuf,

    /// Output directory for GeoTIFF files
    #[arg(short, long, value_name = "DIR", default_value = "out")]
    output: PathBuf,

    /// List discovered source files without converting
    #[arg(short, long)]
    list: bool,

    /// Search the source directory recursively
    #[arg(short, long)]
    recursive: bool,

    /// Combine outputs into a mosaic (not yet implemented)
    #[arg(short, long)]
    combine: bool,

    /// Worker thread count (default: CPU cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// EPSG code of the output spatial reference
    #[arg(long, default_value_t = 6668)]
    epsg: u32,
}

fn main() -> Result<()> {
    // ログの初期化
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let start_time = std::time::Instant::now();

    let sources = BatchConverter::discover(&args.source, args.recursive)?;

    if args.list {
        for source in &sources {
            println!("{}", source.display());
        }
        return Ok(());
    }

    info!("Found {} source files", sources.len());

    let converter =
        BatchConverter::new(args.epsg).with_workers(args.threads.unwrap_or(0));
    let outcome = converter.run(&sources, &args.output)?;

    info!("Converted {} files", outcome.succeeded.len());
    if !outcome.failed.is_empty() {
        error!("Failed to process {} files:", outcome.failed.len());
        for (source, err) in &outcome.failed {
            error!("  {}: {}", source.display(), err);
        }
    }

    if args.combine {
        warn!("--combine is not implemented yet, skipping mosaic step");
    }

    info!("Total processing time: {:?}", start_time.elapsed());

    if !outcome.failed.is_empty() {
        anyhow::bail!("{} files failed to process", outcome.failed.len());
    }
    Ok(())
}
