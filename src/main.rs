//! treesum - Resumable CRC-32 manifests for large file trees.
//!
//! Usage:
//!   treesum [ROOT]                       Write the manifest to stdout
//!   treesum [ROOT] -o manifest.csv       Write the manifest to a file
//!   treesum [ROOT] -r path/to/last/file  Resume an interrupted run
//!   treesum --help                       Show help

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tracing::info;

use treesum_scan::{
    DEFAULT_BLOCK_SIZE, FaultSink, LogSink, TreeWalker, WalkConfig, WalkFault, WalkStats,
    WriterSink,
};

#[derive(Parser)]
#[command(
    name = "treesum",
    version,
    about = "Resumable CRC-32 manifests for large file trees",
    long_about = "treesum lists every regular file under ROOT with its size and CRC-32 \
                  checksum, one `path,size,checksum` line per file.\n\n\
                  An interrupted run can be resumed with `--resume`, passing the last \
                  file or directory the previous manifest covers."
)]
struct Cli {
    /// Directory to inventory
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Write the manifest to this file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write per-file errors to this file (defaults to the log on stderr)
    #[arg(short, long)]
    error: Option<PathBuf>,

    /// Flush the manifest every N MiB of processed data
    #[arg(short, long, value_name = "MB", default_value = "2048")]
    flush: u64,

    /// Resume after this file or directory (relative to ROOT or absolute)
    #[arg(short, long, value_name = "PATH")]
    resume: Option<PathBuf>,

    /// Visit directory entries in name order
    #[arg(long)]
    sort: bool,

    /// Follow symbolic links to directories
    #[arg(long)]
    follow_symlinks: bool,

    /// Checksum block size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TREESUM_LOG", default_value = "warn")]
    log: String,

    /// Log format
    #[arg(long, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Where per-file faults end up.
enum ErrorOutput {
    Log(LogSink),
    File(WriterSink<File>),
}

impl FaultSink for ErrorOutput {
    fn report(&mut self, fault: &WalkFault) {
        match self {
            ErrorOutput::Log(sink) => sink.report(fault),
            ErrorOutput::File(sink) => sink.report(fault),
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(&cli.log, cli.log_format);

    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let config = WalkConfig::builder()
        .root(&cli.root)
        .block_size(cli.block_size)
        .follow_symlinks(cli.follow_symlinks)
        .sort_entries(cli.sort)
        .build()
        .context("Invalid configuration")?;

    let sink = match &cli.error {
        Some(path) => ErrorOutput::File(WriterSink::new(
            File::create(path)
                .with_context(|| format!("Cannot create error log {}", path.display()))?,
        )),
        None => ErrorOutput::Log(LogSink),
    };

    let mut walker = TreeWalker::with_sink(config, sink).context("Invalid root")?;
    let mut output = open_output(cli.output.as_deref())?;

    let start = Instant::now();
    let mut walk = walker
        .walk(cli.resume.as_deref())
        .context("Cannot resume walk")?;
    info!(root = %walk.root().display(), "walk started");

    writeln!(output, "ROOT: {}", walk.root().display())?;

    let flush_every = cli.flush.saturating_mul(1 << 20);
    let mut last_flush = 0;
    while let Some(record) = walk.next() {
        writeln!(output, "{record}")?;

        let processed = walk.stats().processed_bytes;
        if processed - last_flush >= flush_every {
            output.flush()?;
            last_flush = processed;
        }
    }
    drop(walk);
    output.flush().context("Cannot write manifest")?;

    print_summary(walker.stats(), start.elapsed());

    Ok(())
}

/// Open the manifest destination.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Cannot create output {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

/// Print the run summary to stderr, keeping stdout for the manifest.
fn print_summary(stats: &WalkStats, elapsed: Duration) {
    eprintln!("Skipped files: {}", stats.skipped);
    eprintln!("Processed files: {}", stats.processed);
    eprintln!("Errors: {}", stats.erroneous);
    eprintln!("Elapsed time: {}", format_elapsed(elapsed));
    eprintln!("Bytes processed: {}B", stats.processed_bytes);
    eprintln!("Speed: {}/s", format_rate(stats.bytes_per_second(elapsed)));
}

/// Format a duration as `H:MM:SS.ffffff`.
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        secs / 60 % 60,
        secs % 60,
        elapsed.subsec_micros()
    )
}

/// Format a byte rate with binary prefixes and one decimal place.
fn format_rate(bytes_per_second: f64) -> String {
    let options = humansize::BINARY
        .decimal_places(1)
        .decimal_zeroes(1)
        .space_after_value(false);
    humansize::format_size_i(bytes_per_second, options)
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
        LogFormat::Text => registry.with(fmt::layer().with_writer(io::stderr)).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "0:00:00.000000");
        assert_eq!(
            format_elapsed(Duration::from_micros(3_723_000_042)),
            "1:02:03.000042"
        );
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(1536.0), "1.5KiB");
        assert_eq!(format_rate(3.5 * 1024.0 * 1024.0), "3.5MiB");
        assert_eq!(format_rate(1535.6), "1.5KiB");
    }

    #[test]
    fn test_format_rate_keeps_fraction_below_one_byte() {
        assert_eq!(format_rate(0.5), "0.5B");
        assert_eq!(format_rate(0.0), "0.0B");
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["treesum", "/data"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("/data"));
        assert_eq!(cli.flush, 2048);
        assert_eq!(cli.block_size, DEFAULT_BLOCK_SIZE);
        assert!(cli.output.is_none());
        assert!(cli.resume.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "treesum", "/data", "-o", "out.csv", "-e", "err.log", "-f", "16", "-r", "a/b.txt",
            "--sort",
        ])
        .unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("out.csv")));
        assert_eq!(cli.error, Some(PathBuf::from("err.log")));
        assert_eq!(cli.flush, 16);
        assert_eq!(cli.resume, Some(PathBuf::from("a/b.txt")));
        assert!(cli.sort);
    }
}
