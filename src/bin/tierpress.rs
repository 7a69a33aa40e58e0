//! CLI binary for tierpress.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `CompressionConfig`, prints results and sets the exit code.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tierpress::{
    compress, CompressError, CompressionConfig, CompressionProgressCallback, CompressionResult,
    ErrorKind, ProgressCallback, Tier,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a status spinner plus one bar per tier, so
/// concurrently running tiers keep separate counts.
struct CliProgressCallback {
    multi: MultiProgress,
    status: ProgressBar,
    important: Mutex<Option<ProgressBar>>,
    remaining: Mutex<Option<ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self::with_draw_target(ProgressDrawTarget::stderr()))
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(spinner_style());
        status.set_prefix("Preparing");
        status.set_message("Opening PDF…");
        status.enable_steady_tick(Duration::from_millis(80));
        Self {
            multi,
            status,
            important: Mutex::new(None),
            remaining: Mutex::new(None),
        }
    }

    fn slot(&self, tier: Tier) -> &Mutex<Option<ProgressBar>> {
        match tier {
            Tier::Important => &self.important,
            Tier::Remaining => &self.remaining,
        }
    }

    fn tier_bar(&self, tier: Tier) -> Option<ProgressBar> {
        self.slot(tier).lock().ok().and_then(|bar| bar.clone())
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

impl CompressionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.status.set_message(format!("{total_pages} pages"));
        let _ = self.multi.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Compressing {total_pages} pages…"))
        ));
    }

    fn on_tier_start(&self, tier: Tier, pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = self
            .multi
            .insert_before(&self.status, ProgressBar::new(pages as u64));
        bar.set_style(style);
        bar.set_prefix(match tier {
            Tier::Important => "Important",
            Tier::Remaining => "Remaining",
        });
        bar.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut slot) = self.slot(tier).lock() {
            *slot = Some(bar);
        }
        self.status.set_prefix("Rasterising");
    }

    fn on_page_rasterized(&self, tier: Tier, _page: usize) {
        if let Some(bar) = self.tier_bar(tier) {
            bar.inc(1);
        }
    }

    fn on_tier_complete(&self, tier: Tier, images: usize) {
        if let Some(bar) = self.slot(tier).lock().ok().and_then(|mut bar| bar.take()) {
            bar.finish_and_clear();
        }
        let _ = self.multi.println(format!(
            "  {} {} tier  {}",
            green("✓"),
            tier,
            dim(&format!("{images} images"))
        ));
    }

    fn on_first_pass_complete(&self, size_mb: f64, target_mb: f64) {
        let mark = if size_mb <= target_mb {
            green("✓")
        } else {
            yellow("↻")
        };
        let _ = self.multi.println(format!(
            "  {} first pass  {}",
            mark,
            dim(&format!("{size_mb:.2}MB / {target_mb}MB"))
        ));
    }

    fn on_extreme_pass_start(&self, images: usize, quality: u8) {
        self.status.set_prefix("Extreme");
        self.status
            .set_message(format!("re-encoding {images} images at q={quality}"));
    }

    fn on_run_complete(&self, _result: &CompressionResult) {
        self.status.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Defaults: 4.5MB target, first 5 pages at 200 DPI / q85
  tierpress report.pdf report.small.pdf

  # Tighter target, keep only the cover sharp
  tierpress -t 2 -p 1 scan.pdf scan.small.pdf

  # Sharper body pages
  tierpress --remaining-dpi 72 --remaining-quality 40 book.pdf book.small.pdf

  # Machine-readable result
  tierpress --json in.pdf out.pdf > result.json

EXIT STATUS:
  0  output written and at or below the target size
  1  target missed (output still written), input missing, ImageMagick
     missing, or compression failed

REQUIREMENTS:
  ImageMagick 7 (`magick`) with Ghostscript for PDF input.
"#;

/// Compress PDF files while maintaining quality for important pages.
#[derive(Parser, Debug)]
#[command(
    name = "tierpress",
    version,
    about = "Compress PDF files while maintaining quality for important pages",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the input PDF file.
    input_file: PathBuf,

    /// Path to save the compressed PDF.
    output_file: PathBuf,

    /// Target file size in MB.
    #[arg(short = 't', long, env = "TIERPRESS_TARGET_SIZE", default_value_t = 4.5)]
    target_size: f64,

    /// Number of pages to maintain higher quality.
    #[arg(short = 'p', long, env = "TIERPRESS_IMPORTANT_PAGES", default_value_t = 5)]
    important_pages: usize,

    /// JPEG quality for important pages (1–100).
    #[arg(long, env = "TIERPRESS_FIRST_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    first_quality: u8,

    /// JPEG quality for remaining pages (1–100).
    #[arg(long, env = "TIERPRESS_REMAINING_QUALITY", default_value_t = 25,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    remaining_quality: u8,

    /// DPI for important pages.
    #[arg(long, env = "TIERPRESS_FIRST_DPI", default_value_t = 200)]
    first_dpi: u32,

    /// DPI for remaining pages.
    #[arg(long, env = "TIERPRESS_REMAINING_DPI", default_value_t = 35)]
    remaining_dpi: u32,

    /// ImageMagick executable.
    #[arg(long, env = "TIERPRESS_MAGICK", default_value = "magick")]
    magick: PathBuf,

    /// Kill a single page rasterization after this many seconds.
    #[arg(long, env = "TIERPRESS_TOOL_TIMEOUT")]
    tool_timeout: Option<u64>,

    /// Rasterize the two tiers in parallel.
    #[arg(long, env = "TIERPRESS_CONCURRENT_TIERS")]
    concurrent_tiers: bool,

    /// Print the result as JSON on stdout.
    #[arg(long, env = "TIERPRESS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TIERPRESS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TIERPRESS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TIERPRESS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback when it is shown, so library
    // INFO logs are suppressed unless --verbose asks for everything.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// Run one compression; `Ok(false)` means the target size was missed.
async fn run(cli: &Cli, show_progress: bool) -> Result<bool> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn CompressionProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, progress)?;

    let result = compress(&cli.input_file, &cli.output_file, &config).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise result")?
        );
    }

    if result.success {
        if !cli.quiet {
            eprintln!(
                "{}  {:.2}MB  {}ms  →  {}",
                green("✔"),
                result.final_size_mb,
                result.stats.total_duration_ms,
                bold(&cli.output_file.display().to_string()),
            );
        }
    } else {
        eprintln!(
            "{} Warning: Could not reach target size of {}MB",
            yellow("⚠"),
            cli.target_size
        );
        eprintln!("Final size: {:.2}MB", result.final_size_mb);
    }

    Ok(result.success)
}

/// Map CLI args to `CompressionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<CompressionConfig> {
    let mut builder = CompressionConfig::builder()
        .target_size_mb(cli.target_size)
        .important_pages(cli.important_pages)
        .first_page_quality(cli.first_quality)
        .remaining_quality(cli.remaining_quality)
        .first_page_dpi(cli.first_dpi)
        .remaining_dpi(cli.remaining_dpi)
        .magick_binary(&cli.magick)
        .concurrent_tiers(cli.concurrent_tiers);

    if let Some(secs) = cli.tool_timeout {
        builder = builder.tool_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Print a fatal error with a prefix matching its kind.
fn report_error(e: &anyhow::Error) {
    let prefix = match e.downcast_ref::<CompressError>().map(CompressError::kind) {
        Some(ErrorKind::NotFound) => "Error",
        Some(ErrorKind::MissingDependency) => "Missing dependency",
        Some(ErrorKind::CompressionFailure) => "Compression Error",
        Some(ErrorKind::InvalidConfig) => "Configuration Error",
        Some(ErrorKind::Internal) | None => "Unexpected Error",
    };
    eprintln!("{} {}: {:#}", red("✘"), prefix, e);
}
