//! CLI binary for edgequake-pdf2text.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig`, runs one batch and writes or prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_pdf2text::config::validate_dpi;
use edgequake_pdf2text::output::output_file_name;
use edgequake_pdf2text::{
    system_status, write_text_file, BatchExtractRequest, BatchOrchestrator, CancelSignal,
    DocumentOutcome, ExtractRequest, ExtractionConfig, ExtractionMethod,
    ExtractionProgressCallback, Extractor, PreprocessProfile, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar over documents; page events only update the message line since
/// documents of a batch interleave.
struct CliProgressCallback {
    bar: ProgressBar,
    ocr_pages: AtomicUsize,
    page_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            ocr_pages: AtomicUsize::new(0),
            page_errors: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.reset_eta();
    }

    fn on_document_start(&self, _index: usize, source: &str, total_pages: usize) {
        self.bar.set_message(format!("{source} ({total_pages} pages)"));
    }

    fn on_page_complete(
        &self,
        source: &str,
        page_num: usize,
        total_pages: usize,
        method: ExtractionMethod,
        _chars: usize,
    ) {
        if method == ExtractionMethod::Ocr {
            self.ocr_pages.fetch_add(1, Ordering::Relaxed);
        }
        self.bar
            .set_message(format!("{source} p{page_num}/{total_pages} {method}"));
    }

    fn on_page_error(&self, source: &str, page_num: usize, total_pages: usize, error: &str) {
        self.page_errors.fetch_add(1, Ordering::Relaxed);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {} page {}/{}  {}",
            red("✗"),
            source,
            page_num,
            total_pages,
            red(&msg),
        ));
    }

    fn on_document_complete(&self, _index: usize, source: &str, success: bool) {
        let mark = if success { green("✓") } else { red("✗") };
        self.bar.println(format!("  {mark} {source}"));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = total_documents.saturating_sub(succeeded);
        let ocr = self.ocr_pages.load(Ordering::Relaxed);
        let page_errors = self.page_errors.load(Ordering::Relaxed);
        if failed == 0 {
            eprintln!(
                "{} {} documents extracted  {}",
                green("✔"),
                bold(&succeeded.to_string()),
                dim(&format!("({ocr} pages via OCR, {page_errors} page errors)")),
            );
        } else {
            eprintln!(
                "{} {}/{} documents extracted  ({} failed)",
                if succeeded == 0 { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the text of one PDF
  pdf2text report.pdf

  # Extract a folder of scans into ./out, 4 at a time
  pdf2text -c 4 -o out scans/*.pdf

  # OCR every page even when a text layer exists
  pdf2text --force-ocr --dpi 400 fax.pdf

  # German + English OCR, extra segmentation modes
  pdf2text --lang deu --lang eng --psm 6 --psm 11 form.pdf

  # JSON results for a batch
  pdf2text --json a.pdf b.pdf > results.json

  # Check that pdfium and tesseract are usable
  pdf2text status

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH     Path to libpdfium
  TESSERACT_PATH      Path to the tesseract executable
  RUST_LOG            Log filter (overrides -v / -q)
"#;

/// Extract text from PDF files, using OCR for pages without a usable text layer.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2text",
    version,
    about = "Extract text from PDFs: embedded text layer first, Tesseract OCR fallback",
    arg_required_else_help = true,
    args_conflicts_with_subcommands = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// PDF files to extract.
    files: Vec<PathBuf>,

    /// Write `<name>_<timestamp>.txt` files here (default: stdout for one
    /// file, the current directory for several).
    #[arg(short, long, env = "PDF2TEXT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// OCR every page, ignoring embedded text.
    #[arg(long, env = "PDF2TEXT_FORCE_OCR")]
    force_ocr: bool,

    /// Rasterisation DPI for OCR (150–600).
    #[arg(long, env = "PDF2TEXT_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(150..=600))]
    dpi: u32,

    /// Documents processed concurrently (default: CPU count).
    #[arg(short, long, env = "PDF2TEXT_CONCURRENCY")]
    concurrency: Option<usize>,

    /// OCR language (repeatable).
    #[arg(long = "lang", env = "PDF2TEXT_LANG", value_delimiter = ',', default_value = "eng")]
    languages: Vec<String>,

    /// Tesseract page-segmentation mode to try, in order (repeatable).
    #[arg(long = "psm", value_delimiter = ',', default_values_t = [6u8, 3, 4])]
    segmentation_modes: Vec<u8>,

    /// Minimum non-whitespace characters to accept a text layer.
    #[arg(long, default_value_t = 20)]
    min_chars: usize,

    /// Minimum alphanumeric ratio to accept a shorter text layer.
    #[arg(long, default_value_t = 0.5)]
    min_alnum_ratio: f32,

    /// Skip image preprocessing before OCR.
    #[arg(long)]
    no_preprocess: bool,

    /// Straighten rotated scans before OCR.
    #[arg(long)]
    deskew: bool,

    /// Keep page text exactly as extracted.
    #[arg(long)]
    no_normalize: bool,

    /// Per-document timeout in seconds.
    #[arg(long, env = "PDF2TEXT_TIMEOUT")]
    timeout: Option<u64>,

    /// Path to the tesseract executable.
    #[arg(long, env = "TESSERACT_PATH")]
    tesseract: Option<PathBuf>,

    /// Print results as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether pdfium and the OCR engine are usable.
    Status {
        /// Path to the tesseract executable.
        #[arg(long, env = "TESSERACT_PATH")]
        tesseract: Option<PathBuf>,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are noise under the progress bar.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.command.is_none();
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

    if let Some(Command::Status { ref tesseract, json }) = cli.command {
        return print_status(tesseract.clone(), json);
    }

    if cli.files.is_empty() {
        anyhow::bail!("No input files given");
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let dpi = config.dpi;

    // ── Read inputs ──────────────────────────────────────────────────────
    let mut requests = Vec::with_capacity(cli.files.len());
    let mut read_failures = 0usize;
    for path in &cli.files {
        match ExtractRequest::from_path(path).await {
            Ok(request) => requests.push(request.force_ocr(cli.force_ocr).resolution_dpi(dpi)),
            Err(e) => {
                eprintln!("{} {}", red("✗"), e);
                read_failures += 1;
            }
        }
    }
    let single = cli.files.len() == 1;

    // ── Run ──────────────────────────────────────────────────────────────
    let extractor = Arc::new(Extractor::new(config).context("Failed to initialise extractor")?);

    let cancel = CancelSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling: finishing in-flight pages…");
                cancel.cancel();
            }
        });
    }

    let batch = BatchExtractRequest::new(requests).max_concurrency(cli.concurrency.unwrap_or(0));
    let result = BatchOrchestrator::new(extractor).run(batch, &cancel).await;

    // ── Output ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let output_dir = cli
            .output_dir
            .clone()
            .or_else(|| (!single).then(|| PathBuf::from(".")));

        for entry in &result.entries {
            match &entry.outcome {
                DocumentOutcome::Completed(doc) => match output_dir {
                    Some(ref dir) => {
                        let path = dir.join(output_file_name(&doc.source, doc.extracted_at));
                        write_text_file(doc, &path)
                            .await
                            .with_context(|| format!("Failed to write output for {}", entry.id))?;
                        if !cli.quiet {
                            eprintln!(
                                "{}  {}  {} pages  {}  →  {}",
                                if doc.success { green("✔") } else { cyan("⚠") },
                                entry.id,
                                doc.pages.len(),
                                doc.method,
                                bold(&path.display().to_string()),
                            );
                        }
                    }
                    None => {
                        let stdout = io::stdout();
                        let mut handle = stdout.lock();
                        handle
                            .write_all(doc.text.as_bytes())
                            .context("Failed to write to stdout")?;
                        if !doc.text.ends_with('\n') {
                            handle.write_all(b"\n").ok();
                        }
                    }
                },
                DocumentOutcome::Failed(failure) => {
                    eprintln!("{} {}: {}: {}", red("✗"), entry.id, failure.kind, failure.message);
                }
            }
        }

        if !cli.quiet && !show_progress {
            eprintln!(
                "Extracted {}/{} documents in {:.2}s",
                result.summary.succeeded, result.summary.total, result.summary.elapsed_seconds
            );
        }
    }

    if result.summary.failed > 0 || read_failures > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Map CLI args to `ExtractionConfig`.
///
/// An out-of-range `--dpi` is rejected here, once, rather than failing every
/// document; the builder alone would clamp it silently.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    validate_dpi(cli.dpi).context("Invalid --dpi")?;

    let preprocess = if cli.no_preprocess {
        PreprocessProfile::disabled()
    } else {
        PreprocessProfile {
            deskew: cli.deskew,
            ..PreprocessProfile::default()
        }
    };

    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .min_direct_chars(cli.min_chars)
        .min_alnum_ratio(cli.min_alnum_ratio)
        .ocr_languages(cli.languages.clone())
        .segmentation_modes(cli.segmentation_modes.clone())
        .preprocess(preprocess)
        .normalize_text(!cli.no_normalize);

    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.document_timeout_secs(secs);
    }
    if let Some(ref path) = cli.tesseract {
        builder = builder.tesseract_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_status(tesseract: Option<PathBuf>, json: bool) -> Result<ExitCode> {
    let mut builder = ExtractionConfig::builder();
    if let Some(path) = tesseract {
        builder = builder.tesseract_path(path);
    }
    let config = builder.build().context("Invalid configuration")?;
    let status = system_status(&config);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("Failed to serialise status")?
        );
    } else {
        let yes_no = |ok: bool| if ok { green("available") } else { red("unavailable") };
        println!("pdfium:     {}", yes_no(status.pdfium_available));
        if let Some(ref e) = status.pdfium_error {
            println!("            {}", dim(e.lines().next().unwrap_or_default()));
        }
        println!(
            "{}:  {}{}",
            status.ocr_engine,
            yes_no(status.ocr_available),
            status
                .ocr_version
                .as_deref()
                .map(|v| format!("  {}", dim(v)))
                .unwrap_or_default()
        );
        println!(
            "ready:      {}",
            if status.ready { green("yes") } else { red("no") }
        );
    }

    Ok(if status.ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_dpi_rejected_at_startup() {
        assert!(Cli::try_parse_from(["pdf2text", "--dpi", "1200", "a.pdf"]).is_err());

        let mut cli = Cli::try_parse_from(["pdf2text", "a.pdf"]).unwrap();
        cli.dpi = 1200;
        let err = build_config(&cli, None).unwrap_err();
        assert!(format!("{err:#}").contains("--dpi"), "got: {err:#}");
    }

    #[test]
    fn dpi_flag_reaches_config() {
        let cli = Cli::try_parse_from(["pdf2text", "--dpi", "400", "a.pdf"]).unwrap();
        assert_eq!(build_config(&cli, None).unwrap().dpi, 400);
    }
}
