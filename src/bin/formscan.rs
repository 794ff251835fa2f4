//! CLI binary for edgequake-formscan.
//!
//! A thin shim over the library crate: each subcommand maps its flags to
//! library calls and prints results.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_formscan::pipeline::encode::save_png;
use edgequake_formscan::pipeline::layout::{build_page, generate_markers, write_pdf, LayoutStyles};
use edgequake_formscan::schema::LOAN_APPLICATION;
use edgequake_formscan::{
    extract, extract_to_file, scan_markers, verify_files, DocumentAnalyzer, DocumentRef,
    ExtractionConfig, ExtractionOutput, ExtractionProgressCallback, JobStatus, PageSelection,
    PollPolicy, ProgressCallback, StoredAnalyzer, FORM_TITLE,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner with one log line per scanned page and per status check.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Scanning");
        bar.set_message("Opening input…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, total_pages: usize) {
        self.bar.set_message(format!("{total_pages} pages"));
    }

    fn on_page_scanned(&self, page_num: usize, markers: usize) {
        let tick = if markers > 0 { green("✓") } else { yellow("⚠") };
        self.bar.println(format!(
            "  {} Page {:>3}  {}",
            tick,
            page_num,
            dim(&format!("{markers} markers"))
        ));
    }

    fn on_job_submitted(&self, job_id: &str) {
        self.bar.set_prefix("Analysing");
        self.bar.set_message(format!("job {job_id}"));
    }

    fn on_poll(&self, job_id: &str, attempt: u32, status: JobStatus) {
        self.bar
            .set_message(format!("job {job_id}: {status:?} (check {attempt})"));
    }

    fn on_section_populated(&self, section: &str, matched: usize) {
        self.bar.println(format!(
            "  {} {:<20} {}",
            green("✓"),
            section,
            dim(&format!("{matched} fields"))
        ));
    }

    fn on_extraction_complete(&self, _records: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the marker page for the loan application form
  formscan generate --out-dir form/ --pdf

  # Check scanned pages still carry their markers
  formscan verify page1.png page2.png --expect "Personal Details" --expect "Loan Details"

  # List markers found in a scan
  formscan scan filled.pdf

  # Extract against a stored analysis response
  formscan extract filled.png --analysis-json filled.analysis.json -o filled.csv

  # Extract with AWS Textract (document must already be in S3)
  formscan extract filled.pdf --bucket forms --key filled.pdf --max-wait 600

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH      Path to libpdfium (PDF inputs and --pdf output)
  AWS_REGION, AWS_*    Standard AWS SDK configuration for --bucket/--key
  RUST_LOG             Overrides the log filter
"#;

/// Print, scan and extract multi-section forms with QR section markers.
#[derive(Parser, Debug)]
#[command(
    name = "formscan",
    version,
    about = "Print, scan and extract multi-section forms with QR section markers",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FORMSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FORMSCAN_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate marker images and the printable marker page.
    Generate(GenerateArgs),
    /// Check that each page image contains its expected marker.
    Verify(VerifyArgs),
    /// Decode the markers on every page of a scan.
    Scan(ScanArgs),
    /// Extract form data into a CSV record file.
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Directory receiving the PNG (and PDF) files.
    #[arg(long, env = "FORMSCAN_OUT_DIR", default_value = "markers")]
    out_dir: PathBuf,

    /// Page title and main marker payload.
    #[arg(long, default_value = FORM_TITLE)]
    title: String,

    /// Subsection marker payload (repeatable, at most 3). Default: the form's sections.
    #[arg(long = "section")]
    sections: Vec<String>,

    /// Resolution of the composed page PNG.
    #[arg(long, env = "FORMSCAN_PX_PER_MM", default_value_t = 10.0)]
    px_per_mm: f32,

    /// Also write the page as an A4 PDF (needs pdfium).
    #[arg(long)]
    pdf: bool,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Page images, in order.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Payload expected on the page at the same position (repeatable).
    #[arg(long = "expect", required = true)]
    expected: Vec<String>,

    /// Output the results as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Scanned form: PDF, PNG or JPEG path, or HTTP/HTTPS URL.
    input: String,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "FORMSCAN_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "FORMSCAN_PASSWORD")]
    password: Option<String>,

    /// Longest rendered page edge in pixels.
    #[arg(long, env = "FORMSCAN_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "FORMSCAN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Main marker payload the form was generated with.
    #[arg(long, env = "FORMSCAN_TITLE", default_value = FORM_TITLE)]
    title: String,
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output the scan report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Stored analysis response (JSON) for this document.
    #[arg(long, env = "FORMSCAN_ANALYSIS_JSON", conflicts_with_all = ["bucket", "key"])]
    analysis_json: Option<PathBuf>,

    /// S3 bucket holding the document, for Textract.
    #[arg(long, env = "FORMSCAN_BUCKET", requires = "key")]
    bucket: Option<String>,

    /// S3 object key of the document, for Textract.
    #[arg(long, env = "FORMSCAN_KEY", requires = "bucket")]
    key: Option<String>,

    /// AWS region for Textract (defaults to the environment's).
    #[arg(long, env = "FORMSCAN_REGION")]
    region: Option<String>,

    /// Seconds between job status checks.
    #[arg(long, env = "FORMSCAN_POLL_INTERVAL", default_value_t = 10)]
    poll_interval: u64,

    /// Multiply the interval by this after each pending check (1 = fixed).
    #[arg(long, env = "FORMSCAN_BACKOFF", default_value_t = 1.0)]
    backoff: f64,

    /// Give up on the job after this many seconds (default: wait forever).
    #[arg(long, env = "FORMSCAN_MAX_WAIT")]
    max_wait: Option<u64>,

    /// Read key/value text from child WORD blocks when a block has none.
    #[arg(long, env = "FORMSCAN_CHILD_TEXT")]
    child_text: bool,

    /// Write the CSV here instead of stdout.
    #[arg(short, long, env = "FORMSCAN_OUTPUT")]
    output: Option<PathBuf>,

    /// Output the full ExtractionOutput as JSON instead of CSV.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "FORMSCAN_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters during extraction;
    // INFO logs would tear through it.
    let show_progress = match &cli.command {
        Command::Extract(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
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

    match cli.command {
        Command::Generate(args) => run_generate(args, cli.quiet),
        Command::Verify(args) => run_verify(args, cli.quiet),
        Command::Scan(args) => run_scan(args).await,
        Command::Extract(args) => run_extract(args, cli.quiet, show_progress).await,
    }
}

fn run_generate(args: GenerateArgs, quiet: bool) -> Result<()> {
    let sections: Vec<String> = if args.sections.is_empty() {
        LOAN_APPLICATION.iter().map(|s| s.name.to_string()).collect()
    } else {
        args.sections
    };
    let styles = LayoutStyles::default();

    for marker in generate_markers(&args.title, &sections, &styles)
        .context("Failed to generate markers")?
    {
        let path = args.out_dir.join(marker.file_name());
        save_png(&marker.image, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !quiet {
            eprintln!("{} {}  {}", green("✓"), path.display(), dim(&marker.payload));
        }
    }

    let layout = build_page(&args.title, &sections, &styles).context("Failed to lay out page")?;
    let page_path = args.out_dir.join("page.png");
    save_png(&layout.compose_raster(args.px_per_mm), &page_path)
        .with_context(|| format!("Failed to write {}", page_path.display()))?;
    if !quiet {
        eprintln!("{} {}", green("✓"), page_path.display());
    }

    if args.pdf {
        let pdf_path = args.out_dir.join("page.pdf");
        write_pdf(&layout, &pdf_path)
            .with_context(|| format!("Failed to write {}", pdf_path.display()))?;
        if !quiet {
            eprintln!("{} {}", green("✓"), pdf_path.display());
        }
    }
    Ok(())
}

fn run_verify(args: VerifyArgs, quiet: bool) -> Result<()> {
    let results = verify_files(&args.images, &args.expected).context("Verification failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&results).context("Failed to serialise results")?
        );
        return Ok(());
    }

    for r in &results {
        if r.ok {
            println!("{} Page {}: {}", green("✓"), r.index + 1, r.expected);
        } else {
            println!(
                "{} Page {}: expected {:?}, got {:?}",
                red("✗"),
                r.index + 1,
                r.expected,
                r.got
            );
        }
    }
    if !quiet {
        let failed = results.iter().filter(|r| !r.ok).count();
        eprintln!(
            "{} of {} pages matched",
            bold(&(results.len() - failed).to_string()),
            results.len()
        );
    }
    Ok(())
}

async fn run_scan(args: ScanArgs) -> Result<()> {
    let config = build_config(&args.input, None)?
        .build()
        .context("Invalid configuration")?;
    let report = scan_markers(&args.input.input, &config)
        .await
        .context("Scan failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
        return Ok(());
    }

    for page in &report.pages {
        println!("{}", bold(&format!("Page {}", page.page)));
        for marker in &page.markers {
            let id = config.template.section_id(&marker.payload);
            let tag = if id.is_known() {
                green("section")
            } else if marker.payload == config.form_title {
                dim("form")
            } else {
                yellow("unknown")
            };
            let b = marker.bounding_box;
            println!(
                "  {:<28} {:<8} {}",
                marker.payload,
                tag,
                dim(&format!("{}x{} at ({}, {})", b.width, b.height, b.x, b.y))
            );
        }
    }
    for warning in &report.warnings {
        eprintln!("{} {}", yellow("⚠"), warning);
    }
    Ok(())
}

async fn run_extract(args: ExtractArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    // Ctrl-C stops the status wait instead of killing the process mid-write.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let poll = poll_policy(args.poll_interval, args.backoff, args.max_wait);

    let config = build_config(&args.input, progress)?
        .poll(poll)
        .child_text_fallback(args.child_text)
        .cancel_token(cancel)
        .build()
        .context("Invalid configuration")?;

    let (document, analyzer) = analyzer_for(&args).await?;

    let output = match args.output {
        Some(ref path) => extract_to_file(&args.input.input, &document, &*analyzer, path, &config)
            .await
            .context("Extraction failed")?,
        None => extract(&args.input.input, &document, &*analyzer, &config)
            .await
            .context("Extraction failed")?,
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if args.output.is_none() {
        let csv = output.to_csv().context("Failed to render CSV")?;
        io::stdout()
            .lock()
            .write_all(&csv)
            .context("Failed to write to stdout")?;
    }

    if !quiet {
        print_summary(&output, args.output.as_ref());
    }
    Ok(())
}

/// Pick the analysis backend from the flags.
async fn analyzer_for(args: &ExtractArgs) -> Result<(DocumentRef, Box<dyn DocumentAnalyzer>)> {
    if let Some(ref path) = args.analysis_json {
        let analyzer: Box<dyn DocumentAnalyzer> = Box::new(StoredAnalyzer::new());
        return Ok((DocumentRef::LocalFile(path.clone()), analyzer));
    }

    match (&args.bucket, &args.key) {
        (Some(bucket), Some(key)) => {
            let document = DocumentRef::S3 {
                bucket: bucket.clone(),
                key: key.clone(),
            };
            #[cfg(feature = "aws")]
            {
                let analyzer: Box<dyn DocumentAnalyzer> = Box::new(
                    edgequake_formscan::TextractAnalyzer::from_env(args.region.clone()).await,
                );
                Ok((document, analyzer))
            }
            #[cfg(not(feature = "aws"))]
            {
                let _ = (document, &args.region);
                bail!("--bucket/--key need the `aws` feature")
            }
        }
        _ => bail!("Pass --analysis-json FILE or --bucket B --key K"),
    }
}

/// Backoff delays are capped at 30 poll intervals.
fn poll_policy(interval_secs: u64, backoff: f64, max_wait_secs: Option<u64>) -> PollPolicy {
    let interval = interval_secs.max(1);
    let mut poll = PollPolicy::fixed(Duration::from_secs(interval));
    if backoff > 1.0 {
        poll = poll.with_backoff(backoff, Duration::from_secs(interval.saturating_mul(30)));
    }
    if let Some(secs) = max_wait_secs {
        poll = poll.with_max_wait(Duration::from_secs(secs));
    }
    poll
}

fn build_config(
    args: &InputArgs,
    progress: Option<ProgressCallback>,
) -> Result<edgequake_formscan::ExtractionConfigBuilder> {
    let pages = PageSelection::parse(&args.pages).context("Invalid --pages")?;
    let mut builder = ExtractionConfig::builder()
        .pages(pages)
        .max_rendered_pixels(args.max_pixels)
        .download_timeout_secs(args.download_timeout)
        .form_title(args.title.clone());
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    Ok(builder)
}

fn print_summary(output: &ExtractionOutput, path: Option<&PathBuf>) {
    let s = &output.stats;
    let filled = output.records.iter().filter(|r| r.value.is_some()).count();
    let tick = if output.warnings.is_empty() {
        green("✔")
    } else {
        yellow("⚠")
    };
    eprintln!(
        "{}  {} sections  {}/{} fields  {} checks  {}ms{}",
        tick,
        output.sections.len(),
        filled,
        output.records.len(),
        s.poll_attempts,
        s.total_duration_ms,
        path.map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default(),
    );
    for warning in &output.warnings {
        eprintln!("   {} {}", yellow("⚠"), warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_cap_scales_with_interval() {
        let poll = poll_policy(10, 2.0, Some(600));
        assert_eq!(poll.interval, Duration::from_secs(10));
        assert_eq!(poll.max_interval, Duration::from_secs(300));
        assert_eq!(poll.max_wait, Some(Duration::from_secs(600)));
    }

    #[test]
    fn huge_interval_saturates() {
        let poll = poll_policy(u64::MAX, 2.0, None);
        assert_eq!(poll.max_interval, Duration::from_secs(u64::MAX));
        assert_eq!(poll.delay_for(5), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn zero_interval_is_raised_to_one_second() {
        let poll = poll_policy(0, 1.0, None);
        assert_eq!(poll.interval, Duration::from_secs(1));
        assert_eq!(poll.backoff_factor, 1.0);
    }
}
