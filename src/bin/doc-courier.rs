//! CLI binary for doc-courier.
//!
//! A thin shim over the library crate: maps flags to the config types,
//! wires a terminal progress callback and prints reports.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use doc_courier::extract::read_numbers;
use doc_courier::remote::check_connection;
use doc_courier::table::Table;
use doc_courier::{
    distribute, extract_constancias, CollisionPolicy, CourierConfig, CourierProgressCallback,
    DistributionPlan, ExtractionConfig, FileSource, GraphClient, ProgressCallback, RunSummary,
    TargetScope, TenantConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

/// Terminal progress: one bar at the bottom, one log line per row above it.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Noun used in the bar, e.g. "rows" or "PDFs".
    unit: &'static str,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new(unit: &'static str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            unit,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed(&self, index: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }

    fn line(&self, mark: String, label: &str, text: String, index: usize) {
        let elapsed = self.elapsed(index);
        self.bar
            .println(format!("  {mark} {:<18} {text}  {elapsed}", label));
        self.bar.inc(1);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

impl CourierProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_rows: usize) {
        let style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {}  ⏱ {{elapsed_precise}}",
            self.unit
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_rows as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Processing");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting run over {total_rows} {}…", self.unit))
        ));
    }

    fn on_row_start(&self, index: usize, label: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(label.to_string());
    }

    fn on_row_complete(&self, index: usize, label: &str, detail: &str) {
        self.line(green("✓"), label, truncate(detail, 100), index);
    }

    fn on_row_skipped(&self, index: usize, label: &str, reason: &str) {
        self.line(yellow("–"), label, yellow(&truncate(reason, 100)), index);
    }

    fn on_row_failed(&self, index: usize, label: &str, reason: &str) {
        self.line(red("✗"), label, red(&truncate(reason, 100)), index);
    }

    fn on_run_complete(&self, summary: &RunSummary) {
        self.bar.finish_and_clear();
        print_summary(summary, self.unit);
    }
}

fn print_summary(summary: &RunSummary, unit: &str) {
    let mark = if summary.failed == 0 {
        green("✔")
    } else if summary.succeeded == 0 && summary.processed > 0 {
        red("✘")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{mark} {} {unit} processed: {} succeeded, {} failed ({} skipped)  {}",
        bold(&summary.processed.to_string()),
        green(&summary.succeeded.to_string()),
        red(&summary.failed.to_string()),
        summary.skipped,
        dim(&format!("{}ms", summary.duration_ms)),
    );
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Check credentials, site and library
  doc-courier --config tenant.json check

  # Copy one closing file into every supplier folder listed in the sheet
  doc-courier distribute --mode same-file --excel rows.xlsx --same-file cierre.pdf

  # Per-row files, month folders under the base, preview only
  doc-courier distribute --mode per-row --excel rows.xlsx --file-column MASIVO \
      --scope months --dry-run

  # Certificates looked up by number in a local folder
  doc-courier distribute --mode lookup --excel rows.xlsx --src-dir detracciones \
      --number-column COMPROBANTE --create-missing

  # Crop every certificate listed in the sheet out of the batch PDFs
  doc-courier extract --excel rows.xlsx --column NRO --pdf-dir lotes --out-dir recortes

ENVIRONMENT VARIABLES:
  DOC_COURIER_CONFIG          Path to the tenant configuration document
  DOC_COURIER_CLIENT_SECRET   Client secret (overrides the document)
  PDFIUM_LIB_PATH             Path to an existing libpdfium
  RUST_LOG                    Log filter, e.g. doc_courier=debug
"#;

/// Distribute accounting documents into SharePoint folders and extract
/// withholding certificates from batch PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "doc-courier",
    version,
    about = "Distribute documents into SharePoint folders and crop certificates from PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Tenant configuration document (JSON).
    #[arg(long, global = true, env = "DOC_COURIER_CONFIG", default_value = "doc-courier.json")]
    config: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC_COURIER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOC_COURIER_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "DOC_COURIER_NO_PROGRESS")]
    no_progress: bool,

    /// Print the structured report as JSON on stdout.
    #[arg(long, global = true, env = "DOC_COURIER_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload one file per spreadsheet row into the folder its code matches.
    Distribute(DistributeArgs),
    /// Crop certificate blocks out of batch PDFs.
    Extract(ExtractArgs),
    /// Verify credentials, site and library access.
    Check,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    SameFile,
    PerRow,
    Lookup,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScopeArg {
    Base,
    Months,
}

impl From<ScopeArg> for TargetScope {
    fn from(v: ScopeArg) -> Self {
        match v {
            ScopeArg::Base => TargetScope::Base,
            ScopeArg::Months => TargetScope::Months,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CollisionArg {
    Suffix,
    Overwrite,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(v: CollisionArg) -> Self {
        match v {
            CollisionArg::Suffix => CollisionPolicy::Suffix,
            CollisionArg::Overwrite => CollisionPolicy::Overwrite,
        }
    }
}

#[derive(Args, Debug)]
struct DistributeArgs {
    /// Where each row's file comes from.
    #[arg(long, value_enum)]
    mode: ModeArg,

    /// Spreadsheet (.xlsx, .xls, .xlsm, .ods) or .csv with a header row.
    #[arg(long)]
    excel: PathBuf,

    /// Sheet name (default: first sheet).
    #[arg(long)]
    sheet: Option<String>,

    /// File copied to every row's folder (same-file mode).
    #[arg(long)]
    same_file: Option<PathBuf>,

    /// Column holding each row's local path (per-row mode).
    #[arg(long, default_value = "MASIVO")]
    file_column: String,

    /// Directory searched for certificate files (lookup mode).
    #[arg(long)]
    src_dir: Option<PathBuf>,

    /// Extension of looked-up files.
    #[arg(long, default_value = ".pdf")]
    ext: String,

    /// Column holding the certificate number (lookup mode).
    #[arg(long, default_value = "COMPROBANTE")]
    number_column: String,

    /// Column holding the folder code.
    #[arg(long, default_value = "CARPETAS")]
    code_column: String,

    /// Optional column holding a per-row base path.
    #[arg(long)]
    base_column: Option<String>,

    /// Match directly under the base, or under each month folder.
    #[arg(long, value_enum, default_value = "base")]
    scope: ScopeArg,

    /// Create absent base-path folders.
    #[arg(long, env = "DOC_COURIER_CREATE_MISSING")]
    create_missing: bool,

    /// Resolve and match, but upload nothing.
    #[arg(long, env = "DOC_COURIER_DRY_RUN")]
    dry_run: bool,

    /// Override the configured default base path.
    #[arg(long)]
    base: Option<String>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Spreadsheet or .csv with the certificate numbers.
    #[arg(long)]
    excel: PathBuf,

    /// Sheet name (default: first sheet).
    #[arg(long)]
    sheet: Option<String>,

    /// Column holding the certificate numbers.
    #[arg(long)]
    column: String,

    /// Directory scanned recursively for batch PDFs.
    #[arg(long)]
    pdf_dir: PathBuf,

    /// Directory the crops are written to.
    #[arg(long)]
    out_dir: PathBuf,

    /// Points kept above each number.
    #[arg(long, default_value_t = 40.0)]
    top_margin: f32,

    /// Points left before the next number on the page.
    #[arg(long, default_value_t = 10.0)]
    gap_margin: f32,

    /// PNG resolution (72–600).
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// What to do when a number appears more than once.
    #[arg(long, value_enum, default_value = "suffix")]
    collision: CollisionArg,

    /// Password for encrypted PDFs.
    #[arg(long, env = "DOC_COURIER_PDF_PASSWORD")]
    password: Option<String>,

    /// Path to libpdfium.
    #[arg(long)]
    pdfium_lib: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-row feedback; library INFO logs would
    // only interleave with it.
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

    match &cli.command {
        Command::Distribute(args) => run_distribute(&cli, args, show_progress).await,
        Command::Extract(args) => run_extract(&cli, args, show_progress).await,
        Command::Check => run_check(&cli).await,
    }
}

fn progress_for(show: bool, unit: &'static str) -> Option<ProgressCallback> {
    show.then(|| CliProgressCallback::new(unit) as Arc<dyn CourierProgressCallback>)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise report")?
    );
    Ok(())
}

fn file_source(args: &DistributeArgs) -> Result<FileSource> {
    Ok(match args.mode {
        ModeArg::SameFile => match &args.same_file {
            Some(path) => FileSource::SameFile(path.clone()),
            None => bail!("--mode same-file requires --same-file <PATH>"),
        },
        ModeArg::PerRow => FileSource::PathColumn(args.file_column.clone()),
        ModeArg::Lookup => match &args.src_dir {
            Some(dir) => FileSource::Lookup {
                column: args.number_column.clone(),
                dir: dir.clone(),
                extension: args.ext.trim().trim_start_matches('.').to_string(),
            },
            None => bail!("--mode lookup requires --src-dir <DIR>"),
        },
    })
}

async fn run_distribute(cli: &Cli, args: &DistributeArgs, show_progress: bool) -> Result<()> {
    let tenant = TenantConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let file_source = file_source(args)?;

    let mut builder = CourierConfig::builder()
        .create_missing(args.create_missing)
        .dry_run(args.dry_run);
    if let Some(cb) = progress_for(show_progress, "rows") {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let table = Table::read(&args.excel, args.sheet.as_deref())
        .with_context(|| format!("Failed to read {}", args.excel.display()))?;
    let plan = DistributionPlan {
        code_column: args.code_column.clone(),
        base_column: args.base_column.clone(),
        file_source,
        scope: args.scope.into(),
        default_base: args.base.clone().unwrap_or_else(|| tenant.base_path.clone()),
        months: tenant.months.clone(),
    };

    let client = GraphClient::connect(&tenant, &config)
        .await
        .context("Connection failed")?;
    let report = distribute(&client, &table, &plan, &config)
        .await
        .context("Distribution failed")?;

    if cli.json {
        print_json(&report)?;
    } else if !cli.quiet && !show_progress {
        print_summary(&report.summary, "rows");
    }
    Ok(())
}

async fn run_extract(cli: &Cli, args: &ExtractArgs, show_progress: bool) -> Result<()> {
    let mut builder = ExtractionConfig::builder()
        .top_margin(args.top_margin)
        .gap_margin(args.gap_margin)
        .dpi(args.dpi)
        .collision_policy(args.collision.into());
    if let Some(pwd) = &args.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(lib) = &args.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(cb) = progress_for(show_progress, "PDFs") {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let table = Table::read(&args.excel, args.sheet.as_deref())
        .with_context(|| format!("Failed to read {}", args.excel.display()))?;
    let numbers = read_numbers(&table, &args.column)?;
    let report = extract_constancias(numbers, &args.pdf_dir, &args.out_dir, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        print_json(&report)?;
    } else if !cli.quiet {
        if !show_progress {
            print_summary(&report.summary, "PDFs");
        }
        eprintln!(
            "   {} crop(s) written to {}",
            bold(&report.crop_count().to_string()),
            dim(&args.out_dir.display().to_string())
        );
    }
    Ok(())
}

async fn run_check(cli: &Cli) -> Result<()> {
    let tenant = TenantConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let config = CourierConfig::default();
    let report = check_connection(&tenant, &config)
        .await
        .context("Connection check failed")?;

    if cli.json {
        return print_json(&report);
    }

    match &report.claims {
        Some(claims) => {
            println!("Audience:     {}", claims.aud.as_deref().unwrap_or("-"));
            println!("Roles:        {}", claims.roles.join(", "));
            if let Some(scp) = &claims.scp {
                println!("Scopes:       {scp}");
            }
        }
        None => println!("Token:        {}", yellow("not a JWT, claims unavailable")),
    }
    println!("Site:         {}", report.site_web_url.as_deref().unwrap_or(&report.site_id));
    println!("Libraries:    {}", report.libraries.join(", "));
    println!(
        "Library:      {} {}",
        tenant.document_library,
        if report.library_found {
            green("✓")
        } else {
            red("✗ not found")
        }
    );
    if let Some(base) = &report.base_path {
        if base.found {
            println!("Base path:    {} {}", base.path, green("✓"));
        } else {
            println!(
                "Base path:    {} {} {}",
                base.path,
                red("✗"),
                dim(base.detail.as_deref().unwrap_or(""))
            );
        }
    }
    if !report.library_found {
        bail!("Document library '{}' not found", tenant.document_library);
    }
    Ok(())
}
