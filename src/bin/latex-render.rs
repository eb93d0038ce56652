//! CLI binary for latex-render.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RenderConfig`, renders each input and writes or prints the results.

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use latex_render::config::default_ghostscript_bin;
use latex_render::{
    ConversionResult, OutputFormat, RenderConfig, RenderObserver, RenderReport, RenderState,
    Renderer, SharedObserver,
};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Progress bar over all inputs. Requests complete out of order when
/// `--concurrency` is above 1, so the bar only counts; per-input lines are
/// printed by the caller.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}/{len}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Rendering");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl RenderObserver for CliObserver {
    fn on_transition(&self, format: OutputFormat, state: RenderState) {
        if !state.is_terminal() {
            self.bar.set_message(format!("{format}: {state}"));
        }
    }

    fn on_raster_oversized(&self, dpi: u32, width: u32, height: u32) {
        self.bar.println(format!(
            "  {} {}",
            yellow("↓"),
            dim(&format!("{width}x{height} px at {dpi} dpi is too large, stepping down"))
        ));
    }

    fn on_render_complete(
        &self,
        _format: OutputFormat,
        _result: &ConversionResult,
        _elapsed_ms: u64,
    ) {
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Typeset a formula from stdin to SVG on stdout
  echo '\documentclass[preview]{standalone}\begin{document}$x^2$\end{document}' | latex-render svg > x.svg

  # One file to PDF
  latex-render pdf figure.tex -o figure.pdf

  # A batch to PNG, four at a time, into out/
  latex-render png test_cases/success/*.tex -o out/ --concurrency 4

  # Machine-readable results (base64 artifacts)
  latex-render svg eq.tex --json

  # Verify the toolchain
  latex-render --check-tools

EXIT CODES:
  0  every input rendered
  1  at least one input was rejected with a LaTeX error code
  2  at least one input failed unexpectedly, or the CLI itself failed
     (unreadable input, invalid option, unwritable output)

ERROR CODES:
  DIM_TOO_LARGE           ! Dimension too large
  ARITHMETIC_OVERFLOW     ! Arithmetic overflow
  TEX_CAPACITY_EXCEEDED   ! TeX capacity exceeded
  LATEX_ERROR             any other "! " line in the TeX log
  UNEXPECTED_LATEX_ERROR  a tool failed without a recognisable message
"#;

/// Render LaTeX documents to SVG, PDF, or PNG.
#[derive(Parser, Debug)]
#[command(
    name = "latex-render",
    version,
    about = "Render LaTeX documents to SVG, PDF, or PNG",
    long_about = "Render LaTeX documents to SVG (latex + dvisvgm), compressed PDF \
(pdflatex + Ghostscript) or bilevel PNG (pdflatex + Ghostscript, stepping down a DPI \
ladder until the image fits). Each document is typeset in its own temporary directory.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Output format.
    #[arg(value_enum, required_unless_present = "check_tools")]
    format: Option<FormatArg>,

    /// LaTeX source files; `-` or nothing reads stdin.
    inputs: Vec<PathBuf>,

    /// Output file (single input) or directory (several inputs).
    #[arg(short, long, env = "LATEX_RENDER_OUTPUT")]
    output: Option<PathBuf>,

    /// Print one JSON report per input instead of writing artifacts to stdout.
    #[arg(long, env = "LATEX_RENDER_JSON")]
    json: bool,

    /// Number of documents rendered at once.
    #[arg(short, long, env = "LATEX_RENDER_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,

    /// Comma-separated PNG resolutions, highest first.
    #[arg(long, env = "LATEX_RENDER_DPI_LADDER", value_delimiter = ',')]
    dpi_ladder: Option<Vec<u32>>,

    /// Largest accepted PNG width or height in pixels.
    #[arg(long, env = "LATEX_RENDER_MAX_DIMENSION")]
    max_dimension: Option<u32>,

    /// Directory in which per-request workspaces are created.
    #[arg(long, env = "LATEX_RENDER_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Kill any tool still running after this many seconds.
    #[arg(long, env = "LATEX_RENDER_TIMEOUT")]
    timeout: Option<u64>,

    /// PDF compatibility level passed to Ghostscript.
    #[arg(long, env = "LATEX_RENDER_PDF_COMPAT", default_value = "1.5")]
    pdf_compat: String,

    #[arg(long, env = "LATEX_RENDER_LATEX", default_value = "latex")]
    latex_bin: String,

    #[arg(long, env = "LATEX_RENDER_PDFLATEX", default_value = "pdflatex")]
    pdflatex_bin: String,

    #[arg(long, env = "LATEX_RENDER_DVISVGM", default_value = "dvisvgm")]
    dvisvgm_bin: String,

    #[arg(long, env = "LATEX_RENDER_GS", default_value = default_ghostscript_bin())]
    gs_bin: String,

    /// Pass blank sources to the engine instead of rejecting them.
    #[arg(long, env = "LATEX_RENDER_ALLOW_EMPTY")]
    allow_empty: bool,

    /// Report which tools are installed, then exit.
    #[arg(long)]
    check_tools: bool,

    /// Disable progress bar.
    #[arg(long, env = "LATEX_RENDER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LATEX_RENDER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LATEX_RENDER_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Svg,
    Pdf,
    Png,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Svg => OutputFormat::Svg,
            FormatArg::Pdf => OutputFormat::Pdf,
            FormatArg::Png => OutputFormat::Png,
        }
    }
}

/// One document to render.
struct Job {
    label: String,
    source: Vec<u8>,
    /// Where the artifact goes; `None` means stdout.
    destination: Option<PathBuf>,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    input: &'a str,
    #[serde(flatten)]
    report: RenderReport,
}

const EXIT_OK: u8 = 0;
const EXIT_CLASSIFIED: u8 = 1;
const EXIT_UNEXPECTED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            ExitCode::from(EXIT_UNEXPECTED)
        }
    }
}

/// Everything after argument parsing. The returned code is the worst
/// outcome over all inputs; an `Err` means the CLI itself failed.
async fn run(cli: Cli) -> Result<u8> {
    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check_tools;
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

    // ── Toolchain check ──────────────────────────────────────────────────
    if cli.check_tools {
        let renderer =
            Renderer::new(build_config(&cli, None)?).context("Invalid configuration")?;
        return check_tools(&renderer, cli.json).await;
    }

    let Some(format) = cli.format.map(OutputFormat::from) else {
        anyhow::bail!("an output format is required");
    };

    let jobs = collect_jobs(&cli, format)?;
    let observer = show_progress.then(|| CliObserver::new(jobs.len()));
    let config = build_config(&cli, observer.clone().map(|o| o as SharedObserver))?;
    let renderer = Renderer::new(config).context("Invalid configuration")?;

    // ── Render ───────────────────────────────────────────────────────────
    let started = Instant::now();
    // Artifacts with a destination go through the library's atomic write.
    let results: Vec<(Job, Result<ConversionResult>)> = stream::iter(jobs)
        .map(|job| {
            let renderer = &renderer;
            async move {
                let result = match &job.destination {
                    Some(path) => renderer
                        .render_to_file(format, &job.source, path)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display())),
                    None => Ok(renderer.render(format, &job.source).await),
                };
                (job, result)
            }
        })
        .buffer_unordered(cli.concurrency as usize)
        .collect()
        .await;

    if let Some(ref o) = observer {
        o.bar.finish_and_clear();
    }

    // ── Output ───────────────────────────────────────────────────────────
    let total = results.len();
    let mut worst = EXIT_OK;
    let mut converted = 0usize;
    for (job, result) in results {
        let result = result?;
        worst = worst.max(exit_code_for(&result));

        if cli.json {
            let record = JsonRecord {
                input: &job.label,
                report: result.to_report(),
            };
            println!(
                "{}",
                serde_json::to_string(&record).context("Failed to serialise report")?
            );
        }

        match &result {
            ConversionResult::Success(artifact) => {
                converted += 1;
                match &job.destination {
                    Some(path) => {
                        if !cli.quiet {
                            let raster = artifact
                                .raster
                                .map(|r| format!("  {}x{} @ {} dpi", r.width, r.height, r.dpi))
                                .unwrap_or_default();
                            eprintln!(
                                "  {} {}  →  {}{}",
                                green("✓"),
                                job.label,
                                bold(&path.display().to_string()),
                                dim(&raster)
                            );
                        }
                    }
                    None if !cli.json => {
                        io::stdout()
                            .lock()
                            .write_all(&artifact.bytes)
                            .context("Failed to write to stdout")?;
                    }
                    None => {}
                }
            }
            failure => {
                if !cli.quiet {
                    eprintln!(
                        "  {} {}  {}  {}",
                        red("✗"),
                        job.label,
                        red(failure.error_code().map(|c| c.as_str()).unwrap_or_default()),
                        failure.public_message().unwrap_or_default()
                    );
                }
            }
        }
    }

    if !cli.quiet && total > 1 {
        eprintln!(
            "{} {}/{} rendered in {}ms",
            if converted == total { green("✔") } else { red("✘") },
            bold(&converted.to_string()),
            total,
            started.elapsed().as_millis()
        );
    }

    Ok(worst)
}

fn exit_code_for(result: &ConversionResult) -> u8 {
    match result {
        ConversionResult::Success(_) => EXIT_OK,
        ConversionResult::ClassifiedFailure { .. } => EXIT_CLASSIFIED,
        ConversionResult::UnexpectedFailure { .. } => EXIT_UNEXPECTED,
    }
}

/// Map CLI args to `RenderConfig`.
fn build_config(cli: &Cli, observer: Option<SharedObserver>) -> Result<RenderConfig> {
    let mut builder = RenderConfig::builder()
        .latex_bin(&cli.latex_bin)
        .pdflatex_bin(&cli.pdflatex_bin)
        .dvisvgm_bin(&cli.dvisvgm_bin)
        .ghostscript_bin(&cli.gs_bin)
        .pdf_compatibility_level(&cli.pdf_compat)
        .reject_empty_source(!cli.allow_empty);

    if let Some(ref ladder) = cli.dpi_ladder {
        builder = builder.dpi_ladder(ladder.clone());
    }
    if let Some(px) = cli.max_dimension {
        builder = builder.max_png_dimension(px);
    }
    if let Some(ref dir) = cli.workdir {
        builder = builder.workspace_root(dir);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.tool_timeout_secs(secs);
    }
    if let Some(o) = observer {
        builder = builder.observer(o);
    }

    builder.build().context("Invalid configuration")
}

/// Read every input and decide where its artifact goes.
fn collect_jobs(cli: &Cli, format: OutputFormat) -> Result<Vec<Job>> {
    let inputs: Vec<PathBuf> = if cli.inputs.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        cli.inputs.clone()
    };
    let stdin_count = inputs.iter().filter(|p| is_stdin(p)).count();
    if stdin_count > 1 {
        anyhow::bail!("stdin (`-`) can only be given once");
    }

    let batch = inputs.len() > 1;
    let extension = format.content_type().extension();
    let mut jobs = Vec::with_capacity(inputs.len());

    for input in inputs {
        let (label, source) = if is_stdin(&input) {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read LaTeX source from stdin")?;
            ("stdin".to_string(), buf)
        } else {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            (input.display().to_string(), bytes)
        };

        let destination = match (&cli.output, batch) {
            (Some(path), false) => Some(path.clone()),
            (Some(dir), true) => Some(dir.join(artifact_name(&input, extension))),
            (None, true) if !is_stdin(&input) => Some(input.with_extension(extension)),
            (None, _) => None,
        };

        jobs.push(Job {
            label,
            source,
            destination,
        });
    }
    Ok(jobs)
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// `dir/eq.tex` → `eq.svg`; stdin becomes `stdin.svg`.
fn artifact_name(input: &Path, extension: &str) -> PathBuf {
    let stem = if is_stdin(input) {
        "stdin".into()
    } else {
        input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".into())
    };
    PathBuf::from(format!("{stem}.{extension}"))
}

async fn check_tools(renderer: &Renderer, json: bool) -> Result<u8> {
    let statuses = renderer.check_toolchain().await;
    let all_ok = statuses.iter().all(|s| s.available);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&statuses).context("Failed to serialise tool status")?
        );
    } else {
        for s in &statuses {
            if s.available {
                println!(
                    "{} {:<12} {:<10} {}",
                    green("✓"),
                    s.role,
                    s.tool,
                    dim(s.version.as_deref().unwrap_or(""))
                );
            } else {
                println!(
                    "{} {:<12} {:<10} {}",
                    red("✗"),
                    s.role,
                    s.tool,
                    red(s.problem.as_deref().unwrap_or("unavailable"))
                );
            }
        }
    }

    Ok(if all_ok { EXIT_OK } else { EXIT_UNEXPECTED })
}
