//! Pipeline integration tests with an injected tool runner.
//!
//! [`FakeRunner`] stands in for latex, pdflatex, dvisvgm and Ghostscript:
//! it records every invocation and writes the files the real tool would
//! have produced into the request workspace. No TeX installation needed.
//! The timeout and cancellation tests at the end drive the real process
//! runner against small shell scripts and only run on unix.
//!
//! Run with:
//!   cargo test --test pipeline

use latex_render::{
    ContentType, ConversionResult, ErrorCode, OutputFormat, RenderConfig, RenderConfigBuilder,
    RenderError, RenderObserver, RenderState, Renderer, ToolInvocation, ToolOutput, ToolRunner,
    EMPTY_SOURCE_MESSAGE, UNEXPECTED_MESSAGE,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Fake toolchain ───────────────────────────────────────────────────────────

type Behaviour = dyn Fn(&ToolInvocation) -> ToolOutput + Send + Sync;

#[derive(Clone)]
struct FakeRunner {
    behaviour: Arc<Behaviour>,
    calls: Arc<Mutex<Vec<ToolInvocation>>>,
}

impl FakeRunner {
    fn new(behaviour: impl Fn(&ToolInvocation) -> ToolOutput + Send + Sync + 'static) -> Self {
        Self {
            behaviour: Arc::new(behaviour),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    fn tools(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.tool).collect()
    }
}

impl ToolRunner for FakeRunner {
    fn run(
        &self,
        invocation: &ToolInvocation,
    ) -> impl Future<Output = Result<ToolOutput, RenderError>> + Send {
        self.calls.lock().unwrap().push(invocation.clone());
        let output = (self.behaviour)(invocation);
        async move { Ok(output) }
    }
}

const FAKE_SVG_PREFIX: &[u8] = b"<svg xmlns=\"http://www.w3.org/2000/svg\">";
const FAKE_PDF: &[u8] = b"%PDF-1.5 uncompressed";
const FAKE_COMPRESSED_PDF: &[u8] = b"%PDF-1.5 compressed";

/// Path following `-o` in an invocation.
fn output_arg(inv: &ToolInvocation) -> PathBuf {
    let pos = inv.args.iter().position(|a| a == "-o").expect("-o argument");
    PathBuf::from(&inv.args[pos + 1])
}

/// Resolution from the `-r<dpi>` argument.
fn dpi_arg(inv: &ToolInvocation) -> u32 {
    inv.args
        .iter()
        .find_map(|a| a.strip_prefix("-r"))
        .and_then(|d| d.parse().ok())
        .expect("-r<dpi> argument")
}

fn write_png(path: &Path, width: u32) {
    image::GrayImage::new(width, 1).save(path).unwrap();
}

/// A toolchain where every tool succeeds.
///
/// The DVI carries the source text and the SVG carries the DVI, so each
/// artifact can be traced back to the request that produced it. PNG width
/// is `dpi * px_per_dpi`.
fn working_toolchain(px_per_dpi: u32) -> impl Fn(&ToolInvocation) -> ToolOutput + Send + Sync {
    move |inv| {
        let ws = &inv.working_dir;
        match inv.tool.as_str() {
            "latex" => {
                let tex = std::fs::read(ws.join("out.tex")).unwrap();
                std::fs::write(ws.join("out.dvi"), tex).unwrap();
                ToolOutput::ok("Output written on out.dvi (1 page, 312 bytes).")
            }
            "pdflatex" => {
                std::fs::write(ws.join("out.pdf"), FAKE_PDF).unwrap();
                ToolOutput::ok("Output written on out.pdf (1 page, 1024 bytes).")
            }
            "dvisvgm" => {
                let dvi = std::fs::read(ws.join("out.dvi")).unwrap();
                let mut svg = FAKE_SVG_PREFIX.to_vec();
                svg.extend_from_slice(&dvi);
                std::fs::write(output_arg(inv), svg).unwrap();
                ToolOutput::ok("output written to out.svg")
            }
            "gs" if inv.args.iter().any(|a| a == "-sDEVICE=pdfwrite") => {
                std::fs::write(output_arg(inv), FAKE_COMPRESSED_PDF).unwrap();
                ToolOutput::ok("")
            }
            "gs" => {
                write_png(&output_arg(inv), dpi_arg(inv) * px_per_dpi);
                ToolOutput::ok("")
            }
            other => panic!("unexpected tool {other}"),
        }
    }
}

/// The typesetting engine fails with `log`; anything later panics.
fn failing_engine(log: &'static str) -> impl Fn(&ToolInvocation) -> ToolOutput + Send + Sync {
    move |inv| match inv.tool.as_str() {
        "latex" | "pdflatex" => ToolOutput::failed(1, log),
        other => panic!("{other} must not run after a failed typeset"),
    }
}

fn config(root: &Path) -> RenderConfigBuilder {
    RenderConfig::builder()
        .workspace_root(root)
        .ghostscript_bin("gs")
}

/// Route library logs through the test harness (`RUST_LOG=debug` to see them).
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn renderer(builder: RenderConfigBuilder, runner: &FakeRunner) -> Renderer<FakeRunner> {
    init_logs();
    Renderer::with_runner(builder.build().unwrap(), runner.clone()).unwrap()
}

fn assert_root_empty(root: &Path) {
    let left: Vec<_> = std::fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(left.is_empty(), "workspace not removed: {left:?}");
}

const SOURCE: &str =
    r"\documentclass[preview]{standalone}\begin{document}$a^2+b^2=c^2$\end{document}";

const DIMENSION_LOG: &str = "This is pdfTeX, Version 3.141592653\n(./out.tex\n\
! Dimension too large.\n<recently read> \\dimen@\nl.12 \\hspace{20000cm}\n";

const UNDEFINED_LOG: &str = "This is pdfTeX, Version 3.141592653\n(./out.tex\n\
! Undefined control sequence.\nl.3 \\foo\n\nNo pages of output.\n";

#[derive(Default)]
struct Recorder {
    states: Mutex<Vec<RenderState>>,
    oversized: Mutex<Vec<u32>>,
}

impl RenderObserver for Recorder {
    fn on_transition(&self, _format: OutputFormat, state: RenderState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_raster_oversized(&self, dpi: u32, _width: u32, _height: u32) {
        self.oversized.lock().unwrap().push(dpi);
    }
}

// ── SVG flow ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn svg_success_returns_svg_artifact() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(working_toolchain(1));
    let r = renderer(config(root.path()), &runner);

    let result = r.render_svg(SOURCE).await;

    let artifact = result.artifact().expect("success");
    assert_eq!(artifact.content_type, ContentType::Svg);
    assert_eq!(result.content_type().map(ContentType::mime), Some("image/svg+xml"));
    assert!(artifact.bytes.starts_with(FAKE_SVG_PREFIX));
    assert!(artifact.raster.is_none());
    assert_eq!(result.status_code(), 200);
    assert_eq!(runner.tools(), ["latex", "dvisvgm"]);
    assert_root_empty(root.path());
}

#[tokio::test]
async fn svg_invocations_match_tool_contract() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(working_toolchain(1));
    let r = renderer(config(root.path()), &runner);

    r.render_svg(SOURCE).await;

    let calls = runner.calls();
    let latex = &calls[0];
    assert_eq!(
        &latex.args[..3],
        ["-halt-on-error", "-interaction=nonstopmode", "-output-directory"]
    );
    assert!(latex.args[4].ends_with("/out.tex"));
    assert!(latex
        .working_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("svg-"));

    let dvisvgm = &calls[1];
    for flag in [
        "--bbox=preview",
        "--bitmap-format=none",
        "--font-format=woff2",
        "--optimize",
        "--relative",
    ] {
        assert!(dvisvgm.args.iter().any(|a| a == flag), "missing {flag}");
    }
    assert!(dvisvgm.args.last().unwrap().ends_with("/out.dvi"));
}

#[tokio::test]
async fn missing_dvi_is_unexpected() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(|inv: &ToolInvocation| match inv.tool.as_str() {
        "latex" => ToolOutput::ok("No pages of output."),
        other => panic!("{other} must not run without a DVI"),
    });
    let r = renderer(config(root.path()), &runner);

    let result = r.render_svg(SOURCE).await;

    assert!(matches!(result, ConversionResult::UnexpectedFailure { .. }));
    assert_eq!(result.status_code(), 500);
    assert_eq!(result.public_message(), Some(UNEXPECTED_MESSAGE));
    assert_eq!(runner.tools(), ["latex"]);
    assert_root_empty(root.path());
}

#[tokio::test]
async fn missing_pdf_is_unexpected() {
    for format in [OutputFormat::Pdf, OutputFormat::Png] {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(|inv: &ToolInvocation| match inv.tool.as_str() {
            "pdflatex" => ToolOutput::ok("No pages of output."),
            other => panic!("{other} must not run without a PDF"),
        });
        let r = renderer(config(root.path()), &runner);

        let result = r.render(format, SOURCE).await;

        assert!(
            matches!(result, ConversionResult::UnexpectedFailure { .. }),
            "{format}: {result:?}"
        );
        assert_eq!(result.public_message(), Some(UNEXPECTED_MESSAGE));
        assert_eq!(runner.tools(), ["pdflatex"], "{format}");
        assert_root_empty(root.path());
    }
}

#[tokio::test]
async fn dvisvgm_failure_is_unexpected() {
    let root = tempfile::tempdir().unwrap();
    let ok = working_toolchain(1);
    let runner = FakeRunner::new(move |inv: &ToolInvocation| match inv.tool.as_str() {
        "dvisvgm" => ToolOutput::failed(1, "ERROR: font file cmr10.pfb not found"),
        _ => ok(inv),
    });
    let r = renderer(config(root.path()), &runner);

    let result = r.render_svg(SOURCE).await;

    assert_eq!(result.error_code(), Some(ErrorCode::UnexpectedLatexError));
    assert_root_empty(root.path());
}

#[tokio::test]
async fn generic_fatal_line_is_latex_error() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(failing_engine(UNDEFINED_LOG));
    let r = renderer(config(root.path()), &runner);

    let result = r.render_svg(SOURCE).await;

    assert_eq!(
        result,
        ConversionResult::ClassifiedFailure {
            code: ErrorCode::LatexError,
            message: "Undefined control sequence.".into(),
        }
    );
    assert_eq!(result.status_code(), 400);
    assert!(!result.public_message().unwrap().contains("Unexpected"));
}

#[tokio::test]
async fn failure_without_marker_is_unexpected() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(failing_engine("kpathsea: Running mktexfmt latex.fmt\nfatal"));
    let r = renderer(config(root.path()), &runner);

    let result = r.render_pdf(SOURCE).await;

    assert_eq!(result.error_code(), Some(ErrorCode::UnexpectedLatexError));
    assert_eq!(result.public_message(), Some("Unexpected LaTeX Error"));
    assert_root_empty(root.path());
}

#[tokio::test]
async fn signature_is_checked_on_successful_exit() {
    let root = tempfile::tempdir().unwrap();
    let ok = working_toolchain(1);
    let runner = FakeRunner::new(move |inv: &ToolInvocation| match inv.tool.as_str() {
        "latex" => {
            ok(inv);
            ToolOutput::ok("! TeX capacity exceeded, sorry [main memory size=5000000].")
        }
        other => panic!("{other} must not run"),
    });
    let r = renderer(config(root.path()), &runner);

    let result = r.render_svg(SOURCE).await;

    assert_eq!(result.error_code(), Some(ErrorCode::TexCapacityExceeded));
    assert_eq!(result.public_message(), Some("TeX capacity exceeded"));
}

// ── Oversized geometry, every flow ───────────────────────────────────────────

#[tokio::test]
async fn oversized_geometry_is_classified_in_every_flow() {
    for format in [OutputFormat::Svg, OutputFormat::Pdf, OutputFormat::Png] {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(failing_engine(DIMENSION_LOG));
        let r = renderer(config(root.path()), &runner);

        let result = r.render(format, SOURCE).await;

        assert_eq!(
            result,
            ConversionResult::ClassifiedFailure {
                code: ErrorCode::DimensionTooLarge,
                message: "Dimension too large".into(),
            },
            "{format}"
        );
        assert_eq!(runner.calls().len(), 1, "{format}: conversion tool ran");
        assert_root_empty(root.path());
    }
}

#[tokio::test]
async fn signature_order_wins_over_fatal_line() {
    let root = tempfile::tempdir().unwrap();
    let log = "! Arithmetic overflow.\n! TeX capacity exceeded, sorry\n";
    let runner = FakeRunner::new(failing_engine(log));
    let r = renderer(config(root.path()), &runner);

    let result = r.render_pdf(SOURCE).await;

    assert_eq!(result.error_code(), Some(ErrorCode::ArithmeticOverflow));
}

// ── PDF flow ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_success_returns_compressed_file() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(working_toolchain(1));
    let r = renderer(config(root.path()), &runner);

    let result = r.render_pdf(SOURCE).await;

    let artifact = result.into_artifact().expect("success");
    assert_eq!(artifact.content_type, ContentType::Pdf);
    assert_eq!(artifact.bytes, FAKE_COMPRESSED_PDF);
    assert_eq!(runner.tools(), ["pdflatex", "gs"]);

    let gs = &runner.calls()[1];
    for flag in ["-dBATCH", "-dCompatibilityLevel=1.5", "-dNOPAUSE", "-sDEVICE=pdfwrite"] {
        assert!(gs.args.iter().any(|a| a == flag), "missing {flag}");
    }
    assert!(output_arg(gs).ends_with("out-comp.pdf"));
    assert!(gs.args.last().unwrap().ends_with("/out.pdf"));
    assert_root_empty(root.path());
}

#[tokio::test]
async fn pdf_compatibility_level_is_configurable() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(working_toolchain(1));
    let r = renderer(config(root.path()).pdf_compatibility_level("1.7"), &runner);

    r.render_pdf(SOURCE).await;

    assert!(runner.calls()[1]
        .args
        .iter()
        .any(|a| a == "-dCompatibilityLevel=1.7"));
}

// ── PNG flow and DPI ladder ──────────────────────────────────────────────────

#[tokio::test]
async fn png_stops_at_first_rung_that_fits() {
    let root = tempfile::tempdir().unwrap();
    // 600 dpi → 60000 px (too wide), 300 dpi → 30000 px (fits 32768).
    let runner = FakeRunner::new(working_toolchain(100));
    let recorder = Arc::new(Recorder::default());
    let r = renderer(config(root.path()).observer(recorder.clone()), &runner);

    let result = r.render_png(SOURCE).await;

    let artifact = result.artifact().expect("success");
    assert_eq!(artifact.content_type, ContentType::Png);
    let raster = artifact.raster.expect("raster info");
    assert_eq!((raster.dpi, raster.width, raster.height), (300, 30000, 1));
    assert!(raster.within_bounds);
    assert_eq!(image::load_from_memory(&artifact.bytes).unwrap().width(), 30000);

    let resolutions: Vec<u32> = runner
        .calls()
        .iter()
        .filter(|c| c.tool == "gs")
        .map(dpi_arg)
        .collect();
    assert_eq!(resolutions, [600, 300]);
    assert_eq!(*recorder.oversized.lock().unwrap(), [600]);

    let gs = &runner.calls()[1];
    assert!(gs.args.iter().any(|a| a == "-sDEVICE=pngmono"));
    assert_root_empty(root.path());
}

#[tokio::test]
async fn png_exhausted_ladder_returns_lowest_rung() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(working_toolchain(100));
    let r = renderer(config(root.path()).max_png_dimension(1000), &runner);

    let result = r.render_png(SOURCE).await;

    let artifact = result.artifact().expect("best-effort success");
    let raster = artifact.raster.expect("raster info");
    assert_eq!(raster.dpi, 16);
    assert_eq!(raster.width, 1600);
    assert!(!raster.within_bounds);
    assert_eq!(image::load_from_memory(&artifact.bytes).unwrap().width(), 1600);

    let resolutions: Vec<u32> = runner
        .calls()
        .iter()
        .filter(|c| c.tool == "gs")
        .map(dpi_arg)
        .collect();
    assert_eq!(resolutions, [600, 300, 200, 150, 100, 72, 16]);
    assert_root_empty(root.path());
}

#[tokio::test]
async fn png_ghostscript_failure_stops_the_ladder() {
    let root = tempfile::tempdir().unwrap();
    let ok = working_toolchain(1);
    let runner = FakeRunner::new(move |inv: &ToolInvocation| match inv.tool.as_str() {
        "gs" => ToolOutput::failed(1, "GPL Ghostscript 10.02.1: Unrecoverable error, exit code 1"),
        _ => ok(inv),
    });
    let r = renderer(config(root.path()), &runner);

    let result = r.render_png(SOURCE).await;

    assert!(matches!(result, ConversionResult::UnexpectedFailure { .. }));
    assert_eq!(runner.tools(), ["pdflatex", "gs"]);
    assert_root_empty(root.path());
}

#[tokio::test]
async fn png_custom_ladder_is_followed() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(working_toolchain(10));
    let r = renderer(
        config(root.path()).dpi_ladder(vec![144, 96]).max_png_dimension(1000),
        &runner,
    );

    let result = r.render_png(SOURCE).await;

    assert_eq!(result.artifact().and_then(|a| a.raster).map(|r| r.dpi), Some(96));
}

// ── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_source_is_rejected_before_any_tool() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(|inv: &ToolInvocation| panic!("{} must not run", inv.tool));
    let r = renderer(config(root.path()), &runner);

    for source in ["", "   \n\t\n"] {
        let result = r.render_svg(source).await;
        assert_eq!(
            result,
            ConversionResult::ClassifiedFailure {
                code: ErrorCode::LatexError,
                message: EMPTY_SOURCE_MESSAGE.into(),
            }
        );
    }
    assert!(runner.calls().is_empty());
    assert_root_empty(root.path());
}

#[tokio::test]
async fn empty_source_reaches_engine_when_allowed() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(failing_engine("! Emergency stop.\n<*> out.tex\n"));
    let r = renderer(config(root.path()).reject_empty_source(false), &runner);

    let result = r.render_pdf("").await;

    assert_eq!(result.public_message(), Some("Emergency stop."));
    assert_eq!(runner.tools(), ["pdflatex"]);
}

#[tokio::test]
async fn observer_sees_transitions_in_order() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(working_toolchain(1));
    let recorder = Arc::new(Recorder::default());
    let r = renderer(config(root.path()).observer(recorder.clone()), &runner);

    r.render_png(SOURCE).await;
    assert_eq!(
        *recorder.states.lock().unwrap(),
        [
            RenderState::WorkspaceReady,
            RenderState::SourceWritten,
            RenderState::Typeset,
            RenderState::Rasterizing { dpi: 600 },
            RenderState::Converted,
        ]
    );
}

#[tokio::test]
async fn observer_sees_classified_terminal_state() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(failing_engine(UNDEFINED_LOG));
    let recorder = Arc::new(Recorder::default());
    let r = renderer(config(root.path()).observer(recorder.clone()), &runner);

    r.render_svg(SOURCE).await;
    assert_eq!(
        *recorder.states.lock().unwrap(),
        [
            RenderState::WorkspaceReady,
            RenderState::SourceWritten,
            RenderState::ClassifiedFailure,
        ]
    );
}

#[tokio::test]
async fn workspace_prefix_follows_format() {
    for (format, prefix) in [
        (OutputFormat::Svg, "svg-"),
        (OutputFormat::Pdf, "pdf-"),
        (OutputFormat::Png, "png-"),
    ] {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(working_toolchain(1));
        let r = renderer(config(root.path()), &runner);

        r.render(format, SOURCE).await;

        let dir = runner.calls()[0].working_dir.clone();
        assert!(dir.starts_with(root.path()));
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(prefix), "{name} for {format}");
        assert!(!dir.exists());
    }
}

#[tokio::test]
async fn concurrent_requests_are_isolated() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new(working_toolchain(1));
    let r = Arc::new(renderer(config(root.path()), &runner));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let r = Arc::clone(&r);
            tokio::spawn(async move {
                let source = format!(
                    "\\documentclass{{standalone}}\\begin{{document}}request {i}\\end{{document}}"
                );
                let result = r.render_svg(&source).await;
                (source, result)
            })
        })
        .collect();

    for handle in handles {
        let (source, result) = handle.await.unwrap();
        let svg = result.into_artifact().expect("success").bytes;
        assert_eq!(&svg[FAKE_SVG_PREFIX.len()..], source.as_bytes());
    }

    let mut dirs: Vec<PathBuf> = runner
        .calls()
        .into_iter()
        .filter(|c| c.tool == "latex")
        .map(|c| c.working_dir)
        .collect();
    dirs.sort();
    dirs.dedup();
    assert_eq!(dirs.len(), 16);
    assert_root_empty(root.path());
}

// ── Entry points ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn render_to_file_writes_only_on_success() {
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let runner = FakeRunner::new(working_toolchain(1));
    let r = renderer(config(root.path()), &runner);
    let path = out.path().join("figures/eq.pdf");
    let result = r
        .render_to_file(OutputFormat::Pdf, SOURCE, &path)
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(std::fs::read(&path).unwrap(), FAKE_COMPRESSED_PDF);

    let runner = FakeRunner::new(failing_engine(UNDEFINED_LOG));
    let r = renderer(config(root.path()), &runner);
    let failed_path = out.path().join("broken.pdf");
    let result = r
        .render_to_file(OutputFormat::Pdf, SOURCE, &failed_path)
        .await
        .unwrap();
    assert_eq!(result.error_code(), Some(ErrorCode::LatexError));
    assert!(!failed_path.exists());
}

#[tokio::test]
async fn check_toolchain_reports_each_tool() {
    let runner = FakeRunner::new(|inv: &ToolInvocation| match inv.tool.as_str() {
        "dvisvgm" => ToolOutput::failed(127, "dvisvgm: command not found"),
        tool => ToolOutput::ok(format!("\n{tool} 3.141592653 (TeX Live 2023)\nmore\n")),
    });
    let config = RenderConfig::builder().ghostscript_bin("gs").build().unwrap();
    let r = Renderer::with_runner(config, runner).unwrap();

    let statuses = r.check_toolchain().await;

    let roles: Vec<_> = statuses.iter().map(|s| s.role).collect();
    assert_eq!(roles, ["latex", "pdflatex", "dvisvgm", "ghostscript"]);
    assert!(statuses[0].available);
    assert_eq!(statuses[0].version.as_deref(), Some("latex 3.141592653 (TeX Live 2023)"));
    assert!(!statuses[2].available);
    assert!(statuses[2].problem.is_some());
}

#[test]
fn invalid_config_is_rejected_by_renderer() {
    let config = RenderConfig {
        dpi_ladder: vec![300, 600],
        ..RenderConfig::default()
    };
    let runner = FakeRunner::new(|_: &ToolInvocation| ToolOutput::ok(""));
    assert!(matches!(
        Renderer::with_runner(config, runner),
        Err(RenderError::InvalidConfig(_))
    ));
}

// ── Timeouts and cancellation (real process runner) ─────────────────────────

/// Executable shell script `name` in `dir` running `body`.
#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Whether `pid` is still running. Reaped or zombie processes count as gone.
#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(unix)]
#[tokio::test]
async fn hung_engine_times_out_as_unexpected() {
    let root = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let latex = write_script(bin.path(), "latex", "exec sleep 30");
    init_logs();
    let r = Renderer::new(
        config(root.path())
            .latex_bin(latex.to_string_lossy())
            .tool_timeout_secs(1)
            .build()
            .unwrap(),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let result = r.render_svg(SOURCE).await;

    assert!(
        matches!(result, ConversionResult::UnexpectedFailure { .. }),
        "{result:?}"
    );
    assert_eq!(result.status_code(), 500);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_root_empty(root.path());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn dropped_render_kills_tool_and_removes_workspace() {
    let root = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let pid_file = bin.path().join("latex.pid");
    let latex = write_script(
        bin.path(),
        "latex",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    init_logs();
    let r = Renderer::new(
        config(root.path())
            .latex_bin(latex.to_string_lossy())
            .build()
            .unwrap(),
    )
    .unwrap();

    let abandoned =
        tokio::time::timeout(std::time::Duration::from_millis(500), r.render_svg(SOURCE)).await;
    assert!(abandoned.is_err(), "render finished early: {abandoned:?}");
    assert_root_empty(root.path());

    let pid: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let mut alive = process_alive(pid);
    for _ in 0..50 {
        if !alive {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        alive = process_alive(pid);
    }
    assert!(!alive, "latex (pid {pid}) still running after the render was dropped");
}
