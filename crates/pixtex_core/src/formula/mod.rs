//! Renders `$...$` math fragments to images via an external TeX toolchain.
//!
//! Each fragment is written to its own TeX file in the scratch directory and
//! pushed through two stages, a compiler producing an intermediate file and a
//! converter producing the final image. Both stages come from a registered
//! [`ConvertProcess`] whose commands are rebuilt per call, see
//! [`RendererConfig`].

pub mod converter;
pub mod locator;
pub mod resolution;

pub use self::converter::{
    build_converter_command, convert_process, ConvertProcess, RendererConfig,
};
pub use self::locator::{locate_fragments, Fragment};
pub use self::resolution::estimate_resolution;

use crate::process::shell_output;
use once_cell::sync::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// File name prefix of the per-fragment temp files.
pub const TEMP_FILE_PREFIX: &str = "px-";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unusable font pixel height reported by the host: {reported}")]
    HostMetrics { reported: f64 },
    #[error("no convert process registered under `{0}`")]
    UnknownProcess(String),
    #[error("`{0}` not found in $PATH")]
    ProgramNotFound(String),
    #[error("{stage} stage exited with {code:?}: {stderr}")]
    Toolchain {
        stage: ToolchainStage,
        code: Option<i32>,
        stderr: String,
    },
    #[error("annotation placement failed: {0}")]
    Placement(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The two external stages every fragment goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainStage {
    Compile,
    Convert,
}

impl fmt::Display for ToolchainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => write!(f, "compile"),
            Self::Convert => write!(f, "convert"),
        }
    }
}

static SCRATCH_DIR: OnceCell<PathBuf> = OnceCell::new();

/// Process-wide scratch directory for the toolchain files, created on first
/// use.
///
/// It is never torn down while the process lives, the editor keeps
/// displaying images out of it.
pub fn scratch_dir() -> std::io::Result<&'static Path> {
    SCRATCH_DIR
        .get_or_try_init(|| {
            let dir = std::env::temp_dir().join(format!("pixtex-{}", std::process::id()));
            std::fs::create_dir_all(&dir)?;
            Ok(dir)
        })
        .map(PathBuf::as_path)
}

// Fragment files are numbered across calls, an image still displayed from an
// earlier call must not be overwritten by a later one.
static NEXT_FRAGMENT_ID: AtomicUsize = AtomicUsize::new(0);

/// What a render call covers.
#[derive(Debug, Clone, Copy)]
pub enum RenderTarget {
    /// Every fragment found in the text.
    Whole,
    /// One already located fragment.
    Fragment(Fragment),
}

/// One render call against a snapshot of buffer text.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Buffer text, lines joined with `\n`.
    pub text: &'a str,
    pub target: RenderTarget,
}

/// A fragment rendered to its final image.
#[derive(Debug, Clone)]
pub struct RenderedFragment {
    pub fragment: Fragment,
    pub image: PathBuf,
}

/// Summary of a completed render call.
#[derive(Debug, Default)]
pub struct RenderOutcome {
    /// Number of fragments rendered and handed to the sink.
    pub rendered: usize,
}

/// Receives each rendered fragment as soon as its image exists, so that
/// earlier annotations survive a failure in a later fragment.
#[async_trait::async_trait]
pub trait AnnotationSink: Send {
    /// Called before the toolchain runs for a fragment.
    fn fragment_started(&mut self, _source: &str) {}

    /// Called with the final image of a fragment.
    async fn fragment_rendered(&mut self, rendered: RenderedFragment) -> Result<(), RenderError>;
}

/// Sink that merely collects the images, for consumers outside the editor.
#[derive(Debug, Default)]
pub struct CollectImages {
    pub rendered: Vec<RenderedFragment>,
}

#[async_trait::async_trait]
impl AnnotationSink for CollectImages {
    async fn fragment_rendered(&mut self, rendered: RenderedFragment) -> Result<(), RenderError> {
        self.rendered.push(rendered);
        Ok(())
    }
}

/// Drives the external toolchain, one instance per render call.
#[derive(Debug)]
pub struct FormulaRenderer {
    config: RendererConfig,
    scratch_dir: PathBuf,
    prefix: &'static str,
    preamble: String,
}

impl FormulaRenderer {
    /// Sets up a renderer for one call: looks up the convert process, checks
    /// its programs exist and derives the converter command from `font_px`.
    pub fn new(process_name: &str, font_px: f64, preamble: String) -> Result<Self, RenderError> {
        Self::with_resolution(process_name, estimate_resolution(font_px)?, preamble)
    }

    /// Like [`FormulaRenderer::new`] with the resolution given directly,
    /// bypassing the host font metrics.
    pub fn with_resolution(
        process_name: &str,
        resolution: u32,
        preamble: String,
    ) -> Result<Self, RenderError> {
        let process = convert_process(process_name)?;

        for program in process.programs {
            which::which(program)
                .map_err(|_| RenderError::ProgramNotFound(program.to_string()))?;
        }

        Ok(Self {
            config: RendererConfig {
                process,
                resolution,
                converter_command: build_converter_command(process.converter_template, resolution),
            },
            scratch_dir: scratch_dir()?.to_path_buf(),
            prefix: TEMP_FILE_PREFIX,
            preamble,
        })
    }

    /// Renders the requested fragments in text order, feeding `sink` as each
    /// image is produced. The first stage failure aborts the call.
    pub async fn render(
        &self,
        request: RenderRequest<'_>,
        sink: &mut dyn AnnotationSink,
    ) -> Result<RenderOutcome, RenderError> {
        let fragments: Vec<Fragment> = match request.target {
            RenderTarget::Whole => locate_fragments(request.text, 0..request.text.len()).collect(),
            RenderTarget::Fragment(fragment) => vec![fragment],
        };

        let mut outcome = RenderOutcome::default();

        for fragment in fragments {
            let source = &request.text[fragment.start..fragment.end];
            sink.fragment_started(source);
            let rendered = self.render_fragment(fragment, source).await?;
            sink.fragment_rendered(rendered).await?;
            outcome.rendered += 1;
        }

        Ok(outcome)
    }

    async fn render_fragment(
        &self,
        fragment: Fragment,
        source: &str,
    ) -> Result<RenderedFragment, RenderError> {
        let n = NEXT_FRAGMENT_ID.fetch_add(1, Ordering::SeqCst);
        let base = self.scratch_dir.join(format!("{}{n}", self.prefix));

        let tex_file = base.with_extension("tex");
        let snippet = format!(
            "{}\n\\begin{{document}}\n${source}$\n\\end{{document}}\n",
            self.preamble
        );
        tokio::fs::write(&tex_file, snippet).await?;

        let compile_cmd = self
            .config
            .process
            .compiler_template
            .replace("%o", &self.scratch_dir.display().to_string())
            .replace("%f", &tex_file.display().to_string());
        self.run_stage(ToolchainStage::Compile, &compile_cmd).await?;

        let compiled = base.with_extension(self.config.process.image_input_type);
        let image = base.with_extension(self.config.process.image_output_type);
        let convert_cmd = self
            .config
            .converter_command
            .replace("%f", &compiled.display().to_string())
            .replace("%O", &image.display().to_string())
            .replace("%B", &base.display().to_string());
        self.run_stage(ToolchainStage::Convert, &convert_cmd).await?;

        Ok(RenderedFragment { fragment, image })
    }

    async fn run_stage(&self, stage: ToolchainStage, shell_cmd: &str) -> Result<(), RenderError> {
        tracing::debug!(%stage, cmd = shell_cmd, "Running toolchain stage");

        let output = shell_output(shell_cmd, &self.scratch_dir).await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(RenderError::Toolchain {
                stage,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Stands in for the real TeX chain: the compiler copies the TeX source
    // to the intermediate file, the converter copies that to the image.
    static STUB_PROCESS: ConvertProcess = ConvertProcess {
        programs: &["bash"],
        image_input_type: "int",
        image_output_type: "png",
        image_size_adjust: 1.0,
        compiler_template: "f=%f; cp \"$f\" \"${f%.tex}.int\"",
        converter_template: "cp %f %O",
    };

    static FAILING_PROCESS: ConvertProcess = ConvertProcess {
        programs: &["bash"],
        image_input_type: "int",
        image_output_type: "png",
        image_size_adjust: 1.0,
        compiler_template: "echo boom >&2; exit 2",
        converter_template: "cp %f %O",
    };

    fn stub_renderer(process: &'static ConvertProcess) -> FormulaRenderer {
        FormulaRenderer {
            config: RendererConfig::new(process, 20.0).unwrap(),
            scratch_dir: scratch_dir().unwrap().to_path_buf(),
            prefix: TEMP_FILE_PREFIX,
            preamble: "\\documentclass{article}".to_string(),
        }
    }

    #[test]
    fn test_scratch_dir_is_created_once() {
        let first = scratch_dir().unwrap();
        let second = scratch_dir().unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());

        let name = first.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, format!("pixtex-{}", std::process::id()));
    }

    #[tokio::test]
    async fn test_stub_toolchain_renders_every_fragment() {
        let renderer = stub_renderer(&STUB_PROCESS);
        let text = "a $x^2$ b $\\frac{1}{2}$ c";

        let mut sink = CollectImages::default();
        let outcome = renderer
            .render(
                RenderRequest {
                    text,
                    target: RenderTarget::Whole,
                },
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(outcome.rendered, 2);
        assert_eq!(sink.rendered.len(), 2);

        // The convert stage ran after the compile stage and the snippet made
        // it through both untouched.
        for (rendered, source) in sink.rendered.iter().zip(["x^2", "\\frac{1}{2}"]) {
            assert_eq!(rendered.image.extension().unwrap(), "png");
            let contents = std::fs::read_to_string(&rendered.image).unwrap();
            assert!(contents.starts_with("\\documentclass{article}"));
            assert!(contents.contains(&format!("${source}$")));
        }
    }

    #[tokio::test]
    async fn test_single_fragment_target() {
        let renderer = stub_renderer(&STUB_PROCESS);
        let text = "a $x^2$ b $y$ c";
        let fragment = locate_fragments(text, 0..text.len()).nth(1).unwrap();

        let mut sink = CollectImages::default();
        let outcome = renderer
            .render(
                RenderRequest {
                    text,
                    target: RenderTarget::Fragment(fragment),
                },
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(outcome.rendered, 1);
        let contents = std::fs::read_to_string(&sink.rendered[0].image).unwrap();
        assert!(contents.contains("$y$"));
    }

    #[tokio::test]
    async fn test_failing_stage_aborts_with_stderr() {
        let renderer = stub_renderer(&FAILING_PROCESS);

        let mut sink = CollectImages::default();
        let err = renderer
            .render(
                RenderRequest {
                    text: "$x$",
                    target: RenderTarget::Whole,
                },
                &mut sink,
            )
            .await
            .unwrap_err();

        match err {
            RenderError::Toolchain {
                stage,
                code,
                stderr,
            } => {
                assert_eq!(stage, ToolchainStage::Compile);
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(sink.rendered.is_empty());
    }
}
