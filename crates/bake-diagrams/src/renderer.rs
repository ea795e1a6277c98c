//! External renderer adapter.
//!
//! [`MermaidCli`] runs the Mermaid CLI (`mmdc`) once per diagram variant. The
//! source is piped through stdin, never through a shell, so quotes and other
//! metacharacters in diagrams need no escaping.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use bake_config::{Config, ImageFormat, Theme};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::consts::{DEFAULT_TIMEOUT, PNG_SIGNATURE, SVG_MARKER};

/// Error from a single render invocation.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Filesystem error around the artifact.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Renderer executable could not be started.
    #[error("failed to start renderer `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// Diagram source could not be written to the renderer.
    #[error("failed to pipe diagram source to renderer: {0}")]
    Stdin(#[source] std::io::Error),
    /// Renderer did not finish in time and was killed.
    #[error("renderer timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// Renderer exited unsuccessfully.
    #[error("renderer exited with {status}: {stderr}")]
    Exited { status: ExitStatus, stderr: String },
    /// Renderer reported success but the artifact is not a valid image.
    #[error("renderer output {} is not a valid {format}", .path.display())]
    Malformed { path: PathBuf, format: &'static str },
}

/// Renders one diagram source to an image file.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    /// Render `source` with `theme` into `output_path`.
    ///
    /// The image format follows the extension of `output_path`. Returns the
    /// written path on success.
    async fn render(
        &self,
        source: &str,
        output_path: &Path,
        theme: Theme,
    ) -> Result<PathBuf, RenderError>;
}

/// [`DiagramRenderer`] driving the Mermaid CLI as a subprocess.
///
/// Invocation: `<command> <args...> -i - -o <output> -t <theme> -b <background>`.
#[derive(Debug, Clone)]
pub struct MermaidCli {
    command: String,
    args: Vec<String>,
    background: String,
    timeout: Duration,
}

impl MermaidCli {
    /// Create a renderer running `command` with leading `args`.
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            background: "transparent".to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a renderer from the `[renderer]` and `[theme]` settings.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.renderer.command.clone(), config.renderer.args.clone())
            .with_background(config.theme.background.clone())
            .with_timeout(config.renderer.timeout)
    }

    /// Set the background colour passed with `-b`.
    #[must_use]
    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    /// Set the per-invocation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, source: &str, output_path: &Path, theme: Theme) -> Result<(), RenderError> {
        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RenderError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg("-i")
            .arg("-")
            .arg("-o")
            .arg(output_path)
            .arg("-t")
            .arg(theme.as_str())
            .arg("-b")
            .arg(&self.background)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let finished = async move {
            let mut piped = Ok(());
            if let Some(mut stdin) = stdin {
                piped = stdin.write_all(source.as_bytes()).await;
                // Closing stdin signals end of input
                drop(stdin);
            }
            // Collect the exit status even if the renderer stopped reading
            let output = child
                .wait_with_output()
                .await
                .map_err(|source| RenderError::Io {
                    path: output_path.to_path_buf(),
                    source,
                })?;
            Ok::<_, RenderError>((output, piped))
        };

        // Dropping the timed-out future drops the child, which kills it
        let (output, piped) = tokio::time::timeout(self.timeout, finished)
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(RenderError::Exited {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        piped.map_err(RenderError::Stdin)?;

        verify_artifact(output_path).await
    }
}

#[async_trait]
impl DiagramRenderer for MermaidCli {
    async fn render(
        &self,
        source: &str,
        output_path: &Path,
        theme: Theme,
    ) -> Result<PathBuf, RenderError> {
        tracing::info!(
            path = %output_path.display(),
            theme = theme.as_str(),
            "rendering diagram"
        );

        match self.run(source, output_path, theme).await {
            Ok(()) => Ok(output_path.to_path_buf()),
            Err(err) => {
                tracing::error!(
                    path = %output_path.display(),
                    theme = theme.as_str(),
                    error = %err,
                    "diagram render failed"
                );
                Err(err)
            }
        }
    }
}

/// Image format implied by the artifact extension.
fn format_of(path: &Path) -> ImageFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => ImageFormat::Png,
        _ => ImageFormat::Svg,
    }
}

/// Check that the renderer left a real image behind.
async fn verify_artifact(path: &Path) -> Result<(), RenderError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let format = format_of(path);
    let valid = match format {
        ImageFormat::Svg => String::from_utf8_lossy(&bytes).contains(SVG_MARKER),
        ImageFormat::Png => bytes.starts_with(PNG_SIGNATURE),
    };

    if valid {
        Ok(())
    } else {
        Err(RenderError::Malformed {
            path: path.to_path_buf(),
            format: format.extension(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Renderer running `script` under `sh -c`.
    ///
    /// Positional parameters follow the generated flags:
    /// `$1=-i $2=- $3=-o $4=<output> $5=-t $6=<theme> $7=-b $8=<background>`.
    fn shell(script: &str) -> MermaidCli {
        MermaidCli::new("sh", vec!["-c".to_owned(), script.to_owned(), "sh".to_owned()])
    }

    #[tokio::test]
    async fn test_render_svg_from_stdin() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("nested/dir/doc-0.svg");
        let renderer = shell(r#"{ printf '<svg data-theme="%s" data-bg="%s">' "$6" "$8"; cat; printf '</svg>'; } > "$4""#)
            .with_background("white");

        let path = renderer
            .render("graph TD\n  A[\"quoted\"] --> B", &out, Theme::Forest)
            .await
            .unwrap();

        assert_eq!(path, out);
        let svg = std::fs::read_to_string(&out).unwrap();
        assert!(svg.starts_with(r#"<svg data-theme="forest" data-bg="white">"#));
        assert!(svg.contains(r#"A["quoted"] --> B"#));
    }

    #[tokio::test]
    async fn test_render_png_signature_accepted() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("doc-0.png");
        let renderer = shell(r#"cat > /dev/null; printf '\211PNG\r\n\032\n' > "$4""#);

        renderer.render("pie", &out, Theme::Dark).await.unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("doc-0.svg");
        let renderer = shell("cat > /dev/null; echo 'Parse error on line 2' >&2; exit 3");

        let err = renderer.render("graph TD\n  A--", &out, Theme::Dark).await.unwrap_err();
        match err {
            RenderError::Exited { status, stderr } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "Parse error on line 2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_exit_without_reading_stdin_reports_stderr() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("doc-0.svg");
        let renderer = shell("echo 'Unknown theme' >&2; exit 2");
        // Larger than a pipe buffer, so the write hits a closed pipe
        let source = format!("graph TD\n{}", "  A-->B\n".repeat(100_000));

        let err = renderer.render(&source, &out, Theme::Dark).await.unwrap_err();
        match err {
            RenderError::Exited { status, stderr } => {
                assert_eq!(status.code(), Some(2));
                assert_eq!(stderr, "Unknown theme");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_output_rejected() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("doc-0.svg");
        let renderer = shell(r#"cat > /dev/null; echo 'not an image' > "$4""#);

        let err = renderer.render("graph TD", &out, Theme::Dark).await.unwrap_err();
        assert!(matches!(err, RenderError::Malformed { format: "svg", .. }));
    }

    #[tokio::test]
    async fn test_missing_output_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("doc-0.svg");
        let renderer = shell("cat > /dev/null");

        let err = renderer.render("graph TD", &out, Theme::Dark).await.unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_renderer() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("doc-0.svg");
        let renderer = shell("cat > /dev/null; sleep 5").with_timeout(Duration::from_millis(200));

        let err = renderer.render("graph TD", &out, Theme::Dark).await.unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("doc-0.svg");
        let renderer = MermaidCli::new("/nonexistent/bake-test-mmdc", Vec::new());

        let err = renderer.render("graph TD", &out, Theme::Dark).await.unwrap_err();
        assert!(matches!(err, RenderError::Spawn { .. }));
    }

    #[test]
    fn test_from_config() {
        let config = Config::default();
        let renderer = MermaidCli::from_config(&config);
        assert_eq!(renderer.command, "npx");
        assert_eq!(renderer.args, vec!["mmdc".to_owned()]);
        assert_eq!(renderer.background, "transparent");
        assert_eq!(renderer.timeout, Duration::from_secs(60));
    }
}
