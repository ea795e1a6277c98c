//! Renderer double shared by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bake_config::Theme;
use bake_diagrams::{DiagramRenderer, RenderError};

/// Writes a tiny SVG per call. Fails for sources containing a marker, or for
/// one theme.
#[derive(Debug, Default)]
pub(crate) struct FakeRenderer {
    fail_marker: Option<String>,
    fail_theme: Option<Theme>,
    calls: Mutex<Vec<(PathBuf, Theme)>>,
}

impl FakeRenderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_owned()),
            ..Self::default()
        }
    }

    pub(crate) fn failing_for(theme: Theme) -> Self {
        Self {
            fail_theme: Some(theme),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<(PathBuf, Theme)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait]
impl DiagramRenderer for FakeRenderer {
    async fn render(
        &self,
        source: &str,
        output_path: &Path,
        theme: Theme,
    ) -> Result<PathBuf, RenderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((output_path.to_path_buf(), theme));

        let marked = self
            .fail_marker
            .as_deref()
            .is_some_and(|marker| source.contains(marker));
        if marked || self.fail_theme == Some(theme) {
            return Err(RenderError::Timeout(Duration::from_secs(60)));
        }

        let io_err = |source| RenderError::Io {
            path: output_path.to_path_buf(),
            source,
        };
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let svg = format!("<svg data-theme=\"{}\"></svg>", theme.as_str());
        tokio::fs::write(output_path, svg).await.map_err(io_err)?;
        Ok(output_path.to_path_buf())
    }
}
