//! Per-document diagram processing.
//!
//! One document goes through these steps:
//! 1. split front matter from body
//! 2. find diagram blocks, together with the output of earlier runs
//! 3. per block, look up every theme variant in the render cache and render
//!    the misses concurrently
//! 4. swap each fully rendered block for its image reference
//! 5. write the document back only if the body changed
//!
//! A failing diagram never aborts the document: its text is kept verbatim
//! and the next run tries again.

use std::path::{Path, PathBuf};

use bake_cache::{CacheStore, RenderCache};
use bake_config::{Config, Theme};
use bake_diagrams::{BlockParser, ContentKey, DiagramRenderer, alt_text, build_reference};
use futures::future::join_all;

use crate::document::Document;
use crate::stats::Statistics;

/// Result of processing one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The document contains no diagram block.
    NoDiagrams,
    /// Diagrams were found but the body came out identical.
    Unchanged,
    /// The document was rewritten.
    Updated,
}

/// Error preventing a document from being processed at all.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid front matter in {}: {source}", .path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One rendered image of a diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Theme the variant is rendered with.
    pub theme: Theme,
    /// Where the image is written.
    pub path: PathBuf,
    /// Public URL used in the image reference.
    pub url: String,
    /// Whether the reference points at this variant.
    pub primary: bool,
}

/// Document identity used for artifact naming and log lines.
struct DocumentFile {
    name: String,
    stem: String,
    rel_dir: PathBuf,
}

/// Processes documents against a render cache and renderer.
pub struct DocumentProcessor<'a, S, R> {
    config: &'a Config,
    cache: &'a RenderCache<S>,
    renderer: &'a R,
    parser: &'a dyn BlockParser,
}

impl<'a, S: CacheStore, R: DiagramRenderer> DocumentProcessor<'a, S, R> {
    /// Create a processor borrowing the batch's resources.
    pub fn new(
        config: &'a Config,
        cache: &'a RenderCache<S>,
        renderer: &'a R,
        parser: &'a dyn BlockParser,
    ) -> Self {
        Self {
            config,
            cache,
            renderer,
            parser,
        }
    }

    /// Process the document at `path`, adding diagram counters to `stats`.
    ///
    /// Diagram failures are counted in `stats` and do not make this fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read, its front matter is
    /// invalid, or the rewritten document cannot be written.
    pub async fn process(
        &self,
        path: &Path,
        stats: &mut Statistics,
    ) -> Result<FileOutcome, DocumentError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DocumentError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let document = Document::parse(&content).map_err(|source| DocumentError::FrontMatter {
            path: path.to_path_buf(),
            source,
        })?;

        let file = self.document_file(path);
        tracing::info!(
            file = %file.name,
            title = document.title().unwrap_or_default(),
            "processing document"
        );

        let original = document.body.as_str();
        let blocks = self.parser.find_blocks(original, &file.stem);
        if blocks.is_empty() {
            tracing::info!(file = %file.name, "no diagrams found");
            return Ok(FileOutcome::NoDiagrams);
        }
        stats.diagrams_found += blocks.len();

        // Splice by matched range. A block left unrendered keeps its original
        // text, including the reference of an earlier run.
        let mut body = String::with_capacity(original.len());
        let mut cursor = 0;
        for (ordinal, block) in blocks.iter().enumerate() {
            body.push_str(&original[cursor..block.range.start]);
            match self.render_block(&file, ordinal, &block.source, stats).await {
                Some(reference) => body.push_str(&reference),
                None => body.push_str(&original[block.range.clone()]),
            }
            cursor = block.range.end;
        }
        body.push_str(&original[cursor..]);

        if body == document.body {
            tracing::info!(file = %file.name, "document unchanged");
            return Ok(FileOutcome::Unchanged);
        }

        let updated = Document { body, ..document };
        tokio::fs::write(path, updated.render())
            .await
            .map_err(|source| DocumentError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(file = %file.name, diagrams = blocks.len(), "document updated");
        Ok(FileOutcome::Updated)
    }

    /// Render every variant of one block and build its reference.
    ///
    /// Returns `None` when the block must stay as it is.
    async fn render_block(
        &self,
        file: &DocumentFile,
        ordinal: usize,
        source: &str,
        stats: &mut Statistics,
    ) -> Option<String> {
        if source.trim().is_empty() {
            tracing::warn!(file = %file.name, ordinal, "empty diagram block left untouched");
            return None;
        }

        let artifacts = self.artifacts(&file.stem, &file.rel_dir, ordinal);

        let mut misses = Vec::new();
        for artifact in &artifacts {
            let key = ContentKey::compute(source, artifact.theme, &artifact.path);
            match self.cache.lookup(key.as_str()).await {
                Ok(Some(_)) => {
                    tracing::debug!(file = %file.name, ordinal, key = key.short(), "cache hit");
                }
                Ok(None) => misses.push((artifact, key)),
                Err(e) => {
                    tracing::error!(file = %file.name, ordinal, error = %e, "cache lookup failed");
                    stats.errors += 1;
                    misses.push((artifact, key));
                }
            }
        }

        if misses.is_empty() {
            stats.diagrams_cached += 1;
        } else {
            let results = join_all(
                misses
                    .iter()
                    .map(|(artifact, _)| self.renderer.render(source, &artifact.path, artifact.theme)),
            )
            .await;

            let mut failed = false;
            for ((artifact, key), result) in misses.iter().zip(results) {
                match result {
                    Ok(path) => {
                        if let Err(e) = self.cache.store(key.as_str(), &path).await {
                            tracing::error!(file = %file.name, ordinal, error = %e, "cache store failed");
                            stats.errors += 1;
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            file = %file.name,
                            ordinal,
                            theme = artifact.theme.as_str(),
                            error = %e,
                            "diagram render failed"
                        );
                        failed = true;
                    }
                }
            }

            if failed {
                tracing::error!(file = %file.name, ordinal, "diagram left unrendered");
                stats.errors += 1;
                return None;
            }
            stats.diagrams_rendered += 1;
            tracing::info!(file = %file.name, ordinal, variants = misses.len(), "diagram rendered");
        }

        let primary = artifacts.iter().find(|a| a.primary)?;
        Some(build_reference(
            &alt_text(source),
            &primary.url,
            source,
            self.config.source_style(),
        ))
    }

    /// Plan the artifacts of diagram `ordinal` in document `stem`.
    ///
    /// One artifact for a single theme; with `theme.both` a `light/` and a
    /// `dark/` variant, the primary one following `theme.default`.
    pub fn artifacts(&self, stem: &str, rel_dir: &Path, ordinal: usize) -> Vec<Artifact> {
        let output = &self.config.output;
        let file_name = format!("{stem}-{ordinal}.{}", output.format.extension());

        let variants = if self.config.theme.both {
            let light_primary = self.config.theme.default == Theme::Default;
            vec![
                (Theme::Default, Some("light"), light_primary),
                (Theme::Dark, Some("dark"), !light_primary),
            ]
        } else {
            vec![(self.config.theme.default, None, true)]
        };

        variants
            .into_iter()
            .map(|(theme, subdir, primary)| {
                let mut path = output.dir.clone();
                let mut segments = Vec::new();
                if let Some(subdir) = subdir {
                    path.push(subdir);
                    segments.push(subdir.to_owned());
                }
                path.push(rel_dir);
                path.push(&file_name);
                segments.extend(
                    rel_dir
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned()),
                );
                segments.push(file_name.clone());

                Artifact {
                    theme,
                    path,
                    url: join_url(&output.base_url, &segments),
                    primary,
                }
            })
            .collect()
    }

    fn document_file(&self, path: &Path) -> DocumentFile {
        let rel_dir = if self.config.output.preserve_tree {
            path.parent()
                .and_then(|p| p.strip_prefix(&self.config.input.dir).ok())
                .map(Path::to_path_buf)
                .unwrap_or_default()
        } else {
            PathBuf::new()
        };

        DocumentFile {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            stem: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            rel_dir,
        }
    }
}

/// Join URL segments onto a base, which may be empty for relative URLs.
fn join_url(base: &str, segments: &[String]) -> String {
    let rel = segments.join("/");
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        rel
    } else {
        format!("{base}/{rel}")
    }
}
