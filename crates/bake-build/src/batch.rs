//! Batch orchestration over a document tree.

use bake_cache::{CacheError, CacheStore, RenderCache, SqliteStore};
use bake_config::Config;
use bake_diagrams::{DiagramRenderer, RegexBlockParser};

use crate::processor::DocumentProcessor;
use crate::scan::Scanner;
use crate::stats::Statistics;

/// Error aborting a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The render cache could not be opened.
    #[error("failed to open render cache: {0}")]
    Cache(#[from] CacheError),
}

/// One pre-render run over the configured input tree.
pub struct Batch<R> {
    config: Config,
    renderer: R,
    parser: RegexBlockParser,
}

impl<R: DiagramRenderer> Batch<R> {
    /// Create a batch rendering with `renderer`.
    pub fn new(config: Config, renderer: R) -> Self {
        Self {
            config,
            renderer,
            parser: RegexBlockParser::new(),
        }
    }

    /// Configuration of this batch.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the batch against the on-disk render cache.
    ///
    /// The cache is opened before any document is touched and closed before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Cache`] if the cache database cannot be opened.
    /// Per-document and per-diagram failures are only counted.
    pub async fn run(&self) -> Result<Statistics, BuildError> {
        let cache_path = self.config.cache_path();
        let store = SqliteStore::open(&cache_path).await?;
        tracing::info!(path = %cache_path.display(), "render cache ready");

        let cache = RenderCache::new(store);
        let stats = self.process_all(&cache).await;
        cache.close().await;
        Ok(stats)
    }

    /// Process every document under the input directory using `cache`.
    pub async fn process_all<S: CacheStore>(&self, cache: &RenderCache<S>) -> Statistics {
        let input = &self.config.input;
        let files = Scanner::new(&input.dir, &input.extension).scan();
        tracing::info!(
            input = %input.dir.display(),
            output = %self.config.output.dir.display(),
            theme = self.config.theme.default.as_str(),
            both_themes = self.config.theme.both,
            documents = files.len(),
            "starting batch"
        );

        let processor = DocumentProcessor::new(&self.config, cache, &self.renderer, &self.parser);
        let mut stats = Statistics {
            files_scanned: files.len(),
            ..Statistics::default()
        };

        for path in &files {
            match processor.process(path, &mut stats).await {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "failed to process document");
                    stats.errors += 1;
                }
            }
        }

        stats
    }
}
