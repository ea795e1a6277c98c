//! Per-run processing statistics.

use crate::processor::FileOutcome;

/// Counters collected over one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Documents found by the scanner.
    pub files_scanned: usize,
    /// Documents rewritten.
    pub files_updated: usize,
    /// Documents with diagrams whose content did not change.
    pub files_unchanged: usize,
    /// Documents without any diagram block.
    pub files_without_diagrams: usize,
    /// Diagram blocks found, including ones that failed.
    pub diagrams_found: usize,
    /// Diagrams with at least one variant rendered in this run.
    pub diagrams_rendered: usize,
    /// Diagrams whose variants were all served from the cache.
    pub diagrams_cached: usize,
    /// Failed diagrams, failed documents and cache query failures.
    pub errors: usize,
}

impl Statistics {
    /// Count a processed document.
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::NoDiagrams => self.files_without_diagrams += 1,
            FileOutcome::Unchanged => self.files_unchanged += 1,
            FileOutcome::Updated => self.files_updated += 1,
        }
    }
}
