//! Content key computation.
//!
//! Provides [`ContentKey`], the hash identifying one rendered artifact.

use std::fmt;
use std::path::Path;

use bake_config::Theme;
use sha2::{Digest, Sha256};

/// Content-derived cache key of one diagram variant.
///
/// Covers everything that changes the artifact: the diagram source, the
/// theme and the artifact path. Moving a diagram to another ordinal, or
/// renaming its document, therefore produces a new key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey(String);

impl ContentKey {
    /// Compute the key for `source` rendered with `theme` to `output_path`.
    ///
    /// # Hash Format
    ///
    /// Hex SHA-256 of `"{trimmed source}:{theme}:{output path}"`.
    #[must_use]
    pub fn compute(source: &str, theme: Theme, output_path: &Path) -> Self {
        let content = format!(
            "{}:{}:{}",
            source.trim(),
            theme.as_str(),
            output_path.display()
        );
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Full hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Eight-character prefix for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "out/article-0.svg";

    #[test]
    fn test_same_inputs_same_key() {
        let key1 = ContentKey::compute("graph TD\nA-->B", Theme::Dark, Path::new(PATH));
        let key2 = ContentKey::compute("graph TD\nA-->B", Theme::Dark, Path::new(PATH));
        assert_eq!(key1, key2);
        // Hash is 64 hex characters (256 bits)
        assert_eq!(key1.as_str().len(), 64);
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let plain = ContentKey::compute("graph TD\nA-->B", Theme::Dark, Path::new(PATH));
        let padded = ContentKey::compute("\n  graph TD\nA-->B \n\n", Theme::Dark, Path::new(PATH));
        assert_eq!(plain, padded);
    }

    #[test]
    fn test_each_component_matters() {
        let base = ContentKey::compute("graph TD\nA-->B", Theme::Dark, Path::new(PATH));
        let source = ContentKey::compute("graph TD\nA-->C", Theme::Dark, Path::new(PATH));
        let theme = ContentKey::compute("graph TD\nA-->B", Theme::Default, Path::new(PATH));
        let path = ContentKey::compute("graph TD\nA-->B", Theme::Dark, Path::new("out/article-1.svg"));

        assert_ne!(base, source);
        assert_ne!(base, theme);
        assert_ne!(base, path);
    }

    #[test]
    fn test_known_digest() {
        // sha256("a:dark:b")
        let key = ContentKey::compute("a", Theme::Dark, Path::new("b"));
        let mut hasher = Sha256::new();
        hasher.update(b"a:dark:b");
        assert_eq!(key.as_str(), hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_empty_source_is_valid() {
        let key = ContentKey::compute("", Theme::Dark, Path::new(PATH));
        assert_eq!(key.as_str().len(), 64);
        assert_eq!(key.short().len(), 8);
        assert!(key.as_str().starts_with(key.short()));
    }
}
