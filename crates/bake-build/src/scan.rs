//! Document discovery by filesystem walking.

use std::fs;
use std::path::{Path, PathBuf};

/// Finds documents below a root directory.
///
/// Hidden entries (leading `.`) are skipped and symlinked directories are not
/// followed. Results are sorted so runs are deterministic.
#[derive(Debug)]
pub struct Scanner {
    root: PathBuf,
    extension: String,
}

impl Scanner {
    /// Create a scanner for files ending in `.{extension}`.
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// Scan the tree and return every matching file.
    ///
    /// Returns an empty Vec if the root directory doesn't exist.
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if self.root.is_dir() {
            self.scan_directory(&self.root, &mut files);
        } else {
            tracing::warn!(root = %self.root.display(), "input directory not found");
        }
        files.sort();
        files
    }

    fn scan_directory(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                return;
            }
        };

        for entry in entries.filter_map(Result::ok) {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            // DirEntry::file_type does not follow symlinks
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            let path = entry.path();
            if file_type.is_dir() {
                self.scan_directory(&path, files);
            } else if !file_type.is_symlink()
                && path.extension().is_some_and(|e| e == self.extension.as_str())
            {
                files.push(path);
            }
        }
    }
}
