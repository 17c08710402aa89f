//! Intermediate-artifact lifecycle.
//!
//! An [`ArtifactSet`] owns every file created to carry data between stages
//! of one run. [`ArtifactSet::release`] deletes them once; dropping an
//! unreleased set releases it, so no exit path skips cleanup. Deletion is
//! delete-if-present and best-effort: failures are logged, never returned.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Files removed (or found already absent) and files that could not be removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

#[derive(Debug)]
pub struct ArtifactSet {
    protected: Vec<PathBuf>,
    tracked: Vec<PathBuf>,
    released: bool,
}

impl ArtifactSet {
    /// `protected` paths (the caller's input and output) are never tracked.
    pub fn new<I, P>(protected: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            protected: protected
                .into_iter()
                .map(|path| normalize(path.as_ref()))
                .collect(),
            tracked: Vec::new(),
            released: false,
        }
    }

    /// Track `path` for removal. Returns false for protected or duplicate paths.
    pub fn track(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let key = normalize(&path);
        if self.protected.contains(&key) {
            tracing::warn!(path = %path.display(), "refusing to track a caller-owned file");
            return false;
        }
        if self.tracked.iter().any(|known| normalize(known) == key) {
            return false;
        }
        tracing::debug!(path = %path.display(), "tracking intermediate artifact");
        self.tracked.push(path);
        true
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.tracked
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Remove every tracked file. Later calls are no-ops.
    pub fn release(&mut self) -> CleanupSummary {
        let mut summary = CleanupSummary::default();
        if self.released {
            return summary;
        }
        self.released = true;

        for path in self.tracked.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => summary.removed.push(path),
                Err(err) if err.kind() == ErrorKind::NotFound => summary.removed.push(path),
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to remove intermediate artifact"
                    );
                    summary.failed.push((path, err.to_string()));
                }
            }
        }
        summary
    }
}

impl Drop for ArtifactSet {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.release();
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
