//! Tool discovery.
//!
//! Locating programs on `PATH` reads global process state, so discovery sits
//! behind [`ToolLocator`]; tests inject a [`SearchPath`] over a scratch
//! directory instead of mutating the environment.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Resolves a program name to an executable path.
pub trait ToolLocator: Send + Sync {
    fn locate(&self, program: &str) -> Option<PathBuf>;

    fn is_available(&self, program: &str) -> bool {
        self.locate(program).is_some()
    }
}

/// Ordered list of directories searched like `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Snapshot of the current `PATH`.
    pub fn from_env() -> Self {
        Self::from_path_var(std::env::var_os("PATH").as_deref())
    }

    pub fn from_path_var(value: Option<&OsStr>) -> Self {
        match value {
            Some(raw) => Self::new(std::env::split_paths(raw)),
            None => Self::default(),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl ToolLocator for SearchPath {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        let candidate = Path::new(program);
        // Names with a directory component are taken as paths, not searched.
        if candidate.components().count() > 1 || candidate.is_absolute() {
            return is_executable(candidate).then(|| candidate.to_path_buf());
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(program))
            .find(|path| is_executable(path))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
