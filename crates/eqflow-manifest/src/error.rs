//! Error types for manifest generation.

/// Errors raised while generating or persisting a build manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The design file named by the request does not exist.
    #[error("input file not found: {path}")]
    InputMissing { path: String },

    /// The sidecar manifest could not be written.
    #[error("failed to write manifest {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
