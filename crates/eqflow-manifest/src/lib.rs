//! # eqflow-manifest
//!
//! Request model and build-manifest generation for eqflow pipelines.
//!
//! A [`PipelineRequest`] fully determines its manifest: the same input path,
//! backend, target kind, and [`ManifestFlags`] always render byte-identical
//! text. Generation is pure templating plus one library-path lookup; the
//! only filesystem effects are the input existence check and
//! [`BuildManifest::write`].
//!
//! ```text
//! PipelineRequest ──► BuildManifest::build ──► render() ──► <input>.mk
//!                            │
//!                      Libraries::techmap(backend)
//! ```

pub mod error;
pub mod manifest;
pub mod request;

pub use error::ManifestError;
pub use manifest::{BuildManifest, Libraries, Rule, SynthesisTools, Variable, generate};
pub use request::{
    Backend, ManifestFlags, PipelineRequest, PortSplitMode, TargetKind, TechLibrary, sidecar_path,
};
