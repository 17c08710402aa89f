//! # eqflow-pipeline
//!
//! Orchestration core: drives external synthesis, mapping, and
//! equivalence-checking tools and reduces each run to one exit code.
//!
//! ```text
//! staged   preflight ─► manifest ─► interpreter ─► backend ─► verifier
//! direct   preflight ─────────────────────────────► backend ─► verifier
//! chained  preflight ─► frontend ══pipe══► transformer ───────► verifier
//!
//! every run ends with: cleanup ─► exit code
//! ```
//!
//! Every variant owns a [`PipelineRun`] whose [`ArtifactSet`] removes the
//! run's intermediates exactly once, on success and on every failure path.
//! The verifier never runs before the backend has succeeded, and a run
//! reports success only when both have.

pub mod artifacts;
pub mod chained;
pub mod config;
pub mod direct;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod staged;
pub mod verify;

pub use artifacts::{ArtifactSet, CleanupSummary};
pub use config::{ConfigError, Limits, SharePaths, ToolNames, Toolchain};
pub use error::{ErrorClass, PipelineError, Stage};
pub use pipeline::{Pipeline, PipelineRun, TransformRequest};
pub use policy::{EXIT_OK, EXIT_PREFLIGHT, EXIT_TIMEOUT, exit_code};
pub use report::{ManifestInfo, PipelineReport, StageRecord};
pub use verify::verification_spec;
