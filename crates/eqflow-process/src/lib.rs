//! # eqflow-process
//!
//! External tool adapter: discovery through an injectable [`ToolLocator`],
//! single-process execution through [`ProcessRunner::run`], and
//! producer/consumer chaining through [`ProcessRunner::run_chained`].
//!
//! This crate holds no pipeline policy. A nonzero exit is a value in
//! [`ProcessResult`]; only conditions where the process could not be run
//! to completion (missing executable, spawn failure, timeout) are
//! [`ProcessError`]s.

pub mod chain;
pub mod error;
pub mod locator;
pub mod runner;

pub use chain::{ChainResult, DEFAULT_CHANNEL_CAPACITY};
pub use error::ProcessError;
pub use locator::{SearchPath, ToolLocator};
pub use runner::{OutputMode, ProcessResult, ProcessRunner, ProcessSpec, exit_code};
