// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Error types for the execution engine
//!
//! Configuration errors are detected before any phase runs and name the
//! offending pipeline(s). Execution errors are reported per pipeline and
//! never silently swallow the underlying module failure.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::Phase;

/// Result type for siteflow operations
pub type SiteflowResult<T> = Result<T, SiteflowError>;

/// Main error type for siteflow
#[derive(Error, Debug, Diagnostic)]
pub enum SiteflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline '{name}' is already registered")]
    #[diagnostic(
        code(siteflow::duplicate_pipeline),
        help("Pipeline names are case-insensitive; pick a distinct name")
    )]
    DuplicatePipeline { name: String },

    #[error("Unknown pipeline requested: '{name}'")]
    #[diagnostic(
        code(siteflow::unknown_pipeline),
        help("Register the pipeline before execution starts")
    )]
    UnknownPipeline { name: String },

    #[error("Pipeline '{pipeline}' depends on unknown pipeline '{dependency}'")]
    #[diagnostic(
        code(siteflow::unknown_dependency),
        help("Check that '{dependency}' is registered")
    )]
    UnknownDependency {
        pipeline: String,
        dependency: String,
    },

    #[error("Pipeline '{pipeline}' depends on isolated pipeline '{dependency}'")]
    #[diagnostic(
        code(siteflow::isolated_dependency),
        help("Isolated pipelines cannot be depended upon; clear the isolated flag or drop the dependency")
    )]
    IsolatedDependency {
        pipeline: String,
        dependency: String,
    },

    #[error("Circular pipeline dependency detected: {}", pipelines.join(" -> "))]
    #[diagnostic(
        code(siteflow::circular_dependency),
        help("Review your pipeline dependencies to remove the cycle")
    )]
    CircularDependency { pipelines: Vec<String> },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Module '{module}' failed in {phase} phase of pipeline '{pipeline}': {message}")]
    #[diagnostic(code(siteflow::module_failed))]
    ModuleFailed {
        pipeline: String,
        phase: Phase,
        module: String,
        message: String,
    },

    #[error("Pipeline '{pipeline}' did not run because dependency '{dependency}' failed")]
    #[diagnostic(code(siteflow::dependency_failed))]
    DependencyFailed {
        pipeline: String,
        dependency: String,
    },

    #[error("Execution was canceled")]
    #[diagnostic(code(siteflow::canceled))]
    Canceled,

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(siteflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(siteflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(siteflow::glob_error))]
    GlobPattern { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Cache Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Cache error: {message}")]
    #[diagnostic(code(siteflow::cache_error))]
    CacheError { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Settings/IO Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid settings: {message}")]
    #[diagnostic(code(siteflow::invalid_settings))]
    InvalidSettings { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(siteflow::io_error))]
    Io { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(siteflow::toml_error))]
    Toml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(siteflow::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for SiteflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for SiteflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json {
            message: e.to_string(),
        }
    }
}

impl From<toml::de::Error> for SiteflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml {
            message: e.to_string(),
        }
    }
}

impl From<glob::PatternError> for SiteflowError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern {
            message: e.to_string(),
        }
    }
}

impl SiteflowError {
    /// Wrap a module failure, unwrapping the root cause so the user sees
    /// the original error rather than an anyhow wrapper chain.
    pub fn module_failed(
        pipeline: &str,
        phase: Phase,
        module: &str,
        error: &anyhow::Error,
    ) -> Self {
        Self::ModuleFailed {
            pipeline: pipeline.to_string(),
            phase,
            module: module.to_string(),
            message: error.root_cause().to_string(),
        }
    }

    /// Whether this error represents a cancellation rather than a failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}
