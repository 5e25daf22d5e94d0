// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! # siteflow - Static-Content Build Orchestrator
//!
//! `siteflow` turns a set of named pipelines, each built from ordered
//! modules, into a dependency-ordered execution plan: independent pipelines
//! run concurrently, phases run in strict Input -> Process -> Transform ->
//! Output order, and an incremental cache skips module steps whose inputs
//! did not change.
//!
//! ## Features
//!
//! - **Pipeline orchestration** - dependency batching with cycle detection
//! - **Layered metadata** - copy-on-write document metadata with lazy values
//! - **Smart caching** - deterministic keys, single-flight recomputation
//! - **Cooperative cancellation** - distinct from failure in every report
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use siteflow::modules::{ReadFiles, WriteFiles};
//! use siteflow::{Engine, MemoryFileSystem, Phase, Pipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> siteflow::SiteflowResult<()> {
//! let engine = Engine::builder()
//!     .with_file_system(Arc::new(MemoryFileSystem::new()))
//!     .with_pipeline(
//!         Pipeline::builder("content")
//!             .with_module(Phase::Input, ReadFiles::new(["posts/*.md"]))
//!             .with_module(Phase::Output, WriteFiles::new())
//!             .build(),
//!     )
//!     .build()?;
//!
//! let report = engine.execute(&[], true, CancellationToken::new()).await?;
//! assert!(report.succeeded());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod errors;
pub mod events;
pub mod fs;
pub mod meta;
pub mod module;
pub mod modules;
pub mod pipeline;
pub mod script;

// Re-export commonly used types
pub use config::Settings;
pub use document::{Content, Document, DocumentId};
pub use errors::{SiteflowError, SiteflowResult};
pub use events::{EngineEvent, EventListener};
pub use fs::{FileSystem, MemoryFileSystem, StdFileSystem};
pub use meta::{FromValue, LazyValue, Metadata, Value};
pub use module::{ExecutionContext, Module, ModuleChain};
pub use pipeline::{
    Engine, EngineBuilder, ExecutionReport, ExitStatus, Phase, Pipeline, PipelineGraph,
};
pub use script::ScriptEngine;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
