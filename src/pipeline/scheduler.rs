// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Execution engine
//!
//! Walks the pipeline graph batch by batch: pipelines within a batch run as
//! independent tokio tasks (or sequentially under the serial-execution
//! flag), each pipeline runs its four phases in strict order, and finished
//! outputs accumulate in a per-run output table. One pipeline's failure
//! never cancels unrelated siblings, but dependents of a failed pipeline do
//! not start and the run as a whole reports failure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{CacheRegistry, CacheStats, ExecutionCache};
use crate::config::{keys, Settings};
use crate::document::Document;
use crate::errors::{SiteflowError, SiteflowResult};
use crate::events::{EngineEvent, EventBroadcaster, EventListener};
use crate::fs::{FileSystem, StdFileSystem};
use crate::module::ExecutionContext;
use crate::pipeline::{Phase, Pipeline, PipelineGraph};
use crate::script::ScriptEngine;

/// Terminal status of a run or a single pipeline
///
/// Aggregation takes the worst status, in severity order
/// Canceled > ExecutionError > Normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Normal,
    ExecutionError,
    Canceled,
}

impl ExitStatus {
    fn severity(self) -> u8 {
        match self {
            ExitStatus::Normal => 0,
            ExitStatus::ExecutionError => 1,
            ExitStatus::Canceled => 2,
        }
    }

    /// The more severe of the two statuses
    pub fn worst(self, other: ExitStatus) -> ExitStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Normal => write!(f, "normal"),
            ExitStatus::ExecutionError => write!(f, "execution error"),
            ExitStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Outcome of one pipeline within a run
#[derive(Debug)]
pub struct PipelineReport {
    pub name: String,
    pub status: ExitStatus,
    pub duration: Duration,
    pub error: Option<SiteflowError>,
    pub output_count: usize,
}

/// Outcome of a whole run
#[derive(Debug)]
pub struct ExecutionReport {
    pub status: ExitStatus,
    pub duration: Duration,
    pub pipelines: HashMap<String, PipelineReport>,
    pub cache: CacheStats,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.status == ExitStatus::Normal
    }

    /// Report for a pipeline, looked up case-insensitively
    pub fn pipeline(&self, name: &str) -> Option<&PipelineReport> {
        let lower = name.to_lowercase();
        self.pipelines
            .values()
            .find(|r| r.name.to_lowercase() == lower)
    }
}

/// Builder for [`Engine`]; the explicit configure-then-run registration step
pub struct EngineBuilder {
    pipelines: Vec<Pipeline>,
    settings: Settings,
    fs: Option<Arc<dyn FileSystem>>,
    script: Option<Arc<dyn ScriptEngine>>,
    events: EventBroadcaster,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            pipelines: Vec::new(),
            settings: Settings::new(),
            fs: None,
            script: None,
            events: EventBroadcaster::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn with_script_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.script = Some(engine);
        self
    }

    pub fn subscribe(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.events.subscribe(listener);
        self
    }

    /// Register everything and validate the graph before any phase can run
    pub fn build(self) -> SiteflowResult<Engine> {
        let mut graph = PipelineGraph::new();
        for pipeline in self.pipelines {
            graph.add(pipeline)?;
        }
        graph.validate()?;

        let cache = Arc::new(ExecutionCache::new());
        let registry = CacheRegistry::new();
        registry.register(&cache);

        Ok(Engine {
            graph,
            settings: Arc::new(self.settings),
            fs: self
                .fs
                .unwrap_or_else(|| Arc::new(StdFileSystem::new("."))),
            script: self.script,
            events: self.events,
            cache,
            registry,
            outputs: DashMap::new(),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The execution scheduler and its run-wide state
pub struct Engine {
    graph: PipelineGraph,
    settings: Arc<Settings>,
    fs: Arc<dyn FileSystem>,
    script: Option<Arc<dyn ScriptEngine>>,
    events: EventBroadcaster,
    cache: Arc<ExecutionCache>,
    registry: CacheRegistry,
    // pipeline name -> finalized documents; fully replaced each run
    outputs: DashMap<String, Vec<Document>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Execute the requested pipelines (plus their dependency closure)
    ///
    /// Returns `Err` only for configuration errors detected before any
    /// phase runs; pipeline failures and cancellation surface through the
    /// report's status.
    pub async fn execute(
        &self,
        requested: &[String],
        include_defaults: bool,
        cancel: CancellationToken,
    ) -> SiteflowResult<ExecutionReport> {
        let start = Instant::now();

        if self.settings.flag(keys::RESET_CACHE) {
            self.registry.reset_all();
            info!("cache reset for this run");
        }

        let excluded = self
            .settings
            .get::<Vec<String>>(keys::EXCLUDED_PIPELINES)
            .unwrap_or_default();
        let batches = self
            .graph
            .resolve_with_excluded(requested, include_defaults, &excluded)?;

        // the output table is fully replaced, never merged, across runs
        self.outputs.clear();

        let selected: Vec<String> = batches.iter().flatten().cloned().collect();
        info!(pipelines = ?selected, batches = batches.len(), "execution starting");
        self.events.emit(EngineEvent::BeforeEngineExecution {
            pipelines: selected,
        });

        let serial = self.settings.flag(keys::SERIAL_EXECUTION);
        let mut reports: HashMap<String, PipelineReport> = HashMap::new();
        let mut stopped_early = false;

        for batch in &batches {
            if cancel.is_cancelled() {
                stopped_early = true;
                break;
            }

            if serial {
                self.run_batch_serial(batch, &mut reports, &cancel).await;
            } else {
                self.run_batch_concurrent(batch, &mut reports, &cancel).await;
            }
        }

        let mut status = reports
            .values()
            .fold(ExitStatus::Normal, |acc, r| acc.worst(r.status));
        if stopped_early {
            status = status.worst(ExitStatus::Canceled);
        }

        let duration = start.elapsed();
        info!(status = %status, elapsed_ms = duration.as_millis() as u64, "execution finished");
        self.events.emit(EngineEvent::AfterEngineExecution { status, duration });

        Ok(ExecutionReport {
            status,
            duration,
            pipelines: reports,
            cache: self.cache.stats(),
        })
    }

    /// Snapshot of the per-pipeline output table from the last run
    pub fn outputs(&self) -> HashMap<String, Vec<Document>> {
        self.outputs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Flattened snapshot of output documents destined for HTML files
    pub fn output_pages(&self) -> Vec<Document> {
        let mut names: Vec<String> = self.outputs.iter().map(|e| e.key().clone()).collect();
        names.sort();

        names
            .iter()
            .filter_map(|name| self.outputs.get(name))
            .flat_map(|entry| entry.value().clone())
            .filter(|doc| {
                doc.destination()
                    .and_then(|p| p.extension())
                    .and_then(|e| e.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
                    .unwrap_or(false)
            })
            .collect()
    }

    async fn run_batch_serial(
        &self,
        batch: &[String],
        reports: &mut HashMap<String, PipelineReport>,
        cancel: &CancellationToken,
    ) {
        for name in batch {
            if let Some(report) = self.skip_for_failed_dependency(name, reports) {
                self.record(report, Vec::new(), reports);
                continue;
            }

            let job = self.job_for(name, cancel);
            let (report, docs) = run_pipeline(job).await;
            self.record(report, docs, reports);
        }
    }

    async fn run_batch_concurrent(
        &self,
        batch: &[String],
        reports: &mut HashMap<String, PipelineReport>,
        cancel: &CancellationToken,
    ) {
        let mut set: JoinSet<(PipelineReport, Vec<Document>)> = JoinSet::new();
        let mut spawned: HashSet<String> = HashSet::new();

        for name in batch {
            if let Some(report) = self.skip_for_failed_dependency(name, reports) {
                self.record(report, Vec::new(), reports);
                continue;
            }

            let job = self.job_for(name, cancel);
            spawned.insert(name.clone());
            set.spawn(run_pipeline(job));
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((report, docs)) => {
                    spawned.remove(&report.name);
                    self.record(report, docs, reports);
                }
                Err(join_err) => {
                    warn!(error = %join_err, "pipeline task aborted");
                }
            }
        }

        // tasks that died without reporting (a panic inside a module)
        for name in spawned {
            self.record(
                PipelineReport {
                    name: name.clone(),
                    status: ExitStatus::ExecutionError,
                    duration: Duration::ZERO,
                    error: Some(SiteflowError::ModuleFailed {
                        pipeline: name,
                        phase: Phase::Input,
                        module: "<unknown>".into(),
                        message: "pipeline task panicked".into(),
                    }),
                    output_count: 0,
                },
                Vec::new(),
                reports,
            );
        }
    }

    /// A dependent pipeline must not start if any of its direct
    /// dependencies did not finish normally
    fn skip_for_failed_dependency(
        &self,
        name: &str,
        reports: &HashMap<String, PipelineReport>,
    ) -> Option<PipelineReport> {
        let pipeline = self.graph.get(name)?;

        for dep in pipeline.dependencies() {
            let Some(dep_pipeline) = self.graph.get(dep) else {
                continue;
            };
            let failed = reports
                .get(&dep_pipeline.name().to_lowercase())
                .map(|r| r.status != ExitStatus::Normal)
                .unwrap_or(false);

            if failed {
                warn!(
                    pipeline = name,
                    dependency = dep_pipeline.name(),
                    "skipping pipeline: dependency did not finish normally"
                );
                return Some(PipelineReport {
                    name: pipeline.name().to_string(),
                    status: ExitStatus::ExecutionError,
                    duration: Duration::ZERO,
                    error: Some(SiteflowError::DependencyFailed {
                        pipeline: pipeline.name().to_string(),
                        dependency: dep_pipeline.name().to_string(),
                    }),
                    output_count: 0,
                });
            }
        }

        None
    }

    fn job_for(&self, name: &str, cancel: &CancellationToken) -> PipelineJob {
        let pipeline = self
            .graph
            .get(name)
            .expect("resolved batch names a registered pipeline")
            .clone();

        // an isolated pipeline sees no foreign documents at all; everyone
        // else sees the completed outputs of its dependency closure
        let visible = if pipeline.is_isolated() {
            HashMap::new()
        } else {
            self.graph
                .dependency_closure(name)
                .into_iter()
                .filter_map(|dep| {
                    self.outputs
                        .get(&dep)
                        .map(|entry| (dep.to_lowercase(), entry.value().clone()))
                })
                .collect()
        };

        PipelineJob {
            pipeline,
            visible_outputs: visible,
            settings: self.settings.clone(),
            fs: self.fs.clone(),
            cache: self.cache.clone(),
            script: self.script.clone(),
            events: self.events.clone(),
            cancel: cancel.clone(),
        }
    }

    fn record(
        &self,
        report: PipelineReport,
        docs: Vec<Document>,
        reports: &mut HashMap<String, PipelineReport>,
    ) {
        self.events.emit(EngineEvent::PipelineFinished {
            pipeline: report.name.clone(),
            status: report.status,
        });

        if report.status == ExitStatus::Normal {
            self.outputs.insert(report.name.clone(), docs);
        }

        reports.insert(report.name.to_lowercase(), report);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pipelines", &self.graph.names())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

/// Everything one pipeline task needs, snapshotted before spawn
struct PipelineJob {
    pipeline: Arc<Pipeline>,
    visible_outputs: HashMap<String, Vec<Document>>,
    settings: Arc<Settings>,
    fs: Arc<dyn FileSystem>,
    cache: Arc<ExecutionCache>,
    script: Option<Arc<dyn ScriptEngine>>,
    events: EventBroadcaster,
    cancel: CancellationToken,
}

/// Run one pipeline's four phases in strict order
async fn run_pipeline(job: PipelineJob) -> (PipelineReport, Vec<Document>) {
    let name = job.pipeline.name().to_string();
    let start = Instant::now();

    job.events.emit(EngineEvent::PipelineStarted {
        pipeline: name.clone(),
    });
    info!(pipeline = %name, "pipeline started");

    let mut docs: Vec<Document> = Vec::new();
    let mut status = ExitStatus::Normal;
    let mut error: Option<SiteflowError> = None;

    for phase in Phase::ALL {
        if job.cancel.is_cancelled() {
            status = ExitStatus::Canceled;
            error = Some(SiteflowError::Canceled);
            break;
        }

        let chain = job.pipeline.modules(phase);
        if chain.is_empty() {
            continue;
        }

        let ctx = ExecutionContext::new(
            name.as_str(),
            phase,
            job.settings.clone(),
            job.fs.clone(),
            job.cache.clone(),
            job.script.clone(),
            job.visible_outputs.clone(),
            job.cancel.clone(),
        );

        match chain.execute(std::mem::take(&mut docs), &ctx).await {
            Ok(next) => docs = next,
            Err(e) => {
                status = if e.is_canceled() {
                    ExitStatus::Canceled
                } else {
                    ExitStatus::ExecutionError
                };
                warn!(pipeline = %name, phase = %phase, error = %e, "pipeline aborted");
                error = Some(e);
                break;
            }
        }
    }

    let duration = start.elapsed();
    if status == ExitStatus::Normal {
        info!(
            pipeline = %name,
            documents = docs.len(),
            elapsed_ms = duration.as_millis() as u64,
            "pipeline finished"
        );
    } else {
        docs = Vec::new();
    }

    let report = PipelineReport {
        name,
        status,
        duration,
        error,
        output_count: docs.len(),
    };
    (report, docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Content;
    use crate::fs::MemoryFileSystem;
    use crate::modules::{Execute, ReadFiles, SetMetadata, WriteFiles};
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Input-phase module that originates one in-memory document
    fn produce(name: &str, text: &str) -> Execute {
        let text = text.to_string();
        Execute::new(name, move |mut docs: Vec<Document>, ctx: ExecutionContext| {
            let text = text.clone();
            async move {
                docs.push(ctx.new_document(Content::from_string(text)));
                Ok(docs)
            }
        })
    }

    fn builder_with_memory_fs() -> EngineBuilder {
        Engine::builder().with_file_system(Arc::new(MemoryFileSystem::new()))
    }

    #[tokio::test]
    async fn test_requesting_b_runs_exactly_a_then_b_and_never_c() {
        // the canonical scenario: A (no deps), B (depends on A),
        // C (isolated, no deps)
        let seen_by_b = Arc::new(AtomicU32::new(0));
        let b_input = {
            let seen_by_b = seen_by_b.clone();
            Execute::new("observe", move |docs: Vec<Document>, ctx: ExecutionContext| {
                let seen_by_b = seen_by_b.clone();
                async move {
                    seen_by_b.store(ctx.outputs_of("A").len() as u32, Ordering::SeqCst);
                    assert!(ctx.outputs_of("C").is_empty());
                    Ok(docs)
                }
            })
        };

        let engine = builder_with_memory_fs()
            .with_pipeline(
                Pipeline::builder("A")
                    .with_module(Phase::Input, produce("make-a", "from a"))
                    .build(),
            )
            .with_pipeline(
                Pipeline::builder("B")
                    .with_dependency("A")
                    .with_module(Phase::Input, b_input)
                    .build(),
            )
            .with_pipeline(
                Pipeline::builder("C")
                    .isolated(true)
                    .with_module(Phase::Input, produce("make-c", "from c"))
                    .build(),
            )
            .build()
            .unwrap();

        let report = engine
            .execute(&["B".to_string()], false, CancellationToken::new())
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.pipelines.len(), 2);
        assert!(report.pipeline("A").is_some());
        assert!(report.pipeline("B").is_some());
        assert!(report.pipeline("C").is_none());
        // B's Input phase saw A's single output document
        assert_eq!(seen_by_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_isolated_pipeline_sees_no_foreign_documents() {
        let foreign_seen = Arc::new(AtomicU32::new(u32::MAX));
        let iso_input = {
            let foreign_seen = foreign_seen.clone();
            Execute::new("observe", move |docs: Vec<Document>, ctx: ExecutionContext| {
                let foreign_seen = foreign_seen.clone();
                async move {
                    foreign_seen.store(
                        ctx.dependency_documents().count() as u32,
                        Ordering::SeqCst,
                    );
                    Ok(docs)
                }
            })
        };

        let engine = builder_with_memory_fs()
            .with_pipeline(
                Pipeline::builder("base")
                    .with_module(Phase::Input, produce("make", "doc"))
                    .build(),
            )
            .with_pipeline(
                Pipeline::builder("iso")
                    .isolated(true)
                    // ordering after base still holds, visibility does not
                    .with_dependency("base")
                    .with_module(Phase::Input, iso_input)
                    .build(),
            )
            .build()
            .unwrap();

        let report = engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(foreign_seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_skips_dependents_but_not_siblings() {
        let engine = builder_with_memory_fs()
            .with_pipeline(
                Pipeline::builder("broken")
                    .with_module(
                        Phase::Input,
                        Execute::new("fail", |_docs, _ctx| async {
                            Err::<Vec<Document>, _>(anyhow::anyhow!("input exploded"))
                        }),
                    )
                    .build(),
            )
            .with_pipeline(
                Pipeline::builder("dependent")
                    .with_dependency("broken")
                    .with_module(Phase::Input, produce("make", "never runs"))
                    .build(),
            )
            .with_pipeline(
                Pipeline::builder("sibling")
                    .with_module(Phase::Input, produce("make", "survives"))
                    .build(),
            )
            .build()
            .unwrap();

        let report = engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.status, ExitStatus::ExecutionError);
        assert_eq!(
            report.pipeline("broken").unwrap().status,
            ExitStatus::ExecutionError
        );
        assert!(matches!(
            report.pipeline("dependent").unwrap().error,
            Some(SiteflowError::DependencyFailed { .. })
        ));
        assert_eq!(
            report.pipeline("sibling").unwrap().status,
            ExitStatus::Normal
        );

        // the failed run still publishes what succeeded
        let outputs = engine.outputs();
        assert_eq!(outputs["sibling"].len(), 1);
        assert!(!outputs.contains_key("broken"));
    }

    #[tokio::test]
    async fn test_cancellation_is_distinct_from_failure() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let engine = builder_with_memory_fs()
            .with_pipeline(
                Pipeline::builder("never")
                    .with_module(Phase::Input, produce("make", "x"))
                    .build(),
            )
            .build()
            .unwrap();

        let report = engine.execute(&[], true, cancel).await.unwrap();

        assert_eq!(report.status, ExitStatus::Canceled);
        assert!(report.pipelines.is_empty());
        assert!(engine.outputs().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_run_stops_later_batches() {
        let cancel = CancellationToken::new();
        let canceler = {
            let cancel = cancel.clone();
            Execute::new("canceler", move |docs: Vec<Document>, _ctx| {
                let cancel = cancel.clone();
                async move {
                    cancel.cancel();
                    Ok(docs)
                }
            })
        };

        let engine = builder_with_memory_fs()
            .with_pipeline(
                Pipeline::builder("first")
                    .with_module(Phase::Input, produce("make", "x"))
                    .with_module(Phase::Process, canceler)
                    // the chain checks cancellation before the next step
                    .with_module(Phase::Process, SetMetadata::new("Late", true))
                    .build(),
            )
            .with_pipeline(
                Pipeline::builder("second")
                    .with_dependency("first")
                    .with_module(Phase::Input, produce("make", "y"))
                    .build(),
            )
            .build()
            .unwrap();

        let report = engine.execute(&[], true, cancel).await.unwrap();

        assert_eq!(report.status, ExitStatus::Canceled);
        assert_eq!(
            report.pipeline("first").unwrap().status,
            ExitStatus::Canceled
        );
        // the dependent batch never launched
        assert!(report.pipeline("second").is_none());
    }

    #[tokio::test]
    async fn test_outputs_are_replaced_not_merged_across_runs() {
        let engine = builder_with_memory_fs()
            .with_pipeline(
                Pipeline::builder("left")
                    .with_module(Phase::Input, produce("make", "left doc"))
                    .build(),
            )
            .with_pipeline(
                Pipeline::builder("right")
                    .with_module(Phase::Input, produce("make", "right doc"))
                    .build(),
            )
            .build()
            .unwrap();

        engine
            .execute(&["left".to_string()], false, CancellationToken::new())
            .await
            .unwrap();
        assert!(engine.outputs().contains_key("left"));

        engine
            .execute(&["right".to_string()], false, CancellationToken::new())
            .await
            .unwrap();

        let outputs = engine.outputs();
        assert!(outputs.contains_key("right"));
        assert!(!outputs.contains_key("left"));
    }

    #[tokio::test]
    async fn test_incremental_rerun_skips_unchanged_process_step() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = {
            let calls = calls.clone();
            Execute::new("transform", move |docs: Vec<Document>, _ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(docs)
                }
            })
            .cacheable()
        };

        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("page.md", "stable content");

        let engine = Engine::builder()
            .with_file_system(fs)
            .with_pipeline(
                Pipeline::builder("content")
                    .with_module(Phase::Input, ReadFiles::new(["*.md"]))
                    .with_module(Phase::Process, counted)
                    .build(),
            )
            .build()
            .unwrap();

        engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();
        engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(engine.cache_stats().hits >= 1);
    }

    #[tokio::test]
    async fn test_disable_cache_setting_forces_recompute() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = {
            let calls = calls.clone();
            Execute::new("transform", move |docs: Vec<Document>, _ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(docs)
                }
            })
            .cacheable()
        };

        let engine = builder_with_memory_fs()
            .with_settings(Settings::new().with(keys::DISABLE_CACHE, true))
            .with_pipeline(
                Pipeline::builder("content")
                    .with_module(Phase::Input, produce("make", "doc"))
                    .with_module(Phase::Process, counted)
                    .build(),
            )
            .build()
            .unwrap();

        engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();
        engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reset_cache_setting_clears_between_runs() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = {
            let calls = calls.clone();
            Execute::new("transform", move |docs: Vec<Document>, _ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(docs)
                }
            })
            .cacheable()
        };

        let engine = builder_with_memory_fs()
            .with_settings(Settings::new().with(keys::RESET_CACHE, true))
            .with_pipeline(
                Pipeline::builder("content")
                    .with_module(Phase::Input, produce("make", "doc"))
                    .with_module(Phase::Process, counted)
                    .build(),
            )
            .build()
            .unwrap();

        engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();
        engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_serial_execution_flag() {
        let engine = builder_with_memory_fs()
            .with_settings(Settings::new().with(keys::SERIAL_EXECUTION, true))
            .with_pipeline(
                Pipeline::builder("one")
                    .with_module(Phase::Input, produce("make", "1"))
                    .build(),
            )
            .with_pipeline(
                Pipeline::builder("two")
                    .with_module(Phase::Input, produce("make", "2"))
                    .build(),
            )
            .build()
            .unwrap();

        let report = engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(engine.outputs().len(), 2);
    }

    #[tokio::test]
    async fn test_excluded_pipelines_setting() {
        let engine = builder_with_memory_fs()
            .with_settings(Settings::new().with(keys::EXCLUDED_PIPELINES, vec!["drafts"]))
            .with_pipeline(
                Pipeline::builder("published")
                    .with_module(Phase::Input, produce("make", "p"))
                    .build(),
            )
            .with_pipeline(
                Pipeline::builder("drafts")
                    .with_module(Phase::Input, produce("make", "d"))
                    .build(),
            )
            .build()
            .unwrap();

        let report = engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();

        assert!(report.pipeline("published").is_some());
        assert!(report.pipeline("drafts").is_none());
    }

    #[tokio::test]
    async fn test_end_to_end_write_and_output_pages() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("pages/index.html", "<h1>home</h1>");
        fs.add_file("pages/style.css", "body {}");

        let engine = Engine::builder()
            .with_file_system(fs.clone())
            .with_settings(Settings::new().with(keys::OUTPUT_PATH, "out"))
            .with_pipeline(
                Pipeline::builder("site")
                    .with_module(Phase::Input, ReadFiles::new(["pages/*"]))
                    .with_module(Phase::Process, SetMetadata::new("Site", "demo"))
                    .with_module(Phase::Output, WriteFiles::new())
                    .build(),
            )
            .build()
            .unwrap();

        let report = engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();
        assert!(report.succeeded());

        // persisted through the provider under the output root
        assert!(fs.exists(Path::new("out/pages/index.html")).await);
        assert!(fs.exists(Path::new("out/pages/style.css")).await);

        // output pages filter to html destinations
        let pages = engine.output_pages();
        assert_eq!(pages.len(), 1);
        assert_eq!(
            pages[0].destination().unwrap(),
            Path::new("pages/index.html")
        );
        assert_eq!(pages[0].get::<String>("Site"), Some("demo".into()));
    }

    #[tokio::test]
    async fn test_event_hooks_fire_around_execution() {
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let listener = {
            let events = events.clone();
            Arc::new(move |event: &EngineEvent| {
                let tag = match event {
                    EngineEvent::BeforeEngineExecution { .. } => "before".to_string(),
                    EngineEvent::AfterEngineExecution { status, .. } => {
                        format!("after:{status}")
                    }
                    EngineEvent::PipelineStarted { pipeline } => format!("start:{pipeline}"),
                    EngineEvent::PipelineFinished { pipeline, .. } => {
                        format!("finish:{pipeline}")
                    }
                };
                events.lock().unwrap().push(tag);
            })
        };

        let engine = builder_with_memory_fs()
            .subscribe(listener)
            .with_pipeline(
                Pipeline::builder("only")
                    .with_module(Phase::Input, produce("make", "x"))
                    .build(),
            )
            .build()
            .unwrap();

        engine
            .execute(&[], true, CancellationToken::new())
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            ["before", "start:only", "finish:only", "after:normal"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_pipeline_rejected_at_build() {
        let result = builder_with_memory_fs()
            .with_pipeline(Pipeline::builder("same").build())
            .with_pipeline(Pipeline::builder("SAME").build())
            .build();

        assert!(matches!(
            result,
            Err(SiteflowError::DuplicatePipeline { .. })
        ));
    }

    #[tokio::test]
    async fn test_cycle_rejected_at_build() {
        let result = builder_with_memory_fs()
            .with_pipeline(Pipeline::builder("a").with_dependency("b").build())
            .with_pipeline(Pipeline::builder("b").with_dependency("a").build())
            .build();

        match result {
            Err(SiteflowError::CircularDependency { pipelines }) => {
                assert!(!pipelines.is_empty());
            }
            other => panic!("expected cycle error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_status_severity_ordering() {
        assert_eq!(
            ExitStatus::Normal.worst(ExitStatus::ExecutionError),
            ExitStatus::ExecutionError
        );
        assert_eq!(
            ExitStatus::ExecutionError.worst(ExitStatus::Canceled),
            ExitStatus::Canceled
        );
        assert_eq!(
            ExitStatus::Canceled.worst(ExitStatus::Normal),
            ExitStatus::Canceled
        );
    }
}
