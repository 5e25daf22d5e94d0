// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Per-phase execution context
//!
//! Modules receive the context alongside their inputs: it carries the
//! settings, the file system provider, the cache, the cancellation signal,
//! the documents visible from completed dependency pipelines, and the
//! current input set used to resolve live documents by identity.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cache::ExecutionCache;
use crate::config::{keys, Settings};
use crate::document::{Content, Document, DocumentId};
use crate::fs::FileSystem;
use crate::meta::Metadata;
use crate::pipeline::Phase;
use crate::script::ScriptEngine;

/// Execution state visible to modules during one phase
#[derive(Clone)]
pub struct ExecutionContext {
    pipeline: Arc<str>,
    phase: Phase,
    settings: Arc<Settings>,
    fs: Arc<dyn FileSystem>,
    cache: Arc<ExecutionCache>,
    script: Option<Arc<dyn ScriptEngine>>,
    // outputs of completed dependency pipelines, keyed lowercase; empty for
    // isolated pipelines
    dependency_outputs: Arc<HashMap<String, Vec<Document>>>,
    inputs: Arc<Vec<Document>>,
    cancel: CancellationToken,
    parent: Option<Arc<ExecutionContext>>,
}

impl ExecutionContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        pipeline: impl Into<Arc<str>>,
        phase: Phase,
        settings: Arc<Settings>,
        fs: Arc<dyn FileSystem>,
        cache: Arc<ExecutionCache>,
        script: Option<Arc<dyn ScriptEngine>>,
        dependency_outputs: HashMap<String, Vec<Document>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            phase,
            settings,
            fs,
            cache,
            script,
            dependency_outputs: Arc::new(dependency_outputs),
            inputs: Arc::new(Vec::new()),
            cancel,
            parent: None,
        }
    }

    /// Name of the executing pipeline
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// The phase currently executing
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn cache(&self) -> &Arc<ExecutionCache> {
        &self.cache
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether module steps may consult the cache this run
    pub fn caching_enabled(&self) -> bool {
        !self.settings.flag(keys::DISABLE_CACHE)
    }

    /// Whether the serial-execution debugging flag is set
    pub fn serial(&self) -> bool {
        self.settings.flag(keys::SERIAL_EXECUTION)
    }

    /// The document set entering the current module step
    pub fn inputs(&self) -> &[Document] {
        &self.inputs
    }

    /// Documents produced by a completed dependency pipeline; empty unless
    /// the pipeline declared (and completed) that dependency
    pub fn outputs_of(&self, pipeline: &str) -> &[Document] {
        self.dependency_outputs
            .get(&pipeline.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All documents visible from completed dependency pipelines
    pub fn dependency_documents(&self) -> impl Iterator<Item = &Document> {
        self.dependency_outputs.values().flatten()
    }

    /// Same level, different current input set
    pub(crate) fn with_inputs(&self, inputs: Vec<Document>) -> Self {
        Self {
            inputs: Arc::new(inputs),
            ..self.clone()
        }
    }

    /// A nested context (for modules that execute child chains); document
    /// searches ascend from the child into this one
    pub fn child(&self, inputs: Vec<Document>) -> Self {
        Self {
            inputs: Arc::new(inputs),
            parent: Some(Arc::new(self.clone())),
            ..self.clone()
        }
    }

    /// Find a live document by identity in the current input set, ascending
    /// through enclosing contexts
    pub fn find_document(&self, id: DocumentId) -> Option<Document> {
        let mut ctx = Some(self);
        while let Some(current) = ctx {
            if let Some(found) = current.inputs.iter().find(|d| d.id() == id) {
                return Some(found.clone());
            }
            ctx = current.parent.as_deref();
        }
        None
    }

    /// Create a document wired to this context's script engine
    pub fn new_document(&self, content: Content) -> Document {
        Document::new(content, self.base_metadata())
    }

    /// Empty metadata wired to this context's script engine
    pub fn base_metadata(&self) -> Metadata {
        match &self.script {
            Some(engine) => Metadata::new().with_script_engine(engine.clone()),
            None => Metadata::new(),
        }
    }

    /// Apply `f` to every document, preserving the input's relative order
    /// in the flattened result
    ///
    /// Documents are processed concurrently unless the serial-execution flag
    /// is set. A failure in any document aborts the remaining work.
    pub async fn for_each_document<F, Fut>(
        &self,
        inputs: Vec<Document>,
        f: F,
    ) -> anyhow::Result<Vec<Document>>
    where
        F: Fn(Document, ExecutionContext) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Vec<Document>>> + Send + 'static,
    {
        if self.serial() || inputs.len() <= 1 {
            let mut out = Vec::new();
            for doc in inputs {
                out.extend(f(doc, self.clone()).await?);
            }
            return Ok(out);
        }

        let count = inputs.len();
        let mut set = JoinSet::new();
        for (index, doc) in inputs.into_iter().enumerate() {
            let f = f.clone();
            let ctx = self.clone();
            set.spawn(async move { (index, f(doc, ctx).await) });
        }

        // results come back in completion order; reassemble by index
        let mut slots: Vec<Option<Vec<Document>>> = (0..count).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let (index, result) = joined.map_err(|e| anyhow!("document task failed: {e}"))?;
            slots[index] = Some(result?);
        }

        Ok(slots.into_iter().flatten().flatten().collect())
    }

    #[cfg(test)]
    pub(crate) fn for_tests(inputs: Vec<Document>) -> Self {
        use crate::fs::MemoryFileSystem;

        Self {
            pipeline: Arc::from("test"),
            phase: Phase::Process,
            settings: Arc::new(Settings::new()),
            fs: Arc::new(MemoryFileSystem::new()),
            cache: Arc::new(ExecutionCache::new()),
            script: None,
            dependency_outputs: Arc::new(HashMap::new()),
            inputs: Arc::new(inputs),
            cancel: CancellationToken::new(),
            parent: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_phase(self, phase: Phase) -> Self {
        Self { phase, ..self }
    }

    #[cfg(test)]
    pub(crate) fn with_settings(self, settings: Arc<Settings>) -> Self {
        Self { settings, ..self }
    }
}
