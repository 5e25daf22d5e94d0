// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Built-in modules
//!
//! The engine implements no content transforms; these are the boundary
//! modules that originate documents from the file system provider, persist
//! them, and stamp metadata, plus a closure module for ad-hoc steps.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use async_trait::async_trait;
use tracing::debug;

use crate::config::{keys, DEFAULT_OUTPUT_PATH};
use crate::document::{Content, Document};
use crate::meta::Value;
use crate::module::{ExecutionContext, Module};
use crate::pipeline::Phase;

/// Originate one document per file matching the given glob patterns
///
/// Content stays file-backed until a downstream module reads it. Only valid
/// in the Input phase, the one phase allowed to originate documents.
pub struct ReadFiles {
    patterns: Vec<String>,
}

impl ReadFiles {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Module for ReadFiles {
    fn name(&self) -> &str {
        "ReadFiles"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Vec<Document>> {
        if ctx.phase() != Phase::Input {
            bail!("ReadFiles may only run in the Input phase");
        }

        let mut docs = inputs;
        for pattern in &self.patterns {
            let paths = ctx
                .fs()
                .list(pattern)
                .await
                .with_context(|| format!("listing files for pattern '{}'", pattern))?;

            debug!(pattern, count = paths.len(), "read files");

            for path in paths {
                let doc = ctx
                    .new_document(Content::from_file(path.clone(), ctx.fs().clone()))
                    .with_source(path.clone())
                    .with_destination(path);
                docs.push(doc);
            }
        }

        Ok(docs)
    }

    fn is_cacheable(&self) -> bool {
        false
    }
}

/// Persist every document with a destination under the output root
///
/// Only valid in the Output phase, the one phase allowed side effects
/// outside the document set. Documents pass through unchanged.
#[derive(Debug, Default)]
pub struct WriteFiles;

impl WriteFiles {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for WriteFiles {
    fn name(&self) -> &str {
        "WriteFiles"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Vec<Document>> {
        if ctx.phase() != Phase::Output {
            bail!("WriteFiles may only run in the Output phase");
        }

        let root = PathBuf::from(
            ctx.settings()
                .get_or::<String>(keys::OUTPUT_PATH, DEFAULT_OUTPUT_PATH.into()),
        );

        for doc in &inputs {
            let Some(destination) = doc.destination() else {
                debug!(doc = %doc, "skipping document without destination");
                continue;
            };

            let bytes = doc.content().bytes().await?;
            let target = root.join(destination);
            ctx.fs()
                .write(&target, &bytes)
                .await
                .with_context(|| format!("writing '{}'", target.display()))?;
        }

        Ok(inputs)
    }

    fn is_cacheable(&self) -> bool {
        false
    }

    fn cache_settings(&self) -> Vec<String> {
        vec![keys::OUTPUT_PATH.to_string()]
    }
}

/// Stamp a metadata key onto every document
pub struct SetMetadata {
    key: String,
    value: Value,
}

impl SetMetadata {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl Module for SetMetadata {
    fn name(&self) -> &str {
        "SetMetadata"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Vec<Document>> {
        let key = self.key.clone();
        let value = self.value.clone();

        ctx.for_each_document(inputs, move |doc, _ctx| {
            let key = key.clone();
            let value = value.clone();
            async move { Ok(vec![doc.with_metadata([(key, value)])]) }
        })
        .await
    }
}

type ExecuteFuture = Pin<Box<dyn std::future::Future<Output = anyhow::Result<Vec<Document>>> + Send>>;
type ExecuteFn = dyn Fn(Vec<Document>, ExecutionContext) -> ExecuteFuture + Send + Sync;

/// Ad-hoc module wrapping an async closure
///
/// Not cacheable by default since a closure may capture arbitrary state;
/// opt in with [`Execute::cacheable`] when the closure is pure over its
/// inputs and declared settings.
pub struct Execute {
    name: String,
    cacheable: bool,
    cache_settings: Vec<String>,
    func: Arc<ExecuteFn>,
}

impl Execute {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Document>, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Vec<Document>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            cacheable: false,
            cache_settings: Vec::new(),
            func: Arc::new(move |docs, ctx| Box::pin(f(docs, ctx))),
        }
    }

    /// Mark this module's steps as servable from the cache
    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    /// Declare settings that participate in this module's cache key
    pub fn with_cache_settings<I, S>(mut self, settings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache_settings = settings.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl Module for Execute {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Vec<Document>> {
        (self.func)(inputs, ctx.clone()).await
    }

    fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    fn cache_settings(&self) -> Vec<String> {
        self.cache_settings.clone()
    }
}
