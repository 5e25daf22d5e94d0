// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Modules and module chains
//!
//! A module is a single transformation step over a document set. A phase is
//! an ordered chain of modules; the chain threads the document set through
//! each step, consulting the cache for cacheable steps and checking
//! cancellation between steps.

mod context;

pub use context::ExecutionContext;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::module_cache_key;
use crate::document::Document;
use crate::errors::{SiteflowError, SiteflowResult};

/// A single transformation step within a phase's module chain
#[async_trait]
pub trait Module: Send + Sync {
    /// Stable module identity, part of the cache key
    fn name(&self) -> &str;

    /// Transform the input document set into a new set
    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Vec<Document>>;

    /// Whether this step may be served from the cache. Modules that read
    /// state outside their inputs and declared settings must say no.
    fn is_cacheable(&self) -> bool {
        true
    }

    /// Settings keys whose values participate in this module's cache key
    fn cache_settings(&self) -> Vec<String> {
        Vec::new()
    }
}

/// An ordered list of modules executed against a document set
#[derive(Clone, Default)]
pub struct ModuleChain {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.iter()
    }

    /// Thread `docs` through every module in declaration order
    ///
    /// Each step sees the previous step's output as both its input and the
    /// context's current document set. Cancellation is checked between steps.
    pub async fn execute(
        &self,
        mut docs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> SiteflowResult<Vec<Document>> {
        for module in &self.modules {
            if ctx.cancellation().is_cancelled() {
                return Err(SiteflowError::Canceled);
            }

            let step_ctx = ctx.with_inputs(docs.clone());
            docs = run_module(module.as_ref(), docs, &step_ctx).await?;
        }

        Ok(docs)
    }
}

impl std::fmt::Debug for ModuleChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.modules.iter().map(|m| m.name()))
            .finish()
    }
}

async fn run_module(
    module: &dyn Module,
    docs: Vec<Document>,
    ctx: &ExecutionContext,
) -> SiteflowResult<Vec<Document>> {
    let start = Instant::now();

    let use_cache = ctx.caching_enabled() && ctx.phase().is_cacheable() && module.is_cacheable();
    if use_cache {
        match module_cache_key(
            ctx.pipeline(),
            ctx.phase(),
            module.name(),
            &module.cache_settings(),
            &docs,
            ctx.settings(),
        )
        .await
        {
            Ok(key) => {
                return ctx
                    .cache()
                    .get_or_compute(&key, || async {
                        execute_module(module, docs.clone(), ctx).await
                    })
                    .await;
            }
            // hashing trouble degrades to a miss, never fails the run
            Err(e) => {
                debug!(
                    module = module.name(),
                    error = %e,
                    "cache key computation failed; executing uncached"
                );
            }
        }
    }

    let result = execute_module(module, docs, ctx).await;
    debug!(
        pipeline = ctx.pipeline(),
        phase = %ctx.phase(),
        module = module.name(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "module step finished"
    );
    result
}

async fn execute_module(
    module: &dyn Module,
    docs: Vec<Document>,
    ctx: &ExecutionContext,
) -> SiteflowResult<Vec<Document>> {
    module
        .execute(docs, ctx)
        .await
        .map_err(|e| SiteflowError::module_failed(ctx.pipeline(), ctx.phase(), module.name(), &e))
}
