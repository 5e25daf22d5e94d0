// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Pipeline definition structures
//!
//! A pipeline is four ordered module chains plus dependency metadata. It is
//! registered once at configuration time through the builder and immutable
//! during a run.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::module::{Module, ModuleChain};

/// The four fixed execution stages of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The only phase permitted to originate documents
    Input,
    Process,
    Transform,
    /// The only phase permitted to have side effects outside the document set
    Output,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 4] = [Phase::Input, Phase::Process, Phase::Transform, Phase::Output];

    /// Whether module steps in this phase may be served from the cache
    pub fn is_cacheable(self) -> bool {
        matches!(self, Phase::Process | Phase::Transform)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Input => write!(f, "Input"),
            Phase::Process => write!(f, "Process"),
            Phase::Transform => write!(f, "Transform"),
            Phase::Output => write!(f, "Output"),
        }
    }
}

/// A named unit of work producing documents
pub struct Pipeline {
    name: String,
    input: ModuleChain,
    process: ModuleChain,
    transform: ModuleChain,
    output: ModuleChain,
    dependencies: HashSet<String>,
    isolated: bool,
    deployment: bool,
}

impl Pipeline {
    /// Start building a pipeline with the given (case-insensitively unique) name
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module chain for a phase
    pub fn modules(&self, phase: Phase) -> &ModuleChain {
        match phase {
            Phase::Input => &self.input,
            Phase::Process => &self.process,
            Phase::Transform => &self.transform,
            Phase::Output => &self.output,
        }
    }

    /// Declared dependencies (other pipeline names, compared case-insensitively)
    pub fn dependencies(&self) -> &HashSet<String> {
        &self.dependencies
    }

    /// Whether this pipeline declares a dependency on `name`
    pub fn depends_on(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.dependencies.iter().any(|d| d.to_lowercase() == lower)
    }

    /// An isolated pipeline never sees other pipelines' documents and
    /// cannot be depended upon
    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// Deployment pipelines are excluded from the default selection
    pub fn is_deployment(&self) -> bool {
        self.deployment
    }

    /// Total module count across all phases
    pub fn module_count(&self) -> usize {
        Phase::ALL.iter().map(|p| self.modules(*p).len()).sum()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("isolated", &self.isolated)
            .field("deployment", &self.deployment)
            .field("modules", &self.module_count())
            .finish()
    }
}

/// Builder for [`Pipeline`]; the explicit registration step that replaces
/// any runtime discovery of modules
pub struct PipelineBuilder {
    name: String,
    input: ModuleChain,
    process: ModuleChain,
    transform: ModuleChain,
    output: ModuleChain,
    dependencies: HashSet<String>,
    isolated: bool,
    deployment: bool,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: ModuleChain::new(),
            process: ModuleChain::new(),
            transform: ModuleChain::new(),
            output: ModuleChain::new(),
            dependencies: HashSet::new(),
            isolated: false,
            deployment: false,
        }
    }

    /// Append a module to a phase's chain
    pub fn with_module(mut self, phase: Phase, module: impl Module + 'static) -> Self {
        self.chain_mut(phase).push(Arc::new(module));
        self
    }

    /// Append an already-shared module to a phase's chain
    pub fn with_shared_module(mut self, phase: Phase, module: Arc<dyn Module>) -> Self {
        self.chain_mut(phase).push(module);
        self
    }

    /// Declare a dependency on another pipeline
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.insert(name.into());
        self
    }

    /// Declare several dependencies at once
    pub fn with_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn isolated(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    pub fn deployment(mut self, deployment: bool) -> Self {
        self.deployment = deployment;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            name: self.name,
            input: self.input,
            process: self.process,
            transform: self.transform,
            output: self.output,
            dependencies: self.dependencies,
            isolated: self.isolated,
            deployment: self.deployment,
        }
    }

    fn chain_mut(&mut self, phase: Phase) -> &mut ModuleChain {
        match phase {
            Phase::Input => &mut self.input,
            Phase::Process => &mut self.process,
            Phase::Transform => &mut self.transform,
            Phase::Output => &mut self.output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::SetMetadata;

    #[test]
    fn test_builder_assigns_modules_to_phases() {
        let pipeline = Pipeline::builder("content")
            .with_module(Phase::Process, SetMetadata::new("K", 1i64))
            .with_module(Phase::Transform, SetMetadata::new("K2", 2i64))
            .with_dependency("assets")
            .build();

        assert_eq!(pipeline.name(), "content");
        assert_eq!(pipeline.modules(Phase::Process).len(), 1);
        assert_eq!(pipeline.modules(Phase::Transform).len(), 1);
        assert!(pipeline.modules(Phase::Input).is_empty());
        assert!(pipeline.depends_on("Assets"));
        assert_eq!(pipeline.module_count(), 2);
    }

    #[test]
    fn test_flags_are_independent() {
        let pipeline = Pipeline::builder("deploy")
            .isolated(true)
            .deployment(true)
            .build();
        assert!(pipeline.is_isolated());
        assert!(pipeline.is_deployment());
    }

    #[test]
    fn test_phase_order() {
        assert_eq!(
            Phase::ALL,
            [Phase::Input, Phase::Process, Phase::Transform, Phase::Output]
        );
        assert!(!Phase::Input.is_cacheable());
        assert!(Phase::Process.is_cacheable());
        assert!(Phase::Transform.is_cacheable());
        assert!(!Phase::Output.is_cacheable());
    }
}
