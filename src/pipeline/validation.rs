// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Pipeline configuration validation
//!
//! Collects every problem in a registered pipeline set before execution
//! starts, so a configuration error is reported with full context instead
//! of failing one pipeline at a time mid-run.

use crate::errors::SiteflowError;
use crate::pipeline::{Phase, PipelineGraph};

/// Preflight validator for a pipeline graph
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a registered pipeline set
    pub fn validate(graph: &PipelineGraph) -> ValidationResult {
        let mut result = ValidationResult::new();

        if graph.is_empty() {
            result.add_warning("No pipelines are registered; execution will produce no output");
        }

        // graph-level structure: unknown/isolated dependencies, cycles
        match graph.validate() {
            Ok(()) => {}
            Err(SiteflowError::CircularDependency { pipelines }) => {
                result.add_error(&format!(
                    "Circular dependency: {}",
                    pipelines.join(" -> ")
                ));
            }
            Err(SiteflowError::UnknownDependency {
                pipeline,
                dependency,
            }) => {
                result.add_error(&format!(
                    "Pipeline '{}' depends on unknown pipeline '{}'",
                    pipeline, dependency
                ));
            }
            Err(SiteflowError::IsolatedDependency {
                pipeline,
                dependency,
            }) => {
                result.add_error(&format!(
                    "Pipeline '{}' depends on isolated pipeline '{}'",
                    pipeline, dependency
                ));
            }
            Err(e) => {
                result.add_error(&format!("Graph validation error: {}", e));
            }
        }

        for name in graph.names() {
            let pipeline = graph.get(name).expect("listed pipeline is registered");

            if pipeline.module_count() == 0 {
                result.add_warning(&format!(
                    "Pipeline '{}' has no modules in any phase",
                    pipeline.name()
                ));
            }

            if pipeline.is_isolated() && !pipeline.dependencies().is_empty() {
                result.add_warning(&format!(
                    "Isolated pipeline '{}' declares dependencies; it still runs after them \
                     but will not see their documents",
                    pipeline.name()
                ));
            }

            if !pipeline.modules(Phase::Input).is_empty()
                && pipeline.modules(Phase::Process).is_empty()
                && pipeline.modules(Phase::Transform).is_empty()
                && pipeline.modules(Phase::Output).is_empty()
            {
                result.add_warning(&format!(
                    "Pipeline '{}' reads inputs but has no later phases; its documents \
                     are only useful to dependent pipelines",
                    pipeline.name()
                ));
            }
        }

        result
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
