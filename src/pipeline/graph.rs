// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Pipeline dependency graph
//!
//! Registers pipelines, validates the dependency edge set, and resolves a
//! request into topological batches: each batch is a maximal set of
//! pipelines whose dependencies are all satisfied by earlier batches.
//! Pipelines within a batch carry no ordering constraint between them.

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::errors::{SiteflowError, SiteflowResult};
use crate::pipeline::Pipeline;

/// The full set of registered pipelines plus derived dependency edges
#[derive(Default)]
pub struct PipelineGraph {
    // registration order, for deterministic batch ordering
    pipelines: Vec<Arc<Pipeline>>,
    by_name: HashMap<String, usize>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline; names are case-insensitively unique
    pub fn add(&mut self, pipeline: Pipeline) -> SiteflowResult<()> {
        let lower = pipeline.name().to_lowercase();
        if self.by_name.contains_key(&lower) {
            return Err(SiteflowError::DuplicatePipeline {
                name: pipeline.name().to_string(),
            });
        }
        self.by_name.insert(lower, self.pipelines.len());
        self.pipelines.push(Arc::new(pipeline));
        Ok(())
    }

    /// Look up a pipeline case-insensitively
    pub fn get(&self, name: &str) -> Option<&Arc<Pipeline>> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&idx| &self.pipelines[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_lowercase())
    }

    /// Registered pipeline names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Validate the edge set: every dependency must name a registered,
    /// non-isolated pipeline, and the graph must be acyclic. Runs before
    /// any phase executes.
    pub fn validate(&self) -> SiteflowResult<()> {
        for pipeline in &self.pipelines {
            for dep in pipeline.dependencies() {
                let target = self.get(dep).ok_or_else(|| SiteflowError::UnknownDependency {
                    pipeline: pipeline.name().to_string(),
                    dependency: dep.clone(),
                })?;

                if target.is_isolated() {
                    return Err(SiteflowError::IsolatedDependency {
                        pipeline: pipeline.name().to_string(),
                        dependency: target.name().to_string(),
                    });
                }
            }
        }

        let (graph, _) = self.build_graph();
        if let Err(cycle) = toposort(&graph, None) {
            return Err(SiteflowError::CircularDependency {
                pipelines: self.cycle_members(&graph, cycle.node_id()),
            });
        }

        Ok(())
    }

    /// Resolve a request into ordered execution batches
    ///
    /// An empty request or `include_defaults` selects every non-deployment
    /// pipeline; the request is then expanded to its transitive dependency
    /// closure.
    pub fn resolve(
        &self,
        requested: &[String],
        include_defaults: bool,
    ) -> SiteflowResult<Vec<Vec<String>>> {
        self.resolve_with_excluded(requested, include_defaults, &[])
    }

    /// Like [`resolve`](Self::resolve), with names excluded from the default
    /// selection (an explicit request always wins over an exclusion)
    pub fn resolve_with_excluded(
        &self,
        requested: &[String],
        include_defaults: bool,
        excluded: &[String],
    ) -> SiteflowResult<Vec<Vec<String>>> {
        self.validate()?;

        let mut selected: HashSet<usize> = HashSet::new();
        let mut queue: VecDeque<usize> = VecDeque::new();

        for name in requested {
            let &idx = self
                .by_name
                .get(&name.to_lowercase())
                .ok_or_else(|| SiteflowError::UnknownPipeline { name: name.clone() })?;
            if selected.insert(idx) {
                queue.push_back(idx);
            }
        }

        if requested.is_empty() || include_defaults {
            let excluded: HashSet<String> = excluded.iter().map(|n| n.to_lowercase()).collect();
            for (idx, pipeline) in self.pipelines.iter().enumerate() {
                if pipeline.is_deployment() || excluded.contains(&pipeline.name().to_lowercase()) {
                    continue;
                }
                if selected.insert(idx) {
                    queue.push_back(idx);
                }
            }
        }

        // expand to the transitive dependency closure
        while let Some(idx) = queue.pop_front() {
            for dep in self.pipelines[idx].dependencies() {
                // validate() guarantees the dependency exists
                let &dep_idx = &self.by_name[&dep.to_lowercase()];
                if selected.insert(dep_idx) {
                    queue.push_back(dep_idx);
                }
            }
        }

        // Kahn layering over the selected subgraph; the closure guarantees
        // every dependency is inside the selection
        let mut remaining: Vec<usize> = {
            let mut v: Vec<usize> = selected.iter().copied().collect();
            v.sort_unstable();
            v
        };
        let mut done: HashSet<usize> = HashSet::new();
        let mut batches: Vec<Vec<String>> = Vec::new();

        while !remaining.is_empty() {
            let (ready, rest): (Vec<usize>, Vec<usize>) = remaining.iter().copied().partition(|&idx| {
                self.pipelines[idx]
                    .dependencies()
                    .iter()
                    .all(|dep| done.contains(&self.by_name[&dep.to_lowercase()]))
            });

            if ready.is_empty() {
                // unreachable after validate(), but report rather than spin
                return Err(SiteflowError::CircularDependency {
                    pipelines: rest
                        .iter()
                        .map(|&idx| self.pipelines[idx].name().to_string())
                        .collect(),
                });
            }

            done.extend(&ready);
            batches.push(
                ready
                    .into_iter()
                    .map(|idx| self.pipelines[idx].name().to_string())
                    .collect(),
            );
            remaining = rest;
        }

        Ok(batches)
    }

    /// Transitive dependency closure of a pipeline, not including itself
    pub fn dependency_closure(&self, name: &str) -> Vec<String> {
        let Some(&start) = self.by_name.get(&name.to_lowercase()) else {
            return Vec::new();
        };

        let mut seen: HashSet<usize> = HashSet::new();
        let mut queue: VecDeque<usize> = VecDeque::from([start]);
        while let Some(idx) = queue.pop_front() {
            for dep in self.pipelines[idx].dependencies() {
                if let Some(&dep_idx) = self.by_name.get(&dep.to_lowercase()) {
                    if seen.insert(dep_idx) {
                        queue.push_back(dep_idx);
                    }
                }
            }
        }

        seen.remove(&start);
        let mut out: Vec<usize> = seen.into_iter().collect();
        out.sort_unstable();
        out.into_iter()
            .map(|idx| self.pipelines[idx].name().to_string())
            .collect()
    }

    /// Direct dependencies of a pipeline
    pub fn dependencies(&self, name: &str) -> Option<Vec<String>> {
        let pipeline = self.get(name)?;
        Some(
            pipeline
                .dependencies()
                .iter()
                .filter_map(|dep| self.get(dep).map(|p| p.name().to_string()))
                .collect(),
        )
    }

    /// Pipelines that directly depend on a pipeline
    pub fn dependents(&self, name: &str) -> Option<Vec<String>> {
        if !self.contains(name) {
            return None;
        }
        Some(
            self.pipelines
                .iter()
                .filter(|p| p.depends_on(name))
                .map(|p| p.name().to_string())
                .collect(),
        )
    }

    /// Check whether pipeline A depends (directly or transitively) on B
    pub fn depends_transitively(&self, a: &str, b: &str) -> bool {
        let (graph, indices) = self.build_graph();
        let Some(&a_idx) = self.by_name.get(&a.to_lowercase()) else {
            return false;
        };
        let Some(&b_idx) = self.by_name.get(&b.to_lowercase()) else {
            return false;
        };
        if a_idx == b_idx {
            return false;
        }
        // edges point dependency -> dependent
        has_path_connecting(&graph, indices[b_idx], indices[a_idx], None)
    }

    /// Generate a Mermaid diagram of the dependency graph
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for pipeline in &self.pipelines {
            out.push_str(&format!("    {}[{}]\n", pipeline.name(), pipeline.name()));
        }

        for pipeline in &self.pipelines {
            for dep in pipeline.dependencies() {
                if let Some(target) = self.get(dep) {
                    out.push_str(&format!("    {} --> {}\n", target.name(), pipeline.name()));
                }
            }
        }

        out
    }

    /// Generate a DOT diagram of the dependency graph
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipelines {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for pipeline in &self.pipelines {
            for dep in pipeline.dependencies() {
                if let Some(target) = self.get(dep) {
                    out.push_str(&format!(
                        "    \"{}\" -> \"{}\";\n",
                        target.name(),
                        pipeline.name()
                    ));
                }
            }
        }

        for pipeline in &self.pipelines {
            if pipeline.dependencies().is_empty()
                && self
                    .dependents(pipeline.name())
                    .map(|d| d.is_empty())
                    .unwrap_or(true)
            {
                out.push_str(&format!("    \"{}\";\n", pipeline.name()));
            }
        }

        out.push_str("}\n");
        out
    }

    fn build_graph(&self) -> (DiGraph<usize, ()>, Vec<NodeIndex>) {
        let mut graph = DiGraph::new();
        let indices: Vec<NodeIndex> = (0..self.pipelines.len())
            .map(|idx| graph.add_node(idx))
            .collect();

        for (idx, pipeline) in self.pipelines.iter().enumerate() {
            for dep in pipeline.dependencies() {
                if let Some(&dep_idx) = self.by_name.get(&dep.to_lowercase()) {
                    graph.add_edge(indices[dep_idx], indices[idx], ());
                }
            }
        }

        (graph, indices)
    }

    /// All pipelines on the cycle containing `start` (its strongly
    /// connected component)
    fn cycle_members(&self, graph: &DiGraph<usize, ()>, start: NodeIndex) -> Vec<String> {
        let mut members: Vec<String> = graph
            .node_indices()
            .filter(|&n| {
                n == start
                    || (has_path_connecting(graph, start, n, None)
                        && has_path_connecting(graph, n, start, None))
            })
            .map(|n| self.pipelines[graph[n]].name().to_string())
            .collect();
        members.sort();
        members
    }
}

impl std::fmt::Debug for PipelineGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineGraph")
            .field("pipelines", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(specs: Vec<(&str, Vec<&str>)>) -> PipelineGraph {
        let mut graph = PipelineGraph::new();
        for (name, deps) in specs {
            graph
                .add(Pipeline::builder(name).with_dependencies(deps).build())
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_linear_batches() {
        let graph = graph(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])]);
        let batches = graph.resolve(&[], false).unwrap();
        assert_eq!(
            batches,
            vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]]
        );
    }

    #[test]
    fn test_diamond_batches() {
        let graph = graph(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["a"]),
            ("d", vec!["b", "c"]),
        ]);

        let batches = graph.resolve(&[], false).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec!["a".to_string()]);
        assert_eq!(batches[1], vec!["b".to_string(), "c".to_string()]);
        assert_eq!(batches[2], vec!["d".to_string()]);
    }

    #[test]
    fn test_every_batch_has_dependencies_in_earlier_batches() {
        let graph = graph(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec![]),
            ("d", vec!["b", "c"]),
            ("e", vec!["a"]),
        ]);

        let batches = graph.resolve(&[], false).unwrap();
        let mut seen: HashSet<String> = HashSet::new();
        for batch in &batches {
            for name in batch {
                for dep in graph.dependencies(name).unwrap() {
                    assert!(seen.contains(&dep), "{name} ran before its dependency {dep}");
                }
            }
            seen.extend(batch.iter().cloned());
        }
    }

    #[test]
    fn test_requested_expands_to_dependency_closure() {
        let graph = graph(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec![])]);

        let batches = graph.resolve(&["b".to_string()], false).unwrap();
        assert_eq!(batches, vec![vec!["a".to_string()], vec!["b".to_string()]]);
    }

    #[test]
    fn test_cycle_is_fatal_and_names_members() {
        let graph = graph(vec![
            ("a", vec!["c"]),
            ("b", vec!["a"]),
            ("c", vec!["b"]),
            ("free", vec![]),
        ]);

        match graph.resolve(&[], false) {
            Err(SiteflowError::CircularDependency { pipelines }) => {
                assert_eq!(pipelines, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let graph = graph(vec![("a", vec!["a"])]);
        assert!(matches!(
            graph.resolve(&[], false),
            Err(SiteflowError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_requested_pipeline() {
        let graph = graph(vec![("a", vec![])]);
        assert!(matches!(
            graph.resolve(&["missing".to_string()], false),
            Err(SiteflowError::UnknownPipeline { .. })
        ));
    }

    #[test]
    fn test_unknown_dependency() {
        let graph = graph(vec![("a", vec!["ghost"])]);
        assert!(matches!(
            graph.validate(),
            Err(SiteflowError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_dependency_on_isolated_pipeline_is_rejected() {
        let mut graph = PipelineGraph::new();
        graph
            .add(Pipeline::builder("iso").isolated(true).build())
            .unwrap();
        graph
            .add(Pipeline::builder("main").with_dependency("iso").build())
            .unwrap();

        assert!(matches!(
            graph.validate(),
            Err(SiteflowError::IsolatedDependency { .. })
        ));
    }

    #[test]
    fn test_deployment_pipelines_excluded_from_defaults() {
        let mut graph = PipelineGraph::new();
        graph.add(Pipeline::builder("content").build()).unwrap();
        graph
            .add(Pipeline::builder("deploy").deployment(true).build())
            .unwrap();

        let batches = graph.resolve(&[], false).unwrap();
        assert_eq!(batches, vec![vec!["content".to_string()]]);

        // explicit request still runs it
        let batches = graph.resolve(&["deploy".to_string()], false).unwrap();
        assert_eq!(batches, vec![vec!["deploy".to_string()]]);
    }

    #[test]
    fn test_excluded_pipelines_skip_defaults_but_not_explicit_requests() {
        let graph = graph(vec![("a", vec![]), ("b", vec![])]);

        let batches = graph
            .resolve_with_excluded(&[], true, &["b".to_string()])
            .unwrap();
        assert_eq!(batches, vec![vec!["a".to_string()]]);

        let batches = graph
            .resolve_with_excluded(&["b".to_string()], false, &["b".to_string()])
            .unwrap();
        assert_eq!(batches, vec![vec!["b".to_string()]]);
    }

    #[test]
    fn test_case_insensitive_names() {
        let graph = graph(vec![("Content", vec![]), ("Feed", vec!["content"])]);

        assert!(graph.contains("CONTENT"));
        let batches = graph.resolve(&["FEED".to_string()], false).unwrap();
        assert_eq!(
            batches,
            vec![vec!["Content".to_string()], vec!["Feed".to_string()]]
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut graph = PipelineGraph::new();
        graph.add(Pipeline::builder("a").build()).unwrap();
        assert!(matches!(
            graph.add(Pipeline::builder("A").build()),
            Err(SiteflowError::DuplicatePipeline { .. })
        ));
    }

    #[test]
    fn test_depends_transitively() {
        let graph = graph(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])]);

        assert!(graph.depends_transitively("c", "a"));
        assert!(graph.depends_transitively("c", "b"));
        assert!(!graph.depends_transitively("a", "c"));
        assert!(!graph.depends_transitively("a", "a"));
    }

    #[test]
    fn test_mermaid_output() {
        let graph = graph(vec![("a", vec![]), ("b", vec!["a"])]);
        let mermaid = graph.to_mermaid();

        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("a --> b"));
    }

    #[test]
    fn test_dot_output_lists_isolated_nodes() {
        let graph = graph(vec![("alone", vec![])]);
        let dot = graph.to_dot();
        assert!(dot.contains("\"alone\";"));
    }
}
