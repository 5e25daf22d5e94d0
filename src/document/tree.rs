// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Metadata-defined document trees
//!
//! Parent/children/sibling links are conventional metadata keys holding
//! remembered document references, not object pointers. Navigation resolves
//! each remembered document by identity against the current input set
//! (ascending through enclosing execution contexts) and falls back to the
//! remembered snapshot when no live match exists. Cycles are avoided by
//! construction; traversal still uses an explicit queue + visited set so
//! deep or wide trees cannot overflow the stack.

use std::collections::{HashSet, VecDeque};

use crate::document::{Document, DocumentId};
use crate::meta::Value;
use crate::module::ExecutionContext;

/// Conventional metadata keys for tree links
pub mod keys {
    pub const PARENT: &str = "Parent";
    pub const CHILDREN: &str = "Children";
    pub const NEXT: &str = "Next";
    pub const PREVIOUS: &str = "Previous";
}

/// Find the live document for a remembered one: search the current inputs
/// and enclosing contexts by identity, fall back to the snapshot itself.
fn resolve_live(remembered: Document, ctx: &ExecutionContext) -> Document {
    ctx.find_document(remembered.id()).unwrap_or(remembered)
}

impl Document {
    /// Derive a document remembering `parent` under the parent link key
    pub fn with_parent(&self, parent: &Document) -> Document {
        self.with_metadata([(keys::PARENT, Value::Document(parent.clone()))])
    }

    /// Derive a document remembering `children` under the children link key
    pub fn with_children<'a>(
        &self,
        children: impl IntoIterator<Item = &'a Document>,
    ) -> Document {
        let seq: Vec<Value> = children
            .into_iter()
            .map(|d| Value::Document(d.clone()))
            .collect();
        self.with_metadata([(keys::CHILDREN, Value::Seq(seq))])
    }

    /// Derive a document remembering its previous and next siblings
    pub fn with_siblings(
        &self,
        previous: Option<&Document>,
        next: Option<&Document>,
    ) -> Document {
        let mut pairs: Vec<(&str, Value)> = Vec::new();
        if let Some(prev) = previous {
            pairs.push((keys::PREVIOUS, Value::Document(prev.clone())));
        }
        if let Some(next) = next {
            pairs.push((keys::NEXT, Value::Document(next.clone())));
        }
        self.with_metadata(pairs)
    }

    /// The parent document, resolved against the current context
    pub fn parent(&self, ctx: &ExecutionContext) -> Option<Document> {
        self.get::<Document>(keys::PARENT)
            .map(|d| resolve_live(d, ctx))
    }

    /// The child documents, resolved against the current context
    pub fn children(&self, ctx: &ExecutionContext) -> Vec<Document> {
        self.get::<Vec<Document>>(keys::CHILDREN)
            .unwrap_or_default()
            .into_iter()
            .map(|d| resolve_live(d, ctx))
            .collect()
    }

    /// The next sibling, resolved against the current context
    pub fn next_sibling(&self, ctx: &ExecutionContext) -> Option<Document> {
        self.get::<Document>(keys::NEXT).map(|d| resolve_live(d, ctx))
    }

    /// The previous sibling, resolved against the current context
    pub fn previous_sibling(&self, ctx: &ExecutionContext) -> Option<Document> {
        self.get::<Document>(keys::PREVIOUS)
            .map(|d| resolve_live(d, ctx))
    }

    /// All descendants in breadth-first order
    pub fn descendants(&self, ctx: &ExecutionContext) -> Vec<Document> {
        let mut out = Vec::new();
        let mut visited: HashSet<DocumentId> = HashSet::new();
        let mut queue: VecDeque<Document> = VecDeque::new();

        visited.insert(self.id());
        queue.extend(self.children(ctx));

        while let Some(doc) = queue.pop_front() {
            if !visited.insert(doc.id()) {
                continue;
            }
            queue.extend(doc.children(ctx));
            out.push(doc);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ExecutionContext;

    fn ctx_with_inputs(inputs: Vec<Document>) -> ExecutionContext {
        ExecutionContext::for_tests(inputs)
    }

    #[test]
    fn test_parent_falls_back_to_remembered_snapshot() {
        let parent = Document::empty().with_metadata([("Title", "Parent")]);
        let child = Document::empty().with_parent(&parent);

        let ctx = ctx_with_inputs(vec![]);
        let resolved = child.parent(&ctx).unwrap();
        assert_eq!(resolved.id(), parent.id());
        assert_eq!(resolved.get::<String>("Title"), Some("Parent".into()));
    }

    #[test]
    fn test_parent_prefers_live_match_by_identity() {
        let parent = Document::empty().with_metadata([("Rev", 1i64)]);
        let child = Document::empty().with_parent(&parent);

        // a later clone of the parent with the same identity is "live"
        let live_parent = parent.with_metadata([("Rev", 2i64)]);
        let ctx = ctx_with_inputs(vec![live_parent]);

        let resolved = child.parent(&ctx).unwrap();
        assert_eq!(resolved.get::<i64>("Rev"), Some(2));
    }

    #[test]
    fn test_descendants_walks_wide_trees() {
        let leaves: Vec<Document> = (0..100).map(|_| Document::empty()).collect();
        let mid = Document::empty().with_children(leaves.iter());
        let root = Document::empty().with_children([&mid]);

        let ctx = ctx_with_inputs(vec![]);
        assert_eq!(root.descendants(&ctx).len(), 101);
    }

    #[test]
    fn test_siblings() {
        let a = Document::empty();
        let c = Document::empty();
        let b = Document::empty().with_siblings(Some(&a), Some(&c));

        let ctx = ctx_with_inputs(vec![]);
        assert_eq!(b.previous_sibling(&ctx).unwrap().id(), a.id());
        assert_eq!(b.next_sibling(&ctx).unwrap().id(), c.id());
    }
}
