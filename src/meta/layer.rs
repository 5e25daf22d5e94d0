// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Layered metadata store
//!
//! A metadata instance is an immutable chain of layers. Lookups check the
//! local layer first, then walk the chain, so a key in a local layer always
//! shadows the same key in any ancestor. Pushing an override layer is O(1)
//! and never copies ancestor entries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::meta::convert::FromValue;
use crate::meta::expand;
use crate::meta::Value;
use crate::script::{self, ScriptEngine};

/// One immutable layer of the chain. Keys are indexed lowercase; the
/// original casing is kept for enumeration.
struct Layer {
    entries: HashMap<String, Entry>,
    parent: Option<Arc<Layer>>,
}

struct Entry {
    key: String,
    value: Value,
}

/// Layered, case-insensitive key/value metadata
#[derive(Clone, Default)]
pub struct Metadata {
    layer: Option<Arc<Layer>>,
    script: Option<Arc<dyn ScriptEngine>>,
}

impl Metadata {
    /// Empty metadata with no layers
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata with a single layer built from key/value pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Metadata::new().with(pairs)
    }

    /// Derive a new metadata instance with `pairs` as a fresh local layer
    /// chained over this one. The receiver is left untouched.
    pub fn with<K, V, I>(&self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut entries = HashMap::new();
        for (key, value) in pairs {
            let key = key.into();
            entries.insert(
                key.to_lowercase(),
                Entry {
                    key,
                    value: value.into(),
                },
            );
        }

        if entries.is_empty() {
            return self.clone();
        }

        Self {
            layer: Some(Arc::new(Layer {
                entries,
                parent: self.layer.clone(),
            })),
            script: self.script.clone(),
        }
    }

    /// Attach the script engine used to evaluate `=>` expressions
    pub fn with_script_engine(&self, engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            layer: self.layer.clone(),
            script: Some(engine),
        }
    }

    /// Raw layered lookup without expansion
    pub fn raw_get(&self, key: &str) -> Option<&Value> {
        let lower = key.to_lowercase();
        let mut layer = self.layer.as_deref();
        while let Some(l) = layer {
            if let Some(entry) = l.entries.get(&lower) {
                return Some(&entry.value);
            }
            layer = l.parent.as_deref();
        }
        None
    }

    /// Whether the key is present in any layer
    pub fn contains_key(&self, key: &str) -> bool {
        self.raw_get(key).is_some()
    }

    /// Fetch and fully expand the value for a key
    ///
    /// A `=>`-prefixed key is a script expression evaluated directly against
    /// this view, bypassing the layered lookup.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        if script::is_script(key) {
            return Some(self.evaluate_script(script::script_body(key)));
        }
        let raw = self.raw_get(key)?.clone();
        Some(expand::expand_value(key, raw, self))
    }

    /// Fetch, expand and convert the value for a key
    ///
    /// Conversion failure is a `None`, never a panic or an error.
    pub fn get<T: FromValue>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        T::from_value(&value)
    }

    /// Fetch with a fallback used on missing key or failed conversion
    pub fn get_or<T: FromValue>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Evaluate a script expression against this view; never cached
    pub(crate) fn evaluate_script(&self, code: &str) -> Value {
        match &self.script {
            Some(engine) => match engine.evaluate(code, self) {
                Ok(value) => expand::expand_value(code, value, self),
                Err(e) => {
                    debug!(code, error = %e, "script evaluation failed");
                    Value::Null
                }
            },
            None => {
                debug!(code, "script value requested but no script engine is registered");
                Value::Null
            }
        }
    }

    /// Enumerate merged entries, local keys first; an ancestor key already
    /// seen locally is skipped. Values are raw (unexpanded).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        let mut seen: HashMap<&str, ()> = HashMap::new();
        let mut out: Vec<(&str, &Value)> = Vec::new();

        let mut layer = self.layer.as_deref();
        while let Some(l) = layer {
            for (lower, entry) in &l.entries {
                if seen.insert(lower.as_str(), ()).is_none() {
                    out.push((entry.key.as_str(), &entry.value));
                }
            }
            layer = l.parent.as_deref();
        }

        out.into_iter()
    }

    /// Distinct keys across all layers, original casing
    pub fn keys(&self) -> Vec<&str> {
        self.iter().map(|(k, _)| k).collect()
    }

    /// Number of distinct keys across all layers
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.layer.is_none() || self.len() == 0
    }

    /// Depth of the layer chain, for diagnostics
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut layer = self.layer.as_deref();
        while let Some(l) = layer {
            depth += 1;
            layer = l.parent.as_deref();
        }
        depth
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            map.entry(&key, value);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::LazyValue;
    use crate::script::KeyLookupEngine;

    #[test]
    fn test_local_layer_shadows_parent() {
        let parent = Metadata::from_pairs([("K", 1i64), ("Only", 10i64)]);
        let child = parent.with([("K", 2i64)]);

        assert_eq!(child.get::<i64>("K"), Some(2));
        assert_eq!(child.get::<i64>("Only"), Some(10));
        // parent untouched
        assert_eq!(parent.get::<i64>("K"), Some(1));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let meta = Metadata::from_pairs([("Title", "Hello")]);
        assert_eq!(meta.get::<String>("title"), Some("Hello".into()));
        assert_eq!(meta.get::<String>("TITLE"), Some("Hello".into()));
    }

    #[test]
    fn test_enumeration_merges_local_first() {
        let parent = Metadata::from_pairs([("A", 1i64), ("B", 2i64)]);
        let child = parent.with([("b", 20i64), ("C", 30i64)]);

        let entries: HashMap<String, Value> = child
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries["b"], Value::Int(20));
        assert_eq!(entries["a"], Value::Int(1));
    }

    #[test]
    fn test_override_is_o1_no_copy() {
        let base = Metadata::from_pairs([("K", 1i64)]);
        let derived = base.with([("K2", 2i64)]);
        assert_eq!(derived.depth(), 2);
        assert_eq!(base.depth(), 1);
    }

    #[test]
    fn test_lazy_value_reads_through_view() {
        let meta = Metadata::from_pairs([
            ("Name", Value::from("World")),
            (
                "Greeting",
                Value::Lazy(LazyValue::new(|_, view| {
                    let name = view.get::<String>("Name").unwrap_or_default();
                    Value::Str(format!("Hello, {}", name))
                })),
            ),
        ]);

        assert_eq!(meta.get::<String>("Greeting"), Some("Hello, World".into()));

        // an override layer changes what the accessor sees
        let derived = meta.with([("Name", "Rust")]);
        assert_eq!(derived.get::<String>("Greeting"), Some("Hello, Rust".into()));
    }

    #[test]
    fn test_script_key_evaluation() {
        let meta = Metadata::from_pairs([("Title", "My Page")])
            .with_script_engine(Arc::new(KeyLookupEngine));

        assert_eq!(meta.get::<String>("=> Title"), Some("My Page".into()));
    }

    #[test]
    fn test_script_value_without_engine_is_null() {
        let meta = Metadata::from_pairs([("T", "=> Title")]);
        assert_eq!(meta.get_value("T"), Some(Value::Null));
    }
}
