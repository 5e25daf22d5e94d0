// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Metadata value variants
//!
//! A value is either a literal, a sequence, a document reference, a lazy
//! accessor re-evaluated on each read, or a script expression evaluated by
//! the registered engine on each read.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::document::Document;
use crate::meta::Metadata;
use crate::script;

/// A metadata value
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Value>),
    /// A reference to another document (tree links, cross-references)
    Document(Document),
    /// A deferred accessor invoked on every read
    Lazy(LazyValue),
    /// A script expression body, evaluated against the requesting view
    Script(String),
}

impl Value {
    /// Build a string value without script-prefix detection
    pub fn literal_str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Whether this value needs expansion before use
    pub fn is_deferred(&self) -> bool {
        matches!(self, Value::Lazy(_) | Value::Script(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Variant name, used in logs and hashing
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Document(_) => "document",
            Value::Lazy(_) => "lazy",
            Value::Script(_) => "script",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Seq(v) => f.debug_tuple("Seq").field(v).finish(),
            Value::Document(d) => write!(f, "Document({:?})", d.id()),
            Value::Lazy(l) => write!(f, "Lazy(#{})", l.id()),
            Value::Script(s) => write!(f, "Script({:?})", s),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a.id() == b.id(),
            // Lazy accessors compare by identity, not by what they produce
            (Value::Lazy(a), Value::Lazy(b)) => a.id() == b.id(),
            (Value::Script(a), Value::Script(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

// A `=>` prefix turns a string into a script expression; use
// `Value::literal_str` to opt out of detection.
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        if script::is_script(s) {
            Value::Script(script::script_body(s).to_string())
        } else {
            Value::Str(s.to_string())
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        if script::is_script(&s) {
            Value::Script(script::script_body(&s).to_string())
        } else {
            Value::Str(s)
        }
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Value::Document(d)
    }
}

impl From<LazyValue> for Value {
    fn from(l: LazyValue) -> Self {
        Value::Lazy(l)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(v: Vec<V>) -> Self {
        Value::Seq(v.into_iter().map(Into::into).collect())
    }
}

type LazyFn = dyn Fn(&str, &Metadata) -> Value + Send + Sync;

static NEXT_ACCESSOR_ID: AtomicU64 = AtomicU64::new(1);

/// A deferred metadata accessor
///
/// Invoked with the requested key and the requesting metadata view on every
/// read. The plain variant is never memoized; [`LazyValue::cached`] wraps the
/// first result and replays it on later reads.
#[derive(Clone)]
pub struct LazyValue {
    id: u64,
    func: Arc<LazyFn>,
    cache: Option<Arc<OnceLock<Value>>>,
}

impl LazyValue {
    /// A lazy value re-evaluated on every read
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str, &Metadata) -> Value + Send + Sync + 'static,
    {
        Self {
            id: NEXT_ACCESSOR_ID.fetch_add(1, Ordering::Relaxed),
            func: Arc::new(func),
            cache: None,
        }
    }

    /// A lazy value evaluated once; later reads replay the first result
    pub fn cached<F>(func: F) -> Self
    where
        F: Fn(&str, &Metadata) -> Value + Send + Sync + 'static,
    {
        Self {
            cache: Some(Arc::new(OnceLock::new())),
            ..Self::new(func)
        }
    }

    /// Stable identity of this accessor, shared by clones
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Invoke the accessor (or replay the memoized result)
    pub(crate) fn invoke(&self, key: &str, view: &Metadata) -> Value {
        match &self.cache {
            Some(cell) => cell.get_or_init(|| (self.func)(key, view)).clone(),
            None => (self.func)(key, view),
        }
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyValue")
            .field("id", &self.id)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
