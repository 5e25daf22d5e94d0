// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Script engine boundary
//!
//! Metadata values (and requested keys) prefixed with `=>` are script
//! expressions. The engine only detects the prefix and delegates evaluation;
//! the actual scripting backend plugs in through [`ScriptEngine`]. Script
//! results are re-evaluated on every access and never cached.

use crate::meta::{Metadata, Value};

/// Prefix marking a metadata value or key as a script expression
pub const SCRIPT_PREFIX: &str = "=>";

/// Check whether a string is a script expression
pub fn is_script(s: &str) -> bool {
    s.trim_start().starts_with(SCRIPT_PREFIX)
}

/// Strip the script prefix, returning the expression body
pub fn script_body(s: &str) -> &str {
    let trimmed = s.trim_start();
    trimmed
        .strip_prefix(SCRIPT_PREFIX)
        .unwrap_or(trimmed)
        .trim_start()
}

/// Pluggable expression evaluator for `=>` metadata values
pub trait ScriptEngine: Send + Sync {
    /// Evaluate an expression against the requesting metadata view
    fn evaluate(&self, code: &str, metadata: &Metadata) -> anyhow::Result<Value>;
}

/// Script engine that resolves an expression as a plain metadata key lookup
///
/// Enough for configurations that only use `=> SomeKey` indirection; richer
/// backends implement [`ScriptEngine`] themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyLookupEngine;

impl ScriptEngine for KeyLookupEngine {
    fn evaluate(&self, code: &str, metadata: &Metadata) -> anyhow::Result<Value> {
        Ok(metadata.get_value(code.trim()).unwrap_or(Value::Null))
    }
}
