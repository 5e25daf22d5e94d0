// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Value expansion with a bounded recursion guard
//!
//! Reading a value recursively unwraps lazy accessors until a non-lazy value
//! is produced. A lazy accessor that (directly or indirectly) re-enters
//! expansion of the same key on the same thread would otherwise recurse
//! forever; the guard detects the (key, accessor, thread) triple, logs one
//! warning per (key, accessor) pair, and yields `Null` on the re-entry.

use std::cell::RefCell;
use std::collections::HashSet;

use dashmap::DashSet;
use std::sync::OnceLock;
use tracing::warn;

use crate::meta::{Metadata, Value};

thread_local! {
    // (lowercased key, accessor id) pairs currently expanding on this thread
    static IN_FLIGHT: RefCell<HashSet<(String, u64)>> = RefCell::new(HashSet::new());
}

// (key, accessor) pairs that already produced a cycle warning
static WARNED: OnceLock<DashSet<(String, u64)>> = OnceLock::new();

fn warned() -> &'static DashSet<(String, u64)> {
    WARNED.get_or_init(DashSet::new)
}

/// Fully expand a value read for `key` against `view`
pub(crate) fn expand_value(key: &str, value: Value, view: &Metadata) -> Value {
    match value {
        Value::Lazy(lazy) => {
            let guard_key = (key.to_lowercase(), lazy.id());

            let entered = IN_FLIGHT.with(|set| set.borrow_mut().insert(guard_key.clone()));
            if !entered {
                if warned().insert(guard_key.clone()) {
                    warn!(
                        key,
                        accessor = lazy.id(),
                        "cyclic lazy metadata value detected; returning null"
                    );
                }
                return Value::Null;
            }

            let inner = lazy.invoke(key, view);

            IN_FLIGHT.with(|set| {
                set.borrow_mut().remove(&guard_key);
            });

            expand_value(key, inner, view)
        }
        Value::Script(code) => view.evaluate_script(&code),
        other => other,
    }
}
