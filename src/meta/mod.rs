// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Layered, lazily-resolved metadata
//!
//! Every document (and the settings store) is backed by this model: an
//! immutable chain of key/value layers with case-insensitive keys, deferred
//! accessors expanded on read, and boolean-style type conversion.

mod convert;
mod expand;
mod layer;
mod value;

pub use convert::FromValue;
pub use layer::Metadata;
pub use value::{LazyValue, Value};
