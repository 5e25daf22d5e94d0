// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Read-only run settings
//!
//! A case-insensitive key/value store consumed at run start. Values reuse the
//! metadata value model and conversion rules; nested TOML tables flatten to
//! dotted keys.

use std::collections::HashMap;
use std::fmt;

use crate::errors::{SiteflowError, SiteflowResult};
use crate::meta::{FromValue, Value};

/// Well-known setting keys
pub mod keys {
    /// Disable the cache substrate entirely for the run
    pub const DISABLE_CACHE: &str = "DisableCache";
    /// Clear all registered caches at the start of the run
    pub const RESET_CACHE: &str = "ResetCache";
    /// Run every pipeline and module step sequentially in declaration order
    pub const SERIAL_EXECUTION: &str = "SerialExecution";
    /// Ask the hosting application to clean the output directory before the run
    pub const CLEAN_OUTPUT: &str = "CleanOutput";
    /// Root path Output-phase file writes resolve against
    pub const OUTPUT_PATH: &str = "OutputPath";
    /// Pipeline names excluded from the default selection
    pub const EXCLUDED_PIPELINES: &str = "ExcludedPipelines";
}

/// Default output root when `OutputPath` is not set
pub const DEFAULT_OUTPUT_PATH: &str = "output";

struct Entry {
    key: String,
    value: Value,
}

/// Read-only key/value configuration consumed at run start
#[derive(Default)]
pub struct Settings {
    entries: HashMap<String, Entry>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        self.entries.insert(
            key.to_lowercase(),
            Entry {
                key,
                value: value.into(),
            },
        );
        self
    }

    /// Load settings from a TOML document; nested tables flatten to dotted keys
    pub fn from_toml(input: &str) -> SiteflowResult<Self> {
        let table: toml::Table = input.parse()?;
        let mut settings = Settings::new();
        flatten_table(&mut settings, "", &table)?;
        Ok(settings)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    /// Raw value lookup
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.entries.get(&key.to_lowercase()).map(|e| &e.value)
    }

    /// Converted lookup; failure is `None`
    pub fn get<T: FromValue>(&self, key: &str) -> Option<T> {
        self.get_value(key).and_then(T::from_value)
    }

    pub fn get_or<T: FromValue>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// A flag counts as set when the key is present and not explicitly false
    pub fn flag(&self, key: &str) -> bool {
        match self.get_value(key) {
            None => false,
            Some(value) => bool::from_value(value).unwrap_or(true),
        }
    }

    /// All keys, original casing
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.values().map(|e| (e.key.as_str(), &e.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            map.entry(&key, value);
        }
        map.finish()
    }
}

fn flatten_table(settings: &mut Settings, prefix: &str, table: &toml::Table) -> SiteflowResult<()> {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            toml::Value::Table(nested) => flatten_table(settings, &full_key, nested)?,
            other => {
                let converted = convert_toml(other)?;
                settings.entries.insert(
                    full_key.to_lowercase(),
                    Entry {
                        key: full_key,
                        value: converted,
                    },
                );
            }
        }
    }
    Ok(())
}

fn convert_toml(value: &toml::Value) -> SiteflowResult<Value> {
    Ok(match value {
        toml::Value::String(s) => Value::from(s.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(x) => Value::Float(*x),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::Str(d.to_string()),
        toml::Value::Array(items) => Value::Seq(
            items
                .iter()
                .map(convert_toml)
                .collect::<SiteflowResult<Vec<_>>>()?,
        ),
        toml::Value::Table(_) => {
            return Err(SiteflowError::InvalidSettings {
                message: "nested tables inside arrays are not supported".into(),
            })
        }
    })
}
