// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Metadata type conversion
//!
//! Conversion failure is a `None`, never a panic or an error. The rules, in
//! order: null converts only to option-like targets; identical types pass
//! through; a sequence converts to a scalar (including string) through its
//! first convertible element; a scalar converts to a sequence as a singleton;
//! sequence-to-sequence converts element-wise with every element required to
//! convert.

use std::path::PathBuf;

use crate::document::Document;
use crate::meta::Value;

/// Conversion from an expanded metadata value
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

// Option is the nullable target: null maps to None, anything else must
// convert to the inner type.
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// First convertible element of a sequence
fn first_convertible<T: FromValue>(seq: &[Value]) -> Option<T> {
    seq.iter().find_map(T::from_value)
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Str(s) => match s.trim().to_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Value::Seq(seq) => first_convertible(seq),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            Value::Float(x) if x.fract() == 0.0 => Some(*x as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Seq(seq) => first_convertible(seq),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for usize {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|i| usize::try_from(i).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Seq(seq) => first_convertible(seq),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(x) => Some(x.to_string()),
            // a sequence stringifies through its first convertible element,
            // not a rendering of the whole collection
            Value::Seq(seq) => first_convertible(seq),
            _ => None,
        }
    }
}

impl FromValue for PathBuf {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(PathBuf::from(s)),
            Value::Seq(seq) => first_convertible(seq),
            _ => None,
        }
    }
}

impl FromValue for Document {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Document(d) => Some(d.clone()),
            Value::Seq(seq) => first_convertible(seq),
            _ => None,
        }
    }
}

// A scalar wraps into a singleton sequence; a sequence converts element-wise
// and fails if any element fails.
impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Seq(seq) => seq.iter().map(T::from_value).collect(),
            scalar => T::from_value(scalar).map(|v| vec![v]),
        }
    }
}
