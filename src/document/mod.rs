// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Immutable documents
//!
//! A document is content plus its own metadata layer, a stable identity
//! preserved across derived clones, and optional source/destination paths.
//! Deriving never mutates the original: a `with_*` call produces a new
//! document whose metadata chains a fresh layer over the original's.

mod content;
mod tree;

pub use content::Content;
pub use tree::keys;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::meta::{FromValue, Metadata, Value};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable document identity, preserved across derived clones
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

struct Inner {
    id: DocumentId,
    source: Option<PathBuf>,
    destination: Option<PathBuf>,
    metadata: Metadata,
    content: Content,
}

/// An immutable unit of content + metadata flowing through modules
#[derive(Clone)]
pub struct Document {
    inner: Arc<Inner>,
}

impl Document {
    /// A fresh document with a new identity
    pub fn new(content: Content, metadata: Metadata) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: DocumentId::next(),
                source: None,
                destination: None,
                metadata,
                content,
            }),
        }
    }

    /// An empty document
    pub fn empty() -> Self {
        Self::new(Content::Empty, Metadata::new())
    }

    pub fn id(&self) -> DocumentId {
        self.inner.id
    }

    pub fn source(&self) -> Option<&Path> {
        self.inner.source.as_deref()
    }

    pub fn destination(&self) -> Option<&Path> {
        self.inner.destination.as_deref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    pub fn content(&self) -> &Content {
        &self.inner.content
    }

    /// Shorthand for `metadata().get::<T>(key)`
    pub fn get<T: FromValue>(&self, key: &str) -> Option<T> {
        self.inner.metadata.get(key)
    }

    /// Derive a document with extra metadata chained over this one's;
    /// identity and content are shared, the original is untouched.
    pub fn with_metadata<K, V, I>(&self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.derive(|inner| Inner {
            metadata: inner.metadata.with(pairs),
            ..Self::clone_inner(inner)
        })
    }

    /// Derive a document with different content
    pub fn with_content(&self, content: Content) -> Self {
        self.derive(|inner| Inner {
            content,
            ..Self::clone_inner(inner)
        })
    }

    /// Derive a document with a source path
    pub fn with_source(&self, source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        self.derive(move |inner| Inner {
            source: Some(source),
            ..Self::clone_inner(inner)
        })
    }

    /// Derive a document with a destination path
    pub fn with_destination(&self, destination: impl Into<PathBuf>) -> Self {
        let destination = destination.into();
        self.derive(move |inner| Inner {
            destination: Some(destination),
            ..Self::clone_inner(inner)
        })
    }

    fn clone_inner(inner: &Inner) -> Inner {
        Inner {
            id: inner.id,
            source: inner.source.clone(),
            destination: inner.destination.clone(),
            metadata: inner.metadata.clone(),
            content: inner.content.clone(),
        }
    }

    fn derive(&self, build: impl FnOnce(&Inner) -> Inner) -> Self {
        Self {
            inner: Arc::new(build(&self.inner)),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.inner.id)
            .field("source", &self.inner.source)
            .field("destination", &self.inner.destination)
            .field("content", &self.inner.content)
            .finish()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.inner.source, &self.inner.destination) {
            (_, Some(dest)) => write!(f, "{} -> {}", self.inner.id, dest.display()),
            (Some(src), None) => write!(f, "{} ({})", self.inner.id, src.display()),
            (None, None) => write!(f, "{}", self.inner.id),
        }
    }
}
