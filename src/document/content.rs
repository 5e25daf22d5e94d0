// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! Document content payloads
//!
//! Content is either empty, held in memory, or backed by a file read through
//! the file system provider on demand (large inputs stay on disk until a
//! module actually needs the bytes).

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::SiteflowResult;
use crate::fs::FileSystem;

/// Content payload of a document
#[derive(Clone)]
pub enum Content {
    Empty,
    /// Bytes held in memory, shared across document clones
    Memory(Arc<[u8]>),
    /// Bytes read from the file system provider on each access
    File {
        path: PathBuf,
        fs: Arc<dyn FileSystem>,
    },
}

impl Content {
    pub fn from_string(s: impl Into<String>) -> Self {
        Content::Memory(Arc::from(s.into().into_bytes()))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Content::Memory(Arc::from(bytes.into()))
    }

    pub fn from_file(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Content::File {
            path: path.into(),
            fs,
        }
    }

    /// The raw bytes; file-backed content reads through the provider
    pub async fn bytes(&self) -> SiteflowResult<Cow<'_, [u8]>> {
        match self {
            Content::Empty => Ok(Cow::Borrowed(&[])),
            Content::Memory(bytes) => Ok(Cow::Borrowed(bytes)),
            Content::File { path, fs } => Ok(Cow::Owned(fs.read(path).await?)),
        }
    }

    /// The content as UTF-8 text, lossy on invalid sequences
    pub async fn text(&self) -> SiteflowResult<String> {
        Ok(String::from_utf8_lossy(&self.bytes().await?).into_owned())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Content::Empty)
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Empty
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Empty => write!(f, "Empty"),
            Content::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
            Content::File { path, .. } => write!(f, "File({})", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use std::path::Path;

    #[tokio::test]
    async fn test_memory_content() {
        let content = Content::from_string("hello");
        assert_eq!(content.text().await.unwrap(), "hello");
        assert_eq!(&*content.bytes().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_file_backed_content_reads_through_provider() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("page.md", "# Title");

        let content = Content::from_file(Path::new("page.md"), fs);
        assert_eq!(content.text().await.unwrap(), "# Title");
    }

    #[tokio::test]
    async fn test_empty_content() {
        let content = Content::Empty;
        assert!(content.is_empty());
        assert_eq!(content.text().await.unwrap(), "");
    }
}
