// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 siteflow contributors

//! File system provider boundary
//!
//! Input and Output phase modules touch disk only through this trait; the
//! scheduler itself never performs file IO. All paths are provider-relative.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{SiteflowError, SiteflowResult};

/// File system access for Input/Output phase modules
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read the full contents of a file
    async fn read(&self, path: &Path) -> SiteflowResult<Vec<u8>>;

    /// Write a file, creating parent directories as needed
    async fn write(&self, path: &Path, data: &[u8]) -> SiteflowResult<()>;

    /// List files matching a glob pattern, sorted for deterministic order
    async fn list(&self, pattern: &str) -> SiteflowResult<Vec<PathBuf>>;

    /// Check whether a path exists
    async fn exists(&self, path: &Path) -> bool;
}

/// File system provider rooted at a directory on disk
pub struct StdFileSystem {
    root: PathBuf,
}

impl StdFileSystem {
    /// Create a provider rooted at `root`; relative paths resolve against it
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of this provider
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl FileSystem for StdFileSystem {
    async fn read(&self, path: &Path) -> SiteflowResult<Vec<u8>> {
        let full = self.resolve(path);
        tokio::fs::read(&full)
            .await
            .map_err(|e| SiteflowError::FileReadError {
                path: full,
                error: e.to_string(),
            })
    }

    async fn write(&self, path: &Path, data: &[u8]) -> SiteflowResult<()> {
        let full = self.resolve(path);

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SiteflowError::FileWriteError {
                    path: full.clone(),
                    error: e.to_string(),
                })?;
        }

        tokio::fs::write(&full, data)
            .await
            .map_err(|e| SiteflowError::FileWriteError {
                path: full,
                error: e.to_string(),
            })
    }

    async fn list(&self, pattern: &str) -> SiteflowResult<Vec<PathBuf>> {
        let full_pattern = if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            self.root.join(pattern).to_string_lossy().to_string()
        };

        let mut files: Vec<PathBuf> = glob::glob(&full_pattern)
            .map_err(|e| SiteflowError::GlobPattern {
                message: e.to_string(),
            })?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .map(|p| {
                // Report paths relative to the root so documents carry
                // provider-relative sources
                p.strip_prefix(&self.root)
                    .map(Path::to_path_buf)
                    .unwrap_or(p)
            })
            .collect();

        files.sort();
        Ok(files)
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(self.resolve(path))
            .await
            .unwrap_or(false)
    }
}

/// In-memory file system for tests and isolated runs
#[derive(Default)]
pub struct MemoryFileSystem {
    files: DashMap<PathBuf, Arc<[u8]>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without going through the async trait
    pub fn add_file(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), Arc::from(data.into()));
    }

    /// Number of files currently stored
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read(&self, path: &Path) -> SiteflowResult<Vec<u8>> {
        self.files
            .get(path)
            .map(|data| data.to_vec())
            .ok_or_else(|| SiteflowError::FileReadError {
                path: path.to_path_buf(),
                error: "file not found".into(),
            })
    }

    async fn write(&self, path: &Path, data: &[u8]) -> SiteflowResult<()> {
        self.files.insert(path.to_path_buf(), Arc::from(data));
        Ok(())
    }

    async fn list(&self, pattern: &str) -> SiteflowResult<Vec<PathBuf>> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| SiteflowError::GlobPattern {
            message: e.to_string(),
        })?;

        let mut files: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|entry| matcher.matches_path(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        files.sort();
        Ok(files)
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}
