// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Manifest persistence.
//!
//! The synchronization core treats the persisted manifest as an opaque store
//! that can be loaded and saved. [`TomlManifestStore`] keeps it in a TOML file
//! laid out by [`ManifestDocument`](crate::manifest::document::ManifestDocument).
//! [`MemoryManifestStore`] keeps it in memory for embedders that persist the
//! manifest some other way.
//!
//! # File Store Layout
//!
//! The directory holding the manifest file is the source root of the project.
//! Saving writes the whole manifest to a temporary sibling file first and then
//! renames it over the original, so a crash mid-save never leaves a truncated
//! manifest behind.

use crate::manifest::{document::DocumentError, Manifest};

use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::fs;
use tracing::{debug, instrument};

/// Load and save manifests.
pub trait ManifestStore {
    /// Load current manifest.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ManifestNotFound`] if nothing is stored.
    /// - Return [`StoreError::Corrupt`] if stored content cannot be parsed.
    fn load(&self) -> impl Future<Output = Result<Manifest>> + Send;

    /// Persist manifest, replacing whatever was stored.
    fn save(&self, manifest: &Manifest) -> impl Future<Output = Result<()>> + Send;
}

/// Manifest kept in a TOML file.
#[derive(Debug, Clone)]
pub struct TomlManifestStore {
    path: PathBuf,
}

impl TomlManifestStore {
    /// Construct new file store. Does not check if the file exists.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the manifest file.
    pub fn source_root(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ManifestStore for TomlManifestStore {
    #[instrument(skip(self), fields(path = ?self.path.display()), level = "debug")]
    async fn load(&self) -> Result<Manifest> {
        let data = fs::read_to_string(&self.path)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => StoreError::ManifestNotFound {
                    path: self.path.clone(),
                },
                _ => StoreError::Read {
                    source: err,
                    path: self.path.clone(),
                },
            })?;

        data.parse::<Manifest>().map_err(|err| StoreError::Corrupt {
            source: err,
            path: self.path.clone(),
        })
    }

    #[instrument(skip(self, manifest), fields(path = ?self.path.display()), level = "debug")]
    async fn save(&self, manifest: &Manifest) -> Result<()> {
        let data = manifest.to_string();
        let staging = self.staging_path();
        let write_err = |err| StoreError::Write {
            source: err,
            path: self.path.clone(),
        };

        fs::write(&staging, data.as_bytes()).await.map_err(write_err)?;
        fs::rename(&staging, &self.path).await.map_err(write_err)?;
        debug!("saved {} file references", manifest.file_references().len());

        Ok(())
    }
}

/// Manifest kept in memory.
///
/// Clones share the same manifest.
#[derive(Debug, Default, Clone)]
pub struct MemoryManifestStore {
    manifest: Arc<Mutex<Option<Manifest>>>,
}

impl MemoryManifestStore {
    /// Construct new store holding a manifest.
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest: Arc::new(Mutex::new(Some(manifest))),
        }
    }

    /// Construct new store holding nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Copy of the stored manifest.
    pub fn snapshot(&self) -> Option<Manifest> {
        self.manifest.lock().ok().and_then(|manifest| manifest.clone())
    }
}

impl ManifestStore for MemoryManifestStore {
    async fn load(&self) -> Result<Manifest> {
        self.snapshot().ok_or_else(|| StoreError::ManifestNotFound {
            path: PathBuf::from("<memory>"),
        })
    }

    async fn save(&self, manifest: &Manifest) -> Result<()> {
        let mut slot = self.manifest.lock().map_err(|_| StoreError::Poisoned)?;
        *slot = Some(manifest.clone());

        Ok(())
    }
}

/// Manifest store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No manifest stored.
    #[error("manifest not found at {:?}", path.display())]
    ManifestNotFound { path: PathBuf },

    /// Stored manifest cannot be parsed.
    #[error("manifest at {:?} is corrupt", path.display())]
    Corrupt {
        #[source]
        source: DocumentError,
        path: PathBuf,
    },

    /// Manifest file cannot be read.
    #[error("failed to read manifest at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Manifest file cannot be written.
    #[error("failed to write manifest at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// In-memory store lock was poisoned.
    #[error("manifest store lock poisoned")]
    Poisoned,
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
