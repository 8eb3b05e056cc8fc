// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem side of explicit operations.
//!
//! Creating or deleting an entry through the command line touches the disk as
//! well as the manifest. The disk part goes through [`FileSystem`] so the
//! manifest side never performs I/O on its own.

use crate::sync::EntryKind;

use std::{
    fs::{remove_dir_all, remove_file, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Perform file I/O for explicit operations.
pub trait FileSystem {
    /// Create directory along with missing parents.
    fn create_dir(&self, path: &Path) -> Result<()>;

    /// Create empty file along with missing parent directories.
    ///
    /// # Errors
    ///
    /// - Return [`FsError::AlreadyExists`] if something already lives at path.
    fn create_file(&self, path: &Path) -> Result<()>;

    /// Remove entry of given kind. Directories are removed recursively.
    fn remove(&self, path: &Path, kind: EntryKind) -> Result<()>;
}

/// File I/O against the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn create_dir(&self, path: &Path) -> Result<()> {
        mkdirp::mkdirp(path).map_err(|err| FsError::Io {
            source: err,
            path: path.to_path_buf(),
        })?;
        debug!("created directory {:?}", path.display());

        Ok(())
    }

    fn create_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir(parent)?;
        }

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => FsError::AlreadyExists {
                    path: path.to_path_buf(),
                },
                _ => FsError::Io {
                    source: err,
                    path: path.to_path_buf(),
                },
            })?;
        debug!("created file {:?}", path.display());

        Ok(())
    }

    fn remove(&self, path: &Path, kind: EntryKind) -> Result<()> {
        let result = match kind {
            EntryKind::Group => remove_dir_all(path),
            EntryKind::File => remove_file(path),
        };
        result.map_err(|err| FsError::Io {
            source: err,
            path: path.to_path_buf(),
        })?;
        debug!("removed {:?}", path.display());

        Ok(())
    }
}

/// Filesystem error types.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// Entry to create already exists.
    #[error("{:?} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    /// Any other I/O failure.
    #[error("failed to access {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = FsError> = std::result::Result<T, E>;
