// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Keep a project manifest in sync with the source tree it describes.
//!
//! A __manifest__ mirrors a directory tree as a tree of groups and file
//! references, and lists which __targets__ build which files. Whenever files
//! are created, deleted, moved, or renamed, the manifest has to follow along.
//! This crate provides the pieces to do that:
//!
//! - [`manifest`]: the manifest tree itself.
//! - [`sync`]: apply one logical filesystem operation to a manifest.
//! - [`correlate`]: pair raw creations and deletions back up into moves.
//! - [`store`]: load and save manifests.
//! - [`project`]: run batches of operations as load, apply, save passes.
//! - [`watch`]: drive all of the above from filesystem notifications.

pub mod config;
pub mod correlate;
pub mod fs;
pub mod manifest;
pub mod path;
pub mod project;
pub mod report;
pub mod store;
pub mod sync;
pub mod watch;

pub use config::SyncConfig;
pub use correlate::{Clock, CorrelationWindows, Correlator, SystemClock};
pub use manifest::{Manifest, ManifestError, NodeId, NodeKind, TargetId};
pub use project::{Pass, Project, ProjectError};
pub use report::{Level, Observer, Report, TracingObserver};
pub use store::{ManifestStore, MemoryManifestStore, StoreError, TomlManifestStore};
pub use sync::{EntryKind, Operation, ProjectLayout, SyncError, Synchronizer};
