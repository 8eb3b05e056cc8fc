// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Manifest synchronization.
//!
//! Translate one logical filesystem operation into a sequence of mutations
//! against a [`Manifest`], and pick the target that builds newly visible
//! files.
//!
//! # Logical Operations
//!
//! Four operations exist: create, delete, move, and rename. Each one carries
//! an [`EntryKind`] that is decided once when the operation is built, so the
//! synchronizer never has to guess whether a path stood for a directory or a
//! file. That matters for deletions and moves, where the old path is usually
//! gone from disk by the time the manifest catches up.
//!
//! # Two Roots
//!
//! Group paths are relative to the __source root__, the directory holding the
//! manifest file. Target selection looks at the first path segment below the
//! __project root__ instead. Both are usually the same directory, but they do
//! not have to be.
//!
//! # Target Selection
//!
//! A new file is built by the target named after the first path segment below
//! the project root. If no target carries that name, the first declared target
//! is used and a [`Notice::TargetFallback`] is handed back to the caller so
//! that the fallback never goes unnoticed.
//!
//! # Failure Atomicity
//!
//! Every operation either applies in full or leaves the manifest untouched.
//! Collisions are checked before anything is created, and a move that fails
//! half way puts the node back where it came from.

use crate::{
    manifest::{Manifest, ManifestError, NodeId, NodeKind, TargetId},
    path::segments,
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Whether a logical operation concerns a directory or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Directory, mirrored as a group.
    Group,

    /// File, mirrored as a file reference.
    File,
}

impl EntryKind {
    /// Decide kind by looking at the filesystem.
    ///
    /// Anything that is not an existing directory counts as a file.
    pub fn probe(path: impl AsRef<Path>) -> Self {
        if path.as_ref().is_dir() {
            Self::Group
        } else {
            Self::File
        }
    }

    pub fn node_kind(self) -> NodeKind {
        match self {
            Self::Group => NodeKind::Group,
            Self::File => NodeKind::FileReference,
        }
    }
}

/// Logical filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Entry appeared.
    Create { path: PathBuf, kind: EntryKind },

    /// Entry vanished.
    Delete { path: PathBuf, kind: EntryKind },

    /// Entry changed parent directory, and maybe its name.
    Move {
        from: PathBuf,
        to: PathBuf,
        kind: EntryKind,
    },

    /// Entry changed name inside the same parent directory.
    Rename {
        from: PathBuf,
        to: PathBuf,
        kind: EntryKind,
    },
}

impl Operation {
    /// Construct move or rename depending on the parent directories.
    pub fn relocate(from: impl Into<PathBuf>, to: impl Into<PathBuf>, kind: EntryKind) -> Self {
        let (from, to) = (from.into(), to.into());
        if from.parent() == to.parent() {
            Self::Rename { from, to, kind }
        } else {
            Self::Move { from, to, kind }
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Create { kind, .. }
            | Self::Delete { kind, .. }
            | Self::Move { kind, .. }
            | Self::Rename { kind, .. } => *kind,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Create { path, .. } => write!(fmt, "create {:?}", path.display()),
            Self::Delete { path, .. } => write!(fmt, "delete {:?}", path.display()),
            Self::Move { from, to, .. } => {
                write!(fmt, "move {:?} to {:?}", from.display(), to.display())
            }
            Self::Rename { from, to, .. } => {
                write!(fmt, "rename {:?} to {:?}", from.display(), to.display())
            }
        }
    }
}

/// Something worth reporting about an operation that still succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No target matched the first path segment, so the first target was used.
    TargetFallback {
        folder: Option<String>,
        target: String,
    },
}

impl Display for Notice {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::TargetFallback { folder, target } => write!(
                fmt,
                "no target found matching folder {:?}, using first target {target:?}",
                folder.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// Directories the synchronizer resolves paths against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    source_root: PathBuf,
    project_root: PathBuf,
}

impl ProjectLayout {
    /// Construct new layout.
    ///
    /// `source_root` is the directory holding the manifest file. Target
    /// selection happens relative to `project_root`.
    pub fn new(source_root: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            project_root: project_root.into(),
        }
    }

    /// Construct layout where both roots are the same directory.
    pub fn single(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::new(root.clone(), root)
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Segments of an entry strictly below the source root.
    fn entry_segments(&self, path: &Path) -> Result<Vec<String>> {
        segments(&self.source_root, path)
            .filter(|segments| !segments.is_empty())
            .ok_or_else(|| SyncError::OutsideRoot {
                path: path.to_path_buf(),
                root: self.source_root.clone(),
            })
    }
}

/// Apply logical operations to a manifest.
///
/// Holds no state besides the project layout, so one synchronizer can serve
/// any number of manifests.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    layout: ProjectLayout,
}

impl Synchronizer {
    /// Construct new synchronizer.
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Apply one logical operation.
    ///
    /// Returns notices about things that went through but deserve a warning.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::SourceNotFound`] if the entry to delete, move, or
    ///   rename is not in the manifest.
    /// - Return [`SyncError::DuplicateEntry`] if the destination already holds
    ///   an entry of the same kind.
    /// - Return [`SyncError::TargetNotResolved`] if a new file has no target.
    /// - Return [`SyncError::OutsideRoot`] if a path is not strictly below the
    ///   source root.
    ///
    /// The manifest is left untouched on every error.
    #[instrument(skip(self, manifest), level = "debug")]
    pub fn apply(&self, manifest: &mut Manifest, operation: &Operation) -> Result<Vec<Notice>> {
        match operation {
            Operation::Create { path, kind } => self.create(manifest, path, *kind),
            Operation::Delete { path, kind } => self.delete(manifest, path, *kind),
            Operation::Move { from, to, kind } => self.relocate(manifest, from, to, *kind),
            Operation::Rename { from, to, kind } => self.rename(manifest, from, to, *kind),
        }
    }

    /// Select target for a file by the first path segment below the project
    /// root.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::TargetNotResolved`] if the manifest declares no
    ///   targets at all.
    pub fn select_target(
        &self,
        manifest: &Manifest,
        path: impl AsRef<Path>,
    ) -> Result<(TargetId, Option<Notice>)> {
        let folder = segments(&self.layout.project_root, path.as_ref())
            .and_then(|segments| segments.into_iter().next());

        if let Some(target) = folder
            .as_deref()
            .and_then(|folder| manifest.target_named(folder))
        {
            return Ok((target, None));
        }

        let target = manifest
            .first_target()
            .ok_or_else(|| SyncError::TargetNotResolved {
                path: path.as_ref().to_path_buf(),
            })?;
        let name = manifest
            .target(target)
            .map(|target| target.name().to_string())
            .unwrap_or_default();
        warn!("no target found matching folder {folder:?}, using first target {name:?}");

        Ok((
            target,
            Some(Notice::TargetFallback {
                folder,
                target: name,
            }),
        ))
    }

    /// Find manifest node standing for a path.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::SourceNotFound`] if there is no such node.
    pub fn resolve(&self, manifest: &Manifest, path: &Path, kind: EntryKind) -> Result<NodeId> {
        let segments = self.layout.entry_segments(path)?;
        let found = match kind {
            EntryKind::Group => manifest.find_group(manifest.main_group(), &segments),
            EntryKind::File => {
                manifest.find_file_reference(segments.iter().collect::<PathBuf>())
            }
        };

        found.ok_or_else(|| SyncError::SourceNotFound {
            path: path.to_path_buf(),
        })
    }

    /// Decide kind of an entry that may already be gone from disk.
    ///
    /// Existing paths are probed. Missing paths fall back to what the manifest
    /// holds for them, preferring a file reference.
    pub fn kind_of(&self, manifest: &Manifest, path: &Path) -> EntryKind {
        if path.exists() {
            return EntryKind::probe(path);
        }

        if self.resolve(manifest, path, EntryKind::File).is_err()
            && self.resolve(manifest, path, EntryKind::Group).is_ok()
        {
            return EntryKind::Group;
        }

        EntryKind::File
    }

    fn create(&self, manifest: &mut Manifest, path: &Path, kind: EntryKind) -> Result<Vec<Notice>> {
        let mut segments = self.layout.entry_segments(path)?;
        let root = manifest.main_group();

        if kind == EntryKind::Group {
            manifest.resolve_or_create_group_path(root, &segments)?;
            info!("add group {:?}", path.display());
            return Ok(Vec::new());
        }

        let basename = segments.pop().unwrap_or_default();
        let (target, notice) = self.select_target(manifest, path)?;

        // INVARIANT: Check for collision before creating any group.
        if let Some(parent) = manifest.find_group(root, &segments) {
            if manifest
                .child(parent, &basename, NodeKind::FileReference)
                .is_some()
            {
                return Err(SyncError::DuplicateEntry {
                    path: path.to_path_buf(),
                });
            }
        }

        let parent = manifest.resolve_or_create_group_path(root, &segments)?;
        let file = manifest.new_file_reference(basename);
        manifest.attach(file, parent).map_err(|err| map_duplicate(err, path))?;
        manifest.add_build_file(target, file)?;
        info!("add file {:?}", path.display());

        Ok(notice.into_iter().collect())
    }

    fn delete(&self, manifest: &mut Manifest, path: &Path, kind: EntryKind) -> Result<Vec<Notice>> {
        let node = self.resolve(manifest, path, kind)?;
        manifest.detach(node)?;
        info!("remove {:?}", path.display());

        Ok(Vec::new())
    }

    fn relocate(
        &self,
        manifest: &mut Manifest,
        from: &Path,
        to: &Path,
        kind: EntryKind,
    ) -> Result<Vec<Notice>> {
        let node = self.resolve(manifest, from, kind)?;
        let source = self.layout.entry_segments(from)?;
        let mut destination = self.layout.entry_segments(to)?;
        if source == destination {
            debug!("skip move of {:?} onto itself", from.display());
            return Ok(Vec::new());
        }

        // INVARIANT: A group can never end up inside itself.
        if kind == EntryKind::Group && destination.starts_with(&source) {
            return Err(ManifestError::Cycle(node).into());
        }

        let basename = destination.pop().unwrap_or_default();
        let root = manifest.main_group();

        // INVARIANT: Check for collision before creating any group.
        if let Some(parent) = manifest.find_group(root, &destination) {
            if manifest
                .child(parent, &basename, kind.node_kind())
                .is_some()
            {
                return Err(SyncError::DuplicateEntry {
                    path: to.to_path_buf(),
                });
            }
        }

        let parent = manifest.resolve_or_create_group_path(root, &destination)?;
        let old_path = manifest
            .node(node)
            .map(|node| node.path().to_string())
            .unwrap_or_default();
        let old_name = manifest
            .node(node)
            .map(|node| node.name().to_string())
            .unwrap_or_default();

        let slot = manifest.unlink(node)?;
        manifest.rename_path(node, basename)?;
        if let Err(err) = manifest.attach(node, parent) {
            warn!("cannot move {:?}, restoring original position", from.display());
            manifest.rename_path(node, old_path)?;
            manifest.set_name(node, old_name)?;
            manifest.relink(node, slot)?;
            return Err(map_duplicate(err, to));
        }
        info!("move {:?} to {:?}", from.display(), to.display());

        Ok(Vec::new())
    }

    fn rename(
        &self,
        manifest: &mut Manifest,
        from: &Path,
        to: &Path,
        kind: EntryKind,
    ) -> Result<Vec<Notice>> {
        if from.parent() != to.parent() {
            debug!("rename of {:?} crosses directories, treat as move", from.display());
            return self.relocate(manifest, from, to, kind);
        }

        let node = self.resolve(manifest, from, kind)?;
        let basename = self
            .layout
            .entry_segments(to)?
            .pop()
            .unwrap_or_default();
        manifest
            .rename_path(node, basename)
            .map_err(|err| map_duplicate(err, to))?;
        info!("rename {:?} to {:?}", from.display(), to.display());

        Ok(Vec::new())
    }
}

fn map_duplicate(err: ManifestError, path: &Path) -> SyncError {
    match err {
        ManifestError::DuplicateEntry { .. } => SyncError::DuplicateEntry {
            path: path.to_path_buf(),
        },
        err => SyncError::Manifest(err),
    }
}

/// Synchronization error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Entry to delete, move, or rename is not in the manifest.
    #[error("{:?} not found in manifest", path.display())]
    SourceNotFound { path: PathBuf },

    /// Destination already holds an entry of the same kind.
    #[error("{:?} already exists in manifest", path.display())]
    DuplicateEntry { path: PathBuf },

    /// No target available to build a new file.
    #[error("no target found in manifest for {:?}", path.display())]
    TargetNotResolved { path: PathBuf },

    /// Path is not strictly below the source root.
    #[error("{:?} is not inside source root {:?}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Manifest tree refused a mutation.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl SyncError {
    /// Check if error should be reported as a warning.
    ///
    /// Missing sources and duplicate destinations mean the manifest is most
    /// likely consistent already, so the operation is skipped.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. } | Self::DuplicateEntry { .. }
        )
    }
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
