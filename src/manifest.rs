// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project manifest model.
//!
//! A __manifest__ mirrors a directory tree of source files as a tree of
//! __groups__ and __file references__, plus a list of __targets__ whose build
//! phases point at some of those file references.
//!
//! # Tree Layout
//!
//! Every manifest has exactly one root group called the __main group__. The
//! main group stands for the directory that contains the manifest file
//! itself, so its path segment is always empty. Each group below it carries a
//! path segment that is appended to the segments of its ancestors to form the
//! real path of anything it contains. File references never store their full
//! path. Their real path is always derived by walking the parent chain, so a
//! group rename implicitly relocates every descendant.
//!
//! Siblings never share the same path segment and node kind. A group and a
//! file reference may share a segment, because the filesystem cannot hold
//! both at once anyway and the manifest has no reason to reject it.
//!
//! # Storage
//!
//! Nodes live in an arena owned by [`Manifest`], addressed through
//! [`NodeId`] handles. Children lists own nothing. Parent links are plain
//! back references that every mutation primitive keeps in sync with the
//! children lists. A node that is unlinked from the tree stays in the arena as
//! a floating node until it is attached again, which keeps reparenting a cheap
//! index swap.
//!
//! # Target Membership
//!
//! Targets live next to the tree, see [`target`]. Removing nodes through
//! [`Manifest::detach`] cascades into every build phase so no build file ever
//! points at an unreachable file reference.

pub mod document;
pub mod target;

use crate::manifest::target::{BuildFile, Target};

use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::debug;

/// Handle to a node stored in a [`Manifest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Handle to a target stored in a [`Manifest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(usize);

/// Kind of manifest node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Directory-like node holding children.
    Group,

    /// Leaf node standing for one file.
    FileReference,
}

impl Display for NodeKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Group => fmt.write_str("group"),
            Self::FileReference => fmt.write_str("file reference"),
        }
    }
}

/// A single group or file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    kind: NodeKind,
    name: String,
    path: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            path: path.into(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Display name of node.
    ///
    /// File references always use their path segment as their name.
    pub fn name(&self) -> &str {
        match self.kind {
            NodeKind::Group => &self.name,
            NodeKind::FileReference => &self.path,
        }
    }

    /// Path segment relative to the parent group.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Owning group, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in display order. Always empty for file references.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }
}

/// Position of a node inside its parent's children.
///
/// Returned by [`Manifest::unlink`] so that the node can be put back exactly
/// where it was through [`Manifest::relink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub parent: NodeId,
    pub index: usize,
}

/// In-memory project manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    nodes: Vec<Node>,
    main_group: NodeId,
    targets: Vec<Target>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Construct new manifest with an empty main group and no targets.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Group, "", "")],
            main_group: NodeId(0),
            targets: Vec::new(),
        }
    }

    pub fn main_group(&self) -> NodeId {
        self.main_group
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(ManifestError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(ManifestError::UnknownNode(id))
    }

    fn group(&self, id: NodeId) -> Result<&Node> {
        let node = self.get(id)?;
        if !node.is_group() {
            return Err(ManifestError::NotAGroup(id));
        }

        Ok(node)
    }

    /// Construct new floating group.
    ///
    /// The group is not part of the tree until it is attached.
    pub fn new_group(&mut self, name: impl Into<String>, path: impl Into<String>) -> NodeId {
        self.nodes.push(Node::new(NodeKind::Group, name, path));
        NodeId(self.nodes.len() - 1)
    }

    /// Construct new floating file reference.
    ///
    /// The file reference is not part of the tree until it is attached.
    pub fn new_file_reference(&mut self, path: impl Into<String>) -> NodeId {
        let path = path.into();
        self.nodes
            .push(Node::new(NodeKind::FileReference, path.clone(), path));
        NodeId(self.nodes.len() - 1)
    }

    /// Find child of group by path segment and kind.
    pub fn child(&self, parent: NodeId, path: &str, kind: NodeKind) -> Option<NodeId> {
        self.node(parent)?.children.iter().copied().find(|child| {
            self.node(*child)
                .is_some_and(|node| node.kind == kind && node.path == path)
        })
    }

    /// Walk path segments from a group, creating missing groups on the way.
    ///
    /// New groups take the segment as both name and path. Walking the same
    /// segments twice always yields the same group.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::NotAGroup`] if `root` is a file reference.
    pub fn resolve_or_create_group_path(
        &mut self,
        root: NodeId,
        segments: &[impl AsRef<str>],
    ) -> Result<NodeId> {
        let mut current = self.group(root).map(|_| root)?;
        for segment in segments.iter().map(AsRef::as_ref) {
            current = match self.child(current, segment, NodeKind::Group) {
                Some(next) => next,
                None => {
                    debug!("create missing group {segment:?}");
                    let next = self.new_group(segment, segment);
                    self.attach(next, current)?;
                    next
                }
            };
        }

        Ok(current)
    }

    /// Walk path segments from a group without creating anything.
    pub fn find_group(&self, root: NodeId, segments: &[impl AsRef<str>]) -> Option<NodeId> {
        let mut current = self.group(root).ok().map(|_| root)?;
        for segment in segments.iter().map(AsRef::as_ref) {
            current = self.child(current, segment, NodeKind::Group)?;
        }

        Some(current)
    }

    /// Find reachable file reference by its full path relative to the main
    /// group.
    ///
    /// Performs a linear search, because basenames are not unique across the
    /// tree and only the full derived path identifies a file reference.
    pub fn find_file_reference(&self, path: impl Into<PathBuf>) -> Option<NodeId> {
        let path = path.into();
        self.file_references()
            .into_iter()
            .find(|id| self.relative_path(*id) == path)
    }

    /// All nodes below a node in depth-first pre-order, excluding the node
    /// itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = match self.node(id) {
            Some(node) => node.children.iter().rev().copied().collect::<Vec<_>>(),
            None => return found,
        };

        while let Some(next) = stack.pop() {
            found.push(next);
            if let Some(node) = self.node(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }

        found
    }

    /// All file references reachable from the main group in display order.
    pub fn file_references(&self) -> Vec<NodeId> {
        self.descendants(self.main_group)
            .into_iter()
            .filter(|id| {
                self.node(*id)
                    .is_some_and(|node| node.kind == NodeKind::FileReference)
            })
            .collect()
    }

    /// Check if node can be reached from the main group.
    pub fn is_reachable(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(next) = current {
            if next == self.main_group {
                return true;
            }
            current = self.node(next).and_then(Node::parent);
        }

        false
    }

    /// Path of node relative to the main group.
    ///
    /// Concatenates the path segments of every ancestor from the main group
    /// down to the node itself.
    pub fn relative_path(&self, id: NodeId) -> PathBuf {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(next) = current {
            let Some(node) = self.node(next) else {
                break;
            };
            if !node.path.is_empty() {
                segments.push(node.path.as_str());
            }
            current = node.parent;
        }

        segments.iter().rev().collect()
    }

    /// Append floating node to the children of a group.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::AlreadyAttached`] if node has a parent.
    /// - Return [`ManifestError::NotAGroup`] if parent is a file reference.
    /// - Return [`ManifestError::Cycle`] if parent is the node or one of its
    ///   descendants.
    /// - Return [`ManifestError::DuplicateEntry`] if a sibling with the same
    ///   path and kind already exists.
    pub fn attach(&mut self, id: NodeId, parent: NodeId) -> Result<()> {
        let node = self.get(id)?;
        if node.parent.is_some() || id == self.main_group {
            return Err(ManifestError::AlreadyAttached(id));
        }
        let (kind, path) = (node.kind, node.path.clone());

        self.group(parent)?;
        if self.is_self_or_descendant(parent, id) {
            return Err(ManifestError::Cycle(id));
        }

        if self.child(parent, &path, kind).is_some() {
            return Err(ManifestError::DuplicateEntry {
                kind,
                path: self.relative_path(parent).join(path),
            });
        }

        self.get_mut(parent)?.children.push(id);
        self.get_mut(id)?.parent = Some(parent);

        Ok(())
    }

    /// Remove node from the tree and from every build phase.
    ///
    /// For a group, every descendant file reference is removed from every
    /// target's build phase before the group itself is unlinked. The node
    /// keeps its subtree and may be attached again.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::NotAttached`] if node has no parent.
    pub fn detach(&mut self, id: NodeId) -> Result<Slot> {
        let node = self.get(id)?;
        if node.parent.is_none() {
            return Err(ManifestError::NotAttached(id));
        }

        let mut doomed = self
            .descendants(id)
            .into_iter()
            .filter(|child| {
                self.node(*child)
                    .is_some_and(|node| node.kind == NodeKind::FileReference)
            })
            .collect::<HashSet<_>>();
        if node.kind == NodeKind::FileReference {
            doomed.insert(id);
        }

        let removed = self
            .targets
            .iter_mut()
            .map(|target| target.build_phase_mut().remove_file_refs(&doomed))
            .sum::<usize>();
        debug!("detach {:?} dropped {removed} build files", self.relative_path(id));

        self.unlink(id)
    }

    /// Remove node from its parent's children without touching build phases.
    ///
    /// Meant for moves, where the node leaves the tree only for the duration
    /// of a single operation. Pair with [`Manifest::relink`] to undo.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::NotAttached`] if node has no parent.
    pub fn unlink(&mut self, id: NodeId) -> Result<Slot> {
        let parent = self.get(id)?.parent.ok_or(ManifestError::NotAttached(id))?;
        let children = &mut self.get_mut(parent)?.children;
        let index = children
            .iter()
            .position(|child| *child == id)
            .ok_or(ManifestError::NotAttached(id))?;
        children.remove(index);
        self.get_mut(id)?.parent = None;

        Ok(Slot { parent, index })
    }

    /// Put floating node back at a previously recorded slot.
    ///
    /// # Errors
    ///
    /// Same as [`Manifest::attach`].
    pub fn relink(&mut self, id: NodeId, slot: Slot) -> Result<()> {
        self.attach(id, slot.parent)?;
        let children = &mut self.get_mut(slot.parent)?.children;
        if let Some(last) = children.pop() {
            let index = slot.index.min(children.len());
            children.insert(index, last);
        }

        Ok(())
    }

    /// Change path segment of node in place.
    ///
    /// Groups also take the new segment as their name. Descendants are left
    /// alone, their real paths follow automatically.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::DuplicateEntry`] if a sibling with the same
    ///   path and kind already exists.
    pub fn rename_path(&mut self, id: NodeId, path: impl Into<String>) -> Result<()> {
        let path = path.into();
        let node = self.get(id)?;
        let kind = node.kind;
        if let Some(parent) = node.parent {
            if self
                .child(parent, &path, kind)
                .is_some_and(|sibling| sibling != id)
            {
                return Err(ManifestError::DuplicateEntry {
                    kind,
                    path: self.relative_path(parent).join(path),
                });
            }
        }

        let node = self.get_mut(id)?;
        if node.kind == NodeKind::Group {
            node.name = path.clone();
        }
        node.path = path;

        Ok(())
    }

    pub(crate) fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        self.get_mut(id)?.name = name.into();
        Ok(())
    }

    fn is_self_or_descendant(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(candidate);
        while let Some(next) = current {
            if next == ancestor {
                return true;
            }
            current = self.node(next).and_then(Node::parent);
        }

        false
    }

    /// Declare new target with an empty build phase.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::DuplicateTarget`] if name is taken.
    pub fn add_target(&mut self, name: impl Into<String>) -> Result<TargetId> {
        let name = name.into();
        if self.target_named(&name).is_some() {
            return Err(ManifestError::DuplicateTarget(name));
        }
        self.targets.push(Target::new(name));

        Ok(TargetId(self.targets.len() - 1))
    }

    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(id.0)
    }

    /// Targets in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.targets
            .iter()
            .enumerate()
            .map(|(index, target)| (TargetId(index), target))
    }

    pub fn target_named(&self, name: &str) -> Option<TargetId> {
        self.targets
            .iter()
            .position(|target| target.name() == name)
            .map(TargetId)
    }

    /// First declared target, used as fallback for target selection.
    pub fn first_target(&self) -> Option<TargetId> {
        (!self.targets.is_empty()).then_some(TargetId(0))
    }

    /// Add file reference to the build phase of a target.
    ///
    /// Returns false if the target already builds that file.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::UnknownTarget`] if target does not exist.
    /// - Return [`ManifestError::NotAFile`] if node is a group.
    /// - Return [`ManifestError::NotAttached`] if node is not reachable.
    pub fn add_build_file(&mut self, target: TargetId, id: NodeId) -> Result<bool> {
        if self.get(id)?.kind != NodeKind::FileReference {
            return Err(ManifestError::NotAFile(id));
        }
        if !self.is_reachable(id) {
            return Err(ManifestError::NotAttached(id));
        }

        let target = self
            .targets
            .get_mut(target.0)
            .ok_or(ManifestError::UnknownTarget(target))?;

        Ok(target.build_phase_mut().insert(BuildFile::new(id)))
    }

    /// Targets whose build phase references a file.
    pub fn targets_building(&self, id: NodeId) -> Vec<TargetId> {
        self.targets()
            .filter(|(_, target)| target.build_phase().contains(id))
            .map(|(target_id, _)| target_id)
            .collect()
    }
}

/// Manifest model error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// Sibling with same path and kind already exists.
    #[error("{kind} {:?} already exists", path.display())]
    DuplicateEntry { kind: NodeKind, path: PathBuf },

    /// Node handle does not belong to this manifest.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// Target handle does not belong to this manifest.
    #[error("unknown target {0:?}")]
    UnknownTarget(TargetId),

    /// Target name already declared.
    #[error("target {0:?} already declared")]
    DuplicateTarget(String),

    /// Operation needs a group.
    #[error("node {0:?} is not a group")]
    NotAGroup(NodeId),

    /// Operation needs a file reference.
    #[error("node {0:?} is not a file reference")]
    NotAFile(NodeId),

    /// Node already has a parent.
    #[error("node {0:?} is already attached")]
    AlreadyAttached(NodeId),

    /// Node has no parent.
    #[error("node {0:?} is not attached")]
    NotAttached(NodeId),

    /// Group would end up below itself.
    #[error("group {0:?} cannot be placed inside itself")]
    Cycle(NodeId),
}

/// Friendly result alias :3
pub type Result<T, E = ManifestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> anyhow::Result<(Manifest, TargetId, NodeId)> {
        let mut manifest = Manifest::new();
        let app = manifest.add_target("App")?;
        let views =
            manifest.resolve_or_create_group_path(manifest.main_group(), &["App", "Views"])?;
        let file = manifest.new_file_reference("ContentView.swift");
        manifest.attach(file, views)?;
        manifest.add_build_file(app, file)?;

        Ok((manifest, app, file))
    }

    #[test]
    fn resolve_or_create_group_path_is_idempotent() -> anyhow::Result<()> {
        let mut manifest = Manifest::new();
        let root = manifest.main_group();

        let first = manifest.resolve_or_create_group_path(root, &["App", "Views", "Cells"])?;
        let second = manifest.resolve_or_create_group_path(root, &["App", "Views", "Cells"])?;
        assert_eq!(first, second);
        assert_eq!(manifest.node(root).map(|node| node.children().len()), Some(1));
        assert_eq!(manifest.find_group(root, &["App", "Views", "Cells"]), Some(first));
        assert_eq!(manifest.find_group(root, &["App", "Models"]), None);

        Ok(())
    }

    #[test]
    fn relative_path_concatenates_ancestors() -> anyhow::Result<()> {
        let mut manifest = Manifest::new();
        let root = manifest.main_group();
        let group = manifest.resolve_or_create_group_path(root, &["App", "Views"])?;
        let renamed = manifest.new_group("Display Name", "Shared");
        manifest.attach(renamed, group)?;
        let file = manifest.new_file_reference("Row.swift");
        manifest.attach(file, renamed)?;

        for id in manifest.file_references() {
            let mut segments = Vec::new();
            let mut current = Some(id);
            while let Some(next) = current {
                let node = manifest.node(next).unwrap();
                segments.insert(0, node.path().to_string());
                current = node.parent();
            }
            assert_eq!(
                manifest.relative_path(id),
                segments.iter().filter(|s| !s.is_empty()).collect::<PathBuf>()
            );
        }
        assert_eq!(
            manifest.relative_path(file),
            PathBuf::from("App/Views/Shared/Row.swift")
        );

        Ok(())
    }

    #[test]
    fn attach_rejects_duplicate_sibling() -> anyhow::Result<()> {
        let (mut manifest, _, file) = sample()?;
        let views = manifest.node(file).and_then(Node::parent).unwrap();

        let twin = manifest.new_file_reference("ContentView.swift");
        let result = manifest.attach(twin, views);
        assert_eq!(
            result,
            Err(ManifestError::DuplicateEntry {
                kind: NodeKind::FileReference,
                path: PathBuf::from("App/Views/ContentView.swift"),
            })
        );
        assert_eq!(manifest.node(views).map(|node| node.children().len()), Some(1));

        // Same segment but different kind is fine.
        let group = manifest.new_group("ContentView.swift", "ContentView.swift");
        manifest.attach(group, views)?;

        Ok(())
    }

    #[test]
    fn find_file_reference_matches_full_path() -> anyhow::Result<()> {
        let (mut manifest, _, file) = sample()?;
        let other = manifest.resolve_or_create_group_path(manifest.main_group(), &["Tests"])?;
        let twin = manifest.new_file_reference("ContentView.swift");
        manifest.attach(twin, other)?;

        assert_eq!(manifest.find_file_reference("App/Views/ContentView.swift"), Some(file));
        assert_eq!(manifest.find_file_reference("Tests/ContentView.swift"), Some(twin));
        assert_eq!(manifest.find_file_reference("ContentView.swift"), None);

        Ok(())
    }

    #[test]
    fn detach_group_cascades_into_build_phases() -> anyhow::Result<()> {
        let (mut manifest, app, file) = sample()?;
        let root = manifest.main_group();
        let group = manifest.find_group(root, &["App"]).unwrap();

        manifest.detach(group)?;
        assert!(!manifest.is_reachable(file));
        assert!(manifest.target(app).unwrap().build_phase().is_empty());
        assert!(manifest.file_references().is_empty());
        assert_eq!(manifest.find_group(root, &["App"]), None);

        Ok(())
    }

    #[test]
    fn unlink_and_relink_restore_display_order() -> anyhow::Result<()> {
        let mut manifest = Manifest::new();
        let root = manifest.main_group();
        for name in ["A.swift", "B.swift", "C.swift"] {
            let file = manifest.new_file_reference(name);
            manifest.attach(file, root)?;
        }
        let middle = manifest.find_file_reference("B.swift").unwrap();

        let slot = manifest.unlink(middle)?;
        assert_eq!(slot, Slot { parent: root, index: 1 });
        manifest.relink(middle, slot)?;

        let order = manifest
            .file_references()
            .into_iter()
            .map(|id| manifest.node(id).unwrap().path().to_string())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["A.swift", "B.swift", "C.swift"]);

        Ok(())
    }

    #[test]
    fn attach_rejects_cycles() -> anyhow::Result<()> {
        let mut manifest = Manifest::new();
        let root = manifest.main_group();
        let outer = manifest.resolve_or_create_group_path(root, &["Outer"])?;
        let inner = manifest.resolve_or_create_group_path(root, &["Outer", "Inner"])?;

        let slot = manifest.unlink(outer)?;
        assert_eq!(manifest.attach(outer, inner), Err(ManifestError::Cycle(outer)));
        manifest.relink(outer, slot)?;
        assert!(manifest.is_reachable(inner));

        Ok(())
    }

    #[test]
    fn rename_path_keeps_position_and_descendants() -> anyhow::Result<()> {
        let (mut manifest, _, file) = sample()?;
        let root = manifest.main_group();
        let views = manifest.find_group(root, &["App", "Views"]).unwrap();

        manifest.rename_path(views, "Screens")?;
        assert_eq!(manifest.node(views).map(Node::name), Some("Screens"));
        assert_eq!(manifest.node(file).map(Node::path), Some("ContentView.swift"));
        assert_eq!(
            manifest.relative_path(file),
            PathBuf::from("App/Screens/ContentView.swift")
        );

        let sibling = manifest.resolve_or_create_group_path(root, &["App", "Models"])?;
        assert!(matches!(
            manifest.rename_path(sibling, "Screens"),
            Err(ManifestError::DuplicateEntry { .. })
        ));

        Ok(())
    }

    #[test]
    fn add_build_file_requires_reachable_file() -> anyhow::Result<()> {
        let (mut manifest, app, file) = sample()?;

        assert!(!manifest.add_build_file(app, file)?);
        let floating = manifest.new_file_reference("Loose.swift");
        assert_eq!(
            manifest.add_build_file(app, floating),
            Err(ManifestError::NotAttached(floating))
        );
        let group = manifest.main_group();
        assert_eq!(manifest.add_build_file(app, group), Err(ManifestError::NotAFile(group)));
        assert_eq!(manifest.targets_building(file), vec![app]);

        Ok(())
    }
}
