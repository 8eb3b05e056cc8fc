// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build targets and their build phases.
//!
//! A __target__ is a named build unit. Each target owns exactly one build
//! phase, which lists __build files__. A build file is a membership record
//! that points at one file reference in the group tree. The relation is
//! many-to-many and owns nothing: a file reference may be built by any number
//! of targets, and removing a target never touches the tree.

use crate::manifest::NodeId;

use std::collections::HashSet;

/// Named build unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    name: String,
    build_phase: BuildPhase,
}

impl Target {
    /// Construct new target with an empty build phase.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            build_phase: BuildPhase::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build_phase(&self) -> &BuildPhase {
        &self.build_phase
    }

    pub(crate) fn build_phase_mut(&mut self) -> &mut BuildPhase {
        &mut self.build_phase
    }
}

/// Ordered listing of build files.
///
/// # Invariant
///
/// - No two build files reference the same file reference.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildPhase {
    files: Vec<BuildFile>,
}

impl BuildPhase {
    pub fn files(&self) -> &[BuildFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, file_ref: NodeId) -> bool {
        self.files.iter().any(|file| file.file_ref == file_ref)
    }

    /// Insert build file unless its file reference is already built.
    pub(crate) fn insert(&mut self, file: BuildFile) -> bool {
        if self.contains(file.file_ref) {
            return false;
        }
        self.files.push(file);

        true
    }

    /// Remove every build file referencing one of the given file references.
    ///
    /// Returns the number of build files removed.
    pub(crate) fn remove_file_refs(&mut self, file_refs: &HashSet<NodeId>) -> usize {
        let before = self.files.len();
        self.files.retain(|file| !file_refs.contains(&file.file_ref));
        before - self.files.len()
    }
}

/// Membership record linking a build phase to one file reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildFile {
    file_ref: NodeId,
}

impl BuildFile {
    pub fn new(file_ref: NodeId) -> Self {
        Self { file_ref }
    }

    pub fn file_ref(&self) -> NodeId {
        self.file_ref
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use pretty_assertions::assert_eq;

    #[test]
    fn build_phase_insertion_has_no_duplicates() {
        let mut manifest = Manifest::new();
        let first = manifest.new_file_reference("A.swift");
        let second = manifest.new_file_reference("B.swift");
        let mut phase = BuildPhase::default();

        assert!(phase.insert(BuildFile::new(first)));
        assert!(phase.insert(BuildFile::new(second)));
        assert!(!phase.insert(BuildFile::new(first)));
        assert_eq!(phase.files(), &[BuildFile::new(first), BuildFile::new(second)]);

        let removed = phase.remove_file_refs(&HashSet::from([first]));
        assert_eq!(removed, 1);
        assert!(!phase.contains(first));
        assert!(phase.contains(second));
    }
}
