// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Persisted manifest layout.
//!
//! Specify the layout of manifest files to simplify serialization and
//! deserialization. File I/O is left to the [`store`](crate::store) module.
//!
//! # General Layout
//!
//! A manifest file is TOML. Targets come first as an array of tables, each
//! listing the files it builds by their `/` separated path relative to the
//! manifest's directory. The group tree follows under `main_group`, where
//! every child is tagged with its `kind`.
//!
//! ```toml
//! [[target]]
//! name = "App"
//! files = ["App/ContentView.swift"]
//!
//! [[main_group.children]]
//! kind = "group"
//! path = "App"
//!
//! [[main_group.children.children]]
//! kind = "file"
//! path = "ContentView.swift"
//! ```

use crate::{
    manifest::{Manifest, ManifestError, NodeId, NodeKind},
    path::{from_slash, to_slash},
};

use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};
use tracing::warn;

/// Manifest file layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ManifestDocument {
    /// Build targets in declaration order.
    #[serde(default, rename = "target", skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetDocument>,

    /// Root of the group tree.
    #[serde(default)]
    pub main_group: GroupDocument,
}

impl FromStr for ManifestDocument {
    type Err = DocumentError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::de::from_str(data).map_err(DocumentError::Deserialize)
    }
}

impl Display for ManifestDocument {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(DocumentError::Serialize)?
                .as_str(),
        )
    }
}

/// Target entry.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct TargetDocument {
    /// Name of target.
    pub name: String,

    /// Paths of built file references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// Group entry.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct GroupDocument {
    /// Display name, only written when it differs from the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Path segment relative to the parent group.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Children in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDocument>,
}

/// File reference entry.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct FileDocument {
    /// Path segment relative to the parent group.
    pub path: String,
}

/// Child entry of a group.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeDocument {
    Group(GroupDocument),
    File(FileDocument),
}

impl From<&Manifest> for ManifestDocument {
    fn from(manifest: &Manifest) -> Self {
        let targets = manifest
            .targets()
            .map(|(_, target)| TargetDocument {
                name: target.name().to_string(),
                files: target
                    .build_phase()
                    .files()
                    .iter()
                    .map(|file| to_slash(manifest.relative_path(file.file_ref())))
                    .collect(),
            })
            .collect();

        Self {
            targets,
            main_group: GroupDocument {
                name: None,
                path: String::new(),
                children: dump_children(manifest, manifest.main_group()),
            },
        }
    }
}

fn dump_children(manifest: &Manifest, group: NodeId) -> Vec<NodeDocument> {
    let Some(node) = manifest.node(group) else {
        return Vec::new();
    };

    node.children()
        .iter()
        .filter_map(|child| manifest.node(*child).map(|node| (*child, node)))
        .map(|(child, node)| match node.kind() {
            NodeKind::Group => NodeDocument::Group(GroupDocument {
                name: (node.name() != node.path()).then(|| node.name().to_string()),
                path: node.path().to_string(),
                children: dump_children(manifest, child),
            }),
            NodeKind::FileReference => NodeDocument::File(FileDocument {
                path: node.path().to_string(),
            }),
        })
        .collect()
}

impl TryFrom<ManifestDocument> for Manifest {
    type Error = DocumentError;

    /// Build manifest from its persisted layout.
    ///
    /// Build files whose path does not name a file reference in the tree are
    /// dropped with a warning, so a hand-edited manifest never yields dangling
    /// build phase entries.
    ///
    /// # Errors
    ///
    /// - Return [`DocumentError::Manifest`] if the tree holds duplicate
    ///   siblings or targets share a name.
    fn try_from(document: ManifestDocument) -> Result<Self, Self::Error> {
        let mut manifest = Manifest::new();
        let root = manifest.main_group();
        load_children(&mut manifest, root, document.main_group.children)?;

        let index = manifest
            .file_references()
            .into_iter()
            .map(|id| (manifest.relative_path(id), id))
            .collect::<HashMap<PathBuf, NodeId>>();

        for target in document.targets {
            let id = manifest.add_target(target.name.as_str())?;
            for file in target.files {
                match index.get(&from_slash(&file)) {
                    Some(file_ref) => {
                        manifest.add_build_file(id, *file_ref)?;
                    }
                    None => warn!(
                        "drop build file {file:?} of target {:?}, no such file reference",
                        target.name
                    ),
                }
            }
        }

        Ok(manifest)
    }
}

fn load_children(
    manifest: &mut Manifest,
    parent: NodeId,
    children: Vec<NodeDocument>,
) -> Result<()> {
    for child in children {
        match child {
            NodeDocument::Group(group) => {
                let name = group.name.unwrap_or_else(|| group.path.clone());
                let id = manifest.new_group(name, group.path);
                manifest.attach(id, parent)?;
                load_children(manifest, id, group.children)?;
            }
            NodeDocument::File(file) => {
                let id = manifest.new_file_reference(file.path);
                manifest.attach(id, parent)?;
            }
        }
    }

    Ok(())
}

impl FromStr for Manifest {
    type Err = DocumentError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Manifest::try_from(data.parse::<ManifestDocument>()?)
    }
}

impl Display for Manifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&ManifestDocument::from(self), fmt)
    }
}

/// Manifest layout error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DocumentError {
    /// Failed to deserialize manifest.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize manifest.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Manifest content breaks a tree invariant.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl From<DocumentError> for FmtError {
    fn from(_: DocumentError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = DocumentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = indoc! {r#"
        [[target]]
        name = "App"
        files = ["App/ContentView.swift", "App/Gone.swift"]

        [[target]]
        name = "AppTests"

        [[main_group.children]]
        kind = "group"
        path = "App"

        [[main_group.children.children]]
        kind = "file"
        path = "ContentView.swift"

        [[main_group.children.children]]
        kind = "group"
        name = "Assets"
        path = "Resources"

        [[main_group.children]]
        kind = "group"
        path = "AppTests"
    "#};

    #[test]
    fn deserialize_manifest_document() -> anyhow::Result<()> {
        let result: ManifestDocument = SAMPLE.parse()?;
        let expect = ManifestDocument {
            targets: vec![
                TargetDocument {
                    name: "App".into(),
                    files: vec!["App/ContentView.swift".into(), "App/Gone.swift".into()],
                },
                TargetDocument {
                    name: "AppTests".into(),
                    files: vec![],
                },
            ],
            main_group: GroupDocument {
                name: None,
                path: String::new(),
                children: vec![
                    NodeDocument::Group(GroupDocument {
                        name: None,
                        path: "App".into(),
                        children: vec![
                            NodeDocument::File(FileDocument {
                                path: "ContentView.swift".into(),
                            }),
                            NodeDocument::Group(GroupDocument {
                                name: Some("Assets".into()),
                                path: "Resources".into(),
                                children: vec![],
                            }),
                        ],
                    }),
                    NodeDocument::Group(GroupDocument {
                        name: None,
                        path: "AppTests".into(),
                        children: vec![],
                    }),
                ],
            },
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn load_manifest_drops_dangling_build_files() -> anyhow::Result<()> {
        let manifest: Manifest = SAMPLE.parse()?;
        let app = manifest.target_named("App").unwrap();
        let file = manifest.find_file_reference("App/ContentView.swift").unwrap();

        assert_eq!(manifest.target(app).unwrap().build_phase().files().len(), 1);
        assert_eq!(manifest.targets_building(file), vec![app]);

        let root = manifest.main_group();
        let assets = manifest.find_group(root, &["App", "Resources"]).unwrap();
        assert_eq!(manifest.node(assets).map(|node| node.name()), Some("Assets"));

        Ok(())
    }

    #[test]
    fn manifest_survives_save_and_load() -> anyhow::Result<()> {
        let manifest: Manifest = SAMPLE.parse()?;
        let reloaded: Manifest = manifest.to_string().parse()?;

        assert_eq!(
            ManifestDocument::from(&reloaded),
            ManifestDocument::from(&manifest)
        );

        Ok(())
    }

    #[test]
    fn reject_duplicate_siblings() {
        let data = indoc! {r#"
            [[main_group.children]]
            kind = "file"
            path = "main.swift"

            [[main_group.children]]
            kind = "file"
            path = "main.swift"
        "#};

        let result = data.parse::<Manifest>();
        assert!(matches!(
            result,
            Err(DocumentError::Manifest(ManifestError::DuplicateEntry { .. }))
        ));
    }
}
