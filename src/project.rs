// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project passes.
//!
//! A [`Project`] ties a [`ManifestStore`], a [`Synchronizer`], and an
//! [`Observer`] together. Every batch of logical operations runs as one
//! __pass__: load the manifest, apply each operation, save the manifest if
//! anything changed, and report the outcome of each operation.
//!
//! Operations inside a pass fail independently. A store failure aborts the
//! whole pass before anything is saved.

use crate::{
    manifest::{Manifest, NodeId},
    report::{Level, Observer, Report},
    store::{ManifestStore, StoreError},
    sync::{Operation, ProjectLayout, Synchronizer},
};

use std::fmt::Write as _;
use tracing::{debug, instrument};

/// Manifest of one project kept in sync with its source tree.
#[derive(Debug)]
pub struct Project<S, O>
where
    S: ManifestStore,
    O: Observer,
{
    store: S,
    synchronizer: Synchronizer,
    observer: O,
}

impl<S, O> Project<S, O>
where
    S: ManifestStore,
    O: Observer,
{
    /// Construct new project.
    pub fn new(store: S, layout: ProjectLayout, observer: O) -> Self {
        Self {
            store,
            synchronizer: Synchronizer::new(layout),
            observer,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Load current manifest.
    ///
    /// # Errors
    ///
    /// - Return [`ProjectError::ManifestStoreUnavailable`] if the store
    ///   cannot produce a manifest. The failure is reported as well.
    pub async fn load(&self) -> Result<Manifest> {
        self.store.load().await.map_err(|err| self.unavailable(err))
    }

    /// Run pass for a single operation.
    pub async fn apply(&self, operation: Operation) -> Result<Pass> {
        self.apply_all(&[operation]).await
    }

    /// Run pass over a batch of operations.
    ///
    /// Operations are applied in order against one loaded manifest. Each one
    /// yields exactly one report, plus a warning for every notice attached to
    /// it. The manifest is saved once at the end if at least one operation
    /// went through.
    ///
    /// # Errors
    ///
    /// - Return [`ProjectError::ManifestStoreUnavailable`] if the manifest
    ///   cannot be loaded or saved. Nothing is saved in that case.
    #[instrument(skip(self, operations), fields(count = operations.len()), level = "debug")]
    pub async fn apply_all(&self, operations: &[Operation]) -> Result<Pass> {
        if operations.is_empty() {
            return Ok(Pass::default());
        }

        let mut manifest = self.load().await?;
        let mut pass = Pass::default();
        for operation in operations {
            match self.synchronizer.apply(&mut manifest, operation) {
                Ok(notices) => {
                    pass.applied += 1;
                    self.observer.notify(Report::success(operation));
                    for notice in &notices {
                        pass.warnings += 1;
                        self.observer.notify(Report::notice(operation, notice));
                    }
                }
                Err(err) => {
                    let report = Report::failure(operation, &err);
                    match report.level {
                        Level::Warning => pass.warnings += 1,
                        _ => pass.errors += 1,
                    }
                    self.observer.notify(report);
                }
            }
        }

        if pass.applied > 0 {
            self.store
                .save(&manifest)
                .await
                .map_err(|err| self.unavailable(err))?;
        } else {
            debug!("nothing applied, skip save");
        }

        Ok(pass)
    }

    fn unavailable(&self, err: StoreError) -> ProjectError {
        self.observer
            .notify(Report::error(format!("manifest store unavailable: {err}")));
        ProjectError::ManifestStoreUnavailable(err)
    }
}

/// Tally of one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    /// Operations that went through.
    pub applied: usize,

    /// Warning reports, i.e., notices and recoverable failures.
    pub warnings: usize,

    /// Operations that failed outright.
    pub errors: usize,
}

/// Render group tree of a manifest with target membership.
///
/// Groups end in `/`. Files list the targets building them in brackets.
pub fn outline(manifest: &Manifest) -> String {
    let mut out = String::new();
    if let Some(root) = manifest.node(manifest.main_group()) {
        for child in root.children() {
            outline_node(manifest, *child, 0, &mut out);
        }
    }

    out
}

fn outline_node(manifest: &Manifest, id: NodeId, depth: usize, out: &mut String) {
    let Some(node) = manifest.node(id) else {
        return;
    };

    let indent = "  ".repeat(depth);
    if node.is_group() {
        let _ = writeln!(out, "{indent}{}/", node.name());
        for child in node.children() {
            outline_node(manifest, *child, depth + 1, out);
        }
        return;
    }

    let targets = manifest
        .targets_building(id)
        .into_iter()
        .filter_map(|target| manifest.target(target).map(|target| target.name()))
        .collect::<Vec<_>>();
    if targets.is_empty() {
        let _ = writeln!(out, "{indent}{}", node.name());
    } else {
        let _ = writeln!(out, "{indent}{} [{}]", node.name(), targets.join(", "));
    }
}

/// Project error types.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// Manifest could not be loaded or saved.
    #[error(transparent)]
    ManifestStoreUnavailable(#[from] StoreError),
}

/// Friendly result alias :3
pub type Result<T, E = ProjectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{report::ReportLog, store::MemoryManifestStore, sync::EntryKind};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};

    const ROOT: &str = "/work/Demo";

    fn path(relative: &str) -> PathBuf {
        Path::new(ROOT).join(relative)
    }

    fn create(relative: &str) -> Operation {
        Operation::Create {
            path: path(relative),
            kind: EntryKind::File,
        }
    }

    fn project(store: MemoryManifestStore) -> (ReportLog, Project<MemoryManifestStore, ReportLog>) {
        let log = ReportLog::new();
        let project = Project::new(store, ProjectLayout::single(ROOT), log.clone());
        (log, project)
    }

    fn manifest_with_targets() -> anyhow::Result<Manifest> {
        let mut manifest = Manifest::new();
        manifest.add_target("Demo")?;
        manifest.add_target("DemoTests")?;
        Ok(manifest)
    }

    #[tokio::test]
    async fn pass_reports_each_operation_and_saves() -> anyhow::Result<()> {
        let store = MemoryManifestStore::new(manifest_with_targets()?);
        let (log, project) = project(store.clone());

        let pass = project
            .apply_all(&[
                create("Demo/App.swift"),
                create("Demo/App.swift"),
                create("Shared/Util.swift"),
            ])
            .await?;
        assert_eq!(
            pass,
            Pass {
                applied: 2,
                warnings: 2,
                errors: 0,
            }
        );

        let levels = log
            .drain()
            .into_iter()
            .map(|report| report.level)
            .collect::<Vec<_>>();
        assert_eq!(
            levels,
            vec![
                Level::Success,
                Level::Warning,
                Level::Success,
                Level::Warning,
            ]
        );

        let saved = store.snapshot().unwrap();
        assert!(saved.find_file_reference("Demo/App.swift").is_some());
        assert!(saved.find_file_reference("Shared/Util.swift").is_some());

        Ok(())
    }

    #[tokio::test]
    async fn failed_pass_does_not_save() -> anyhow::Result<()> {
        let store = MemoryManifestStore::new(Manifest::new());
        let (log, project) = project(store.clone());

        let pass = project.apply(create("Demo/App.swift")).await?;
        assert_eq!(pass.errors, 1);
        assert_eq!(log.drain()[0].level, Level::Error);
        assert_eq!(
            store.snapshot().unwrap().to_string(),
            Manifest::new().to_string()
        );

        Ok(())
    }

    #[tokio::test]
    async fn missing_manifest_aborts_pass() {
        let (log, project) = project(MemoryManifestStore::empty());

        let result = project.apply(create("Demo/App.swift")).await;
        assert!(matches!(
            result,
            Err(ProjectError::ManifestStoreUnavailable(
                StoreError::ManifestNotFound { .. }
            ))
        ));

        let reports = log.drain();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].level, Level::Error);
        assert_eq!(reports[0].operation, None);
    }

    #[tokio::test]
    async fn outline_lists_groups_and_membership() -> anyhow::Result<()> {
        let store = MemoryManifestStore::new(manifest_with_targets()?);
        let (_, project) = project(store);

        project
            .apply_all(&[
                create("Demo/App.swift"),
                create("Demo/Views/Row.swift"),
                create("DemoTests/RowTests.swift"),
                Operation::Create {
                    path: path("Demo/Assets"),
                    kind: EntryKind::Group,
                },
            ])
            .await?;

        let expect = indoc! {"
            Demo/
              App.swift [Demo]
              Views/
                Row.swift [Demo]
              Assets/
            DemoTests/
              RowTests.swift [DemoTests]
        "};
        assert_eq!(outline(&project.load().await?), expect);

        Ok(())
    }
}
