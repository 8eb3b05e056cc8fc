// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use std::{
    env::current_dir,
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};
use xcsync::{
    report::ReportLog, store::ManifestStore, Manifest, Project, ProjectLayout, TomlManifestStore,
};

/// Project laid out in the current working directory.
///
/// Meant to be used inside sealed tests, which run each test in a fresh
/// temporary working directory.
pub(crate) struct ProjectFixture {
    root: PathBuf,
    store: TomlManifestStore,
    log: ReportLog,
}

impl ProjectFixture {
    pub(crate) async fn new(targets: &[&str]) -> Result<Self> {
        let root = current_dir()?;
        let store = TomlManifestStore::new(root.join("Demo.xcmanifest"));

        // INVARIANT: Always start from an empty manifest declaring the targets.
        let mut manifest = Manifest::new();
        for target in targets {
            manifest.add_target(*target)?;
        }
        store.save(&manifest).await?;

        Ok(Self {
            root,
            store,
            log: ReportLog::new(),
        })
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub(crate) fn touch(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(&path, "")?;

        Ok(path)
    }

    pub(crate) fn project(&self) -> Project<TomlManifestStore, ReportLog> {
        Project::new(
            self.store.clone(),
            ProjectLayout::single(&self.root),
            self.log.clone(),
        )
    }

    pub(crate) fn log(&self) -> &ReportLog {
        &self.log
    }

    pub(crate) async fn manifest(&self) -> Result<Manifest> {
        Ok(self.store.load().await?)
    }
}
