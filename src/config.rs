// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that xcsync uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.

use crate::{correlate::CorrelationWindows, path::normalize, sync::ProjectLayout};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Synchronization configuration layout.
///
/// # General Layout
///
/// A configuration is composed of two sections. The project section says
/// where the project lives and which manifest file mirrors it. The watch
/// section says which paths the watcher cares about, and how long raw
/// notifications are buffered before they are paired into moves.
///
/// ```toml
/// [project]
/// root = "$HOME/src/App"
/// manifest = "App.xcmanifest"
///
/// [watch]
/// include = ["*.swift"]
/// exclude = [".build/"]
/// coalesce_ms = 100
/// retention_ms = 1000
/// correlation_ms = 500
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Project location.
    pub project: ProjectSettings,

    /// Watcher settings.
    #[serde(default)]
    pub watch: WatchSettings,
}

impl SyncConfig {
    /// Construct configuration for a discovered manifest file.
    ///
    /// The directory holding the manifest becomes the project root.
    pub fn for_manifest(manifest: impl AsRef<Path>) -> Self {
        let manifest = manifest.as_ref();
        Self {
            project: ProjectSettings {
                root: manifest.parent().map(Path::to_path_buf).unwrap_or_default(),
                manifest: manifest
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_default(),
            },
            watch: WatchSettings::default(),
        }
    }

    /// Resolve relative project root against `base`.
    ///
    /// Meant for the directory holding the configuration file, so that
    /// `root = "."` means the project lives next to its configuration.
    /// Absolute roots are only normalized.
    pub fn anchor(mut self, base: impl AsRef<Path>) -> Self {
        self.project.root = normalize(base.as_ref().join(&self.project.root));
        self
    }

    /// Absolute path to manifest file.
    pub fn manifest_path(&self) -> PathBuf {
        self.project.root.join(&self.project.manifest)
    }

    /// Source and project roots of the configured project.
    pub fn layout(&self) -> ProjectLayout {
        let manifest = self.manifest_path();
        let source_root = manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.project.root.clone());
        ProjectLayout::new(source_root, self.project.root.clone())
    }

    /// Correlator time windows.
    pub fn windows(&self) -> CorrelationWindows {
        CorrelationWindows {
            coalesce: Duration::from_millis(self.watch.coalesce_ms),
            retention: Duration::from_millis(self.watch.retention_ms),
            threshold: Duration::from_millis(self.watch.correlation_ms),
        }
    }
}

impl FromStr for SyncConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: SyncConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on project paths.
        config.project.root = expand(&config.project.root)?;
        config.project.manifest = expand(&config.project.manifest)?;

        Ok(config)
    }
}

impl Display for SyncConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Project location settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProjectSettings {
    /// Project root. Target selection happens relative to it.
    pub root: PathBuf,

    /// Manifest file, relative to the project root unless absolute.
    pub manifest: PathBuf,
}

/// Watcher settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Glob patterns that created files must match.
    pub include: Vec<String>,

    /// Gitignore-style rules for paths to drop entirely.
    pub exclude: Vec<String>,

    /// Delay between the last notification and the pass it schedules.
    pub coalesce_ms: u64,

    /// Age at which unpaired notifications are dropped.
    pub retention_ms: u64,

    /// Largest gap between a deletion and a creation that still pair up.
    pub correlation_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        let windows = CorrelationWindows::default();
        Self {
            include: vec!["*.swift".into()],
            exclude: Vec::new(),
            coalesce_ms: windows.coalesce.as_millis() as u64,
            retention_ms: windows.retention.as_millis() as u64,
            correlation_ms: windows.threshold.as_millis() as u64,
        }
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
