// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use xcsync::{
    fs::{FileSystem, LocalFileSystem},
    path::{default_config_path, find_manifest, normalize, LOCAL_CONFIG_FILE, MANIFEST_EXTENSION},
    project::outline,
    store::ManifestStore,
    watch::{watch, WatchFilter},
    EntryKind, Manifest, Operation, Pass, Project, SyncConfig, TomlManifestStore,
    TracingObserver,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::{
    env::current_dir,
    fs::read_to_string,
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  xcsync [options] <xcsync-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file to use instead of the usual lookup.
    #[arg(short, long, global = true, value_name = "file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        match self.command {
            Command::Init(opts) => run_init(self.config, opts).await,
            Command::New(opts) => run_new(load_config(self.config)?, opts).await,
            Command::Add(opts) => run_add(load_config(self.config)?, opts).await,
            Command::Delete(opts) => run_delete(load_config(self.config)?, opts).await,
            Command::Move(opts) => run_move(load_config(self.config)?, opts, false).await,
            Command::Rename(opts) => run_move(load_config(self.config)?, opts, true).await,
            Command::Show => run_show(load_config(self.config)?).await,
            Command::Watch => run_watch(load_config(self.config)?).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Write new empty manifest.
    #[command(override_usage = "xcsync init [options]")]
    Init(InitOptions),

    /// Create new file or directory and add it to the manifest.
    #[command(override_usage = "xcsync new [options] <path>")]
    New(NewOptions),

    /// Add existing file or directory to the manifest.
    #[command(override_usage = "xcsync add <path>")]
    Add(PathOptions),

    /// Remove file or directory from the manifest and from disk.
    #[command(override_usage = "xcsync delete [options] <path>")]
    Delete(DeleteOptions),

    /// Mirror a move that already happened on disk.
    #[command(override_usage = "xcsync move <from> <to>")]
    Move(MoveOptions),

    /// Mirror a rename that already happened on disk.
    #[command(override_usage = "xcsync rename <from> <to>")]
    Rename(MoveOptions),

    /// Show group tree and target membership.
    #[command(override_usage = "xcsync show")]
    Show,

    /// Keep manifest in sync with the project root until interrupted.
    #[command(override_usage = "xcsync watch")]
    Watch,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Name of target to declare. Can be given more than once.
    #[arg(short, long = "target", value_name = "name")]
    pub targets: Vec<String>,

    /// Path of manifest file to write.
    #[arg(short, long, value_name = "path")]
    pub manifest: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NewOptions {
    /// Path of entry to create.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,

    /// Create directory instead of file.
    #[arg(short, long)]
    pub dir: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PathOptions {
    /// Path of entry.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeleteOptions {
    /// Path of entry to delete.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,

    /// Only remove entry from the manifest, keep it on disk.
    #[arg(short, long)]
    pub keep: bool,

    /// Treat entry as directory even if it is already gone from disk.
    #[arg(short, long)]
    pub dir: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MoveOptions {
    /// Old path of entry.
    #[arg(required = true, value_name = "from")]
    pub from: PathBuf,

    /// New path of entry.
    #[arg(required = true, value_name = "to")]
    pub to: PathBuf,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

/// Locate configuration.
///
/// Explicit file first, then project-local file, then user file, and finally
/// the closest manifest found by walking upward from the working directory.
fn load_config(explicit: Option<PathBuf>) -> Result<SyncConfig> {
    if let Some(path) = explicit {
        return read_config(&path);
    }

    let local = current_dir()?.join(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return read_config(&local);
    }

    if let Some(user) = default_config_path().ok().filter(|path| path.is_file()) {
        return read_config(&user);
    }

    let manifest = find_manifest(current_dir()?).ok_or_else(|| {
        anyhow!(
            "no configuration file or *.{MANIFEST_EXTENSION} file found, run `xcsync init` first"
        )
    })?;
    info!("using manifest {:?}", manifest.display());

    Ok(SyncConfig::for_manifest(manifest))
}

fn read_config(path: &Path) -> Result<SyncConfig> {
    let data = read_to_string(path)
        .with_context(|| format!("failed to read configuration {:?}", path.display()))?;
    let config = data
        .parse::<SyncConfig>()
        .with_context(|| format!("invalid configuration {:?}", path.display()))?;

    // INVARIANT: Relative project roots are relative to the configuration file.
    let path = absolute(path)?;
    let base = path.parent().unwrap_or(path.as_path());

    Ok(config.anchor(base))
}

fn open_project(config: &SyncConfig) -> Project<TomlManifestStore, TracingObserver> {
    Project::new(
        TomlManifestStore::new(config.manifest_path()),
        config.layout(),
        TracingObserver,
    )
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(normalize(current_dir()?.join(path)))
}

fn check_pass(pass: Pass) -> Result<()> {
    if pass.errors > 0 {
        bail!("{} operation(s) failed", pass.errors);
    }

    Ok(())
}

async fn run_init(explicit: Option<PathBuf>, opts: InitOptions) -> Result<()> {
    let path = match (opts.manifest, explicit) {
        (Some(path), _) => absolute(&path)?,
        (None, Some(config)) => read_config(&config)?.manifest_path(),
        (None, None) => {
            let cwd = current_dir()?;
            let name = cwd
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Project".into());
            cwd.join(format!("{name}.{MANIFEST_EXTENSION}"))
        }
    };

    if path.exists() {
        bail!("manifest {:?} already exists", path.display());
    }

    let mut manifest = Manifest::new();
    for target in opts.targets {
        manifest.add_target(target)?;
    }
    TomlManifestStore::new(&path).save(&manifest).await?;
    info!("wrote manifest {:?}", path.display());

    Ok(())
}

async fn run_new(config: SyncConfig, opts: NewOptions) -> Result<()> {
    let path = absolute(&opts.path)?;
    let kind = if opts.dir {
        LocalFileSystem.create_dir(&path)?;
        EntryKind::Group
    } else {
        LocalFileSystem.create_file(&path)?;
        EntryKind::File
    };

    let pass = open_project(&config)
        .apply(Operation::Create { path, kind })
        .await?;
    check_pass(pass)
}

async fn run_add(config: SyncConfig, opts: PathOptions) -> Result<()> {
    let path = absolute(&opts.path)?;
    if !path.exists() {
        bail!("{:?} does not exist", path.display());
    }

    let kind = EntryKind::probe(&path);
    let pass = open_project(&config)
        .apply(Operation::Create { path, kind })
        .await?;
    check_pass(pass)
}

async fn run_delete(config: SyncConfig, opts: DeleteOptions) -> Result<()> {
    let path = absolute(&opts.path)?;
    let project = open_project(&config);
    let kind = if opts.dir {
        EntryKind::Group
    } else {
        let manifest = project.load().await?;
        project.synchronizer().kind_of(&manifest, &path)
    };
    let pass = project
        .apply(Operation::Delete {
            path: path.clone(),
            kind,
        })
        .await?;
    check_pass(pass)?;

    if !opts.keep && pass.applied > 0 && path.exists() {
        LocalFileSystem.remove(&path, kind)?;
    }

    Ok(())
}

async fn run_move(config: SyncConfig, opts: MoveOptions, rename: bool) -> Result<()> {
    let from = absolute(&opts.from)?;
    let to = absolute(&opts.to)?;
    let kind = if to.exists() {
        EntryKind::probe(&to)
    } else {
        EntryKind::probe(&from)
    };

    let operation = if rename {
        Operation::Rename { from, to, kind }
    } else {
        Operation::Move { from, to, kind }
    };
    let pass = open_project(&config).apply(operation).await?;
    check_pass(pass)
}

async fn run_show(config: SyncConfig) -> Result<()> {
    let manifest = open_project(&config).load().await?;
    print!("{}", outline(&manifest));

    Ok(())
}

async fn run_watch(config: SyncConfig) -> Result<()> {
    let project = open_project(&config);
    let filter = WatchFilter::from_settings(
        project.synchronizer().layout().source_root(),
        &config.watch,
    )?;
    watch(&project, filter, config.windows()).await?;

    Ok(())
}
