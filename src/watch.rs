// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem watcher.
//!
//! Feed filesystem notifications into a [`Correlator`] and run the operations
//! it produces through a [`Project`].
//!
//! # Event Flow
//!
//! The [`notify`] callback only forwards events into an unbounded channel. A
//! single task owns everything else: it translates each event into raw
//! creations, deletions, and renames, drops what the [`WatchFilter`] rejects,
//! and hands the rest to a [`Session`]. A rename inside one directory becomes
//! an operation right away. Everything else waits in the correlator until a
//! pass pairs it into a move. Each batch of operations runs as one project
//! pass before the next event is looked at.
//!
//! # Filtering
//!
//! Created files must match one of the include globs, directories always
//! pass. An in-place rename also needs an old name the include globs accept,
//! otherwise it only counts as a creation of the new name. Deleted paths are
//! only checked against the exclude rules, because the kind of a vanished
//! path cannot be known anymore and a deletion only turns into an operation
//! once it pairs with a creation that passed the filter.

use crate::{
    config::WatchSettings,
    correlate::{Clock, CorrelationWindows, Correlator, SystemClock},
    project::Project,
    report::Observer,
    store::ManifestStore,
    sync::{EntryKind, Operation},
};

use glob::Pattern;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{
    event::{ModifyKind, RenameMode},
    Event, EventKind, RecursiveMode, Watcher,
};
use std::{
    future::{pending, Future},
    path::{Path, PathBuf},
    time::Instant,
};
use tokio::{
    signal,
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
    time,
};
use tracing::{debug, info, instrument, warn};

/// Raw notification about one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    Created(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// Translate [`notify`] event into raw notifications.
///
/// Events that say nothing about paths appearing or vanishing yield nothing.
pub fn translate(event: &Event) -> Vec<RawEvent> {
    let paths = event.paths.iter().cloned();
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.map(RawEvent::Created).collect()
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.map(RawEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] if from.parent() == to.parent() => vec![RawEvent::Renamed {
                from: from.clone(),
                to: to.clone(),
            }],
            [from, to] => vec![RawEvent::Deleted(from.clone()), RawEvent::Created(to.clone())],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .map(|path| {
                if path.exists() {
                    RawEvent::Created(path)
                } else {
                    RawEvent::Deleted(path)
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Decide which paths the watcher cares about.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    include: Vec<Pattern>,
    exclude: Gitignore,
}

impl WatchFilter {
    /// Construct new filter for paths below `root`.
    ///
    /// An empty include listing accepts every file.
    ///
    /// # Errors
    ///
    /// - Return [`WatchError::Include`] for malformed glob patterns.
    /// - Return [`WatchError::Exclude`] for malformed exclude rules.
    pub fn new(
        root: impl Into<PathBuf>,
        include: impl IntoIterator<Item = impl AsRef<str>>,
        exclude: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let root = root.into();
        let include = include
            .into_iter()
            .map(|pattern| Pattern::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = GitignoreBuilder::new(&root);
        for rule in exclude {
            builder.add_line(None, rule.as_ref())?;
        }
        let exclude = builder.build()?;

        Ok(Self {
            root,
            include,
            exclude,
        })
    }

    /// Construct new filter from watch settings.
    pub fn from_settings(root: impl Into<PathBuf>, settings: &WatchSettings) -> Result<Self> {
        Self::new(root, &settings.include, &settings.exclude)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if a created path should be buffered.
    pub fn accepts_created(&self, path: &Path) -> bool {
        if !self.accepts_deleted(path) {
            return false;
        }

        path.is_dir() || self.is_included(path)
    }

    /// Check if a deleted path should be buffered.
    pub fn accepts_deleted(&self, path: &Path) -> bool {
        // INVARIANT: Gitignore matching panics for paths outside its root.
        if path == self.root || !path.starts_with(&self.root) {
            return false;
        }

        !self
            .exclude
            .matched_path_or_any_parents(path, path.is_dir())
            .is_ignore()
    }

    /// Check if a rename inside one directory should become an operation.
    ///
    /// The old name must be one the manifest could hold, so an editor saving
    /// through a scratch file does not count as a rename.
    pub fn accepts_renamed(&self, from: &Path, to: &Path) -> bool {
        self.accepts_deleted(from)
            && self.accepts_created(to)
            && (to.is_dir() || self.is_included(from))
    }

    fn is_included(&self, path: &Path) -> bool {
        if self.include.is_empty() {
            return true;
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.include
            .iter()
            .any(|pattern| pattern.matches(&name) || pattern.matches_path(relative))
    }
}

/// Watch state between two events.
///
/// Owns the correlator and the filter. Only ever touched by one task.
#[derive(Debug)]
pub struct Session<C = SystemClock>
where
    C: Clock,
{
    correlator: Correlator<C>,
    filter: WatchFilter,
}

impl<C> Session<C>
where
    C: Clock,
{
    /// Construct new session.
    pub fn new(correlator: Correlator<C>, filter: WatchFilter) -> Self {
        Self { correlator, filter }
    }

    pub fn correlator(&self) -> &Correlator<C> {
        &self.correlator
    }

    /// Instant at which [`Session::tick`] has work to do.
    pub fn deadline(&self) -> Option<Instant> {
        self.correlator.deadline()
    }

    /// Take in one [`notify`] event.
    ///
    /// Returns operations that need no correlation, i.e., renames inside one
    /// directory. Everything else is buffered. A rename from a name the
    /// filter would not include is buffered as a plain creation.
    pub fn ingest(&mut self, event: &Event) -> Vec<Operation> {
        let mut operations = Vec::new();
        for raw in translate(event) {
            match raw {
                RawEvent::Created(path) if self.filter.accepts_created(&path) => {
                    self.correlator.on_create(path)
                }
                RawEvent::Deleted(path) if self.filter.accepts_deleted(&path) => {
                    self.correlator.on_delete(path)
                }
                RawEvent::Renamed { from, to } if self.filter.accepts_renamed(&from, &to) => {
                    let kind = EntryKind::probe(&to);
                    operations.push(Operation::relocate(from, to, kind));
                }
                RawEvent::Renamed { to, .. } if self.filter.accepts_created(&to) => {
                    self.correlator.on_create(to)
                }
                raw => debug!("filtered {raw:?}"),
            }
        }

        operations
    }

    /// Run correlation pass if it is due, and turn paired moves into
    /// operations.
    ///
    /// The kind of each move is probed at its destination.
    pub fn tick(&mut self) -> Vec<Operation> {
        self.correlator
            .tick()
            .into_iter()
            .map(|paired| {
                let kind = EntryKind::probe(&paired.to);
                Operation::relocate(paired.from, paired.to, kind)
            })
            .collect()
    }
}

/// Watch project root until interrupted.
///
/// Stops on Ctrl-C.
///
/// # Errors
///
/// - Return [`WatchError::Notify`] if the watcher cannot be set up.
#[instrument(skip(project, filter), level = "debug")]
pub async fn watch<S, O>(
    project: &Project<S, O>,
    filter: WatchFilter,
    windows: CorrelationWindows,
) -> Result<()>
where
    S: ManifestStore,
    O: Observer,
{
    let root = project.synchronizer().layout().project_root().to_path_buf();
    let (tx, mut rx) = unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let _ = tx.send(event);
        }
        Err(err) => warn!("watch error: {err}"),
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!("watching {:?}", root.display());

    let mut session = Session::new(Correlator::new(SystemClock, windows), filter);
    drive(project, &mut session, &mut rx, signal::ctrl_c()).await;
    info!("stop watching {:?}", root.display());

    Ok(())
}

/// Run watch loop over a stream of events until `shutdown` resolves or the
/// stream closes.
pub async fn drive<S, O, C, F>(
    project: &Project<S, O>,
    session: &mut Session<C>,
    events: &mut UnboundedReceiver<Event>,
    shutdown: F,
) where
    S: ManifestStore,
    O: Observer,
    C: Clock,
    F: Future,
{
    tokio::pin!(shutdown);

    loop {
        let deadline = session.deadline();
        let operations = tokio::select! {
            event = events.recv() => match event {
                Some(event) => session.ingest(&event),
                None => break,
            },
            _ = sleep_until(deadline) => session.tick(),
            _ = &mut shutdown => break,
        };

        if operations.is_empty() {
            continue;
        }

        // Store failures are reported by the project, keep watching.
        if let Err(err) = project.apply_all(&operations).await {
            debug!("pass aborted: {err}");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(time::Instant::from_std(deadline)).await,
        None => pending().await,
    }
}

/// Watcher error types.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Filesystem watcher failed.
    #[error(transparent)]
    Notify(#[from] notify::Error),

    /// Include glob is malformed.
    #[error(transparent)]
    Include(#[from] glob::PatternError),

    /// Exclude rule is malformed.
    #[error(transparent)]
    Exclude(#[from] ignore::Error),
}

/// Friendly result alias :3
pub type Result<T, E = WatchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        correlate::ManualClock,
        manifest::Manifest,
        report::ReportLog,
        store::MemoryManifestStore,
        sync::ProjectLayout,
    };
    use notify::event::{AccessKind, CreateKind, RemoveKind};
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::time::Duration;

    const ROOT: &str = "/work/Demo";

    fn path(relative: &str) -> PathBuf {
        Path::new(ROOT).join(relative)
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, relative| event.add_path(path(relative)))
    }

    fn filter() -> WatchFilter {
        WatchFilter::new(ROOT, ["*.swift"], [".build/"]).unwrap()
    }

    #[test_case(
        event(EventKind::Create(CreateKind::File), &["a/X.swift"]),
        vec![RawEvent::Created(path("a/X.swift"))];
        "create"
    )]
    #[test_case(
        event(EventKind::Remove(RemoveKind::Any), &["a/X.swift"]),
        vec![RawEvent::Deleted(path("a/X.swift"))];
        "remove"
    )]
    #[test_case(
        event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["a/X.swift"]),
        vec![RawEvent::Deleted(path("a/X.swift"))];
        "rename from"
    )]
    #[test_case(
        event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["b/X.swift"]),
        vec![RawEvent::Created(path("b/X.swift"))];
        "rename to"
    )]
    #[test_case(
        event(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), &["a/X.swift", "a/Y.swift"]),
        vec![RawEvent::Renamed { from: path("a/X.swift"), to: path("a/Y.swift") }];
        "rename in place"
    )]
    #[test_case(
        event(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), &["a/X.swift", "b/X.swift"]),
        vec![RawEvent::Deleted(path("a/X.swift")), RawEvent::Created(path("b/X.swift"))];
        "rename across directories"
    )]
    #[test_case(
        event(EventKind::Access(AccessKind::Any), &["a/X.swift"]),
        vec![];
        "access"
    )]
    #[test]
    fn translate_notify_events(event: Event, expect: Vec<RawEvent>) {
        pretty_assertions::assert_eq!(translate(&event), expect);
    }

    #[test_case("a/X.swift", true; "included file")]
    #[test_case("a/X.txt", false; "other extension")]
    #[test_case(".build/X.swift", false; "excluded directory")]
    #[test_case("Views", false; "missing directory is a file")]
    #[test]
    fn filter_created_paths(relative: &str, expect: bool) {
        pretty_assertions::assert_eq!(filter().accepts_created(&path(relative)), expect);
    }

    #[test]
    fn filter_rejects_root_itself() {
        assert!(!filter().accepts_deleted(Path::new(ROOT)));
        assert!(!filter().accepts_deleted(Path::new("/elsewhere/X.swift")));
        assert!(filter().accepts_deleted(&path("a/X.txt")));
    }

    #[test]
    fn session_pairs_move_across_directories() {
        let clock = ManualClock::new();
        let correlator = Correlator::new(clock.clone(), CorrelationWindows::default());
        let mut session = Session::new(correlator, filter());

        let remove = event(EventKind::Remove(RemoveKind::File), &["a/X.swift"]);
        let create = event(EventKind::Create(CreateKind::File), &["b/X.swift"]);
        assert_eq!(session.ingest(&remove), vec![]);
        assert_eq!(session.ingest(&create), vec![]);
        assert_eq!(session.tick(), vec![]);

        clock.advance(Duration::from_millis(100));
        assert_eq!(
            session.tick(),
            vec![Operation::Move {
                from: path("a/X.swift"),
                to: path("b/X.swift"),
                kind: EntryKind::File,
            }]
        );
        assert!(session.correlator().is_idle());
    }

    #[test]
    fn session_applies_rename_in_place_immediately() {
        let mut session = Session::new(
            Correlator::new(ManualClock::new(), CorrelationWindows::default()),
            filter(),
        );

        let rename = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["a/X.swift", "a/Y.swift"],
        );
        assert_eq!(
            session.ingest(&rename),
            vec![Operation::Rename {
                from: path("a/X.swift"),
                to: path("a/Y.swift"),
                kind: EntryKind::File,
            }]
        );
        assert_eq!(session.deadline(), None);

        let save = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["Demo.xcmanifest.tmp", "Demo.xcmanifest"],
        );
        assert_eq!(session.ingest(&save), vec![]);
    }

    #[test]
    fn session_buffers_atomic_save_as_creation() {
        let mut session = Session::new(
            Correlator::new(ManualClock::new(), CorrelationWindows::default()),
            filter(),
        );

        let save = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["a/X.swift.tmp", "a/X.swift"],
        );
        assert_eq!(session.ingest(&save), vec![]);
        let saved = path("a/X.swift");
        assert_eq!(
            session.correlator().pending_creates().collect::<Vec<_>>(),
            vec![saved.as_path()]
        );
        assert!(filter().accepts_renamed(&path("a/X.swift"), &path("a/Y.swift")));
        assert!(!filter().accepts_renamed(&path("a/X.swift.tmp"), &path("a/X.swift")));
    }

    #[tokio::test]
    async fn drive_runs_paired_moves_through_project() -> anyhow::Result<()> {
        let mut manifest = Manifest::new();
        manifest.add_target("Demo")?;
        let store = MemoryManifestStore::new(manifest);
        let project = Project::new(store.clone(), ProjectLayout::single(ROOT), ReportLog::new());
        project
            .apply(Operation::Create {
                path: path("Demo/Views/Row.swift"),
                kind: EntryKind::File,
            })
            .await?;

        let windows = CorrelationWindows {
            coalesce: Duration::from_millis(10),
            ..CorrelationWindows::default()
        };
        let mut session = Session::new(Correlator::new(SystemClock, windows), filter());
        let (tx, mut rx) = unbounded_channel();
        tx.send(event(EventKind::Remove(RemoveKind::File), &["Demo/Views/Row.swift"]))?;
        tx.send(event(EventKind::Create(CreateKind::File), &["Demo/Rows/Row.swift"]))?;

        drive(
            &project,
            &mut session,
            &mut rx,
            time::sleep(Duration::from_millis(200)),
        )
        .await;

        let saved = store.snapshot().unwrap();
        assert_eq!(saved.find_file_reference("Demo/Views/Row.swift"), None);
        assert!(saved.find_file_reference("Demo/Rows/Row.swift").is_some());

        Ok(())
    }
}
