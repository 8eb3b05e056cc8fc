// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Correlate raw filesystem notifications into moves.
//!
//! Filesystem watchers have no notion of a move. Moving `a/X.swift` to
//! `b/X.swift` shows up as a deletion of the old path and a creation of the
//! new one, in no particular order, possibly some time apart. The
//! [`Correlator`] buffers both kinds of notifications for a short while and
//! pairs them back up.
//!
//! # Correlation Pass
//!
//! Every notification (re)schedules a __correlation pass__ a short coalescing
//! window into the future, so a burst of notifications is looked at once after
//! it settles. A pass does the following:
//!
//! 1. Drop buffered entries that outlived the retention window. They are never
//!    retried.
//! 2. For each buffered creation, collect buffered deletions with the same
//!    basename.
//!    - Exactly one candidate within the correlation threshold in the same
//!      parent directory is noise, e.g., an editor saving through a temporary
//!      file. Both entries are discarded.
//!    - Exactly one candidate within the correlation threshold in another
//!      parent directory is a move. It is emitted and both entries are
//!      discarded.
//!    - Anything else stays buffered for a later pass. Ambiguous pairings are
//!      deferred, never guessed.
//!
//! Nothing is emitted for creations or deletions that never pair up. Those are
//! handled by whoever explicitly creates or deletes entries.
//!
//! # Time
//!
//! The correlator never reads the system time itself. It asks a [`Clock`],
//! and exposes the instant of its next pass through [`Correlator::deadline`]
//! so the caller decides how to wait for it. Tests drive it with a
//! [`ManualClock`].

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::{debug, instrument};

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle while the
/// correlator owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed_nanos: Arc<AtomicU64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move time forward.
    pub fn advance(&self, duration: Duration) {
        self.elapsed_nanos
            .fetch_add(
                u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX),
                Ordering::SeqCst,
            );
    }

    /// Time passed since the clock was made.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

/// Time windows used by the correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationWindows {
    /// Delay between the last notification and the pass it schedules.
    pub coalesce: Duration,

    /// Age at which unpaired entries are dropped.
    pub retention: Duration,

    /// Largest gap between a deletion and a creation that still pair up.
    pub threshold: Duration,
}

impl Default for CorrelationWindows {
    fn default() -> Self {
        Self {
            coalesce: Duration::from_millis(100),
            retention: Duration::from_secs(1),
            threshold: Duration::from_millis(500),
        }
    }
}

/// Deletion and creation that were paired into a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Buffer raw notifications and pair them into moves.
#[derive(Debug)]
pub struct Correlator<C = SystemClock>
where
    C: Clock,
{
    clock: C,
    windows: CorrelationWindows,
    pending_creates: BTreeMap<PathBuf, Instant>,
    pending_deletes: BTreeMap<PathBuf, Instant>,
    deadline: Option<Instant>,
}

impl<C> Correlator<C>
where
    C: Clock,
{
    /// Construct new correlator with empty buffers.
    pub fn new(clock: C, windows: CorrelationWindows) -> Self {
        Self {
            clock,
            windows,
            pending_creates: BTreeMap::new(),
            pending_deletes: BTreeMap::new(),
            deadline: None,
        }
    }

    pub fn windows(&self) -> CorrelationWindows {
        self.windows
    }

    /// Buffer creation of a path and reschedule the next pass.
    pub fn on_create(&mut self, path: impl Into<PathBuf>) {
        let now = self.clock.now();
        self.pending_creates.insert(path.into(), now);
        self.deadline = Some(now + self.windows.coalesce);
    }

    /// Buffer deletion of a path and reschedule the next pass.
    pub fn on_delete(&mut self, path: impl Into<PathBuf>) {
        let now = self.clock.now();
        self.pending_deletes.insert(path.into(), now);
        self.deadline = Some(now + self.windows.coalesce);
    }

    /// Instant at which the next pass is due, if one is scheduled.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check if nothing is buffered.
    pub fn is_idle(&self) -> bool {
        self.pending_creates.is_empty() && self.pending_deletes.is_empty()
    }

    pub fn pending_creates(&self) -> impl Iterator<Item = &Path> {
        self.pending_creates.keys().map(PathBuf::as_path)
    }

    pub fn pending_deletes(&self) -> impl Iterator<Item = &Path> {
        self.pending_deletes.keys().map(PathBuf::as_path)
    }

    /// Run the scheduled pass if it is due.
    ///
    /// Returns nothing when no pass is scheduled or its deadline has not been
    /// reached yet.
    pub fn tick(&mut self) -> Vec<PairedMove> {
        match self.deadline {
            Some(deadline) if self.clock.now() >= deadline => {
                self.deadline = None;
                self.pass()
            }
            _ => Vec::new(),
        }
    }

    /// Run a correlation pass right away.
    ///
    /// If entries remain buffered afterwards, a follow up pass is scheduled
    /// for when the oldest of them expires.
    #[instrument(skip(self), level = "debug")]
    pub fn pass(&mut self) -> Vec<PairedMove> {
        let now = self.clock.now();
        self.expire(now);

        let mut moves = Vec::new();
        let creates = self.pending_creates.keys().cloned().collect::<Vec<_>>();
        for to in creates {
            let Some(name) = to.file_name() else {
                continue;
            };

            let from = {
                let mut candidates = self
                    .pending_deletes
                    .keys()
                    .filter(|from| from.file_name() == Some(name));
                match (candidates.next(), candidates.next()) {
                    (Some(from), None) => from.clone(),
                    (None, _) => continue,
                    _ => {
                        debug!("defer ambiguous pairing for {:?}", to.display());
                        continue;
                    }
                }
            };

            let (Some(created), Some(deleted)) = (
                self.pending_creates.get(&to).copied(),
                self.pending_deletes.get(&from).copied(),
            ) else {
                continue;
            };

            if created.max(deleted) - created.min(deleted) > self.windows.threshold {
                continue;
            }

            self.pending_creates.remove(&to);
            self.pending_deletes.remove(&from);

            if from.parent() == to.parent() {
                debug!("discard create and delete of {:?} in place", to.display());
                continue;
            }

            debug!("pair {:?} with {:?}", from.display(), to.display());
            moves.push(PairedMove { from, to });
        }

        // INVARIANT: Leftovers always get a pass that can expire them.
        let oldest = self
            .pending_creates
            .values()
            .chain(self.pending_deletes.values())
            .min()
            .copied();
        if let Some(oldest) = oldest {
            let expiry = oldest + self.windows.retention;
            self.deadline = Some(self.deadline.map_or(expiry, |due| due.min(expiry)));
        }

        moves
    }

    fn expire(&mut self, now: Instant) {
        let retention = self.windows.retention;
        let fresh = |stamp: &Instant| now.saturating_duration_since(*stamp) < retention;
        self.pending_creates.retain(|_, stamp| fresh(stamp));
        self.pending_deletes.retain(|_, stamp| fresh(stamp));
    }
}
