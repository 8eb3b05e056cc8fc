// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Outcome reporting.
//!
//! The synchronization core never renders anything. Each logical operation
//! ends in exactly one [`Report`] handed to a caller supplied [`Observer`],
//! plus one extra warning report for every notice attached to a successful
//! operation.

use crate::sync::{Notice, Operation, SyncError};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    sync::{Arc, Mutex},
};
use tracing::{error, info, warn};

/// Severity of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Success,
    Warning,
    Error,
}

/// Outcome of one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub level: Level,
    pub operation: Option<Operation>,
    pub message: String,
}

impl Report {
    pub fn success(operation: &Operation) -> Self {
        Self {
            level: Level::Success,
            operation: Some(operation.clone()),
            message: format!("{operation}"),
        }
    }

    pub fn notice(operation: &Operation, notice: &Notice) -> Self {
        Self {
            level: Level::Warning,
            operation: Some(operation.clone()),
            message: notice.to_string(),
        }
    }

    /// Report failed operation.
    ///
    /// Recoverable failures are downgraded to warnings.
    pub fn failure(operation: &Operation, err: &SyncError) -> Self {
        let level = if err.is_recoverable() {
            Level::Warning
        } else {
            Level::Error
        };

        Self {
            level,
            operation: Some(operation.clone()),
            message: format!("cannot {operation}: {err}"),
        }
    }

    /// Report failure that is not tied to a single operation.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            operation: None,
            message: message.into(),
        }
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.message)
    }
}

/// Receive reports about applied operations.
pub trait Observer {
    fn notify(&self, report: Report);
}

/// Observer that logs every report through [`tracing`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn notify(&self, report: Report) {
        match report.level {
            Level::Success => info!("{report}"),
            Level::Warning => warn!("{report}"),
            Level::Error => error!("{report}"),
        }
    }
}

/// Observer that keeps every report in memory.
///
/// Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct ReportLog {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl ReportLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all reports collected so far.
    pub fn drain(&self) -> Vec<Report> {
        match self.reports.lock() {
            Ok(mut reports) => reports.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }
}

impl Observer for ReportLog {
    fn notify(&self, report: Report) {
        match self.reports.lock() {
            Ok(mut reports) => reports.push(report),
            Err(poisoned) => poisoned.into_inner().push(report),
        }
    }
}

impl<O> Observer for &O
where
    O: Observer,
{
    fn notify(&self, report: Report) {
        (**self).notify(report)
    }
}
