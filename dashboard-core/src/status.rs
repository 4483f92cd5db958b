use chrono::{DateTime, Local};

use crate::error::ErrorKind;

/// Outcome of the most recent sync, shown by the ticker when there are no alerts.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    /// Nothing has been fetched yet.
    Starting,
    /// No saved configuration.
    NotConfigured,
    Synced { at: DateTime<Local> },
    Failed { kind: ErrorKind, last_sync: Option<DateTime<Local>> },
}

impl SyncStatus {
    pub fn last_sync(&self) -> Option<DateTime<Local>> {
        match self {
            SyncStatus::Synced { at } => Some(*at),
            SyncStatus::Failed { last_sync, .. } => *last_sync,
            SyncStatus::Starting | SyncStatus::NotConfigured => None,
        }
    }

    /// Status after a failed fetch, keeping the time of the last good one.
    pub fn failed(kind: ErrorKind, previous: &SyncStatus) -> Self {
        SyncStatus::Failed { kind, last_sync: previous.last_sync() }
    }

    pub fn needs_setup(&self) -> bool {
        matches!(
            self,
            SyncStatus::NotConfigured | SyncStatus::Failed { kind: ErrorKind::Auth, .. }
        )
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Starting => f.write_str("Ready..."),
            SyncStatus::NotConfigured => f.write_str("Setup required - run configure"),
            SyncStatus::Synced { at } => write!(f, "Last Sync: {}", at.format("%H:%M")),
            SyncStatus::Failed { kind, last_sync } => {
                let message = match kind {
                    ErrorKind::Auth => "Auth failed - check API key",
                    ErrorKind::RateLimited => "Rate limited - retrying at next sync",
                    ErrorKind::Transient => "Network error - retrying at next sync",
                    ErrorKind::Parse => "Bad response from weather service",
                };
                f.write_str(message)?;
                if let Some(at) = last_sync {
                    write!(f, " (Last Sync: {})", at.format("%H:%M"))?;
                }
                Ok(())
            }
        }
    }
}
