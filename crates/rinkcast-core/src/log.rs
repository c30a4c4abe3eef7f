// Local cache of a match's event log and reconciliation against fresh fetches.

use thiserror::Error;
use tracing::warn;

use crate::event::LogRecord;

/// A fetched log was shorter than one observed earlier. The backend log is
/// append-only, so this is a protocol violation rather than a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event log regressed from {known} to {fetched} records")]
pub struct LogRegression {
    pub known: usize,
    pub fetched: usize,
}

/// Return the records of `fetched` that lie beyond the first `known`
/// positions.
///
/// An equal length yields an empty slice, which is the usual steady state
/// between events.
pub fn new_suffix<T>(known: usize, fetched: &[T]) -> Result<&[T], LogRegression> {
    if fetched.len() < known {
        return Err(LogRegression {
            known,
            fetched: fetched.len(),
        });
    }
    Ok(&fetched[known..])
}

/// Append-only local copy of the backend's event log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<LogRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LogRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Records in `[from, len)`; empty when `from` is at or past the end.
    pub fn tail_from(&self, from: usize) -> &[LogRecord] {
        self.records.get(from..).unwrap_or(&[])
    }

    /// Reconcile a full fetched log against the cache and append whatever is
    /// new. Returns the number of appended records.
    ///
    /// On regression the cache is left untouched. Cached positions are never
    /// rewritten: if the fetched prefix disagrees with what we already hold,
    /// the disagreement is logged and the cached copy wins.
    pub fn absorb(&mut self, fetched: Vec<LogRecord>) -> Result<usize, LogRegression> {
        let known = self.records.len();
        let appended = new_suffix(known, &fetched)?.len();

        if fetched[..known] != self.records[..] {
            warn!(
                "Fetched event log prefix differs from the {} cached records; keeping cached copy",
                known
            );
        }

        self.records.extend(fetched.into_iter().skip(known));
        Ok(appended)
    }
}
