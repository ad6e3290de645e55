//! schedlite-engine: due-detection, dispatch and recurrence advancement.
//!
//! The engine is driven by an external periodic trigger (a cron entry calling
//! `run`). Each run snapshots the pending records, dispatches the ones whose
//! scheduled time has arrived, and inserts a successor record for repeating
//! tasks.
//!
//! Dispatch is at most once per occurrence: a record is marked executed
//! before its action runs, so a crash between the mark and the action loses
//! that occurrence rather than ever firing it twice. Downstream failures
//! (HTTP errors, non-zero exits) are reported per task and do not undo the
//! mark or stop the rest of the run.

pub mod engine;
pub mod recurrence;

pub use engine::{Dispatched, Engine, RunReport};

use schedlite_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Neither or both of url/command supplied at registration.
    #[error("provide exactly one of a url or a command")]
    InvalidAction,
    /// Unparsable or past-dated registration time.
    #[error("invalid time '{0}': expected YYYY-MM-DD or YYYY-MM-DD_HH:MM:SS, now or later")]
    InvalidTime(String),
    /// `advance` called for a once task. Internal contract violation, not
    /// reachable from external input.
    #[error("a 'once' task has no next occurrence")]
    InvalidFrequency,
    #[error("advancing the schedule left the supported time range")]
    TimeOutOfRange,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
