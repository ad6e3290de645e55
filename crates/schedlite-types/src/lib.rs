//! schedlite-types: Shared data model for the scheduler.
//!
//! A [`Task`] record represents exactly one occurrence of a scheduled item.
//! Repetition is modeled by inserting a successor record with an advanced
//! `scheduled_at`, never by resetting `executed` on an existing record.

pub mod time;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// How often a task repeats after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Fire a single time, no successor record.
    Once,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Stable string form, used as the persisted column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Once => "once",
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(Frequency::Once),
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(format!(
                "unknown frequency '{other}' (expected once, hourly, daily, weekly or monthly)"
            )),
        }
    }
}

/// What a task does when it fires: hit a URL or run a shell command.
///
/// Exactly one of the two is set per record; the store enforces the same
/// invariant with a CHECK constraint on the url/command columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Url(String),
    Command(String),
}

impl Action {
    pub fn url(&self) -> Option<&str> {
        match self {
            Action::Url(u) => Some(u),
            Action::Command(_) => None,
        }
    }

    pub fn command(&self) -> Option<&str> {
        match self {
            Action::Url(_) => None,
            Action::Command(c) => Some(c),
        }
    }

    /// The URL or command text, whichever is set. Used for display.
    pub fn target(&self) -> &str {
        match self {
            Action::Url(u) => u,
            Action::Command(c) => c,
        }
    }
}

/// One persisted occurrence of a scheduled item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Row id assigned by the store at insert time.
    pub id: i64,
    /// Caller-supplied grouping label; not unique.
    pub name: String,
    /// Repeat cadence; immutable once set.
    pub frequency: Frequency,
    /// Local wall-clock time at which this occurrence becomes due.
    pub scheduled_at: NaiveDateTime,
    /// Set true exactly once when this occurrence is dispatched.
    pub executed: bool,
    /// Soft-delete marker; records are never physically removed.
    pub deleted: bool,
    /// What to do when the occurrence fires.
    pub action: Action,
}

/// A task as handed to the store for insertion, before an id exists.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub frequency: Frequency,
    pub scheduled_at: NaiveDateTime,
    pub action: Action,
}
