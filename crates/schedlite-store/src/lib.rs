//! schedlite-store: SQLite persistence for task records.
//!
//! One row per occurrence. Rows are only ever inserted or flagged
//! (`executed`, `deleted`); nothing is physically removed, so the table is an
//! audit trail of everything that was ever scheduled.

use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use rusqlite::Connection;

use schedlite_types::time::SCHEDULE_TIME_FORMAT;
use schedlite_types::{Action, Frequency, NewTask, Task};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt task row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistent storage for task records.
pub struct TaskStore {
    conn: Mutex<Connection>,
}

/// Idempotent schema bootstrap.
///
/// The CHECK constraint mirrors the registration-time rule that exactly one
/// of url/command is set, so a row can never lose its action.
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tasks (
             id           INTEGER PRIMARY KEY AUTOINCREMENT,
             name         TEXT NOT NULL,
             frequency    TEXT NOT NULL,
             scheduled_at TEXT NOT NULL,
             executed     INTEGER NOT NULL DEFAULT 0,
             deleted      INTEGER NOT NULL DEFAULT 0,
             url          TEXT,
             command      TEXT,
             CHECK ((url IS NULL) <> (command IS NULL))
         );

         CREATE INDEX IF NOT EXISTS idx_tasks_pending ON tasks (executed, deleted);",
    )
}

type RawRow = (
    i64,
    String,
    String,
    String,
    bool,
    bool,
    Option<String>,
    Option<String>,
);

const SELECT_COLS: &str = "id, name, frequency, scheduled_at, executed, deleted, url, command";

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get::<_, i64>(4)? != 0,
        row.get::<_, i64>(5)? != 0,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn task_from_raw(raw: RawRow) -> Result<Task> {
    let (id, name, frequency, scheduled_at, executed, deleted, url, command) = raw;
    let frequency: Frequency = frequency.parse().map_err(|reason| StoreError::Corrupt {
        id,
        reason,
    })?;
    let scheduled_at = NaiveDateTime::parse_from_str(&scheduled_at, SCHEDULE_TIME_FORMAT)
        .map_err(|e| StoreError::Corrupt {
            id,
            reason: format!("bad scheduled_at: {e}"),
        })?;
    let action = match (url, command) {
        (Some(u), None) => Action::Url(u),
        (None, Some(c)) => Action::Command(c),
        _ => {
            return Err(StoreError::Corrupt {
                id,
                reason: "expected exactly one of url/command".into(),
            });
        }
    };
    Ok(Task {
        id,
        name,
        frequency,
        scheduled_at,
        executed,
        deleted,
        action,
    })
}

impl TaskStore {
    /// Open (or create) the task database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        init_schema(&conn)?;
        tracing::info!("task store opened: {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new pending record and return its id.
    pub fn insert(&self, task: &NewTask) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tasks (name, frequency, scheduled_at, executed, deleted, url, command)
             VALUES (?1, ?2, ?3, 0, 0, ?4, ?5)",
            rusqlite::params![
                task.name,
                task.frequency.as_str(),
                task.scheduled_at.format(SCHEDULE_TIME_FORMAT).to_string(),
                task.action.url(),
                task.action.command(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Claim an occurrence for dispatch.
    ///
    /// Conditional update: returns false if the row was already executed (or
    /// does not exist), so two overlapping runs cannot both dispatch the same
    /// occurrence.
    pub fn mark_executed(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE tasks SET executed = 1 WHERE id = ?1 AND executed = 0",
            [id],
        )?;
        Ok(n > 0)
    }

    /// Soft-delete every currently pending record. Returns how many rows were
    /// flagged; calling again is a no-op.
    pub fn mark_all_deleted(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE tasks SET deleted = 1 WHERE executed = 0 AND deleted = 0",
            [],
        )?;
        Ok(n)
    }

    /// Snapshot of dispatch candidates: every non-executed, non-deleted
    /// record, optionally restricted to one name. Ordering is unspecified.
    pub fn find_due(&self, name: Option<&str>) -> Result<Vec<Task>> {
        self.query_active(name, "")
    }

    /// Pending records for display, ordered by scheduled time. Read-only.
    pub fn find_pending(&self, name: Option<&str>) -> Result<Vec<Task>> {
        self.query_active(name, " ORDER BY scheduled_at")
    }

    fn query_active(&self, name: Option<&str>, suffix: &str) -> Result<Vec<Task>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {SELECT_COLS} FROM tasks WHERE executed = 0 AND deleted = 0{}{suffix}",
            if name.is_some() { " AND name = ?1" } else { "" },
        );
        let mut stmt = conn.prepare(&sql)?;
        let raw: Vec<RawRow> = match name {
            Some(n) => stmt
                .query_map([n], read_raw)?
                .collect::<rusqlite::Result<_>>()?,
            None => stmt
                .query_map([], read_raw)?
                .collect::<rusqlite::Result<_>>()?,
        };
        raw.into_iter().map(task_from_raw).collect()
    }
}
