//! Scheduler engine: registers tasks, dispatches due occurrences, advances
//! repeating schedules.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

use schedlite_dispatch::Dispatch;
use schedlite_store::TaskStore;
use schedlite_types::time::{format_schedule_time, parse_schedule_time};
use schedlite_types::{Action, Frequency, NewTask, Task};

use crate::recurrence;
use crate::{EngineError, Result};

/// Outcome of one dispatched occurrence within a run.
#[derive(Debug)]
pub struct Dispatched {
    pub task: Task,
    /// Captured action output, or the dispatch failure rendered as text.
    pub result: std::result::Result<String, String>,
    /// Scheduled time of the successor record, for repeating tasks.
    pub next: Option<NaiveDateTime>,
}

/// Outcome of one `run` invocation.
#[derive(Debug, Default)]
pub struct RunReport {
    pub dispatched: Vec<Dispatched>,
}

impl RunReport {
    /// True if at least one occurrence was dispatched.
    pub fn triggered(&self) -> bool {
        !self.dispatched.is_empty()
    }
}

/// Orchestrates the task store, the recurrence calculator and the action
/// dispatcher. Both collaborators are injected; the engine holds no ambient
/// state of its own.
pub struct Engine {
    store: Arc<TaskStore>,
    dispatcher: Arc<dyn Dispatch>,
}

impl Engine {
    pub fn new(store: Arc<TaskStore>, dispatcher: Arc<dyn Dispatch>) -> Self {
        Self { store, dispatcher }
    }

    /// Register a new scheduled item, due at `raw_time` or later.
    pub fn register(
        &self,
        name: &str,
        raw_time: &str,
        url: Option<&str>,
        command: Option<&str>,
        frequency: Frequency,
    ) -> Result<Task> {
        self.register_at(
            name,
            raw_time,
            url,
            command,
            frequency,
            Local::now().naive_local(),
        )
    }

    /// Registration against an explicit clock.
    pub fn register_at(
        &self,
        name: &str,
        raw_time: &str,
        url: Option<&str>,
        command: Option<&str>,
        frequency: Frequency,
        now: NaiveDateTime,
    ) -> Result<Task> {
        let action = action_from(url, command)?;
        let scheduled_at = parse_schedule_time(raw_time)
            .filter(|t| *t >= now)
            .ok_or_else(|| EngineError::InvalidTime(raw_time.to_string()))?;

        let id = self.store.insert(&NewTask {
            name: name.to_string(),
            frequency,
            scheduled_at,
            action: action.clone(),
        })?;
        info!(
            task_id = id,
            %name,
            %frequency,
            scheduled_at = %format_schedule_time(scheduled_at),
            "scheduled item registered"
        );

        Ok(Task {
            id,
            name: name.to_string(),
            frequency,
            scheduled_at,
            executed: false,
            deleted: false,
            action,
        })
    }

    /// Dispatch every due occurrence, optionally restricted to one name.
    /// Meant to be invoked from a cron entry at whatever interval bounds the
    /// acceptable latency.
    pub async fn run(&self, name: Option<&str>) -> Result<RunReport> {
        self.run_at(name, Local::now().naive_local()).await
    }

    /// One run against an explicit clock.
    pub async fn run_at(&self, name: Option<&str>, now: NaiveDateTime) -> Result<RunReport> {
        let candidates = self.store.find_due(name)?;
        let mut report = RunReport::default();

        for task in candidates {
            if task.scheduled_at > now {
                continue;
            }

            // Claim before dispatch. A failed claim means an overlapping run
            // already took this occurrence.
            if !self.store.mark_executed(task.id)? {
                warn!(task_id = task.id, "occurrence already claimed, skipping");
                continue;
            }

            let result = match &task.action {
                Action::Url(url) => self.dispatcher.execute_url(url).await,
                Action::Command(command) => self.dispatcher.execute_command(command).await,
            };
            match &result {
                Ok(output) => info!(
                    task_id = task.id,
                    name = %task.name,
                    "dispatched: {}",
                    output.trim_end()
                ),
                Err(e) => warn!(task_id = task.id, name = %task.name, "dispatch failed: {e}"),
            }

            let next = if task.frequency == Frequency::Once {
                None
            } else {
                let next_at = recurrence::advance(task.scheduled_at, task.frequency)?;
                self.store.insert(&NewTask {
                    name: task.name.clone(),
                    frequency: task.frequency,
                    scheduled_at: next_at,
                    action: task.action.clone(),
                })?;
                info!(
                    task_id = task.id,
                    name = %task.name,
                    next = %format_schedule_time(next_at),
                    "rescheduled"
                );
                Some(next_at)
            };

            report.dispatched.push(Dispatched {
                task,
                result: result.map_err(|e| e.to_string()),
                next,
            });
        }

        Ok(report)
    }

    /// Soft-delete every pending record. Irreversible; returns the count.
    pub fn remove_all(&self) -> Result<usize> {
        let n = self.store.mark_all_deleted()?;
        info!(count = n, "removed all scheduled items");
        Ok(n)
    }

    /// Pending records for display.
    pub fn list(&self, name: Option<&str>) -> Result<Vec<Task>> {
        Ok(self.store.find_pending(name)?)
    }
}

fn action_from(url: Option<&str>, command: Option<&str>) -> Result<Action> {
    let url = url.filter(|s| !s.trim().is_empty());
    let command = command.filter(|s| !s.trim().is_empty());
    match (url, command) {
        (Some(u), None) => Ok(Action::Url(u.to_string())),
        (None, Some(c)) => Ok(Action::Command(c.to_string())),
        _ => Err(EngineError::InvalidAction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use schedlite_dispatch::{Dispatch, DispatchError};
    use std::sync::Mutex;

    /// Records every dispatch; fails any command containing "boom".
    #[derive(Default)]
    struct MockDispatcher {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Dispatch for MockDispatcher {
        async fn execute_url(&self, url: &str) -> schedlite_dispatch::Result<String> {
            self.calls.lock().unwrap().push(format!("url:{url}"));
            Ok("HTTP/1.1 200 OK\n\nok".into())
        }

        async fn execute_command(&self, command: &str) -> schedlite_dispatch::Result<String> {
            self.calls.lock().unwrap().push(format!("cmd:{command}"));
            if command.contains("boom") {
                return Err(DispatchError::CommandFailed {
                    status: "exit status: 1".into(),
                    stderr: "boom".into(),
                });
            }
            Ok("hi\n".into())
        }
    }

    fn engine() -> (Engine, Arc<MockDispatcher>) {
        let store = Arc::new(TaskStore::open_in_memory().unwrap());
        let dispatcher = Arc::new(MockDispatcher::default());
        (Engine::new(store, dispatcher.clone()), dispatcher)
    }

    // midnight, so date-only registration input ("2026-03-01") is exactly now
    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_register_requires_exactly_one_action() {
        let (engine, _) = engine();
        let err = engine
            .register_at("x", "2026-03-02", None, None, Frequency::Once, now())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAction));

        let err = engine
            .register_at(
                "x",
                "2026-03-02",
                Some("http://example.test"),
                Some("echo hi"),
                Frequency::Once,
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAction));
    }

    #[test]
    fn test_register_rejects_past_or_garbage_time() {
        let (engine, _) = engine();
        let err = engine
            .register_at(
                "x",
                "2026-02-28_23:59:59",
                Some("http://example.test"),
                None,
                Frequency::Once,
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTime(_)));

        let err = engine
            .register_at(
                "x",
                "next tuesday",
                Some("http://example.test"),
                None,
                Frequency::Once,
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTime(_)));
    }

    #[test]
    fn test_register_accepts_exactly_now() {
        let (engine, _) = engine();
        let task = engine
            .register_at(
                "x",
                "2026-03-01_00:00:00",
                None,
                Some("echo hi"),
                Frequency::Once,
                now(),
            )
            .unwrap();
        assert_eq!(task.scheduled_at, now());
        assert!(!task.executed);
        assert!(!task.deleted);
    }

    #[tokio::test]
    async fn test_once_task_not_due_then_due() {
        let (engine, dispatcher) = engine();
        engine
            .register_at(
                "ping",
                "2026-03-01_01:00:00",
                Some("http://example.test/x"),
                None,
                Frequency::Once,
                now(),
            )
            .unwrap();

        // not yet due
        let report = engine.run_at(None, now()).await.unwrap();
        assert!(!report.triggered());
        assert!(dispatcher.calls.lock().unwrap().is_empty());

        // clock past the scheduled time
        let report = engine
            .run_at(None, now() + Duration::hours(2))
            .await
            .unwrap();
        assert!(report.triggered());
        assert_eq!(report.dispatched.len(), 1);
        assert_eq!(report.dispatched[0].next, None);
        assert_eq!(
            dispatcher.calls.lock().unwrap().as_slice(),
            ["url:http://example.test/x"]
        );

        // no successor for a once task
        assert!(engine.list(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_daily_task_creates_successor() {
        let (engine, _) = engine();
        engine
            .register_at(
                "sweep",
                "2026-03-01",
                None,
                Some("echo hi"),
                Frequency::Daily,
                now(),
            )
            .unwrap();

        let report = engine.run_at(None, now()).await.unwrap();
        assert!(report.triggered());
        assert_eq!(report.dispatched[0].next, Some(now() + Duration::days(1)));

        let pending = engine.list(None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scheduled_at, now() + Duration::days(1));
        assert!(!pending[0].executed);
        assert_eq!(pending[0].frequency, Frequency::Daily);
        assert_eq!(pending[0].action, Action::Command("echo hi".into()));
    }

    #[tokio::test]
    async fn test_hourly_chain_across_two_runs() {
        let (engine, dispatcher) = engine();
        engine
            .register_at(
                "sweep",
                "2026-03-01",
                None,
                Some("echo hi"),
                Frequency::Hourly,
                now(),
            )
            .unwrap();

        let report = engine.run_at(None, now()).await.unwrap();
        assert!(report.triggered());

        // an hour later the successor fires and chains again
        let report = engine
            .run_at(None, now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(report.triggered());
        assert_eq!(dispatcher.calls.lock().unwrap().len(), 2);

        let pending = engine.list(None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scheduled_at, now() + Duration::hours(2));
    }

    #[tokio::test]
    async fn test_dispatch_failure_contained_per_task() {
        let (engine, dispatcher) = engine();
        engine
            .register_at("bad", "2026-03-01", None, Some("boom"), Frequency::Hourly, now())
            .unwrap();
        engine
            .register_at("good", "2026-03-01", None, Some("echo hi"), Frequency::Once, now())
            .unwrap();

        let report = engine.run_at(None, now()).await.unwrap();
        // both were processed despite the failure
        assert_eq!(report.dispatched.len(), 2);
        assert_eq!(dispatcher.calls.lock().unwrap().len(), 2);

        let bad = report
            .dispatched
            .iter()
            .find(|d| d.task.name == "bad")
            .unwrap();
        assert!(bad.result.is_err());
        // still marked executed and rescheduled
        assert!(bad.next.is_some());
        let pending = engine.list(Some("bad")).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scheduled_at, now() + Duration::hours(1));

        // nothing re-fires at the same clock
        let report = engine.run_at(None, now()).await.unwrap();
        assert!(!report.triggered());
    }

    #[tokio::test]
    async fn test_run_honors_name_filter() {
        let (engine, dispatcher) = engine();
        engine
            .register_at("a", "2026-03-01", None, Some("echo a"), Frequency::Once, now())
            .unwrap();
        engine
            .register_at("b", "2026-03-01", None, Some("echo b"), Frequency::Once, now())
            .unwrap();

        let report = engine.run_at(Some("a"), now()).await.unwrap();
        assert_eq!(report.dispatched.len(), 1);
        assert_eq!(dispatcher.calls.lock().unwrap().as_slice(), ["cmd:echo a"]);

        // b is still pending
        let pending = engine.list(None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, "b");
    }

    #[tokio::test]
    async fn test_remove_all_is_idempotent() {
        let (engine, dispatcher) = engine();
        engine
            .register_at("a", "2026-03-01", None, Some("echo a"), Frequency::Daily, now())
            .unwrap();
        engine
            .register_at("b", "2026-03-02", None, Some("echo b"), Frequency::Once, now())
            .unwrap();

        assert_eq!(engine.remove_all().unwrap(), 2);
        assert!(engine.list(None).unwrap().is_empty());
        assert!(engine.list(Some("a")).unwrap().is_empty());
        assert_eq!(engine.remove_all().unwrap(), 0);

        // deleted records never fire
        let report = engine.run_at(None, now()).await.unwrap();
        assert!(!report.triggered());
        assert!(dispatcher.calls.lock().unwrap().is_empty());
    }
}
