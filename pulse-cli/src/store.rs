//! SQLite persistence for tasks, the event log, and day plans.
//!
//! One database under the pulse home, shared by every `pulse` process. SQLite's own
//! locking serializes writers; a day transition holds `BEGIN IMMEDIATE` from load to
//! save so two processes never interleave on the same plan.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use pulse_core::{DayEvent, DayStore, EventKind, Plan, Task, TaskPatch, TaskStatus};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::warn;

/// How long a writer waits on another process before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(flatten)]
    pub task: Task,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new task. Status always starts as `todo`.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub notes: String,
    pub priority: i32,
    pub estimate_min: i32,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    /// Serializes this process's write transactions on the shared connection.
    writer: Mutex<()>,
}

/// Open write transaction for one day; commits on drop.
pub struct DayTxn<'a> {
    store: &'a SqliteStore,
    _writer: MutexGuard<'a, ()>,
}

impl Drop for DayTxn<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.conn().execute_batch("COMMIT") {
            warn!(error = %e, "commit of day transaction failed");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Fixed-width UTC text, so string order is time order.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("bad timestamp {s:?}"))?
        .with_timezone(&Utc))
}

struct TaskRow {
    id: i64,
    title: String,
    notes: String,
    priority: i32,
    estimate_min: i32,
    status: String,
    due_at: Option<String>,
    created_at: String,
    updated_at: String,
}

const TASK_COLUMNS: &str =
    "id, title, notes, priority, estimate_min, status, due_at, created_at, updated_at";

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            notes: row.get(2)?,
            priority: row.get(3)?,
            estimate_min: row.get(4)?,
            status: row.get(5)?,
            due_at: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<TaskRecord> {
        let status: TaskStatus = self
            .status
            .parse()
            .map_err(|e: String| anyhow!("task #{}: {e}", self.id))?;
        Ok(TaskRecord {
            task: Task {
                id: self.id,
                title: self.title,
                notes: self.notes,
                priority: self.priority,
                estimate_min: self.estimate_min,
                status,
                due_at: self.due_at.as_deref().map(parse_ts).transpose()?,
            },
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            conn: Mutex::new(conn),
            writer: Mutex::new(()),
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        lock(&self.conn)
    }

    fn migrate(&self) -> Result<()> {
        self.conn()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    title        TEXT NOT NULL,
                    notes        TEXT NOT NULL DEFAULT '',
                    priority     INTEGER NOT NULL,
                    estimate_min INTEGER NOT NULL,
                    status       TEXT NOT NULL DEFAULT 'todo',
                    due_at       TEXT,
                    created_at   TEXT NOT NULL,
                    updated_at   TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS events (
                    id      INTEGER PRIMARY KEY AUTOINCREMENT,
                    kind    TEXT NOT NULL,
                    task_id INTEGER REFERENCES tasks(id),
                    meta    TEXT NOT NULL DEFAULT '',
                    at      TEXT NOT NULL
                );

                -- One plan per day.
                CREATE TABLE IF NOT EXISTS day_plans (
                    date       TEXT PRIMARY KEY,
                    plan       TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_events_at ON events(at);
                CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);",
            )
            .context("migrate database")
    }

    pub fn add_task(&self, new: NewTask) -> Result<Task> {
        let mut task = Task {
            id: 0,
            title: new.title,
            notes: new.notes,
            priority: new.priority,
            estimate_min: new.estimate_min,
            status: TaskStatus::Todo,
            due_at: None,
        };
        if let Err(e) = task.validate() {
            bail!("invalid task: {e}");
        }

        let _writer = lock(&self.writer);
        let conn = self.conn();
        let now = ts(Utc::now());
        conn.execute(
            "INSERT INTO tasks (title, notes, priority, estimate_min, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                task.title,
                task.notes,
                task.priority,
                task.estimate_min,
                task.status.as_str(),
                now
            ],
        )
        .context("insert task")?;
        task.id = conn.last_insert_rowid();
        Ok(task)
    }

    pub fn patch_task(&self, id: i64, patch: &TaskPatch) -> Result<Task> {
        let _writer = lock(&self.writer);
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let row = tx
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                TaskRow::from_row,
            )
            .optional()?;
        let Some(row) = row else {
            bail!("task #{id} not found");
        };
        let task = patch
            .apply(&row.into_record()?.task)
            .map_err(|e| anyhow!("invalid update for task #{id}: {e}"))?;

        tx.execute(
            "UPDATE tasks
             SET title = ?2, notes = ?3, priority = ?4, estimate_min = ?5, status = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                id,
                task.title,
                task.notes,
                task.priority,
                task.estimate_min,
                task.status.as_str(),
                ts(Utc::now())
            ],
        )?;
        tx.commit()?;
        Ok(task)
    }

    /// Newest first, optionally filtered by status.
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<TaskRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE ?1 IS NULL OR status = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt
            .query_map(params![status.map(TaskStatus::as_str)], TaskRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(TaskRow::into_record).collect()
    }

    pub fn log_event(&self, kind: &str, task_id: Option<i64>, meta: &str) -> Result<DayEvent> {
        let _writer = lock(&self.writer);
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(id) = task_id {
            let known: bool =
                tx.query_row("SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)", params![id], |r| r.get(0))?;
            if !known {
                bail!("task #{id} not found");
            }
        }
        let event = DayEvent {
            kind: EventKind::from(kind),
            task_id,
            meta: meta.to_string(),
            at: Utc::now(),
        };
        tx.execute(
            "INSERT INTO events (kind, task_id, meta, at) VALUES (?1, ?2, ?3, ?4)",
            params![event.kind.as_str(), event.task_id, event.meta, ts(event.at)],
        )?;
        tx.commit()?;
        Ok(event)
    }
}

impl DayStore for SqliteStore {
    type DayLock<'a> = DayTxn<'a>;

    fn lock_day(&self, _day: NaiveDate) -> Result<DayTxn<'_>> {
        let writer = lock(&self.writer);
        self.conn()
            .execute_batch("BEGIN IMMEDIATE")
            .context("begin day transaction")?;
        Ok(DayTxn {
            store: self,
            _writer: writer,
        })
    }

    fn tasks(&self) -> Result<Vec<Task>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id"))?;
        let rows = stmt
            .query_map([], TaskRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|r| r.into_record().map(|rec| rec.task))
            .collect()
    }

    fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<DayEvent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT kind, task_id, meta, at FROM events WHERE at >= ?1 ORDER BY at, id",
        )?;
        let rows = stmt
            .query_map(params![ts(since)], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, Option<i64>>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(kind, task_id, meta, at)| {
                Ok(DayEvent {
                    kind: EventKind::from(kind.as_str()),
                    task_id,
                    meta,
                    at: parse_ts(&at)?,
                })
            })
            .collect()
    }

    fn load_plan(&self, day: NaiveDate) -> Result<Option<Plan>> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT plan FROM day_plans WHERE date = ?1",
                params![day.to_string()],
                |r| r.get(0),
            )
            .optional()?;
        json.map(|s| serde_json::from_str(&s).with_context(|| format!("parse plan for {day}")))
            .transpose()
    }

    fn save_plan(&self, plan: &Plan) -> Result<()> {
        let json = serde_json::to_string(plan)?;
        self.conn()
            .execute(
                "INSERT INTO day_plans (date, plan, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(date) DO UPDATE SET plan = excluded.plan, updated_at = excluded.updated_at",
                params![plan.date.to_string(), json, ts(Utc::now())],
            )
            .context("save plan")?;
        Ok(())
    }
}
