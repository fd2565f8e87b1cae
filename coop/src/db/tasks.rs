//! Task and handoff records
//!
//! Timestamps are stored as fixed-width RFC 3339 strings so that text
//! ordering matches time ordering.

use super::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use orchestrator::{Handoff, Store, StoreError, Task, TaskStatus};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let created_at: String = row.get(2)?;
    let status: String = row.get(3)?;

    Ok(Task {
        id: row.get(0)?,
        description: row.get(1)?,
        created_at: parse_timestamp(2, &created_at)?,
        status: status
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
    })
}

impl Database {
    /// Insert a new task row
    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO tasks (id, description, created_at, status) VALUES (?1, ?2, ?3, ?4)",
                params![
                    task.id,
                    task.description,
                    timestamp(&task.created_at),
                    task.status.to_string()
                ],
            )
            .context("Failed to insert task")?;
        Ok(())
    }

    /// Update a task's status. Returns false when no such task exists.
    pub fn set_task_status(&self, id: &str, status: TaskStatus) -> Result<bool> {
        let updated = self
            .conn()
            .execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2",
                params![status.to_string(), id],
            )
            .context("Failed to update task status")?;
        Ok(updated > 0)
    }

    /// Get a task by id
    pub fn task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, description, created_at, status FROM tasks WHERE id = ?1",
        )?;

        let result = stmt.query_row([id], task_from_row);

        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find the single task whose id starts with `prefix`
    ///
    /// Lets the CLI accept the short ids it prints. Errors when the prefix
    /// is ambiguous.
    pub fn task_by_prefix(&self, prefix: &str) -> Result<Option<Task>> {
        if let Some(task) = self.task(prefix)? {
            return Ok(Some(task));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, description, created_at, status FROM tasks
             WHERE substr(id, 1, length(?1)) = ?1
             LIMIT 2",
        )?;
        let mut matches = stmt
            .query_map([prefix], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => anyhow::bail!("Task id prefix '{}' is ambiguous", prefix),
        }
    }

    /// Tasks ordered newest first, optionally limited
    pub fn recent_tasks(&self, limit: Option<usize>) -> Result<Vec<Task>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, description, created_at, status FROM tasks
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;

        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let tasks = stmt
            .query_map([limit], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Append a handoff to a task's history
    pub fn insert_handoff(&self, task_id: &str, handoff: &Handoff) -> Result<()> {
        let data = serde_json::to_string(handoff)?;
        self.conn()
            .execute(
                "INSERT INTO handoffs (task_id, from_role, to_role, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    task_id,
                    handoff.from_role.as_str(),
                    handoff.to_role.as_str(),
                    data,
                    timestamp(&handoff.timestamp)
                ],
            )
            .context("Failed to insert handoff")?;
        Ok(())
    }

    /// A task's handoffs in insertion order
    pub fn handoffs(&self, task_id: &str) -> Result<Vec<Handoff>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT data FROM handoffs WHERE task_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map([task_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.iter()
            .map(|data| {
                serde_json::from_str(data)
                    .with_context(|| format!("Corrupt handoff record for task {}", task_id))
            })
            .collect()
    }

    /// Number of handoffs recorded for a task
    pub fn handoff_count(&self, task_id: &str) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM handoffs WHERE task_id = ?1",
                [task_id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        Ok(count as usize)
    }
}

fn backend(err: anyhow::Error) -> StoreError {
    StoreError::Backend(format!("{:#}", err))
}

impl Store for Database {
    fn create_task(&self, description: &str) -> Result<Task, StoreError> {
        let task = Task::new(description);
        self.insert_task(&task).map_err(backend)?;
        Ok(task)
    }

    fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        match self.set_task_status(task_id, status).map_err(backend)? {
            true => Ok(()),
            false => Err(StoreError::TaskNotFound(task_id.to_string())),
        }
    }

    fn save_handoff(&self, task_id: &str, handoff: &Handoff) -> Result<(), StoreError> {
        if self.task(task_id).map_err(backend)?.is_none() {
            return Err(StoreError::TaskNotFound(task_id.to_string()));
        }
        self.insert_handoff(task_id, handoff).map_err(backend)
    }

    fn load_handoffs(&self, task_id: &str) -> Result<Vec<Handoff>, StoreError> {
        self.handoffs(task_id).map_err(backend)
    }

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        self.task(task_id).map_err(backend)
    }

    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.recent_tasks(None).map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator::{Artifacts, Context as HandoffContext, Metadata, Role};
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_db() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    fn handoff(task_id: &str, from: Role, to: Role) -> Handoff {
        let mut handoff = Handoff::new(
            task_id,
            from,
            to,
            HandoffContext::new("Build a cache"),
            Artifacts::default(),
        );
        handoff.artifacts.code = Some("fn get() {}".to_string());
        handoff.metadata = Metadata {
            tokens_used: 321,
            model: "m".to_string(),
            duration: Duration::from_millis(40),
        };
        handoff
    }

    #[test]
    fn test_task_round_trip() {
        let (db, _dir) = test_db();
        let task = db.create_task("Write a parser").unwrap();

        let loaded = db.get_task(&task.id).unwrap().unwrap();
        assert_eq!(loaded.description, "Write a parser");
        assert_eq!(loaded.status, TaskStatus::Pending);
        assert_eq!(
            loaded.created_at.timestamp_micros(),
            task.created_at.timestamp_micros()
        );

        db.update_task_status(&task.id, TaskStatus::Completed).unwrap();
        let loaded = db.get_task(&task.id).unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Completed);

        assert!(db.get_task("missing").unwrap().is_none());
    }

    #[test]
    fn test_update_missing_task() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.update_task_status("nope", TaskStatus::Failed),
            Err(StoreError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_handoffs_round_trip_in_order() {
        let (db, _dir) = test_db();
        let task = db.create_task("t").unwrap();

        db.save_handoff(&task.id, &handoff(&task.id, Role::Human, Role::Architect))
            .unwrap();
        db.save_handoff(&task.id, &handoff(&task.id, Role::Architect, Role::Implementer))
            .unwrap();

        let handoffs = db.load_handoffs(&task.id).unwrap();
        assert_eq!(handoffs.len(), 2);
        assert_eq!(handoffs[0].to_role, Role::Architect);
        assert_eq!(handoffs[1].from_role, Role::Architect);
        assert_eq!(handoffs[1].context.task_description, "Build a cache");
        assert_eq!(handoffs[1].artifacts.code.as_deref(), Some("fn get() {}"));
        assert_eq!(handoffs[1].metadata.tokens_used, 321);
        assert_eq!(db.handoff_count(&task.id).unwrap(), 2);
    }

    #[test]
    fn test_save_handoff_for_unknown_task() {
        let db = Database::open_in_memory().unwrap();
        let result = db.save_handoff("ghost", &handoff("ghost", Role::Human, Role::Architect));
        assert!(matches!(result, Err(StoreError::TaskNotFound(_))));
    }

    #[test]
    fn test_list_newest_first_with_limit() {
        let db = Database::open_in_memory().unwrap();
        let first = db.create_task("first").unwrap();
        let second = db.create_task("second").unwrap();
        let third = db.create_task("third").unwrap();

        let all = db.list_tasks().unwrap();
        let ids: Vec<&str> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);

        let limited = db.recent_tasks(Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, third.id);
    }

    #[test]
    fn test_task_by_prefix() {
        let db = Database::open_in_memory().unwrap();
        let mut a = Task::new("a");
        a.id = "abc-111".to_string();
        let mut b = Task::new("b");
        b.id = "abd-222".to_string();
        db.insert_task(&a).unwrap();
        db.insert_task(&b).unwrap();

        assert_eq!(db.task_by_prefix("abc").unwrap().unwrap().id, "abc-111");
        assert_eq!(db.task_by_prefix("abd-222").unwrap().unwrap().id, "abd-222");
        assert!(db.task_by_prefix("zzz").unwrap().is_none());
        assert!(db.task_by_prefix("ab").is_err());
    }
}
