//! Task CRUD and bulk reorder/move.

use super::columns::get_column_internal;
use super::{Database, now_ms};
use crate::error::ApiError;
use crate::types::{DEFAULT_TASK_COLUMN, ReorderTaskEntry, Task, validate_task_title};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

const TASK_SELECT: &str = "SELECT t.id, t.title, t.column_id, t.ord,
        c.slug AS column_slug, c.title AS column_title, c.color AS color
     FROM tasks t
     JOIN columns c ON c.id = t.column_id";

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        column_id: row.get("column_id")?,
        ord: row.get("ord")?,
        column_slug: row.get("column_slug")?,
        column_title: row.get("column_title")?,
        color: row.get("color")?,
    })
}

fn list_tasks_internal(conn: &Connection) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY c.ord, t.ord, t.id", TASK_SELECT))?;
    let tasks = stmt
        .query_map([], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn get_task_internal(conn: &Connection, id: i64) -> Result<Option<Task>> {
    let result = conn.query_row(
        &format!("{} WHERE t.id = ?1", TASK_SELECT),
        params![id],
        parse_task_row,
    );

    match result {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn next_task_ord(conn: &Connection, column_id: i64) -> Result<i64> {
    let ord = conn.query_row(
        "SELECT COALESCE(MAX(ord), 0) + 1 FROM tasks WHERE column_id = ?1",
        params![column_id],
        |row| row.get(0),
    )?;
    Ok(ord)
}

/// Renumber a column's tasks as 1..N, keeping their current (ord, id) order.
fn resequence_column(conn: &Connection, column_id: i64) -> Result<()> {
    let mut select = conn.prepare("SELECT id FROM tasks WHERE column_id = ?1 ORDER BY ord, id")?;
    let ids = select
        .query_map(params![column_id], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut update = conn.prepare("UPDATE tasks SET ord = ?1 WHERE id = ?2 AND ord != ?1")?;
    for (position, id) in ids.iter().enumerate() {
        update.execute(params![position as i64 + 1, id])?;
    }
    Ok(())
}

/// Resolve the target column for a new task, defaulting to the `todo` column.
fn resolve_column(conn: &Connection, column_id: Option<i64>) -> Result<i64> {
    match column_id {
        Some(id) => {
            get_column_internal(conn, id)?.ok_or_else(|| {
                ApiError::invalid_value("column_id", format!("Column not found: {}", id))
            })?;
            Ok(id)
        }
        None => {
            let result = conn.query_row(
                "SELECT id FROM columns WHERE slug = ?1",
                params![DEFAULT_TASK_COLUMN],
                |row| row.get(0),
            );
            match result {
                Ok(id) => Ok(id),
                Err(rusqlite::Error::QueryReturnedNoRows) => Err(ApiError::invalid_value(
                    "column_id",
                    "no column given and the default column is missing",
                )
                .into()),
                Err(e) => Err(e.into()),
            }
        }
    }
}

impl Database {
    /// List all tasks joined with their column, ordered by (column ord, task ord).
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(list_tasks_internal)
    }

    /// Get a task by id.
    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, id))
    }

    /// Create a task at the bottom of its column.
    pub fn create_task(&self, title: Option<&str>, column_id: Option<i64>) -> Result<Task> {
        let title = validate_task_title(title)?;
        let now = now_ms();

        let task = self.in_transaction(|tx| {
            let column_id = resolve_column(tx, column_id)?;
            let ord = next_task_ord(tx, column_id)?;

            tx.execute(
                "INSERT INTO tasks (title, column_id, ord, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![&title, column_id, ord, now, now],
            )?;
            let id = tx.last_insert_rowid();

            let task = get_task_internal(tx, id)?.ok_or_else(|| ApiError::task_not_found(id))?;
            Ok(task)
        })?;

        info!(task_id = task.id, column_id = task.column_id, ord = task.ord, "Created task");
        Ok(task)
    }

    /// Update a task's title and/or owning column.
    ///
    /// Moving to another column appends the task there and closes the gap
    /// it leaves behind.
    pub fn update_task(&self, id: i64, title: Option<&str>, column_id: Option<i64>) -> Result<Task> {
        let title = title.map(|t| validate_task_title(Some(t))).transpose()?;

        self.in_transaction(|tx| {
            let now = now_ms();

            let current = get_task_internal(tx, id)?.ok_or_else(|| ApiError::task_not_found(id))?;

            if let Some(title) = &title {
                tx.execute(
                    "UPDATE tasks SET title = ?1, updated_at = ?2 WHERE id = ?3",
                    params![title, now, id],
                )?;
            }

            if let Some(target) = column_id.filter(|c| *c != current.column_id) {
                let target = resolve_column(tx, Some(target))?;
                let ord = next_task_ord(tx, target)?;
                tx.execute(
                    "UPDATE tasks SET column_id = ?1, ord = ?2, updated_at = ?3 WHERE id = ?4",
                    params![target, ord, now, id],
                )?;
                resequence_column(tx, current.column_id)?;
                debug!(task_id = id, from = current.column_id, to = target, "Moved task");
            }

            let task = get_task_internal(tx, id)?.ok_or_else(|| ApiError::task_not_found(id))?;
            Ok(task)
        })
    }

    /// Apply a batch of (id, column, ord) placements in one transaction.
    ///
    /// Every column touched by the batch is re-sequenced afterwards so
    /// per-column ords stay dense from 1.
    pub fn reorder_tasks(&self, entries: &[ReorderTaskEntry]) -> Result<Vec<Task>> {
        let mut seen = HashSet::new();
        for entry in entries {
            if entry.id <= 0 {
                return Err(ApiError::invalid_value(
                    "id",
                    format!("unsaved task id {} cannot be reordered", entry.id),
                )
                .into());
            }
            if !seen.insert(entry.id) {
                return Err(ApiError::invalid_value(
                    "id",
                    format!("task {} listed more than once", entry.id),
                )
                .into());
            }
        }

        let tasks = self.in_transaction(|tx| {
            let now = now_ms();
            let mut touched = BTreeSet::new();

            for entry in entries {
                let current = get_task_internal(tx, entry.id)?
                    .ok_or_else(|| ApiError::task_not_found(entry.id))?;
                if entry.column_id != current.column_id {
                    resolve_column(tx, Some(entry.column_id))?;
                }

                tx.execute(
                    "UPDATE tasks SET column_id = ?1, ord = ?2, updated_at = ?3 WHERE id = ?4",
                    params![entry.column_id, entry.ord, now, entry.id],
                )?;
                touched.insert(current.column_id);
                touched.insert(entry.column_id);
            }

            for column_id in &touched {
                resequence_column(tx, *column_id)?;
            }

            let tasks = list_tasks_internal(tx)?;
            Ok(tasks)
        })?;

        info!(count = entries.len(), "Reordered tasks");
        Ok(tasks)
    }

    /// Delete a task and close the gap in its column.
    pub fn delete_task(&self, id: i64) -> Result<()> {
        self.in_transaction(|tx| {
            let task = get_task_internal(tx, id)?.ok_or_else(|| ApiError::task_not_found(id))?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            resequence_column(tx, task.column_id)?;

            info!(task_id = id, column_id = task.column_id, "Deleted task");
            Ok(())
        })
    }
}
