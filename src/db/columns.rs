//! Column CRUD and bulk reordering.

use super::{Database, now_ms};
use crate::error::ApiError;
use crate::types::{
    Column, DEFAULT_COLUMN_COLOR, ReorderColumnEntry, is_protected_slug, slugify,
    title_conflicts, validate_color, validate_column_title,
};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use std::collections::HashSet;
use tracing::{debug, info};

pub fn parse_column_row(row: &Row) -> rusqlite::Result<Column> {
    Ok(Column {
        id: row.get("id")?,
        title: row.get("title")?,
        slug: row.get("slug")?,
        color: row.get("color")?,
        ord: row.get("ord")?,
    })
}

pub(crate) fn list_columns_internal(conn: &Connection) -> Result<Vec<Column>> {
    let mut stmt =
        conn.prepare("SELECT id, title, slug, color, ord FROM columns ORDER BY ord, id")?;
    let columns = stmt
        .query_map([], parse_column_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

pub(crate) fn get_column_internal(conn: &Connection, id: i64) -> Result<Option<Column>> {
    let result = conn.query_row(
        "SELECT id, title, slug, color, ord FROM columns WHERE id = ?1",
        params![id],
        parse_column_row,
    );

    match result {
        Ok(column) => Ok(Some(column)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Rewrite column ords as 1..N in the given order.
fn write_column_order(conn: &Connection, ids: &[i64]) -> Result<()> {
    let now = now_ms();
    let mut stmt = conn.prepare("UPDATE columns SET ord = ?1, updated_at = ?2 WHERE id = ?3")?;
    for (position, id) in ids.iter().enumerate() {
        stmt.execute(params![position as i64 + 1, now, id])?;
    }
    Ok(())
}

impl Database {
    /// List all columns ordered by `ord`.
    pub fn list_columns(&self) -> Result<Vec<Column>> {
        self.with_conn(list_columns_internal)
    }

    /// Get a column by id.
    pub fn get_column(&self, id: i64) -> Result<Option<Column>> {
        self.with_conn(|conn| get_column_internal(conn, id))
    }

    /// Create a column at the end of the board.
    pub fn create_column(&self, title: Option<&str>, color: Option<&str>) -> Result<Column> {
        let title = validate_column_title(title)?;
        let color = color.unwrap_or(DEFAULT_COLUMN_COLOR);
        validate_color(color)?;
        let slug = slugify(&title);
        let now = now_ms();

        let column = self.in_transaction(|tx| {
            let existing = list_columns_internal(tx)?;
            if title_conflicts(&existing, &title, None) {
                return Err(ApiError::title_taken(&title).into());
            }

            let ord: i64 =
                tx.query_row("SELECT COALESCE(MAX(ord), 0) + 1 FROM columns", [], |row| {
                    row.get(0)
                })?;

            tx.execute(
                "INSERT INTO columns (title, slug, color, ord, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![&title, &slug, color, ord, now, now],
            )?;
            let id = tx.last_insert_rowid();

            Ok(Column {
                id,
                title,
                slug,
                color: color.to_string(),
                ord,
            })
        })?;

        info!(column_id = column.id, slug = %column.slug, ord = column.ord, "Created column");
        Ok(column)
    }

    /// Update a column's title and/or color. The slug is left unchanged.
    pub fn update_column(
        &self,
        id: i64,
        title: Option<&str>,
        color: Option<&str>,
    ) -> Result<Column> {
        let title = title.map(|t| validate_column_title(Some(t))).transpose()?;
        if let Some(color) = color {
            validate_color(color)?;
        }

        self.in_transaction(|tx| {
            let mut column =
                get_column_internal(tx, id)?.ok_or_else(|| ApiError::column_not_found(id))?;

            if let Some(title) = title {
                let existing = list_columns_internal(tx)?;
                if title_conflicts(&existing, &title, Some(id)) {
                    return Err(ApiError::title_taken(&title).into());
                }
                column.title = title;
            }
            if let Some(color) = color {
                column.color = color.to_string();
            }

            tx.execute(
                "UPDATE columns SET title = ?1, color = ?2, updated_at = ?3 WHERE id = ?4",
                params![&column.title, &column.color, now_ms(), id],
            )?;
            debug!(column_id = id, "Updated column");
            Ok(column)
        })
    }

    /// Reorder columns in one transaction.
    ///
    /// Listed columns take ords 1..k in list order; columns missing from the
    /// list follow in their previous relative order.
    pub fn reorder_columns(&self, entries: &[ReorderColumnEntry]) -> Result<Vec<Column>> {
        let mut seen = HashSet::new();
        for entry in entries {
            if entry.id <= 0 {
                return Err(ApiError::invalid_value(
                    "id",
                    format!("unsaved column id {} cannot be reordered", entry.id),
                )
                .into());
            }
            if !seen.insert(entry.id) {
                return Err(ApiError::invalid_value(
                    "id",
                    format!("column {} listed more than once", entry.id),
                )
                .into());
            }
        }

        let columns = self.in_transaction(|tx| {
            let current = list_columns_internal(tx)?;
            let known: HashSet<i64> = current.iter().map(|c| c.id).collect();
            if let Some(missing) = entries.iter().find(|e| !known.contains(&e.id)) {
                return Err(ApiError::column_not_found(missing.id).into());
            }

            let order: Vec<i64> = entries
                .iter()
                .map(|e| e.id)
                .chain(current.iter().map(|c| c.id).filter(|id| !seen.contains(id)))
                .collect();
            write_column_order(tx, &order)?;

            let columns = list_columns_internal(tx)?;
            Ok(columns)
        })?;

        info!(count = entries.len(), "Reordered columns");
        Ok(columns)
    }

    /// Delete a column and, by cascade, its tasks. Default columns are refused.
    pub fn delete_column(&self, id: i64) -> Result<()> {
        self.in_transaction(|tx| {
            let column =
                get_column_internal(tx, id)?.ok_or_else(|| ApiError::column_not_found(id))?;
            if is_protected_slug(&column.slug) {
                return Err(ApiError::protected_column(&column.slug).into());
            }

            let removed_tasks =
                tx.execute("DELETE FROM tasks WHERE column_id = ?1", params![id])?;
            tx.execute("DELETE FROM columns WHERE id = ?1", params![id])?;

            let remaining: Vec<i64> = list_columns_internal(tx)?.iter().map(|c| c.id).collect();
            write_column_order(tx, &remaining)?;

            info!(column_id = id, removed_tasks, "Deleted column");
            Ok(())
        })
    }
}
