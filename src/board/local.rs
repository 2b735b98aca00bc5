//! In-process adapter that persists straight into a [`Database`].
//!
//! Store calls are blocking SQLite work, so each one runs on the blocking pool.

use super::api::{BoardApi, TransportError, TransportResult};
use crate::db::Database;
use crate::types::{
    Column, ColumnUpdate, NewColumn, NewTask, ReorderColumnEntry, ReorderTaskEntry, Task,
    TaskUpdate,
};
use async_trait::async_trait;

async fn blocking<T, F>(db: &Database, f: F) -> TransportResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| TransportError::Store(e.to_string()))?
        .map_err(TransportError::from)
}

#[async_trait]
impl BoardApi for Database {
    async fn list_columns(&self) -> TransportResult<Vec<Column>> {
        blocking(self, |db| db.list_columns()).await
    }

    async fn create_column(&self, column: &NewColumn) -> TransportResult<Column> {
        let column = column.clone();
        blocking(self, move |db| {
            db.create_column(column.title.as_deref(), column.color.as_deref())
        })
        .await
    }

    async fn update_column(&self, id: i64, update: &ColumnUpdate) -> TransportResult<Column> {
        let update = update.clone();
        blocking(self, move |db| {
            db.update_column(id, update.title.as_deref(), update.color.as_deref())
        })
        .await
    }

    async fn reorder_columns(&self, order: &[ReorderColumnEntry]) -> TransportResult<Vec<Column>> {
        let order = order.to_vec();
        blocking(self, move |db| db.reorder_columns(&order)).await
    }

    async fn delete_column(&self, id: i64) -> TransportResult<()> {
        blocking(self, move |db| db.delete_column(id)).await
    }

    async fn list_tasks(&self) -> TransportResult<Vec<Task>> {
        blocking(self, |db| db.list_tasks()).await
    }

    async fn create_task(&self, task: &NewTask) -> TransportResult<Task> {
        let task = task.clone();
        blocking(self, move |db| db.create_task(task.title.as_deref(), task.column_id)).await
    }

    async fn update_task(&self, id: i64, update: &TaskUpdate) -> TransportResult<Task> {
        let update = update.clone();
        blocking(self, move |db| {
            db.update_task(id, update.title.as_deref(), update.column_id)
        })
        .await
    }

    async fn reorder_tasks(&self, order: &[ReorderTaskEntry]) -> TransportResult<Vec<Task>> {
        let order = order.to_vec();
        blocking(self, move |db| db.reorder_tasks(&order)).await
    }

    async fn delete_task(&self, id: i64) -> TransportResult<()> {
        blocking(self, move |db| db.delete_task(id)).await
    }
}
