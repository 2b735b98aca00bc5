//! Persistence seam between the board session and the ordering store.

use crate::error::ApiError;
use crate::types::{
    Column, ColumnUpdate, NewColumn, NewTask, ReorderColumnEntry, ReorderTaskEntry, Task,
    TaskUpdate,
};
use async_trait::async_trait;
use thiserror::Error;

/// Failure talking to the ordering store.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for TransportError {
    fn from(err: anyhow::Error) -> Self {
        let api_err = ApiError::from(err);
        TransportError::Status {
            status: api_err.status().as_u16(),
            message: api_err.message,
        }
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Operations the board session persists through.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn list_columns(&self) -> TransportResult<Vec<Column>>;

    async fn create_column(&self, column: &NewColumn) -> TransportResult<Column>;

    async fn update_column(&self, id: i64, update: &ColumnUpdate) -> TransportResult<Column>;

    async fn reorder_columns(&self, order: &[ReorderColumnEntry]) -> TransportResult<Vec<Column>>;

    async fn delete_column(&self, id: i64) -> TransportResult<()>;

    async fn list_tasks(&self) -> TransportResult<Vec<Task>>;

    async fn create_task(&self, task: &NewTask) -> TransportResult<Task>;

    async fn update_task(&self, id: i64, update: &TaskUpdate) -> TransportResult<Task>;

    async fn reorder_tasks(&self, order: &[ReorderTaskEntry]) -> TransportResult<Vec<Task>>;

    async fn delete_task(&self, id: i64) -> TransportResult<()>;
}
