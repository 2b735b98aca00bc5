//! HTTP transport adapter: a thin JSON wrapper over the board REST API.

use super::api::{BoardApi, TransportError, TransportResult};
use crate::types::{
    Column, ColumnUpdate, NewColumn, NewTask, ReorderColumnEntry, ReorderTaskEntry, Task,
    TaskUpdate,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Error body shape returned by the API.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Board API client over HTTP.
#[derive(Clone)]
pub struct HttpBoardApi {
    client: Client,
    base_url: String,
}

impl HttpBoardApi {
    /// Create a client rooted at `base_url` (e.g. `http://127.0.0.1:3000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and reject non-2xx responses with the server's message.
    async fn send(&self, request: RequestBuilder) -> TransportResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "Board API response");

        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or_else(|_| {
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    text
                }
            });

        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> TransportResult<T> {
        let bytes = self.send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn list_columns(&self) -> TransportResult<Vec<Column>> {
        self.json(self.client.get(self.url("/api/columns"))).await
    }

    async fn create_column(&self, column: &NewColumn) -> TransportResult<Column> {
        self.json(self.client.post(self.url("/api/columns")).json(column))
            .await
    }

    async fn update_column(&self, id: i64, update: &ColumnUpdate) -> TransportResult<Column> {
        self.json(
            self.client
                .put(self.url(&format!("/api/columns/{}", id)))
                .json(update),
        )
        .await
    }

    async fn reorder_columns(&self, order: &[ReorderColumnEntry]) -> TransportResult<Vec<Column>> {
        self.json(self.client.put(self.url("/api/reorderColumns")).json(order))
            .await
    }

    async fn delete_column(&self, id: i64) -> TransportResult<()> {
        self.send(self.client.delete(self.url(&format!("/api/columns/{}", id))))
            .await?;
        Ok(())
    }

    async fn list_tasks(&self) -> TransportResult<Vec<Task>> {
        self.json(self.client.get(self.url("/api/tasks"))).await
    }

    async fn create_task(&self, task: &NewTask) -> TransportResult<Task> {
        self.json(self.client.post(self.url("/api/tasks")).json(task))
            .await
    }

    async fn update_task(&self, id: i64, update: &TaskUpdate) -> TransportResult<Task> {
        self.json(
            self.client
                .put(self.url(&format!("/api/tasks/{}", id)))
                .json(update),
        )
        .await
    }

    async fn reorder_tasks(&self, order: &[ReorderTaskEntry]) -> TransportResult<Vec<Task>> {
        self.json(self.client.put(self.url("/api/reorderTasks")).json(order))
            .await
    }

    async fn delete_task(&self, id: i64) -> TransportResult<()> {
        self.send(self.client.delete(self.url(&format!("/api/tasks/{}", id))))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let api = HttpBoardApi::new("http://localhost:3000/");
        assert_eq!(api.base_url(), "http://localhost:3000");
        assert_eq!(api.url("/api/tasks"), "http://localhost:3000/api/tasks");
    }
}
