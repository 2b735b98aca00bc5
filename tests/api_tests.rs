//! End-to-end tests for the REST API and the board session.
//!
//! Each test starts the server on an ephemeral port backed by an in-memory
//! database and talks to it through the HTTP adapter.

use kanban_board::api::start_server;
use kanban_board::board::{
    BoardApi, BoardSession, DragEnd, HttpBoardApi, TransportError,
};
use kanban_board::db::Database;
use kanban_board::types::{ColumnUpdate, NewColumn, NewTask, ReorderColumnEntry, TaskUpdate};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;

struct TestServer {
    db: Arc<Database>,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let db = Arc::new(Database::open_in_memory().expect("Failed to create database"));
        let (shutdown, addr) = start_server(Arc::clone(&db), "127.0.0.1:0".parse().unwrap())
            .await
            .expect("Failed to start server");
        Self {
            db,
            addr,
            shutdown: Some(shutdown),
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn api(&self) -> HttpBoardApi {
        HttpBoardApi::new(self.url())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn status_of(err: TransportError) -> (u16, String) {
    match err {
        TransportError::Status { status, message } => (status, message),
        other => panic!("expected a status error, got {:?}", other),
    }
}

#[tokio::test]
async fn health_check_reports_ok() {
    let server = TestServer::start().await;

    let body: serde_json::Value = reqwest::get(format!("{}/api", server.url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn columns_crud_over_http() {
    let server = TestServer::start().await;
    let api = server.api();

    let columns = api.list_columns().await.unwrap();
    assert_eq!(columns.len(), 3);

    let created = api
        .create_column(&NewColumn {
            title: Some("Review".to_string()),
            color: None,
        })
        .await
        .unwrap();
    assert_eq!(created.slug, "review");
    assert_eq!(created.ord, 4);

    let updated = api
        .update_column(
            created.id,
            &ColumnUpdate {
                title: None,
                color: Some("#112233".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.color, "#112233");

    api.delete_column(created.id).await.unwrap();
    assert!(server.db.get_column(created.id).unwrap().is_none());
}

#[tokio::test]
async fn create_returns_201_and_delete_returns_204() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/tasks", server.url()))
        .json(&serde_json::json!({ "title": "Buy milk" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let task: serde_json::Value = response.json().await.unwrap();
    assert_eq!(task["column_slug"], "todo");

    let response = client
        .delete(format!("{}/api/tasks/{}", server.url(), task["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);
}

#[tokio::test]
async fn validation_errors_are_400_with_message() {
    let server = TestServer::start().await;
    let api = server.api();

    let err = api
        .create_column(&NewColumn {
            title: Some("Doing".to_string()),
            color: None,
        })
        .await
        .unwrap_err();
    let (status, message) = status_of(err);
    assert_eq!(status, 400);
    assert!(message.contains("already exists"));

    let err = api.create_task(&NewTask::default()).await.unwrap_err();
    assert_eq!(status_of(err).0, 400);

    let todo = api.list_columns().await.unwrap()[0].id;
    let err = api.delete_column(todo).await.unwrap_err();
    assert_eq!(status_of(err).0, 400);
}

#[tokio::test]
async fn malformed_bodies_are_400_with_message() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let cases = [
        (
            client.put(format!("{}/api/reorderTasks", server.url())),
            serde_json::json!([{ "id": 1, "ord": 1 }]),
            "column_id",
        ),
        (
            client.post(format!("{}/api/columns", server.url())),
            serde_json::json!({ "title": 5 }),
            "invalid type",
        ),
    ];

    for (request, body, expected) in cases {
        let response = request.json(&body).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let error: serde_json::Value = response.json().await.unwrap();
        assert_eq!(error["code"], "INVALID_FIELD_VALUE");
        let message = error["message"].as_str().unwrap();
        assert!(message.contains(expected), "unexpected message: {}", message);
    }

    // Nothing was written.
    assert_eq!(server.db.list_columns().unwrap().len(), 3);
}

#[tokio::test]
async fn unknown_ids_are_404() {
    let server = TestServer::start().await;
    let api = server.api();

    let err = api.delete_task(999).await.unwrap_err();
    let (status, message) = status_of(err);
    assert_eq!(status, 404);
    assert_eq!(message, "Task not found: 999");

    let err = api
        .update_task(
            999,
            &TaskUpdate {
                title: Some("x".to_string()),
                column_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(status_of(err).0, 404);

    let err = api.delete_column(999).await.unwrap_err();
    assert_eq!(status_of(err).0, 404);

    let err = api
        .reorder_columns(&[ReorderColumnEntry { id: 999, ord: 1 }])
        .await
        .unwrap_err();
    assert_eq!(status_of(err).0, 404);
}

#[tokio::test]
async fn unreachable_server_is_a_request_error() {
    // Bind then drop a listener so the port is very likely closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = BoardSession::new(HttpBoardApi::new(format!("http://{}", addr)));
    let err = session.load().await.unwrap_err();
    assert!(matches!(err, TransportError::Request(_)));
    assert_eq!(
        session.error().as_deref(),
        Some("Could not connect to the server.")
    );
}

#[tokio::test]
async fn session_drag_is_persisted_and_survives_reload() {
    let server = TestServer::start().await;
    let todo = server.db.list_columns().unwrap()[0].id;
    let doing = server.db.list_columns().unwrap()[1].id;
    for title in ["A", "B", "C"] {
        server.db.create_task(Some(title), Some(todo)).unwrap();
    }

    let session = BoardSession::new(server.api());
    session.load().await.unwrap();

    // Move "B" (index 1 of To Do) to the top of Doing.
    let pending = session
        .on_drag_end(&DragEnd::task(todo, 1, doing, 0))
        .expect("drag should sync");
    pending.settled().await;
    assert_eq!(session.error(), None);

    let titles = |column: i64| -> Vec<(String, i64)> {
        server
            .db
            .list_tasks()
            .unwrap()
            .into_iter()
            .filter(|t| t.column_id == column)
            .map(|t| (t.title, t.ord))
            .collect()
    };
    assert_eq!(titles(todo), vec![("A".to_string(), 1), ("C".to_string(), 2)]);
    assert_eq!(titles(doing), vec![("B".to_string(), 1)]);

    // A fresh session sees the same board.
    let fresh = BoardSession::new(server.api());
    fresh.load().await.unwrap();
    let doing_tasks = fresh.column_tasks(doing);
    assert_eq!(doing_tasks.len(), 1);
    assert_eq!(doing_tasks[0].title, "B");
    assert_eq!(doing_tasks[0].color.as_deref(), Some("#fff8e6"));
}

#[tokio::test]
async fn session_column_drag_is_persisted() {
    let server = TestServer::start().await;

    let session = BoardSession::new(server.api());
    session.load().await.unwrap();

    session
        .on_drag_end(&DragEnd::column(2, 0))
        .expect("drag should sync")
        .settled()
        .await;
    assert_eq!(session.error(), None);

    let slugs: Vec<String> = server
        .db
        .list_columns()
        .unwrap()
        .into_iter()
        .map(|c| c.slug)
        .collect();
    assert_eq!(slugs, vec!["done", "todo", "doing"]);
}

#[tokio::test]
async fn session_against_local_database() {
    let db = Database::open_in_memory().unwrap();
    let session = BoardSession::new(db.clone());
    session.load().await.unwrap();

    let todo = session.columns()[0].id;
    let placeholder = session.add_task(todo).expect("placeholder");
    assert!(session.edit_task_title(placeholder, "Buy milk"));
    session
        .commit_task(placeholder)
        .expect("create should sync")
        .settled()
        .await;

    let tasks = db.list_tasks().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Buy milk");
    assert!(session.tasks().iter().all(|t| t.id > 0));
}

#[tokio::test]
async fn dragged_new_task_keeps_its_position_after_save() {
    let db = Database::open_in_memory().unwrap();
    let todo = db.list_columns().unwrap()[0].id;
    db.create_task(Some("A"), Some(todo)).unwrap();

    let session = BoardSession::new(db.clone());
    session.load().await.unwrap();

    let placeholder = session.add_task(todo).expect("placeholder");
    session.edit_task_title(placeholder, "B");
    if let Some(pending) = session.on_drag_end(&DragEnd::task(todo, 1, todo, 0)) {
        pending.settled().await;
    }
    session
        .commit_task(placeholder)
        .expect("create should sync")
        .settled()
        .await;
    assert_eq!(session.error(), None);

    let lane = |tasks: Vec<kanban_board::types::Task>| -> Vec<(String, i64)> {
        tasks
            .into_iter()
            .filter(|t| t.column_id == todo)
            .map(|t| (t.title, t.ord))
            .collect()
    };
    let expected = vec![("B".to_string(), 1), ("A".to_string(), 2)];
    assert_eq!(lane(session.tasks()), expected);

    session.load().await.unwrap();
    assert_eq!(lane(session.tasks()), expected);
    assert_eq!(lane(db.list_tasks().unwrap()), expected);
}

#[tokio::test]
async fn column_renamed_while_saving_is_stored_with_new_title() {
    let server = TestServer::start().await;
    let session = BoardSession::new(server.api());
    session.load().await.unwrap();

    let pending = session.add_column("Review", None).expect("create should sync");
    let placeholder = session.columns().pop().unwrap().id;
    session.edit_column_title(placeholder, "QA");
    assert!(session.commit_column(placeholder).is_none());
    pending.settled().await;
    assert_eq!(session.error(), None);

    let stored = server.db.list_columns().unwrap().pop().unwrap();
    assert_eq!(stored.title, "QA");
    assert_eq!(stored.slug, "review");
}
