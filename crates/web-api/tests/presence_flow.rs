use std::{num::NonZeroUsize, sync::Arc};

use application::{
    MessageRepository, PresenceService, PresenceServiceDependencies, PresenceSettings,
    SystemClock,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use domain::{ChatMessage, DisplayName, MessageTime, RepositoryError, StoredMessage};
use infrastructure::{InMemoryParticipantRepository, MemoryStorage};
use serde_json::{json, Value};
use tower::ServiceExt;

use web_api::{router, AppState};

fn build_app() -> Router {
    let storage = MemoryStorage::new();
    build_app_with(
        storage.participant_repository,
        Arc::new(storage.message_repository),
    )
}

fn build_app_with(
    participants: InMemoryParticipantRepository,
    messages: Arc<dyn MessageRepository>,
) -> Router {
    let service = PresenceService::new(
        PresenceServiceDependencies {
            participant_repository: Arc::new(participants),
            message_repository: messages,
            clock: Arc::new(SystemClock),
        },
        PresenceSettings::default(),
    );
    router(AppState::new(Arc::new(service)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("User", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header("User", user);
    }
    builder.body(Body::empty()).unwrap()
}

async fn join(app: &Router, name: &str) -> StatusCode {
    send(app, post_json("/participants", None, json!({ "name": name })))
        .await
        .0
}

async fn post_message(app: &Router, from: &str, to: &str, text: &str, kind: &str) -> StatusCode {
    let body = json!({ "to": to, "text": text, "type": kind });
    send(app, post_json("/messages", Some(from), body)).await.0
}

async fn messages_for(app: &Router, viewer: &str, query: &str) -> Vec<Value> {
    let (status, body) = send(app, get(&format!("/messages{query}"), Some(viewer))).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_check_responds_ok() {
    let app = build_app();
    let (status, _) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn join_registers_participant_and_rejects_duplicates() {
    let app = build_app();

    let (status, body) = send(&app, post_json("/participants", None, json!({ "name": "Alice" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.is_empty());

    let (status, body) = send(&app, post_json("/participants", None, json!({ "name": " alice " }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(String::from_utf8(body).unwrap(), "name already in use");

    // 前缀相同但名称不同，不算冲突
    assert_eq!(join(&app, "Ali").await, StatusCode::CREATED);

    let (status, body) = send(&app, get("/participants", None)).await;
    assert_eq!(status, StatusCode::OK);
    let participants: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(participants.len(), 2);
    assert!(participants
        .iter()
        .all(|p| p["name"].is_string() && p["lastStatus"].is_i64()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_admit_one_participant_per_name() {
    let app = build_app();
    let attempts = (0..8).map(|i| {
        let app = app.clone();
        let name = if i % 2 == 0 { "Bob" } else { "bob" };
        tokio::spawn(async move { join(&app, name).await })
    });

    let mut created = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        match attempt.await.unwrap() {
            StatusCode::CREATED => created += 1,
            status => assert_eq!(status, StatusCode::CONFLICT),
        }
    }
    assert_eq!(created, 1);

    let announcements = messages_for(&app, "Carol", "")
        .await
        .into_iter()
        .filter(|m| m["type"] == "status")
        .count();
    assert_eq!(announcements, 1);
}

#[tokio::test]
async fn join_reports_every_validation_failure_as_422() {
    let app = build_app();

    let (status, body) = send(&app, post_json("/participants", None, json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(errors, vec!["\"name\" is required"]);

    let (status, _) = send(&app, post_json("/participants", None, json!({ "name": "   " }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let malformed = Request::builder()
        .method("POST")
        .uri("/participants")
        .header("content-type", "application/json")
        .body(Body::from("{\"name\":"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn join_announces_arrival_to_everyone() {
    let app = build_app();
    assert_eq!(join(&app, "Alice").await, StatusCode::CREATED);

    let messages = messages_for(&app, "Bob", "").await;
    let status: Vec<_> = messages
        .iter()
        .filter(|m| m["type"] == "status" && m["from"] == "Alice")
        .collect();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0]["to"], "Todos");
    assert_eq!(status[0]["text"], "entra na sala...");
    assert_eq!(status[0]["time"].as_str().unwrap().len(), 8);
}

#[tokio::test]
async fn private_messages_are_hidden_from_third_parties() {
    let app = build_app();
    join(&app, "Alice").await;
    join(&app, "Bob").await;

    assert_eq!(
        post_message(&app, "Alice", "Bob", "segredo", "private_message").await,
        StatusCode::CREATED
    );

    let is_private = |m: &&Value| m["type"] == "private_message";
    assert_eq!(messages_for(&app, "Carol", "").await.iter().filter(is_private).count(), 0);
    assert_eq!(messages_for(&app, "Bob", "").await.iter().filter(is_private).count(), 1);
    assert_eq!(messages_for(&app, "ALICE", "").await.iter().filter(is_private).count(), 1);
}

#[tokio::test]
async fn unknown_recipient_is_rejected_and_nothing_is_stored() {
    let app = build_app();
    join(&app, "Alice").await;
    let before = messages_for(&app, "Alice", "").await.len();

    let body = json!({ "to": "Nobody", "text": "hi", "type": "message" });
    let (status, body) = send(&app, post_json("/messages", Some("Alice"), body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(errors.len(), 1);

    assert_eq!(messages_for(&app, "Alice", "").await.len(), before);
}

#[tokio::test]
async fn broadcast_token_always_resolves() {
    let app = build_app();
    join(&app, "Alice").await;

    assert_eq!(
        post_message(&app, "Alice", "Todos", "oi gente", "message").await,
        StatusCode::CREATED
    );
    let messages = messages_for(&app, "Zed", "").await;
    assert!(messages.iter().any(|m| m["text"] == "oi gente"));
}

#[tokio::test]
async fn message_validation_collects_all_errors() {
    let app = build_app();

    let (status, body) = send(&app, post_json("/messages", Some("Alice"), json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        errors,
        vec!["\"to\" is required", "\"text\" is required", "\"type\" is required"]
    );

    let body = json!({ "to": "Todos", "text": "x", "type": "status" });
    let (status, _) = send(&app, post_json("/messages", Some("Alice"), body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn identity_header_is_required() {
    let app = build_app();
    join(&app, "Alice").await;

    let body = json!({ "to": "Todos", "text": "hi", "type": "message" });
    let (status, _) = send(&app, post_json("/messages", None, body.clone())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, post_json("/messages", Some("  "), body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, get("/messages", None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn limit_returns_most_recent_in_insertion_order() {
    let app = build_app();
    join(&app, "Alice").await;
    for text in ["1", "2", "3", "4"] {
        post_message(&app, "Alice", "Todos", text, "message").await;
    }

    // 加入时的状态消息 + 4 条公开消息
    let all = messages_for(&app, "Bob", "").await;
    assert_eq!(all.len(), 5);

    let recent = messages_for(&app, "Bob", "?limit=2").await;
    let texts: Vec<_> = recent.iter().map(|m| m["text"].as_str().unwrap()).collect();
    assert_eq!(texts, vec!["3", "4"]);

    for invalid in ["?limit=0", "?limit=-3", "?limit=abc", "?limit="] {
        assert_eq!(messages_for(&app, "Bob", invalid).await.len(), 5, "{invalid}");
    }
}

#[tokio::test]
async fn heartbeat_refreshes_known_participants_only() {
    let app = build_app();
    join(&app, "Alice").await;

    let (status, _) = send(&app, post_json("/status", Some("alice"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, post_json("/status", Some("Ghost"), json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, post_json("/status", None, json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn non_ascii_names_work_as_identity() {
    let app = build_app();
    assert_eq!(join(&app, "João").await, StatusCode::CREATED);
    join(&app, "Zoë").await;

    assert_eq!(
        post_message(&app, "João", "Zoë", "olá", "private_message").await,
        StatusCode::CREATED
    );
    let (status, _) = send(&app, post_json("/status", Some("joão"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let seen = messages_for(&app, "Zoë", "").await;
    assert!(seen
        .iter()
        .any(|m| m["type"] == "private_message" && m["from"] == "João" && m["text"] == "olá"));
}

#[tokio::test]
async fn broadcast_token_cannot_be_registered() {
    let app = build_app();

    for name in ["Todos", "todos", " TODOS "] {
        let (status, body) = send(&app, post_json("/participants", None, json!({ "name": name }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{name}");
        let errors: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(errors.len(), 1);
    }

    let (_, body) = send(&app, get("/participants", None)).await;
    let participants: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert!(participants.is_empty());
}

#[tokio::test]
async fn repeated_limit_parameter_is_not_rejected() {
    let app = build_app();
    join(&app, "Alice").await;
    for text in ["1", "2", "3"] {
        post_message(&app, "Alice", "Todos", text, "message").await;
    }

    let messages = messages_for(&app, "Bob", "?limit=1&limit=2").await;
    assert!(!messages.is_empty());
}

#[tokio::test]
async fn every_listed_message_has_the_wire_shape() {
    let app = build_app();
    join(&app, "Alice").await;
    join(&app, "Bob").await;
    post_message(&app, "Alice", "Todos", "oi", "message").await;
    post_message(&app, "Bob", "Alice", "psst", "private_message").await;

    let messages = messages_for(&app, "Alice", "").await;
    assert_eq!(messages.len(), 4);
    for message in &messages {
        let time = message["time"].as_str().unwrap();
        assert!(MessageTime::parse(time).is_ok(), "bad time {time}");
        let kind = message["type"].as_str().unwrap();
        assert!(
            ["status", "message", "private_message"].contains(&kind),
            "bad type {kind}"
        );
        assert!(message["from"].is_string() && message["to"].is_string());
        assert!(message.get("seq").is_none());
    }
}

struct UnavailableMessages;

#[async_trait]
impl MessageRepository for UnavailableMessages {
    async fn append(&self, _message: ChatMessage) -> Result<StoredMessage, RepositoryError> {
        Err(RepositoryError::storage("connection reset by peer"))
    }

    async fn visible_to(
        &self,
        _viewer: &DisplayName,
        _limit: Option<NonZeroUsize>,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        Err(RepositoryError::storage("connection reset by peer"))
    }
}

#[tokio::test]
async fn storage_failure_rolls_back_join_and_hides_details() {
    let app = build_app_with(
        InMemoryParticipantRepository::new(),
        Arc::new(UnavailableMessages),
    );

    let (status, body) = send(&app, post_json("/participants", None, json!({ "name": "Alice" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let text = String::from_utf8(body).unwrap();
    assert_eq!(text, "internal server error");

    let (_, body) = send(&app, get("/participants", None)).await;
    let participants: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert!(participants.is_empty());

    let (status, _) = send(&app, get("/messages", Some("Alice"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
