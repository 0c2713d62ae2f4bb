use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

use application::{
    validation::parse_limit, JoinRequest, MessageDto, ParticipantDto, SendMessageRequest,
};

use crate::{
    error::ApiError,
    extract::{identity, JsonBody},
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/participants", post(join).get(list_participants))
        .route("/messages", post(post_message).get(list_messages))
        .route("/status", post(heartbeat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn join(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<JoinRequest>,
) -> Result<StatusCode, ApiError> {
    state.presence_service.join(payload).await?;
    Ok(StatusCode::CREATED)
}

async fn list_participants(
    State(state): State<AppState>,
) -> Result<Json<Vec<ParticipantDto>>, ApiError> {
    let participants = state.presence_service.list_participants().await?;
    Ok(Json(participants))
}

async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<SendMessageRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .presence_service
        .post_message(identity(&headers), payload)
        .await?;
    Ok(StatusCode::CREATED)
}

async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    // 无法识别的 limit 视为不限制
    let limit = parse_limit(query.get("limit").map(String::as_str));
    let messages = state
        .presence_service
        .list_messages(identity(&headers), limit)
        .await?;
    Ok(Json(messages))
}

async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    state.presence_service.heartbeat(identity(&headers)).await?;
    Ok(StatusCode::OK)
}
