//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    chat_task::{run_turn, TurnInput},
    protocol::{ChatTurnRequest, ChatTurnResponse, ProgressResponse, ScorePayload},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::error;
use tutor_core::ports::PortError;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        chat_turn_handler,
        chapter_progress_handler,
    ),
    components(
        schemas(ChatTurnRequest, ChatTurnResponse, ScorePayload, ProgressResponse)
    ),
    tags(
        (name = "Assessment Orchestrator API", description = "API endpoints for conversational chapter assessment.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Helpers
//=========================================================================================

fn require_user_id(headers: &HeaderMap) -> Result<Uuid, (StatusCode, String)> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

/// Maps a turn-level failure onto a status code and a user-facing message.
fn map_turn_error(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Timeout(_) => (
            StatusCode::GATEWAY_TIMEOUT,
            "The tutor took too long to reply. Please try again with a shorter message."
                .to_string(),
        ),
        PortError::Upstream(_) => (
            StatusCode::BAD_GATEWAY,
            "The tutoring service is temporarily unavailable. Please retry in a moment."
                .to_string(),
        ),
        PortError::Unexpected(msg) => {
            error!("Unexpected error while handling a turn: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred.".to_string(),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Run one conversational assessment turn.
///
/// Classifies the message, selects a question when the user is being
/// assessed, calls the tutoring model, and persists progress. A `x-user-id`
/// header identifies the (upstream-authenticated) caller.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatTurnRequest,
    responses(
        (status = 200, description = "Turn completed", body = ChatTurnResponse),
        (status = 400, description = "Bad request (e.g., missing header)"),
        (status = 404, description = "Chapter not found"),
        (status = 502, description = "Completion backend unavailable"),
        (status = 504, description = "Completion backend timed out")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn chat_turn_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ChatTurnRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = require_user_id(&headers)?;

    let reply = run_turn(
        app_state,
        user_id,
        payload.chapter_id,
        TurnInput::Text(payload.message),
    )
    .await
    .map_err(map_turn_error)?;

    Ok((StatusCode::OK, Json(ChatTurnResponse::from(reply))))
}

/// Fetch the caller's latest score-attempt rollup for a chapter.
#[utoipa::path(
    get,
    path = "/chapters/{chapter_id}/progress",
    responses(
        (status = 200, description = "Latest attempt found", body = ProgressResponse),
        (status = 404, description = "No attempt recorded for this chapter")
    ),
    params(
        ("chapter_id" = Uuid, Path, description = "The chapter to report on."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn chapter_progress_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(chapter_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = require_user_id(&headers)?;

    let attempt = app_state
        .ledger
        .latest_attempt(user_id, chapter_id)
        .await
        .map_err(map_turn_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                "No attempt recorded for this chapter".to_string(),
            )
        })?;

    Ok((StatusCode::OK, Json(ProgressResponse::from(attempt))))
}
