use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::handlers::error::{json_body, ErrorResponse};
use crate::middleware::auth_middleware::AuthenticatedUser;
use crate::models::entry::{Entry, EntryPayload};
use crate::services::state_service::{StateError, StateService};

/// Handler for creating an entry
///
/// Echoes the stored entry, including the server-assigned id, the normalized
/// category and the resolved timestamp.
#[utoipa::path(
    post,
    path = "/api/entries",
    request_body = EntryPayload,
    responses(
        (status = 201, description = "Entry created", body = Entry),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 409, description = "Entry id already exists", body = ErrorResponse)
    ),
    tag = "entries"
)]
pub async fn add_entry_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Entry>), Response> {
    let raw = json_body(payload)?;
    let entry = state_service
        .add_entry(user.user_id, raw)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Handler for updating an entry
///
/// The id in the path wins over any id in the body. Without a `createdAt`
/// the stored timestamp is kept.
#[utoipa::path(
    put,
    path = "/api/entries/{id}",
    params(("id" = String, Path, description = "Entry id")),
    request_body = EntryPayload,
    responses(
        (status = 200, description = "Entry updated", body = Entry),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Entry not found", body = ErrorResponse)
    ),
    tag = "entries"
)]
pub async fn update_entry_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(entry_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Entry>, Response> {
    let raw = json_body(payload)?;
    let entry = state_service
        .update_entry(user.user_id, &entry_id, raw)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(entry))
}

/// Handler for deleting an entry. Deleting a missing entry also succeeds.
#[utoipa::path(
    delete,
    path = "/api/entries/{id}",
    params(("id" = String, Path, description = "Entry id")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "entries"
)]
pub async fn delete_entry_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode, StateError> {
    state_service.delete_entry(user.user_id, &entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
