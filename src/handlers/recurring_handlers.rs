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
use crate::models::recurring::{RecurringRule, RecurringRulePayload};
use crate::services::state_service::{StateError, StateService};

/// Handler for creating a recurring rule
#[utoipa::path(
    post,
    path = "/api/recurring",
    request_body = RecurringRulePayload,
    responses(
        (status = 201, description = "Rule created", body = RecurringRule),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 409, description = "Rule id already exists", body = ErrorResponse)
    ),
    tag = "recurring"
)]
pub async fn add_rule_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<RecurringRule>), Response> {
    let raw = json_body(payload)?;
    let rule = state_service
        .add_rule(user.user_id, raw)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

#[utoipa::path(
    put,
    path = "/api/recurring/{id}",
    params(("id" = String, Path, description = "Rule id")),
    request_body = RecurringRulePayload,
    responses(
        (status = 200, description = "Rule updated", body = RecurringRule),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Rule not found", body = ErrorResponse)
    ),
    tag = "recurring"
)]
pub async fn update_rule_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(rule_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<RecurringRule>, Response> {
    let raw = json_body(payload)?;
    let rule = state_service
        .update_rule(user.user_id, &rule_id, raw)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(rule))
}

#[utoipa::path(
    delete,
    path = "/api/recurring/{id}",
    params(("id" = String, Path, description = "Rule id")),
    responses(
        (status = 204, description = "Rule deleted or already gone"),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "recurring"
)]
pub async fn delete_rule_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(rule_id): Path<String>,
) -> Result<StatusCode, StateError> {
    state_service.delete_rule(user.user_id, &rule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
