use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::handlers::error::{json_body, storage_failure, ErrorResponse};
use crate::middleware::auth_middleware::AuthenticatedUser;
use crate::models::category::{CategoryCatalog, CategoryPayload};
use crate::models::settings::Settings;
use crate::models::state::{FinancialState, StateView};
use crate::normalize::{LEGACY_EXPENSE_CATEGORY_RENAMES, LEGACY_RENAMES_VERSION};
use crate::services::state_service::{StateError, StateService};

/// Convert StateError to HTTP response
impl IntoResponse for StateError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_type, field) = match self {
            StateError::Rejected { field, .. } => {
                (StatusCode::BAD_REQUEST, "validation_error", field)
            }
            StateError::DuplicateId(_) => (StatusCode::CONFLICT, "duplicate_id", None),
            StateError::EntryNotFound => (StatusCode::NOT_FOUND, "entry_not_found", None),
            StateError::RuleNotFound => (StatusCode::NOT_FOUND, "rule_not_found", None),
            StateError::DatabaseError(ref msg) => return storage_failure(msg),
        };

        ErrorResponse::new(error_type, &message)
            .with_field(field)
            .into_response(status)
    }
}

/// Request payload for the budget goal. A bare number is accepted as well.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"budget": 2500.0}))]
pub struct BudgetPayload {
    pub budget: f64,
}

/// The legacy expense category rename table
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LegacyRenames {
    pub version: u32,
    /// Lowercase old name to current name
    pub renames: BTreeMap<String, String>,
}

/// Handler for reading the whole state
#[utoipa::path(
    get,
    path = "/api/state",
    responses(
        (status = 200, description = "State with derived summary", body = StateView),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "state"
)]
pub async fn get_state_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<StateView>, StateError> {
    let view = state_service.get_state(user.user_id).await?;
    Ok(Json(view))
}

/// Handler for replacing state sections
///
/// Top-level keys present in the body replace the stored section; missing
/// keys are left alone. One invalid entry or rule rejects the whole write.
#[utoipa::path(
    put,
    path = "/api/state",
    request_body = FinancialState,
    responses(
        (status = 200, description = "Updated state", body = StateView),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 409, description = "Duplicate id in payload", body = ErrorResponse)
    ),
    tag = "state"
)]
pub async fn replace_state_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StateView>, Response> {
    let raw = json_body(payload)?;
    let view = state_service
        .replace_state(user.user_id, raw)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(view))
}

/// Handler for the monthly budget goal
#[utoipa::path(
    put,
    path = "/api/budget",
    request_body = BudgetPayload,
    responses(
        (status = 200, description = "Updated state", body = StateView),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "state"
)]
pub async fn update_budget_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StateView>, Response> {
    let raw = json_body(payload)?;
    let view = state_service
        .update_budget(user.user_id, raw)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(view))
}

/// Handler for settings. Invalid fields fall back to defaults instead of failing.
#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = Settings,
    responses(
        (status = 200, description = "Updated state", body = StateView),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "state"
)]
pub async fn update_settings_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StateView>, Response> {
    let raw = json_body(payload)?;
    let view = state_service
        .update_settings(user.user_id, raw)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(view))
}

/// Handler replacing the category catalog. Entries keep their categories.
#[utoipa::path(
    put,
    path = "/api/categories",
    request_body = CategoryCatalog,
    responses(
        (status = 200, description = "Updated state", body = StateView),
        (status = 400, description = "Body is not an object", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn replace_categories_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StateView>, Response> {
    let raw = json_body(payload)?;
    let view = state_service
        .replace_categories(user.user_id, raw)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(view))
}

/// Handler adding one category; a case-insensitive duplicate is a no-op
#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CategoryPayload,
    responses(
        (status = 200, description = "Updated state", body = StateView),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn add_category_handler(
    State(state_service): State<Arc<dyn StateService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StateView>, Response> {
    let raw = json_body(payload)?;
    let view = state_service
        .add_category(user.user_id, raw)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(view))
}

/// Handler exposing the legacy rename table so importers can map old names
#[utoipa::path(
    get,
    path = "/api/categories/renames",
    responses(
        (status = 200, description = "Versioned rename table", body = LegacyRenames)
    ),
    tag = "categories"
)]
pub async fn category_renames_handler() -> Json<LegacyRenames> {
    let renames = LEGACY_EXPENSE_CATEGORY_RENAMES
        .iter()
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .collect();
    Json(LegacyRenames {
        version: LEGACY_RENAMES_VERSION,
        renames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Rejection;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_rejection_maps_to_bad_request_with_field() {
        let response = StateError::Rejected {
            field: Some("entries[0].amount".to_string()),
            reason: Rejection::InvalidAmount,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["field"], "entries[0].amount");
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let cases = [
            (StateError::DuplicateId("id_a".into()), StatusCode::CONFLICT),
            (StateError::EntryNotFound, StatusCode::NOT_FOUND),
            (StateError::RuleNotFound, StatusCode::NOT_FOUND),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_storage_failure_hides_details() {
        let response = StateError::DatabaseError("disk I/O error at /var/db".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "storage_error");
        assert!(!body["message"].as_str().unwrap().contains("/var/db"));
        assert!(body.get("field").is_none());
    }

    #[tokio::test]
    async fn test_category_renames() {
        let Json(renames) = category_renames_handler().await;
        assert_eq!(renames.version, LEGACY_RENAMES_VERSION);
        assert_eq!(renames.renames["rent"], "Mortgage/Rent");
        assert_eq!(renames.renames["utilities"], "Electric");
    }
}
