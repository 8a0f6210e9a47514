use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error response structure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "validation_error",
    "message": "Invalid entries[1].amount: amount must be a finite, non-negative number",
    "field": "entries[1].amount"
}))]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Path of the rejected value, when one field is to blame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: Option<String>) -> Self {
        self.field = field;
        self
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Generic 500. The details go to the log, never to the client.
pub fn storage_failure(detail: &str) -> Response {
    tracing::error!(error = %detail, "storage failure");
    ErrorResponse::new("storage_error", "An internal error occurred")
        .into_response(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Unwraps a JSON body or turns the rejection into our error shape
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(ErrorResponse::new("payload_too_large", "Request body is too large")
                .into_response(StatusCode::PAYLOAD_TOO_LARGE))
        }
        Err(rejection) => Err(ErrorResponse::new("invalid_json", &rejection.body_text())
            .into_response(StatusCode::BAD_REQUEST)),
    }
}
