use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::handlers::auth_handlers::{
    login_handler, logout_handler, me_handler, register_handler, CookieSettings,
};
use crate::handlers::entry_handlers::{
    add_entry_handler, delete_entry_handler, update_entry_handler,
};
use crate::handlers::error::ErrorResponse;
use crate::handlers::recurring_handlers::{
    add_rule_handler, delete_rule_handler, update_rule_handler,
};
use crate::handlers::state_handlers::{
    add_category_handler, category_renames_handler, get_state_handler,
    replace_categories_handler, replace_state_handler, update_budget_handler,
    update_settings_handler, BudgetPayload, LegacyRenames,
};
use crate::middleware::auth_middleware::auth_middleware;
use crate::models::auth::SessionResponse;
use crate::models::category::{Category, CategoryCatalog, CategoryPayload};
use crate::models::entry::{Entry, EntryPayload, EntryType};
use crate::models::recurring::{Frequency, RecurringRule, RecurringRulePayload};
use crate::models::settings::{DataScope, Settings, SortOrder};
use crate::models::state::{FinancialState, StateView};
use crate::models::summary::BudgetSummary;
use crate::models::user::{CredentialsRequest, User};
use crate::services::auth_service::AuthService;
use crate::services::state_service::StateService;

/// Request bodies above this are refused before routing
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::auth_handlers::register_handler,
        crate::handlers::auth_handlers::login_handler,
        crate::handlers::auth_handlers::logout_handler,
        crate::handlers::auth_handlers::me_handler,
        crate::handlers::state_handlers::get_state_handler,
        crate::handlers::state_handlers::replace_state_handler,
        crate::handlers::state_handlers::update_budget_handler,
        crate::handlers::state_handlers::update_settings_handler,
        crate::handlers::state_handlers::replace_categories_handler,
        crate::handlers::state_handlers::add_category_handler,
        crate::handlers::state_handlers::category_renames_handler,
        crate::handlers::entry_handlers::add_entry_handler,
        crate::handlers::entry_handlers::update_entry_handler,
        crate::handlers::entry_handlers::delete_entry_handler,
        crate::handlers::recurring_handlers::add_rule_handler,
        crate::handlers::recurring_handlers::update_rule_handler,
        crate::handlers::recurring_handlers::delete_rule_handler,
    ),
    components(
        schemas(
            User, CredentialsRequest, SessionResponse, ErrorResponse,
            FinancialState, StateView, BudgetSummary, BudgetPayload,
            Entry, EntryPayload, EntryType,
            RecurringRule, RecurringRulePayload, Frequency,
            Settings, DataScope, SortOrder,
            Category, CategoryCatalog, CategoryPayload, LegacyRenames
        )
    ),
    tags(
        (name = "auth", description = "Registration and sessions"),
        (name = "state", description = "Budget, settings and the whole state document"),
        (name = "entries", description = "Income and expense entries"),
        (name = "recurring", description = "Recurring rules"),
        (name = "categories", description = "Category catalog")
    ),
    info(
        title = "Budget Beacon API",
        version = "0.1.0",
        description = "Per-user budget state with server-side validation",
    )
)]
pub struct ApiDoc;

/// Shared handler state; handlers pull out the piece they need via `FromRef`
#[derive(Clone, FromRef)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthService>,
    pub state_service: Arc<dyn StateService>,
    pub cookies: CookieSettings,
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the full application router
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(me_handler))
        .route(
            "/api/state",
            get(get_state_handler).put(replace_state_handler),
        )
        .route("/api/budget", put(update_budget_handler))
        .route("/api/settings", put(update_settings_handler))
        .route(
            "/api/categories",
            put(replace_categories_handler).post(add_category_handler),
        )
        .route("/api/entries", post(add_entry_handler))
        .route(
            "/api/entries/:id",
            put(update_entry_handler).delete(delete_entry_handler),
        )
        .route("/api/recurring", post(add_rule_handler))
        .route(
            "/api/recurring/:id",
            put(update_rule_handler).delete(delete_rule_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/categories/renames", get(category_renames_handler))
        .route("/api/docs/openapi.json", get(openapi_handler))
        .merge(protected)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
