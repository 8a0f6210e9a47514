use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use budget_beacon::app::{create_router, AppState};
use budget_beacon::config::Config;
use budget_beacon::db;
use budget_beacon::handlers::CookieSettings;
use budget_beacon::repositories::{
    SqliteSessionRepository, SqliteStateRepository, SqliteUserRepository,
};
use budget_beacon::services::{AuthService, AuthServiceImpl, StateService, StateServiceImpl};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "budget_beacon=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::connect(&config.database_url).await?;
    tracing::info!(database_url = %config.database_url, "database ready");

    // Initialize repositories
    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let session_repository = Arc::new(SqliteSessionRepository::new(pool.clone()));
    let state_repository = Arc::new(SqliteStateRepository::new(pool));

    // Initialize services
    let auth_service: Arc<dyn AuthService> =
        Arc::new(AuthServiceImpl::new(user_repository, session_repository));
    let state_service: Arc<dyn StateService> = Arc::new(StateServiceImpl::new(state_repository));

    let app = create_router(AppState {
        auth_service,
        state_service,
        cookies: CookieSettings {
            secure: config.cookie_secure,
        },
    });

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("server running on http://{}", addr);
    tracing::info!("API docs: http://{}/api/docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
