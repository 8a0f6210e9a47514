use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use validator::Validate;

use crate::handlers::error::{json_body, storage_failure, ErrorResponse};
use crate::middleware::auth_middleware::{session_token, AuthenticatedUser, SESSION_COOKIE_NAME};
use crate::models::auth::{SessionResponse, SessionToken};
use crate::models::user::{CredentialsRequest, User};
use crate::services::auth_service::{AuthError, AuthService};

/// How the session cookie is issued
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieSettings {
    pub secure: bool,
}

impl CookieSettings {
    fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE_NAME, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }
}

/// Convert AuthError to HTTP response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AuthError::InvalidEmail => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Email address is not valid",
            ),
            AuthError::InvalidPassword => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Password must not be empty",
            ),
            AuthError::DuplicateEmail => (
                StatusCode::CONFLICT,
                "duplicate_email",
                "Email already exists",
            ),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid email or password",
            ),
            AuthError::InvalidSession => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication required",
            ),
            AuthError::DatabaseError(ref msg) => return storage_failure(msg),
        };

        ErrorResponse::new(error_type, message).into_response(status)
    }
}

/// Validate request body
fn validated(request: CredentialsRequest) -> Result<CredentialsRequest, Response> {
    let Err(validation_errors) = request.validate() else {
        return Ok(request);
    };

    let field_errors = validation_errors.field_errors();
    let error_message = field_errors
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ");
    let field = field_errors.keys().next().map(|field| field.to_string());

    Err(ErrorResponse::new("validation_error", &error_message)
        .with_field(field)
        .into_response(StatusCode::BAD_REQUEST))
}

fn signed_in(
    jar: CookieJar,
    cookies: CookieSettings,
    user: User,
    session: SessionToken,
) -> (CookieJar, Json<SessionResponse>) {
    let jar = jar.add(cookies.session_cookie(session.token));
    let body = SessionResponse {
        user,
        expires_at: session.expires_at,
    };
    (jar, Json(body))
}

/// Handler for user registration
///
/// Creates the account and signs it in straight away.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User registered, session cookie set", body = SessionResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    State(cookies): State<CookieSettings>,
    jar: CookieJar,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>), Response> {
    let request = validated(json_body(payload)?)?;

    let user = auth_service
        .register(request)
        .await
        .map_err(IntoResponse::into_response)?;
    let session = auth_service
        .issue_session(user.id)
        .await
        .map_err(IntoResponse::into_response)?;

    let (jar, body) = signed_in(jar, cookies, user, session);
    Ok((StatusCode::CREATED, jar, body))
}

/// Handler for user login
///
/// Verifies credentials and sets a fresh session cookie.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = SessionResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    State(cookies): State<CookieSettings>,
    jar: CookieJar,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SessionResponse>), Response> {
    let request = json_body(payload)?;

    let (user, session) = auth_service
        .login(request)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(signed_in(jar, cookies, user, session))
}

/// Handler for logout
///
/// Revokes the presented session, if any, and clears the cookie. Always succeeds.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Logged out"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn logout_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, StatusCode), AuthError> {
    if let Some(token) = session_token(&jar, &headers) {
        auth_service.revoke_session(&token).await?;
        tracing::info!("session revoked");
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}

/// Handler returning the signed-in user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn me_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<User>, AuthError> {
    let user = auth_service.find_user(user.user_id).await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::User;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request, routing::post, Router};
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tower::ServiceExt;
    use uuid::Uuid;

    // Mock service for testing; any password other than "wrong" is accepted
    struct MockAuthService {
        users: Mutex<HashMap<String, User>>,
        revoked: Mutex<Vec<String>>,
    }

    impl MockAuthService {
        fn new() -> Self {
            Self {
                users: Mutex::new(HashMap::new()),
                revoked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AuthService for MockAuthService {
        async fn register(&self, request: CredentialsRequest) -> Result<User, AuthError> {
            let mut users = self.users.lock().unwrap();
            if users.contains_key(&request.email) {
                return Err(AuthError::DuplicateEmail);
            }
            let user = User {
                id: Uuid::new_v4(),
                email: request.email.clone(),
                password_salt: String::new(),
                password_digest: String::new(),
                created_at: Utc::now(),
            };
            users.insert(request.email, user.clone());
            Ok(user)
        }

        async fn verify(&self, email: &str, password: &str) -> Result<bool, AuthError> {
            Ok(self.users.lock().unwrap().contains_key(email) && password != "wrong")
        }

        async fn login(
            &self,
            request: CredentialsRequest,
        ) -> Result<(User, SessionToken), AuthError> {
            if !self.verify(&request.email, &request.password).await? {
                return Err(AuthError::InvalidCredentials);
            }
            let user = self.users.lock().unwrap()[&request.email].clone();
            let session = self.issue_session(user.id).await?;
            Ok((user, session))
        }

        async fn issue_session(&self, _user_id: Uuid) -> Result<SessionToken, AuthError> {
            Ok(SessionToken {
                token: "token123".to_string(),
                expires_at: Utc::now() + Duration::days(7),
            })
        }

        async fn validate_session(&self, _token: &str) -> Result<Uuid, AuthError> {
            Err(AuthError::InvalidSession)
        }

        async fn revoke_session(&self, token: &str) -> Result<(), AuthError> {
            self.revoked.lock().unwrap().push(token.to_string());
            Ok(())
        }

        async fn find_user(&self, _user_id: Uuid) -> Result<User, AuthError> {
            Err(AuthError::InvalidSession)
        }
    }

    #[derive(Clone, axum::extract::FromRef)]
    struct TestState {
        auth_service: Arc<dyn AuthService>,
        cookies: CookieSettings,
    }

    fn create_test_app(auth_service: Arc<dyn AuthService>) -> Router {
        Router::new()
            .route("/register", post(register_handler))
            .route("/login", post(login_handler))
            .route("/logout", post(logout_handler))
            .with_state(TestState {
                auth_service,
                cookies: CookieSettings { secure: true },
            })
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn set_cookie(response: &Response) -> String {
        response
            .headers()
            .get("set-cookie")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_register_sets_session_cookie() {
        let app = create_test_app(Arc::new(MockAuthService::new()));

        let response = app
            .oneshot(json_request(
                "/register",
                r#"{"email": "jane@example.com", "password": "pw123"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let cookie = set_cookie(&response);
        assert!(cookie.starts_with("budgetbeacon_session=token123"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Secure"));

        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "jane@example.com");
        assert!(body["user"].get("passwordDigest").is_none());
        assert!(body["expiresAt"].is_string());
    }

    #[tokio::test]
    async fn test_register_validation_error() {
        let app = create_test_app(Arc::new(MockAuthService::new()));

        let response = app
            .oneshot(json_request(
                "/register",
                r#"{"email": "not-an-email", "password": "pw123"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["field"], "email");
    }

    #[tokio::test]
    async fn test_register_malformed_json() {
        let app = create_test_app(Arc::new(MockAuthService::new()));

        let response = app
            .oneshot(json_request("/register", r#"{"email": "#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_json");
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let service: Arc<dyn AuthService> = Arc::new(MockAuthService::new());
        let body = r#"{"email": "jane@example.com", "password": "pw123"}"#;

        let first = create_test_app(service.clone())
            .oneshot(json_request("/register", body))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = create_test_app(service)
            .oneshot(json_request("/register", body))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["error"], "duplicate_email");
    }

    #[tokio::test]
    async fn test_login_invalid_credentials() {
        let service: Arc<dyn AuthService> = Arc::new(MockAuthService::new());
        create_test_app(service.clone())
            .oneshot(json_request(
                "/register",
                r#"{"email": "jane@example.com", "password": "pw123"}"#,
            ))
            .await
            .unwrap();

        let response = create_test_app(service)
            .oneshot(json_request(
                "/login",
                r#"{"email": "jane@example.com", "password": "wrong"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("set-cookie").is_none());
        assert_eq!(body_json(response).await["error"], "invalid_credentials");
    }

    #[tokio::test]
    async fn test_logout_revokes_and_clears_cookie() {
        let service = Arc::new(MockAuthService::new());
        let app = create_test_app(service.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .header("cookie", "budgetbeacon_session=token123")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(set_cookie(&response).starts_with("budgetbeacon_session="));
        assert_eq!(*service.revoked.lock().unwrap(), vec!["token123".to_string()]);
    }

    #[tokio::test]
    async fn test_logout_without_session_still_succeeds() {
        let service = Arc::new(MockAuthService::new());
        let app = create_test_app(service.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(service.revoked.lock().unwrap().is_empty());
    }
}
