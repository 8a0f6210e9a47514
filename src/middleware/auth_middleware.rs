use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::auth_service::{AuthError, AuthService};

pub const SESSION_COOKIE_NAME: &str = "budgetbeacon_session";

/// Extension type to store authenticated user ID in request
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Raw session token from the cookie, or from `Authorization: Bearer` when
/// there is no cookie
pub fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Auth middleware that resolves the session and adds user_id to request extensions
pub async fn auth_middleware(
    State(auth_service): State<Arc<dyn AuthService>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = session_token(&jar, request.headers()).ok_or(AuthError::InvalidSession)?;

    let user_id = auth_service.validate_session(&token).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::SessionToken;
    use crate::models::user::{CredentialsRequest, User};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tower::ServiceExt;

    // Accepts exactly the tokens it has handed out
    struct MockAuthService {
        sessions: Mutex<HashMap<String, Uuid>>,
    }

    impl MockAuthService {
        fn with_session(token: &str, user_id: Uuid) -> Self {
            let mut sessions = HashMap::new();
            sessions.insert(token.to_string(), user_id);
            Self {
                sessions: Mutex::new(sessions),
            }
        }
    }

    #[async_trait]
    impl AuthService for MockAuthService {
        async fn register(&self, _request: CredentialsRequest) -> Result<User, AuthError> {
            unimplemented!()
        }

        async fn verify(&self, _email: &str, _password: &str) -> Result<bool, AuthError> {
            unimplemented!()
        }

        async fn login(
            &self,
            _request: CredentialsRequest,
        ) -> Result<(User, SessionToken), AuthError> {
            unimplemented!()
        }

        async fn issue_session(&self, _user_id: Uuid) -> Result<SessionToken, AuthError> {
            unimplemented!()
        }

        async fn validate_session(&self, token: &str) -> Result<Uuid, AuthError> {
            self.sessions
                .lock()
                .unwrap()
                .get(token)
                .copied()
                .ok_or(AuthError::InvalidSession)
        }

        async fn revoke_session(&self, token: &str) -> Result<(), AuthError> {
            self.sessions.lock().unwrap().remove(token);
            Ok(())
        }

        async fn find_user(&self, _user_id: Uuid) -> Result<User, AuthError> {
            unimplemented!()
        }
    }

    // Test handler that requires authentication
    async fn protected_handler(
        axum::Extension(user): axum::Extension<AuthenticatedUser>,
    ) -> impl IntoResponse {
        Json(json!({
            "user_id": user.user_id.to_string(),
            "message": "Access granted"
        }))
    }

    fn create_test_app(auth_service: Arc<dyn AuthService>) -> Router {
        Router::new()
            .route("/protected", get(protected_handler))
            .layer(middleware::from_fn_with_state(
                auth_service.clone(),
                auth_middleware,
            ))
            .with_state(auth_service)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_middleware_with_session_cookie() {
        let user_id = Uuid::new_v4();
        let app = create_test_app(Arc::new(MockAuthService::with_session("tok", user_id)));

        let request = Request::builder()
            .uri("/protected")
            .header("Cookie", format!("{}=tok", SESSION_COOKIE_NAME))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["user_id"], user_id.to_string());
        assert_eq!(body["message"], "Access granted");
    }

    #[tokio::test]
    async fn test_middleware_with_bearer_token() {
        let user_id = Uuid::new_v4();
        let app = create_test_app(Arc::new(MockAuthService::with_session("tok", user_id)));

        let request = Request::builder()
            .uri("/protected")
            .header("Authorization", "Bearer tok")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_without_session() {
        let app = create_test_app(Arc::new(MockAuthService::with_session(
            "tok",
            Uuid::new_v4(),
        )));

        let request = Request::builder()
            .uri("/protected")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_middleware_with_unknown_or_malformed_token() {
        let auth_service: Arc<dyn AuthService> =
            Arc::new(MockAuthService::with_session("tok", Uuid::new_v4()));

        for (header, value) in [
            ("Cookie", format!("{}=nope", SESSION_COOKIE_NAME)),
            ("Authorization", "Bearer nope".to_string()),
            ("Authorization", "tok".to_string()),
            ("Authorization", "Bearer ".to_string()),
        ] {
            let request = Request::builder()
                .uri("/protected")
                .header(header, value)
                .body(Body::empty())
                .unwrap();

            let response = create_test_app(auth_service.clone())
                .oneshot(request)
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_cookie_wins_over_bearer() {
        let jar = CookieJar::new().add(axum_extra::extract::cookie::Cookie::new(
            SESSION_COOKIE_NAME,
            "from-cookie",
        ));
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());

        assert_eq!(
            session_token(&jar, &headers).as_deref(),
            Some("from-cookie")
        );
        assert_eq!(
            session_token(&CookieJar::new(), &headers).as_deref(),
            Some("from-header")
        );
        assert_eq!(session_token(&CookieJar::new(), &HeaderMap::new()), None);
    }
}
