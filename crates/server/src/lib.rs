//! Login service for the restaurant back office.
//!
//! Users sign in with Google; the service keeps them signed in with a pair of
//! JWTs carried in HttpOnly cookies and answers `/api/me` for the frontend.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod db;
pub mod error;
mod models;
pub mod repository;
mod schema;
pub mod users;

#[cfg(test)]
mod test_support;

use auth::{AuthConfig, IdentityProvider, TokenService};
use repository::UserStore;
use users::UserDirectory;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthConfig>,
    pub tokens: Arc<TokenService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub users: UserDirectory,
}

impl AppState {
    pub fn new(
        config: AuthConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn UserStore>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(&config));
        Self {
            config: Arc::new(config),
            tokens,
            identity,
            users: UserDirectory::new(store),
        }
    }
}

/// Build the HTTP router. CORS is layered on by the binary.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        // OAuth routes
        .route("/auth/google/login", get(auth::google_login))
        .route("/auth/google/callback", get(auth::google_callback))
        // Session routes
        .route("/auth/refresh", post(auth::refresh_access_token))
        .route("/logout", post(auth::logout))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, Response},
    };
    use cookie::Cookie;
    use serde::de::DeserializeOwned;
    use shared_types::{MeResponse, MessageResponse, UserRole};
    use tower::ServiceExt;
    use url::Url;

    use super::*;
    use crate::auth::cookies::{ACCESS_COOKIE, REDIRECT_COOKIE, REFRESH_COOKIE, STATE_COOKIE};
    use crate::error::ErrorResponse;
    use crate::test_support::test_state;

    /// Minimal cookie jar that behaves like a browser across requests.
    #[derive(Default)]
    struct Browser {
        jar: HashMap<String, String>,
    }

    impl Browser {
        fn request(&self, method: Method, uri: &str) -> Request<Body> {
            let mut builder = Request::builder().method(method).uri(uri);
            if !self.jar.is_empty() {
                let header_value = self
                    .jar
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect::<Vec<_>>()
                    .join("; ");
                builder = builder.header(header::COOKIE, header_value);
            }
            builder.body(Body::empty()).unwrap()
        }

        async fn send(&mut self, app: &Router, method: Method, uri: &str) -> Response<Body> {
            let response = app
                .clone()
                .oneshot(self.request(method, uri))
                .await
                .unwrap();
            self.absorb(&response);
            response
        }

        fn absorb(&mut self, response: &Response<Body>) {
            for value in response.headers().get_all(header::SET_COOKIE) {
                let cookie = Cookie::parse(value.to_str().unwrap().to_string()).unwrap();
                let removed = cookie.value().is_empty()
                    || cookie.max_age().is_some_and(|age| age <= time::Duration::ZERO);
                if removed {
                    self.jar.remove(cookie.name());
                } else {
                    self.jar
                        .insert(cookie.name().to_string(), cookie.value().to_string());
                }
            }
        }

        fn has(&self, name: &str) -> bool {
            self.jar.contains_key(name)
        }

        /// Run the login redirect and return the nonce sent to the provider.
        async fn start_login(&mut self, app: &Router, uri: &str) -> String {
            let response = self.send(app, Method::GET, uri).await;
            assert_eq!(response.status(), StatusCode::FOUND);
            let location = location_of(&response);
            Url::parse(&location)
                .unwrap()
                .query_pairs()
                .find(|(key, _)| key == "state")
                .map(|(_, value)| value.into_owned())
                .unwrap()
        }

        async fn complete_login(&mut self, app: &Router) -> Response<Body> {
            let nonce = self.start_login(app, "/auth/google/login").await;
            let uri = format!("/auth/google/callback?code=good-code&state={}", nonce);
            self.send(app, Method::GET, &uri).await
        }
    }

    fn location_of(response: &Response<Body>) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn json_of<T: DeserializeOwned>(response: Response<Body>) -> T {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _, _) = test_state();
        let response = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_binds_state_to_browser() {
        let (state, _, _) = test_state();
        let app = router(state);
        let mut browser = Browser::default();

        let nonce = browser
            .start_login(&app, "/auth/google/login?redirect=%2Forders")
            .await;

        assert!(!nonce.is_empty());
        assert_eq!(browser.jar.get(STATE_COOKIE), Some(&nonce));
        assert!(browser.has(REDIRECT_COOKIE));
        assert!(!browser.has(ACCESS_COOKIE));
    }

    #[tokio::test]
    async fn test_login_ignores_foreign_redirect() {
        let (state, _, _) = test_state();
        let app = router(state);
        let mut browser = Browser::default();

        browser
            .start_login(
                &app,
                "/auth/google/login?redirect=https%3A%2F%2Fevil.example%2Fphish",
            )
            .await;

        assert!(browser.has(STATE_COOKIE));
        assert!(!browser.has(REDIRECT_COOKIE));
    }

    #[tokio::test]
    async fn test_callback_without_code_is_bad_request() {
        let (state, identity, store) = test_state();
        let app = router(state);
        let mut browser = Browser::default();

        for uri in ["/auth/google/callback?code=", "/auth/google/callback"] {
            let response = browser.send(&app, Method::GET, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: ErrorResponse = json_of(response).await;
            assert_eq!(body.error, "Code not found");
        }

        assert_eq!(identity.exchange_count(), 0);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_callback_with_foreign_state_is_rejected() {
        let (state, identity, _) = test_state();
        let app = router(state);
        let mut browser = Browser::default();

        browser.start_login(&app, "/auth/google/login").await;
        let response = browser
            .send(
                &app,
                Method::GET,
                "/auth/google/callback?code=good-code&state=forged",
            )
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = json_of(response).await;
        assert_eq!(body.error, "Invalid OAuth state");
        assert_eq!(identity.exchange_count(), 0);
        assert!(!browser.has(STATE_COOKIE));
        assert!(!browser.has(ACCESS_COOKIE));
    }

    #[tokio::test]
    async fn test_login_creates_owner_and_me_returns_it() {
        let (state, identity, store) = test_state();
        let app = router(state);
        let mut browser = Browser::default();

        let nonce = browser
            .start_login(&app, "/auth/google/login?redirect=%2Forders")
            .await;
        let response = browser
            .send(
                &app,
                Method::GET,
                &format!("/auth/google/callback?code=good-code&state={}", nonce),
            )
            .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location_of(&response), "http://localhost:5173/orders");
        assert_eq!(identity.exchange_count(), 1);
        assert!(browser.has(ACCESS_COOKIE));
        assert!(browser.has(REFRESH_COOKIE));
        assert!(!browser.has(REDIRECT_COOKIE));
        assert!(!browser.has(STATE_COOKIE));

        let response = browser.send(&app, Method::GET, "/api/me").await;
        assert_eq!(response.status(), StatusCode::OK);
        let me: MeResponse = json_of(response).await;
        assert_eq!(me.email, "a@b.com");
        assert_eq!(me.name, "Alice");
        assert_eq!(me.role, UserRole::Owner);

        // A second login resolves to the same record
        let mut other_browser = Browser::default();
        let response = other_browser.complete_login(&app).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location_of(&response), "http://localhost:5173/");
        let again: MeResponse =
            json_of(other_browser.send(&app, Method::GET, "/api/me").await).await;
        assert_eq!(again.id, me.id);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (state, _, _) = test_state();
        let app = router(state);
        let mut browser = Browser::default();
        browser.complete_login(&app).await;

        let response = browser.send(&app, Method::POST, "/logout").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: MessageResponse = json_of(response).await;
        assert_eq!(body.message, "Logged out successfully");
        assert!(!browser.has(ACCESS_COOKIE));
        assert!(!browser.has(REFRESH_COOKIE));

        let response = browser.send(&app, Method::GET, "/api/me").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_restores_access_cookie() {
        let (state, _, _) = test_state();
        let app = router(state);
        let mut browser = Browser::default();
        browser.complete_login(&app).await;

        // Simulate the access cookie expiring in the browser
        browser.jar.remove(ACCESS_COOKIE);
        let response = browser.send(&app, Method::GET, "/api/me").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = browser.send(&app, Method::POST, "/auth/refresh").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: MessageResponse = json_of(response).await;
        assert_eq!(body.message, "Access token refreshed");
        assert!(browser.has(ACCESS_COOKIE));

        let response = browser.send(&app, Method::GET, "/api/me").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_rejections() {
        let (state, _, _) = test_state();
        let app = router(state);

        let mut browser = Browser::default();
        let response = browser.send(&app, Method::POST, "/auth/refresh").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: ErrorResponse = json_of(response).await;
        assert_eq!(body.error, "No refresh token");

        browser
            .jar
            .insert(REFRESH_COOKIE.to_string(), "not-a-jwt".to_string());
        let response = browser.send(&app, Method::POST, "/auth/refresh").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: ErrorResponse = json_of(response).await;
        assert_eq!(body.error, "Invalid token");
        assert!(!browser.has(ACCESS_COOKIE));
    }

    #[tokio::test]
    async fn test_provider_failure_is_generic() {
        let (state, _, store) = test_state();
        let app = router(state);
        let mut browser = Browser::default();

        let nonce = browser
            .start_login(&app, "/auth/google/login?redirect=%2Forders")
            .await;
        assert!(browser.has(REDIRECT_COOKIE));
        let response = browser
            .send(
                &app,
                Method::GET,
                &format!("/auth/google/callback?code=bad-code&state={}", nonce),
            )
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = json_of(response).await;
        assert_eq!(body.error, "Token exchange failed");
        assert!(body.details.is_none());
        assert!(!browser.has(ACCESS_COOKIE));
        assert!(!browser.has(STATE_COOKIE));
        assert!(!browser.has(REDIRECT_COOKIE));
        assert_eq!(store.count().await, 0);

        // The nonce is spent, so replaying the callback is refused
        let response = browser
            .send(
                &app,
                Method::GET,
                &format!("/auth/google/callback?code=good-code&state={}", nonce),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_me_for_unknown_user_is_not_found() {
        let (state, _, _) = test_state();
        let token = state.tokens.issue_access_token(999).unwrap();
        let app = router(state);

        let mut browser = Browser::default();
        browser.jar.insert(ACCESS_COOKIE.to_string(), token);
        let response = browser.send(&app, Method::GET, "/api/me").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = json_of(response).await;
        assert_eq!(body.error, "User not found");
    }
}
