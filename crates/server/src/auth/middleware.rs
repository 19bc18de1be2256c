//! Authentication middleware layer for protecting routes.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::AppState;

use super::cookies::SessionCookies;
use super::types::AuthUser;

/// Middleware function that requires authentication.
///
/// Used with `axum::middleware::from_fn_with_state`. On success the caller's
/// [`AuthUser`] is available to handlers as an `Extension`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // Try to get token from cookie first, then Authorization header
    let token = SessionCookies::new(&state.config, request.headers())
        .read_access_token()
        .or_else(|| extract_token_from_header(request.headers()))
        .ok_or(ApiError::MissingToken)?;

    let user_id = state.tokens.verify(&token).map_err(|e| {
        tracing::debug!("Rejected access token: {}", e);
        e
    })?;

    request.extensions_mut().insert(AuthUser { id: user_id });

    Ok(next.run(request).await)
}

fn extract_token_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
}
