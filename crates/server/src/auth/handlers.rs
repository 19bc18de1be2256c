//! Authentication HTTP handlers.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use shared_types::{MeResponse, MessageResponse};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

use super::cookies::{resolve_redirect, SessionCookies};
use super::types::AuthUser;

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Start Google OAuth login flow.
///
/// Remembers an optional post-login redirect, binds a fresh `state` nonce to
/// the browser and sends it to Google.
pub async fn google_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LoginParams>,
) -> Response {
    let config = &state.config;
    let mut cookies = SessionCookies::new(config, &headers);

    if let Some(target) = params.redirect.filter(|r| !r.trim().is_empty()) {
        if resolve_redirect(&config.frontend_url, &target).is_some() {
            cookies.stash_redirect(&target);
        } else {
            tracing::warn!("Ignoring login redirect outside the frontend: {}", target);
        }
    }

    let nonce = uuid::Uuid::new_v4().simple().to_string();
    cookies.stash_state(&nonce);

    let auth_url = state.identity.authorization_url(&nonce);
    cookies.apply(found(&auth_url))
}

/// Handle Google OAuth callback.
///
/// Exchanges the authorization code, finds or creates the local user, sets
/// both session cookies and redirects to the stashed target.
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Response> {
    if params.code.is_empty() {
        return Err(ApiError::bad_request("Code not found"));
    }

    let mut cookies = SessionCookies::new(&state.config, &headers);

    let expected = cookies.take_state();
    if params.state.is_empty() || expected.as_deref() != Some(params.state.as_str()) {
        tracing::warn!("OAuth callback with mismatched state");
        return Ok(cookies.apply(ApiError::InvalidState));
    }

    let issued = async {
        let external_token = state.identity.exchange_code(&params.code).await?;
        let profile = state.identity.fetch_profile(&external_token).await?;

        tracing::info!("OAuth login attempt from: {}", profile.email);

        let user = state
            .users
            .find_or_create_by_external_id(&profile.external_id, &profile.email, &profile.name)
            .await?;

        let access_token = state.tokens.issue_access_token(user.id)?;
        let refresh_token = state.tokens.issue_refresh_token(user.id)?;
        Ok::<_, ApiError>((user, access_token, refresh_token))
    }
    .await;

    let (user, access_token, refresh_token) = match issued {
        Ok(issued) => issued,
        Err(e) => {
            // Handshake cookies are single use, failed logins included
            cookies.pop_redirect();
            return Ok(cookies.apply(e));
        }
    };
    cookies.set_session(&access_token, &refresh_token);

    let destination = cookies.pop_redirect();

    tracing::info!("Successful login for: {}", user.email);

    Ok(cookies.apply(found(&destination)))
}

/// Issue a new access token from the refresh token cookie.
///
/// The new token is only ever delivered as the `access_token` cookie.
pub async fn refresh_access_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let mut cookies = SessionCookies::new(&state.config, &headers);

    let refresh_token = cookies.read_refresh_token().ok_or(ApiError::NoRefreshToken)?;
    let user_id = state.tokens.verify(&refresh_token)?;
    let access_token = state.tokens.issue_access_token(user_id)?;
    cookies.set_access_only(&access_token);

    tracing::debug!("Refreshed access token for user {}", user_id);

    Ok(cookies.apply(Json(MessageResponse::new("Access token refreshed"))))
}

/// Logout - clear both session cookies.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut cookies = SessionCookies::new(&state.config, &headers);
    cookies.clear_session();
    cookies.apply(Json(MessageResponse::new("Logged out successfully")))
}

/// Get current authenticated user info.
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<MeResponse>> {
    let user = state
        .users
        .find_by_id(auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(user.into()))
}
