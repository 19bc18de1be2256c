//! Unified error handling for the backend API.
//!
//! Every handler failure ends up as an [`ApiError`], which maps to a status
//! code and a fixed `{"error": "..."}` body. Causes of 5xx responses are
//! logged here and never sent to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::google::IdentityError;
use crate::auth::jwt::TokenError;
use crate::repository::StoreError;

/// API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Unified error type for API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// No access token cookie on a protected route
    #[error("Missing access token")]
    MissingToken,

    /// Refresh requested without a refresh token cookie
    #[error("No refresh token")]
    NoRefreshToken,

    /// Token verification or issuance failed
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Identity provider round trip failed
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// User store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// OAuth callback `state` does not match the nonce issued at login
    #[error("Invalid OAuth state")]
    InvalidState,

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Environment variable missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Create a not found error with a custom message
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound(resource.into())
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    /// Create a config error for missing env vars
    pub fn missing_env(var_name: &str) -> Self {
        ApiError::Config(format!("{} environment variable must be set", var_name))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            ApiError::MissingToken => (StatusCode::UNAUTHORIZED, self.to_string(), None),
            ApiError::NoRefreshToken => (StatusCode::UNAUTHORIZED, self.to_string(), None),
            ApiError::Token(e) => match e {
                TokenError::InvalidSignature => {
                    (StatusCode::UNAUTHORIZED, "Invalid token".to_string(), None)
                }
                TokenError::Expired => (
                    StatusCode::UNAUTHORIZED,
                    "Token expired".to_string(),
                    Some("POST /auth/refresh to renew the session".to_string()),
                ),
                TokenError::MalformedClaims => {
                    (StatusCode::UNAUTHORIZED, "Invalid claims".to_string(), None)
                }
                TokenError::Issuance(e) => {
                    tracing::error!("Token issuance error: {:?}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to create token".to_string(),
                        None,
                    )
                }
            },
            ApiError::Identity(e) => {
                tracing::error!("Identity provider error: {}", e);
                let message = match e {
                    IdentityError::ExchangeFailed(_) => "Token exchange failed",
                    IdentityError::ProfileFetchFailed(_) => "Failed to get user info",
                    IdentityError::MalformedProfile(_) => "Invalid user info",
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_string(), None)
            }
            ApiError::Store(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                    None,
                )
            }
            ApiError::InvalidState => (
                StatusCode::BAD_REQUEST,
                self.to_string(),
                Some("Start the login again from /auth/google/login".to_string()),
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                format!("{} not found", resource),
                None,
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
