//! Auth-related types and configuration.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use url::Url;

use super::cookies::CookiePolicy;
use crate::error::ApiError;

pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 30 * 60;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173/";

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (numeric user id, as a decimal string)
    pub sub: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Identity attached to a request by `require_auth`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
}

/// Auth configuration loaded from environment
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_url: String,
    /// Default post-login destination; redirect targets must share its origin
    pub frontend_url: Url,
    pub cookie_policy: CookiePolicy,
}

// Secrets are left out so the config can be logged at startup
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_ttl_secs", &self.access_token_ttl.num_seconds())
            .field("refresh_token_ttl_days", &self.refresh_token_ttl.num_days())
            .field("google_client_id", &self.google_client_id)
            .field("google_redirect_url", &self.google_redirect_url)
            .field("frontend_url", &self.frontend_url.as_str())
            .field("cookie_policy", &self.cookie_policy)
            .finish_non_exhaustive()
    }
}

impl AuthConfig {
    /// Load auth configuration from environment variables.
    ///
    /// Required env vars:
    /// - `JWT_SECRET`: Secret key for signing JWTs
    /// - `GOOGLE_CLIENT_ID`: Google OAuth client ID
    /// - `GOOGLE_CLIENT_SECRET`: Google OAuth client secret
    /// - `GOOGLE_REDIRECT_URL`: OAuth callback URL registered with Google
    ///
    /// Optional: `ACCESS_TOKEN_TTL_SECS`, `FRONTEND_URL` and the cookie
    /// variables read by [`CookiePolicy`].
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ApiError::missing_env(key))
        };

        let access_ttl_secs = match lookup("ACCESS_TOKEN_TTL_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    ApiError::Config(format!(
                        "ACCESS_TOKEN_TTL_SECS must be a positive integer, got {:?}",
                        raw
                    ))
                })?,
            None => DEFAULT_ACCESS_TOKEN_TTL_SECS,
        };

        let frontend_raw =
            lookup("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());
        let frontend_url = Url::parse(&frontend_raw)
            .map_err(|e| ApiError::Config(format!("FRONTEND_URL is not a valid URL: {}", e)))?;

        Ok(Self {
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: Duration::seconds(access_ttl_secs),
            refresh_token_ttl: Duration::days(REFRESH_TOKEN_TTL_DAYS),
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            google_redirect_url: required("GOOGLE_REDIRECT_URL")?,
            frontend_url,
            cookie_policy: CookiePolicy::from_lookup(&lookup)?,
        })
    }
}
