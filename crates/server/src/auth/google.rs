//! Google OAuth2 client: authorization URL, code exchange and userinfo lookup.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::AuthConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("token exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("failed to get user info: {0}")]
    ProfileFetchFailed(String),

    #[error("invalid user info: {0}")]
    MalformedProfile(String),
}

/// Provider access token obtained from an authorization code.
#[derive(Debug, Clone)]
pub struct ExternalToken {
    pub access_token: String,
}

/// Verified profile claims returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub external_id: String,
    pub email: String,
    pub name: String,
}

/// Stateless client for an OAuth2 identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to; `state` comes back on the callback untouched.
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<ExternalToken, IdentityError>;

    async fn fetch_profile(&self, token: &ExternalToken) -> Result<ExternalProfile, IdentityError>;
}

#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub authorize: String,
    pub token: String,
    pub userinfo: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            authorize: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token: "https://oauth2.googleapis.com/token".to_string(),
            userinfo: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
        }
    }
}

pub struct GoogleIdentityProvider {
    client: reqwest::Client,
    endpoints: GoogleEndpoints,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    name: Option<String>,
}

impl GoogleIdentityProvider {
    pub fn new(config: &AuthConfig) -> reqwest::Result<Self> {
        Self::with_endpoints(config, GoogleEndpoints::default())
    }

    pub fn with_endpoints(config: &AuthConfig, endpoints: GoogleEndpoints) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoints,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_url: config.google_redirect_url.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope={}&\
             access_type=offline&\
             state={}",
            self.endpoints.authorize,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_url),
            urlencoding::encode("openid email profile"),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalToken, IdentityError> {
        let response = self
            .client
            .post(&self.endpoints.token)
            .form(&TokenRequest {
                code,
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                redirect_uri: &self.redirect_url,
                grant_type: "authorization_code",
            })
            .send()
            .await
            .map_err(|e| IdentityError::ExchangeFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::ExchangeFailed(format!("{} - {}", status, body)));
        }

        let tokens: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::ExchangeFailed(format!("invalid token response: {}", e)))?;

        Ok(ExternalToken {
            access_token: tokens.access_token,
        })
    }

    async fn fetch_profile(&self, token: &ExternalToken) -> Result<ExternalProfile, IdentityError> {
        let response = self
            .client
            .get(&self.endpoints.userinfo)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| IdentityError::ProfileFetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::ProfileFetchFailed(format!(
                "userinfo returned {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| IdentityError::ProfileFetchFailed(e.to_string()))?;
        let info: GoogleUserInfo = serde_json::from_slice(&body)
            .map_err(|e| IdentityError::MalformedProfile(e.to_string()))?;

        if info.sub.is_empty() || info.email.is_empty() {
            return Err(IdentityError::MalformedProfile(
                "userinfo is missing sub or email".to_string(),
            ));
        }

        Ok(ExternalProfile {
            external_id: info.sub,
            email: info.email,
            name: info.name.unwrap_or_default(),
        })
    }
}
