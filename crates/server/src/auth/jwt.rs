//! JWT token creation and validation.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use thiserror::Error;

use super::types::{AuthConfig, Claims};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signature does not verify")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token claims are malformed")]
    MalformedClaims,

    #[error("failed to sign token: {0}")]
    Issuance(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            // Only reachable once the signature has been checked
            ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::MissingRequiredClaim(_) => {
                TokenError::MalformedClaims
            }
            _ => TokenError::InvalidSignature,
        }
    }
}

/// Issues and verifies the access and refresh tokens.
///
/// Both kinds share the secret and claim shape and differ only in lifetime.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    pub fn issue_access_token(&self, user_id: i64) -> Result<String, TokenError> {
        self.issue(user_id, self.access_ttl)
    }

    pub fn issue_refresh_token(&self, user_id: i64) -> Result<String, TokenError> {
        self.issue(user_id, self.refresh_ttl)
    }

    fn issue(&self, user_id: i64, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Issuance)
    }

    /// Validate a token and return the user id it was issued for.
    pub fn verify(&self, token: &str) -> Result<i64, TokenError> {
        // A header we cannot read was not produced by us
        decode_header(token).map_err(|_| TokenError::InvalidSignature)?;

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        // jsonwebtoken still accepts exp == now
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        data.claims
            .sub
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(TokenError::MalformedClaims)
    }
}
