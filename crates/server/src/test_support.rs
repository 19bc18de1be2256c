//! Fixtures shared by the unit tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::Duration;
use url::Url;

use crate::auth::google::{ExternalProfile, ExternalToken, IdentityError, IdentityProvider};
use crate::auth::{AuthConfig, CookiePolicy};
use crate::repository::MemoryUserStore;
use crate::AppState;

pub fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret-key-for-testing-only".to_string(),
        access_token_ttl: Duration::minutes(30),
        refresh_token_ttl: Duration::days(30),
        google_client_id: "test-client-id".to_string(),
        google_client_secret: "test-client-secret".to_string(),
        google_redirect_url: "http://localhost:8080/auth/google/callback".to_string(),
        frontend_url: Url::parse("http://localhost:5173/").unwrap(),
        cookie_policy: CookiePolicy::default(),
    }
}

/// Identity provider that hands out a fixed profile.
///
/// The code `bad-code` fails the exchange.
pub struct FakeIdentityProvider {
    profile: ExternalProfile,
    exchanges: AtomicUsize,
}

impl FakeIdentityProvider {
    pub fn new(external_id: &str, email: &str, name: &str) -> Self {
        Self {
            profile: ExternalProfile {
                external_id: external_id.to_string(),
                email: email.to_string(),
                name: name.to_string(),
            },
            exchanges: AtomicUsize::new(0),
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "https://accounts.example.com/o/oauth2/auth?state={}",
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalToken, IdentityError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == "bad-code" {
            return Err(IdentityError::ExchangeFailed("400 - invalid_grant".to_string()));
        }
        Ok(ExternalToken {
            access_token: format!("fake-token-{}", code),
        })
    }

    async fn fetch_profile(&self, _token: &ExternalToken) -> Result<ExternalProfile, IdentityError> {
        Ok(self.profile.clone())
    }
}

/// App state wired to a fake provider for `g123` / `a@b.com` and an empty in-memory store.
pub fn test_state() -> (AppState, Arc<FakeIdentityProvider>, Arc<MemoryUserStore>) {
    let identity = Arc::new(FakeIdentityProvider::new("g123", "a@b.com", "Alice"));
    let store = Arc::new(MemoryUserStore::new());
    let state = AppState::new(test_config(), identity.clone(), store.clone());
    (state, identity, store)
}
