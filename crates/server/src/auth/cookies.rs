//! Session cookies: reading the tokens a browser sends and writing the ones it should keep.
//!
//! Every cookie is `HttpOnly` and scoped to `/`. Whether it is `Secure`, which
//! domain it is scoped to and its `SameSite` mode come from a single
//! [`CookiePolicy`] chosen at startup.

use axum::{
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use cookie::{Cookie, SameSite};
use url::Url;

use super::types::AuthConfig;
use crate::error::ApiError;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const REDIRECT_COOKIE: &str = "redirect_after_login";
pub const STATE_COOKIE: &str = "oauth_state";

/// Lifetime of the cookies that only live for one login handshake.
const HANDSHAKE_TTL_SECS: i64 = 10 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        }
    }
}

/// Environment-dependent cookie attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    /// Shared parent domain such as `.example.com`; `None` keeps cookies host-only
    pub domain: Option<String>,
    pub same_site: SameSitePolicy,
}

impl Default for CookiePolicy {
    /// Local development: host-only, plain HTTP.
    fn default() -> Self {
        Self {
            secure: false,
            domain: None,
            same_site: SameSitePolicy::Lax,
        }
    }
}

impl CookiePolicy {
    /// Reads `COOKIE_SECURE`, `COOKIE_DOMAIN` and `COOKIE_SAME_SITE`.
    pub(crate) fn from_lookup<F>(lookup: &F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut secure = match lookup("COOKIE_SECURE").as_deref().map(str::trim) {
            None | Some("") => false,
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                return Err(ApiError::Config(format!(
                    "COOKIE_SECURE must be true or false, got {:?}",
                    other
                )))
            }
        };

        let domain = lookup("COOKIE_DOMAIN")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let same_site = match lookup("COOKIE_SAME_SITE")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("") | Some("lax") => SameSitePolicy::Lax,
            Some("strict") => SameSitePolicy::Strict,
            Some("none") => SameSitePolicy::None,
            Some(other) => {
                return Err(ApiError::Config(format!(
                    "COOKIE_SAME_SITE must be lax, strict or none, got {:?}",
                    other
                )))
            }
        };

        // Browsers drop SameSite=None cookies that are not Secure
        if same_site == SameSitePolicy::None && !secure {
            tracing::warn!("COOKIE_SAME_SITE=none requires Secure cookies; enabling COOKIE_SECURE");
            secure = true;
        }

        Ok(Self {
            secure,
            domain,
            same_site,
        })
    }

    fn build(&self, name: &str, value: &str, max_age_secs: i64) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value.to_string()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site.into())
            .max_age(time::Duration::seconds(max_age_secs));
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }

    fn removal(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.build(name, "", 0);
        cookie.make_removal();
        cookie
    }
}

/// Resolve a post-login redirect target against the frontend URL.
///
/// Relative paths are joined onto `frontend`; absolute URLs are accepted only
/// when they share its origin. Anything else yields `None`.
pub fn resolve_redirect(frontend: &Url, target: &str) -> Option<String> {
    let resolved = frontend.join(target.trim()).ok()?;
    (resolved.origin() == frontend.origin()).then(|| resolved.to_string())
}

/// Cookie view of one request/response pair.
///
/// Reads come from the request headers; writes are collected and attached to
/// the response with [`SessionCookies::apply`].
pub struct SessionCookies<'a> {
    config: &'a AuthConfig,
    incoming: &'a HeaderMap,
    outgoing: Vec<Cookie<'static>>,
}

impl<'a> SessionCookies<'a> {
    pub fn new(config: &'a AuthConfig, incoming: &'a HeaderMap) -> Self {
        Self {
            config,
            incoming,
            outgoing: Vec::new(),
        }
    }

    pub fn set_session(&mut self, access_token: &str, refresh_token: &str) {
        self.set_access_only(access_token);
        let max_age = self.config.refresh_token_ttl.num_seconds();
        self.push(REFRESH_COOKIE, refresh_token, max_age);
    }

    pub fn set_access_only(&mut self, access_token: &str) {
        let max_age = self.config.access_token_ttl.num_seconds();
        self.push(ACCESS_COOKIE, access_token, max_age);
    }

    pub fn clear_session(&mut self) {
        self.remove(ACCESS_COOKIE);
        self.remove(REFRESH_COOKIE);
    }

    pub fn read_access_token(&self) -> Option<String> {
        read_cookie(self.incoming, ACCESS_COOKIE)
    }

    pub fn read_refresh_token(&self) -> Option<String> {
        read_cookie(self.incoming, REFRESH_COOKIE)
    }

    pub fn stash_redirect(&mut self, url: &str) {
        self.push(REDIRECT_COOKIE, url, HANDSHAKE_TTL_SECS);
    }

    /// Take the stashed redirect target, falling back to the frontend URL.
    /// The stash cookie is always cleared.
    pub fn pop_redirect(&mut self) -> String {
        let stashed = read_cookie(self.incoming, REDIRECT_COOKIE);
        self.remove(REDIRECT_COOKIE);

        stashed
            .and_then(|target| resolve_redirect(&self.config.frontend_url, &target))
            .unwrap_or_else(|| self.config.frontend_url.to_string())
    }

    pub fn stash_state(&mut self, nonce: &str) {
        self.push(STATE_COOKIE, nonce, HANDSHAKE_TTL_SECS);
    }

    /// Take the login nonce bound to this browser and clear it.
    pub fn take_state(&mut self) -> Option<String> {
        let state = read_cookie(self.incoming, STATE_COOKIE);
        self.remove(STATE_COOKIE);
        state
    }

    /// Attach every pending `Set-Cookie` to `response`.
    pub fn apply(self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        for cookie in self.outgoing {
            match HeaderValue::from_str(&cookie.encoded().to_string()) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::error!("Dropping unencodable cookie {}: {}", cookie.name(), e),
            }
        }
        response
    }

    fn push(&mut self, name: &str, value: &str, max_age_secs: i64) {
        self.outgoing
            .push(self.config.cookie_policy.build(name, value, max_age_secs));
    }

    fn remove(&mut self, name: &str) {
        self.outgoing.push(self.config.cookie_policy.removal(name));
    }
}

/// Find a non-empty cookie value in the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse_encoded(raw).flatten())
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
