//! Authentication module for JWT cookie sessions with Google OAuth login.
//!
//! This module provides:
//! - JWT access/refresh token issuance and verification
//! - Session cookie handling under an environment-selected policy
//! - The Google OAuth client behind the `IdentityProvider` trait
//! - `require_auth` middleware for protecting routes
//! - Handlers for login, callback, refresh, logout and `/api/me`

pub mod cookies;
pub mod google;
mod handlers;
pub mod jwt;
mod middleware;
pub mod types;

pub use cookies::{CookiePolicy, SameSitePolicy, SessionCookies};
pub use google::{GoogleIdentityProvider, IdentityProvider};
pub use handlers::{google_callback, google_login, logout, me, refresh_access_token};
pub use jwt::TokenService;
pub use middleware::require_auth;
pub use types::{AuthConfig, AuthUser};
