//! Repository abstraction over the user store.
//!
//! Handlers and the [`UserDirectory`](crate::users::UserDirectory) only see the
//! [`UserStore`] trait. Postgres backs it in production (`db::PgUserStore`);
//! [`MemoryUserStore`] backs tests and `serve --memory-store` runs and enforces
//! the same uniqueness constraints as the SQL schema.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use shared_types::{User, UserRole};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised by a [`UserStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection pool error
    #[error("Database connection error")]
    ConnectionPool(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    /// Database query error
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A unique constraint other than the external identity rejected the write
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// Stored data could not be mapped back into a domain type
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Input for creating a user from an external identity.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

/// Persistence operations the auth flow needs.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Get a single user by primary key.
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Get a user by their Google subject.
    async fn get_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user unless one with the same `google_id` already exists.
    ///
    /// Returns `None` when the row already existed. The check and the insert
    /// are a single atomic operation.
    async fn insert_if_absent(&self, new_user: &NewUser) -> Result<Option<User>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryTables {
    next_id: i64,
    users: BTreeMap<i64, User>,
}

/// In-memory user store.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn insert_if_absent(&self, new_user: &NewUser) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.write().await;

        if tables
            .users
            .values()
            .any(|u| u.google_id.as_deref() == Some(new_user.google_id.as_str()))
        {
            return Ok(None);
        }
        if tables.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }

        tables.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: tables.next_id,
            email: new_user.email.clone(),
            name: new_user.name.clone(),
            phone: None,
            role: new_user.role,
            restaurant_id: None,
            google_id: Some(new_user.google_id.clone()),
            hire_date: None,
            salary_type: None,
            salary_amount: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());

        Ok(Some(user))
    }
}
