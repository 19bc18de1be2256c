//! Local user records keyed by external identity.

use std::sync::Arc;

use shared_types::{User, UserRole};

use crate::repository::{NewUser, StoreError, UserStore};

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.store.get_by_id(id).await
    }

    /// Find the user linked to `external_id`, creating an owner account on first login.
    ///
    /// Concurrent calls for the same `external_id` resolve to a single row: the
    /// insert is skipped by the store's uniqueness constraint and the loser
    /// re-reads the winner's record.
    pub async fn find_or_create_by_external_id(
        &self,
        external_id: &str,
        email: &str,
        name: &str,
    ) -> Result<User, StoreError> {
        if let Some(user) = self.store.get_by_google_id(external_id).await? {
            return Ok(user);
        }

        let new_user = NewUser {
            google_id: external_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role: UserRole::Owner,
        };

        if let Some(user) = self.store.insert_if_absent(&new_user).await? {
            tracing::info!("Created owner account {} for {}", user.id, user.email);
            return Ok(user);
        }

        self.store
            .get_by_google_id(external_id)
            .await?
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "user with google_id {} vanished after conflicting insert",
                    external_id
                ))
            })
    }
}
