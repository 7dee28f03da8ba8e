//! In-memory user store.
//!
//! Keyed by email; ids are assigned monotonically. State is scoped to the
//! process lifetime.

use crate::errors::AuthError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A stored user record.
#[derive(Debug, Clone)]
pub struct User {
    /// Assigned user id.
    pub id: i64,
    /// Unique email.
    pub email: String,
    /// bcrypt hash of the password. Never the plaintext.
    pub password_hash: String,
}

#[derive(Default)]
struct UserStore {
    by_email: HashMap<String, User>,
    next_id: i64,
}

/// In-memory user repository. Cheaply cloneable; clones share state.
#[derive(Clone, Default)]
pub struct UserRepository {
    store: Arc<RwLock<UserStore>>,
}

impl UserRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailTaken` if the email is already registered.
    pub async fn insert(&self, email: &str, password_hash: &str) -> Result<User, AuthError> {
        let mut store = self.store.write().await;

        if store.by_email.contains_key(email) {
            return Err(AuthError::EmailTaken);
        }

        store.next_id += 1;
        let user = User {
            id: store.next_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        store.by_email.insert(email.to_string(), user.clone());

        Ok(user)
    }

    /// Look up a user by email.
    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        let store = self.store.read().await;
        store.by_email.get(email).cloned()
    }
}
