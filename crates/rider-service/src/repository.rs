//! In-memory rider profile store.
//!
//! Creation is idempotent per originating user id: the inbound destination
//! is an at-least-once queue, so a redelivered `create-rider` must not mint
//! a second profile.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A rider profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    /// Assigned rider id.
    pub id: i64,
    /// Id of the user this profile belongs to.
    pub user_id: i64,
    /// Contact email.
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Default)]
struct RiderStore {
    by_id: HashMap<i64, Rider>,
    id_by_user: HashMap<i64, i64>,
    next_id: i64,
}

/// In-memory rider repository. Cheaply cloneable; clones share state.
#[derive(Clone, Default)]
pub struct RiderRepository {
    store: Arc<RwLock<RiderStore>>,
}

impl RiderRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a rider for `user_id`, or return the existing one.
    pub async fn create(
        &self,
        user_id: i64,
        email: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Rider {
        let mut store = self.store.write().await;

        if let Some(existing) = store
            .id_by_user
            .get(&user_id)
            .and_then(|id| store.by_id.get(id))
        {
            return existing.clone();
        }

        store.next_id += 1;
        let rider = Rider {
            id: store.next_id,
            user_id,
            email: email.to_string(),
            first_name,
            last_name,
        };
        store.id_by_user.insert(user_id, rider.id);
        store.by_id.insert(rider.id, rider.clone());

        rider
    }

    /// Look up a rider by id.
    pub async fn get(&self, id: i64) -> Option<Rider> {
        let store = self.store.read().await;
        store.by_id.get(&id).cloned()
    }
}
