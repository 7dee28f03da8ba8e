//! In-memory coordinate history, keyed by rider id.
//!
//! Samples are appended in arrival order. A rider with no samples reads as
//! an empty history rather than an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One recorded location sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
    /// Server-side arrival timestamp.
    pub recorded_at: DateTime<Utc>,
}

/// In-memory coordinate store. Cheaply cloneable; clones share state.
#[derive(Clone, Default)]
pub struct CoordinateStore {
    by_rider: Arc<RwLock<HashMap<i64, Vec<Coordinate>>>>,
}

impl CoordinateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample to a rider's history and return it with its
    /// assigned timestamp.
    pub async fn save(&self, rider: i64, lat: f64, lng: f64) -> Coordinate {
        let sample = Coordinate {
            lat,
            lng,
            recorded_at: Utc::now(),
        };

        let mut by_rider = self.by_rider.write().await;
        by_rider.entry(rider).or_default().push(sample.clone());

        sample
    }

    /// Read a rider's full history, oldest first.
    pub async fn history(&self, rider: i64) -> Vec<Coordinate> {
        let by_rider = self.by_rider.read().await;
        by_rider.get(&rider).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_preserves_arrival_order() {
        let store = CoordinateStore::new();

        store.save(1, 52.52, 13.40).await;
        store.save(1, 52.53, 13.41).await;

        let history = store.history(1).await;
        assert_eq!(history.len(), 2);
        assert!((history[0].lat - 52.52).abs() < f64::EPSILON);
        assert!((history[1].lat - 52.53).abs() < f64::EPSILON);
        assert!(history[0].recorded_at <= history[1].recorded_at);
    }

    #[tokio::test]
    async fn test_histories_are_per_rider() {
        let store = CoordinateStore::new();

        store.save(1, 0.0, 0.0).await;
        store.save(2, 1.0, 1.0).await;

        assert_eq!(store.history(1).await.len(), 1);
        assert_eq!(store.history(2).await.len(), 1);
        assert!(store.history(3).await.is_empty());
    }
}
