//! Cached projection of booked slots
//!
//! Clients use it to gray out taken slots. It is eventually consistent:
//! entries expire after a short TTL and every mutation drops the key, but a
//! booking is always re-validated by the store regardless of what the
//! projection said.

use common::cache::RedisPool;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    models::BookedSlot,
    repositories::StoreError,
    slots::SlotAvailability,
};

const BOOKED_SLOTS_KEY: &str = "scheduling:booked_slots";

#[derive(Clone)]
pub struct BookedSlotsProjection {
    slots: SlotAvailability,
    cache: Option<RedisPool>,
    ttl: Duration,
}

impl BookedSlotsProjection {
    pub fn new(slots: SlotAvailability, cache: Option<RedisPool>, ttl: Duration) -> Self {
        Self { slots, cache, ttl }
    }

    /// Every slot held by an active session
    pub async fn booked_slots(&self) -> Result<Vec<BookedSlot>, StoreError> {
        if let Some(cached) = self.read_cache().await {
            return Ok(cached);
        }

        let booked: Vec<BookedSlot> = self
            .slots
            .booked_slots()
            .await?
            .into_iter()
            .map(BookedSlot::from)
            .collect();

        self.write_cache(&booked).await;
        Ok(booked)
    }

    /// Drop the cached copy after a mutation
    pub async fn invalidate(&self) {
        let Some(cache) = &self.cache else {
            return;
        };

        if let Err(e) = cache.delete(BOOKED_SLOTS_KEY).await {
            warn!("Failed to invalidate booked slots cache: {}", e);
        }
    }

    async fn read_cache(&self) -> Option<Vec<BookedSlot>> {
        let cache = self.cache.as_ref()?;

        match cache.get(BOOKED_SLOTS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(slots) => {
                    debug!("Serving booked slots from cache");
                    Some(slots)
                }
                Err(e) => {
                    warn!("Discarding unreadable booked slots cache entry: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Booked slots cache unavailable: {}", e);
                None
            }
        }
    }

    async fn write_cache(&self, booked: &[BookedSlot]) {
        let Some(cache) = &self.cache else {
            return;
        };

        let raw = match serde_json::to_string(booked) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode booked slots: {}", e);
                return;
            }
        };

        if let Err(e) = cache
            .set(BOOKED_SLOTS_KEY, &raw, Some(self.ttl.as_secs().max(1)))
            .await
        {
            warn!("Failed to cache booked slots: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::{Assignment, NewSession, Session, Slot, TimeSlot};
    use crate::repositories::{InMemorySessionStore, QuotaRule, SessionStore};
    use crate::retry::RetryPolicy;
    use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
    use common::cache::RedisConfig;
    use std::sync::Arc;
    use uuid::Uuid;

    async fn store_with_one_booking() -> InMemorySessionStore {
        let store = InMemorySessionStore::new();
        let now = Utc::now();
        let session = Session::book(
            NewSession {
                user_id: Uuid::new_v4(),
                title: "System design".to_string(),
                notes: None,
                slot: Slot {
                    date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
                    time: TimeSlot::parse("6:00pm").unwrap(),
                },
                requested: Assignment::Unassigned,
            },
            now,
        );
        let quota = QuotaRule {
            window_start: now - ChronoDuration::days(1),
            window_end: now + ChronoDuration::days(1),
            limit: 3,
        };
        store.insert(&session, &quota).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_without_cache_reads_store() {
        let store = store_with_one_booking().await;
        let projection = BookedSlotsProjection::new(
            SlotAvailability::new(Arc::new(store), RetryPolicy::default()),
            None,
            Duration::from_secs(30),
        );

        let booked = projection.booked_slots().await.unwrap();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].time, "6:00pm");
        projection.invalidate().await;
    }

    #[tokio::test]
    async fn test_unreachable_cache_falls_back_to_store() {
        let store = store_with_one_booking().await;
        let cache = RedisPool::new(&RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
        })
        .unwrap();
        let projection = BookedSlotsProjection::new(
            SlotAvailability::new(Arc::new(store), RetryPolicy::default()),
            Some(cache),
            Duration::from_secs(30),
        );

        assert_eq!(projection.booked_slots().await.unwrap().len(), 1);
        projection.invalidate().await;
    }
}
