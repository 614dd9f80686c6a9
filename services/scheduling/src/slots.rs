//! Slot availability checks
//!
//! These answers are advisory. The authoritative exclusivity check happens
//! inside [`SessionStore::insert`] and [`SessionStore::update`], atomically
//! with the write.

use std::sync::Arc;
use uuid::Uuid;

use crate::{
    models::session::Slot,
    repositories::{SessionStore, StoreError},
    retry::RetryPolicy,
};

/// Answers whether a slot is held by an active session, platform-wide
#[derive(Clone)]
pub struct SlotAvailability {
    store: Arc<dyn SessionStore>,
    retry: RetryPolicy,
}

impl SlotAvailability {
    pub fn new(store: Arc<dyn SessionStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Whether an active session other than `exclude` holds `slot`
    pub async fn is_slot_taken(&self, slot: &Slot, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        self.retry
            .run("is_slot_taken", || self.store.is_slot_taken(slot, exclude))
            .await
    }

    /// Every slot held by an active session, ordered by date then time
    pub async fn booked_slots(&self) -> Result<Vec<Slot>, StoreError> {
        let mut slots = self
            .retry
            .run("active_slots", || self.store.active_slots())
            .await?;

        slots.sort_by_key(|slot| (slot.date, slot.time.minutes_of_day()));
        Ok(slots)
    }
}
