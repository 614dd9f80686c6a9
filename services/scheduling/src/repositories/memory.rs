//! In-process session store and directory
//!
//! Used by tests and local development. Every check that guards a write is
//! evaluated while holding the same lock as the write itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Directory, QuotaRule, SessionFilter, SessionStore, StoreError};
use crate::models::{
    AssigneeKind, DirectoryProfile,
    session::{Session, Slot},
};

/// Session store backed by a mutex-guarded map
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions in any status
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

fn slot_held(sessions: &HashMap<Uuid, Session>, slot: &Slot, exclude: Option<Uuid>) -> bool {
    sessions.values().any(|s| {
        s.status.is_active()
            && Some(s.id) != exclude
            && s.date == slot.date
            && s.time == slot.time
    })
}

fn active_booked_between(
    sessions: &HashMap<Uuid, Session>,
    user_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> u32 {
    sessions
        .values()
        .filter(|s| {
            s.user_id == user_id
                && s.status.is_active()
                && s.booked_date >= start
                && s.booked_date < end
        })
        .count() as u32
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: &Session, quota: &QuotaRule) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;

        if sessions.contains_key(&session.id) {
            return Ok(());
        }

        if slot_held(&sessions, &session.slot(), None) {
            return Err(StoreError::SlotTaken);
        }

        let held = active_booked_between(
            &sessions,
            session.user_id,
            quota.window_start,
            quota.window_end,
        );
        if held >= quota.limit {
            return Err(StoreError::QuotaExceeded);
        }

        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn update(&self, session: &Session) -> Result<Session, StoreError> {
        let mut sessions = self.sessions.lock().await;

        let current = sessions.get(&session.id).ok_or(StoreError::NotFound)?;
        if current.version != session.version {
            return Err(StoreError::VersionConflict);
        }

        if session.status.is_active() && slot_held(&sessions, &session.slot(), Some(session.id)) {
            return Err(StoreError::SlotTaken);
        }

        let mut stored = session.clone();
        stored.version += 1;
        sessions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().await.get(&id).cloned())
    }

    async fn is_slot_taken(&self, slot: &Slot, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        Ok(slot_held(&*self.sessions.lock().await, slot, exclude))
    }

    async fn count_active_booked_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        Ok(active_booked_between(
            &*self.sessions.lock().await,
            user_id,
            start,
            end,
        ))
    }

    async fn active_slots(&self) -> Result<Vec<Slot>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .await
            .values()
            .filter(|s| s.status.is_active())
            .map(Session::slot)
            .collect())
    }

    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .await
            .values()
            .filter(|s| match filter {
                SessionFilter::All => true,
                SessionFilter::User(id) => s.user_id == id,
                SessionFilter::Mentor(id) => s.assignment.mentor_id() == Some(id),
                SessionFilter::Instructor(id) => s.assignment.instructor_id() == Some(id),
            })
            .cloned()
            .collect())
    }
}

/// Directory backed by a mutex-guarded map
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    profiles: Arc<Mutex<HashMap<(AssigneeKind, Uuid), DirectoryProfile>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, profile: DirectoryProfile) {
        self.profiles
            .lock()
            .await
            .insert((profile.kind, profile.id), profile);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find(
        &self,
        kind: AssigneeKind,
        id: Uuid,
    ) -> Result<Option<DirectoryProfile>, StoreError> {
        Ok(self.profiles.lock().await.get(&(kind, id)).cloned())
    }
}
