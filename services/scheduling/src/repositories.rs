//! Repositories for session persistence and directory lookups
//!
//! [`SessionStore`] is the only path to mutate sessions. Implementations must
//! make the slot-exclusivity and weekly-quota checks part of the same atomic
//! write as the insert or update they guard; a read followed by a separate
//! write is not acceptable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AssigneeKind, DirectoryProfile,
    session::{Session, Slot},
};

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryDirectory, InMemorySessionStore};
pub use postgres::{PgDirectory, PgSessionStore};

/// Errors raised by storage implementations
#[derive(Error, Debug)]
pub enum StoreError {
    /// An active session already holds the slot
    #[error("slot is held by another active session")]
    SlotTaken,

    /// The owner already holds the weekly maximum of active bookings
    #[error("weekly booking quota reached")]
    QuotaExceeded,

    /// The row changed since it was read
    #[error("session was modified concurrently")]
    VersionConflict,

    /// The row does not exist
    #[error("session not found")]
    NotFound,

    /// The call did not complete within the configured timeout
    #[error("storage call timed out")]
    Timeout,

    /// A stored row violates the domain model
    #[error("corrupt session row: {0}")]
    Corrupt(String),

    /// Underlying sqlx error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Failures worth one more attempt before giving up
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout => true,
            StoreError::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            // serialization_failure, deadlock_detected
            StoreError::Database(sqlx::Error::Database(e)) => {
                matches!(e.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

/// Weekly quota enforced atomically with an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRule {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub limit: u32,
}

/// Scope of a session listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFilter {
    All,
    User(Uuid),
    Mentor(Uuid),
    Instructor(Uuid),
}

/// Persistent record of mentorship sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session.
    ///
    /// Fails with `SlotTaken` if an active session holds the slot, and with
    /// `QuotaExceeded` if the owner already has `quota.limit` active sessions
    /// booked inside the quota window. Both are decided atomically with the
    /// insert.
    async fn insert(&self, session: &Session, quota: &QuotaRule) -> Result<(), StoreError>;

    /// Write back a modified session.
    ///
    /// `session.version` must be the version that was read; the write only
    /// applies if it is still current and returns the row with the bumped
    /// version. Fails with `SlotTaken` if the session is active and its
    /// (possibly new) slot is held by a different active session.
    async fn update(&self, session: &Session) -> Result<Session, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    /// Whether an active session other than `exclude` holds the slot
    async fn is_slot_taken(&self, slot: &Slot, exclude: Option<Uuid>) -> Result<bool, StoreError>;

    /// Active sessions of `user_id` with `booked_date` in `[start, end)`
    async fn count_active_booked_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32, StoreError>;

    /// Every slot currently held by an active session
    async fn active_slots(&self) -> Result<Vec<Slot>, StoreError>;

    /// Sessions in scope, in no particular order
    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError>;
}

/// Read-only view of mentor and instructor records
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find(
        &self,
        kind: AssigneeKind,
        id: Uuid,
    ) -> Result<Option<DirectoryProfile>, StoreError>;
}
