//! Shared fixtures for the scheduling integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use scheduling::{
    SessionService,
    clock::FixedClock,
    guard::{Actor, Role},
    models::{
        AssigneeKind, AssignRequest, CreateSessionRequest, DirectoryProfile,
        session::{Session, Slot},
    },
    notify::{Notifier, NotifyError, SessionEvent, SessionNotification},
    policy::BookingRules,
    repositories::{
        InMemoryDirectory, InMemorySessionStore, QuotaRule, SessionFilter, SessionStore,
        StoreError,
    },
    retry::RetryPolicy,
};

/// Sunday 2026-03-01, 09:00 UTC
pub fn march_first() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

/// Remembers every notification it is handed
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SessionNotification>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.sent.lock().unwrap().iter().map(|n| n.event).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &SessionNotification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Always fails delivery
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: &SessionNotification) -> Result<(), NotifyError> {
        Err(NotifyError::Status(502))
    }
}

/// Applies the first update, then stalls past the caller's timeout so the
/// acknowledgement never arrives
pub struct StallingStore {
    inner: InMemorySessionStore,
    stall: Duration,
    stalled: AtomicBool,
}

impl StallingStore {
    pub fn new(inner: InMemorySessionStore, stall: Duration) -> Self {
        Self {
            inner,
            stall,
            stalled: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SessionStore for StallingStore {
    async fn insert(&self, session: &Session, quota: &QuotaRule) -> Result<(), StoreError> {
        self.inner.insert(session, quota).await
    }

    async fn update(&self, session: &Session) -> Result<Session, StoreError> {
        let stored = self.inner.update(session).await?;
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.stall).await;
        }
        Ok(stored)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn is_slot_taken(&self, slot: &Slot, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        self.inner.is_slot_taken(slot, exclude).await
    }

    async fn count_active_booked_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        self.inner.count_active_booked_between(user_id, start, end).await
    }

    async fn active_slots(&self) -> Result<Vec<Slot>, StoreError> {
        self.inner.active_slots().await
    }

    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError> {
        self.inner.list(filter).await
    }
}

pub struct Harness {
    pub service: SessionService,
    pub store: InMemorySessionStore,
    pub directory: InMemoryDirectory,
    pub clock: FixedClock,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemorySessionStore::new();
        let directory = InMemoryDirectory::new();
        let clock = FixedClock::new(march_first());
        let notifier = Arc::new(RecordingNotifier::default());

        let service = SessionService::new(
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            Arc::new(clock.clone()),
            BookingRules::default(),
            RetryPolicy::default(),
        )
        .with_notifier(notifier.clone());

        Self {
            service,
            store,
            directory,
            clock,
            notifier,
        }
    }

    pub async fn add_mentor(&self, name: &str) -> Actor {
        self.add_profile(AssigneeKind::Mentor, name).await
    }

    pub async fn add_instructor(&self, name: &str) -> Actor {
        self.add_profile(AssigneeKind::Instructor, name).await
    }

    async fn add_profile(&self, kind: AssigneeKind, name: &str) -> Actor {
        let id = Uuid::new_v4();
        self.directory
            .add(DirectoryProfile {
                id,
                kind,
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                expertise: Some("Career growth".to_string()),
            })
            .await;

        let role = match kind {
            AssigneeKind::Mentor => Role::Mentor,
            AssigneeKind::Instructor => Role::Instructor,
        };
        Actor::new(id, role)
    }
}

pub fn user() -> Actor {
    Actor::new(Uuid::new_v4(), Role::User)
}

pub fn admin() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Admin)
}

pub fn booking(date: &str, time: &str) -> CreateSessionRequest {
    CreateSessionRequest {
        title: "Career Assistance".to_string(),
        date: date.to_string(),
        time: time.to_string(),
        notes: None,
        mentor_id: None,
        instructor_id: None,
    }
}

pub fn assign_mentor(mentor: &Actor) -> AssignRequest {
    AssignRequest {
        mentor_id: Some(mentor.id),
        instructor_id: None,
    }
}
