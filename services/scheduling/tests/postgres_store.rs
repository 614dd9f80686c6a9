//! PostgreSQL store guarantees
//!
//! Requires a running PostgreSQL reachable through `DATABASE_URL`:
//! `cargo test -p scheduling --test postgres_store -- --ignored`

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use common::database::{DatabaseConfig, init_pool, run_migrations};
use scheduling::{
    models::session::{Assignment, NewSession, Session, SessionStatus, Slot, TimeSlot},
    repositories::{PgSessionStore, QuotaRule, SessionFilter, SessionStore, StoreError},
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

async fn store() -> PgSessionStore {
    let config = DatabaseConfig::from_env().expect("database config");
    let pool = init_pool(&config).await.expect("database pool");
    run_migrations(&pool, &MIGRATOR).await.expect("migrations");
    PgSessionStore::new(pool)
}

/// A slot no other run is likely to use
fn fresh_slot() -> Slot {
    let offset = (Uuid::new_v4().as_u128() % 36_500) as i64;
    Slot {
        date: NaiveDate::from_ymd_opt(2100, 1, 1).unwrap() + Duration::days(offset),
        time: TimeSlot::parse("6:00pm").unwrap(),
    }
}

fn booking(user_id: Uuid, slot: Slot) -> Session {
    Session::book(
        NewSession {
            user_id,
            title: "Database-backed booking".to_string(),
            notes: Some("integration".to_string()),
            slot,
            requested: Assignment::Unassigned,
        },
        Utc::now(),
    )
}

fn this_week(limit: u32) -> QuotaRule {
    let now = Utc::now();
    QuotaRule {
        window_start: now - Duration::hours(1),
        window_end: now + Duration::hours(1),
        limit,
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_unique_index_rejects_concurrent_slot_holders() {
    let store = Arc::new(store().await);
    let slot = fresh_slot();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let session = booking(Uuid::new_v4(), slot.clone());
            tokio::spawn(async move { store.insert(&session, &this_week(3)).await })
        })
        .collect();

    let mut stored = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => stored += 1,
            Err(StoreError::SlotTaken) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(stored, 1);
    assert!(store.is_slot_taken(&slot, None).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_quota_is_enforced_inside_the_insert() {
    let store = Arc::new(store().await);
    let user = Uuid::new_v4();

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let store = store.clone();
            let session = booking(user, fresh_slot());
            tokio::spawn(async move { store.insert(&session, &this_week(2)).await })
        })
        .collect();

    let mut stored = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => stored += 1,
            Err(StoreError::QuotaExceeded) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(stored, 2);
    assert_eq!(store.list(SessionFilter::User(user)).await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_update_is_compare_and_swap() {
    let store = store().await;
    let session = booking(Uuid::new_v4(), fresh_slot());
    store.insert(&session, &this_week(3)).await.unwrap();

    // Retried insert of the same row is a no-op.
    store.insert(&session, &this_week(3)).await.unwrap();

    let mut assigned = session.clone();
    assigned.assignment = Assignment::Mentor(Uuid::new_v4());
    assigned.status = SessionStatus::MentorAssigned;
    let stored = store.update(&assigned).await.unwrap();
    assert_eq!(stored.version, session.version + 1);
    assert_eq!(stored.assignment, assigned.assignment);

    let mut stale = session.clone();
    stale.status = SessionStatus::Cancelled;
    assert!(matches!(
        store.update(&stale).await,
        Err(StoreError::VersionConflict)
    ));

    let mut cancelled = stored.clone();
    cancelled.status = SessionStatus::Cancelled;
    store.update(&cancelled).await.unwrap();
    assert!(!store.is_slot_taken(&session.slot(), None).await.unwrap());

    let mut ghost = booking(Uuid::new_v4(), fresh_slot());
    ghost.id = Uuid::new_v4();
    assert!(matches!(store.update(&ghost).await, Err(StoreError::NotFound)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_unique_index_rejects_concurrent_moves_into_one_slot() {
    let store = Arc::new(store().await);
    let target = fresh_slot();

    let mut sessions = Vec::new();
    for _ in 0..4 {
        let session = booking(Uuid::new_v4(), fresh_slot());
        store.insert(&session, &this_week(3)).await.unwrap();
        sessions.push(session);
    }

    let tasks: Vec<_> = sessions
        .into_iter()
        .map(|mut session| {
            let store = store.clone();
            session.date = target.date;
            session.time = target.time.clone();
            session.status = SessionStatus::Rescheduled;
            tokio::spawn(async move { store.update(&session).await })
        })
        .collect();

    let mut moved = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => moved += 1,
            Err(StoreError::SlotTaken) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(moved, 1);
    assert!(store.is_slot_taken(&target, None).await.unwrap());
}
