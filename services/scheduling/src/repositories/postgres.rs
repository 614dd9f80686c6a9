//! PostgreSQL session store and directory
//!
//! Slot exclusivity is enforced by the partial unique index
//! `mentorship_sessions_active_slot`; a violation of it is reported as
//! [`StoreError::SlotTaken`]. The weekly quota is re-counted inside the
//! insert transaction while holding a per-user advisory lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::debug;
use uuid::Uuid;

use super::{Directory, QuotaRule, SessionFilter, SessionStore, StoreError};
use crate::models::{
    AssigneeKind, DirectoryProfile,
    session::{Assignment, Session, SessionStatus, Slot, TimeSlot},
};

const ACTIVE_SLOT_INDEX: &str = "mentorship_sessions_active_slot";

const SELECT_COLS: &str = "id, user_id, mentor_id, instructor_id, requested_mentor_id, \
     requested_instructor_id, title, notes, session_date, time_slot, status, meeting_link, \
     rejection_reason, reschedule_reason, original_date, original_time, completed_at, \
     booked_date, created_at, updated_at, version";

fn active_statuses() -> Vec<&'static str> {
    SessionStatus::ACTIVE.iter().map(|s| s.as_str()).collect()
}

fn row_to_session(row: &PgRow) -> Result<Session, StoreError> {
    let id: Uuid = row.try_get("id")?;

    let assignment = Assignment::from_columns(row.try_get("mentor_id")?, row.try_get("instructor_id")?)
        .map_err(|e| StoreError::Corrupt(format!("session {}: {}", id, e)))?;
    let requested = Assignment::from_columns(
        row.try_get("requested_mentor_id")?,
        row.try_get("requested_instructor_id")?,
    )
    .map_err(|e| StoreError::Corrupt(format!("session {}: {}", id, e)))?;

    let status: String = row.try_get("status")?;
    let status = status
        .parse::<SessionStatus>()
        .map_err(|e| StoreError::Corrupt(format!("session {}: {}", id, e)))?;

    Ok(Session {
        id,
        user_id: row.try_get("user_id")?,
        assignment,
        requested,
        title: row.try_get("title")?,
        notes: row.try_get("notes")?,
        date: row.try_get("session_date")?,
        time: TimeSlot::from_stored(row.try_get("time_slot")?),
        status,
        meeting_link: row.try_get("meeting_link")?,
        rejection_reason: row.try_get("rejection_reason")?,
        reschedule_reason: row.try_get("reschedule_reason")?,
        original_date: row.try_get("original_date")?,
        original_time: row
            .try_get::<Option<String>, _>("original_time")?
            .map(TimeSlot::from_stored),
        completed_at: row.try_get("completed_at")?,
        booked_date: row.try_get("booked_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
    })
}

/// Translate the active-slot unique violation into a typed error
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() && db.constraint() == Some(ACTIVE_SLOT_INDEX) {
            return StoreError::SlotTaken;
        }
    }
    StoreError::Database(e)
}

/// PostgreSQL-backed session store
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a new session store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &Session, quota: &QuotaRule) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent bookings by the same user until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(session.user_id.to_string())
            .execute(&mut *tx)
            .await?;

        // A retried insert whose first attempt committed is a no-op.
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM mentorship_sessions WHERE id = $1)")
                .bind(session.id)
                .fetch_one(&mut *tx)
                .await?;
        if exists {
            return Ok(());
        }

        let held: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM mentorship_sessions
            WHERE user_id = $1
              AND status = ANY($2)
              AND booked_date >= $3
              AND booked_date < $4
            "#,
        )
        .bind(session.user_id)
        .bind(active_statuses())
        .bind(quota.window_start)
        .bind(quota.window_end)
        .fetch_one(&mut *tx)
        .await?;

        if held >= i64::from(quota.limit) {
            debug!("User {} holds {} active bookings this week", session.user_id, held);
            return Err(StoreError::QuotaExceeded);
        }

        sqlx::query(
            r#"
            INSERT INTO mentorship_sessions (
                id, user_id, mentor_id, instructor_id, requested_mentor_id,
                requested_instructor_id, title, notes, session_date, time_slot, status,
                meeting_link, rejection_reason, reschedule_reason, original_date,
                original_time, completed_at, booked_date, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.assignment.mentor_id())
        .bind(session.assignment.instructor_id())
        .bind(session.requested.mentor_id())
        .bind(session.requested.instructor_id())
        .bind(&session.title)
        .bind(&session.notes)
        .bind(session.date)
        .bind(session.time.as_str())
        .bind(session.status.as_str())
        .bind(&session.meeting_link)
        .bind(&session.rejection_reason)
        .bind(&session.reschedule_reason)
        .bind(session.original_date)
        .bind(session.original_time.as_ref().map(TimeSlot::as_str))
        .bind(session.completed_at)
        .bind(session.booked_date)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.version)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await.map_err(map_write_error)?;
        Ok(())
    }

    async fn update(&self, session: &Session) -> Result<Session, StoreError> {
        let sql = format!(
            r#"
            UPDATE mentorship_sessions
            SET mentor_id = $3,
                instructor_id = $4,
                title = $5,
                notes = $6,
                session_date = $7,
                time_slot = $8,
                status = $9,
                meeting_link = $10,
                rejection_reason = $11,
                reschedule_reason = $12,
                original_date = $13,
                original_time = $14,
                completed_at = $15,
                updated_at = $16,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {SELECT_COLS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(session.id)
            .bind(session.version)
            .bind(session.assignment.mentor_id())
            .bind(session.assignment.instructor_id())
            .bind(&session.title)
            .bind(&session.notes)
            .bind(session.date)
            .bind(session.time.as_str())
            .bind(session.status.as_str())
            .bind(&session.meeting_link)
            .bind(&session.rejection_reason)
            .bind(&session.reschedule_reason)
            .bind(session.original_date)
            .bind(session.original_time.as_ref().map(TimeSlot::as_str))
            .bind(session.completed_at)
            .bind(session.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?;

        match row {
            Some(row) => row_to_session(&row),
            None => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM mentorship_sessions WHERE id = $1)",
                )
                .bind(session.id)
                .fetch_one(&self.pool)
                .await?;

                if exists {
                    Err(StoreError::VersionConflict)
                } else {
                    Err(StoreError::NotFound)
                }
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        let sql = format!("SELECT {SELECT_COLS} FROM mentorship_sessions WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_session).transpose()
    }

    async fn is_slot_taken(&self, slot: &Slot, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM mentorship_sessions
                WHERE session_date = $1
                  AND time_slot = $2
                  AND status = ANY($3)
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(slot.date)
        .bind(slot.time.as_str())
        .bind(active_statuses())
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn count_active_booked_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM mentorship_sessions
            WHERE user_id = $1
              AND status = ANY($2)
              AND booked_date >= $3
              AND booked_date < $4
            "#,
        )
        .bind(user_id)
        .bind(active_statuses())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn active_slots(&self) -> Result<Vec<Slot>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT session_date, time_slot
            FROM mentorship_sessions
            WHERE status = ANY($1)
            "#,
        )
        .bind(active_statuses())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Slot {
                    date: row.try_get("session_date")?,
                    time: TimeSlot::from_stored(row.try_get("time_slot")?),
                })
            })
            .collect()
    }

    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError> {
        let (clause, id) = match filter {
            SessionFilter::All => ("TRUE", None),
            SessionFilter::User(id) => ("user_id = $1", Some(id)),
            SessionFilter::Mentor(id) => ("mentor_id = $1", Some(id)),
            SessionFilter::Instructor(id) => ("instructor_id = $1", Some(id)),
        };

        let sql = format!("SELECT {SELECT_COLS} FROM mentorship_sessions WHERE {clause}");
        let mut query = sqlx::query(&sql);
        if let Some(id) = id {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_session).collect()
    }
}

/// Directory over the account service's `mentors` and `instructors` tables
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn find(
        &self,
        kind: AssigneeKind,
        id: Uuid,
    ) -> Result<Option<DirectoryProfile>, StoreError> {
        let sql = match kind {
            AssigneeKind::Mentor => "SELECT id, name, email, expertise FROM mentors WHERE id = $1",
            AssigneeKind::Instructor => {
                "SELECT id, name, email, expertise FROM instructors WHERE id = $1"
            }
        };

        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(DirectoryProfile {
                id: row.try_get("id")?,
                kind,
                name: row.try_get("name")?,
                email: row.try_get("email")?,
                expertise: row.try_get("expertise")?,
            })),
            None => Ok(None),
        }
    }
}
