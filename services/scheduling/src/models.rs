//! API models for request and response payloads

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod session;

use session::{Session, SessionStatus, Slot};

/// Which directory a mentor-side participant lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssigneeKind {
    Mentor,
    Instructor,
}

impl AssigneeKind {
    pub const fn label(self) -> &'static str {
        match self {
            AssigneeKind::Mentor => "Mentor",
            AssigneeKind::Instructor => "Instructor",
        }
    }
}

/// Mentor or instructor record owned by the account service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryProfile {
    pub id: Uuid,
    pub kind: AssigneeKind,
    pub name: String,
    pub email: String,
    pub expertise: Option<String>,
}

/// Request for booking a session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub title: String,
    pub date: String,
    pub time: String,
    pub notes: Option<String>,
    pub mentor_id: Option<Uuid>,
    pub instructor_id: Option<Uuid>,
}

/// Request for binding a pending session to a mentor or an instructor
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub mentor_id: Option<Uuid>,
    pub instructor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingLinkRequest {
    #[serde(alias = "meetLink")]
    pub meeting_link: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: SessionStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub date: String,
    pub time: String,
    #[serde(alias = "rescheduleReason")]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    #[serde(alias = "rejectionReason")]
    pub reason: String,
}

/// One taken slot, for clients graying out unavailable times
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedSlot {
    pub date: NaiveDate,
    pub time: String,
}

impl From<Slot> for BookedSlot {
    fn from(slot: Slot) -> Self {
        BookedSlot {
            date: slot.date,
            time: slot.time.to_string(),
        }
    }
}

/// Response for session operations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mentor_id: Option<Uuid>,
    pub instructor_id: Option<Uuid>,
    pub requested_mentor_id: Option<Uuid>,
    pub requested_instructor_id: Option<Uuid>,
    pub assignee: Option<DirectoryProfile>,
    pub title: String,
    pub notes: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    pub status: SessionStatus,
    pub meeting_link: Option<String>,
    pub rejection_reason: Option<String>,
    pub reschedule_reason: Option<String>,
    pub original_date: Option<NaiveDate>,
    pub original_time: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub booked_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionResponse {
    pub fn new(session: Session, assignee: Option<DirectoryProfile>) -> Self {
        SessionResponse {
            id: session.id,
            user_id: session.user_id,
            mentor_id: session.assignment.mentor_id(),
            instructor_id: session.assignment.instructor_id(),
            requested_mentor_id: session.requested.mentor_id(),
            requested_instructor_id: session.requested.instructor_id(),
            assignee,
            title: session.title,
            notes: session.notes,
            date: session.date,
            time: session.time.to_string(),
            status: session.status,
            meeting_link: session.meeting_link,
            rejection_reason: session.rejection_reason,
            reschedule_reason: session.reschedule_reason,
            original_date: session.original_date,
            original_time: session.original_time.map(|t| t.to_string()),
            completed_at: session.completed_at,
            booked_date: session.booked_date,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}
