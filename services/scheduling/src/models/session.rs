//! Mentorship session entity and its lifecycle vocabulary

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::validation;

/// Lifecycle status of a mentorship session.
///
/// ```text
/// pending → mentor_assigned → scheduled ⇄ rescheduled → completed
///    └──────────┴────────────────┴────────────┴──→ rejected | cancelled
/// ```
///
/// `upcoming` is a legacy alias for an active, unassigned session. It is
/// still read and counted as active but never written by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Upcoming,
    Pending,
    MentorAssigned,
    Scheduled,
    Rescheduled,
    Completed,
    Rejected,
    Cancelled,
}

impl SessionStatus {
    /// Statuses that hold a slot and count toward the weekly quota.
    pub const ACTIVE: [SessionStatus; 5] = [
        SessionStatus::Upcoming,
        SessionStatus::Pending,
        SessionStatus::MentorAssigned,
        SessionStatus::Scheduled,
        SessionStatus::Rescheduled,
    ];

    /// Return the string representation used in SQL storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Pending => "pending",
            Self::MentorAssigned => "mentor_assigned",
            Self::Scheduled => "scheduled",
            Self::Rescheduled => "rescheduled",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Whether the session has not been bound to a mentor or instructor yet.
    pub const fn is_awaiting_assignment(self) -> bool {
        matches!(self, Self::Pending | Self::Upcoming)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "pending" => Ok(Self::Pending),
            "mentor_assigned" => Ok(Self::MentorAssigned),
            "scheduled" => Ok(Self::Scheduled),
            "rescheduled" => Ok(Self::Rescheduled),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// Who a session is bound to. Mentor and instructor are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Assignment {
    #[default]
    Unassigned,
    Mentor(Uuid),
    Instructor(Uuid),
}

impl Assignment {
    /// Rebuild from the two nullable storage columns.
    pub fn from_columns(mentor_id: Option<Uuid>, instructor_id: Option<Uuid>) -> Result<Self, String> {
        match (mentor_id, instructor_id) {
            (None, None) => Ok(Self::Unassigned),
            (Some(id), None) => Ok(Self::Mentor(id)),
            (None, Some(id)) => Ok(Self::Instructor(id)),
            (Some(m), Some(i)) => Err(format!(
                "both mentor {} and instructor {} are set",
                m, i
            )),
        }
    }

    pub fn mentor_id(&self) -> Option<Uuid> {
        match self {
            Self::Mentor(id) => Some(*id),
            _ => None,
        }
    }

    pub fn instructor_id(&self) -> Option<Uuid> {
        match self {
            Self::Instructor(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        !matches!(self, Self::Unassigned)
    }
}

/// Normalised slot label such as `6:00pm`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TimeSlot(String);

impl TimeSlot {
    pub fn parse(label: &str) -> Result<Self, String> {
        validation::normalize_time_slot(label).map(TimeSlot)
    }

    /// Wrap a value read back from storage, which was normalised on write.
    pub(crate) fn from_stored(label: String) -> Self {
        TimeSlot(label)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Minutes after midnight, for chronological ordering
    pub fn minutes_of_day(&self) -> u32 {
        let (hour, rest) = self.0.split_once(':').unwrap_or(("0", "00am"));
        let hour: u32 = hour.parse().unwrap_or(0);
        let minute: u32 = rest.get(..2).and_then(|m| m.parse().ok()).unwrap_or(0);
        let afternoon = rest.ends_with("pm");

        (hour % 12 + if afternoon { 12 } else { 0 }) * 60 + minute
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bookable `(date, time)` window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: TimeSlot,
}

/// Mentorship session entity
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub assignment: Assignment,
    /// Mentor or instructor the user asked for at booking time. Advisory only.
    pub requested: Assignment,
    pub title: String,
    pub notes: Option<String>,
    pub date: NaiveDate,
    pub time: TimeSlot,
    pub status: SessionStatus,
    pub meeting_link: Option<String>,
    pub rejection_reason: Option<String>,
    pub reschedule_reason: Option<String>,
    pub original_date: Option<NaiveDate>,
    pub original_time: Option<TimeSlot>,
    pub completed_at: Option<DateTime<Utc>>,
    pub booked_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every write; updates compare-and-swap on it.
    pub version: i64,
}

/// Validated input for a new booking
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub slot: Slot,
    pub requested: Assignment,
}

impl Session {
    /// Build a `pending` session booked at `now`.
    pub fn book(new: NewSession, now: DateTime<Utc>) -> Self {
        Session {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            assignment: Assignment::Unassigned,
            requested: new.requested,
            title: new.title,
            notes: new.notes,
            date: new.slot.date,
            time: new.slot.time,
            status: SessionStatus::Pending,
            meeting_link: None,
            rejection_reason: None,
            reschedule_reason: None,
            original_date: None,
            original_time: None,
            completed_at: None,
            booked_date: now,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn slot(&self) -> Slot {
        Slot {
            date: self.date,
            time: self.time.clone(),
        }
    }

    /// Move to a new slot, keeping the very first slot as the original.
    pub fn move_to(&mut self, slot: Slot, reason: Option<String>) {
        if self.original_date.is_none() && self.original_time.is_none() {
            self.original_date = Some(self.date);
            self.original_time = Some(self.time.clone());
        }
        self.date = slot.date;
        self.time = slot.time;
        self.reschedule_reason = reason;
        self.status = SessionStatus::Rescheduled;
    }
}
