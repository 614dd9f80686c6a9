//! Booking rules: advance window, weekly quota and slot exclusivity
//!
//! The calendar is evaluated in UTC and weeks run Sunday through Saturday.
//! These checks give callers a precise rejection reason up front; the store
//! repeats the quota and slot checks atomically with the write.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    clock::Clock,
    config::SchedulingConfig,
    error::{ApiError, ApiResult},
    models::session::Slot,
    repositories::{QuotaRule, SessionStore},
    retry::RetryPolicy,
    slots::SlotAvailability,
};

/// Tunable booking limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingRules {
    pub advance_days: i64,
    pub weekly_quota: u32,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            advance_days: 7,
            weekly_quota: 3,
        }
    }
}

impl From<&SchedulingConfig> for BookingRules {
    fn from(config: &SchedulingConfig) -> Self {
        Self {
            advance_days: config.advance_days,
            weekly_quota: config.weekly_quota,
        }
    }
}

/// Start of the Sunday-to-Saturday week containing `now`, at UTC midnight
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let sunday = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    sunday.and_time(NaiveTime::MIN).and_utc()
}

/// Validates booking and reschedule requests
#[derive(Clone)]
pub struct BookingPolicy {
    store: Arc<dyn SessionStore>,
    slots: SlotAvailability,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    rules: BookingRules,
}

impl BookingPolicy {
    pub fn new(
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        rules: BookingRules,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            slots: SlotAvailability::new(store.clone(), retry),
            store,
            clock,
            retry,
            rules,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn slots(&self) -> &SlotAvailability {
        &self.slots
    }

    /// First date that satisfies the advance window
    pub fn earliest_bookable_date(&self) -> NaiveDate {
        self.now().date_naive() + Duration::days(self.rules.advance_days)
    }

    /// Reject dates closer than the advance window
    pub fn check_advance_window(&self, date: NaiveDate) -> ApiResult<()> {
        if date < self.earliest_bookable_date() {
            info!("Rejected slot on {}: TooSoon", date);
            return Err(ApiError::TooSoon {
                days: self.rules.advance_days,
            });
        }
        Ok(())
    }

    /// Quota window for bookings made now
    pub fn quota_rule(&self) -> QuotaRule {
        let window_start = week_start(self.now());
        QuotaRule {
            window_start,
            window_end: window_start + Duration::days(7),
            limit: self.rules.weekly_quota,
        }
    }

    /// Run all three booking checks for `user_id` and return the quota the
    /// insert must enforce.
    pub async fn validate_booking(&self, user_id: Uuid, slot: &Slot) -> ApiResult<QuotaRule> {
        self.check_advance_window(slot.date)?;

        let quota = self.quota_rule();
        let held = self
            .retry
            .run("count_active_booked_between", || {
                self.store
                    .count_active_booked_between(user_id, quota.window_start, quota.window_end)
            })
            .await?;
        if held >= quota.limit {
            info!("Rejected booking for user {}: QuotaExceeded ({} held)", user_id, held);
            return Err(ApiError::QuotaExceeded);
        }

        if self.slots.is_slot_taken(slot, None).await? {
            info!("Rejected booking for user {}: SlotTaken {} {}", user_id, slot.date, slot.time);
            return Err(ApiError::SlotTaken);
        }

        Ok(quota)
    }

    /// Checks for moving `session_id` to `slot`. A reschedule adds no weekly
    /// booking, so the quota is not consulted.
    pub async fn validate_reschedule(&self, session_id: Uuid, slot: &Slot) -> ApiResult<()> {
        self.check_advance_window(slot.date)?;

        if self.slots.is_slot_taken(slot, Some(session_id)).await? {
            info!(
                "Rejected reschedule of session {}: SlotTaken {} {}",
                session_id, slot.date, slot.time
            );
            return Err(ApiError::SlotTaken);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::session::{Assignment, NewSession, Session, TimeSlot};
    use crate::repositories::InMemorySessionStore;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn slot(date: NaiveDate, time: &str) -> Slot {
        Slot {
            date,
            time: TimeSlot::parse(time).unwrap(),
        }
    }

    fn policy(store: &InMemorySessionStore, clock: &FixedClock) -> BookingPolicy {
        BookingPolicy::new(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            BookingRules::default(),
            RetryPolicy::default(),
        )
    }

    #[test]
    fn test_week_starts_on_sunday_midnight() {
        // 2026-03-01 is a Sunday
        assert_eq!(week_start(at(2026, 3, 1, 0)), at(2026, 3, 1, 0));
        assert_eq!(week_start(at(2026, 3, 4, 15)), at(2026, 3, 1, 0));
        assert_eq!(week_start(at(2026, 3, 7, 23)), at(2026, 3, 1, 0));
        assert_eq!(week_start(at(2026, 3, 8, 1)), at(2026, 3, 8, 0));
    }

    #[test]
    fn test_advance_window_boundary() {
        let clock = FixedClock::new(at(2026, 3, 1, 18));
        let policy = policy(&InMemorySessionStore::new(), &clock);
        let today = clock.now().date_naive();

        assert!(matches!(
            policy.check_advance_window(today + Duration::days(6)),
            Err(ApiError::TooSoon { days: 7 })
        ));
        assert!(policy.check_advance_window(today + Duration::days(7)).is_ok());
    }

    #[tokio::test]
    async fn test_quota_resets_next_week() {
        let store = InMemorySessionStore::new();
        let clock = FixedClock::new(at(2026, 3, 2, 10));
        let policy = policy(&store, &clock);
        let user = Uuid::new_v4();
        let base = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();

        for offset in 0..3 {
            let wanted = slot(base + Duration::days(offset), "6:00pm");
            let quota = policy.validate_booking(user, &wanted).await.unwrap();
            let session = Session::book(
                NewSession {
                    user_id: user,
                    title: "Mock interview".to_string(),
                    notes: None,
                    slot: wanted,
                    requested: Assignment::Unassigned,
                },
                clock.now(),
            );
            store.insert(&session, &quota).await.unwrap();
        }

        let fourth = slot(base + Duration::days(5), "6:00pm");
        assert!(matches!(
            policy.validate_booking(user, &fourth).await,
            Err(ApiError::QuotaExceeded)
        ));

        clock.set(at(2026, 3, 8, 0));
        assert!(policy.validate_booking(user, &fourth).await.is_ok());
    }

    #[tokio::test]
    async fn test_reschedule_ignores_own_slot_and_quota() {
        let store = InMemorySessionStore::new();
        let clock = FixedClock::new(at(2026, 3, 1, 9));
        let policy = BookingPolicy::new(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            BookingRules {
                advance_days: 7,
                weekly_quota: 1,
            },
            RetryPolicy::default(),
        );
        let user = Uuid::new_v4();
        let held = slot(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(), "6:00pm");

        let quota = policy.validate_booking(user, &held).await.unwrap();
        let session = Session::book(
            NewSession {
                user_id: user,
                title: "Career Assistance".to_string(),
                notes: None,
                slot: held.clone(),
                requested: Assignment::Unassigned,
            },
            clock.now(),
        );
        store.insert(&session, &quota).await.unwrap();

        assert!(policy.validate_reschedule(session.id, &held).await.is_ok());
        assert!(matches!(
            policy.validate_reschedule(Uuid::new_v4(), &held).await,
            Err(ApiError::SlotTaken)
        ));
    }
}
