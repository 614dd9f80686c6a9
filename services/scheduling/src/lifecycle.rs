//! Session lifecycle controller
//!
//! Every command follows the same order: validate input, load the session
//! (`NotFound`), authorize the actor (`Forbidden`), check the current status
//! (`Conflict`), apply booking rules, then write with a compare-and-swap on
//! the version read. A concurrent change between load and write surfaces as
//! `Conflict`; a slot grabbed in between surfaces as `SlotTaken`.

use common::cache::RedisPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::{ApiError, ApiResult},
    guard::{self, Actor, Role},
    models::{
        AssignRequest, AssigneeKind, BookedSlot, CreateSessionRequest, DirectoryProfile,
        MeetingLinkRequest, RejectRequest, RescheduleRequest, SessionResponse,
        UpdateStatusRequest,
        session::{Assignment, NewSession, Session, SessionStatus, Slot, TimeSlot},
    },
    notify::{Notifier, SessionEvent, SessionNotification, TracingNotifier},
    policy::{BookingPolicy, BookingRules},
    projection::BookedSlotsProjection,
    repositories::{Directory, SessionFilter, SessionStore, StoreError},
    retry::RetryPolicy,
    validation,
};

/// Owns every mutation of mentorship sessions
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn Directory>,
    policy: BookingPolicy,
    projection: BookedSlotsProjection,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
}

impl SessionService {
    /// Service without a slot cache that only logs notifications
    pub fn new(
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn Directory>,
        clock: Arc<dyn Clock>,
        rules: BookingRules,
        retry: RetryPolicy,
    ) -> Self {
        let policy = BookingPolicy::new(store.clone(), clock, rules, retry);
        let projection =
            BookedSlotsProjection::new(policy.slots().clone(), None, Duration::from_secs(30));

        Self {
            store,
            directory,
            policy,
            projection,
            notifier: Arc::new(TracingNotifier),
            retry,
        }
    }

    pub fn with_cache(mut self, cache: Option<RedisPool>, ttl: Duration) -> Self {
        self.projection = BookedSlotsProjection::new(self.policy.slots().clone(), cache, ttl);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Book a new `pending` session for the calling user
    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateSessionRequest,
    ) -> ApiResult<SessionResponse> {
        guard::authorize_create(actor)?;

        let title = validation::validate_title(&request.title).map_err(ApiError::Validation)?;
        let notes =
            validation::validate_notes(request.notes.as_deref()).map_err(ApiError::Validation)?;
        let slot = parse_slot(&request.date, &request.time)?;
        let requested = self
            .resolve_preference(request.mentor_id, request.instructor_id)
            .await?;

        let quota = self.policy.validate_booking(actor.id, &slot).await?;

        let session = Session::book(
            NewSession {
                user_id: actor.id,
                title,
                notes,
                slot,
                requested,
            },
            self.policy.now(),
        );

        self.retry
            .run("insert", || self.store.insert(&session, &quota))
            .await
            .inspect_err(|e| info!("Booking for user {} not stored: {}", actor.id, e))?;
        self.projection.invalidate().await;

        info!(
            "Session {} booked by user {} for {} {}",
            session.id, actor.id, session.date, session.time
        );
        self.respond(session).await
    }

    /// Bind a pending session to a mentor or an instructor
    pub async fn assign(
        &self,
        actor: &Actor,
        id: Uuid,
        request: AssignRequest,
    ) -> ApiResult<SessionResponse> {
        let (kind, assignee) = match (request.mentor_id, request.instructor_id) {
            (Some(mentor), None) => (AssigneeKind::Mentor, mentor),
            (None, Some(instructor)) => (AssigneeKind::Instructor, instructor),
            _ => {
                return Err(ApiError::Validation(
                    "Provide exactly one of mentorId or instructorId".to_string(),
                ));
            }
        };

        let mut session = self.load(id).await?;
        guard::authorize_admin(actor)?;

        if !session.status.is_awaiting_assignment() {
            return Err(ApiError::Conflict(format!(
                "Session is {} and can no longer be assigned",
                session.status
            )));
        }

        self.require_profile(kind, assignee).await?;

        session.assignment = match kind {
            AssigneeKind::Mentor => Assignment::Mentor(assignee),
            AssigneeKind::Instructor => Assignment::Instructor(assignee),
        };
        session.status = SessionStatus::MentorAssigned;

        let session = self.commit(session, SessionEvent::Assigned).await?;
        info!(
            "Session {} assigned to {} {} by admin {}",
            session.id,
            kind.label().to_lowercase(),
            assignee,
            actor.id
        );
        self.respond(session).await
    }

    /// Attach the meeting link and mark the session scheduled
    pub async fn add_meeting_link(
        &self,
        actor: &Actor,
        id: Uuid,
        request: MeetingLinkRequest,
    ) -> ApiResult<SessionResponse> {
        let link =
            validation::validate_meeting_link(&request.meeting_link).map_err(ApiError::Validation)?;

        let mut session = self.load(id).await?;
        guard::authorize_assignee(actor, &session)?;
        ensure_active(&session)?;

        session.meeting_link = Some(link);
        session.status = SessionStatus::Scheduled;

        let session = self.commit(session, SessionEvent::MeetingLinkAdded).await?;
        info!("Session {} scheduled by {} {}", session.id, actor.role, actor.id);
        self.respond(session).await
    }

    /// Direct status correction by the assignee or an admin
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        request: UpdateStatusRequest,
    ) -> ApiResult<SessionResponse> {
        let target = request.status;
        if target.is_awaiting_assignment() {
            return Err(ApiError::Validation(format!(
                "Status '{}' cannot be set directly",
                target
            )));
        }

        let mut session = self.load(id).await?;
        guard::authorize_assignee_or_admin(actor, &session)?;
        ensure_active(&session)?;

        let allowed_unassigned = matches!(target, SessionStatus::Rejected | SessionStatus::Cancelled);
        if !session.assignment.is_assigned() && !allowed_unassigned {
            return Err(ApiError::Conflict(format!(
                "Session must be assigned before it can become {}",
                target
            )));
        }

        if target == SessionStatus::Completed {
            session.completed_at = Some(self.policy.now());
        }
        session.status = target;

        let session = self.commit(session, SessionEvent::StatusUpdated).await?;
        info!(
            "Session {} set to {} by {} {}",
            session.id, session.status, actor.role, actor.id
        );
        self.respond(session).await
    }

    /// Move an active session to another slot
    pub async fn reschedule(
        &self,
        actor: &Actor,
        id: Uuid,
        request: RescheduleRequest,
    ) -> ApiResult<SessionResponse> {
        let slot = parse_slot(&request.date, &request.time)?;
        let reason = request
            .reason
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(validation::validate_reason)
            .transpose()
            .map_err(ApiError::Validation)?;

        let mut session = self.load(id).await?;
        guard::authorize_assignee(actor, &session)?;
        ensure_active(&session)?;

        self.policy.validate_reschedule(session.id, &slot).await?;

        session.move_to(slot, reason);

        let session = self.commit(session, SessionEvent::Rescheduled).await?;
        info!(
            "Session {} rescheduled to {} {} by {} {}",
            session.id, session.date, session.time, actor.role, actor.id
        );
        self.respond(session).await
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        request: RejectRequest,
    ) -> ApiResult<SessionResponse> {
        let reason = validation::validate_reason(&request.reason).map_err(ApiError::Validation)?;

        let mut session = self.load(id).await?;
        guard::authorize_assignee(actor, &session)?;
        ensure_active(&session)?;

        session.rejection_reason = Some(reason);
        session.status = SessionStatus::Rejected;

        let session = self.commit(session, SessionEvent::Rejected).await?;
        info!("Session {} rejected by {} {}", session.id, actor.role, actor.id);
        self.respond(session).await
    }

    pub async fn complete(&self, actor: &Actor, id: Uuid) -> ApiResult<SessionResponse> {
        let mut session = self.load(id).await?;
        guard::authorize_assignee(actor, &session)?;
        ensure_active(&session)?;

        session.completed_at = Some(self.policy.now());
        session.status = SessionStatus::Completed;

        let session = self.commit(session, SessionEvent::Completed).await?;
        info!("Session {} completed by {} {}", session.id, actor.role, actor.id);
        self.respond(session).await
    }

    /// Cancel by the owning user; terminal sessions answer `Conflict`
    pub async fn cancel(&self, actor: &Actor, id: Uuid) -> ApiResult<SessionResponse> {
        let mut session = self.load(id).await?;
        guard::authorize_owner(actor, &session)?;
        ensure_active(&session)?;

        session.status = SessionStatus::Cancelled;

        let session = self.commit(session, SessionEvent::Cancelled).await?;
        info!("Session {} cancelled by user {}", session.id, actor.id);
        self.respond(session).await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> ApiResult<SessionResponse> {
        let session = self.load(id).await?;
        guard::authorize_read(actor, &session)?;
        self.respond(session).await
    }

    /// Every session, for admins
    pub async fn list_all(&self, actor: &Actor) -> ApiResult<Vec<SessionResponse>> {
        guard::authorize_admin(actor)?;
        self.list(SessionFilter::All).await
    }

    /// Sessions booked by the caller
    pub async fn list_for_user(&self, actor: &Actor) -> ApiResult<Vec<SessionResponse>> {
        self.list(SessionFilter::User(actor.id)).await
    }

    pub async fn list_for_mentor(
        &self,
        actor: &Actor,
        mentor_id: Uuid,
    ) -> ApiResult<Vec<SessionResponse>> {
        guard::authorize_mentor_listing(actor, mentor_id)?;
        self.list(SessionFilter::Mentor(mentor_id)).await
    }

    /// Sessions assigned to the calling instructor
    pub async fn list_for_instructor(&self, actor: &Actor) -> ApiResult<Vec<SessionResponse>> {
        guard::require_role(actor, Role::Instructor)?;
        self.list(SessionFilter::Instructor(actor.id)).await
    }

    /// Slots held by active sessions, for display only
    pub async fn booked_slots(&self) -> ApiResult<Vec<BookedSlot>> {
        Ok(self.projection.booked_slots().await?)
    }

    async fn load(&self, id: Uuid) -> ApiResult<Session> {
        self.retry
            .run("find_by_id", || self.store.find_by_id(id))
            .await?
            .ok_or(ApiError::NotFound("Session"))
    }

    /// Store a modified session, then drop the cached slots and notify
    async fn commit(&self, mut session: Session, event: SessionEvent) -> ApiResult<Session> {
        session.updated_at = self.policy.now();

        let mut attempts = 0;
        let result = self
            .retry
            .run("update", || {
                attempts += 1;
                self.store.update(&session)
            })
            .await;

        let stored = match result {
            Err(StoreError::VersionConflict) if attempts > 1 => {
                self.recover_lost_ack(&session).await?
            }
            other => other?,
        };

        self.projection.invalidate().await;

        let notification = SessionNotification::new(event, &stored);
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!("Failed to deliver {:?} notification for session {}: {}", event, stored.id, e);
        }

        Ok(stored)
    }

    /// A retried write whose first attempt timed out after committing sees
    /// its own change as a version conflict. Accept it when the stored row is
    /// exactly one version ahead and carries the state that was written.
    async fn recover_lost_ack(&self, written: &Session) -> ApiResult<Session> {
        let conflict = || ApiError::from(StoreError::VersionConflict);

        let current = self
            .retry
            .run("find_by_id", || self.store.find_by_id(written.id))
            .await?
            .ok_or_else(conflict)?;

        let applied = current.version == written.version + 1
            && current.status == written.status
            && current.slot() == written.slot()
            && current.assignment == written.assignment
            && current.meeting_link == written.meeting_link;

        if !applied {
            return Err(conflict());
        }

        warn!(
            "Update of session {} committed before its acknowledgement was lost",
            written.id
        );
        Ok(current)
    }

    async fn resolve_preference(
        &self,
        mentor_id: Option<Uuid>,
        instructor_id: Option<Uuid>,
    ) -> ApiResult<Assignment> {
        match (mentor_id, instructor_id) {
            (None, None) => Ok(Assignment::Unassigned),
            (Some(mentor), None) => {
                self.require_profile(AssigneeKind::Mentor, mentor).await?;
                Ok(Assignment::Mentor(mentor))
            }
            (None, Some(instructor)) => {
                self.require_profile(AssigneeKind::Instructor, instructor).await?;
                Ok(Assignment::Instructor(instructor))
            }
            (Some(_), Some(_)) => Err(ApiError::Validation(
                "Request either a mentor or an instructor, not both".to_string(),
            )),
        }
    }

    async fn find_profile(
        &self,
        kind: AssigneeKind,
        id: Uuid,
    ) -> ApiResult<Option<DirectoryProfile>> {
        Ok(self
            .retry
            .run("directory_find", || self.directory.find(kind, id))
            .await?)
    }

    async fn require_profile(&self, kind: AssigneeKind, id: Uuid) -> ApiResult<DirectoryProfile> {
        self.find_profile(kind, id)
            .await?
            .ok_or(ApiError::NotFound(kind.label()))
    }

    async fn assignee_profile(&self, assignment: Assignment) -> ApiResult<Option<DirectoryProfile>> {
        match assignment {
            Assignment::Unassigned => Ok(None),
            Assignment::Mentor(id) => self.find_profile(AssigneeKind::Mentor, id).await,
            Assignment::Instructor(id) => self.find_profile(AssigneeKind::Instructor, id).await,
        }
    }

    async fn respond(&self, session: Session) -> ApiResult<SessionResponse> {
        let assignee = self.assignee_profile(session.assignment).await?;
        Ok(SessionResponse::new(session, assignee))
    }

    async fn list(&self, filter: SessionFilter) -> ApiResult<Vec<SessionResponse>> {
        let mut sessions = self.retry.run("list", || self.store.list(filter)).await?;
        sessions.sort_by_key(|s| (s.date, s.time.minutes_of_day(), s.created_at));

        let mut profiles: HashMap<Assignment, Option<DirectoryProfile>> = HashMap::new();
        let mut responses = Vec::with_capacity(sessions.len());
        for session in sessions {
            let assignee = match profiles.get(&session.assignment) {
                Some(profile) => profile.clone(),
                None => {
                    let profile = self.assignee_profile(session.assignment).await?;
                    profiles.insert(session.assignment, profile.clone());
                    profile
                }
            };
            responses.push(SessionResponse::new(session, assignee));
        }

        Ok(responses)
    }
}

fn parse_slot(date: &str, time: &str) -> ApiResult<Slot> {
    Ok(Slot {
        date: validation::parse_date(date).map_err(ApiError::Validation)?,
        time: TimeSlot::parse(time).map_err(ApiError::Validation)?,
    })
}

fn ensure_active(session: &Session) -> ApiResult<()> {
    if session.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Session is already {}",
            session.status
        )));
    }
    Ok(())
}
