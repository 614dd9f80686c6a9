//! Best-effort session notifications
//!
//! A notification is sent after a mutation has been stored. Delivery
//! failures are reported to the caller of [`Notifier::notify`], which logs
//! and drops them; they never undo the mutation.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::session::{Session, SessionStatus};

/// What happened to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    Assigned,
    MeetingLinkAdded,
    StatusUpdated,
    Rescheduled,
    Rejected,
    Completed,
    Cancelled,
}

/// Payload delivered to notification sinks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotification {
    pub event: SessionEvent,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub status: SessionStatus,
    pub assignee: Option<Uuid>,
}

impl SessionNotification {
    pub fn new(event: SessionEvent, session: &Session) -> Self {
        Self {
            event,
            session_id: session.id,
            user_id: session.user_id,
            status: session.status,
            assignee: session
                .assignment
                .mentor_id()
                .or(session.assignment.instructor_id()),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification endpoint answered {0}")]
    Status(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &SessionNotification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &SessionNotification) -> Result<(), NotifyError> {
        info!(
            "Session {} {:?}: status {}, user {}",
            notification.session_id, notification.event, notification.status, notification.user_id
        );
        Ok(())
    }
}

/// POSTs notifications as JSON to a webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &SessionNotification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
