//! Actor authorization for session commands
//!
//! Every check here assumes the session was already loaded, so a missing
//! session surfaces as `NotFound` before any of these run and is never
//! reported as `Forbidden`.

use std::fmt;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::session::{Assignment, Session},
};

/// Caller role, resolved from the token's role claims
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Mentor,
    Instructor,
    Admin,
}

impl Role {
    /// Pick the most privileged recognised role
    pub fn from_claims(roles: &[String]) -> Option<Self> {
        let has = |name: &str| roles.iter().any(|r| r.eq_ignore_ascii_case(name));

        if has("admin") {
            Some(Role::Admin)
        } else if has("mentor") {
            Some(Role::Mentor)
        } else if has("instructor") {
            Some(Role::Instructor)
        } else if has("user") {
            Some(Role::User)
        } else {
            None
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Mentor => "mentor",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated caller of a lifecycle command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the session is assigned to this mentor or instructor
    pub fn is_assignee_of(&self, session: &Session) -> bool {
        match (self.role, session.assignment) {
            (Role::Mentor, Assignment::Mentor(id)) => id == self.id,
            (Role::Instructor, Assignment::Instructor(id)) => id == self.id,
            _ => false,
        }
    }

    pub fn is_owner_of(&self, session: &Session) -> bool {
        self.role == Role::User && session.user_id == self.id
    }
}

impl TryFrom<&AuthUser> for Actor {
    type Error = ApiError;

    fn try_from(user: &AuthUser) -> Result<Self, Self::Error> {
        let role = Role::from_claims(&user.roles)
            .ok_or_else(|| ApiError::Forbidden("Caller has no recognised role".to_string()))?;
        Ok(Actor::new(user.id, role))
    }
}

fn forbidden(message: &str) -> ApiError {
    ApiError::Forbidden(message.to_string())
}

/// Only plain users book sessions, always for themselves
pub fn authorize_create(actor: &Actor) -> ApiResult<()> {
    if actor.role != Role::User {
        return Err(forbidden("Only users can book sessions"));
    }
    Ok(())
}

/// Owner-only commands such as cancel
pub fn authorize_owner(actor: &Actor, session: &Session) -> ApiResult<()> {
    if !actor.is_owner_of(session) {
        return Err(forbidden("Only the user who booked this session can do that"));
    }
    Ok(())
}

/// Commands reserved for the assigned mentor or instructor
pub fn authorize_assignee(actor: &Actor, session: &Session) -> ApiResult<()> {
    if !actor.is_assignee_of(session) {
        return Err(forbidden("Session is not assigned to you"));
    }
    Ok(())
}

pub fn authorize_assignee_or_admin(actor: &Actor, session: &Session) -> ApiResult<()> {
    if actor.is_admin() {
        return Ok(());
    }
    authorize_assignee(actor, session)
}

pub fn authorize_admin(actor: &Actor) -> ApiResult<()> {
    if !actor.is_admin() {
        return Err(forbidden("Admin access required"));
    }
    Ok(())
}

/// Owner, assignee or admin may read a session
pub fn authorize_read(actor: &Actor, session: &Session) -> ApiResult<()> {
    if actor.is_admin() || actor.is_owner_of(session) || actor.is_assignee_of(session) {
        return Ok(());
    }
    Err(forbidden("You cannot view this session"))
}

/// A mentor may list their own sessions; admins may list anyone's
pub fn authorize_mentor_listing(actor: &Actor, mentor_id: Uuid) -> ApiResult<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Mentor if actor.id == mentor_id => Ok(()),
        _ => Err(forbidden("You cannot list another mentor's sessions")),
    }
}

pub fn require_role(actor: &Actor, role: Role) -> ApiResult<()> {
    if actor.role != role {
        return Err(ApiError::Forbidden(format!("{} access required", role)));
    }
    Ok(())
}
