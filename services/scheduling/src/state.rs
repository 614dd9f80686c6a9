//! Application state shared across handlers

use sqlx::PgPool;
use std::sync::Arc;

use crate::{lifecycle::SessionService, middleware::JwtVerifier};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionService>,
    pub verifier: JwtVerifier,
    /// Probed by `/health`; absent when running on the in-memory store
    pub db_pool: Option<PgPool>,
}
