//! Mentorship session scheduling service
//!
//! Turns a user's booking request into a conflict-free, rate-limited session
//! and carries it through assignment, scheduling, rescheduling, rejection,
//! completion and cancellation.

pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod policy;
pub mod projection;
pub mod repositories;
pub mod retry;
pub mod routes;
pub mod slots;
pub mod state;
pub mod validation;

pub use lifecycle::SessionService;
pub use state::AppState;
