//! Custom error types for the common library
//!
//! Infrastructure failures shared by every service: PostgreSQL pool and
//! migration errors, and Redis cache errors.

use redis::RedisError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred while establishing the pool
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Errors raised by the Redis cache wrapper
#[derive(Error, Debug)]
pub enum CacheError {
    /// The Redis client rejected the URL or a command failed
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    /// Redis answered something other than the expected reply
    #[error("Unexpected Redis reply: {0}")]
    UnexpectedReply(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;
