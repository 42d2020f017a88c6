//! Database operations for the CertPrep `PostgreSQL` store.
//!
//! # Schema: `certprep`
//!
//! ## Tables
//!
//! - `user` - Learners keyed by identity-provider subject, with free-form attributes
//! - `question` - Question bank per certification and quiz
//! - `progress` - Latest graded attempt per (user, `certification#quiz`)
//! - `customer` - Stripe customer, subscription status and one-time purchases
//! - `processed_webhook_event` - Idempotency ledger for Stripe webhooks
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p certprep-cli -- migrate
//! ```

pub mod customers;
pub mod progress;
pub mod questions;
pub mod users;
pub mod webhook_events;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use customers::{CustomerRepository, PgBillingStore};
pub use progress::ProgressRepository;
pub use questions::{QuestionFilter, QuestionRepository};
pub use users::{ProfileUpdate, UserRepository};
pub use webhook_events::WebhookEventRepository;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value failed to parse into its domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Pagination parameters shared by list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 50;

    /// Clamp user-supplied paging values to `1..=max_limit` and `>= 0`.
    #[must_use]
    pub fn new(limit: Option<i64>, offset: Option<i64>, max_limit: i64) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, max_limit),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-violation into `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// Parse a stored text value, reporting failures as data corruption.
pub(crate) fn parse_stored<T>(value: &str, what: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {what} in database: {e}")))
}
