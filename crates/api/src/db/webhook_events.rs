//! Processed webhook event ledger.
//!
//! An event id is recorded only after its handler succeeded, so a failed
//! delivery is retried by Stripe and processed again.

use certprep_core::StripeEventId;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;

/// Repository for the webhook idempotency ledger.
pub struct WebhookEventRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WebhookEventRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_processed(&self, event_id: &StripeEventId) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM certprep.processed_webhook_event WHERE event_id = $1)",
        )
        .bind(event_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Record a processed event. Returns `false` if it was already recorded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record(
        &self,
        event_id: &StripeEventId,
        event_type: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO certprep.processed_webhook_event (event_id, event_type, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            ",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete ledger rows past their expiry. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn prune_expired(&self) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM certprep.processed_webhook_event WHERE expires_at < NOW()")
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
