//! Webhook ledger maintenance.
//!
//! `PostgreSQL` has no native row TTL, so expired ledger rows are deleted by
//! running `certprep-cli ledger prune` on a schedule.

use certprep_api::db::WebhookEventRepository;

use super::{CommandError, connect};

/// Delete ledger rows whose `expires_at` has passed.
pub async fn prune() -> Result<(), CommandError> {
    let pool = connect().await?;

    let deleted = WebhookEventRepository::new(&pool).prune_expired().await?;

    tracing::info!(deleted, "Pruned expired webhook ledger rows");
    Ok(())
}
