//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::PgBillingStore;
use crate::services::{StripeClient, WebhookProcessor};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    stripe: StripeClient,
    webhooks: WebhookProcessor<PgBillingStore>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        let stripe = StripeClient::new(&config.stripe);
        let webhooks = WebhookProcessor::new(
            PgBillingStore::new(pool.clone()),
            config.quiz.webhook_ledger_ttl_days,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                webhooks,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Webhook processor backed by the database ledger.
    #[must_use]
    pub fn webhooks(&self) -> &WebhookProcessor<PgBillingStore> {
        &self.inner.webhooks
    }
}
