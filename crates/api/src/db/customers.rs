//! Billing customer repository.
//!
//! One row per Stripe customer, unique per user. Subscription status and
//! one-time purchases are written by webhooks; checkout creates the row.

use async_trait::async_trait;
use certprep_core::{
    CertificationId, StripeCustomerId, StripeEventId, StripeSubscriptionId, SubscriptionStatus,
    UserId,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{Page, RepositoryError, WebhookEventRepository, conflict_on_unique, parse_stored};
use crate::models::Customer;
use crate::services::webhook::{BillingStore, SubscriptionUpdate};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    stripe_customer_id: String,
    user_id: String,
    subscription_id: Option<String>,
    subscription_status: String,
    current_period_end: Option<DateTime<Utc>>,
    purchased_certifications: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let purchased_certifications = row
            .purchased_certifications
            .iter()
            .map(|cert| parse_stored(cert, "certification id"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            stripe_customer_id: StripeCustomerId::new(row.stripe_customer_id),
            user_id: UserId::new(row.user_id),
            subscription_id: row.subscription_id.map(StripeSubscriptionId::new),
            subscription_status: parse_stored(&row.subscription_status, "subscription status")?,
            current_period_end: row.current_period_end,
            purchased_certifications,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const CUSTOMER_COLUMNS: &str = "stripe_customer_id, user_id, subscription_id, subscription_status, \
     current_period_end, purchased_certifications, created_at, updated_at";

/// Repository for billing customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: &UserId) -> Result<Option<Customer>, RepositoryError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM certprep.customer WHERE user_id = $1");

        sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .map(Customer::try_from)
            .transpose()
    }

    /// Create the customer row if missing. Linking an existing customer is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user is linked to a different customer.
    pub async fn link(
        &self,
        customer: &StripeCustomerId,
        user_id: &UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO certprep.customer (stripe_customer_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (stripe_customer_id) DO NOTHING
            ",
        )
        .bind(customer)
        .bind(user_id)
        .execute(self.pool)
        .await
        .map_err(conflict_on_unique("user is linked to another customer"))?;
        Ok(())
    }

    /// List customers, newest first, optionally by subscription status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<SubscriptionStatus>,
        page: Page,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {CUSTOMER_COLUMNS}
            FROM certprep.customer
            WHERE ($1::TEXT IS NULL OR subscription_status = $1)
            ORDER BY created_at DESC, stripe_customer_id
            LIMIT $2 OFFSET $3
            "
        );

        let rows = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(status.map(SubscriptionStatus::as_str))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Customer::try_from).collect()
    }

    /// Customer counts per subscription status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_status(&self) -> Result<Vec<(SubscriptionStatus, i64)>, RepositoryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT subscription_status, COUNT(*)
            FROM certprep.customer
            GROUP BY subscription_status
            ORDER BY subscription_status
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse_stored(&status, "subscription status")?, count)))
            .collect()
    }

    /// Add a purchased certification (set semantics).
    ///
    /// Returns `false` if no such customer exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_certification(
        &self,
        customer: &StripeCustomerId,
        certification: &CertificationId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE certprep.customer
            SET purchased_certifications = CASE
                    WHEN $2 = ANY(purchased_certifications) THEN purchased_certifications
                    ELSE array_append(purchased_certifications, $2)
                END,
                updated_at = NOW()
            WHERE stripe_customer_id = $1
            ",
        )
        .bind(customer)
        .bind(certification.as_str())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove a purchased certification. Returns `false` if no such customer exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_certification(
        &self,
        customer: &StripeCustomerId,
        certification: &CertificationId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE certprep.customer
            SET purchased_certifications = array_remove(purchased_certifications, $2),
                updated_at = NOW()
            WHERE stripe_customer_id = $1
            ",
        )
        .bind(customer)
        .bind(certification.as_str())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Store subscription id, status and (when given) period end.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_subscription(
        &self,
        customer: &StripeCustomerId,
        update: &SubscriptionUpdate,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE certprep.customer
            SET subscription_id = $2,
                subscription_status = $3,
                current_period_end = COALESCE($4, current_period_end),
                updated_at = NOW()
            WHERE stripe_customer_id = $1
            ",
        )
        .bind(customer)
        .bind(&update.subscription_id)
        .bind(update.status.as_str())
        .bind(update.current_period_end)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_subscription_status(
        &self,
        customer: &StripeCustomerId,
        status: SubscriptionStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE certprep.customer
            SET subscription_status = $2, updated_at = NOW()
            WHERE stripe_customer_id = $1
            ",
        )
        .bind(customer)
        .bind(status.as_str())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// `PostgreSQL`-backed [`BillingStore`] for the webhook processor.
#[derive(Clone)]
pub struct PgBillingStore {
    pool: PgPool,
}

impl PgBillingStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingStore for PgBillingStore {
    async fn is_processed(&self, event_id: &StripeEventId) -> Result<bool, RepositoryError> {
        WebhookEventRepository::new(&self.pool)
            .is_processed(event_id)
            .await
    }

    async fn record_processed(
        &self,
        event_id: &StripeEventId,
        event_type: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        WebhookEventRepository::new(&self.pool)
            .record(event_id, event_type, expires_at)
            .await
    }

    async fn link_customer(
        &self,
        customer: &StripeCustomerId,
        user_id: &UserId,
    ) -> Result<(), RepositoryError> {
        CustomerRepository::new(&self.pool)
            .link(customer, user_id)
            .await
    }

    async fn add_certification(
        &self,
        customer: &StripeCustomerId,
        certification: &CertificationId,
    ) -> Result<bool, RepositoryError> {
        CustomerRepository::new(&self.pool)
            .add_certification(customer, certification)
            .await
    }

    async fn set_subscription(
        &self,
        customer: &StripeCustomerId,
        update: &SubscriptionUpdate,
    ) -> Result<bool, RepositoryError> {
        CustomerRepository::new(&self.pool)
            .set_subscription(customer, update)
            .await
    }

    async fn set_subscription_status(
        &self,
        customer: &StripeCustomerId,
        status: SubscriptionStatus,
    ) -> Result<bool, RepositoryError> {
        CustomerRepository::new(&self.pool)
            .set_subscription_status(customer, status)
            .await
    }
}
