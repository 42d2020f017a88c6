//! Stripe webhook processing.
//!
//! Every delivery goes through the processed-event ledger:
//!
//! 1. An event id already in the ledger is acknowledged without side effects.
//! 2. Otherwise the event is applied to the billing store.
//! 3. Only after that succeeds is the id recorded, with an expiry.
//!
//! A failure in step 2 leaves no ledger entry, so Stripe's redelivery gets
//! processed again.

use async_trait::async_trait;
use certprep_core::{
    CertificationId, StripeCustomerId, StripeEventId, StripeSubscriptionId, SubscriptionStatus,
    UserId,
};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::db::RepositoryError;
use crate::services::stripe::{CheckoutMode, CheckoutSession, Event, Invoice, Subscription};

/// Subscription fields written by webhook events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub subscription_id: StripeSubscriptionId,
    pub status: SubscriptionStatus,
    /// `None` keeps the stored value.
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Persistence needed by the webhook processor.
///
/// Methods returning `bool` report whether a customer row matched.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn is_processed(&self, event_id: &StripeEventId) -> Result<bool, RepositoryError>;

    /// Record a processed event; `false` if it was already present.
    async fn record_processed(
        &self,
        event_id: &StripeEventId,
        event_type: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Ensure a customer row links `customer` to `user_id`.
    async fn link_customer(
        &self,
        customer: &StripeCustomerId,
        user_id: &UserId,
    ) -> Result<(), RepositoryError>;

    async fn add_certification(
        &self,
        customer: &StripeCustomerId,
        certification: &CertificationId,
    ) -> Result<bool, RepositoryError>;

    async fn set_subscription(
        &self,
        customer: &StripeCustomerId,
        update: &SubscriptionUpdate,
    ) -> Result<bool, RepositoryError>;

    async fn set_subscription_status(
        &self,
        customer: &StripeCustomerId,
        status: SubscriptionStatus,
    ) -> Result<bool, RepositoryError>;
}

/// Webhook processing errors.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The body or the event's object did not have the expected shape.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("billing store error: {0}")]
    Store(#[from] RepositoryError),
}

/// What happened to a delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Applied to the billing store.
    Processed,
    /// Recorded without side effects (unhandled type or nothing to update).
    Ignored,
    /// Already in the ledger.
    Duplicate,
}

/// Parse a raw webhook body.
///
/// # Errors
///
/// Returns `WebhookError::InvalidPayload` if the body is not a Stripe event.
pub fn parse_event(body: &[u8]) -> Result<Event, WebhookError> {
    serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
}

/// Applies Stripe events to a [`BillingStore`] exactly once per event id.
pub struct WebhookProcessor<S> {
    store: S,
    ledger_ttl: Duration,
}

impl<S: BillingStore> WebhookProcessor<S> {
    #[must_use]
    pub fn new(store: S, ledger_ttl_days: i64) -> Self {
        Self {
            store,
            ledger_ttl: Duration::days(ledger_ttl_days),
        }
    }

    /// Process one event through the ledger.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::InvalidPayload` if the event object cannot be
    /// read, or `WebhookError::Store` if the store fails. Neither records the
    /// event.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn process(&self, event: &Event) -> Result<WebhookOutcome, WebhookError> {
        if self.store.is_processed(&event.id).await? {
            info!("Duplicate webhook event, skipping");
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = self.dispatch(event).await?;

        let expires_at = Utc::now() + self.ledger_ttl;
        let recorded = self
            .store
            .record_processed(&event.id, &event.event_type, expires_at)
            .await?;
        if !recorded {
            debug!("Event recorded concurrently by another delivery");
        }

        info!(outcome = ?outcome, "Webhook event handled");
        Ok(outcome)
    }

    async fn dispatch(&self, event: &Event) -> Result<WebhookOutcome, WebhookError> {
        match event.event_type.as_str() {
            "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
                self.checkout_completed(&object(event)?).await
            }
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.subscription_changed(&object(event)?).await
            }
            "customer.subscription.deleted" => self.subscription_deleted(&object(event)?).await,
            "invoice.payment_failed" => {
                self.invoice_status(&object(event)?, SubscriptionStatus::PastDue)
                    .await
            }
            "invoice.paid" => {
                self.invoice_status(&object(event)?, SubscriptionStatus::Active)
                    .await
            }
            other => {
                debug!(event_type = other, "Unhandled webhook event type");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn checkout_completed(
        &self,
        session: &CheckoutSession,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(customer) = session.customer.as_ref() else {
            warn!(session = %session.id, "Checkout session has no customer");
            return Ok(WebhookOutcome::Ignored);
        };

        let user_id = session
            .client_reference_id
            .as_deref()
            .or_else(|| session.metadata.get("user_id").map(String::as_str))
            .filter(|id| !id.is_empty())
            .map(UserId::new);

        if let Some(user_id) = &user_id {
            match self.store.link_customer(customer, user_id).await {
                Ok(()) => {}
                Err(RepositoryError::Conflict(msg)) => {
                    warn!(customer = %customer, user_id = %user_id, %msg, "User already linked to another customer");
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            warn!(session = %session.id, "Checkout session has no user reference");
        }

        match session.mode {
            CheckoutMode::Payment => {
                if !matches!(
                    session.payment_status.as_deref(),
                    None | Some("paid" | "no_payment_required")
                ) {
                    info!(session = %session.id, "Checkout payment not settled yet");
                    return Ok(WebhookOutcome::Ignored);
                }

                let Some(raw) = session.metadata.get("certification") else {
                    warn!(session = %session.id, "One-time checkout without certification metadata");
                    return Ok(WebhookOutcome::Ignored);
                };
                let certification = match CertificationId::parse(raw) {
                    Ok(certification) => certification,
                    Err(e) => {
                        warn!(session = %session.id, certification = %raw, error = %e, "Invalid certification in metadata");
                        return Ok(WebhookOutcome::Ignored);
                    }
                };

                if self.store.add_certification(customer, &certification).await? {
                    info!(customer = %customer, certification = %certification, "Certification purchased");
                    Ok(WebhookOutcome::Processed)
                } else {
                    warn!(customer = %customer, "No customer record for purchase");
                    Ok(WebhookOutcome::Ignored)
                }
            }
            CheckoutMode::Subscription => {
                let Some(subscription_id) = session.subscription.clone() else {
                    warn!(session = %session.id, "Subscription checkout without subscription id");
                    return Ok(WebhookOutcome::Ignored);
                };

                let update = SubscriptionUpdate {
                    subscription_id,
                    status: SubscriptionStatus::Active,
                    current_period_end: None,
                };
                self.apply_subscription(customer, &update).await
            }
            CheckoutMode::Setup | CheckoutMode::Unknown => Ok(WebhookOutcome::Ignored),
        }
    }

    async fn subscription_changed(
        &self,
        subscription: &Subscription,
    ) -> Result<WebhookOutcome, WebhookError> {
        let update = SubscriptionUpdate {
            subscription_id: subscription.id.clone(),
            status: subscription.status,
            current_period_end: subscription.period_end(),
        };
        self.apply_subscription(&subscription.customer, &update)
            .await
    }

    async fn subscription_deleted(
        &self,
        subscription: &Subscription,
    ) -> Result<WebhookOutcome, WebhookError> {
        let update = SubscriptionUpdate {
            subscription_id: subscription.id.clone(),
            status: SubscriptionStatus::Canceled,
            current_period_end: subscription.period_end(),
        };
        self.apply_subscription(&subscription.customer, &update)
            .await
    }

    async fn invoice_status(
        &self,
        invoice: &Invoice,
        status: SubscriptionStatus,
    ) -> Result<WebhookOutcome, WebhookError> {
        let (Some(customer), Some(_)) = (invoice.customer.as_ref(), invoice.subscription_id())
        else {
            debug!(invoice = ?invoice.id, "Invoice is not for a subscription");
            return Ok(WebhookOutcome::Ignored);
        };

        if self.store.set_subscription_status(customer, status).await? {
            info!(customer = %customer, status = %status, "Subscription status updated from invoice");
            Ok(WebhookOutcome::Processed)
        } else {
            warn!(customer = %customer, "No customer record for invoice");
            Ok(WebhookOutcome::Ignored)
        }
    }

    async fn apply_subscription(
        &self,
        customer: &StripeCustomerId,
        update: &SubscriptionUpdate,
    ) -> Result<WebhookOutcome, WebhookError> {
        if self.store.set_subscription(customer, update).await? {
            info!(
                customer = %customer,
                subscription = %update.subscription_id,
                status = %update.status,
                "Subscription updated"
            );
            Ok(WebhookOutcome::Processed)
        } else {
            warn!(customer = %customer, "No customer record for subscription");
            Ok(WebhookOutcome::Ignored)
        }
    }
}

/// Deserialize the event's object into the type its event type implies.
fn object<T: DeserializeOwned>(event: &Event) -> Result<T, WebhookError> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        WebhookError::InvalidPayload(format!("{} object: {e}", event.event_type))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::{Value, json};
    use tokio::sync::RwLock;

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct CustomerState {
        user_id: Option<UserId>,
        subscription_id: Option<StripeSubscriptionId>,
        status: SubscriptionStatus,
        period_end: Option<DateTime<Utc>>,
        certifications: Vec<CertificationId>,
    }

    /// In-memory billing store; `fail_writes` makes customer updates error.
    #[derive(Default, Clone)]
    struct InMemoryBillingStore {
        ledger: Arc<RwLock<HashMap<StripeEventId, DateTime<Utc>>>>,
        customers: Arc<RwLock<HashMap<StripeCustomerId, CustomerState>>>,
        fail_writes: Arc<AtomicBool>,
    }

    impl InMemoryBillingStore {
        async fn with_customer(id: &str) -> Self {
            let store = Self::default();
            store
                .customers
                .write()
                .await
                .insert(StripeCustomerId::new(id), CustomerState::default());
            store
        }

        async fn customer(&self, id: &str) -> CustomerState {
            self.customers
                .read()
                .await
                .get(&StripeCustomerId::new(id))
                .cloned()
                .unwrap()
        }

        async fn ledger_len(&self) -> usize {
            self.ledger.read().await.len()
        }

        fn check_writes(&self) -> Result<(), RepositoryError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(RepositoryError::DataCorruption("injected failure".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BillingStore for InMemoryBillingStore {
        async fn is_processed(&self, event_id: &StripeEventId) -> Result<bool, RepositoryError> {
            Ok(self.ledger.read().await.contains_key(event_id))
        }

        async fn record_processed(
            &self,
            event_id: &StripeEventId,
            _event_type: &str,
            expires_at: DateTime<Utc>,
        ) -> Result<bool, RepositoryError> {
            let mut ledger = self.ledger.write().await;
            if ledger.contains_key(event_id) {
                return Ok(false);
            }
            ledger.insert(event_id.clone(), expires_at);
            Ok(true)
        }

        async fn link_customer(
            &self,
            customer: &StripeCustomerId,
            user_id: &UserId,
        ) -> Result<(), RepositoryError> {
            self.check_writes()?;
            self.customers
                .write()
                .await
                .entry(customer.clone())
                .or_default()
                .user_id = Some(user_id.clone());
            Ok(())
        }

        async fn add_certification(
            &self,
            customer: &StripeCustomerId,
            certification: &CertificationId,
        ) -> Result<bool, RepositoryError> {
            self.check_writes()?;
            let mut customers = self.customers.write().await;
            let Some(state) = customers.get_mut(customer) else {
                return Ok(false);
            };
            if !state.certifications.contains(certification) {
                state.certifications.push(certification.clone());
            }
            Ok(true)
        }

        async fn set_subscription(
            &self,
            customer: &StripeCustomerId,
            update: &SubscriptionUpdate,
        ) -> Result<bool, RepositoryError> {
            self.check_writes()?;
            let mut customers = self.customers.write().await;
            let Some(state) = customers.get_mut(customer) else {
                return Ok(false);
            };
            state.subscription_id = Some(update.subscription_id.clone());
            state.status = update.status;
            if update.current_period_end.is_some() {
                state.period_end = update.current_period_end;
            }
            Ok(true)
        }

        async fn set_subscription_status(
            &self,
            customer: &StripeCustomerId,
            status: SubscriptionStatus,
        ) -> Result<bool, RepositoryError> {
            self.check_writes()?;
            let mut customers = self.customers.write().await;
            let Some(state) = customers.get_mut(customer) else {
                return Ok(false);
            };
            state.status = status;
            Ok(true)
        }
    }

    fn event(id: &str, event_type: &str, object: Value) -> Event {
        serde_json::from_value(json!({
            "id": id,
            "type": event_type,
            "created": 1_760_000_000,
            "data": { "object": object }
        }))
        .unwrap()
    }

    fn purchase_event(id: &str) -> Event {
        event(
            id,
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "payment",
                "customer": "cus_1",
                "client_reference_id": "user-1",
                "payment_status": "paid",
                "metadata": { "user_id": "user-1", "certification": "saa-c03" }
            }),
        )
    }

    fn processor(store: &InMemoryBillingStore) -> WebhookProcessor<InMemoryBillingStore> {
        WebhookProcessor::new(store.clone(), 30)
    }

    #[tokio::test]
    async fn test_one_time_purchase_adds_certification() {
        let store = InMemoryBillingStore::with_customer("cus_1").await;

        let outcome = processor(&store).process(&purchase_event("evt_1")).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
        let customer = store.customer("cus_1").await;
        assert_eq!(customer.user_id, Some(UserId::new("user-1")));
        assert_eq!(
            customer.certifications,
            vec![CertificationId::parse("saa-c03").unwrap()]
        );
        assert_eq!(store.ledger_len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_event_is_not_reprocessed() {
        let store = InMemoryBillingStore::with_customer("cus_1").await;
        let processor = processor(&store);

        processor.process(&purchase_event("evt_1")).await.unwrap();
        store.customers.write().await.insert(
            StripeCustomerId::new("cus_1"),
            CustomerState::default(),
        );

        let outcome = processor.process(&purchase_event("evt_1")).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Duplicate);
        assert!(store.customer("cus_1").await.certifications.is_empty());
        assert_eq!(store.ledger_len().await, 1);
    }

    #[tokio::test]
    async fn test_failure_leaves_no_ledger_entry() {
        let store = InMemoryBillingStore::with_customer("cus_1").await;
        let processor = processor(&store);

        store.fail_writes.store(true, Ordering::SeqCst);
        let result = processor.process(&purchase_event("evt_1")).await;
        assert!(matches!(result, Err(WebhookError::Store(_))));
        assert_eq!(store.ledger_len().await, 0);

        // Redelivery after recovery is processed normally
        store.fail_writes.store(false, Ordering::SeqCst);
        let outcome = processor.process(&purchase_event("evt_1")).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);
        assert_eq!(store.ledger_len().await, 1);
    }

    #[tokio::test]
    async fn test_repeat_purchase_keeps_set_semantics() {
        let store = InMemoryBillingStore::with_customer("cus_1").await;
        let processor = processor(&store);

        processor.process(&purchase_event("evt_1")).await.unwrap();
        processor.process(&purchase_event("evt_2")).await.unwrap();

        assert_eq!(store.customer("cus_1").await.certifications.len(), 1);
        assert_eq!(store.ledger_len().await, 2);
    }

    #[tokio::test]
    async fn test_subscription_checkout_activates() {
        let store = InMemoryBillingStore::with_customer("cus_1").await;

        let event = event(
            "evt_sub",
            "checkout.session.completed",
            json!({
                "id": "cs_2",
                "mode": "subscription",
                "customer": "cus_1",
                "client_reference_id": "user-1",
                "subscription": "sub_1"
            }),
        );
        let outcome = processor(&store).process(&event).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
        let customer = store.customer("cus_1").await;
        assert_eq!(customer.status, SubscriptionStatus::Active);
        assert_eq!(customer.subscription_id, Some(StripeSubscriptionId::new("sub_1")));
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let store = InMemoryBillingStore::with_customer("cus_1").await;
        let processor = processor(&store);

        let updated = event(
            "evt_a",
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "customer": "cus_1",
                "status": "trialing",
                "current_period_end": 1_770_000_000
            }),
        );
        processor.process(&updated).await.unwrap();
        let customer = store.customer("cus_1").await;
        assert_eq!(customer.status, SubscriptionStatus::Trialing);
        assert_eq!(customer.period_end.unwrap().timestamp(), 1_770_000_000);

        let failed = event(
            "evt_b",
            "invoice.payment_failed",
            json!({ "id": "in_1", "customer": "cus_1", "subscription": "sub_1" }),
        );
        processor.process(&failed).await.unwrap();
        assert_eq!(
            store.customer("cus_1").await.status,
            SubscriptionStatus::PastDue
        );

        let paid = event(
            "evt_c",
            "invoice.paid",
            json!({
                "id": "in_2",
                "customer": "cus_1",
                "parent": { "subscription_details": { "subscription": "sub_1" } }
            }),
        );
        processor.process(&paid).await.unwrap();
        assert_eq!(
            store.customer("cus_1").await.status,
            SubscriptionStatus::Active
        );

        let deleted = event(
            "evt_d",
            "customer.subscription.deleted",
            json!({ "id": "sub_1", "customer": "cus_1", "status": "canceled" }),
        );
        processor.process(&deleted).await.unwrap();
        let customer = store.customer("cus_1").await;
        assert_eq!(customer.status, SubscriptionStatus::Canceled);
        assert_eq!(customer.period_end.unwrap().timestamp(), 1_770_000_000);
    }

    #[tokio::test]
    async fn test_one_off_invoice_is_ignored() {
        let store = InMemoryBillingStore::with_customer("cus_1").await;

        let paid = event(
            "evt_inv",
            "invoice.paid",
            json!({ "id": "in_3", "customer": "cus_1" }),
        );
        let outcome = processor(&store).process(&paid).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert_eq!(store.customer("cus_1").await.status, SubscriptionStatus::None);
        assert_eq!(store.ledger_len().await, 1);
    }

    #[tokio::test]
    async fn test_unhandled_event_is_recorded() {
        let store = InMemoryBillingStore::default();

        let outcome = processor(&store)
            .process(&event("evt_x", "charge.refunded", json!({ "id": "ch_1" })))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert_eq!(store.ledger_len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_ignored() {
        let store = InMemoryBillingStore::default();

        let updated = event(
            "evt_u",
            "customer.subscription.updated",
            json!({ "id": "sub_9", "customer": "cus_missing", "status": "active" }),
        );
        let outcome = processor(&store).process(&updated).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert_eq!(store.ledger_len().await, 1);
    }

    #[tokio::test]
    async fn test_malformed_object_is_not_recorded() {
        let store = InMemoryBillingStore::default();

        let broken = event(
            "evt_bad",
            "customer.subscription.updated",
            json!({ "id": "sub_1" }),
        );
        let result = processor(&store).process(&broken).await;

        assert!(matches!(result, Err(WebhookError::InvalidPayload(_))));
        assert_eq!(store.ledger_len().await, 0);
    }

    #[tokio::test]
    async fn test_unpaid_checkout_grants_nothing() {
        let store = InMemoryBillingStore::with_customer("cus_1").await;

        let pending = event(
            "evt_p",
            "checkout.session.completed",
            json!({
                "id": "cs_3",
                "mode": "payment",
                "customer": "cus_1",
                "client_reference_id": "user-1",
                "payment_status": "unpaid",
                "metadata": { "certification": "saa-c03" }
            }),
        );
        let outcome = processor(&store).process(&pending).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert!(store.customer("cus_1").await.certifications.is_empty());
    }

    #[test]
    fn test_parse_event_rejects_garbage() {
        assert!(matches!(
            parse_event(b"not json"),
            Err(WebhookError::InvalidPayload(_))
        ));
        let event = parse_event(br#"{"id":"evt_1","type":"ping","data":{"object":{}}}"#).unwrap();
        assert_eq!(event.event_type, "ping");
    }
}
