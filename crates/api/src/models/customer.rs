//! Billing customer model.

use certprep_core::{
    CertificationId, Entitlements, StripeCustomerId, StripeSubscriptionId, SubscriptionStatus,
    UserId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A Stripe customer linked to a learner.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub stripe_customer_id: StripeCustomerId,
    pub user_id: UserId,
    pub subscription_id: Option<StripeSubscriptionId>,
    pub subscription_status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub purchased_certifications: Vec<CertificationId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[must_use]
    pub fn entitlements(&self) -> Entitlements {
        Entitlements {
            subscription_status: self.subscription_status,
            current_period_end: self.current_period_end,
            certifications: self.purchased_certifications.clone(),
        }
    }
}
