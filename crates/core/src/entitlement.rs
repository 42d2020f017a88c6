//! Certification access rules.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{CertificationId, SubscriptionStatus};

/// What a user has paid for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Entitlements {
    pub subscription_status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    /// Certifications bought one at a time.
    pub certifications: Vec<CertificationId>,
}

impl Entitlements {
    /// Whether an active or trialing subscription unlocks everything.
    #[must_use]
    pub const fn active_subscription(&self) -> bool {
        self.subscription_status.grants_access()
    }

    /// Whether the user may access paid content of `certification`.
    #[must_use]
    pub fn can_access(&self, certification: &CertificationId) -> bool {
        self.active_subscription() || self.certifications.contains(certification)
    }

    /// Whether the given quiz is readable, counting the free preview quizzes.
    #[must_use]
    pub fn can_access_quiz(
        &self,
        certification: &CertificationId,
        quiz_number: i32,
        free_quiz_count: i32,
    ) -> bool {
        quiz_number <= free_quiz_count || self.can_access(certification)
    }
}
