//! Learner account model.

use certprep_core::{Email, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A learner, keyed by the identity provider's subject.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub display_name: Option<String>,
    /// Free-form profile attributes (always a JSON object).
    pub attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Name printed on certificates: display name if set, else the email.
    #[must_use]
    pub fn certificate_name(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.email.as_str())
    }
}
