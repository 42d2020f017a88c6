//! Quiz progress model.

use certprep_core::{CertificationId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latest graded attempt of one quiz by one user.
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub user_id: UserId,
    pub certification: CertificationId,
    pub quiz_number: i32,
    pub score: i32,
    pub correct_count: i32,
    pub total_count: i32,
    pub passed: bool,
    pub completed_at: DateTime<Utc>,
}
