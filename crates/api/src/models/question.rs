//! Question models.

use certprep_core::{AnswerKey, CertificationId, QuestionId, QuestionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stored question including its answer key.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub certification: CertificationId,
    pub quiz_number: i32,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answers: Vec<i32>,
    pub explanation: Option<String>,
    pub status: QuestionStatus,
    pub domain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    #[must_use]
    pub fn answer_key(&self) -> AnswerKey {
        AnswerKey {
            question_id: self.id,
            correct_answers: self.correct_answers.clone(),
            explanation: self.explanation.clone(),
        }
    }
}

/// What a learner sees before answering: no answer key, no explanation.
#[derive(Debug, Clone, Serialize)]
pub struct LearnerQuestion {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    /// Number of options to select; lets the UI switch to checkboxes.
    pub select_count: usize,
    pub domain: Option<String>,
}

impl From<Question> for LearnerQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            options: q.options,
            select_count: q.correct_answers.len(),
            domain: q.domain,
        }
    }
}
