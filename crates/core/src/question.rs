//! Question content validation.
//!
//! Admin create/update requests deserialize into [`QuestionContent`] and are
//! validated here before anything touches the database.

use serde::{Deserialize, Serialize};

use crate::types::{CertificationId, QuestionStatus};

/// Minimum number of answer options.
pub const MIN_OPTIONS: usize = 2;
/// Maximum number of answer options.
pub const MAX_OPTIONS: usize = 6;
/// Maximum length of question text, options and explanation.
pub const MAX_TEXT_LENGTH: usize = 4000;

/// Validation errors for question content.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,
    #[error("text fields must be at most {MAX_TEXT_LENGTH} characters")]
    TooLong,
    #[error("a question needs {MIN_OPTIONS}-{MAX_OPTIONS} options (got {0})")]
    OptionCount(usize),
    #[error("option {0} is empty")]
    EmptyOption(usize),
    #[error("at least one correct answer is required")]
    NoCorrectAnswer,
    #[error("correct answer index {0} is out of range")]
    AnswerOutOfRange(i32),
    #[error("correct answer index {0} is listed twice")]
    DuplicateAnswer(i32),
    #[error("quiz number must be at least 1")]
    InvalidQuizNumber,
}

/// Editable fields of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionContent {
    pub certification: CertificationId,
    pub quiz_number: i32,
    pub text: String,
    pub options: Vec<String>,
    /// Zero-based indices into `options`; more than one means "select all that apply".
    pub correct_answers: Vec<i32>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub status: QuestionStatus,
    /// Exam domain tag, e.g. "Design Resilient Architectures".
    #[serde(default)]
    pub domain: Option<String>,
}

impl QuestionContent {
    /// Validate and normalize in place.
    ///
    /// Trims text fields, drops blank explanation/domain, and sorts the
    /// correct answer indices.
    ///
    /// # Errors
    ///
    /// Returns the first [`QuestionError`] found.
    pub fn validate(mut self) -> Result<Self, QuestionError> {
        if self.quiz_number < 1 {
            return Err(QuestionError::InvalidQuizNumber);
        }

        self.text = self.text.trim().to_string();
        if self.text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&self.options.len()) {
            return Err(QuestionError::OptionCount(self.options.len()));
        }

        for (index, option) in self.options.iter_mut().enumerate() {
            *option = option.trim().to_string();
            if option.is_empty() {
                return Err(QuestionError::EmptyOption(index));
            }
        }

        self.explanation = non_blank(self.explanation);
        self.domain = non_blank(self.domain);

        let too_long = std::iter::once(&self.text)
            .chain(self.options.iter())
            .chain(self.explanation.iter())
            .any(|field| field.chars().count() > MAX_TEXT_LENGTH);
        if too_long {
            return Err(QuestionError::TooLong);
        }

        if self.correct_answers.is_empty() {
            return Err(QuestionError::NoCorrectAnswer);
        }

        let option_count = self.options.len();
        for &index in &self.correct_answers {
            let in_range = usize::try_from(index).is_ok_and(|i| i < option_count);
            if !in_range {
                return Err(QuestionError::AnswerOutOfRange(index));
            }
        }

        self.correct_answers.sort_unstable();
        let duplicate = self.correct_answers.windows(2).find_map(|pair| match pair {
            [a, b] if a == b => Some(*a),
            _ => None,
        });
        if let Some(index) = duplicate {
            return Err(QuestionError::DuplicateAnswer(index));
        }

        Ok(self)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
