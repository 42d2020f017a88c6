//! Quiz attempt scoring.
//!
//! A question counts as correct only when the submitted index set equals the
//! correct index set exactly. Unanswered questions count as wrong; answers to
//! question ids that are not part of the quiz are ignored.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::types::QuestionId;

/// Grading errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GradingError {
    #[error("quiz has no active questions")]
    EmptyQuiz,
    #[error("pass threshold must be between 1 and 100 (got {0})")]
    InvalidThreshold(u8),
}

/// The answer key of one question.
#[derive(Debug, Clone)]
pub struct AnswerKey {
    pub question_id: QuestionId,
    pub correct_answers: Vec<i32>,
    pub explanation: Option<String>,
}

/// Per-question feedback returned after grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradedQuestion {
    pub question_id: QuestionId,
    pub correct: bool,
    pub submitted: Vec<i32>,
    pub correct_answers: Vec<i32>,
    pub explanation: Option<String>,
}

/// Outcome of grading one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizResult {
    /// Percentage 0-100, rounded half up.
    pub score: i32,
    pub correct_count: i32,
    pub total_count: i32,
    pub passed: bool,
    pub questions: Vec<GradedQuestion>,
}

/// Grade an attempt against the quiz's answer keys.
///
/// # Errors
///
/// Returns [`GradingError::EmptyQuiz`] when `keys` is empty and
/// [`GradingError::InvalidThreshold`] when `pass_threshold` is outside 1-100.
pub fn grade_attempt(
    keys: &[AnswerKey],
    answers: &HashMap<QuestionId, Vec<i32>>,
    pass_threshold: u8,
) -> Result<QuizResult, GradingError> {
    if !(1..=100).contains(&pass_threshold) {
        return Err(GradingError::InvalidThreshold(pass_threshold));
    }
    if keys.is_empty() {
        return Err(GradingError::EmptyQuiz);
    }

    let questions: Vec<GradedQuestion> = keys
        .iter()
        .map(|key| {
            let submitted: BTreeSet<i32> = answers
                .get(&key.question_id)
                .map(|indices| indices.iter().copied().collect())
                .unwrap_or_default();
            let expected: BTreeSet<i32> = key.correct_answers.iter().copied().collect();

            GradedQuestion {
                question_id: key.question_id,
                correct: !submitted.is_empty() && submitted == expected,
                submitted: submitted.into_iter().collect(),
                correct_answers: expected.into_iter().collect(),
                explanation: key.explanation.clone(),
            }
        })
        .collect();

    let total = questions.len();
    let correct = questions.iter().filter(|q| q.correct).count();
    let score = percentage(correct, total);

    Ok(QuizResult {
        score,
        correct_count: to_i32(correct),
        total_count: to_i32(total),
        passed: score >= i32::from(pass_threshold),
        questions,
    })
}

/// Integer percentage, rounded half up. `total` is non-zero.
fn percentage(correct: usize, total: usize) -> i32 {
    to_i32((correct * 200 + total) / (total * 2))
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key(correct: &[i32]) -> AnswerKey {
        AnswerKey {
            question_id: QuestionId::new_v4(),
            correct_answers: correct.to_vec(),
            explanation: Some("because".to_string()),
        }
    }

    #[test]
    fn test_exact_set_match_required() {
        let keys = vec![key(&[0, 2]), key(&[1])];
        let mut answers = HashMap::new();
        answers.insert(keys[0].question_id, vec![2, 0]);
        answers.insert(keys[1].question_id, vec![1, 3]);

        let result = grade_attempt(&keys, &answers, 50).unwrap();
        assert!(result.questions[0].correct);
        assert!(!result.questions[1].correct);
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.score, 50);
        assert!(result.passed);
    }

    #[test]
    fn test_unanswered_counts_as_wrong_and_unknown_ignored() {
        let keys = vec![key(&[0]), key(&[1]), key(&[2])];
        let mut answers = HashMap::new();
        answers.insert(keys[0].question_id, vec![0]);
        answers.insert(QuestionId::new_v4(), vec![0]);

        let result = grade_attempt(&keys, &answers, 72).unwrap();
        assert_eq!(result.total_count, 3);
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.score, 33);
        assert!(!result.passed);
        assert!(result.questions[1].submitted.is_empty());
    }

    #[test]
    fn test_duplicate_submitted_indices_collapse() {
        let keys = vec![key(&[1])];
        let mut answers = HashMap::new();
        answers.insert(keys[0].question_id, vec![1, 1]);
        let result = grade_attempt(&keys, &answers, 100).unwrap();
        assert_eq!(result.score, 100);
        assert_eq!(result.questions[0].submitted, vec![1]);
    }

    #[test]
    fn test_threshold_boundary() {
        // 18 of 25 = 72%
        let keys: Vec<AnswerKey> = (0..25).map(|_| key(&[0])).collect();
        let answers: HashMap<_, _> = keys
            .iter()
            .take(18)
            .map(|k| (k.question_id, vec![0]))
            .collect();

        let result = grade_attempt(&keys, &answers, 72).unwrap();
        assert_eq!(result.score, 72);
        assert!(result.passed);

        let result = grade_attempt(&keys, &answers, 73).unwrap();
        assert!(!result.passed);
    }

    #[test]
    fn test_rounding_half_up() {
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(0, 5), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            grade_attempt(&[], &HashMap::new(), 72),
            Err(GradingError::EmptyQuiz)
        );
        assert_eq!(
            grade_attempt(&[key(&[0])], &HashMap::new(), 0),
            Err(GradingError::InvalidThreshold(0))
        );
    }
}
