//! Quiz progress repository.

use certprep_core::{CertificationId, QuizKey, QuizResult, UserId};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{RepositoryError, parse_stored};
use crate::models::Progress;

#[derive(Debug, sqlx::FromRow)]
struct ProgressRow {
    user_id: String,
    certification_id: String,
    quiz_number: i32,
    score: i32,
    correct_count: i32,
    total_count: i32,
    passed: bool,
    completed_at: DateTime<Utc>,
}

impl TryFrom<ProgressRow> for Progress {
    type Error = RepositoryError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::new(row.user_id),
            certification: parse_stored(&row.certification_id, "certification id")?,
            quiz_number: row.quiz_number,
            score: row.score,
            correct_count: row.correct_count,
            total_count: row.total_count,
            passed: row.passed,
            completed_at: row.completed_at,
        })
    }
}

const PROGRESS_COLUMNS: &str = "user_id, certification_id, quiz_number, score, correct_count, \
     total_count, passed, completed_at";

/// Repository for quiz progress database operations.
pub struct ProgressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProgressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store the result of an attempt, replacing any earlier attempt of the same quiz.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        user_id: &UserId,
        quiz: &QuizKey,
        result: &QuizResult,
    ) -> Result<Progress, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO certprep.progress
                (user_id, quiz_key, certification_id, quiz_number, score,
                 correct_count, total_count, passed, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (user_id, quiz_key) DO UPDATE
                SET score = EXCLUDED.score,
                    correct_count = EXCLUDED.correct_count,
                    total_count = EXCLUDED.total_count,
                    passed = EXCLUDED.passed,
                    completed_at = EXCLUDED.completed_at
            RETURNING {PROGRESS_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, ProgressRow>(&sql)
            .bind(user_id)
            .bind(quiz.to_string())
            .bind(quiz.certification().as_str())
            .bind(quiz.quiz_number())
            .bind(result.score)
            .bind(result.correct_count)
            .bind(result.total_count)
            .bind(result.passed)
            .fetch_one(self.pool)
            .await?;

        row.try_into()
    }

    /// All progress of a user, optionally narrowed to one certification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: &UserId,
        certification: Option<&CertificationId>,
    ) -> Result<Vec<Progress>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {PROGRESS_COLUMNS}
            FROM certprep.progress
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR certification_id = $2)
            ORDER BY completed_at DESC, quiz_key
            "
        );

        let rows = sqlx::query_as::<_, ProgressRow>(&sql)
            .bind(user_id)
            .bind(certification.map(CertificationId::as_str))
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Progress::try_from).collect()
    }

    /// Highest-scoring passed quiz of a certification, most recent on ties.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn best_passed(
        &self,
        user_id: &UserId,
        certification: &CertificationId,
    ) -> Result<Option<Progress>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {PROGRESS_COLUMNS}
            FROM certprep.progress
            WHERE user_id = $1 AND certification_id = $2 AND passed
            ORDER BY score DESC, completed_at DESC
            LIMIT 1
            "
        );

        sqlx::query_as::<_, ProgressRow>(&sql)
            .bind(user_id)
            .bind(certification.as_str())
            .fetch_optional(self.pool)
            .await?
            .map(Progress::try_from)
            .transpose()
    }

    /// Number of passed quiz records across all users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_passed(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM certprep.progress WHERE passed")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
