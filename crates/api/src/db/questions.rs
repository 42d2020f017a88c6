//! Question bank repository.

use certprep_core::{CertificationId, QuestionContent, QuestionId, QuestionStatus};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Page, RepositoryError, parse_stored};
use crate::models::Question;

#[derive(Debug, sqlx::FromRow)]
struct QuestionRow {
    id: Uuid,
    certification_id: String,
    quiz_number: i32,
    text: String,
    options: Vec<String>,
    correct_answers: Vec<i32>,
    explanation: Option<String>,
    status: String,
    domain: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = RepositoryError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: QuestionId::from_uuid(row.id),
            certification: parse_stored(&row.certification_id, "certification id")?,
            quiz_number: row.quiz_number,
            text: row.text,
            options: row.options,
            correct_answers: row.correct_answers,
            explanation: row.explanation,
            status: parse_stored(&row.status, "question status")?,
            domain: row.domain,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const QUESTION_COLUMNS: &str = "id, certification_id, quiz_number, text, options, correct_answers, \
     explanation, status, domain, created_at, updated_at";

/// Admin list filters; `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub certification: Option<CertificationId>,
    pub quiz_number: Option<i32>,
    pub status: Option<QuestionStatus>,
}

/// Repository for question database operations.
pub struct QuestionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QuestionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active questions of one quiz, in authoring order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active_for_quiz(
        &self,
        certification: &CertificationId,
        quiz_number: i32,
    ) -> Result<Vec<Question>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {QUESTION_COLUMNS}
            FROM certprep.question
            WHERE certification_id = $1 AND quiz_number = $2 AND status = 'active'
            ORDER BY created_at, id
            "
        );

        let rows = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(certification.as_str())
            .bind(quiz_number)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &QuestionFilter,
        page: Page,
    ) -> Result<Vec<Question>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {QUESTION_COLUMNS}
            FROM certprep.question
            WHERE ($1::TEXT IS NULL OR certification_id = $1)
              AND ($2::INTEGER IS NULL OR quiz_number = $2)
              AND ($3::TEXT IS NULL OR status = $3)
            ORDER BY certification_id, quiz_number, created_at, id
            LIMIT $4 OFFSET $5
            "
        );

        let rows = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(filter.certification.as_ref().map(CertificationId::as_str))
            .bind(filter.quiz_number)
            .bind(filter.status.map(QuestionStatus::as_str))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: QuestionId) -> Result<Option<Question>, RepositoryError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM certprep.question WHERE id = $1");

        sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Question::try_from)
            .transpose()
    }

    /// Insert a validated question.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, content: &QuestionContent) -> Result<Question, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO certprep.question
                (id, certification_id, quiz_number, text, options, correct_answers,
                 explanation, status, domain)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {QUESTION_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(QuestionId::new_v4())
            .bind(content.certification.as_str())
            .bind(content.quiz_number)
            .bind(&content.text)
            .bind(&content.options)
            .bind(&content.correct_answers)
            .bind(content.explanation.as_deref())
            .bind(content.status.as_str())
            .bind(content.domain.as_deref())
            .fetch_one(self.pool)
            .await
            .map_err(super::conflict_on_unique("question already exists"))?;

        row.try_into()
    }

    /// Replace the editable fields of a question.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the question does not exist.
    pub async fn update(
        &self,
        id: QuestionId,
        content: &QuestionContent,
    ) -> Result<Question, RepositoryError> {
        let sql = format!(
            r"
            UPDATE certprep.question
            SET certification_id = $2, quiz_number = $3, text = $4, options = $5,
                correct_answers = $6, explanation = $7, status = $8, domain = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {QUESTION_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(id)
            .bind(content.certification.as_str())
            .bind(content.quiz_number)
            .bind(&content.text)
            .bind(&content.options)
            .bind(&content.correct_answers)
            .bind(content.explanation.as_deref())
            .bind(content.status.as_str())
            .bind(content.domain.as_deref())
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Soft-delete: mark the question archived.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the question does not exist.
    pub async fn archive(&self, id: QuestionId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE certprep.question
            SET status = 'archived', updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM certprep.question WHERE status = 'active'")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
