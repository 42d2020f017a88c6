//! Question route handlers.
//!
//! Learners read the active questions of a quiz without answers; admins
//! manage the question bank.

use axum::{Router, extract::State, http::StatusCode, routing::get};
use certprep_core::{CertificationId, QuestionContent, QuestionId, QuestionStatus, QuizKey};
use serde::{Deserialize, Serialize};

use super::billing::load_entitlements;
use crate::db::{Page, QuestionFilter, QuestionRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::{CurrentUser, RequireAdmin, RequireUser};
use crate::models::{LearnerQuestion, Question};
use crate::state::AppState;

/// Largest page the admin question list returns.
const MAX_PAGE_SIZE: i64 = 200;

/// Build the question router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/certifications/{certification}/quizzes/{quiz}/questions",
            get(list_for_quiz),
        )
        .route(
            "/api/admin/questions",
            get(admin_list).post(admin_create),
        )
        .route(
            "/api/admin/questions/{id}",
            get(admin_get).put(admin_update).delete(admin_archive),
        )
}

/// Parse `{certification}/quizzes/{quiz}` path segments.
pub(crate) fn parse_quiz_key(certification: &str, quiz: &str) -> Result<QuizKey> {
    let certification = CertificationId::parse(certification)?;
    let quiz_number: i32 = quiz
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid quiz number: {quiz}")))?;
    Ok(certification.quiz(quiz_number)?)
}

/// Fail with 403 unless the user may open this quiz.
pub(crate) async fn require_quiz_access(
    state: &AppState,
    user: &CurrentUser,
    quiz: &QuizKey,
) -> Result<()> {
    let free_quiz_count = state.config().quiz.free_quiz_count;
    if quiz.quiz_number() <= free_quiz_count {
        return Ok(());
    }

    let entitlements = load_entitlements(state.pool(), &user.id).await?;
    if entitlements.can_access_quiz(quiz.certification(), quiz.quiz_number(), free_quiz_count) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Purchase {} or subscribe to open this quiz",
            quiz.certification()
        )))
    }
}

#[derive(Debug, Serialize)]
pub struct QuizQuestionsResponse {
    pub certification: CertificationId,
    pub quiz: i32,
    pub questions: Vec<LearnerQuestion>,
}

/// Active questions of a quiz, without answers.
///
/// # Errors
///
/// Returns 400 for a bad path, 403 without entitlement.
pub async fn list_for_quiz(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path((certification, quiz)): Path<(String, String)>,
) -> Result<Json<QuizQuestionsResponse>> {
    let quiz = parse_quiz_key(&certification, &quiz)?;
    require_quiz_access(&state, &user, &quiz).await?;

    let questions = QuestionRepository::new(state.pool())
        .list_active_for_quiz(quiz.certification(), quiz.quiz_number())
        .await?;

    Ok(Json(QuizQuestionsResponse {
        certification: quiz.certification().clone(),
        quiz: quiz.quiz_number(),
        questions: questions.into_iter().map(LearnerQuestion::from).collect(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminQuestionQuery {
    pub certification: Option<String>,
    pub quiz: Option<i32>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QuestionListResponse {
    pub questions: Vec<Question>,
    pub limit: i64,
    pub offset: i64,
}

/// List questions with optional filters.
///
/// # Errors
///
/// Returns 400 for an invalid filter value.
pub async fn admin_list(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<AdminQuestionQuery>,
) -> Result<Json<QuestionListResponse>> {
    let filter = QuestionFilter {
        certification: query
            .certification
            .as_deref()
            .map(CertificationId::parse)
            .transpose()?,
        quiz_number: query.quiz,
        status: query
            .status
            .as_deref()
            .map(str::parse::<QuestionStatus>)
            .transpose()
            .map_err(AppError::BadRequest)?,
    };
    let page = Page::new(query.limit, query.offset, MAX_PAGE_SIZE);

    let questions = QuestionRepository::new(state.pool())
        .list(&filter, page)
        .await?;

    Ok(Json(QuestionListResponse {
        questions,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Create a question.
///
/// # Errors
///
/// Returns 400 if validation fails.
pub async fn admin_create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(content): Json<QuestionContent>,
) -> Result<(StatusCode, Json<Question>)> {
    let content = content.validate()?;
    let question = QuestionRepository::new(state.pool())
        .create(&content)
        .await?;

    tracing::info!(
        question_id = %question.id,
        certification = %question.certification,
        quiz = question.quiz_number,
        admin = %admin.id,
        "Question created"
    );

    Ok((StatusCode::CREATED, Json(question)))
}

/// # Errors
///
/// Returns 404 if the question does not exist.
pub async fn admin_get(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Question>> {
    let id = parse_question_id(&id)?;
    QuestionRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))
}

/// Replace a question's editable fields.
///
/// # Errors
///
/// Returns 400 if validation fails, 404 if the question does not exist.
pub async fn admin_update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(content): Json<QuestionContent>,
) -> Result<Json<Question>> {
    let id = parse_question_id(&id)?;
    let content = content.validate()?;
    let question = QuestionRepository::new(state.pool())
        .update(id, &content)
        .await?;

    tracing::info!(question_id = %id, admin = %admin.id, "Question updated");
    Ok(Json(question))
}

/// Archive a question.
///
/// # Errors
///
/// Returns 404 if the question does not exist.
pub async fn admin_archive(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_question_id(&id)?;
    QuestionRepository::new(state.pool()).archive(id).await?;

    tracing::info!(question_id = %id, admin = %admin.id, "Question archived");
    Ok(StatusCode::NO_CONTENT)
}

fn parse_question_id(raw: &str) -> Result<QuestionId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid question id: {raw}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quiz_key() {
        let key = parse_quiz_key("SAA-C03", "2").unwrap();
        assert_eq!(key.to_string(), "saa-c03#2");
    }

    #[test]
    fn test_parse_quiz_key_rejects_bad_input() {
        for (cert, quiz) in [("saa-c03", "0"), ("saa-c03", "two"), ("saa_c03", "1")] {
            let err = parse_quiz_key(cert, quiz).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{cert}/{quiz}");
        }
    }

    #[test]
    fn test_parse_question_id() {
        assert!(parse_question_id("6f1c2a4e-9b1d-4c1e-8f55-0b7f6a3d2c11").is_ok());
        assert_eq!(
            parse_question_id("42").unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
