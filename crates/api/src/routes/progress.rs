//! Quiz attempt and progress route handlers.

use std::collections::HashMap;

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use certprep_core::{AnswerKey, CertificationId, QuestionId, QuizResult, grade_attempt};
use serde::{Deserialize, Serialize};

use super::questions::{parse_quiz_key, require_quiz_access};
use crate::db::{ProgressRepository, QuestionRepository};
use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireUser;
use crate::models::{Progress, Question};
use crate::state::AppState;

/// Build the progress router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/certifications/{certification}/quizzes/{quiz}/attempts",
            post(submit_attempt),
        )
        .route("/api/progress", get(list_progress))
}

#[derive(Debug, Deserialize)]
pub struct AttemptRequest {
    /// Selected option indices per question id.
    #[serde(default)]
    pub answers: HashMap<QuestionId, Vec<i32>>,
}

#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    pub progress: Progress,
    pub result: QuizResult,
}

/// Grade an attempt and store it as the user's latest for this quiz.
///
/// # Errors
///
/// Returns 400 for a bad path, 403 without entitlement, 404 if the quiz has
/// no active questions.
pub async fn submit_attempt(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path((certification, quiz)): Path<(String, String)>,
    Json(body): Json<AttemptRequest>,
) -> Result<Json<AttemptResponse>> {
    let quiz = parse_quiz_key(&certification, &quiz)?;
    require_quiz_access(&state, &user, &quiz).await?;

    let questions = QuestionRepository::new(state.pool())
        .list_active_for_quiz(quiz.certification(), quiz.quiz_number())
        .await?;
    let keys: Vec<AnswerKey> = questions.iter().map(Question::answer_key).collect();

    let result = grade_attempt(&keys, &body.answers, state.config().quiz.pass_threshold)?;

    let progress = ProgressRepository::new(state.pool())
        .upsert(&user.id, &quiz, &result)
        .await?;

    tracing::info!(
        user_id = %user.id,
        quiz = %quiz,
        score = result.score,
        passed = result.passed,
        "Quiz attempt graded"
    );

    Ok(Json(AttemptResponse { progress, result }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgressQuery {
    pub certification: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressListResponse {
    pub progress: Vec<Progress>,
}

/// The caller's progress, most recent first.
///
/// # Errors
///
/// Returns 400 for an invalid certification filter.
pub async fn list_progress(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<ProgressListResponse>> {
    let certification = query
        .certification
        .as_deref()
        .map(CertificationId::parse)
        .transpose()?;

    let progress = ProgressRepository::new(state.pool())
        .list_for_user(&user.id, certification.as_ref())
        .await?;

    Ok(Json(ProgressListResponse { progress }))
}
