//! Certificate download.

use axum::{
    Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
};
use certprep_core::CertificationId;

use super::billing::load_entitlements;
use crate::db::{ProgressRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::Path;
use crate::middleware::RequireUser;
use crate::services::certificate::{self, CertificateData};
use crate::state::AppState;

/// Build the certificate router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/certificates/{certification}", get(download))
}

/// Stream a PDF certificate for the caller's best passed quiz.
///
/// # Errors
///
/// Returns 403 without entitlement, 404 if no quiz has been passed.
pub async fn download(
    RequireUser(identity): RequireUser,
    State(state): State<AppState>,
    Path(certification): Path<String>,
) -> Result<impl IntoResponse> {
    let certification = CertificationId::parse(&certification)?;

    let entitlements = load_entitlements(state.pool(), &identity.id).await?;
    if !entitlements.can_access(&certification) {
        return Err(AppError::Forbidden(format!(
            "Purchase {certification} or subscribe to get its certificate"
        )));
    }

    let best = ProgressRepository::new(state.pool())
        .best_passed(&identity.id, &certification)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No passed quiz for {certification}")))?;

    let user = UserRepository::new(state.pool())
        .upsert_from_identity(&identity.id, &identity.email)
        .await?;

    let certification_name = certification.display_name();
    let pdf = certificate::render(&CertificateData {
        recipient: user.certificate_name(),
        certification_name: &certification_name,
        certification_code: certification.as_str(),
        score: best.score,
        completed_at: best.completed_at,
    })?;

    tracing::info!(
        user_id = %identity.id,
        certification = %certification,
        score = best.score,
        "Certificate issued"
    );

    let disposition = format!(
        "attachment; filename=\"{}\"",
        certificate::file_name(certification.as_str())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "private, no-store".to_string()),
        ],
        pdf,
    ))
}
