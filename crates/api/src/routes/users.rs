//! Current-user route handlers.

use axum::{Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::billing::{EntitlementsResponse, load_entitlements};
use crate::db::{ProfileUpdate, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::Json;
use crate::middleware::RequireUser;
use crate::models::User;
use crate::state::AppState;

/// Longest display name accepted, in characters.
const MAX_DISPLAY_NAME_LENGTH: usize = 100;

/// Build the user router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/me", get(get_me).put(update_me))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub entitlements: EntitlementsResponse,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMeRequest {
    /// Empty or whitespace clears the name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Shallow-merged into stored attributes; must be an object.
    #[serde(default)]
    pub attributes: Option<Value>,
}

/// The caller's account, created on first request.
///
/// # Errors
///
/// Returns 500 if the database query fails.
pub async fn get_me(
    RequireUser(identity): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>> {
    let user = UserRepository::new(state.pool())
        .upsert_from_identity(&identity.id, &identity.email)
        .await?;
    let entitlements = load_entitlements(state.pool(), &identity.id).await?;

    Ok(Json(MeResponse {
        user,
        entitlements: entitlements.into(),
    }))
}

/// Update the caller's profile.
///
/// # Errors
///
/// Returns 400 if the display name is too long or attributes is not an object.
pub async fn update_me(
    RequireUser(identity): RequireUser,
    State(state): State<AppState>,
    Json(body): Json<UpdateMeRequest>,
) -> Result<Json<User>> {
    let update = profile_update(body)?;

    let users = UserRepository::new(state.pool());
    users
        .upsert_from_identity(&identity.id, &identity.email)
        .await?;
    let user = users.update_profile(&identity.id, update).await?;

    tracing::debug!(user_id = %identity.id, "Profile updated");
    Ok(Json(user))
}

fn profile_update(body: UpdateMeRequest) -> Result<ProfileUpdate> {
    let display_name = match body.display_name {
        None => None,
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.chars().count() > MAX_DISPLAY_NAME_LENGTH {
                return Err(AppError::BadRequest(format!(
                    "display_name must be at most {MAX_DISPLAY_NAME_LENGTH} characters"
                )));
            }
            Some((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
    };

    let attributes = match body.attributes {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            return Err(AppError::BadRequest(
                "attributes must be a JSON object".to_string(),
            ));
        }
    };

    Ok(ProfileUpdate {
        display_name,
        attributes,
    })
}
