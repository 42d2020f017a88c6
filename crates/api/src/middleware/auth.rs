//! Identity extractors.
//!
//! The API gateway in front of this service authenticates users against the
//! identity provider and forwards the verified claims as headers, together
//! with a shared token proving the request came through the gateway.

use axum::{extract::FromRequestParts, http::HeaderMap, http::request::Parts};
use certprep_core::{Email, UserId};
use secrecy::ExposeSecret;

use crate::config::ApiConfig;
use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

pub const GATEWAY_TOKEN_HEADER: &str = "x-gateway-token";
pub const IDENTITY_SUB_HEADER: &str = "x-identity-sub";
pub const IDENTITY_EMAIL_HEADER: &str = "x-identity-email";
pub const IDENTITY_GROUPS_HEADER: &str = "x-identity-groups";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub groups: Vec<String>,
}

impl CurrentUser {
    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

/// Extractor that requires an authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = identity_from_headers(&parts.headers, state.config())?;
        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}

/// Extractor that requires membership of the configured admin group.
///
/// Unauthenticated callers get 401, authenticated non-admins 403.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;

        if !user.in_group(&state.config().admin_group) {
            tracing::warn!(user_id = %user.id, "Admin route requested by non-admin");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(Self(user))
    }
}

/// Read the forwarded identity, verifying the gateway token first.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if the token is wrong or claims are missing.
pub fn identity_from_headers(
    headers: &HeaderMap,
    config: &ApiConfig,
) -> Result<CurrentUser, AppError> {
    let token = header_str(headers, GATEWAY_TOKEN_HEADER).unwrap_or_default();
    if !constant_time_eq(
        token.as_bytes(),
        config.gateway_token.expose_secret().as_bytes(),
    ) {
        return Err(AppError::Unauthorized("Authentication required".to_string()));
    }

    let sub = header_str(headers, IDENTITY_SUB_HEADER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing identity subject".to_string()))?;

    let email = header_str(headers, IDENTITY_EMAIL_HEADER)
        .and_then(|raw| Email::parse(raw).ok())
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid identity email".to_string()))?;

    let groups = header_str(headers, IDENTITY_GROUPS_HEADER)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(CurrentUser {
        id: UserId::new(sub),
        email,
        groups,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b) {
        result |= x ^ y;
    }

    result == 0
}
