//! Billing route handlers: Stripe Checkout, billing portal and entitlements.

use axum::{Router, extract::State, routing::{get, post}};
use certprep_core::{CertificationId, Entitlements, StripeCustomerId, SubscriptionStatus, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::db::{CustomerRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::extract::Json;
use crate::middleware::{CurrentUser, RequireUser};
use crate::services::stripe::{CheckoutMode, CheckoutParams};
use crate::state::AppState;

/// Build the billing router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/billing/checkout", post(create_checkout))
        .route("/api/billing/portal", post(create_portal))
        .route("/api/entitlements", get(entitlements))
}

/// What a user may access, as returned to the SPA.
#[derive(Debug, Serialize)]
pub struct EntitlementsResponse {
    pub subscription_status: SubscriptionStatus,
    pub active_subscription: bool,
    pub current_period_end: Option<DateTime<Utc>>,
    pub certifications: Vec<CertificationId>,
}

impl From<Entitlements> for EntitlementsResponse {
    fn from(entitlements: Entitlements) -> Self {
        Self {
            active_subscription: entitlements.active_subscription(),
            subscription_status: entitlements.subscription_status,
            current_period_end: entitlements.current_period_end,
            certifications: entitlements.certifications,
        }
    }
}

/// Load a user's entitlements; users without a customer record have none.
pub(crate) async fn load_entitlements(pool: &PgPool, user_id: &UserId) -> Result<Entitlements> {
    Ok(CustomerRepository::new(pool)
        .get_by_user(user_id)
        .await?
        .map(|customer| customer.entitlements())
        .unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    /// Buy one certification; omit for the all-access subscription.
    #[serde(default)]
    pub certification: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

/// Start a Stripe Checkout Session.
///
/// # Errors
///
/// Returns 400 for an unknown certification price, 409 if already entitled,
/// 502 if Stripe fails.
pub async fn create_checkout(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let config = state.config();
    let certification = body
        .certification
        .as_deref()
        .map(CertificationId::parse)
        .transpose()?;

    let entitlements = load_entitlements(state.pool(), &user.id).await?;

    let (mode, price) = match &certification {
        Some(cert) => {
            let price = config.stripe.certification_price(cert).ok_or_else(|| {
                AppError::BadRequest(format!("{cert} is not sold individually"))
            })?;
            if entitlements.can_access(cert) {
                return Err(AppError::Conflict(format!("You already have access to {cert}")));
            }
            (CheckoutMode::Payment, price)
        }
        None => {
            if entitlements.active_subscription() {
                return Err(AppError::Conflict("Subscription already active".to_string()));
            }
            (CheckoutMode::Subscription, config.stripe.subscription_price.as_str())
        }
    };

    let customer = ensure_customer(&state, &user).await?;

    let mut metadata = vec![("user_id", user.id.to_string())];
    if let Some(cert) = &certification {
        metadata.push(("certification", cert.to_string()));
    }

    let params = CheckoutParams {
        mode,
        customer: &customer,
        price,
        client_reference_id: user.id.as_str(),
        metadata,
        success_url: format!(
            "{}/billing/success?session_id={{CHECKOUT_SESSION_ID}}",
            config.app_url
        ),
        cancel_url: format!("{}/pricing", config.app_url),
    };

    let session = state.stripe().create_checkout_session(&params).await?;
    let url = session
        .url
        .ok_or_else(|| AppError::Internal("Checkout session has no URL".to_string()))?;

    tracing::info!(
        user_id = %user.id,
        session = %session.id,
        mode = mode.as_str(),
        "Checkout session started"
    );

    Ok(Json(CheckoutResponse {
        id: session.id,
        url,
    }))
}

/// The user's Stripe customer, creating and linking one on first checkout.
async fn ensure_customer(state: &AppState, user: &CurrentUser) -> Result<StripeCustomerId> {
    let customers = CustomerRepository::new(state.pool());

    if let Some(existing) = customers.get_by_user(&user.id).await? {
        return Ok(existing.stripe_customer_id);
    }

    let created = state.stripe().create_customer(&user.email, &user.id).await?;

    match customers.link(&created.id, &user.id).await {
        Ok(()) => Ok(created.id),
        // A concurrent checkout linked first; use theirs
        Err(RepositoryError::Conflict(_)) => customers
            .get_by_user(&user.id)
            .await?
            .map(|c| c.stripe_customer_id)
            .ok_or_else(|| AppError::Internal("Customer link conflict".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Open the Stripe billing portal for the caller.
///
/// # Errors
///
/// Returns 404 if the user never checked out, 502 if Stripe fails.
pub async fn create_portal(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<PortalResponse>> {
    let customer = CustomerRepository::new(state.pool())
        .get_by_user(&user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No billing account".to_string()))?;

    let return_url = format!("{}/account", state.config().app_url);
    let session = state
        .stripe()
        .create_portal_session(&customer.stripe_customer_id, &return_url)
        .await?;

    Ok(Json(PortalResponse { url: session.url }))
}

/// The caller's entitlements.
///
/// # Errors
///
/// Returns 500 if the database query fails.
pub async fn entitlements(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<EntitlementsResponse>> {
    let entitlements = load_entitlements(state.pool(), &user.id).await?;
    Ok(Json(entitlements.into()))
}
