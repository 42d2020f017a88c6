//! Admin read endpoints: users, customers, Stripe payments and stats.
//!
//! Question management lives with the learner question routes in
//! `routes/questions.rs`.

use axum::{Router, extract::State, routing::get};
use certprep_core::{Money, StripeCustomerId, SubscriptionStatus, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{CustomerRepository, Page, ProgressRepository, QuestionRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{Customer, Progress, User};
use crate::services::stripe::{MAX_LIST_LIMIT, PaymentIntent};
use crate::state::AppState;

const MAX_PAGE_SIZE: i64 = 200;
const DEFAULT_PAYMENT_LIMIT: u8 = 25;

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{id}", get(user_detail))
        .route("/api/admin/customers", get(list_customers))
        .route("/api/admin/payments", get(list_payments))
        .route("/api/admin/stats", get(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Case-insensitive substring match.
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub limit: i64,
    pub offset: i64,
}

/// # Errors
///
/// Returns 500 if the database query fails.
pub async fn list_users(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserListResponse>> {
    let page = Page::new(query.limit, query.offset, MAX_PAGE_SIZE);
    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let users = UserRepository::new(state.pool()).list(email, page).await?;

    Ok(Json(UserListResponse {
        users,
        limit: page.limit,
        offset: page.offset,
    }))
}

#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    pub user: User,
    pub customer: Option<Customer>,
    pub progress: Vec<Progress>,
}

/// A user with their billing record and progress.
///
/// # Errors
///
/// Returns 404 if the user does not exist.
pub async fn user_detail(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserDetailResponse>> {
    let id = UserId::new(id);

    let user = UserRepository::new(state.pool())
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let customer = CustomerRepository::new(state.pool()).get_by_user(&id).await?;
    let progress = ProgressRepository::new(state.pool())
        .list_for_user(&id, None)
        .await?;

    Ok(Json(UserDetailResponse {
        user,
        customer,
        progress,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomerListResponse {
    pub customers: Vec<Customer>,
    pub limit: i64,
    pub offset: i64,
}

/// # Errors
///
/// Returns 400 for an unknown status filter.
pub async fn list_customers(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<CustomerListQuery>,
) -> Result<Json<CustomerListResponse>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<SubscriptionStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let page = Page::new(query.limit, query.offset, MAX_PAGE_SIZE);

    let customers = CustomerRepository::new(state.pool())
        .list(status, page)
        .await?;

    Ok(Json(CustomerListResponse {
        customers,
        limit: page.limit,
        offset: page.offset,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentListQuery {
    pub limit: Option<i64>,
    pub starting_after: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentSummary {
    pub id: String,
    pub amount: Money,
    pub currency: String,
    pub status: String,
    pub customer: Option<StripeCustomerId>,
    pub created: Option<DateTime<Utc>>,
}

impl From<PaymentIntent> for PaymentSummary {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            amount: Money::from_minor_units(intent.amount, &intent.currency),
            created: DateTime::from_timestamp(intent.created, 0),
            id: intent.id,
            currency: intent.currency,
            status: intent.status,
            customer: intent.customer,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentSummary>,
    pub has_more: bool,
}

/// Recent Stripe payment intents.
///
/// # Errors
///
/// Returns 400 for a limit outside `1..=100`, 502 if Stripe fails.
pub async fn list_payments(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<PaymentListResponse>> {
    let limit = payment_limit(query.limit)?;
    let cursor = query.starting_after.as_deref().filter(|c| !c.is_empty());

    let list = state.stripe().list_payment_intents(limit, cursor).await?;

    Ok(Json(PaymentListResponse {
        payments: list.data.into_iter().map(PaymentSummary::from).collect(),
        has_more: list.has_more,
    }))
}

fn payment_limit(limit: Option<i64>) -> Result<u8> {
    let Some(limit) = limit else {
        return Ok(DEFAULT_PAYMENT_LIMIT);
    };
    u8::try_from(limit)
        .ok()
        .filter(|l| (1..=MAX_LIST_LIMIT).contains(l))
        .ok_or_else(|| {
            AppError::BadRequest(format!("limit must be between 1 and {MAX_LIST_LIMIT}"))
        })
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: SubscriptionStatus,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub users: i64,
    pub active_questions: i64,
    pub customers_by_status: Vec<StatusCount>,
    pub passed_quizzes: i64,
}

/// Headline counts for the admin dashboard.
///
/// # Errors
///
/// Returns 500 if a database query fails.
pub async fn stats(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>> {
    let pool = state.pool();

    let user_repo = UserRepository::new(pool);
    let question_repo = QuestionRepository::new(pool);
    let customer_repo = CustomerRepository::new(pool);
    let progress_repo = ProgressRepository::new(pool);

    let (users, active_questions, by_status, passed_quizzes) = tokio::try_join!(
        user_repo.count(),
        question_repo.count_active(),
        customer_repo.count_by_status(),
        progress_repo.count_passed(),
    )?;

    Ok(Json(StatsResponse {
        users,
        active_questions,
        customers_by_status: by_status
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
        passed_quizzes,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_payment_limit() {
        assert_eq!(payment_limit(None).unwrap(), DEFAULT_PAYMENT_LIMIT);
        assert_eq!(payment_limit(Some(1)).unwrap(), 1);
        assert_eq!(payment_limit(Some(100)).unwrap(), 100);

        for bad in [0, 101, -3, 1_000] {
            let err = payment_limit(Some(bad)).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{bad}");
        }
    }

    #[test]
    fn test_payment_summary_from_intent() {
        let intent: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_3Ow",
            "amount": 4999,
            "currency": "usd",
            "status": "succeeded",
            "customer": "cus_Pq1",
            "created": 1_760_000_000
        }))
        .unwrap();

        let summary = PaymentSummary::from(intent);
        assert_eq!(summary.amount.display(), "49.99 USD");
        assert_eq!(summary.customer.unwrap().as_str(), "cus_Pq1");
        assert_eq!(summary.created.unwrap().timestamp(), 1_760_000_000);
    }
}
