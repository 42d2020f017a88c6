//! HTTP route handlers for the CertPrep API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                              - Liveness check
//! GET  /health/ready                                        - Readiness check (database)
//!
//! # Learner (identity headers required)
//! GET  /api/me                                              - Current user, created on first call
//! PUT  /api/me                                              - Update display name / attributes
//! GET  /api/certifications/{cert}/quizzes/{quiz}/questions  - Quiz questions without answers
//! POST /api/certifications/{cert}/quizzes/{quiz}/attempts   - Grade an attempt
//! GET  /api/progress                                        - Progress records
//! GET  /api/certificates/{cert}                             - PDF certificate
//!
//! # Billing
//! POST /api/billing/checkout                                - Stripe Checkout Session
//! POST /api/billing/portal                                  - Stripe billing portal
//! GET  /api/entitlements                                    - Subscription and purchases
//! POST /webhooks/stripe                                     - Stripe webhook (signed)
//!
//! # Admin (admin group required)
//! GET    /api/admin/questions                               - List questions
//! POST   /api/admin/questions                               - Create question
//! GET    /api/admin/questions/{id}                          - Question detail
//! PUT    /api/admin/questions/{id}                          - Update question
//! DELETE /api/admin/questions/{id}                          - Archive question
//! GET    /api/admin/users                                   - List users
//! GET    /api/admin/users/{id}                              - User, customer and progress
//! GET    /api/admin/customers                               - List customers
//! GET    /api/admin/payments                                - Stripe payment intents
//! GET    /api/admin/stats                                   - Headline counts
//! ```

pub mod admin;
pub mod billing;
pub mod certificates;
pub mod progress;
pub mod questions;
pub mod users;
pub mod webhooks;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Span;

use crate::middleware::{request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Create the full application router with middleware applied.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config().app_url);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(users::router())
        .merge(questions::router())
        .merge(progress::router())
        .merge(billing::router())
        .merge(certificates::router())
        .merge(webhooks::router())
        .merge(admin::router())
        .fallback(not_found)
        .layer(cors)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Per-request span; `request_id` is filled in by the request-id middleware,
/// which runs inside it.
fn request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
        request_id = tracing::field::Empty,
    )
}

fn cors_layer(app_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match HeaderValue::from_str(app_url.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(app_url, "App URL is not a valid origin; CORS disabled");
            layer
        }
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::body::to_bytes;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tracing::field::{Field, Visit};
    use tracing::span::{Id, Record};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;
    use crate::config::tests::test_config;
    use crate::middleware::auth::{
        GATEWAY_TOKEN_HEADER, IDENTITY_EMAIL_HEADER, IDENTITY_GROUPS_HEADER, IDENTITY_SUB_HEADER,
    };
    use crate::services::stripe::signature;

    /// Router over a pool that never connects; only paths that fail before
    /// touching the database are exercised here.
    fn app() -> Router {
        let config = test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/certprep_test")
            .unwrap();
        router(AppState::new(config, pool))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn as_admin(builder: axum::http::request::Builder) -> axum::http::request::Builder {
        builder
            .header(GATEWAY_TOKEN_HEADER, "gw_9fQ2xL7mZ4pR8vK1")
            .header(IDENTITY_SUB_HEADER, "admin-1")
            .header(IDENTITY_EMAIL_HEADER, "admin@example.com")
            .header(IDENTITY_GROUPS_HEADER, "admin")
    }

    /// Collects every `request_id` value recorded on a span.
    #[derive(Clone, Default)]
    struct RecordedRequestIds(Arc<Mutex<Vec<String>>>);

    struct RequestIdVisitor<'a>(&'a mut Vec<String>);

    impl Visit for RequestIdVisitor<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "request_id" {
                self.0.push(value.to_string());
            }
        }

        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "request_id" {
                self.0.push(format!("{value:?}"));
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for RecordedRequestIds {
        fn on_record(&self, _span: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
            values.record(&mut RequestIdVisitor(&mut self.0.lock().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({ "error": "Not found" }));
    }

    #[tokio::test]
    async fn test_missing_identity_is_401() {
        let response = app()
            .oneshot(Request::builder().uri("/api/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_wrong_gateway_token_is_401() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/progress")
                    .header(GATEWAY_TOKEN_HEADER, "not-the-token")
                    .header(IDENTITY_SUB_HEADER, "user-1")
                    .header(IDENTITY_EMAIL_HEADER, "learner@example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_admin_is_403() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/admin/stats")
                    .header(GATEWAY_TOKEN_HEADER, "gw_9fQ2xL7mZ4pR8vK1")
                    .header(IDENTITY_SUB_HEADER, "user-1")
                    .header(IDENTITY_EMAIL_HEADER, "learner@example.com")
                    .header(IDENTITY_GROUPS_HEADER, "learners")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Admin access required" })
        );
    }

    #[tokio::test]
    async fn test_webhook_without_signature_is_400() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/webhooks/stripe")
                    .body(Body::from(r#"{"id":"evt_1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_with_bad_signature_is_400() {
        let payload = r#"{"id":"evt_1","type":"invoice.paid"}"#;
        let header = signature::sign(
            &secrecy::SecretString::from("whsec_someoneElse"),
            payload.as_bytes(),
            chrono::Utc::now().timestamp(),
        );

        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/webhooks/stripe")
                    .header(webhooks::STRIPE_SIGNATURE_HEADER, header)
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "error": "Invalid signature" }));
    }

    #[tokio::test]
    async fn test_signed_webhook_with_unreadable_event_is_400() {
        let payload = b"not an event";
        let header = signature::sign(
            &test_config().stripe.webhook_secret,
            payload,
            chrono::Utc::now().timestamp(),
        );

        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/webhooks/stripe")
                    .header(webhooks::STRIPE_SIGNATURE_HEADER, header)
                    .body(Body::from(&payload[..]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Invalid event payload" })
        );
    }

    #[tokio::test]
    async fn test_missing_body_field_is_json_400() {
        let body = json!({
            "certification": "saa-c03",
            "quiz_number": 1,
            "options": ["a", "b"],
            "correct_answers": [0]
        });

        let response = app()
            .oneshot(
                as_admin(Request::builder())
                    .method(Method::POST)
                    .uri("/api/admin/questions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Invalid request body" })
        );
    }

    #[tokio::test]
    async fn test_invalid_certification_in_body_is_json_400() {
        let body = json!({
            "certification": "Not A Cert!",
            "quiz_number": 1,
            "text": "Which?",
            "options": ["a", "b"],
            "correct_answers": [0]
        });

        let response = app()
            .oneshot(
                as_admin(Request::builder())
                    .method(Method::POST)
                    .uri("/api/admin/questions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Invalid request body" })
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_json_400() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/api/me")
                    .header(GATEWAY_TOKEN_HEADER, "gw_9fQ2xL7mZ4pR8vK1")
                    .header(IDENTITY_SUB_HEADER, "user-1")
                    .header(IDENTITY_EMAIL_HEADER, "learner@example.com")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"display_name\": "))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Malformed JSON body" })
        );
    }

    #[tokio::test]
    async fn test_bad_query_value_is_json_400() {
        let response = app()
            .oneshot(
                as_admin(Request::builder())
                    .uri("/api/admin/questions?quiz=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Invalid query parameters" })
        );
    }

    #[tokio::test]
    async fn test_request_id_recorded_on_trace_span() {
        let recorded = RecordedRequestIds::default();
        let subscriber = tracing_subscriber::registry().with(recorded.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "gw-req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get("x-request-id").unwrap(), "gw-req-42");
        assert_eq!(*recorded.0.lock().unwrap(), vec!["gw-req-42".to_string()]);
    }
}
