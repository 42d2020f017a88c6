//! Integration tests for the CertPrep API.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and apply migrations
//! cargo run -p certprep-cli -- migrate
//!
//! # Start the server
//! cargo run -p certprep-api
//!
//! # Run integration tests
//! cargo test -p certprep-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `CERTPREP_TEST_BASE_URL` - API base URL (default `http://localhost:3000`)
//! - `CERTPREP_GATEWAY_TOKEN` - must match the server's gateway token
//! - `STRIPE_WEBHOOK_SECRET` - must match the server's webhook secret

use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder};
use sha2::Sha256;

pub const GATEWAY_TOKEN_HEADER: &str = "x-gateway-token";
pub const IDENTITY_SUB_HEADER: &str = "x-identity-sub";
pub const IDENTITY_EMAIL_HEADER: &str = "x-identity-email";
pub const IDENTITY_GROUPS_HEADER: &str = "x-identity-groups";

/// Base URL of the API under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("CERTPREP_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// An identity as the upstream gateway would forward it.
#[derive(Debug, Clone)]
pub struct TestIdentity {
    pub sub: String,
    pub email: String,
    pub groups: Vec<String>,
}

impl TestIdentity {
    /// A fresh learner that has never been seen by the server.
    #[must_use]
    pub fn learner() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            sub: format!("test|{id}"),
            email: format!("learner-{id}@example.com"),
            groups: Vec::new(),
        }
    }

    /// A fresh member of the admin group.
    #[must_use]
    pub fn admin() -> Self {
        Self {
            groups: vec![env_or("CERTPREP_ADMIN_GROUP", "admin")],
            ..Self::learner()
        }
    }
}

/// HTTP client that attaches gateway identity headers.
#[derive(Debug, Clone)]
pub struct TestClient {
    client: Client,
    base_url: String,
    gateway_token: String,
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: base_url(),
            gateway_token: env_or("CERTPREP_GATEWAY_TOKEN", "gw_local_dev_token_change_me"),
        }
    }

    /// Unauthenticated request.
    #[must_use]
    pub fn anonymous(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
    }

    /// Request carrying `identity` through the gateway headers.
    #[must_use]
    pub fn as_user(
        &self,
        identity: &TestIdentity,
        method: reqwest::Method,
        path: &str,
    ) -> RequestBuilder {
        self.anonymous(method, path)
            .header(GATEWAY_TOKEN_HEADER, &self.gateway_token)
            .header(IDENTITY_SUB_HEADER, &identity.sub)
            .header(IDENTITY_EMAIL_HEADER, &identity.email)
            .header(IDENTITY_GROUPS_HEADER, identity.groups.join(","))
    }
}

/// Build a `Stripe-Signature` header for `payload` signed now.
#[must_use]
#[allow(clippy::missing_panics_doc)]
pub fn stripe_signature(payload: &str) -> String {
    let secret = env_or("STRIPE_WEBHOOK_SECRET", "whsec_local_dev_secret");
    let timestamp = chrono::Utc::now().timestamp();

    #[allow(clippy::unwrap_used)]
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());

    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
