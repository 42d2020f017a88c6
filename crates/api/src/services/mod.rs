//! Business logic services for the API.
//!
//! # Services
//!
//! - `certificate` - PDF certificate rendering
//! - `stripe` - Stripe REST client and webhook signatures
//! - `webhook` - Idempotent Stripe webhook processing

pub mod certificate;
pub mod stripe;
pub mod webhook;

pub use certificate::{CertificateData, CertificateError};
pub use stripe::{StripeClient, StripeError};
pub use webhook::{BillingStore, WebhookError, WebhookOutcome, WebhookProcessor};
