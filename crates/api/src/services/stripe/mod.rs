//! Stripe integration.
//!
//! This module provides:
//! - [`StripeClient`] for customers, Checkout, the billing portal and payment listings
//! - Typed webhook payloads
//! - Webhook signature verification

mod client;
mod error;
pub mod signature;
mod types;

pub use client::{MAX_LIST_LIMIT, StripeClient};
pub use error::{SignatureError, StripeError};
pub use types::{
    CheckoutMode, CheckoutParams, CheckoutSession, Customer, Event, EventData, Invoice, List,
    PaymentIntent, PortalSession, Subscription,
};
