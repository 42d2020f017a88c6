//! Stripe REST API client.
//!
//! Requests are form-encoded with bearer authentication, as the Stripe API
//! expects. Only the handful of endpoints the API needs are wrapped.

use certprep_core::{Email, StripeCustomerId, UserId};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};

use super::error::StripeError;
use super::types::{
    CheckoutParams, CheckoutSession, Customer, ErrorEnvelope, List, PaymentIntent, PortalSession,
};
use crate::config::StripeConfig;

/// Upper bound Stripe accepts for `limit` on list endpoints.
pub const MAX_LIST_LIMIT: u8 = 100;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: SecretString,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    /// Create a customer for a learner.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe rejects it.
    #[instrument(skip(self, email), fields(user_id = %user_id))]
    pub async fn create_customer(
        &self,
        email: &Email,
        user_id: &UserId,
    ) -> Result<Customer, StripeError> {
        let form = [
            ("email", email.as_str().to_string()),
            ("metadata[user_id]", user_id.to_string()),
        ];

        let customer: Customer = self.post_form("/customers", &form).await?;
        debug!(customer = %customer.id, "Stripe customer created");
        Ok(customer)
    }

    /// Create a hosted Checkout Session.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe rejects it.
    #[instrument(skip(self, params), fields(mode = params.mode.as_str(), customer = %params.customer))]
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutParams<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let metadata_keys: Vec<String> = params
            .metadata
            .iter()
            .map(|(key, _)| metadata_key(key))
            .collect();

        let mut form = vec![
            ("mode", params.mode.as_str().to_string()),
            ("customer", params.customer.to_string()),
            ("line_items[0][price]", params.price.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("client_reference_id", params.client_reference_id.to_string()),
            ("success_url", params.success_url.clone()),
            ("cancel_url", params.cancel_url.clone()),
        ];
        form.extend(
            metadata_keys
                .iter()
                .map(String::as_str)
                .zip(params.metadata.iter().map(|(_, value)| value.clone())),
        );

        let session: CheckoutSession = self.post_form("/checkout/sessions", &form).await?;
        debug!(session = %session.id, "Checkout session created");
        Ok(session)
    }

    /// Create a billing portal session.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe rejects it.
    #[instrument(skip(self, return_url), fields(customer = %customer))]
    pub async fn create_portal_session(
        &self,
        customer: &StripeCustomerId,
        return_url: &str,
    ) -> Result<PortalSession, StripeError> {
        let form = [
            ("customer", customer.to_string()),
            ("return_url", return_url.to_string()),
        ];
        self.post_form("/billing_portal/sessions", &form).await
    }

    /// List payment intents, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe rejects it.
    #[instrument(skip(self))]
    pub async fn list_payment_intents(
        &self,
        limit: u8,
        starting_after: Option<&str>,
    ) -> Result<List<PaymentIntent>, StripeError> {
        let mut query = vec![("limit", limit.clamp(1, MAX_LIST_LIMIT).to_string())];
        if let Some(cursor) = starting_after {
            query.push(("starting_after", cursor.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/payment_intents", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .query(&query)
            .send()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))?;

        Self::parse(response).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, StripeError> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(form)
            .send()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))?;

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, StripeError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| {
                    let kind = envelope.error.kind.unwrap_or_default();
                    envelope
                        .error
                        .message
                        .map(|message| format!("{kind}: {message}"))
                })
                .unwrap_or(body);

            error!(status = status.as_u16(), message = %message, "Stripe API error");
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }
}

/// Form key for a metadata entry, e.g. `metadata[user_id]`.
fn metadata_key(key: &str) -> String {
    format!("metadata[{key}]")
}
