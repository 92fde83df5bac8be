// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment processor integration.
//!
//! `PaymentGateway` creates and confirms a charge in one call. In production
//! it talks to the Stripe PaymentIntents API; without a secret key it runs a
//! deterministic sandbox so the service stays usable in development.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::StripeConfig;
use crate::storage::PaymentStatus;

const PAYMENT_INTENTS_PATH: &str = "/v1/payment_intents";

/// One charge to create and confirm.
#[derive(Debug, Clone, Copy)]
pub struct ChargeRequest<'a> {
    /// Amount in minor currency units
    pub amount: u64,
    pub currency: &'a str,
    pub payment_method: &'a str,
    /// Forwarded as the processor's `Idempotency-Key`
    pub idempotency_key: &'a str,
    pub order_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeOutcome {
    pub transaction_id: String,
    pub status: PaymentStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment processor request failed: {0}")]
    Request(String),

    #[error("payment processor response was invalid: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Stripe
// =============================================================================

#[derive(Debug, Clone)]
pub struct StripeClient {
    api_base_url: String,
    secret_key: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    decline_code: Option<String>,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PaymentError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            http,
        })
    }

    async fn create_payment_intent(&self, request: ChargeRequest<'_>) -> Result<ChargeOutcome, PaymentError> {
        let form = [
            ("amount", request.amount.to_string()),
            ("currency", request.currency.to_string()),
            ("payment_method", request.payment_method.to_string()),
            ("confirm", "true".to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("automatic_payment_methods[allow_redirects]", "never".to_string()),
            ("metadata[order_id]", request.order_id.to_string()),
        ];

        let response = self
            .http
            .post(format!("{}{}", self.api_base_url, PAYMENT_INTENTS_PATH))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", request.idempotency_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Request(format!("POST {PAYMENT_INTENTS_PATH} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::Request(format!("reading response failed: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        let intent: PaymentIntentResponse = serde_json::from_str(&body)
            .map_err(|e| PaymentError::InvalidResponse(format!("invalid payment intent JSON: {e}")))?;

        outcome_from_status(intent.id, &intent.status)
    }
}

/// Turn a non-2xx processor response into a `PaymentError`.
///
/// Card errors (and any 402) are declines; everything else is a request failure.
fn classify_error(status: StatusCode, body: &str) -> PaymentError {
    let parsed = serde_json::from_str::<StripeErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| format!("processor returned {status}"));
    let is_card_error = parsed
        .as_ref()
        .and_then(|e| e.error.kind.as_deref())
        .is_some_and(|kind| kind == "card_error");

    if status == StatusCode::PAYMENT_REQUIRED || is_card_error {
        let decline_code = parsed.and_then(|e| e.error.decline_code);
        match decline_code {
            Some(code) => PaymentError::Declined(format!("{message} ({code})")),
            None => PaymentError::Declined(message),
        }
    } else {
        PaymentError::Request(format!("processor returned {status}: {message}"))
    }
}

/// A confirmed intent that still needs a new payment method was rejected.
fn outcome_from_status(transaction_id: String, raw_status: &str) -> Result<ChargeOutcome, PaymentError> {
    let status = PaymentStatus::from_processor(raw_status);
    if status.is_rejection() {
        return Err(PaymentError::Declined(format!(
            "payment {transaction_id} ended in status {raw_status}"
        )));
    }
    Ok(ChargeOutcome {
        transaction_id,
        status,
    })
}

// =============================================================================
// Sandbox
// =============================================================================

/// Deterministic processor used when no secret key is configured.
///
/// - payment methods containing `decline` are declined
/// - payment methods containing `processing` stay `processing`
/// - everything else succeeds
///
/// The transaction id is derived from the idempotency key, so a retried
/// charge comes back with the same id, as it would from the processor.
#[derive(Debug, Clone, Default)]
pub struct SandboxProcessor;

impl SandboxProcessor {
    fn charge(&self, request: ChargeRequest<'_>) -> Result<ChargeOutcome, PaymentError> {
        let method = request.payment_method.to_ascii_lowercase();
        if method.contains("decline") {
            return Err(PaymentError::Declined("Your card was declined.".to_string()));
        }
        let status = if method.contains("processing") {
            PaymentStatus::Processing
        } else {
            PaymentStatus::Succeeded
        };
        Ok(ChargeOutcome {
            transaction_id: sandbox_transaction_id(request.idempotency_key),
            status,
        })
    }
}

fn sandbox_transaction_id(idempotency_key: &str) -> String {
    let digest = Sha256::digest(idempotency_key.as_bytes());
    let hex: String = digest.iter().take(12).map(|b| format!("{b:02x}")).collect();
    format!("pi_sandbox_{hex}")
}

// =============================================================================
// Gateway
// =============================================================================

#[derive(Debug, Clone)]
pub enum PaymentGateway {
    Stripe(StripeClient),
    Sandbox(SandboxProcessor),
}

impl PaymentGateway {
    /// Build the gateway from optional processor configuration.
    pub fn from_config(config: Option<&StripeConfig>) -> Result<Self, PaymentError> {
        match config {
            Some(config) => Ok(PaymentGateway::Stripe(StripeClient::new(config)?)),
            None => Ok(PaymentGateway::Sandbox(SandboxProcessor)),
        }
    }

    /// Short name reported by the health endpoint.
    pub fn mode(&self) -> &'static str {
        match self {
            PaymentGateway::Stripe(_) => "stripe",
            PaymentGateway::Sandbox(_) => "sandbox",
        }
    }

    /// Create and confirm a charge. Performs exactly one processor call.
    pub async fn charge(&self, request: ChargeRequest<'_>) -> Result<ChargeOutcome, PaymentError> {
        let outcome = match self {
            PaymentGateway::Stripe(client) => client.create_payment_intent(request).await?,
            PaymentGateway::Sandbox(sandbox) => sandbox.charge(request)?,
        };
        info!(
            order_id = %request.order_id,
            transaction_id = %outcome.transaction_id,
            status = ?outcome.status,
            mode = self.mode(),
            "Charge confirmed by processor"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str) -> ChargeRequest<'_> {
        ChargeRequest {
            amount: 2500,
            currency: "usd",
            payment_method: method,
            idempotency_key: "idem-1",
            order_id: "000000000000000000000000",
        }
    }

    #[tokio::test]
    async fn sandbox_accepts_and_declines_deterministically() {
        let gateway = PaymentGateway::from_config(None).unwrap();
        assert_eq!(gateway.mode(), "sandbox");

        let ok = gateway.charge(request("card_1")).await.unwrap();
        assert_eq!(ok.status, PaymentStatus::Succeeded);
        assert!(ok.transaction_id.starts_with("pi_sandbox_"));

        let pending = gateway.charge(request("pm_processing")).await.unwrap();
        assert_eq!(pending.status, PaymentStatus::Processing);

        let err = gateway.charge(request("card_declined")).await.unwrap_err();
        assert!(matches!(err, PaymentError::Declined(_)));
    }

    #[tokio::test]
    async fn sandbox_transaction_id_follows_idempotency_key() {
        let gateway = PaymentGateway::from_config(None).unwrap();
        let a = gateway.charge(request("card_1")).await.unwrap();
        let replay = gateway.charge(request("card_1")).await.unwrap();
        assert_eq!(a.transaction_id, replay.transaction_id);

        let other = gateway
            .charge(ChargeRequest {
                idempotency_key: "idem-2",
                ..request("card_1")
            })
            .await
            .unwrap();
        assert_ne!(a.transaction_id, other.transaction_id);
    }

    #[test]
    fn card_errors_are_declines() {
        let body = r#"{"error":{"type":"card_error","message":"Your card was declined.","decline_code":"insufficient_funds"}}"#;
        let err = classify_error(StatusCode::PAYMENT_REQUIRED, body);
        match err {
            PaymentError::Declined(msg) => {
                assert_eq!(msg, "Your card was declined. (insufficient_funds)")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn server_errors_are_request_failures() {
        let err = classify_error(StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(matches!(err, PaymentError::Request(_)));

        let body = r#"{"error":{"type":"invalid_request_error","message":"No such payment_method"}}"#;
        let err = classify_error(StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, PaymentError::Request(ref m) if m.contains("No such payment_method")));
    }

    #[test]
    fn rejected_intent_status_is_a_decline() {
        assert!(matches!(
            outcome_from_status("pi_1".into(), "requires_payment_method"),
            Err(PaymentError::Declined(_))
        ));
        let ok = outcome_from_status("pi_2".into(), "requires_action").unwrap();
        assert_eq!(ok.status, PaymentStatus::RequiresAction);
    }

    #[test]
    fn stripe_client_trims_base_url() {
        let client = StripeClient::new(&StripeConfig {
            secret_key: "sk_test".to_string(),
            api_base_url: "https://api.stripe.com/".to_string(),
        })
        .unwrap();
        assert_eq!(client.api_base_url, "https://api.stripe.com");
        assert_eq!(PaymentGateway::Stripe(client).mode(), "stripe");
    }
}
