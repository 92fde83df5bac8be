// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction linkage: charge a payment and attach it to its order.
//!
//! The sequence is charge, persist the payment, then read and write the
//! order's linkage in one transaction. The payment record and the order are
//! separate documents, so if the order cannot be linked after the payment is
//! persisted, the payment is deleted again before the error is returned. A
//! failed compensating delete is logged at `error` level; the caller still
//! gets the original failure.
//!
//! No step is retried. The processor sees at most one charge per call. A
//! transaction id the processor has already returned (a retried idempotency
//! key) maps to the payment recorded the first time, never to a second one.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::providers::{ChargeRequest, PaymentGateway};
use crate::storage::{
    is_document_id, new_document_id, Collection, DocumentStore, OrderRepository, OrderStatus,
    OwnershipEnforcer, PaymentLinkage, PaymentRepository, PaymentStatus, StorageError,
    StoredPayment,
};

/// Input to [`link_payment`].
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub order_id: String,
    pub payment_method: String,
    /// Minor currency units
    pub amount: u64,
    /// Forwarded to the processor; generated when absent
    pub idempotency_key: Option<String>,
}

/// Result of a successful linkage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPayment {
    pub payment_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Payment amount {actual} does not match order total {expected}")]
    AmountMismatch { expected: u64, actual: u64 },

    #[error("{0}")]
    ProcessorDeclined(String),

    #[error("Order not found")]
    OrderNotFound,

    #[error("You do not have access to this order")]
    Forbidden,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LinkError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LinkError::InvalidInput(_) | LinkError::AmountMismatch { .. } => StatusCode::BAD_REQUEST,
            LinkError::ProcessorDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            LinkError::OrderNotFound => StatusCode::NOT_FOUND,
            LinkError::Forbidden => StatusCode::FORBIDDEN,
            LinkError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LinkError> for ApiError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Storage(storage) => {
                error!(error = %storage, "Payment linkage storage failure");
                ApiError::internal("Internal server error")
            }
            LinkError::ProcessorDeclined(reason) => ApiError::payment_required(reason),
            other => ApiError::new(other.status_code(), other.to_string()),
        }
    }
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Charge `request.amount` and attach the resulting payment to the order.
///
/// # Errors
///
/// - `InvalidInput` / `AmountMismatch` before anything is charged, or
///   `InvalidInput` when a replayed charge belongs to a different payment
/// - `Forbidden` if the order exists and belongs to someone else
/// - `ProcessorDeclined` if the processor refuses; nothing is persisted
/// - `OrderNotFound` if the order is missing once the payment is stored;
///   the payment record is removed first
pub async fn link_payment(
    storage: &DocumentStore,
    gateway: &PaymentGateway,
    currency: &str,
    user: &AuthenticatedUser,
    request: LinkRequest,
) -> Result<LinkedPayment, LinkError> {
    validate(&request)?;

    let orders = OrderRepository::new(storage);
    let payments = PaymentRepository::new(storage);

    // Checks that can fail without side effects. An absent order is left to
    // the post-charge lookup.
    if let Some(order) = orders.find(&request.order_id)? {
        if order.verify_ownership(user).is_err() {
            return Err(LinkError::Forbidden);
        }
        if order.status == OrderStatus::Cancelled {
            return Err(LinkError::InvalidInput("Cannot pay for a cancelled order".to_string()));
        }
        if order.total != request.amount {
            return Err(LinkError::AmountMismatch {
                expected: order.total,
                actual: request.amount,
            });
        }
    }

    // Keys are scoped to the caller so two accounts never share a processor
    // idempotency slot.
    let idempotency_key = format!(
        "{}:{}",
        user.user_id,
        request
            .idempotency_key
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    );

    let outcome = gateway
        .charge(ChargeRequest {
            amount: request.amount,
            currency,
            payment_method: &request.payment_method,
            idempotency_key: &idempotency_key,
            order_id: &request.order_id,
        })
        .await
        .map_err(|e| {
            warn!(order_id = %request.order_id, error = %e, "Charge rejected");
            LinkError::ProcessorDeclined(e.to_string())
        })?;

    let candidate = StoredPayment {
        id: new_document_id(),
        owner_user_id: user.user_id.clone(),
        order_id: request.order_id.clone(),
        method: request.payment_method.clone(),
        amount: request.amount,
        currency: currency.to_string(),
        transaction_id: outcome.transaction_id,
        status: outcome.status,
        created_at: Utc::now(),
    };
    let payment = match payments.create(&candidate) {
        Ok(()) => candidate,
        Err(StorageError::AlreadyExists(what)) if what == "Transaction" => {
            replayed_payment(&payments, user, &request, &candidate.transaction_id)?
        }
        Err(e) => return Err(e.into()),
    };

    let linked = orders.modify(&request.order_id, |order| {
        order.payment = Some(PaymentLinkage::from(&payment));
        Ok::<_, StorageError>(order.id.clone())
    });
    let order_id = match linked {
        Ok(order_id) => order_id,
        Err(e) => return Err(compensate(&payments, &payment, e)),
    };

    info!(
        order_id = %order_id,
        payment_id = %payment.id,
        status = ?payment.status,
        "Payment linked to order"
    );

    Ok(LinkedPayment {
        payment_id: payment.id,
        order_id,
        status: payment.status,
    })
}

/// The payment already recorded for a transaction id the processor replayed.
fn replayed_payment(
    payments: &PaymentRepository<'_>,
    user: &AuthenticatedUser,
    request: &LinkRequest,
    transaction_id: &str,
) -> Result<StoredPayment, LinkError> {
    let existing = payments
        .find_by_transaction_id(transaction_id)?
        .ok_or_else(|| StorageError::NotFound(Collection::Payments.entity().to_string()))?;

    if existing.owner_user_id != user.user_id || existing.order_id != request.order_id {
        return Err(LinkError::InvalidInput(
            "Idempotency key was already used for a different payment".to_string(),
        ));
    }
    info!(
        payment_id = %existing.id,
        transaction_id = %transaction_id,
        "Processor replayed an earlier charge"
    );
    Ok(existing)
}

fn validate(request: &LinkRequest) -> Result<(), LinkError> {
    if request.order_id.trim().is_empty()
        || request.payment_method.trim().is_empty()
        || request.amount == 0
    {
        return Err(LinkError::InvalidInput(
            "Order ID, payment method and a positive amount are required".to_string(),
        ));
    }
    if !is_document_id(&request.order_id) {
        return Err(LinkError::InvalidInput("Invalid order ID".to_string()));
    }
    Ok(())
}

/// Undo the persisted payment after the order step failed.
fn compensate(payments: &PaymentRepository<'_>, payment: &StoredPayment, cause: StorageError) -> LinkError {
    if let Err(e) = payments.delete(&payment.id) {
        error!(
            payment_id = %payment.id,
            transaction_id = %payment.transaction_id,
            error = %e,
            "Compensating payment delete failed; payment record is orphaned"
        );
    } else {
        warn!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            "Payment record removed after order update failed"
        );
    }

    match cause {
        StorageError::NotFound(_) => LinkError::OrderNotFound,
        other => LinkError::Storage(other),
    }
}
