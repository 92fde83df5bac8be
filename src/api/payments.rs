// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::{ApiError, ValidJson},
    linkage::{link_payment, LinkRequest},
    state::AppState,
    storage::{OwnershipCheck, PaymentRepository, PaymentStatus, StoredPayment},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    /// Processor payment method reference (e.g. `pm_card_visa`)
    pub payment_method: String,
    /// Must equal the order total, in minor units
    pub amount: u64,
    /// Forwarded to the processor; a UUID is generated when omitted
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePaymentResponse {
    pub message: String,
    pub payment_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
}

/// Charge a payment and attach it to its order.
#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "Payments",
    security(("bearer_auth" = [])),
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment processed and linked", body = CreatePaymentResponse),
        (status = 400, description = "Invalid input or amount mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 402, description = "Processor declined the charge"),
        (status = 403, description = "Order belongs to another account"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn create_payment(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), ApiError> {
    let linked = link_payment(
        state.storage(),
        &state.payments,
        &state.payment_currency,
        &user,
        LinkRequest {
            order_id: req.order_id,
            payment_method: req.payment_method,
            amount: req.amount,
            idempotency_key: req.idempotency_key.filter(|k| !k.trim().is_empty()),
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            message: "Payment processed successfully".to_string(),
            payment_id: linked.payment_id,
            order_id: linked.order_id,
            status: linked.status,
        }),
    ))
}

/// Caller's payments; admins see every payment.
#[utoipa::path(
    get,
    path = "/api/payments",
    tag = "Payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payments", body = [StoredPayment]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_payments(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredPayment>>, ApiError> {
    let payments = PaymentRepository::new(state.storage());
    let list = if user.is_admin() {
        payments.list_all()?
    } else {
        payments.list_by_owner(&user.user_id)?
    };
    Ok(Json(list))
}

#[utoipa::path(
    get,
    path = "/api/payments/{payment_id}",
    tag = "Payments",
    security(("bearer_auth" = [])),
    params(("payment_id" = String, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment", body = StoredPayment),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Payment not found")
    )
)]
pub async fn get_payment(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<StoredPayment>, ApiError> {
    let payment = PaymentRepository::new(state.storage())
        .get(&payment_id)
        .verify_owner(&user)?;
    Ok(Json(payment))
}
