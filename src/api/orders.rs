// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use super::MessageResponse;
use crate::{
    auth::Auth,
    error::{ApiError, ValidJson},
    state::AppState,
    storage::{
        is_document_id, new_document_id, AccountRepository, OrderItem, OrderRepository,
        OrderStatus, OwnershipCheck, StoredOrder,
    },
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

fn validate_items(items: &[OrderItem]) -> Result<(), ApiError> {
    if items.is_empty() {
        return Err(ApiError::bad_request("An order needs at least one item"));
    }
    for item in items {
        if !is_document_id(&item.product_id) {
            return Err(ApiError::bad_request(format!("Invalid product ID '{}'", item.product_id)));
        }
        if item.quantity == 0 {
            return Err(ApiError::bad_request("Item quantity must be at least 1"));
        }
    }
    Ok(())
}

/// Place an order for the caller. The total is computed here, once.
#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "Orders",
    security(("bearer_auth" = [])),
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = StoredOrder),
        (status = 400, description = "Invalid items or total overflow"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_order(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<StoredOrder>), ApiError> {
    validate_items(&req.items)?;

    let order = StoredOrder::new(new_document_id(), user.user_id.clone(), req.items)
        .ok_or_else(|| ApiError::bad_request("Order total is too large"))?;

    let orders = OrderRepository::new(state.storage());
    orders.create(&order)?;
    if let Err(e) = AccountRepository::new(state.storage()).add_order_ref(&user.user_id, &order.id) {
        orders.delete(&order.id)?;
        return Err(e.into());
    }
    info!(user_id = %user.user_id, order_id = %order.id, total = order.total, "Order created");

    Ok((StatusCode::CREATED, Json(order)))
}

/// Caller's orders; admins see every order.
#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "Orders",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Orders", body = [StoredOrder]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_orders(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredOrder>>, ApiError> {
    let orders = OrderRepository::new(state.storage());
    let list = if user.is_admin() {
        orders.list_all()?
    } else {
        orders.list_by_owner(&user.user_id)?
    };
    Ok(Json(list))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}",
    tag = "Orders",
    security(("bearer_auth" = [])),
    params(("order_id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = StoredOrder),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<StoredOrder>, ApiError> {
    let order = OrderRepository::new(state.storage())
        .get(&order_id)
        .verify_owner(&user)?;
    Ok(Json(order))
}

/// Change an order's status.
///
/// Admins may set any status. Owners may only cancel, and only while the
/// order is still `processing`.
#[utoipa::path(
    put,
    path = "/api/orders/{order_id}",
    tag = "Orders",
    security(("bearer_auth" = [])),
    params(("order_id" = String, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order updated", body = StoredOrder),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn update_order_status(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    ValidJson(req): ValidJson<UpdateOrderStatusRequest>,
) -> Result<Json<StoredOrder>, ApiError> {
    let orders = OrderRepository::new(state.storage());
    orders.get(&order_id).verify_owner(&user)?;

    let order = orders.modify(&order_id, |order| {
        if !user.is_admin() {
            if req.status != OrderStatus::Cancelled {
                return Err(ApiError::forbidden("Only administrators can set this status"));
            }
            if order.status != OrderStatus::Processing {
                return Err(ApiError::bad_request("Only processing orders can be cancelled"));
            }
        }
        order.status = req.status;
        Ok(order.clone())
    })?;
    info!(order_id = %order.id, status = ?order.status, by = %user.user_id, "Order status changed");

    Ok(Json(order))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{order_id}",
    tag = "Orders",
    security(("bearer_auth" = [])),
    params(("order_id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order deleted", body = MessageResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn delete_order(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let orders = OrderRepository::new(state.storage());
    let order = orders.get(&order_id).verify_owner(&user)?;

    orders.delete(&order.id)?;
    AccountRepository::new(state.storage()).remove_order_ref(&order.owner_user_id, &order.id)?;
    info!(order_id = %order.id, by = %user.user_id, "Order deleted");

    Ok(MessageResponse::new("Order deleted successfully"))
}
