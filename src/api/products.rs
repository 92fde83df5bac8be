// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Catalog endpoints. Reads need any bearer token; writes need an admin.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use super::MessageResponse;
use crate::{
    auth::{AdminOnly, Auth},
    error::{ApiError, ValidJson},
    providers::ImageHostError,
    state::AppState,
    storage::{new_document_id, ProductRepository, StoredProduct},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductQuery {
    /// Only return products in this category (case-insensitive)
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Price in minor currency units
    pub price: u64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub stock: u32,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<u64>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub stock: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub message: String,
    pub product: StoredProduct,
}

fn required_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Product name is required"));
    }
    Ok(name.to_string())
}

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(ProductQuery),
    responses(
        (status = 200, description = "Products", body = [StoredProduct]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_products(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<StoredProduct>>, ApiError> {
    let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let products = ProductRepository::new(state.storage()).list(category)?;
    Ok(Json(products))
}

#[utoipa::path(
    get,
    path = "/api/products/{product_id}",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(("product_id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = StoredProduct),
        (status = 404, description = "Product not found")
    )
)]
pub async fn get_product(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<StoredProduct>, ApiError> {
    Ok(Json(ProductRepository::new(state.storage()).get(&product_id)?))
}

#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Products",
    security(("bearer_auth" = [])),
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn create_product(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let now = Utc::now();
    let product = StoredProduct {
        id: new_document_id(),
        name: required_name(&req.name)?,
        description: req.description,
        price: req.price,
        category: req.category.trim().to_string(),
        brand: req.brand,
        stock: req.stock,
        image_url: None,
        created_at: now,
        updated_at: now,
    };
    ProductRepository::new(state.storage()).create(&product)?;
    info!(admin_id = %admin.user_id, product_id = %product.id, "Product created");

    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            message: "Product created successfully".to_string(),
            product,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/products/{product_id}",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(("product_id" = String, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn update_product(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    ValidJson(req): ValidJson<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let name = req.name.as_deref().map(required_name).transpose()?;

    let product = ProductRepository::new(state.storage()).modify(&product_id, |product| {
        if let Some(name) = name {
            product.name = name;
        }
        if let Some(description) = req.description {
            product.description = description;
        }
        if let Some(price) = req.price {
            product.price = price;
        }
        if let Some(category) = req.category {
            product.category = category.trim().to_string();
        }
        if let Some(brand) = req.brand {
            product.brand = brand;
        }
        if let Some(stock) = req.stock {
            product.stock = stock;
        }
        Ok::<_, ApiError>(product.clone())
    })?;

    Ok(Json(ProductResponse {
        message: "Product updated successfully".to_string(),
        product,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/products/{product_id}",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(("product_id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted", body = MessageResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn delete_product(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    ProductRepository::new(state.storage()).delete(&product_id)?;
    info!(admin_id = %admin.user_id, product_id = %product_id, "Product deleted");
    Ok(MessageResponse::new("Product deleted successfully"))
}

/// Upload a product image. The body is the raw image; `Content-Type` must
/// be an `image/*` type.
#[utoipa::path(
    put,
    path = "/api/products/{product_id}/image",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(("product_id" = String, Path, description = "Product ID")),
    request_body(content = Vec<u8>, content_type = "image/*"),
    responses(
        (status = 200, description = "Image stored", body = ProductResponse),
        (status = 400, description = "Unsupported or empty image"),
        (status = 404, description = "Product not found"),
        (status = 502, description = "Image host rejected the upload"),
        (status = 503, description = "Image hosting not configured")
    )
)]
pub async fn upload_product_image(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ProductResponse>, ApiError> {
    let products = ProductRepository::new(state.storage());
    let product_id = products.get(&product_id)?.id;

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let url = state
        .images
        .upload(&product_id, content_type, &body)
        .await
        .map_err(image_error)?;

    let product = products.modify(&product_id, |product| {
        product.image_url = Some(url);
        Ok::<_, ApiError>(product.clone())
    })?;

    Ok(Json(ProductResponse {
        message: "Product image updated successfully".to_string(),
        product,
    }))
}

fn image_error(err: ImageHostError) -> ApiError {
    match err {
        ImageHostError::NotConfigured => ApiError::service_unavailable("Image hosting is not configured"),
        ImageHostError::UnsupportedContentType(_) | ImageHostError::InvalidSize => {
            ApiError::bad_request(err.to_string())
        }
        ImageHostError::Request(_) | ImageHostError::InvalidResponse(_) => {
            warn!(error = %err, "Image upload failed");
            ApiError::new(StatusCode::BAD_GATEWAY, "Failed to upload image")
        }
    }
}
