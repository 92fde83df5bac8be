// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{AuthenticatedUser, Role},
    providers::images::MAX_IMAGE_BYTES,
    realtime::relay,
    state::AppState,
    storage::{OrderItem, OrderStatus, PaymentLinkage, PaymentStatus, StoredOrder, StoredPayment, StoredProduct},
};

pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

/// Plain `{ "message": ... }` acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub(crate) fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/logout", post(users::logout))
        .route("/verify/{token}", get(users::verify_email))
        .route("/forgot-password", post(users::forgot_password))
        .route("/reset-password/{token}", post(users::reset_password))
        .route("/change-password", post(users::change_password))
        .route("/profile", get(users::get_profile).put(users::update_profile))
        .route("/favorites", get(users::list_favorites))
        .route(
            "/favorites/{product_id}",
            post(users::add_favorite).delete(users::remove_favorite),
        )
        .route("/orders", get(users::list_my_orders))
        .route("/{user_id}", delete(users::delete_user));

    let api_routes = Router::new()
        .nest("/user", user_routes)
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/{product_id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route(
            "/products/{product_id}/image",
            put(products::upload_product_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route(
            "/orders/{order_id}",
            get(orders::get_order)
                .put(orders::update_order_status)
                .delete(orders::delete_order),
        )
        .route(
            "/payments",
            get(payments::list_payments).post(payments::create_payment),
        )
        .route("/payments/{payment_id}", get(payments::get_payment))
        .route("/broadcast", post(relay::broadcast));

    let app = Router::new()
        .nest("/api", api_routes)
        .route("/ws/chat", get(relay::chat_socket))
        .route("/ws/signaling", get(relay::signaling_socket))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    app.merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        users::register,
        users::login,
        users::logout,
        users::verify_email,
        users::forgot_password,
        users::reset_password,
        users::change_password,
        users::get_profile,
        users::update_profile,
        users::list_favorites,
        users::add_favorite,
        users::remove_favorite,
        users::list_my_orders,
        users::list_users,
        users::delete_user,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::upload_product_image,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::update_order_status,
        orders::delete_order,
        payments::create_payment,
        payments::list_payments,
        payments::get_payment,
        relay::chat_socket,
        relay::signaling_socket,
        relay::broadcast,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            MessageResponse,
            Role,
            AuthenticatedUser,
            users::RegisterRequest,
            users::LoginRequest,
            users::ForgotPasswordRequest,
            users::ResetPasswordRequest,
            users::ChangePasswordRequest,
            users::UpdateProfileRequest,
            users::AccountResponse,
            users::AuthResponse,
            StoredProduct,
            products::CreateProductRequest,
            products::UpdateProductRequest,
            products::ProductResponse,
            OrderItem,
            OrderStatus,
            StoredOrder,
            PaymentLinkage,
            orders::CreateOrderRequest,
            orders::UpdateOrderStatusRequest,
            PaymentStatus,
            StoredPayment,
            payments::CreatePaymentRequest,
            payments::CreatePaymentResponse,
            relay::BroadcastRequest,
            relay::BroadcastResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Accounts, authentication and profiles"),
        (name = "Products", description = "Catalog management"),
        (name = "Orders", description = "Order ledger"),
        (name = "Payments", description = "Payments and order linkage"),
        (name = "Realtime", description = "Chat and signaling relays"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bearer_for, test_state};
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, email: &str) -> String {
        let response = send(
            app,
            Method::POST,
            "/api/user/register",
            None,
            Some(json!({ "email": email, "password": "pw1" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["token"].as_str().unwrap().to_string()
    }

    #[test]
    fn openapi_document_has_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/payments"));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let (state, _dir) = test_state();
        let app = router(state);

        register(&app, "a@x.com").await;

        let response = send(
            &app,
            Method::POST,
            "/api/user/register",
            None,
            Some(json!({ "email": "a@x.com", "password": "pw1" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Email already exists");
    }

    #[tokio::test]
    async fn order_then_payment_links_processor_outcome() {
        let (state, _dir) = test_state();
        let app = router(state);
        let token = register(&app, "a@x.com").await;

        let response = send(
            &app,
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(json!({ "items": [
                { "product_id": "65f1c0ffee0123456789abc1", "quantity": 2, "price": 10 },
                { "product_id": "65f1c0ffee0123456789abc2", "quantity": 1, "price": 5 }
            ]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let order = json_body(response).await;
        assert_eq!(order["total"], 25);
        let order_id = order["id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            Method::POST,
            "/api/payments",
            Some(&token),
            Some(json!({ "order_id": order_id, "payment_method": "card_1", "amount": 25 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let payment = json_body(response).await;
        let payment_id = payment["payment_id"].as_str().unwrap().to_string();

        let response = send(&app, Method::GET, &format!("/api/orders/{order_id}"), Some(&token), None).await;
        let order = json_body(response).await;
        assert_eq!(order["payment"]["payment_id"], payment_id.as_str());
        assert_eq!(order["payment"]["status"], payment["status"]);

        let response = send(&app, Method::GET, &format!("/api/payments/{payment_id}"), Some(&token), None).await;
        let stored = json_body(response).await;
        assert_eq!(order["payment"]["transaction_id"], stored["transaction_id"]);
        assert_eq!(order["payment"]["amount"], stored["amount"]);
        assert_eq!(order["payment"]["method"], stored["method"]);
    }

    #[tokio::test]
    async fn payment_for_missing_order_leaves_no_record() {
        let (state, _dir) = test_state();
        let app = router(state);
        let token = register(&app, "a@x.com").await;

        let response = send(
            &app,
            Method::POST,
            "/api/payments",
            Some(&token),
            Some(json!({ "order_id": "000000000000000000000000", "payment_method": "card_1", "amount": 25 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Order not found");

        let response = send(&app, Method::GET, "/api/payments", Some(&token), None).await;
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let (state, _dir) = test_state();
        let app = router(state);

        let response = send(&app, Method::GET, "/api/orders", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&app, Method::GET, "/api/orders", Some("not-a-jwt"), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn catalog_writes_require_admin() {
        let (state, _dir) = test_state();
        let customer = bearer_for(&state, "user_1", Role::Customer);
        let admin = bearer_for(&state, "admin_1", Role::Admin);
        let app = router(state);
        let product = json!({ "name": "Lamp", "price": 1999, "category": "home" });

        let response = send(
            &app,
            Method::POST,
            "/api/products",
            Some(customer.trim_start_matches("Bearer ")),
            Some(product.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(
            &app,
            Method::POST,
            "/api/products",
            Some(admin.trim_start_matches("Bearer ")),
            Some(product),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn malformed_json_is_a_400() {
        let (state, _dir) = test_state();
        let app = router(state);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/user/login")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn chat_rejects_invalid_token_before_upgrade() {
        let (state, _dir) = test_state();
        let app = router(state);

        let response = send(&app, Method::GET, "/ws/chat?token=garbage", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let (state, _dir) = test_state();
        let app = router(state);

        let response = send(&app, Method::GET, "/health/live", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
