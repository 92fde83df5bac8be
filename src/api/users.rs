// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account endpoints: registration, login, password management, profile,
//! favorites and the admin account list.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use super::MessageResponse;
use crate::{
    auth::{
        hash_password, normalize_email, tokens::EMAIL_VERIFICATION_TTL_HOURS,
        tokens::PASSWORD_RESET_TTL_MINUTES, verify_password, AdminOnly, Auth, AuthError, Role,
        TokenPurpose, TokenSubject,
    },
    error::{ApiError, ValidJson},
    providers::mailer::{password_reset_email, verification_email},
    state::AppState,
    storage::{
        new_document_id, AccountRepository, OrderRepository, ProductRepository, StorageError,
        StoredAccount, StoredOrder, StoredProduct,
    },
};

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Profile fields a user may change. Absent fields are left untouched.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub email_verified: bool,
    pub favorite_product_ids: Vec<String>,
    pub order_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredAccount> for AccountResponse {
    fn from(account: &StoredAccount) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            role: account.role,
            email_verified: account.email_verified,
            favorite_product_ids: account.favorite_product_ids.clone(),
            order_ids: account.order_ids.clone(),
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    /// Bearer access token
    pub token: String,
    pub user: AccountResponse,
}

// =============================================================================
// Helpers
// =============================================================================

fn subject_for(account: &StoredAccount) -> TokenSubject {
    TokenSubject {
        user_id: account.id.clone(),
        name: account.display_name(),
        role: account.role,
    }
}

fn issue_access_token(state: &AppState, account: &StoredAccount) -> Result<String, ApiError> {
    Ok(state.tokens.issue_access(&subject_for(account))?.token)
}

fn require_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }
    Ok(())
}

/// Single-use links (verification, reset) report every token problem the
/// same way.
fn link_token_error(err: AuthError) -> ApiError {
    match err {
        AuthError::InternalError(_) => err.into(),
        _ => ApiError::bad_request("Invalid or expired token"),
    }
}

fn clean_name(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

// =============================================================================
// Public routes
// =============================================================================

/// Register a new account.
///
/// Emails listed in `ADMIN_EMAILS` register with the admin role. A
/// verification email is sent; delivery failure does not fail registration.
#[utoipa::path(
    post,
    path = "/api/user/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input or email already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    require_password(&req.password)?;

    let password_hash = hash_password(req.password, state.accounts.bcrypt_cost).await?;
    let role = if state.accounts.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::Customer
    };

    let now = Utc::now();
    let account = StoredAccount {
        id: new_document_id(),
        email,
        first_name: clean_name(req.first_name),
        last_name: clean_name(req.last_name),
        password_hash,
        role,
        email_verified: false,
        favorite_product_ids: Vec::new(),
        order_ids: Vec::new(),
        reset_token_id: None,
        created_at: now,
        updated_at: now,
    };
    AccountRepository::new(state.storage()).create(&account)?;
    info!(user_id = %account.id, role = %account.role, "Account registered");

    send_verification_email(&state, &account).await;

    let token = issue_access_token(&state, &account)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Registration successful".to_string(),
            token,
            user: AccountResponse::from(&account),
        }),
    ))
}

async fn send_verification_email(state: &AppState, account: &StoredAccount) {
    let issued = match state.tokens.issue(
        &subject_for(account),
        TokenPurpose::EmailVerification,
        Duration::hours(EMAIL_VERIFICATION_TTL_HOURS),
    ) {
        Ok(issued) => issued,
        Err(e) => {
            warn!(user_id = %account.id, error = %e, "Could not issue verification token");
            return;
        }
    };

    let link = format!("{}/verify/{}", state.accounts.client_url, issued.token);
    let email = verification_email(&account.email, &account.display_name(), &link);
    if let Err(e) = state.mailer.send(email).await {
        warn!(user_id = %account.id, error = %e, "Verification email not sent");
    }
}

/// Exchange email and password for an access token.
#[utoipa::path(
    post,
    path = "/api/user/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = normalize_email(&req.email);
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let account = AccountRepository::new(state.storage())
        .find_by_email(&email)?
        .ok_or_else(invalid)?;
    if !verify_password(req.password, account.password_hash.clone()).await? {
        return Err(invalid());
    }

    let token = issue_access_token(&state, &account)?;
    info!(user_id = %account.id, "User logged in");
    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token,
        user: AccountResponse::from(&account),
    }))
}

/// Confirm an email address from a verification link.
#[utoipa::path(
    get,
    path = "/api/user/verify/{token}",
    tag = "Users",
    params(("token" = String, Path, description = "Email verification token")),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token"),
        (status = 404, description = "User not found")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let claims = state
        .tokens
        .verify(&token, TokenPurpose::EmailVerification)
        .map_err(link_token_error)?;

    let newly_verified = AccountRepository::new(state.storage()).modify(&claims.sub, |account| {
        let newly_verified = !account.email_verified;
        account.email_verified = true;
        Ok::<_, StorageError>(newly_verified)
    })?;
    if newly_verified {
        info!(user_id = %claims.sub, "Email verified");
    }
    Ok(MessageResponse::new("Email verified successfully"))
}

/// Email a single-use password reset link.
#[utoipa::path(
    post,
    path = "/api/user/forgot-password",
    tag = "Users",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email sent", body = MessageResponse),
        (status = 404, description = "User not found"),
        (status = 503, description = "Email could not be sent")
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let accounts = AccountRepository::new(state.storage());
    let account = accounts
        .find_by_email(&normalize_email(&req.email))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let issued = state.tokens.issue(
        &subject_for(&account),
        TokenPurpose::PasswordReset,
        Duration::minutes(PASSWORD_RESET_TTL_MINUTES),
    )?;

    // Storing the jti invalidates any earlier reset link.
    accounts.modify(&account.id, |stored| {
        stored.reset_token_id = Some(issued.claims.jti.clone());
        Ok::<_, StorageError>(())
    })?;

    let link = format!("{}/reset-password/{}", state.accounts.client_url, issued.token);
    state
        .mailer
        .send(password_reset_email(&account.email, &link))
        .await
        .map_err(|e| {
            warn!(user_id = %account.id, error = %e, "Password reset email not sent");
            ApiError::service_unavailable("Could not send password reset email")
        })?;

    Ok(MessageResponse::new("Password reset email sent successfully"))
}

/// Set a new password using a reset link.
#[utoipa::path(
    post,
    path = "/api/user/reset-password/{token}",
    tag = "Users",
    params(("token" = String, Path, description = "Password reset token")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or missing password"),
        (status = 404, description = "User not found")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let claims = state
        .tokens
        .verify(&token, TokenPurpose::PasswordReset)
        .map_err(link_token_error)?;
    require_password(&req.password)?;

    let accounts = AccountRepository::new(state.storage());
    let account = accounts.get(&claims.sub)?;
    if account.reset_token_id.as_deref() != Some(claims.jti.as_str()) {
        return Err(link_token_error(AuthError::TokenRevoked));
    }

    let password_hash = hash_password(req.password, state.accounts.bcrypt_cost).await?;
    // The jti is checked again under the write so a link is consumed once.
    accounts.modify(&account.id, |stored| {
        if stored.reset_token_id.as_deref() != Some(claims.jti.as_str()) {
            return Err(link_token_error(AuthError::TokenRevoked));
        }
        stored.password_hash = password_hash;
        stored.reset_token_id = None;
        Ok(())
    })?;

    info!(user_id = %account.id, "Password reset");
    Ok(MessageResponse::new("Password reset successful"))
}

// =============================================================================
// Authenticated routes
// =============================================================================

/// Tokens are stateless; the client discards its copy.
#[utoipa::path(
    post,
    path = "/api/user/logout",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn logout(Auth(user): Auth) -> Json<MessageResponse> {
    info!(user_id = %user.user_id, "User logged out");
    MessageResponse::new("User logged out")
}

#[utoipa::path(
    post,
    path = "/api/user/change-password",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "New password missing"),
        (status = 401, description = "Current password incorrect")
    )
)]
pub async fn change_password(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_password(&req.new_password)?;

    let accounts = AccountRepository::new(state.storage());
    let verified_hash = accounts.get(&user.user_id)?.password_hash;
    if !verify_password(req.current_password, verified_hash.clone()).await? {
        return Err(ApiError::unauthorized("Incorrect current password"));
    }
    let password_hash = hash_password(req.new_password, state.accounts.bcrypt_cost).await?;

    accounts.modify(&user.user_id, |account| {
        // Someone else changed the password while we were hashing.
        if account.password_hash != verified_hash {
            return Err(ApiError::unauthorized("Incorrect current password"));
        }
        account.password_hash = password_hash;
        Ok(())
    })?;

    Ok(MessageResponse::new("Password changed successfully"))
}

#[utoipa::path(
    get,
    path = "/api/user/profile",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's profile", body = AccountResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_profile(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = AccountRepository::new(state.storage()).get(&user.user_id)?;
    Ok(Json(AccountResponse::from(&account)))
}

#[utoipa::path(
    put,
    path = "/api/user/profile",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = AccountResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_profile(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let profile = AccountRepository::new(state.storage()).modify(&user.user_id, |account| {
        if let Some(first_name) = req.first_name {
            account.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = req.last_name {
            account.last_name = last_name.trim().to_string();
        }
        Ok::<_, StorageError>(AccountResponse::from(&*account))
    })?;

    Ok(Json(profile))
}

/// Favorite products, resolved. Products deleted since are skipped.
#[utoipa::path(
    get,
    path = "/api/user/favorites",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Favorite products", body = [StoredProduct]),
        (status = 404, description = "User not found")
    )
)]
pub async fn list_favorites(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredProduct>>, ApiError> {
    let account = AccountRepository::new(state.storage()).get(&user.user_id)?;
    let products = ProductRepository::new(state.storage());

    let mut favorites = Vec::with_capacity(account.favorite_product_ids.len());
    for product_id in &account.favorite_product_ids {
        match products.get(product_id) {
            Ok(product) => favorites.push(product),
            Err(StorageError::NotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Json(favorites))
}

#[utoipa::path(
    post,
    path = "/api/user/favorites/{product_id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("product_id" = String, Path, description = "Product to add")),
    responses(
        (status = 200, description = "Favorite product IDs", body = [String]),
        (status = 404, description = "Product or user not found")
    )
)]
pub async fn add_favorite(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    if !ProductRepository::new(state.storage()).exists(&product_id)? {
        return Err(ApiError::not_found("Product not found"));
    }

    let favorites = AccountRepository::new(state.storage()).modify(&user.user_id, |account| {
        if !account.favorite_product_ids.contains(&product_id) {
            account.favorite_product_ids.push(product_id);
        }
        Ok::<_, StorageError>(account.favorite_product_ids.clone())
    })?;
    Ok(Json(favorites))
}

#[utoipa::path(
    delete,
    path = "/api/user/favorites/{product_id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("product_id" = String, Path, description = "Product to remove")),
    responses(
        (status = 200, description = "Favorite product IDs", body = [String]),
        (status = 404, description = "User not found")
    )
)]
pub async fn remove_favorite(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let favorites = AccountRepository::new(state.storage()).modify(&user.user_id, |account| {
        account.favorite_product_ids.retain(|id| id != &product_id);
        Ok::<_, StorageError>(account.favorite_product_ids.clone())
    })?;
    Ok(Json(favorites))
}

/// The caller's own orders.
#[utoipa::path(
    get,
    path = "/api/user/orders",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's orders", body = [StoredOrder])
    )
)]
pub async fn list_my_orders(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredOrder>>, ApiError> {
    let orders = OrderRepository::new(state.storage()).list_by_owner(&user.user_id)?;
    Ok(Json(orders))
}

// =============================================================================
// Admin routes
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/user",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All accounts", body = [AccountResponse]),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_users(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    let accounts = AccountRepository::new(state.storage()).list_all()?;
    Ok(Json(accounts.iter().map(AccountResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/user/{user_id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("user_id" = String, Path, description = "Account to delete")),
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    AccountRepository::new(state.storage()).delete(&user_id)?;
    info!(admin_id = %admin.user_id, user_id = %user_id, "Account deleted");
    Ok(MessageResponse::new("User deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::test_support::{test_state, user};

    fn register_req(email: &str, password: &str) -> ValidJson<RegisterRequest> {
        ValidJson(RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
        })
    }

    async fn registered(state: &AppState, email: &str) -> AuthenticatedUser {
        let (_, Json(resp)) = register(State(state.clone()), register_req(email, "pw1"))
            .await
            .unwrap();
        user(&resp.user.id, resp.user.role)
    }

    fn outbox_links(state: &AppState, marker: &str) -> Vec<String> {
        state
            .mailer
            .outbox()
            .unwrap()
            .sent()
            .into_iter()
            .filter_map(|email| {
                let start = email.html_body.find(marker)? + marker.len();
                let rest = &email.html_body[start..];
                let end = rest.find('"')?;
                Some(rest[..end].to_string())
            })
            .collect()
    }

    #[tokio::test]
    async fn register_then_duplicate_email_fails() {
        let (state, _dir) = test_state();

        let (status, Json(resp)) = register(State(state.clone()), register_req("a@x.com", "pw1"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(resp.user.email, "a@x.com");
        assert_eq!(resp.user.role, Role::Customer);
        assert!(!resp.token.is_empty());

        let err = register(State(state.clone()), register_req(" A@X.com ", "pw1"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Email already exists");
    }

    #[tokio::test]
    async fn register_rejects_missing_fields() {
        let (state, _dir) = test_state();
        let err = register(State(state.clone()), register_req("no-at-sign", "pw1"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = register(State(state), register_req("a@x.com", ""))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Password is required");
    }

    #[tokio::test]
    async fn configured_admin_email_registers_as_admin() {
        let (state, _dir) = test_state();
        let admin = registered(&state, "Admin@Shop.com").await;
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let (state, _dir) = test_state();
        registered(&state, "a@x.com").await;

        let Json(resp) = login(
            State(state.clone()),
            ValidJson(LoginRequest {
                email: "a@x.com".to_string(),
                password: "pw1".to_string(),
            }),
        )
        .await
        .unwrap();
        let claims = state.tokens.verify(&resp.token, TokenPurpose::Access).unwrap();
        assert_eq!(claims.sub, resp.user.id);
        assert_eq!(claims.name, "Ada Lovelace");

        for (email, password) in [("a@x.com", "wrong"), ("nobody@x.com", "pw1")] {
            let err = login(
                State(state.clone()),
                ValidJson(LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                }),
            )
            .await
            .unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
            assert_eq!(err.message, "Invalid email or password");
        }
    }

    #[tokio::test]
    async fn verification_link_marks_email_verified() {
        let (state, _dir) = test_state();
        let account = registered(&state, "a@x.com").await;

        let links = outbox_links(&state, "/verify/");
        assert_eq!(links.len(), 1);

        let Json(verified) = verify_email(State(state.clone()), Path(links[0].clone()))
            .await
            .unwrap();
        assert_eq!(verified.message, "Email verified successfully");
        let stored = AccountRepository::new(state.storage()).get(&account.user_id).unwrap();
        assert!(stored.email_verified);

        let err = verify_email(State(state), Path("garbage".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Invalid or expired token");
    }

    #[tokio::test]
    async fn password_reset_link_is_single_use() {
        let (state, _dir) = test_state();
        registered(&state, "a@x.com").await;

        let Json(sent) = forgot_password(
            State(state.clone()),
            ValidJson(ForgotPasswordRequest {
                email: "a@x.com".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(sent.message, "Password reset email sent successfully");
        let token = outbox_links(&state, "/reset-password/").pop().unwrap();

        let new_password = || {
            ValidJson(ResetPasswordRequest {
                password: "pw2".to_string(),
            })
        };
        let Json(reset) = reset_password(State(state.clone()), Path(token.clone()), new_password())
            .await
            .unwrap();
        assert_eq!(reset.message, "Password reset successful");

        let err = reset_password(State(state.clone()), Path(token), new_password())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let Json(logged_in) = login(
            State(state),
            ValidJson(LoginRequest {
                email: "a@x.com".to_string(),
                password: "pw2".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(logged_in.user.email, "a@x.com");
    }

    #[tokio::test]
    async fn access_token_is_not_a_reset_token() {
        let (state, _dir) = test_state();
        let account = registered(&state, "a@x.com").await;
        let access = state
            .tokens
            .issue_access(&TokenSubject {
                user_id: account.user_id,
                name: String::new(),
                role: Role::Customer,
            })
            .unwrap();

        let err = reset_password(
            State(state),
            Path(access.token),
            ValidJson(ResetPasswordRequest {
                password: "pw2".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.message, "Invalid or expired token");
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_is_404() {
        let (state, _dir) = test_state();
        let err = forgot_password(
            State(state),
            ValidJson(ForgotPasswordRequest {
                email: "ghost@x.com".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "User not found");
    }

    #[tokio::test]
    async fn change_password_requires_current_password() {
        let (state, _dir) = test_state();
        let account = registered(&state, "a@x.com").await;

        let err = change_password(
            Auth(account.clone()),
            State(state.clone()),
            ValidJson(ChangePasswordRequest {
                current_password: "nope".to_string(),
                new_password: "pw2".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let Json(changed) = change_password(
            Auth(account),
            State(state),
            ValidJson(ChangePasswordRequest {
                current_password: "pw1".to_string(),
                new_password: "pw2".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(changed.message, "Password changed successfully");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn password_change_keeps_orders_placed_meanwhile() {
        use crate::api::orders::{create_order, CreateOrderRequest};
        use crate::storage::OrderItem;

        let (state, _dir) = test_state();
        let account = registered(&state, "a@x.com").await;

        let change = tokio::spawn(change_password(
            Auth(account.clone()),
            State(state.clone()),
            ValidJson(ChangePasswordRequest {
                current_password: "pw1".to_string(),
                new_password: "pw2".to_string(),
            }),
        ));
        let placed: Vec<_> = (0..8)
            .map(|_| {
                tokio::spawn(create_order(
                    Auth(account.clone()),
                    State(state.clone()),
                    ValidJson(CreateOrderRequest {
                        items: vec![OrderItem {
                            product_id: new_document_id(),
                            quantity: 1,
                            price: 100,
                        }],
                    }),
                ))
            })
            .collect();

        let Json(changed) = change.await.unwrap().unwrap();
        assert_eq!(changed.message, "Password changed successfully");
        let mut order_ids = Vec::new();
        for handle in placed {
            let (_, Json(order)) = handle.await.unwrap().unwrap();
            order_ids.push(order.id);
        }

        let stored = AccountRepository::new(state.storage()).get(&account.user_id).unwrap();
        assert_eq!(stored.order_ids.len(), order_ids.len());
        for id in &order_ids {
            assert!(stored.order_ids.contains(id));
        }
        assert!(verify_password("pw2".to_string(), stored.password_hash).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_resets_consume_the_link_once() {
        let (state, _dir) = test_state();
        let account = registered(&state, "a@x.com").await;
        let Json(_) = forgot_password(
            State(state.clone()),
            ValidJson(ForgotPasswordRequest {
                email: "a@x.com".to_string(),
            }),
        )
        .await
        .unwrap();
        let token = outbox_links(&state, "/reset-password/").pop().unwrap();

        let attempts: Vec<_> = ["pw2", "pw3"]
            .into_iter()
            .map(|password| {
                tokio::spawn(reset_password(
                    State(state.clone()),
                    Path(token.clone()),
                    ValidJson(ResetPasswordRequest {
                        password: password.to_string(),
                    }),
                ))
            })
            .collect();

        let mut succeeded = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(Json(reset)) => {
                    assert_eq!(reset.message, "Password reset successful");
                    succeeded += 1;
                }
                Err(err) => assert_eq!(err.status, StatusCode::BAD_REQUEST),
            }
        }
        assert_eq!(succeeded, 1);

        let stored = AccountRepository::new(state.storage()).get(&account.user_id).unwrap();
        assert!(stored.reset_token_id.is_none());
    }

    #[tokio::test]
    async fn profile_update_is_partial() {
        let (state, _dir) = test_state();
        let account = registered(&state, "a@x.com").await;

        let Json(profile) = update_profile(
            Auth(account.clone()),
            State(state.clone()),
            ValidJson(UpdateProfileRequest {
                first_name: Some(" Grace ".to_string()),
                last_name: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(profile.first_name, "Grace");
        assert_eq!(profile.last_name, "Lovelace");

        let Json(fetched) = get_profile(Auth(account), State(state)).await.unwrap();
        assert_eq!(fetched.first_name, "Grace");
    }

    #[tokio::test]
    async fn favorites_have_set_semantics_and_skip_deleted_products() {
        let (state, _dir) = test_state();
        let account = registered(&state, "a@x.com").await;

        let products = ProductRepository::new(state.storage());
        let now = Utc::now();
        let product = StoredProduct {
            id: new_document_id(),
            name: "Lamp".to_string(),
            description: String::new(),
            price: 1999,
            category: "home".to_string(),
            brand: String::new(),
            stock: 3,
            image_url: None,
            created_at: now,
            updated_at: now,
        };
        products.create(&product).unwrap();

        for _ in 0..2 {
            let Json(ids) = add_favorite(Auth(account.clone()), State(state.clone()), Path(product.id.clone()))
                .await
                .unwrap();
            assert_eq!(ids, vec![product.id.clone()]);
        }

        let err = add_favorite(Auth(account.clone()), State(state.clone()), Path(new_document_id()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        products.delete(&product.id).unwrap();
        let Json(favorites) = list_favorites(Auth(account.clone()), State(state.clone()))
            .await
            .unwrap();
        assert!(favorites.is_empty());

        let Json(ids) = remove_favorite(Auth(account), State(state), Path(product.id))
            .await
            .unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn admin_can_list_and_delete_accounts() {
        let (state, _dir) = test_state();
        let account = registered(&state, "a@x.com").await;
        let admin = AdminOnly(user("admin_1", Role::Admin));

        let Json(all) = list_users(AdminOnly(user("admin_1", Role::Admin)), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);

        let Json(deleted) = delete_user(admin, State(state.clone()), Path(account.user_id.clone()))
            .await
            .unwrap();
        assert_eq!(deleted.message, "User deleted successfully");

        // The email is free again once the account is gone.
        registered(&state, "a@x.com").await;

        let err = delete_user(
            AdminOnly(user("admin_1", Role::Admin)),
            State(state),
            Path(account.user_id),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "User not found");
    }

    #[test]
    fn account_response_omits_password_hash() {
        let now = Utc::now();
        let account = StoredAccount {
            id: "65f1c0ffee0123456789abcd".to_string(),
            email: "a@x.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "$2b$04$secret".to_string(),
            role: Role::Customer,
            email_verified: false,
            favorite_product_ids: vec![],
            order_ids: vec![],
            reset_token_id: Some("jti".to_string()),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&AccountResponse::from(&account)).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("secret"));
        assert!(!json.contains("reset_token"));
    }
}
