// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the typed [`AppConfig`] loaded
//! once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATABASE_PATH` | redb database file | `./data/storefront.redb` |
//! | `JWT_SECRET` | HS256 signing secret | Required |
//! | `ACCESS_TOKEN_TTL_SECS` | Access token lifetime | `604800` |
//! | `BCRYPT_COST` | Password hashing cost | `10` |
//! | `CLIENT_URL` | Frontend base URL used in email links | `http://localhost:3000` |
//! | `ADMIN_EMAILS` | Comma-separated emails granted the admin role | empty |
//! | `STRIPE_SECRET_KEY` | Payment processor key (sandbox when unset) | Optional |
//! | `STRIPE_API_BASE_URL` | Payment processor base URL | `https://api.stripe.com` |
//! | `PAYMENT_CURRENCY` | Charge currency | `usd` |
//! | `SMTP_HOST` | SMTP relay (outbox when unset) | Optional |
//! | `SMTP_USERNAME` / `SMTP_PASSWORD` | SMTP credentials | Optional |
//! | `SMTP_FROM` | Sender mailbox | `Storefront <no-reply@localhost>` |
//! | `CLOUDINARY_CLOUD_NAME` / `CLOUDINARY_API_KEY` / `CLOUDINARY_API_SECRET` | Image hosting | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

use url::Url;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const ACCESS_TOKEN_TTL_ENV: &str = "ACCESS_TOKEN_TTL_SECS";
pub const BCRYPT_COST_ENV: &str = "BCRYPT_COST";
pub const CLIENT_URL_ENV: &str = "CLIENT_URL";
pub const ADMIN_EMAILS_ENV: &str = "ADMIN_EMAILS";
pub const STRIPE_SECRET_KEY_ENV: &str = "STRIPE_SECRET_KEY";
pub const STRIPE_API_BASE_URL_ENV: &str = "STRIPE_API_BASE_URL";
pub const PAYMENT_CURRENCY_ENV: &str = "PAYMENT_CURRENCY";
pub const SMTP_HOST_ENV: &str = "SMTP_HOST";
pub const SMTP_USERNAME_ENV: &str = "SMTP_USERNAME";
pub const SMTP_PASSWORD_ENV: &str = "SMTP_PASSWORD";
pub const SMTP_FROM_ENV: &str = "SMTP_FROM";
pub const CLOUDINARY_CLOUD_NAME_ENV: &str = "CLOUDINARY_CLOUD_NAME";
pub const CLOUDINARY_API_KEY_ENV: &str = "CLOUDINARY_API_KEY";
pub const CLOUDINARY_API_SECRET_ENV: &str = "CLOUDINARY_API_SECRET";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_PATH: &str = "./data/storefront.redb";
/// Seven days.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_BCRYPT_COST: u32 = 10;
pub const DEFAULT_CLIENT_URL: &str = "http://localhost:3000";
pub const DEFAULT_STRIPE_API_BASE_URL: &str = "https://api.stripe.com";
pub const DEFAULT_PAYMENT_CURRENCY: &str = "usd";
pub const DEFAULT_SMTP_FROM: &str = "Storefront <no-reply@localhost>";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "" => Ok(LogFormat::Pretty),
            other => Err(ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                reason: format!("expected 'json' or 'pretty', got '{other}'"),
            }),
        }
    }
}

/// Settings for the hosted payment processor.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Account-related settings shared by the user handlers.
#[derive(Debug, Clone)]
pub struct AccountSettings {
    /// Frontend base URL without a trailing slash.
    pub client_url: String,
    pub admin_emails: Vec<String>,
    pub bcrypt_cost: u32,
}

impl AccountSettings {
    /// Whether a normalized email is configured to register as admin.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|admin| admin == email)
    }
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            client_url: DEFAULT_CLIENT_URL.to_string(),
            admin_emails: Vec::new(),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

/// Fully parsed process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub accounts: AccountSettings,
    pub payment_currency: String,
    pub stripe: Option<StripeConfig>,
    pub smtp: Option<SmtpConfig>,
    pub smtp_from: String,
    pub cloudinary: Option<CloudinaryConfig>,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default(HOST_ENV, DEFAULT_HOST);
        let port = env_parse(PORT_ENV, DEFAULT_PORT)?;
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e| ConfigError::Invalid {
                name: HOST_ENV,
                reason: format!("{e}"),
            })?;

        let jwt_secret = env_required(JWT_SECRET_ENV)?;
        let access_token_ttl_secs = env_parse(ACCESS_TOKEN_TTL_ENV, DEFAULT_ACCESS_TOKEN_TTL_SECS)?;
        if access_token_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                name: ACCESS_TOKEN_TTL_ENV,
                reason: "must be positive".to_string(),
            });
        }

        let client_url = env_or_default(CLIENT_URL_ENV, DEFAULT_CLIENT_URL);
        Url::parse(&client_url).map_err(|e| ConfigError::Invalid {
            name: CLIENT_URL_ENV,
            reason: e.to_string(),
        })?;

        let accounts = AccountSettings {
            client_url: client_url.trim_end_matches('/').to_string(),
            admin_emails: parse_admin_emails(env_optional(ADMIN_EMAILS_ENV).as_deref()),
            bcrypt_cost: env_parse(BCRYPT_COST_ENV, DEFAULT_BCRYPT_COST)?,
        };

        let stripe = env_optional(STRIPE_SECRET_KEY_ENV).map(|secret_key| StripeConfig {
            secret_key,
            api_base_url: env_or_default(STRIPE_API_BASE_URL_ENV, DEFAULT_STRIPE_API_BASE_URL),
        });

        let smtp = env_optional(SMTP_HOST_ENV).map(|host| SmtpConfig {
            host,
            username: env_optional(SMTP_USERNAME_ENV),
            password: env_optional(SMTP_PASSWORD_ENV),
        });

        let cloudinary = match (
            env_optional(CLOUDINARY_CLOUD_NAME_ENV),
            env_optional(CLOUDINARY_API_KEY_ENV),
            env_optional(CLOUDINARY_API_SECRET_ENV),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            database_path: PathBuf::from(env_or_default(DATABASE_PATH_ENV, DEFAULT_DATABASE_PATH)),
            jwt_secret,
            access_token_ttl_secs,
            accounts,
            payment_currency: env_or_default(PAYMENT_CURRENCY_ENV, DEFAULT_PAYMENT_CURRENCY)
                .to_ascii_lowercase(),
            stripe,
            smtp,
            smtp_from: env_or_default(SMTP_FROM_ENV, DEFAULT_SMTP_FROM),
            cloudinary,
            log_format: env_or_default(LOG_FORMAT_ENV, "pretty").parse()?,
        })
    }
}

/// Split and normalize the admin email list.
fn parse_admin_emails(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(crate::auth::normalize_email)
        .filter(|email| !email.is_empty())
        .collect()
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    env_optional(name).ok_or(ConfigError::Missing(name))
}

fn env_optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_optional(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
