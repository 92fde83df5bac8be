// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use storefront_server::{
    api::router,
    auth::TokenService,
    config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER},
    providers::{ImageHost, Mailer, PaymentGateway},
    state::AppState,
    storage::DocumentStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.log_format);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server terminated with an error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let storage = DocumentStore::open(&config.database_path)?;
    info!(path = %config.database_path.display(), "Document store opened");

    let tokens = TokenService::new(
        config.jwt_secret.as_bytes(),
        chrono::Duration::seconds(config.access_token_ttl_secs),
    );
    let payments = PaymentGateway::from_config(config.stripe.as_ref())?;
    let mailer = Mailer::from_config(config.smtp.as_ref(), &config.smtp_from)?;
    let images = ImageHost::from_config(config.cloudinary.as_ref())?;

    if config.stripe.is_none() {
        warn!("STRIPE_SECRET_KEY not set; charges go to the sandbox processor");
    }
    info!(
        payments = payments.mode(),
        mailer = mailer.mode(),
        images = images.mode(),
        currency = %config.payment_currency,
        "Providers configured"
    );

    let state = AppState::new(storage, tokens)
        .with_accounts(config.accounts.clone())
        .with_payments(payments)
        .with_currency(&config.payment_currency)
        .with_mailer(mailer)
        .with_images(images);
    let realtime = state.realtime.clone();
    let app = router(state);

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Storefront server listening (docs at /docs)");

    let server_shutdown = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        server_shutdown.cancelled().await;
    });

    // Open upgrades hold graceful shutdown until the relays close them.
    let relay_shutdown = shutdown.clone();
    tokio::spawn(async move {
        relay_shutdown.cancelled().await;
        realtime.shutdown().await;
    });

    server.await?;
    info!("Server stopped");
    Ok(())
}

async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
