// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::{AccountSettings, DEFAULT_PAYMENT_CURRENCY};
use crate::providers::{payments::SandboxProcessor, ImageHost, Mailer, PaymentGateway};
use crate::realtime::RealtimeHub;
use crate::storage::DocumentStore;

/// Shared handler state. Cloning is cheap; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    storage: Arc<DocumentStore>,
    pub tokens: Arc<TokenService>,
    pub accounts: Arc<AccountSettings>,
    pub payments: Arc<PaymentGateway>,
    /// Currency for every charge, lowercase ISO code
    pub payment_currency: Arc<str>,
    pub mailer: Arc<Mailer>,
    pub images: Arc<ImageHost>,
    pub realtime: RealtimeHub,
}

impl AppState {
    /// State with the sandbox processor, the in-memory outbox and no image
    /// host. `main` replaces these from configuration.
    pub fn new(storage: DocumentStore, tokens: TokenService) -> Self {
        Self {
            storage: Arc::new(storage),
            tokens: Arc::new(tokens),
            accounts: Arc::new(AccountSettings::default()),
            payments: Arc::new(PaymentGateway::Sandbox(SandboxProcessor)),
            payment_currency: Arc::from(DEFAULT_PAYMENT_CURRENCY),
            mailer: Arc::new(Mailer::Outbox(Default::default())),
            images: Arc::new(ImageHost::Disabled),
            realtime: RealtimeHub::new(),
        }
    }

    pub fn with_accounts(mut self, accounts: AccountSettings) -> Self {
        self.accounts = Arc::new(accounts);
        self
    }

    pub fn with_payments(mut self, gateway: PaymentGateway) -> Self {
        self.payments = Arc::new(gateway);
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.payment_currency = Arc::from(currency);
        self
    }

    pub fn with_mailer(mut self, mailer: Mailer) -> Self {
        self.mailer = Arc::new(mailer);
        self
    }

    pub fn with_images(mut self, images: ImageHost) -> Self {
        self.images = Arc::new(images);
        self
    }

    pub fn storage(&self) -> &DocumentStore {
        &self.storage
    }
}
