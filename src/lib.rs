// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storefront Server - e-commerce backend
//!
//! REST endpoints for accounts, products, orders and payments, plus a
//! WebSocket chat relay and a WebRTC signaling relay.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token Service, password hashing, request extractors
//! - `linkage` - charging a payment and attaching it to its order
//! - `providers` - payment processor, mailer, image host
//! - `realtime` - WebSocket relays and their connection registries
//! - `storage` - redb document store and repositories

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod linkage;
pub mod providers;
pub mod realtime;
pub mod state;
pub mod storage;
