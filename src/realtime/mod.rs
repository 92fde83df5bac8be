// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Real-time relays over WebSocket.

pub mod registry;
pub mod relay;

pub use registry::{ConnectionId, ConnectionRegistry, Peer};

use tracing::info;

/// The two independent relays served by this process.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    pub chat: ConnectionRegistry,
    pub signaling: ConnectionRegistry,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close every open connection on both relays.
    pub async fn shutdown(&self) {
        let chat = self.chat.close_all().await;
        let signaling = self.signaling.close_all().await;
        info!(chat, signaling, "Realtime connections closed");
    }
}
