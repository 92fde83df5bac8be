// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registry of open WebSocket connections.
//!
//! Each connection is represented by a bounded channel; the socket task owns
//! the receiving end and writes whatever arrives to the client. A peer whose
//! queue fills up is dropped, which ends its socket task. The registry never
//! touches sockets directly.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

pub type ConnectionId = u64;

/// Frames buffered per connection before it counts as stalled.
pub const OUTBOUND_QUEUE: usize = 64;

/// View of a registered connection handed to broadcast predicates.
#[derive(Debug, Clone, Copy)]
pub struct Peer<'a> {
    pub id: ConnectionId,
    pub label: &'a str,
}

struct Connection {
    label: String,
    sender: mpsc::Sender<Message>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

/// Shared set of open connections for one relay.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection and return its id and outbound queue.
    pub async fn register(&self, label: impl Into<String>) -> (ConnectionId, mpsc::Receiver<Message>) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::channel(OUTBOUND_QUEUE);
        let label = label.into();

        let mut connections = self.inner.connections.write().await;
        connections.insert(id, Connection { label, sender });
        debug!(connection_id = id, open = connections.len(), "Connection registered");

        (id, receiver)
    }

    /// Remove a connection. Returns whether it was registered.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.inner.connections.write().await;
        let removed = connections.remove(&id).is_some();
        if removed {
            debug!(connection_id = id, open = connections.len(), "Connection unregistered");
        }
        removed
    }

    /// Queue `payload` for every connection matching `predicate`.
    ///
    /// Connections whose receiver is gone or whose queue is full are dropped.
    /// Returns the number of connections the payload was queued for.
    pub async fn broadcast<F>(&self, predicate: F, payload: Message) -> usize
    where
        F: Fn(&Peer<'_>) -> bool,
    {
        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let connections = self.inner.connections.read().await;
            for (id, connection) in connections.iter() {
                let peer = Peer {
                    id: *id,
                    label: &connection.label,
                };
                if !predicate(&peer) {
                    continue;
                }
                match connection.sender.try_send(payload.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(connection_id = *id, "Outbound queue full, dropping connection");
                        dead.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }

        if !dead.is_empty() {
            let mut connections = self.inner.connections.write().await;
            for id in dead {
                connections.remove(&id);
            }
        }
        delivered
    }

    pub async fn len(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Send a close frame to every connection and forget them all.
    pub async fn close_all(&self) -> usize {
        let mut connections = self.inner.connections.write().await;
        let count = connections.len();
        for (_, connection) in connections.drain() {
            let _ = connection.sender.try_send(Message::Close(None));
        }
        count
    }
}
