//! Connection tracking for the scoreboard server
//!
//! This module handles the server-side bookkeeping for connected clients:
//! - Connection lifecycle (accept, disconnect)
//! - Capacity enforcement
//! - Per-connection outbound queues used for event delivery
//!
//! Each connection's queue is drained by its own writer task, so events for
//! one connection are delivered first-in-first-out.

use crate::channels::{ConnectionId, Outbox};
use log::{info, warn};
use shared::ServerEvent;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Outbound queue feeding one connection's writer task
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// A connected display or controller
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// Last time we received any event from this client
    pub last_seen: Instant,
    /// Number of events received from this client
    pub events_received: u64,
    sender: EventSender,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: EventSender) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            events_received: 0,
            sender,
        }
    }

    /// Records activity from this client
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
        self.events_received += 1;
    }

    /// Queues an event; fails only if the writer task has gone away
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Manages all connected clients
///
/// Connection ids start from 1 and are never reused within a process.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<ConnectionId, Client>,
    /// Next available id for new connections
    next_client_id: ConnectionId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to register a new connection
    ///
    /// Returns `None` if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, sender: EventSender) -> Option<ConnectionId> {
        if self.clients.len() >= self.max_clients {
            warn!("Rejecting connection from {}: server full", addr);
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        Some(client_id)
    }

    /// Removes a client, returning false if it was already gone
    pub fn remove_client(&mut self, client_id: &ConnectionId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} disconnected after {} events",
                client.id, client.events_received
            );
            true
        } else {
            false
        }
    }

    pub fn touch(&mut self, client_id: ConnectionId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Outbox for ClientManager {
    fn deliver(&self, connection: ConnectionId, event: ServerEvent) {
        match self.clients.get(&connection) {
            Some(client) => {
                if !client.send(event) {
                    warn!("Dropped event for client {}: writer closed", connection);
                }
            }
            None => warn!("Dropped event for unknown client {}", connection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn pong() -> ServerEvent {
        ServerEvent::Pong { nonce: Some(1) }
    }

    #[test]
    fn test_client_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = Client::new(1, test_addr(), tx);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, test_addr());
        assert_eq!(client.events_received, 0);
    }

    #[test]
    fn test_client_touch_counts_events() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut client = Client::new(1, test_addr(), tx);
        let before = client.last_seen;

        client.touch();
        client.touch();

        assert_eq!(client.events_received, 2);
        assert!(client.last_seen >= before);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = mpsc::unbounded_channel();

        assert_eq!(manager.add_client(test_addr(), tx.clone()), Some(1));
        assert_eq!(manager.add_client(test_addr2(), tx), Some(2));
        assert_eq!(manager.len(), 2);
        assert!(!manager.is_empty());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(manager.add_client(test_addr(), tx.clone()).is_some());
        assert!(manager.add_client(test_addr2(), tx).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_not_reused() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = manager.add_client(test_addr(), tx.clone()).unwrap();
        assert!(manager.remove_client(&first));
        assert!(!manager.remove_client(&first));

        let second = manager.add_client(test_addr(), tx).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_deliver_is_fifo_per_client() {
        let mut manager = ClientManager::new(2);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        for nonce in 1..=3 {
            manager.deliver(id, ServerEvent::Pong { nonce: Some(nonce) });
        }

        for nonce in 1..=3 {
            assert_eq!(rx.try_recv().unwrap(), ServerEvent::Pong { nonce: Some(nonce) });
        }
    }

    #[test]
    fn test_deliver_to_closed_writer_does_not_panic() {
        let mut manager = ClientManager::new(2);
        let (tx, rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();
        drop(rx);

        manager.deliver(id, pong());
        manager.deliver(999, pong());
        assert_eq!(manager.len(), 1);
    }
}
