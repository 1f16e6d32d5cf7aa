//! Game channels ("rooms") and scoped broadcast
//!
//! A connection belongs to at most one game channel at a time; joining a new
//! game moves it out of the previous one. Delivery itself goes through an
//! [`Outbox`], so the router knows nothing about sockets.

use log::{debug, info};
use shared::ServerEvent;
use std::collections::{BTreeSet, HashMap};

pub type ConnectionId = u32;

/// Delivers events to individual connections
pub trait Outbox {
    fn deliver(&self, connection: ConnectionId, event: ServerEvent);
}

#[derive(Debug, Default)]
pub struct ChannelRouter {
    channels: HashMap<String, BTreeSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, String>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `connection` to the channel for `gid`
    ///
    /// Returns the game the connection was previously subscribed to, if it
    /// had to leave one.
    pub fn join(&mut self, connection: ConnectionId, gid: &str) -> Option<String> {
        let previous = match self.memberships.get(&connection) {
            Some(current) if current == gid => return None,
            Some(current) => Some(current.clone()),
            None => None,
        };

        if let Some(previous) = &previous {
            self.leave(connection, previous);
        }

        self.channels
            .entry(gid.to_string())
            .or_default()
            .insert(connection);
        self.memberships.insert(connection, gid.to_string());
        info!("Connection {} joined game {}", connection, gid);

        previous
    }

    pub fn leave(&mut self, connection: ConnectionId, gid: &str) -> bool {
        let removed = match self.channels.get_mut(gid) {
            Some(members) => {
                let removed = members.remove(&connection);
                if members.is_empty() {
                    self.channels.remove(gid);
                }
                removed
            }
            None => false,
        };

        if self.memberships.get(&connection).map(String::as_str) == Some(gid) {
            self.memberships.remove(&connection);
        }
        if removed {
            debug!("Connection {} left game {}", connection, gid);
        }
        removed
    }

    /// Drops a connection from whatever channel it is in
    pub fn leave_all(&mut self, connection: ConnectionId) -> Option<String> {
        let gid = self.memberships.get(&connection).cloned()?;
        self.leave(connection, &gid);
        Some(gid)
    }

    /// Empties a channel, returning its former members
    pub fn close(&mut self, gid: &str) -> Vec<ConnectionId> {
        let members: Vec<ConnectionId> = self
            .channels
            .remove(gid)
            .map(|members| members.into_iter().collect())
            .unwrap_or_default();
        for connection in &members {
            self.memberships.remove(connection);
        }
        members
    }

    pub fn channel_of(&self, connection: ConnectionId) -> Option<&str> {
        self.memberships.get(&connection).map(String::as_str)
    }

    /// Members of a channel in ascending connection order
    pub fn members(&self, gid: &str) -> Vec<ConnectionId> {
        self.channels
            .get(gid)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn channels(&self) -> Vec<String> {
        let mut gids: Vec<String> = self.channels.keys().cloned().collect();
        gids.sort();
        gids
    }

    /// Sends `event` to every member of the channel except `excluding`
    ///
    /// Returns the number of connections the event was handed to.
    pub fn broadcast(
        &self,
        gid: &str,
        event: &ServerEvent,
        excluding: Option<ConnectionId>,
        outbox: &impl Outbox,
    ) -> usize {
        let mut delivered = 0;
        if let Some(members) = self.channels.get(gid) {
            for &connection in members {
                if Some(connection) == excluding {
                    continue;
                }
                outbox.deliver(connection, event.clone());
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Outbox that records deliveries in order
    #[derive(Default)]
    pub(crate) struct RecordingOutbox {
        pub sent: RefCell<Vec<(ConnectionId, ServerEvent)>>,
    }

    impl RecordingOutbox {
        pub fn events_for(&self, connection: ConnectionId) -> Vec<ServerEvent> {
            self.sent
                .borrow()
                .iter()
                .filter(|(to, _)| *to == connection)
                .map(|(_, event)| event.clone())
                .collect()
        }

        pub fn clear(&self) {
            self.sent.borrow_mut().clear();
        }
    }

    impl Outbox for RecordingOutbox {
        fn deliver(&self, connection: ConnectionId, event: ServerEvent) {
            self.sent.borrow_mut().push((connection, event));
        }
    }

    fn deleted(gid: &str) -> ServerEvent {
        ServerEvent::GameDeleted {
            gid: gid.to_string(),
        }
    }

    #[test]
    fn test_join_and_members() {
        let mut router = ChannelRouter::new();
        assert_eq!(router.join(2, "g1"), None);
        assert_eq!(router.join(1, "g1"), None);

        assert_eq!(router.members("g1"), vec![1, 2]);
        assert_eq!(router.channel_of(1), Some("g1"));
        assert!(router.members("g2").is_empty());
    }

    #[test]
    fn test_join_supersedes_previous_channel() {
        let mut router = ChannelRouter::new();
        router.join(1, "g1");
        assert_eq!(router.join(1, "g2"), Some("g1".to_string()));

        assert!(router.members("g1").is_empty());
        assert_eq!(router.members("g2"), vec![1]);
        assert_eq!(router.channels(), vec!["g2"]);
    }

    #[test]
    fn test_rejoin_same_channel_is_noop() {
        let mut router = ChannelRouter::new();
        router.join(1, "g1");
        assert_eq!(router.join(1, "g1"), None);
        assert_eq!(router.members("g1"), vec![1]);
    }

    #[test]
    fn test_leave() {
        let mut router = ChannelRouter::new();
        router.join(1, "g1");
        router.join(2, "g1");

        assert!(router.leave(1, "g1"));
        assert!(!router.leave(1, "g1"));
        assert_eq!(router.channel_of(1), None);
        assert_eq!(router.members("g1"), vec![2]);

        assert_eq!(router.leave_all(2), Some("g1".to_string()));
        assert_eq!(router.leave_all(2), None);
        assert!(router.channels().is_empty());
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let mut router = ChannelRouter::new();
        let outbox = RecordingOutbox::default();
        router.join(1, "g1");
        router.join(2, "g1");
        router.join(3, "g1");
        router.join(4, "other");

        let delivered = router.broadcast("g1", &deleted("g1"), Some(2), &outbox);

        assert_eq!(delivered, 2);
        assert_eq!(outbox.events_for(1), vec![deleted("g1")]);
        assert!(outbox.events_for(2).is_empty());
        assert_eq!(outbox.events_for(3), vec![deleted("g1")]);
        assert!(outbox.events_for(4).is_empty());
    }

    #[test]
    fn test_broadcast_to_empty_channel() {
        let router = ChannelRouter::new();
        let outbox = RecordingOutbox::default();
        assert_eq!(router.broadcast("nobody", &deleted("nobody"), None, &outbox), 0);
        assert!(outbox.sent.borrow().is_empty());
    }

    #[test]
    fn test_close_channel() {
        let mut router = ChannelRouter::new();
        router.join(1, "g1");
        router.join(2, "g1");

        assert_eq!(router.close("g1"), vec![1, 2]);
        assert_eq!(router.channel_of(1), None);
        assert!(router.close("g1").is_empty());
    }
}
