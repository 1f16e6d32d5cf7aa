//! Per-event protocol handling
//!
//! The gateway validates each inbound event, applies it to the repository,
//! and decides who hears about it. It runs on the server's single dispatch
//! loop, so every event is handled to completion before the next one starts.
//! Failures are reported to the originating connection only.

use crate::channels::{ChannelRouter, ConnectionId, Outbox};
use crate::repository::{MemoryStore, StateRepository, StateStore};
use log::{debug, info, warn};
use shared::{ClientEvent, PartialState, ServerEvent, SyncError};

pub struct SessionGateway<S: StateStore = MemoryStore> {
    repository: StateRepository<S>,
    router: ChannelRouter,
}

impl<S: StateStore> SessionGateway<S> {
    pub fn new(repository: StateRepository<S>) -> Self {
        Self {
            repository,
            router: ChannelRouter::new(),
        }
    }

    pub fn repository(&self) -> &StateRepository<S> {
        &self.repository
    }

    pub fn router(&self) -> &ChannelRouter {
        &self.router
    }

    /// Handles one event from `connection`, reporting failures back to it
    pub fn handle(&mut self, connection: ConnectionId, event: ClientEvent, outbox: &impl Outbox) {
        let name = event.name();
        debug!("Client {} sent {}", connection, name);

        if let Err(err) = self.dispatch(connection, event, outbox) {
            warn!("Rejected {} from client {}: {}", name, connection, err);
            outbox.deliver(connection, ServerEvent::error(&err));
        }
    }

    /// Forgets a closed connection
    pub fn disconnect(&mut self, connection: ConnectionId) {
        if let Some(gid) = self.router.leave_all(connection) {
            debug!("Client {} removed from game {}", connection, gid);
        }
    }

    /// Tells every channel the current revision of its game
    ///
    /// Clients compare this against what they hold to notice missed updates.
    pub fn heartbeat(&self, outbox: &impl Outbox) -> usize {
        let mut sent = 0;
        for gid in self.router.channels() {
            let Some(revision) = self.repository.revision(&gid) else {
                continue;
            };
            let event = ServerEvent::Heartbeat {
                gid: gid.clone(),
                revision,
            };
            sent += self.router.broadcast(&gid, &event, None, outbox);
        }
        sent
    }

    fn dispatch(
        &mut self,
        connection: ConnectionId,
        event: ClientEvent,
        outbox: &impl Outbox,
    ) -> Result<(), SyncError> {
        match event {
            ClientEvent::GetFullState { gid } => {
                require_gid(&gid)?;
                self.router.join(connection, &gid);
                let game = self.repository.get_or_create(&gid)?;
                outbox.deliver(
                    connection,
                    ServerEvent::FullState {
                        gid,
                        revision: game.revision,
                        state: game.state.clone(),
                    },
                );
            }

            ClientEvent::FullState { gid, state } => {
                require_gid(&gid)?;
                if state.is_none() {
                    return Err(SyncError::invalid_request("missing state"));
                }
                let revision = self.repository.replace(&gid, state)?;
                let state = self.repository.get_or_create(&gid)?.state.clone();
                info!("Client {} replaced game {} (revision {})", connection, gid, revision);

                let event = ServerEvent::FullState {
                    gid: gid.clone(),
                    revision,
                    state,
                };
                self.router.broadcast(&gid, &event, Some(connection), outbox);
                outbox.deliver(connection, ServerEvent::Ack { gid, revision });
            }

            ClientEvent::PartialState { gid, patch } => {
                require_gid(&gid)?;
                let patch = match patch {
                    Some(value) => PartialState::from_value(value)?,
                    None => return Err(SyncError::invalid_request("missing patch")),
                };
                let revision = self.repository.apply_partial(&gid, Some(&patch))?.revision;
                debug!("Client {} patched game {}: {:?}", connection, gid, patch);

                let event = ServerEvent::PartialState {
                    gid: gid.clone(),
                    revision,
                    patch,
                };
                self.router.broadcast(&gid, &event, Some(connection), outbox);
                outbox.deliver(connection, ServerEvent::Ack { gid, revision });
            }

            ClientEvent::New { gid } => {
                require_gid(&gid)?;
                self.router.join(connection, &gid);
                let game = self.repository.reset(&gid)?;
                let full = ServerEvent::FullState {
                    gid: gid.clone(),
                    revision: game.revision,
                    state: game.state.clone(),
                };
                info!("Client {} reset game {}", connection, gid);

                let announce = ServerEvent::NewGid { gid: gid.clone() };
                self.router.broadcast(&gid, &announce, None, outbox);
                self.router.broadcast(&gid, &full, None, outbox);
            }

            ClientEvent::CreateGame { gid, sport } => {
                require_gid(&gid)?;
                if sport.trim().is_empty() {
                    return Err(SyncError::invalid_request("missing sport"));
                }
                let game = self.repository.create(&gid, &sport)?;
                let full = ServerEvent::FullState {
                    gid: gid.clone(),
                    revision: game.revision,
                    state: game.state.clone(),
                };
                self.router.join(connection, &gid);
                self.router.broadcast(&gid, &full, None, outbox);
            }

            ClientEvent::DeleteGame { gid } => {
                require_gid(&gid)?;
                self.repository.delete(&gid)?;
                let event = ServerEvent::GameDeleted { gid: gid.clone() };
                self.router.broadcast(&gid, &event, Some(connection), outbox);
                let members = self.router.close(&gid);
                debug!("Closed channel {} ({} members)", gid, members.len());
            }

            ClientEvent::CustomEvent { gid, name, data } => {
                require_gid(&gid)?;
                if name.trim().is_empty() {
                    return Err(SyncError::invalid_request("missing event name"));
                }
                let event = ServerEvent::Custom {
                    gid: gid.clone(),
                    name,
                    data,
                };
                self.router.broadcast(&gid, &event, Some(connection), outbox);
            }

            ClientEvent::ListSports => {
                outbox.deliver(
                    connection,
                    ServerEvent::Sports {
                        sports: self.repository.sports().sports(),
                    },
                );
            }

            ClientEvent::Ping { nonce } => {
                outbox.deliver(connection, ServerEvent::Pong { nonce });
            }

            ClientEvent::Pong { nonce } => {
                debug!("Client {} answered ping {:?}", connection, nonce);
            }
        }

        Ok(())
    }
}

fn require_gid(gid: &str) -> Result<(), SyncError> {
    if gid.trim().is_empty() {
        return Err(SyncError::invalid_request("missing game identifier"));
    }
    Ok(())
}
