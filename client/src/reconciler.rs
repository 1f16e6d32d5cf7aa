//! Client-side view of one game, kept in step with the server
//!
//! The reconciler holds the last state the server confirmed together with
//! the local edits still waiting for an `ack`. What the user sees is the
//! confirmed state with those edits laid on top.
//!
//! The server handles one event at a time and every connection is FIFO, so
//! broadcasts and acks reach us in the order the server applied them. Each
//! one must therefore carry exactly the next revision; anything else means a
//! message was missed and the reconciler asks for a fresh copy.

use log::{debug, info, warn};
use shared::{merge, ClientEvent, GameState, PartialState, ServerEvent, SyncError};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Disconnected,
    Connecting,
    AwaitingFullState,
    Synced,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SyncStatus::Disconnected => "disconnected",
            SyncStatus::Connecting => "connecting",
            SyncStatus::AwaitingFullState => "waiting for state",
            SyncStatus::Synced => "synced",
        };
        f.write_str(text)
    }
}

/// A local edit sent to the server but not yet acknowledged
#[derive(Debug, Clone, PartialEq)]
pub enum PendingEdit {
    Replace(GameState),
    Patch(PartialState),
}

impl PendingEdit {
    fn apply(&self, state: &GameState) -> Result<GameState, SyncError> {
        match self {
            PendingEdit::Replace(replacement) => Ok(replacement.clone()),
            PendingEdit::Patch(patch) => merge(state, patch),
        }
    }
}

/// What the network layer should do after an event was handled
#[derive(Debug, Default, PartialEq)]
pub struct Reaction {
    /// Events to send to the server, in order
    pub send: Vec<ClientEvent>,
    /// The visible state changed and should be redrawn
    pub changed: bool,
}

impl Reaction {
    fn none() -> Self {
        Self::default()
    }

    fn changed() -> Self {
        Self {
            send: Vec::new(),
            changed: true,
        }
    }
}

pub struct Reconciler {
    gid: String,
    status: SyncStatus,
    confirmed: Option<GameState>,
    revision: u64,
    pending: VecDeque<PendingEdit>,
    view: Option<GameState>,
    resyncs: u64,
}

impl Reconciler {
    pub fn new(gid: impl Into<String>) -> Self {
        Self {
            gid: gid.into(),
            status: SyncStatus::Disconnected,
            confirmed: None,
            revision: 0,
            pending: VecDeque::new(),
            view: None,
            resyncs: 0,
        }
    }

    pub fn gid(&self) -> &str {
        &self.gid
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn is_synced(&self) -> bool {
        self.status == SyncStatus::Synced
    }

    /// Revision of the confirmed state
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn confirmed(&self) -> Option<&GameState> {
        self.confirmed.as_ref()
    }

    /// Confirmed state with pending edits applied
    ///
    /// Only meaningful while synced; after a disconnect this is the last
    /// state seen and may be stale.
    pub fn view(&self) -> Option<&GameState> {
        self.view.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of times a missed message forced a fresh full state
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    pub fn on_connecting(&mut self) {
        self.status = SyncStatus::Connecting;
    }

    /// Transport is up; returns the handshake request
    pub fn on_connected(&mut self) -> ClientEvent {
        self.request_full_state()
    }

    pub fn on_disconnected(&mut self) {
        if self.status != SyncStatus::Disconnected {
            info!("Lost connection while {}", self.status);
        }
        self.status = SyncStatus::Disconnected;
        self.pending.clear();
    }

    /// Drops pending edits and asks the server for the whole document
    pub fn request_full_state(&mut self) -> ClientEvent {
        self.pending.clear();
        self.status = SyncStatus::AwaitingFullState;
        ClientEvent::GetFullState {
            gid: self.gid.clone(),
        }
    }

    /// Applies a local patch immediately and returns the event to send
    ///
    /// The patch is checked against the current view first, so an edit the
    /// server would reject never reaches the wire.
    pub fn edit(&mut self, patch: PartialState) -> Result<ClientEvent, SyncError> {
        let view = self.require_view()?;
        let next = merge(view, &patch)?;
        let event = ClientEvent::partial_state(&self.gid, &patch);

        self.pending.push_back(PendingEdit::Patch(patch));
        self.view = Some(next);
        Ok(event)
    }

    /// Sends the current view as a whole-document replace
    pub fn push(&mut self) -> Result<ClientEvent, SyncError> {
        let view = self.require_view()?.clone();
        let event = ClientEvent::full_state(&self.gid, &view)?;
        self.pending.push_back(PendingEdit::Replace(view));
        Ok(event)
    }

    fn require_view(&self) -> Result<&GameState, SyncError> {
        match (&self.status, &self.view) {
            (SyncStatus::Synced, Some(view)) => Ok(view),
            _ => Err(SyncError::invalid_request(format!(
                "game {} is not synced ({})",
                self.gid, self.status
            ))),
        }
    }

    pub fn handle(&mut self, event: ServerEvent) -> Reaction {
        if let Some(gid) = event.gid() {
            if gid != self.gid {
                debug!("Ignoring event for inactive game {}", gid);
                return Reaction::none();
            }
        }

        match event {
            ServerEvent::FullState {
                revision, state, ..
            } => {
                if self.status == SyncStatus::Disconnected {
                    return Reaction::none();
                }
                if !self.pending.is_empty() {
                    debug!("Full state discards {} pending edits", self.pending.len());
                }
                self.pending.clear();
                self.revision = revision;
                self.view = Some(state.clone());
                self.confirmed = Some(state);
                if self.status != SyncStatus::Synced {
                    info!("Game {} synced at revision {}", self.gid, revision);
                }
                self.status = SyncStatus::Synced;
                Reaction::changed()
            }

            ServerEvent::PartialState {
                revision, patch, ..
            } => {
                if !self.is_synced() {
                    return Reaction::none();
                }
                if revision != self.revision + 1 {
                    return self.resync(revision);
                }
                let Some(confirmed) = &self.confirmed else {
                    return self.resync(revision);
                };
                match merge(confirmed, &patch) {
                    Ok(next) => {
                        self.confirmed = Some(next);
                        self.revision = revision;
                        self.rebuild_view(revision)
                    }
                    Err(e) => {
                        warn!("Remote patch did not apply: {}", e);
                        self.resync(revision)
                    }
                }
            }

            ServerEvent::Ack { revision, .. } => {
                if !self.is_synced() {
                    return Reaction::none();
                }
                let Some(edit) = self.pending.pop_front() else {
                    return self.resync(revision);
                };
                if revision != self.revision + 1 {
                    return self.resync(revision);
                }
                let Some(confirmed) = &self.confirmed else {
                    return self.resync(revision);
                };
                match edit.apply(confirmed) {
                    Ok(next) => {
                        self.confirmed = Some(next);
                        self.revision = revision;
                        Reaction::none()
                    }
                    Err(_) => self.resync(revision),
                }
            }

            ServerEvent::Heartbeat { revision, .. } => {
                if self.is_synced() && self.pending.is_empty() && revision != self.revision {
                    return self.resync(revision);
                }
                Reaction::none()
            }

            ServerEvent::GameDeleted { gid } => {
                info!("Game {} was deleted; requesting a fresh copy", gid);
                Reaction {
                    send: vec![self.request_full_state()],
                    changed: false,
                }
            }

            ServerEvent::Error { who, details } => {
                if self.is_synced() && !self.pending.is_empty() {
                    warn!("Edit rejected ({}): {}", who, details);
                    return self.resync(self.revision);
                }
                Reaction::none()
            }

            ServerEvent::Ping { nonce } => Reaction {
                send: vec![ClientEvent::Pong { nonce }],
                changed: false,
            },

            ServerEvent::NewGid { .. }
            | ServerEvent::Custom { .. }
            | ServerEvent::Sports { .. }
            | ServerEvent::Pong { .. } => Reaction::none(),
        }
    }

    /// Recomputes the view after the confirmed state moved
    fn rebuild_view(&mut self, revision: u64) -> Reaction {
        let Some(confirmed) = &self.confirmed else {
            return self.resync(revision);
        };

        let rebuilt = self
            .pending
            .iter()
            .try_fold(confirmed.clone(), |view, edit| edit.apply(&view));
        match rebuilt {
            Ok(view) => {
                self.view = Some(view);
                Reaction::changed()
            }
            Err(_) => self.resync(revision),
        }
    }

    fn resync(&mut self, received: u64) -> Reaction {
        let err = SyncError::Desync {
            gid: self.gid.clone(),
            expected: self.revision + 1,
            received,
        };
        warn!("{}; requesting full state", err);
        self.resyncs += 1;

        Reaction {
            send: vec![self.request_full_state()],
            changed: false,
        }
    }
}
