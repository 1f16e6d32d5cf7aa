//! Authoritative store of game states
//!
//! The repository owns one [`StoredGame`] per game identifier. Games are
//! created lazily from the sport registry the first time they are referenced,
//! mutated by replacement or merge, and live only as long as the backing
//! store does. Every accepted mutation bumps the game's revision so clients
//! can notice a missed update.

use crate::sports::SportRegistry;
use log::{debug, info};
use serde_json::Value;
use shared::{merge, GameState, PartialState, SyncError};
use std::collections::HashMap;

/// A game's current state plus the bookkeeping the server needs
#[derive(Debug, Clone, PartialEq)]
pub struct StoredGame {
    pub sport: String,
    pub revision: u64,
    pub state: GameState,
}

/// Backing storage for the repository
///
/// The in-memory [`MemoryStore`] is the only implementation today; a
/// persistent store can be swapped in without touching the protocol code.
pub trait StateStore {
    fn get(&self, gid: &str) -> Option<&StoredGame>;
    fn put(&mut self, gid: &str, game: StoredGame);
    fn remove(&mut self, gid: &str) -> Option<StoredGame>;
    fn game_ids(&self) -> Vec<String>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    games: HashMap<String, StoredGame>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, gid: &str) -> Option<&StoredGame> {
        self.games.get(gid)
    }

    fn put(&mut self, gid: &str, game: StoredGame) {
        self.games.insert(gid.to_string(), game);
    }

    fn remove(&mut self, gid: &str) -> Option<StoredGame> {
        self.games.remove(gid)
    }

    fn game_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.games.keys().cloned().collect();
        ids.sort();
        ids
    }
}

pub struct StateRepository<S: StateStore = MemoryStore> {
    store: S,
    sports: SportRegistry,
}

impl StateRepository<MemoryStore> {
    pub fn in_memory(sports: SportRegistry) -> Self {
        Self::new(MemoryStore::new(), sports)
    }
}

impl<S: StateStore> StateRepository<S> {
    pub fn new(store: S, sports: SportRegistry) -> Self {
        Self { store, sports }
    }

    pub fn sports(&self) -> &SportRegistry {
        &self.sports
    }

    pub fn contains(&self, gid: &str) -> bool {
        self.store.get(gid).is_some()
    }

    pub fn game_ids(&self) -> Vec<String> {
        self.store.game_ids()
    }

    pub fn revision(&self, gid: &str) -> Option<u64> {
        self.store.get(gid).map(|game| game.revision)
    }

    /// Returns the stored game, creating it from the default sport if absent
    pub fn get_or_create(&mut self, gid: &str) -> Result<&StoredGame, SyncError> {
        validate_gid(gid)?;
        if self.store.get(gid).is_none() {
            let sport = self.sports.default_sport().to_string();
            let state = self.sports.create(&sport)?;
            info!("Created {} game {} from defaults", sport, gid);
            self.store.put(
                gid,
                StoredGame {
                    sport,
                    revision: 0,
                    state,
                },
            );
        }
        self.store.get(gid).ok_or_else(|| SyncError::UnknownGame {
            gid: gid.to_string(),
        })
    }

    /// Creates a game of a specific sport; fails if the game already exists
    pub fn create(&mut self, gid: &str, sport: &str) -> Result<&StoredGame, SyncError> {
        validate_gid(gid)?;
        if self.contains(gid) {
            return Err(SyncError::GameExists {
                gid: gid.to_string(),
            });
        }
        let state = self.sports.create(sport)?;
        info!("Created {} game {}", sport, gid);
        self.store.put(
            gid,
            StoredGame {
                sport: sport.to_string(),
                revision: 0,
                state,
            },
        );
        self.store.get(gid).ok_or_else(|| SyncError::UnknownGame {
            gid: gid.to_string(),
        })
    }

    /// Overwrites the stored state with a complete document
    ///
    /// The document is validated first; a malformed one leaves the stored
    /// state untouched. Returns the new revision.
    pub fn replace(&mut self, gid: &str, state: Option<Value>) -> Result<u64, SyncError> {
        validate_gid(gid)?;
        let state = state.ok_or_else(|| SyncError::InvalidUpdate {
            details: "missing state".to_string(),
        })?;
        let state = GameState::from_value(state)?;

        let mut game = self.get_or_create(gid)?.clone();
        game.state = state;
        game.revision += 1;
        let revision = game.revision;
        self.store.put(gid, game);

        debug!("Replaced state of game {} (revision {})", gid, revision);
        Ok(revision)
    }

    /// Merges a patch into the stored state and returns the stored result
    pub fn apply_partial(
        &mut self,
        gid: &str,
        patch: Option<&PartialState>,
    ) -> Result<&StoredGame, SyncError> {
        validate_gid(gid)?;
        let patch = patch.ok_or_else(|| SyncError::InvalidUpdate {
            details: "missing patch".to_string(),
        })?;

        let mut game = self.get_or_create(gid)?.clone();
        game.state = merge(&game.state, patch)?;
        game.revision += 1;
        debug!("Merged patch into game {} (revision {})", gid, game.revision);
        self.store.put(gid, game);

        self.store.get(gid).ok_or_else(|| SyncError::UnknownGame {
            gid: gid.to_string(),
        })
    }

    /// Replaces the game with a fresh default for its sport
    pub fn reset(&mut self, gid: &str) -> Result<&StoredGame, SyncError> {
        validate_gid(gid)?;
        let (sport, revision) = match self.store.get(gid) {
            Some(game) => (game.sport.clone(), game.revision + 1),
            None => (self.sports.default_sport().to_string(), 0),
        };
        let state = self.sports.create(&sport)?;
        info!("Reset game {} to {} defaults", gid, sport);
        self.store.put(
            gid,
            StoredGame {
                sport,
                revision,
                state,
            },
        );
        self.store.get(gid).ok_or_else(|| SyncError::UnknownGame {
            gid: gid.to_string(),
        })
    }

    pub fn delete(&mut self, gid: &str) -> Result<StoredGame, SyncError> {
        validate_gid(gid)?;
        let game = self.store.remove(gid).ok_or_else(|| SyncError::UnknownGame {
            gid: gid.to_string(),
        })?;
        info!("Deleted game {}", gid);
        Ok(game)
    }
}

fn validate_gid(gid: &str) -> Result<(), SyncError> {
    if gid.trim().is_empty() {
        return Err(SyncError::invalid_request("missing game identifier"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn repository() -> StateRepository {
        StateRepository::in_memory(SportRegistry::with_builtin())
    }

    fn patch(value: Value) -> PartialState {
        PartialState::from_value(value).unwrap()
    }

    #[test]
    fn test_get_or_create_uses_default_sport() {
        let mut repo = repository();
        assert!(!repo.contains("default"));

        let game = repo.get_or_create("default").unwrap();
        assert_eq!(game.sport, "hockey");
        assert_eq!(game.revision, 0);
        assert_eq!(game.state.home.score, 0);
        assert_eq!(game.state.away.score, 0);
        assert!(repo.contains("default"));
    }

    #[test]
    fn test_get_or_create_keeps_existing() {
        let mut repo = repository();
        assert_ok!(repo.apply_partial("g1", Some(&patch(json!({"home": {"score": 4}})))));

        let game = repo.get_or_create("g1").unwrap();
        assert_eq!(game.state.home.score, 4);
        assert_eq!(game.revision, 1);
    }

    #[test]
    fn test_replace_round_trip() {
        let mut repo = repository();
        let mut state = repo.get_or_create("g1").unwrap().state.clone();
        state.away.name = "Rivals".to_string();
        state.home.score = 5;

        let revision = repo.replace("g1", Some(state.to_value().unwrap())).unwrap();
        assert_eq!(revision, 1);
        assert_eq!(repo.get_or_create("g1").unwrap().state, state);
    }

    #[test]
    fn test_replace_rejects_malformed_state() {
        let mut repo = repository();
        let before = repo.get_or_create("g1").unwrap().clone();

        assert_err!(repo.replace("g1", None));
        assert_err!(repo.replace("g1", Some(json!({"home": {"name": "x"}}))));
        assert_err!(repo.replace("g1", Some(json!("nope"))));

        assert_eq!(repo.get_or_create("g1").unwrap(), &before);
    }

    #[test]
    fn test_apply_partial_returns_merged_state() {
        let mut repo = repository();
        let merged = repo
            .apply_partial("default", Some(&patch(json!({"away": {"score": 2}}))))
            .unwrap()
            .clone();

        assert_eq!(merged.revision, 1);
        assert_eq!(merged.state.away.score, 2);
        assert_eq!(merged.state.home.score, 0);
        assert_eq!(merged.state.home.name, "Home Team");
        assert_eq!(repo.get_or_create("default").unwrap(), &merged);
    }

    #[test]
    fn test_apply_partial_rejects_missing_or_bad_patch() {
        let mut repo = repository();
        assert!(matches!(
            repo.apply_partial("g1", None),
            Err(SyncError::InvalidUpdate { .. })
        ));
        assert!(matches!(
            PartialState::from_value(json!([1, 2])),
            Err(SyncError::InvalidUpdate { .. })
        ));
        assert!(matches!(
            repo.apply_partial("g1", Some(&patch(json!({"home": {"score": -1}})))),
            Err(SyncError::InvalidUpdate { .. })
        ));
        assert_eq!(repo.get_or_create("g1").unwrap().revision, 0);
    }

    #[test]
    fn test_apply_partial_empties_penalties() {
        let mut repo = repository();
        let penalties = json!({"away": {"penalties": [
            {"offense": "Tripping", "time": {"mode": "running", "time": 120}},
            {"offense": "Hooking", "time": {"mode": "running", "time": 95}}
        ]}});
        assert_ok!(repo.apply_partial("g1", Some(&patch(penalties))));
        assert_eq!(repo.get_or_create("g1").unwrap().state.away.penalties.len(), 2);

        assert_ok!(repo.apply_partial("g1", Some(&patch(json!({"away": {"penalties": []}})))));
        assert!(repo.get_or_create("g1").unwrap().state.away.penalties.is_empty());
    }

    #[test]
    fn test_later_arrival_wins() {
        let mut repo = repository();
        assert_ok!(repo.apply_partial("g1", Some(&patch(json!({"home": {"score": 1}})))));
        assert_ok!(repo.apply_partial("g1", Some(&patch(json!({"home": {"score": 2}})))));

        let game = repo.get_or_create("g1").unwrap();
        assert_eq!(game.state.home.score, 2);
        assert_eq!(game.revision, 2);
    }

    #[test]
    fn test_reset_keeps_sport_and_advances_revision() {
        let mut repo = repository();
        assert_ok!(repo.create("g1", "football"));
        assert_ok!(repo.apply_partial("g1", Some(&patch(json!({"home": {"score": 14}})))));

        let game = repo.reset("g1").unwrap();
        assert_eq!(game.sport, "football");
        assert_eq!(game.state.home.score, 0);
        assert_eq!(game.revision, 2);
    }

    #[test]
    fn test_reset_unknown_game_creates_default() {
        let mut repo = repository();
        let game = repo.reset("fresh").unwrap();
        assert_eq!(game.sport, "hockey");
        assert_eq!(game.revision, 0);
    }

    #[test]
    fn test_create_rejects_existing_and_unknown_sport() {
        let mut repo = repository();
        assert_ok!(repo.create("g1", "hockey"));
        assert!(matches!(
            repo.create("g1", "football"),
            Err(SyncError::GameExists { .. })
        ));
        assert!(matches!(
            repo.create("g2", "curling"),
            Err(SyncError::UnknownSport { .. })
        ));
        assert!(!repo.contains("g2"));
    }

    #[test]
    fn test_delete() {
        let mut repo = repository();
        assert_ok!(repo.get_or_create("g1"));
        assert_ok!(repo.delete("g1"));
        assert!(!repo.contains("g1"));
        assert!(matches!(
            repo.delete("g1"),
            Err(SyncError::UnknownGame { .. })
        ));
    }

    #[test]
    fn test_empty_gid_rejected() {
        let mut repo = repository();
        assert!(matches!(
            repo.get_or_create(""),
            Err(SyncError::InvalidRequest { .. })
        ));
        assert_err!(repo.apply_partial("  ", Some(&patch(json!({})))));
        assert!(repo.game_ids().is_empty());
    }
}
