//! Registry of sport-specific default game states

use log::debug;
use serde_json::{json, Map, Value};
use shared::{Clock, ClockMode, GameState, Period, SyncError, Team, TimeValue};
use std::collections::HashMap;

/// Builds a fresh default state for one sport
pub type DefaultStateFactory = fn() -> GameState;

/// Maps sport identifiers to default-state factories
///
/// Populated once at startup and looked up by value; one sport is the
/// fallback used when a game is referenced before anyone created it.
#[derive(Debug, Clone)]
pub struct SportRegistry {
    factories: HashMap<String, DefaultStateFactory>,
    default_sport: String,
}

impl SportRegistry {
    /// Creates an empty registry whose fallback is `default_sport`
    ///
    /// The fallback must be registered before [`SportRegistry::default_state`]
    /// is used.
    pub fn new(default_sport: &str) -> Self {
        Self {
            factories: HashMap::new(),
            default_sport: default_sport.to_string(),
        }
    }

    /// Registry with the built-in sports, falling back to hockey
    pub fn with_builtin() -> Self {
        let mut registry = Self::new("hockey");
        registry.register("hockey", hockey_default);
        registry.register("football", football_default);
        registry
    }

    pub fn register(&mut self, sport: &str, factory: DefaultStateFactory) {
        debug!("Registered sport {}", sport);
        self.factories.insert(sport.to_string(), factory);
    }

    /// Changes the fallback sport; fails if it is not registered
    pub fn set_default_sport(&mut self, sport: &str) -> Result<(), SyncError> {
        if !self.factories.contains_key(sport) {
            return Err(SyncError::UnknownSport {
                sport: sport.to_string(),
            });
        }
        self.default_sport = sport.to_string();
        Ok(())
    }

    pub fn default_sport(&self) -> &str {
        &self.default_sport
    }

    pub fn contains(&self, sport: &str) -> bool {
        self.factories.contains_key(sport)
    }

    pub fn create(&self, sport: &str) -> Result<GameState, SyncError> {
        self.factories
            .get(sport)
            .map(|factory| factory())
            .ok_or_else(|| SyncError::UnknownSport {
                sport: sport.to_string(),
            })
    }

    pub fn default_state(&self) -> Result<GameState, SyncError> {
        self.create(&self.default_sport)
    }

    /// Registered sport identifiers in sorted order
    pub fn sports(&self) -> Vec<String> {
        let mut sports: Vec<String> = self.factories.keys().cloned().collect();
        sports.sort();
        sports
    }
}

impl Default for SportRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn hockey_default() -> GameState {
    GameState {
        home: Team::new("Home Team", "#f44336"),
        away: Team::new("Away Team", "#03a9f4"),
        time: Clock {
            mode: ClockMode::Stopped,
            time: Some(TimeValue::Seconds(900.0)),
            period: Period {
                kind: "period".to_string(),
                number: 1,
                extra: Map::new(),
            },
            extra: Map::new(),
        },
        extra: object(json!({
            "config": {
                "periodLength": 900,
                "minorLength": 120,
                "majorLength": 300
            }
        })),
    }
}

pub fn football_default() -> GameState {
    let mut home = Team::new("Home Team", "#FF0000");
    home.extra = object(json!({"timeoutsLeft": 3, "timeoutsMax": 3, "possession": false}));
    let mut away = Team::new("Away Team", "#00FF00");
    away.extra = object(json!({"timeoutsLeft": 3, "timeoutsMax": 3, "possession": false}));

    GameState {
        home,
        away,
        time: Clock {
            mode: ClockMode::Stopped,
            time: Some(TimeValue::Seconds(900.0)),
            period: Period {
                kind: "quarter".to_string(),
                number: 1,
                extra: Map::new(),
            },
            extra: Map::new(),
        },
        extra: object(json!({"play": "", "flag": false})),
    }
}
