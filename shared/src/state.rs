//! Scoreboard document types shared by the server and every client
//!
//! A [`GameState`] is the at-rest shape of one game: it is always fully
//! populated. A [`PartialState`] only exists in transit and describes the
//! fields a sender wants to change.

use crate::clock::time_to_string;
use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether a timer is counting, paused or not shown at all
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    Running,
    Stopped,
    Disabled,
}

/// Remaining time on a timer
///
/// Operators may type freeform text such as "End of Period", so the value is
/// either a number of seconds or a pre-formatted display string.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum TimeValue {
    Seconds(f64),
    Display(String),
}

impl TimeValue {
    /// Text shown on a scoreboard for this value
    pub fn display(&self) -> String {
        match self {
            TimeValue::Seconds(seconds) => time_to_string(*seconds),
            TimeValue::Display(text) => text.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Timer {
    pub mode: ClockMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Period {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Game clock: a timer plus the current period
///
/// Keys a sport adds below `time` (such as `custom`) are kept in `extra`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Clock {
    pub mode: ClockMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeValue>,
    pub period: Period,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Clock {
    /// Displayed time, or `None` when the clock is disabled or unset
    pub fn display_time(&self) -> Option<String> {
        if self.mode == ClockMode::Disabled {
            return None;
        }
        self.time.as_ref().map(TimeValue::display)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PenaltyPlayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Penalty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PenaltyPlayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offense: Option<String>,
    pub time: Timer,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One side of the scoreboard
///
/// Sport-specific fields (timeouts, possession, ...) ride along in `extra`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Team {
    pub name: String,
    pub color: String,
    pub score: u32,
    #[serde(default)]
    pub penalties: Vec<Penalty>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Team {
    pub fn new(name: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            score: 0,
            penalties: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// Complete, always-valid scoreboard document for one game
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GameState {
    pub home: Team,
    pub away: Team,
    pub time: Clock,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GameState {
    /// Validates an untyped document into a fully populated state
    pub fn from_value(value: Value) -> Result<Self, SyncError> {
        if !value.is_object() {
            return Err(SyncError::InvalidUpdate {
                details: "state must be an object".to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| SyncError::InvalidUpdate {
            details: e.to_string(),
        })
    }

    pub fn to_value(&self) -> Result<Value, SyncError> {
        Ok(serde_json::to_value(self)?)
    }

    /// One-line summary used by text displays and logs
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} {} - {} {} | {} {}",
            self.away.name,
            self.away.score,
            self.home.score,
            self.home.name,
            self.time.period.kind,
            self.time.period.number
        );
        if let Some(time) = self.time.display_time() {
            line.push_str(&format!(" {}", time));
        }
        let penalties = self.away.penalties.len() + self.home.penalties.len();
        if penalties > 0 {
            line.push_str(&format!(" | {} penalties", penalties));
        }
        line
    }
}

/// Structurally partial mirror of [`GameState`]
///
/// Every key is optional and nested objects are themselves partial. A
/// sequence present in the patch replaces the whole collection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct PartialState(Map<String, Value>);

impl PartialState {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Accepts only JSON objects; anything else is not a patch
    pub fn from_value(value: Value) -> Result<Self, SyncError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SyncError::InvalidUpdate {
                details: format!("patch must be an object, got {}", kind_of(&other)),
            }),
        }
    }

    /// Sets the value at a dotted path, creating intermediate objects
    ///
    /// `PartialState::new().with("away.score", 2)` yields `{"away":{"score":2}}`.
    pub fn with(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.set(path, value.into());
        self
    }

    pub fn set(&mut self, path: &str, value: Value) {
        let mut keys: Vec<&str> = path.split('.').filter(|k| !k.is_empty()).collect();
        let Some(last) = keys.pop() else {
            return;
        };

        let mut node = &mut self.0;
        for key in keys {
            let entry = node
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(map) = entry else {
                return;
            };
            node = map;
        }
        node.insert(last.to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_state() -> GameState {
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
            extra: Map::new(),
        }
    }

    #[test]
    fn test_state_json_shape() {
        let value = sample_state().to_value().unwrap();
        assert_eq!(value["home"]["score"], json!(0));
        assert_eq!(value["home"]["penalties"], json!([]));
        assert_eq!(value["time"]["mode"], json!("stopped"));
        assert_eq!(value["time"]["period"]["type"], json!("period"));
    }

    #[test]
    fn test_from_value_rejects_missing_fields() {
        let mut value = sample_state().to_value().unwrap();
        value["away"].as_object_mut().unwrap().remove("score");

        match GameState::from_value(value) {
            Err(SyncError::InvalidUpdate { details }) => assert!(details.contains("score")),
            other => panic!("expected InvalidUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(GameState::from_value(json!(null)).is_err());
        assert!(GameState::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_sport_specific_fields_survive() {
        let mut value = sample_state().to_value().unwrap();
        value["home"]["timeoutsLeft"] = json!(3);
        value["config"] = json!({"periodLength": 900});

        let state = GameState::from_value(value.clone()).unwrap();
        assert_eq!(state.home.extra.get("timeoutsLeft"), Some(&json!(3)));
        assert_eq!(state.to_value().unwrap(), value);
    }

    #[test]
    fn test_freeform_clock_text() {
        let mut value = sample_state().to_value().unwrap();
        value["time"]["time"] = json!("End of Period");

        let state = GameState::from_value(value).unwrap();
        assert_eq!(
            state.time.time,
            Some(TimeValue::Display("End of Period".to_string()))
        );
        assert_eq!(state.time.display_time().as_deref(), Some("End of Period"));
    }

    #[test]
    fn test_disabled_clock_hides_time() {
        let mut state = sample_state();
        state.time.mode = ClockMode::Disabled;
        assert_eq!(state.time.display_time(), None);
    }

    #[test]
    fn test_summary() {
        let mut state = sample_state();
        state.away.score = 2;
        assert_eq!(
            state.summary(),
            "Away Team 2 - 0 Home Team | period 1 15:00"
        );
    }

    #[test]
    fn test_partial_state_builder() {
        let patch = PartialState::new()
            .with("away.score", 2)
            .with("away.name", "Rivals")
            .with("time.period.number", 3);

        assert_eq!(
            patch.into_value(),
            json!({"away": {"score": 2, "name": "Rivals"}, "time": {"period": {"number": 3}}})
        );
    }

    #[test]
    fn test_partial_state_rejects_non_object() {
        assert!(PartialState::from_value(json!(null)).is_err());
        assert!(PartialState::from_value(json!("score")).is_err());
        assert!(PartialState::from_value(json!({})).unwrap().is_empty());
    }
}
