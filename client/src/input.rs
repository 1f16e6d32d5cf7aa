//! Controller commands read from the terminal
//!
//! Assignments such as `home.score=2` or `clock=2:00` become partial edits;
//! a handful of bare words drive the session itself.

use serde_json::Value;
use shared::{parse_time_string, PartialState, SyncError};

pub const HELP: &str = "commands: <path>=<value> (e.g. home.score=2, away.name=Rivals, \
clock=2:00, clock.mode=running, period=2, away.penalties=[]), push, pull, reset, sports, help, quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Merge a patch into the game
    Edit(PartialState),
    /// Send the whole current view as a replacement
    Push,
    /// Re-request the full state from the server
    Pull,
    /// Reset the game to its sport's defaults
    Reset,
    Sports,
    Help,
    Quit,
}

/// Parses one line of controller input
///
/// Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, SyncError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some((path, value)) = line.split_once('=') else {
        return match line.to_ascii_lowercase().as_str() {
            "push" => Ok(Some(Command::Push)),
            "pull" => Ok(Some(Command::Pull)),
            "reset" | "new" => Ok(Some(Command::Reset)),
            "sports" => Ok(Some(Command::Sports)),
            "help" | "?" => Ok(Some(Command::Help)),
            "quit" | "exit" => Ok(Some(Command::Quit)),
            _ => Err(SyncError::invalid_request(format!(
                "unknown command '{}'",
                line
            ))),
        };
    };

    let path = path.trim();
    let value = value.trim();
    if path.is_empty() || path.split('.').any(|segment| segment.trim().is_empty()) {
        return Err(SyncError::invalid_request(format!(
            "invalid field path '{}'",
            path
        )));
    }

    let (path, value) = match path {
        "clock" => ("time.time", clock_value(value)),
        "clock.mode" => ("time.mode", Value::String(value.to_ascii_lowercase())),
        "period" => ("time.period.number", parse_value(value)),
        other => (other, parse_value(value)),
    };

    let mut patch = PartialState::new();
    patch.set(path, value);
    Ok(Some(Command::Edit(patch)))
}

/// JSON when it parses, otherwise the raw text as a string
fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// `M:SS[.t]` becomes seconds; anything else is shown verbatim
fn clock_value(text: &str) -> Value {
    match parse_time_string(text) {
        Ok(seconds) => Value::from(seconds),
        Err(_) => parse_value(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn edit(line: &str) -> Value {
        match parse_command(line).unwrap() {
            Some(Command::Edit(patch)) => patch.into_value(),
            other => panic!("expected an edit, got {:?}", other),
        }
    }

    #[test]
    fn test_field_assignments() {
        assert_eq!(edit("home.score=2"), json!({ "home": { "score": 2 } }));
        assert_eq!(edit("away.name=Rivals"), json!({ "away": { "name": "Rivals" } }));
        assert_eq!(edit("away.penalties=[]"), json!({ "away": { "penalties": [] } }));
        assert_eq!(
            edit(" home.name = \"Big Red\" "),
            json!({ "home": { "name": "Big Red" } })
        );
    }

    #[test]
    fn test_clock_shorthands() {
        assert_eq!(edit("clock=2:00"), json!({ "time": { "time": 120.0 } }));
        assert_eq!(edit("clock=Final"), json!({ "time": { "time": "Final" } }));
        assert_eq!(edit("clock.mode=Running"), json!({ "time": { "mode": "running" } }));
        assert_eq!(edit("period=2"), json!({ "time": { "period": { "number": 2 } } }));
    }

    #[test]
    fn test_session_commands() {
        assert_eq!(parse_command("push").unwrap(), Some(Command::Push));
        assert_eq!(parse_command("PULL").unwrap(), Some(Command::Pull));
        assert_eq!(parse_command("reset").unwrap(), Some(Command::Reset));
        assert_eq!(parse_command("sports").unwrap(), Some(Command::Sports));
        assert_eq!(parse_command("?").unwrap(), Some(Command::Help));
        assert_eq!(parse_command("quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(
            parse_command("jump"),
            Err(SyncError::InvalidRequest { .. })
        ));
        assert!(parse_command("=3").is_err());
        assert!(parse_command("home..score=3").is_err());
    }
}
