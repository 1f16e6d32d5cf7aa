//! Human-readable clock formatting

use crate::error::SyncError;

/// Formats seconds the way a scoreboard shows them
///
/// At or above one minute the format is `M:SS`; below a minute it is `SS.t`
/// with tenths. Negative values display as zero.
pub fn time_to_string(time: f64) -> String {
    let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
    let show_tenths = time < 60.0;

    let total_tenths = (time * 10.0).floor() as u64;
    let minutes = total_tenths / 600;
    let seconds = (total_tenths % 600) / 10;
    let tenths = total_tenths % 10;

    let minutes_string = if minutes != 0 {
        format!("{}:", minutes)
    } else {
        String::new()
    };

    if show_tenths {
        format!("{}{:02}.{}", minutes_string, seconds, tenths)
    } else {
        format!("{}{:02}", minutes_string, seconds)
    }
}

/// Parses `M:SS`, `MM:SS`, `SS` with an optional `.t` suffix into seconds
pub fn parse_time_string(text: &str) -> Result<f64, SyncError> {
    let invalid = || SyncError::InvalidRequest {
        details: format!("cannot parse time '{}'", text),
    };

    let text = text.trim();
    let (minutes, rest) = match text.split_once(':') {
        Some((m, rest)) => {
            if m.is_empty() || m.len() > 2 || !m.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            (m.parse::<u32>().map_err(|_| invalid())?, rest)
        }
        None => (0, text),
    };

    let (seconds, tenths) = match rest.split_once('.') {
        Some((s, t)) => {
            if t.len() != 1 || !t.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            (s, t.parse::<u32>().map_err(|_| invalid())?)
        }
        None => (rest, 0),
    };

    if seconds.len() != 2 || !seconds.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let seconds = seconds.parse::<u32>().map_err(|_| invalid())?;
    if seconds >= 60 {
        return Err(invalid());
    }

    Ok(f64::from(minutes * 60 + seconds) + f64::from(tenths) / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_time_to_string_minutes() {
        assert_eq!(time_to_string(120.0), "2:00");
        assert_eq!(time_to_string(900.0), "15:00");
        assert_eq!(time_to_string(61.9), "1:01");
    }

    #[test]
    fn test_time_to_string_tenths_under_a_minute() {
        assert_eq!(time_to_string(45.7), "45.7");
        assert_eq!(time_to_string(45.3), "45.3");
        assert_eq!(time_to_string(5.25), "05.2");
        assert_eq!(time_to_string(0.0), "00.0");
    }

    #[test]
    fn test_time_to_string_clamps_negative() {
        assert_eq!(time_to_string(-3.0), "00.0");
        assert_eq!(time_to_string(f64::NAN), "00.0");
    }

    #[test]
    fn test_parse_time_string() {
        assert_approx_eq!(parse_time_string("2:00").unwrap(), 120.0);
        assert_approx_eq!(parse_time_string("45.7").unwrap(), 45.7);
        assert_approx_eq!(parse_time_string("12:05.5").unwrap(), 725.5);
        assert_approx_eq!(parse_time_string(" 07 ").unwrap(), 7.0);
    }

    #[test]
    fn test_parse_time_string_rejects_garbage() {
        for text in ["", "abc", "2:7", "1:60", "123:00", "10.55", ":30"] {
            assert!(parse_time_string(text).is_err(), "accepted '{}'", text);
        }
    }

    #[test]
    fn test_format_parse_agree() {
        for seconds in [0.0, 9.5, 59.9, 60.0, 754.0] {
            let text = time_to_string(seconds);
            assert_approx_eq!(parse_time_string(&text).unwrap(), seconds);
        }
    }
}
