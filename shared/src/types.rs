use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client command codes as they appear in the trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Quit,
    Query,
    Ping,
    Other(i64),
}

impl Command {
    pub const QUIT_CODE: i64 = 1;
    pub const QUERY_CODE: i64 = 3;
    pub const PING_CODE: i64 = 14;

    pub fn from_code(code: i64) -> Self {
        match code {
            Self::QUIT_CODE => Command::Quit,
            Self::QUERY_CODE => Command::Query,
            Self::PING_CODE => Command::Ping,
            other => Command::Other(other),
        }
    }
}

/// One captured client event. Immutable once decoded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub session_id: i64,
    /// Fractional Unix epoch seconds.
    pub capture_time: f64,
    pub command: Command,
    pub statement: String,
}

impl ReplayRecord {
    pub fn new(session_id: i64, capture_time: f64, command: Command, statement: impl Into<String>) -> Self {
        Self {
            session_id,
            capture_time,
            command,
            statement: statement.into(),
        }
    }

    /// Wall-clock form of `capture_time`. `None` when the value is not
    /// finite or falls outside the representable calendar range.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        if !self.capture_time.is_finite() {
            return None;
        }
        let secs = self.capture_time.floor();
        let nanos = ((self.capture_time - secs) * 1_000_000_000.0) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::from_code(1), Command::Quit);
        assert_eq!(Command::from_code(3), Command::Query);
        assert_eq!(Command::from_code(14), Command::Ping);
        assert_eq!(Command::from_code(22), Command::Other(22));
        assert_eq!(Command::from_code(300), Command::Other(300));
        assert_eq!(Command::from_code(-1), Command::Other(-1));
    }

    #[test]
    fn test_captured_at() {
        let record = ReplayRecord::new(1, 1_700_000_000.25, Command::Query, "SELECT 1");
        let at = record.captured_at().unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert_eq!(at.timestamp_subsec_millis(), 250);

        assert!(ReplayRecord::new(1, 1e300, Command::Query, "").captured_at().is_none());
        assert!(ReplayRecord::new(1, f64::INFINITY, Command::Query, "").captured_at().is_none());
    }
}
