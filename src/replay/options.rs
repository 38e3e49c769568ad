use std::time::Duration;

use crate::protocol::SqlDialect;

pub const DEFAULT_SKIP_PATTERNS: [&str; 2] = ["db_heartbeat", "slave_master_info"];

/// Tunables of a replay run.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub dialect: SqlDialect,
    /// Sleep to reproduce capture spacing. Off replays as fast as possible.
    pub reconstruct_timing: bool,
    /// Upper bound on concurrently live sessions; `None` is unbounded.
    pub max_sessions: Option<usize>,
    /// Per-session queue depth. `0` hands records over unbuffered: the
    /// dispatcher waits until the session has taken the record.
    pub queue_depth: usize,
    pub statement_timeout: Option<Duration>,
    /// Statements containing any of these are never compared.
    pub skip_patterns: Vec<String>,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::default(),
            reconstruct_timing: true,
            max_sessions: None,
            queue_depth: 0,
            statement_timeout: None,
            skip_patterns: DEFAULT_SKIP_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}
