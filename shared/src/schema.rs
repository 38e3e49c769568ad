// SQLite schema for the replay log
pub const REPLAY_LOG_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS replay_log (
    entry_id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL,
    session_id INTEGER NOT NULL,

    statement TEXT NOT NULL,
    query_type TEXT NOT NULL,

    -- capture_time is fractional Unix seconds from the trace
    capture_time REAL NOT NULL,
    captured_at TEXT,
    started_at INTEGER NOT NULL,  -- Unix timestamp in microseconds
    primary_duration_us INTEGER,

    status TEXT NOT NULL,  -- 'success', 'error', 'mismatch', 'skipped'
    error_message TEXT,
    mismatch TEXT,

    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000000)
);

CREATE INDEX IF NOT EXISTS idx_replay_log_session_id ON replay_log(session_id);
CREATE INDEX IF NOT EXISTS idx_replay_log_status ON replay_log(status);
CREATE INDEX IF NOT EXISTS idx_replay_log_run_id ON replay_log(run_id);
"#;
