use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_rusqlite::Connection as AsyncConnection;
use tracing::{debug, error, info};
use uuid::Uuid;

use sql_replay_shared::{ReplayError, ReplayRecord, Result, REPLAY_LOG_SCHEMA};

use crate::compare::Mismatch;
use crate::protocol::detect_query_type;

/// How a replayed statement ended.
#[derive(Clone, Debug)]
pub enum ReplayStatus {
    Success,
    Error(String),
    Mismatch(Mismatch),
    /// Comparison skipped; the reason goes to `error_message`.
    Skipped(String),
}

#[derive(Clone, Debug)]
pub struct ReplayLogEntry {
    pub entry_id: String,
    pub run_id: String,
    pub session_id: i64,

    pub statement: String,
    pub query_type: String,

    pub capture_time: f64,
    pub captured_at: Option<String>,
    pub started_at: i64,
    pub primary_duration_us: Option<i64>,

    pub status: String,
    pub error_message: Option<String>,
    pub mismatch: Option<String>,
}

impl ReplayLogEntry {
    pub fn new(
        run_id: &str,
        record: &ReplayRecord,
        started_at: SystemTime,
        primary_duration: Option<Duration>,
        status: ReplayStatus,
    ) -> Self {
        let started_at_us = started_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or_default();

        let (status_str, error_message, mismatch) = match status {
            ReplayStatus::Success => ("success", None, None),
            ReplayStatus::Error(msg) => ("error", Some(msg), None),
            ReplayStatus::Mismatch(m) => {
                let detail = serde_json::to_string(&m).unwrap_or_else(|_| m.to_string());
                ("mismatch", None, Some(detail))
            }
            ReplayStatus::Skipped(reason) => ("skipped", Some(reason), None),
        };

        Self {
            entry_id: Uuid::now_v7().to_string(),
            run_id: run_id.to_string(),
            session_id: record.session_id,
            statement: record.statement.clone(),
            query_type: detect_query_type(&record.statement).as_str().to_string(),
            capture_time: record.capture_time,
            captured_at: record.captured_at().map(|t| t.to_rfc3339()),
            started_at: started_at_us,
            primary_duration_us: primary_duration.map(|d| d.as_micros() as i64),
            status: status_str.to_string(),
            error_message,
            mismatch,
        }
    }
}

fn log_error(e: impl std::fmt::Display) -> ReplayError {
    ReplayError::Log(e.to_string())
}

/// Drains replay log entries into SQLite in batches.
pub struct LogWriter {
    db: AsyncConnection,
    rx: mpsc::Receiver<ReplayLogEntry>,
    batch_size: usize,
    flush_interval: Duration,
}

impl LogWriter {
    pub async fn open(db_path: &Path, rx: mpsc::Receiver<ReplayLogEntry>) -> Result<Self> {
        let db = AsyncConnection::open(db_path).await.map_err(log_error)?;

        db.call(|conn| {
            conn.execute_batch(REPLAY_LOG_SCHEMA)?;
            conn.execute_batch(
                r#"
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA cache_size = -64000;  -- 64MB
                PRAGMA temp_store = MEMORY;
            "#,
            )?;
            Ok::<_, tokio_rusqlite::Error>(())
        })
        .await
        .map_err(log_error)?;

        info!(db_path = %db_path.display(), "Replay log initialized");

        Ok(Self {
            db,
            rx,
            batch_size: 100,
            flush_interval: Duration::from_millis(100),
        })
    }

    /// Runs until every sender is dropped, then flushes what is left.
    pub async fn run(mut self) {
        let mut buffer = Vec::with_capacity(self.batch_size);
        let mut flush_timer = tokio::time::interval(self.flush_interval);
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        debug!("LogWriter started");

        loop {
            tokio::select! {
                Some(entry) = self.rx.recv() => {
                    buffer.push(entry);

                    if buffer.len() >= self.batch_size {
                        if let Err(e) = self.flush_batch(&mut buffer).await {
                            error!(error = %e, "Failed to flush batch");
                        }
                    }
                }

                _ = flush_timer.tick() => {
                    if !buffer.is_empty() {
                        if let Err(e) = self.flush_batch(&mut buffer).await {
                            error!(error = %e, "Failed to flush batch on timer");
                        }
                    }
                }

                else => {
                    if !buffer.is_empty() {
                        if let Err(e) = self.flush_batch(&mut buffer).await {
                            error!(error = %e, "Failed to flush final batch");
                        }
                    }
                    debug!("LogWriter shutting down");
                    break;
                }
            }
        }
    }

    async fn flush_batch(&self, buffer: &mut Vec<ReplayLogEntry>) -> Result<()> {
        let entries = std::mem::take(buffer);
        let count = entries.len();
        let start = Instant::now();

        self.db.call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    r#"
                    INSERT INTO replay_log (
                        entry_id, run_id, session_id,
                        statement, query_type,
                        capture_time, captured_at, started_at, primary_duration_us,
                        status, error_message, mismatch
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                )?;

                for entry in entries {
                    stmt.execute(rusqlite::params![
                        entry.entry_id,
                        entry.run_id,
                        entry.session_id,
                        entry.statement,
                        entry.query_type,
                        entry.capture_time,
                        entry.captured_at,
                        entry.started_at,
                        entry.primary_duration_us,
                        entry.status,
                        entry.error_message,
                        entry.mismatch,
                    ])?;
                }
            }
            tx.commit()?;
            Ok::<_, tokio_rusqlite::Error>(())
        })
        .await
        .map_err(log_error)?;

        let elapsed = start.elapsed();
        debug!(
            count = count,
            elapsed_ms = elapsed.as_millis(),
            "Flushed batch to replay log"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sql_replay_shared::Command;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_log_writer() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("replay.db");

        let (tx, rx) = mpsc::channel(100);
        let log_writer = LogWriter::open(&db_path, rx).await.unwrap();
        let handle = tokio::spawn(log_writer.run());

        for i in 0..10 {
            let record = ReplayRecord::new(7, 100.0 + i as f64, Command::Query, format!("SELECT {}", i));
            let status = if i == 3 {
                ReplayStatus::Error("relation does not exist".into())
            } else {
                ReplayStatus::Success
            };
            let entry = ReplayLogEntry::new(
                "run-1",
                &record,
                SystemTime::now(),
                Some(Duration::from_micros(1500)),
                status,
            );
            tx.send(entry).await.unwrap();
        }

        drop(tx);
        handle.await.unwrap();

        let db = AsyncConnection::open(&db_path).await.unwrap();
        let count: i64 = db
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM replay_log", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 10);

        let conn = rusqlite::Connection::open(&db_path).unwrap();

        let (status, message): (String, Option<String>) = conn
            .query_row(
                "SELECT status, error_message FROM replay_log WHERE statement = 'SELECT 3'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "error");
        assert_eq!(message.as_deref(), Some("relation does not exist"));
    }

    #[test]
    fn test_mismatch_entry_carries_detail() {
        let record = ReplayRecord::new(1, 100.0, Command::Query, "SELECT id FROM t");
        let entry = ReplayLogEntry::new(
            "run-1",
            &record,
            SystemTime::now(),
            None,
            ReplayStatus::Mismatch(Mismatch::AffectedRows { primary: 1, secondary: 2 }),
        );

        assert_eq!(entry.status, "mismatch");
        assert_eq!(entry.query_type, "select");
        assert!(entry.mismatch.unwrap().contains("affected_rows"));
        assert!(entry.captured_at.is_some());
        assert!(entry.primary_duration_us.is_none());
    }
}
