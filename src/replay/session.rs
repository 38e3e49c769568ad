use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, oneshot, watch, OwnedSemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use sql_replay_shared::{Command, ExecResult, ReplayError, ReplayRecord, Result};

use super::{ReplayClock, ReplayContext, SessionSummary};
use crate::compare::compare_results;
use crate::config::TargetConfig;
use crate::database::Connection;
use crate::monitoring::{ReplayLogEntry, ReplayStatus};
use crate::protocol::{is_volatile, parse_statement};

/// A record on its way from the dispatcher to a session. With an unbuffered
/// hand-off the session answers on `accepted` once it has taken the record.
pub(crate) struct Handoff {
    pub record: ReplayRecord,
    pub accepted: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

/// Wall time of one statement on one target and what it returned.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub duration: Duration,
    pub result: Result<ExecResult>,
}

async fn execute_timed(conn: &mut Box<dyn Connection>, sql: &str, limit: Option<Duration>) -> ExecutionOutcome {
    let start = Instant::now();
    let result = match limit {
        Some(limit) => match tokio::time::timeout(limit, conn.execute(sql)).await {
            Ok(result) => result,
            Err(_) => Err(ReplayError::Timeout(limit)),
        },
        None => conn.execute(sql).await,
    };
    ExecutionOutcome {
        duration: start.elapsed(),
        result,
    }
}

/// Resolves once shutdown has been signalled. Never resolves if the sender
/// goes away without signalling.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Replays the records of a single captured session, in order, on its own
/// connection(s).
pub struct SessionEngine {
    session_id: i64,
    clock: ReplayClock,
    ctx: ReplayContext,
    state: SessionState,
    primary: Option<Box<dyn Connection>>,
    secondary: Option<Box<dyn Connection>>,
    last_capture_time: Option<f64>,
    summary: SessionSummary,
    permit: Option<OwnedSemaphorePermit>,
}

impl SessionEngine {
    pub fn new(session_id: i64, clock: ReplayClock, ctx: ReplayContext) -> Self {
        Self {
            session_id,
            clock,
            ctx,
            state: SessionState::Connecting,
            primary: None,
            secondary: None,
            last_capture_time: None,
            summary: SessionSummary::default(),
            permit: None,
        }
    }

    /// Holds an admission slot until the session quits.
    pub fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.permit = Some(permit);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn last_capture_time(&self) -> Option<f64> {
        self.last_capture_time
    }

    /// Connects to the primary and, in comparison mode, the secondary.
    pub async fn connect(&mut self) -> Result<()> {
        let targets = Arc::clone(&self.ctx.targets);

        self.primary = Some(self.open(&targets.primary).await?);
        if let Some(secondary) = &targets.secondary {
            match self.open(secondary).await {
                Ok(conn) => self.secondary = Some(conn),
                Err(e) => {
                    self.close_connections().await;
                    return Err(e);
                }
            }
        }

        self.state = SessionState::Active;
        info!(session_id = self.session_id, "New session");
        Ok(())
    }

    async fn open(&self, target: &TargetConfig) -> Result<Box<dyn Connection>> {
        let mut conn = self.ctx.connector.connect(target).await?;
        if let Some(charset) = &target.charset {
            if let Err(e) = conn.set_charset(charset).await {
                conn.close().await;
                return Err(ReplayError::Connect {
                    addr: target.addr.clone(),
                    reason: format!("cannot set charset {}: {}", charset, e),
                });
            }
        }
        Ok(conn)
    }

    /// Connects, then replays handed-off records until the dispatcher drops
    /// its sender or shutdown is signalled. Only a connect failure is an
    /// error.
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::Receiver<Handoff>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SessionSummary> {
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => return Ok(self.summary),
            connected = self.connect() => connected?,
        }

        loop {
            let handoff = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                next = rx.recv() => match next {
                    Some(handoff) => handoff,
                    None => break,
                },
            };
            if let Some(accepted) = handoff.accepted {
                let _ = accepted.send(());
            }

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = self.handle(handoff.record) => {}
            }
        }

        self.close_connections().await;
        Ok(self.summary)
    }

    /// Paces and dispatches one record.
    pub async fn handle(&mut self, record: ReplayRecord) {
        self.summary.records += 1;

        if self.state == SessionState::Closed {
            self.summary.ignored += 1;
            match record.command {
                Command::Query => {
                    warn!(
                        session_id = self.session_id,
                        statement = %record.statement,
                        "Query on closed session"
                    );
                    let reason = ReplayError::SessionClosed(self.session_id).to_string();
                    self.log(&record, SystemTime::now(), None, ReplayStatus::Error(reason))
                        .await;
                }
                Command::Quit => debug!(session_id = self.session_id, "Session already closed"),
                _ => {}
            }
            return;
        }

        self.pace(&record).await;
        self.last_capture_time = Some(record.capture_time);

        match record.command {
            Command::Ping => {}
            Command::Quit => self.quit().await,
            Command::Query => {
                debug!(session_id = self.session_id, statement = %record.statement, "Statement replay");
                if self.secondary.is_some() {
                    self.replay_compared(&record).await;
                } else {
                    self.replay_single(&record).await;
                }
            }
            Command::Other(code) => debug!(session_id = self.session_id, code, "Unhandled command skipped"),
        }
    }

    async fn pace(&self, record: &ReplayRecord) {
        if !self.ctx.options.reconstruct_timing || self.last_capture_time.is_none() {
            return;
        }
        let delay = self.clock.delay_for(record.capture_time);
        if !delay.is_zero() {
            debug!(
                session_id = self.session_id,
                delay_ms = delay.as_secs_f64() * 1000.0,
                "Sleeping to reproduce capture timing"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn quit(&mut self) {
        self.close_connections().await;
        self.state = SessionState::Closed;
        self.permit = None;
        info!(session_id = self.session_id, "Session closed");
    }

    async fn close_connections(&mut self) {
        if let Some(mut conn) = self.primary.take() {
            conn.close().await;
        }
        if let Some(mut conn) = self.secondary.take() {
            conn.close().await;
        }
    }

    async fn replay_single(&mut self, record: &ReplayRecord) {
        let started_at = SystemTime::now();
        let limit = self.ctx.options.statement_timeout;
        let Some(primary) = self.primary.as_mut() else {
            return;
        };

        let outcome = execute_timed(primary, &record.statement, limit).await;
        self.ctx.stats.append(outcome.duration);
        self.summary.queries += 1;

        let status = match outcome.result {
            Ok(_) => ReplayStatus::Success,
            Err(e) => {
                warn!(session_id = self.session_id, target = "primary", error = %e, statement = %record.statement, "Execution failed");
                self.summary.errors += 1;
                ReplayStatus::Error(e.to_string())
            }
        };
        self.log(record, started_at, Some(outcome.duration), status).await;
    }

    async fn replay_compared(&mut self, record: &ReplayRecord) {
        let started_at = SystemTime::now();
        let limit = self.ctx.options.statement_timeout;
        let sql = record.statement.as_str();

        let Some(secondary) = self.secondary.as_mut() else {
            return;
        };
        let secondary_result = match execute_timed(secondary, sql, limit).await.result {
            Ok(result) => result,
            Err(e) => {
                warn!(session_id = self.session_id, target = "secondary", error = %e, statement = %sql, "Execution failed");
                self.summary.errors += 1;
                self.log(record, started_at, None, ReplayStatus::Error(format!("secondary: {}", e)))
                    .await;
                return;
            }
        };

        let shape = if is_volatile(sql, &self.ctx.options.skip_patterns) {
            debug!(session_id = self.session_id, statement = %sql, "Volatile statement not compared");
            Err("volatile statement".to_string())
        } else {
            match parse_statement(sql, self.ctx.options.dialect) {
                Ok(shape) if shape.is_read() => Ok(shape),
                Ok(shape) => Err(format!("{} statement is not compared", shape.query_type.as_str())),
                Err(e) => {
                    warn!(session_id = self.session_id, error = %e, statement = %sql, "Cannot compare results");
                    Err(e.to_string())
                }
            }
        };

        let Some(primary) = self.primary.as_mut() else {
            return;
        };
        let outcome = execute_timed(primary, sql, limit).await;
        self.ctx.stats.append(outcome.duration);
        self.summary.queries += 1;

        let primary_result = match outcome.result {
            Ok(result) => result,
            Err(e) => {
                warn!(session_id = self.session_id, target = "primary", error = %e, statement = %sql, "Execution failed");
                self.summary.errors += 1;
                self.log(record, started_at, Some(outcome.duration), ReplayStatus::Error(e.to_string()))
                    .await;
                return;
            }
        };

        let shape = match shape {
            Ok(shape) => shape,
            Err(reason) => {
                self.summary.skipped_comparisons += 1;
                self.log(record, started_at, Some(outcome.duration), ReplayStatus::Skipped(reason))
                    .await;
                return;
            }
        };
        self.summary.comparisons += 1;
        let status = match compare_results(&shape, Some(primary_result), Some(secondary_result)) {
            Some(mismatch) => {
                warn!(
                    session_id = self.session_id,
                    statement = %sql,
                    mismatch = %mismatch,
                    "Results differ between targets"
                );
                self.summary.mismatches += 1;
                ReplayStatus::Mismatch(mismatch)
            }
            None => ReplayStatus::Success,
        };
        self.log(record, started_at, Some(outcome.duration), status).await;
    }

    async fn log(
        &self,
        record: &ReplayRecord,
        started_at: SystemTime,
        primary_duration: Option<Duration>,
        status: ReplayStatus,
    ) {
        let Some(tx) = &self.ctx.log_tx else {
            return;
        };
        let entry = ReplayLogEntry::new(&self.ctx.run_id, record, started_at, primary_duration, status);
        if tx.send(entry).await.is_err() {
            debug!(session_id = self.session_id, "Replay log closed, entry dropped");
        }
    }
}
