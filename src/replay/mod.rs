//! Replay engine: one task per captured session, fed in trace order by a
//! single dispatcher.

mod clock;
mod dispatcher;
mod options;
mod session;

#[cfg(test)]
pub(crate) mod testing;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use sql_replay_shared::LatencyStats;

use crate::config::Targets;
use crate::database::Connector;
use crate::monitoring::ReplayLogEntry;

pub use clock::ReplayClock;
pub use dispatcher::Dispatcher;
pub use options::{ReplayOptions, DEFAULT_SKIP_PATTERNS};
pub use session::{ExecutionOutcome, SessionEngine, SessionState};

/// Everything a session needs that outlives it. Cheap to clone.
#[derive(Clone)]
pub struct ReplayContext {
    pub connector: Arc<dyn Connector>,
    pub targets: Arc<Targets>,
    pub stats: Arc<LatencyStats>,
    pub options: Arc<ReplayOptions>,
    pub log_tx: Option<mpsc::Sender<ReplayLogEntry>>,
    pub run_id: String,
}

impl ReplayContext {
    pub fn new(connector: Arc<dyn Connector>, targets: Targets, options: ReplayOptions) -> Self {
        Self {
            connector,
            targets: Arc::new(targets),
            stats: Arc::new(LatencyStats::new()),
            options: Arc::new(options),
            log_tx: None,
            run_id: Uuid::now_v7().to_string(),
        }
    }

    pub fn with_log(mut self, log_tx: mpsc::Sender<ReplayLogEntry>) -> Self {
        self.log_tx = Some(log_tx);
        self
    }
}

/// Counters one session accumulates over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub records: u64,
    pub queries: u64,
    pub errors: u64,
    pub comparisons: u64,
    pub mismatches: u64,
    pub skipped_comparisons: u64,
    /// Records that arrived after the session quit.
    pub ignored: u64,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub records_dispatched: u64,
    pub malformed_records: u64,
    pub sessions_started: u64,
    pub queries: u64,
    pub errors: u64,
    pub comparisons: u64,
    pub mismatches: u64,
    pub skipped_comparisons: u64,
    pub ignored: u64,
}

impl ReplaySummary {
    pub fn absorb(&mut self, session: &SessionSummary) {
        self.queries += session.queries;
        self.errors += session.errors;
        self.comparisons += session.comparisons;
        self.mismatches += session.mismatches;
        self.skipped_comparisons += session.skipped_comparisons;
        self.ignored += session.ignored;
    }
}
