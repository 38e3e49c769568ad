use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tokio::sync::{mpsc, oneshot, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use sql_replay_shared::{ReplayError, ReplayRecord, Result};

use super::session::{Handoff, SessionEngine};
use super::{ReplayClock, ReplayContext, ReplaySummary, SessionSummary};
use crate::trace::TraceReader;

type SessionOutcome = (i64, Result<SessionSummary>);

/// Routes trace records to per-session tasks, creating a session the first
/// time its id is seen.
///
/// With a session limit, a session that cannot be admitted yet is held back
/// with its records while ingestion continues for the admitted ones. Held
/// sessions start in arrival order as permits free up.
pub struct Dispatcher {
    ctx: ReplayContext,
    sessions: HashMap<i64, mpsc::Sender<Handoff>>,
    tasks: JoinSet<SessionOutcome>,
    replay_start: Instant,
    clock: Option<ReplayClock>,
    admission: Option<Arc<Semaphore>>,
    waiting: VecDeque<(i64, Vec<ReplayRecord>)>,
    shutdown_tx: watch::Sender<bool>,
    summary: ReplaySummary,
}

impl Dispatcher {
    /// The replay start instant is taken here, before the first record is
    /// read.
    pub fn new(ctx: ReplayContext) -> Self {
        let admission = ctx.options.max_sessions.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            ctx,
            sessions: HashMap::new(),
            tasks: JoinSet::new(),
            replay_start: Instant::now(),
            clock: None,
            admission,
            waiting: VecDeque::new(),
            shutdown_tx,
            summary: ReplaySummary::default(),
        }
    }

    /// Reads the trace to the end, then waits for every session to drain.
    /// Once `shutdown` resolves, ingestion stops and sessions are told to
    /// stop after their current record.
    pub async fn run<R, F>(mut self, reader: &mut TraceReader<R>, shutdown: F) -> Result<ReplaySummary>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stopping = false;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.stop();
                    stopping = true;
                    break;
                }
                step = self.step(reader) => match step {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        self.abort();
                        return Err(e);
                    }
                },
            }
        }

        // Dropping the senders lets each session finish its queue and exit,
        // which frees permits for the sessions still held back.
        self.sessions.clear();
        while !stopping && !self.waiting.is_empty() {
            let admission = self.admission.clone();
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.stop();
                    stopping = true;
                }
                Some(joined) = self.tasks.join_next() => {
                    self.collect(joined)?;
                }
                permit = acquire(admission) => {
                    self.admit_next(Some(permit?)).await?;
                    self.sessions.clear();
                }
            }
        }
        if !self.waiting.is_empty() {
            info!(sessions = self.waiting.len(), "Held sessions discarded");
            self.waiting.clear();
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = &mut shutdown, if !stopping => {
                    self.stop();
                    stopping = true;
                    continue;
                }
                joined = self.tasks.join_next() => joined,
            };
            match joined {
                Some(joined) => {
                    self.collect(joined)?;
                }
                None => break,
            }
        }

        info!(
            records = self.summary.records_dispatched,
            sessions = self.summary.sessions_started,
            malformed = self.summary.malformed_records,
            "Replay finished"
        );
        Ok(self.summary)
    }

    /// Ingests one line. `Ok(false)` at end of input.
    async fn step<R: AsyncBufRead + Unpin>(&mut self, reader: &mut TraceReader<R>) -> Result<bool> {
        match reader.next_record().await {
            None => Ok(false),
            Some(Ok(record)) => {
                self.dispatch(record).await?;
                Ok(true)
            }
            Some(Err(ReplayError::Trace { line, reason })) => {
                warn!(line, reason = %reason, "Skipping malformed trace record");
                self.summary.malformed_records += 1;
                Ok(true)
            }
            Some(Err(e)) => Err(e),
        }
    }

    /// Hands one record to its session, starting the session if needed.
    /// Blocks until the session has taken the record when the queue depth
    /// is zero. Records of a session held back by the session limit are
    /// kept until it is admitted.
    pub async fn dispatch(&mut self, record: ReplayRecord) -> Result<()> {
        let clock = self.clock_for(&record);
        self.admit_waiting().await?;

        let session_id = record.session_id;
        if !self.sessions.contains_key(&session_id) {
            if let Some((_, held)) = self.waiting.iter_mut().find(|(id, _)| *id == session_id) {
                held.push(record);
                return Ok(());
            }
            let admitted = if self.waiting.is_empty() { self.try_admit() } else { None };
            match admitted {
                Some(permit) => self.start_session(session_id, clock, permit),
                None => {
                    debug!(session_id, "Session limit reached, holding session");
                    self.waiting.push_back((session_id, vec![record]));
                    return Ok(());
                }
            }
        }

        self.deliver(record).await
    }

    /// The first record seen anchors the clock for every session.
    fn clock_for(&mut self, record: &ReplayRecord) -> ReplayClock {
        let replay_start = self.replay_start;
        *self
            .clock
            .get_or_insert_with(|| ReplayClock::new(record.capture_time, replay_start))
    }

    async fn deliver(&mut self, record: ReplayRecord) -> Result<()> {
        let session_id = record.session_id;
        let (accepted, taken) = if self.ctx.options.queue_depth == 0 {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let sent = match self.sessions.get(&session_id) {
            Some(tx) => tx.send(Handoff { record, accepted }).await.is_ok(),
            None => false,
        };
        let delivered = sent
            && match taken {
                Some(rx) => rx.await.is_ok(),
                None => true,
            };

        if delivered {
            self.summary.records_dispatched += 1;
            Ok(())
        } else {
            self.session_gone(session_id).await
        }
    }

    /// `Some` when a new session may start now. The inner permit is only
    /// present when a session limit is configured.
    fn try_admit(&self) -> Option<Option<OwnedSemaphorePermit>> {
        match &self.admission {
            None => Some(None),
            Some(admission) => Arc::clone(admission).try_acquire_owned().ok().map(Some),
        }
    }

    /// Starts held sessions, oldest first, while permits are free.
    async fn admit_waiting(&mut self) -> Result<()> {
        while !self.waiting.is_empty() {
            match self.try_admit() {
                Some(permit) => self.admit_next(permit).await?,
                None => break,
            }
        }
        Ok(())
    }

    async fn admit_next(&mut self, permit: Option<OwnedSemaphorePermit>) -> Result<()> {
        let (session_id, held) = match self.waiting.pop_front() {
            Some(next) => next,
            None => return Ok(()),
        };
        let clock = match held.first() {
            Some(first) => self.clock_for(first),
            None => return Ok(()),
        };

        debug!(session_id, held = held.len(), "Held session admitted");
        self.start_session(session_id, clock, permit);
        for record in held {
            self.deliver(record).await?;
        }
        Ok(())
    }

    fn start_session(&mut self, session_id: i64, clock: ReplayClock, permit: Option<OwnedSemaphorePermit>) {
        let mut engine = SessionEngine::new(session_id, clock, self.ctx.clone());
        if let Some(permit) = permit {
            engine = engine.with_permit(permit);
        }

        let (tx, rx) = mpsc::channel(self.ctx.options.queue_depth.max(1));
        let shutdown = self.shutdown_tx.subscribe();
        self.tasks
            .spawn(async move { (session_id, engine.run(rx, shutdown).await) });
        self.sessions.insert(session_id, tx);
        self.summary.sessions_started += 1;
        debug!(session_id, "Session task spawned");
    }

    /// A session stopped taking records. A connect failure ends the whole
    /// replay; otherwise the record is dropped.
    async fn session_gone(&mut self, session_id: i64) -> Result<()> {
        while let Some(joined) = self.tasks.join_next().await {
            if self.collect(joined)? == Some(session_id) {
                warn!(session_id, "Session ended before taking record, record dropped");
                return Ok(());
            }
        }
        Ok(())
    }

    /// Folds a finished session into the summary and returns its id.
    fn collect(&mut self, joined: std::result::Result<SessionOutcome, JoinError>) -> Result<Option<i64>> {
        match joined {
            Ok((session_id, Ok(session))) => {
                self.summary.absorb(&session);
                Ok(Some(session_id))
            }
            Ok((session_id, Err(e))) => {
                error!(session_id, error = %e, "Session failed");
                self.abort();
                Err(e)
            }
            Err(e) if e.is_cancelled() => Ok(None),
            Err(e) => {
                self.abort();
                Err(ReplayError::Task(e.to_string()))
            }
        }
    }

    fn stop(&mut self) {
        info!("Shutdown requested, stopping replay");
        self.shutdown_tx.send_replace(true);
    }

    fn abort(&mut self) {
        self.shutdown_tx.send_replace(true);
        self.sessions.clear();
        self.waiting.clear();
        self.tasks.abort_all();
    }
}

async fn acquire(admission: Option<Arc<Semaphore>>) -> Result<OwnedSemaphorePermit> {
    match admission {
        Some(admission) => admission
            .acquire_owned()
            .await
            .map_err(|e| ReplayError::Task(e.to_string())),
        None => std::future::pending().await,
    }
}
