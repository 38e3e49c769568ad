//! In-memory connector for exercising the replay engine without a database.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use sql_replay_shared::{ExecResult, ReplayError, Result};

use super::{ReplayContext, ReplayOptions};
use crate::config::{TargetConfig, Targets};
use crate::database::{Connection, Connector};

pub(crate) const PRIMARY: &str = "primary:5432";
pub(crate) const SECONDARY: &str = "secondary:5432";

type Responder = dyn Fn(&str, &str) -> Result<ExecResult> + Send + Sync;

#[derive(Debug, Clone)]
pub(crate) struct Executed {
    pub addr: String,
    pub sql: String,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub(crate) struct Closed {
    pub addr: String,
    pub at: Instant,
}

#[derive(Default)]
struct StubLog {
    executed: Mutex<Vec<Executed>>,
    closed: Mutex<Vec<Closed>>,
    connects: AtomicUsize,
}

/// Answers every statement through a closure of `(addr, sql)` and records
/// what was run where. Clones share the record.
#[derive(Clone)]
pub(crate) struct StubConnector {
    responder: Arc<Responder>,
    latency: Duration,
    fail_connect: Option<String>,
    fail_charset: bool,
    log: Arc<StubLog>,
}

impl StubConnector {
    pub fn new() -> Self {
        Self {
            responder: Arc::new(|_, _| Ok(ExecResult::affected(0))),
            latency: Duration::ZERO,
            fail_connect: None,
            fail_charset: false,
            log: Arc::new(StubLog::default()),
        }
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str, &str) -> Result<ExecResult> + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn refuse(mut self, addr: &str) -> Self {
        self.fail_connect = Some(addr.to_string());
        self
    }

    pub fn fail_charset(mut self) -> Self {
        self.fail_charset = true;
        self
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.log.executed.lock().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.executed.lock().iter().map(|e| e.sql.clone()).collect()
    }

    pub fn closed(&self) -> usize {
        self.log.closed.lock().len()
    }

    pub fn closed_at(&self) -> Vec<Closed> {
        self.log.closed.lock().clone()
    }

    pub fn connects(&self) -> usize {
        self.log.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for StubConnector {
    async fn connect(&self, target: &TargetConfig) -> Result<Box<dyn Connection>> {
        if self.fail_connect.as_deref() == Some(target.addr.as_str()) {
            return Err(ReplayError::Connect {
                addr: target.addr.clone(),
                reason: "connection refused".into(),
            });
        }
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubConnection {
            addr: target.addr.clone(),
            responder: Arc::clone(&self.responder),
            latency: self.latency,
            fail_charset: self.fail_charset,
            log: Arc::clone(&self.log),
            open: true,
        }))
    }
}

struct StubConnection {
    addr: String,
    responder: Arc<Responder>,
    latency: Duration,
    fail_charset: bool,
    log: Arc<StubLog>,
    open: bool,
}

#[async_trait]
impl Connection for StubConnection {
    async fn execute(&mut self, sql: &str) -> Result<ExecResult> {
        if !self.open {
            return Err(ReplayError::Exec("connection closed".into()));
        }
        self.log.executed.lock().push(Executed {
            addr: self.addr.clone(),
            sql: sql.to_string(),
            at: Instant::now(),
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.responder)(&self.addr, sql)
    }

    async fn set_charset(&mut self, charset: &str) -> Result<()> {
        if self.fail_charset {
            return Err(ReplayError::Exec(format!("invalid value for parameter \"client_encoding\": \"{}\"", charset)));
        }
        Ok(())
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.log.closed.lock().push(Closed {
                addr: self.addr.clone(),
                at: Instant::now(),
            });
        }
    }
}

pub(crate) fn target(addr: &str) -> TargetConfig {
    TargetConfig {
        addr: addr.to_string(),
        user: "replay".into(),
        password: "secret".into(),
        db_name: "app".into(),
        charset: None,
    }
}

pub(crate) fn stub_context(connector: &StubConnector, comparison: bool, options: ReplayOptions) -> ReplayContext {
    let targets = if comparison {
        Targets::comparison(target(PRIMARY), target(SECONDARY))
    } else {
        Targets::single(target(PRIMARY))
    };
    ReplayContext::new(Arc::new(connector.clone()), targets, options)
}
