//! Database capability used by the replay engine.
//!
//! The engine never touches a wire protocol directly: it asks a
//! [`Connector`] for connections and runs statements through
//! [`Connection`]. The PostgreSQL implementation lives in [`postgres`].

mod postgres;

use async_trait::async_trait;

use sql_replay_shared::{ExecResult, Result};

use crate::config::TargetConfig;

pub use postgres::{PgConnection, PgConnector};

#[async_trait]
pub trait Connection: Send + Sync {
    async fn execute(&mut self, sql: &str) -> Result<ExecResult>;

    async fn set_charset(&mut self, charset: &str) -> Result<()>;

    /// Closing twice is a no-op.
    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &TargetConfig) -> Result<Box<dyn Connection>>;
}
