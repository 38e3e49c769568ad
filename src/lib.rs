pub mod cli;
pub mod compare;
pub mod config;
pub mod database;
pub mod monitoring;
pub mod protocol;
pub mod replay;
pub mod trace;

pub use config::{TargetConfig, Targets};
pub use replay::{Dispatcher, ReplayContext, ReplayOptions, ReplaySummary};
pub use sql_replay_shared::{Command, ReplayError, ReplayRecord, Result};
