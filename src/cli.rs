use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::SqlDialect;
use crate::replay::ReplayOptions;

#[derive(Parser, Debug, Clone)]
#[command(author = "Ilya Rozhnev",
          version =  env!("CARGO_PKG_VERSION"),
          about = env!("CARGO_PKG_NAME"),
          long_about = "Replays captured SQL sessions against one database, or two for result comparison"
        )]
pub struct CliArguments {
	/// trace file to replay. Example: './test.dat'
	#[arg(short = 'f', long, default_value = "./test.dat")]
	pub file: PathBuf,
	/// JSON stream of one (replay) or two (compare) targets
	#[arg(short = 'c', long, env = "REPLAY_CONFIG", default_value = "./sql-replay.conf.json")]
	pub config: PathBuf,
	/// use only the first configured target
	#[arg(long)]
	pub single: bool,
	/// SQL dialect used to classify statements for comparison
	#[arg(long, value_enum, default_value_t = SqlDialect::Generic)]
	pub dialect: SqlDialect,
	/// replay as fast as possible, ignoring capture timing
	#[arg(long)]
	pub no_wait: bool,
	/// upper bound on concurrently open sessions
	#[arg(long)]
	pub max_sessions: Option<usize>,
	/// records buffered per session; 0 hands records over one at a time
	#[arg(long, default_value_t = 0)]
	pub queue_depth: usize,
	/// per-statement timeout in milliseconds
	#[arg(long)]
	pub statement_timeout_ms: Option<u64>,
	/// substring marking a statement as volatile (never compared). Repeatable
	#[arg(long = "skip-pattern", default_values_t = [String::from("db_heartbeat"), String::from("slave_master_info")])]
	pub skip_patterns: Vec<String>,
	/// SQLite file receiving one row per replayed statement
	#[arg(long)]
	pub log_db: Option<PathBuf>,
	/// print the final report as JSON
	#[arg(long)]
	pub json: bool,
}

impl CliArguments {
	pub fn replay_options(&self) -> ReplayOptions {
		ReplayOptions {
			dialect: self.dialect,
			reconstruct_timing: !self.no_wait,
			max_sessions: self.max_sessions,
			queue_depth: self.queue_depth,
			statement_timeout: self.statement_timeout_ms.map(Duration::from_millis),
			skip_patterns: self.skip_patterns.clone(),
		}
	}
}
