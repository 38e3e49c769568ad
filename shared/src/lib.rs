pub mod error;
pub mod resultset;
pub mod schema;
pub mod stats;
pub mod types;

pub use error::{ReplayError, Result};
pub use resultset::{ExecResult, Field, ResultSet, RowData, Value};
pub use schema::*;
pub use stats::{LatencyStats, LatencySummary};
pub use types::*;
