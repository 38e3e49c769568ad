mod logger;
mod report;

pub use logger::{LogWriter, ReplayLogEntry, ReplayStatus};
pub use report::ReplayReport;
