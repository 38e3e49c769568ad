mod reader;

pub use reader::{parse_record, TraceReader};
