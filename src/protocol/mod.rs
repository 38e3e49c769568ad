mod messages;
mod statement;
mod types;

pub use messages::{detect_query_type, is_volatile};
pub use statement::{parse_statement, SqlDialect};
pub use types::{QueryType, StatementShape};
