use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Transaction,
    Explain,
    Maintenance, // VACUUM, OPTIMIZE, etc.
    Session,     // SET, SHOW, USE, etc.
    Other(String),
}

impl QueryType {
    pub fn as_str(&self) -> &str {
        match self {
            QueryType::Select => "select",
            QueryType::Insert => "insert",
            QueryType::Update => "update",
            QueryType::Delete => "delete",
            QueryType::Create => "create",
            QueryType::Drop => "drop",
            QueryType::Alter => "alter",
            QueryType::Transaction => "transaction",
            QueryType::Explain => "explain",
            QueryType::Maintenance => "maintenance",
            QueryType::Session => "session",
            QueryType::Other(word) => word,
        }
    }
}

/// What the comparator needs to know about a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementShape {
    pub query_type: QueryType,
    /// The statement carries an explicit ORDER BY at its top level.
    pub ordered: bool,
}

impl StatementShape {
    pub fn select(ordered: bool) -> Self {
        Self {
            query_type: QueryType::Select,
            ordered,
        }
    }

    pub fn is_read(&self) -> bool {
        self.query_type == QueryType::Select
    }
}
