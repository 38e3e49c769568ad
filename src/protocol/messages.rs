use super::types::QueryType;

/// Classifies a statement by its first keyword.
pub fn detect_query_type(query: &str) -> QueryType {
    let query_lower = query.trim().to_lowercase();
    let first_word = query_lower
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|w| !w.is_empty())
        .unwrap_or("");

    match first_word {
        "select" | "with" => QueryType::Select,
        "insert" | "replace" => QueryType::Insert,
        "update" => QueryType::Update,
        "delete" => QueryType::Delete,
        "create" => QueryType::Create,
        "drop" | "truncate" => QueryType::Drop,
        "alter" | "rename" => QueryType::Alter,
        "begin" | "start" | "commit" | "rollback" | "savepoint" => QueryType::Transaction,
        "explain" | "analyze" | "describe" | "desc" => QueryType::Explain,
        "vacuum" | "reindex" | "optimize" | "repair" | "flush" => QueryType::Maintenance,
        "set" | "show" | "reset" | "use" => QueryType::Session,
        _ => QueryType::Other(first_word.to_string()),
    }
}

/// Statements touching these substrings are expected to diverge between
/// targets (heartbeats, replication bookkeeping).
pub fn is_volatile<S: AsRef<str>>(statement: &str, patterns: &[S]) -> bool {
    patterns
        .iter()
        .any(|p| !p.as_ref().is_empty() && statement.contains(p.as_ref()))
}
