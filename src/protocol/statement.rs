use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use sql_replay_shared::{ReplayError, Result};

use super::messages::detect_query_type;
use super::types::{QueryType, StatementShape};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SqlDialect {
    #[default]
    Generic,
    Mysql,
    Postgres,
}

impl SqlDialect {
    fn dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Generic => Box::new(GenericDialect {}),
            SqlDialect::Mysql => Box::new(MySqlDialect {}),
            SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
        }
    }
}

/// Parses exactly one statement and reports whether it is a read and
/// whether it orders its output explicitly.
pub fn parse_statement(sql: &str, dialect: SqlDialect) -> Result<StatementShape> {
    let statements = Parser::parse_sql(dialect.dialect().as_ref(), sql)
        .map_err(|e| ReplayError::Parse(e.to_string()))?;

    let statement = match statements.as_slice() {
        [single] => single,
        [] => return Err(ReplayError::Parse("empty statement".into())),
        many => {
            return Err(ReplayError::Parse(format!(
                "expected a single statement, found {}",
                many.len()
            )))
        }
    };

    let shape = match statement {
        Statement::Query(query) => {
            let query_type = match query.body.as_ref() {
                SetExpr::Insert(_) | SetExpr::Update(_) => detect_query_type(sql),
                _ => QueryType::Select,
            };
            StatementShape {
                query_type,
                ordered: !query.order_by.is_empty(),
            }
        }
        _ => StatementShape {
            query_type: match detect_query_type(sql) {
                QueryType::Select => QueryType::Other("select".into()),
                other => other,
            },
            ordered: false,
        },
    };

    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_without_order() {
        let shape = parse_statement("SELECT id, name FROM users WHERE id > 3", SqlDialect::Generic).unwrap();
        assert!(shape.is_read());
        assert!(!shape.ordered);
    }

    #[test]
    fn test_select_with_order() {
        let shape = parse_statement("SELECT id FROM users ORDER BY id DESC;", SqlDialect::Mysql).unwrap();
        assert!(shape.is_read());
        assert!(shape.ordered);
    }

    #[test]
    fn test_order_by_in_subquery_only() {
        let shape = parse_statement(
            "SELECT * FROM (SELECT id FROM users ORDER BY id LIMIT 5) AS t",
            SqlDialect::Postgres,
        )
        .unwrap();
        assert!(!shape.ordered);
    }

    #[test]
    fn test_union_is_read() {
        let shape = parse_statement("SELECT 1 UNION SELECT 2", SqlDialect::Generic).unwrap();
        assert!(shape.is_read());
    }

    #[test]
    fn test_write_statements() {
        let shape = parse_statement("INSERT INTO t (a) VALUES (1)", SqlDialect::Generic).unwrap();
        assert_eq!(shape.query_type, QueryType::Insert);
        assert!(!shape.is_read());

        let shape = parse_statement("UPDATE t SET a = 2 WHERE a = 1", SqlDialect::Generic).unwrap();
        assert_eq!(shape.query_type, QueryType::Update);
    }

    #[test]
    fn test_unparseable() {
        assert!(matches!(
            parse_statement("SELEC broken FROM", SqlDialect::Generic),
            Err(ReplayError::Parse(_))
        ));
        assert!(matches!(parse_statement("", SqlDialect::Generic), Err(ReplayError::Parse(_))));
        assert!(matches!(
            parse_statement("SELECT 1; SELECT 2", SqlDialect::Generic),
            Err(ReplayError::Parse(_))
        ));
    }
}
