use serde::Serialize;
use std::fmt;

use sql_replay_shared::{Field, Value};

/// One differing attribute of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub index: usize,
    pub name: String,
    pub attribute: &'static str,
    pub primary: String,
    pub secondary: String,
}

impl FieldDiff {
    /// Every attribute in which `primary` and `secondary` differ.
    pub fn between(index: usize, primary: &Field, secondary: &Field) -> Vec<FieldDiff> {
        let mut diffs = Vec::new();
        let mut check = |attribute: &'static str, a: String, b: String| {
            if a != b {
                diffs.push(FieldDiff {
                    index,
                    name: primary.name.clone(),
                    attribute,
                    primary: a,
                    secondary: b,
                });
            }
        };

        check("schema", primary.schema.clone(), secondary.schema.clone());
        check("table", primary.table.clone(), secondary.table.clone());
        check("org_table", primary.org_table.clone(), secondary.org_table.clone());
        check("name", primary.name.clone(), secondary.name.clone());
        check("org_name", primary.org_name.clone(), secondary.org_name.clone());
        check("charset", primary.charset.to_string(), secondary.charset.to_string());
        check("column_length", primary.column_length.to_string(), secondary.column_length.to_string());
        check("column_type", primary.column_type.clone(), secondary.column_type.clone());
        check("flags", primary.flags.to_string(), secondary.flags.to_string());
        check("decimals", primary.decimals.to_string(), secondary.decimals.to_string());
        check(
            "default_value",
            format!("{:?}", primary.default_value),
            format!("{:?}", secondary.default_value),
        );

        diffs
    }
}

/// First point at which two results for the same statement diverge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    MissingResult { primary: bool, secondary: bool },
    InsertId { primary: u64, secondary: u64 },
    AffectedRows { primary: u64, secondary: u64 },
    MissingResultSet { primary: bool, secondary: bool },
    FieldCount { primary: usize, secondary: usize },
    Fields { diffs: Vec<FieldDiff> },
    FieldNames { primary: Vec<String>, secondary: Vec<String> },
    Values {
        first_row: usize,
        primary: Vec<Vec<Value>>,
        secondary: Vec<Vec<Value>>,
    },
    RowData {
        first_row: usize,
        primary_rows: usize,
        secondary_rows: usize,
    },
}

fn present(flag: bool) -> &'static str {
    if flag {
        "present"
    } else {
        "absent"
    }
}

fn render_row(row: Option<&Vec<Value>>) -> String {
    match row {
        Some(values) => format!(
            "({})",
            values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
        ),
        None => "<none>".to_string(),
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::MissingResult { primary, secondary } => write!(
                f,
                "result {} on primary, {} on secondary",
                present(*primary),
                present(*secondary)
            ),
            Mismatch::InsertId { primary, secondary } => {
                write!(f, "insert id differs: {} vs {}", primary, secondary)
            }
            Mismatch::AffectedRows { primary, secondary } => {
                write!(f, "affected rows differ: {} vs {}", primary, secondary)
            }
            Mismatch::MissingResultSet { primary, secondary } => write!(
                f,
                "result set {} on primary, {} on secondary",
                present(*primary),
                present(*secondary)
            ),
            Mismatch::FieldCount { primary, secondary } => {
                write!(f, "number of fields differs: {} vs {}", primary, secondary)
            }
            Mismatch::Fields { diffs } => {
                write!(f, "field metadata differs:")?;
                for d in diffs {
                    write!(
                        f,
                        " [#{} {}.{}: {:?} vs {:?}]",
                        d.index, d.name, d.attribute, d.primary, d.secondary
                    )?;
                }
                Ok(())
            }
            Mismatch::FieldNames { primary, secondary } => {
                write!(f, "field names differ: {:?} vs {:?}", primary, secondary)
            }
            Mismatch::Values {
                first_row,
                primary,
                secondary,
            } => write!(
                f,
                "values differ at row {} ({} vs {} rows): {} vs {}",
                first_row,
                primary.len(),
                secondary.len(),
                render_row(primary.get(*first_row)),
                render_row(secondary.get(*first_row))
            ),
            Mismatch::RowData {
                first_row,
                primary_rows,
                secondary_rows,
            } => write!(
                f,
                "raw row data differs at row {} ({} vs {} rows)",
                first_row, primary_rows, secondary_rows
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_diff_lists_every_attribute() {
        let a = Field {
            charset: 33,
            column_length: 11,
            ..Field::named("id", "int4")
        };
        let b = Field {
            charset: 45,
            column_length: 20,
            ..Field::named("id", "int8")
        };

        let diffs = FieldDiff::between(0, &a, &b);
        let attributes: Vec<_> = diffs.iter().map(|d| d.attribute).collect();
        assert_eq!(attributes, vec!["charset", "column_length", "column_type"]);
        assert_eq!(diffs[2].primary, "int4");
        assert_eq!(diffs[2].secondary, "int8");
    }

    #[test]
    fn test_display_and_json() {
        let mismatch = Mismatch::Values {
            first_row: 0,
            primary: vec![vec![Value::Int(1), Value::Text("a".into())]],
            secondary: vec![vec![Value::Int(2), Value::Null]],
        };
        assert_eq!(
            mismatch.to_string(),
            "values differ at row 0 (1 vs 1 rows): (1, \"a\") vs (2, NULL)"
        );

        let json = serde_json::to_value(&Mismatch::AffectedRows { primary: 1, secondary: 2 }).unwrap();
        assert_eq!(json["kind"], "affected_rows");
        assert_eq!(json["secondary"], 2);
    }
}
