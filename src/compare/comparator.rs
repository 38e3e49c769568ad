use std::collections::BTreeMap;
use tracing::debug;

use sql_replay_shared::ExecResult;

use super::diff::{FieldDiff, Mismatch};
use crate::protocol::StatementShape;

/// Compares the results two targets produced for the same statement.
/// Returns the first divergence, or `None` when they are equivalent.
///
/// Unless the statement orders its output explicitly, both result sets are
/// sorted by every column before the row data is compared. Sorting by all
/// columns can hide a wrong ORDER BY on a partial key; that is accepted.
pub fn compare_results(
    shape: &StatementShape,
    primary: Option<ExecResult>,
    secondary: Option<ExecResult>,
) -> Option<Mismatch> {
    let (r1, r2) = match (primary, secondary) {
        (None, None) => return None,
        (Some(r1), Some(r2)) => (r1, r2),
        (r1, r2) => {
            return Some(Mismatch::MissingResult {
                primary: r1.is_some(),
                secondary: r2.is_some(),
            })
        }
    };

    if r1.insert_id != r2.insert_id {
        return Some(Mismatch::InsertId {
            primary: r1.insert_id,
            secondary: r2.insert_id,
        });
    }
    if r1.affected_rows != r2.affected_rows {
        return Some(Mismatch::AffectedRows {
            primary: r1.affected_rows,
            secondary: r2.affected_rows,
        });
    }

    let (mut rs1, mut rs2) = match (r1.resultset, r2.resultset) {
        (None, None) => return None,
        (Some(rs1), Some(rs2)) => (rs1, rs2),
        (rs1, rs2) => {
            return Some(Mismatch::MissingResultSet {
                primary: rs1.is_some(),
                secondary: rs2.is_some(),
            })
        }
    };

    if rs1.fields != rs2.fields {
        if rs1.fields.len() != rs2.fields.len() {
            return Some(Mismatch::FieldCount {
                primary: rs1.fields.len(),
                secondary: rs2.fields.len(),
            });
        }
        let diffs = rs1
            .fields
            .iter()
            .zip(&rs2.fields)
            .enumerate()
            .flat_map(|(idx, (f1, f2))| FieldDiff::between(idx, f1, f2))
            .collect();
        return Some(Mismatch::Fields { diffs });
    }

    if rs1.field_names != rs2.field_names {
        return Some(Mismatch::FieldNames {
            primary: name_listing(&rs1.field_names),
            secondary: name_listing(&rs2.field_names),
        });
    }

    if !shape.ordered {
        rs1.sort_by_all_columns();
        rs2.sort_by_all_columns();
    }

    if rs1.values != rs2.values {
        let first_row = first_difference(&rs1.values, &rs2.values);
        return Some(Mismatch::Values {
            first_row,
            primary: rs1.values,
            secondary: rs2.values,
        });
    }
    if rs1.row_datas != rs2.row_datas {
        return Some(Mismatch::RowData {
            first_row: first_difference(&rs1.row_datas, &rs2.row_datas),
            primary_rows: rs1.row_datas.len(),
            secondary_rows: rs2.row_datas.len(),
        });
    }

    None
}

/// `true` when both results are equivalent for `shape`. The divergence, if
/// any, is logged.
pub fn equivalent(shape: &StatementShape, primary: Option<ExecResult>, secondary: Option<ExecResult>) -> bool {
    match compare_results(shape, primary, secondary) {
        Some(mismatch) => {
            debug!(mismatch = %mismatch, "Results not equal");
            false
        }
        None => true,
    }
}

fn name_listing(names: &BTreeMap<String, usize>) -> Vec<String> {
    names.iter().map(|(name, idx)| format!("{}={}", name, idx)).collect()
}

fn first_difference<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .unwrap_or_else(|| a.len().min(b.len()))
}
