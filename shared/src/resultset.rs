use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A decoded column value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::UInt(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Bytes(_) => 4,
        }
    }

    /// Total order used when normalizing row order: nulls first, then
    /// booleans, numbers, text and bytes. Numbers compare by value across
    /// integer and float kinds.
    pub fn natural_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::UInt(a), Value::UInt(b)) => a.cmp(b),
            (Value::Int(a), Value::UInt(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (Value::UInt(a), Value::Int(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Float(a), Value::UInt(b)) => a.total_cmp(&(*b as f64)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::UInt(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

// Floats compare by bit-level total order so NaN equals itself and a
// result set is always equal to its own copy.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b) == Ordering::Equal,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{:?}", v),
            Value::Bytes(v) => write!(f, "0x{}", v.iter().map(|b| format!("{:02x}", b)).collect::<String>()),
        }
    }
}

/// Column metadata as reported by the server. Backends fill in what their
/// protocol carries and leave the rest at the default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub org_name: String,
    pub table: String,
    pub org_table: String,
    pub schema: String,
    pub charset: u16,
    pub column_type: String,
    pub column_length: u32,
    pub flags: u16,
    pub decimals: u8,
    pub default_value: Option<String>,
}

impl Field {
    pub fn named(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            ..Default::default()
        }
    }
}

/// Raw wire encoding of one row: per column a big-endian `i32` length
/// (`-1` for NULL) followed by the bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowData(pub Vec<u8>);

impl RowData {
    pub fn encode<'a, I>(columns: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a [u8]>>,
    {
        let mut buf = Vec::new();
        for column in columns {
            match column {
                Some(bytes) => {
                    buf.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                    buf.extend_from_slice(bytes);
                }
                None => buf.extend_from_slice(&(-1i32).to_be_bytes()),
            }
        }
        RowData(buf)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub fields: Vec<Field>,
    /// Column name to index; a repeated name keeps its last position.
    pub field_names: BTreeMap<String, usize>,
    pub values: Vec<Vec<Value>>,
    pub row_datas: Vec<RowData>,
}

impl ResultSet {
    pub fn new(fields: Vec<Field>) -> Self {
        let field_names = fields
            .iter()
            .enumerate()
            .map(|(idx, f)| (f.name.clone(), idx))
            .collect();
        Self {
            fields,
            field_names,
            values: Vec::new(),
            row_datas: Vec::new(),
        }
    }

    pub fn push_row(&mut self, values: Vec<Value>, row_data: RowData) {
        self.values.push(values);
        self.row_datas.push(row_data);
    }

    /// Sorts rows ascending by every column in declaration order. Decoded
    /// values and raw encodings move together.
    pub fn sort_by_all_columns(&mut self) {
        let mut rows: Vec<(Vec<Value>, RowData)> = std::mem::take(&mut self.values)
            .into_iter()
            .zip(std::mem::take(&mut self.row_datas))
            .collect();

        rows.sort_by(|(a, _), (b, _)| {
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| x.natural_cmp(y))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or_else(|| a.len().cmp(&b.len()))
        });

        for (values, row_data) in rows {
            self.push_row(values, row_data);
        }
    }
}

/// Outcome of one successfully executed statement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecResult {
    pub insert_id: u64,
    pub affected_rows: u64,
    pub resultset: Option<ResultSet>,
}

impl ExecResult {
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Default::default()
        }
    }

    pub fn with_rows(resultset: ResultSet) -> Self {
        Self {
            resultset: Some(resultset),
            ..Default::default()
        }
    }
}
