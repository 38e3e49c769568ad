use async_trait::async_trait;
use std::time::Duration;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{Client, Column, NoTls};
use tracing::{debug, error};

use sql_replay_shared::{ExecResult, Field, ReplayError, ResultSet, Result, RowData, Value};

use super::{Connection, Connector};
use crate::config::TargetConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens connections with `tokio-postgres`.
#[derive(Debug, Default, Clone)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, target: &TargetConfig) -> Result<Box<dyn Connection>> {
        let (host, port) = target.host_port()?;

        let mut config = tokio_postgres::Config::new();
        config
            .host(&host)
            .port(port)
            .user(&target.user)
            .dbname(&target.db_name)
            .application_name("sql-replay")
            .connect_timeout(CONNECT_TIMEOUT);
        if !target.password.is_empty() {
            config.password(&target.password);
        }

        let (client, connection) = config.connect(NoTls).await.map_err(|e| ReplayError::Connect {
            addr: target.addr.clone(),
            reason: e.to_string(),
        })?;

        let addr = target.addr.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(addr = %addr, error = %e, "PostgreSQL connection error");
            }
        });

        debug!(addr = %target.addr, database = %target.db_name, "Connected to target");

        Ok(Box::new(PgConnection {
            client: Some(client),
            addr: target.addr.clone(),
        }))
    }
}

pub struct PgConnection {
    client: Option<Client>,
    addr: String,
}

#[async_trait]
impl Connection for PgConnection {
    async fn execute(&mut self, sql: &str) -> Result<ExecResult> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ReplayError::Exec(format!("connection to {} is closed", self.addr)))?;

        let statement = client.prepare(sql).await.map_err(exec_error)?;

        if statement.columns().is_empty() {
            let affected = client.execute(&statement, &[]).await.map_err(exec_error)?;
            return Ok(ExecResult::affected(affected));
        }

        let fields = statement.columns().iter().map(field_from_column).collect();
        let mut resultset = ResultSet::new(fields);

        let rows = client.query(&statement, &[]).await.map_err(exec_error)?;
        for row in &rows {
            let mut cells = Vec::with_capacity(row.len());
            for idx in 0..row.len() {
                let cell: Option<RawCell> = row.try_get(idx).map_err(exec_error)?;
                cells.push(cell);
            }

            let values = row
                .columns()
                .iter()
                .zip(&cells)
                .map(|(column, cell)| decode_value(column.type_(), cell.as_ref().map(|c| c.0.as_slice())))
                .collect();
            let row_data = RowData::encode(cells.iter().map(|c| c.as_ref().map(|c| c.0.as_slice())));

            resultset.push_row(values, row_data);
        }

        Ok(ExecResult::with_rows(resultset))
    }

    async fn set_charset(&mut self, charset: &str) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ReplayError::Exec(format!("connection to {} is closed", self.addr)))?;

        let encoding = client_encoding(charset)?;
        client
            .batch_execute(&format!("SET client_encoding TO '{}'", encoding))
            .await
            .map_err(exec_error)?;

        debug!(addr = %self.addr, encoding = %encoding, "Client encoding set");
        Ok(())
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            debug!(addr = %self.addr, "Connection closed");
        }
    }
}

fn exec_error(e: tokio_postgres::Error) -> ReplayError {
    ReplayError::Exec(e.to_string())
}

/// Maps charset names used in traces onto PostgreSQL encodings.
fn client_encoding(charset: &str) -> Result<String> {
    if charset.is_empty() || !charset.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ReplayError::Config(format!("invalid charset '{}'", charset)));
    }
    Ok(match charset.to_ascii_lowercase().as_str() {
        "utf8" | "utf8mb3" | "utf8mb4" | "utf-8" => "UTF8".to_string(),
        "latin1" => "LATIN1".to_string(),
        other => other.to_ascii_uppercase(),
    })
}

fn field_from_column(column: &Column) -> Field {
    let ty = column.type_();
    Field {
        name: column.name().to_string(),
        org_name: column.name().to_string(),
        schema: ty.schema().to_string(),
        column_type: ty.name().to_string(),
        ..Default::default()
    }
}

/// Undecoded column bytes, accepted for every type.
struct RawCell(Vec<u8>);

impl<'a> FromSql<'a> for RawCell {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawCell(raw.to_vec()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// Decodes the binary representation of common scalar types; anything
/// else is kept as bytes.
fn decode_value(ty: &Type, raw: Option<&[u8]>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };

    let decoded = match ty {
        t if *t == Type::BOOL => bool::from_sql(t, raw).map(Value::Bool),
        t if *t == Type::CHAR => i8::from_sql(t, raw).map(|v| Value::Int(v.into())),
        t if *t == Type::INT2 => i16::from_sql(t, raw).map(|v| Value::Int(v.into())),
        t if *t == Type::INT4 => i32::from_sql(t, raw).map(|v| Value::Int(v.into())),
        t if *t == Type::INT8 => i64::from_sql(t, raw).map(Value::Int),
        t if *t == Type::OID => u32::from_sql(t, raw).map(|v| Value::UInt(v.into())),
        t if *t == Type::FLOAT4 => f32::from_sql(t, raw).map(|v| Value::Float(v.into())),
        t if *t == Type::FLOAT8 => f64::from_sql(t, raw).map(Value::Float),
        t if <String as FromSql<'_>>::accepts(t) => String::from_sql(t, raw).map(Value::Text),
        _ => Ok(Value::Bytes(raw.to_vec())),
    };

    decoded.unwrap_or_else(|_| Value::Bytes(raw.to_vec()))
}
