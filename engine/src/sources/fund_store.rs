//! Read-only access to the structured fund database
//!
//! Executes generated SQL against the N-PORT SQLite corpus and returns rows
//! as JSON objects keyed by column name. The connection is opened read-only
//! so a query that slips past the generator's guard still cannot write.

use super::SourceError;
use futures::TryStreamExt;
use sdk::errors::EngineError;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Row, ValueRef};
use std::str::FromStr;
use tracing::{debug, info};

pub type JsonRow = Map<String, Value>;

/// Connection pool over the fund corpus
#[derive(Clone)]
pub struct FundStore {
    pool: SqlitePool,
}

impl FundStore {
    /// Open the database at `url` (e.g. `sqlite://nport_funds.db?mode=ro`)
    pub async fn connect(url: &str) -> Result<Self, EngineError> {
        info!("Opening fund database");
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| EngineError::Database(e.to_string()))?
            .read_only(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| EngineError::Database(e.to_string()))?;

        debug!("Fund database connection established");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run a query and return at most `limit` rows
    pub async fn query(&self, sql: &str, limit: usize) -> Result<Vec<JsonRow>, SourceError> {
        let mut rows = sqlx::query(sql).fetch(&self.pool);
        let mut out = Vec::new();

        while out.len() < limit {
            match rows
                .try_next()
                .await
                .map_err(|e| SourceError::Upstream(e.to_string()))?
            {
                Some(row) => out.push(row_to_json(&row)),
                None => break,
            }
        }

        Ok(out)
    }
}

/// Convert a row to JSON, trying integer, real and text decodings in turn
fn row_to_json(row: &SqliteRow) -> JsonRow {
    let mut object = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let is_null = row
            .try_get_raw(idx)
            .map(|value| value.is_null())
            .unwrap_or(true);

        let value = if is_null {
            Value::Null
        } else if let Ok(v) = row.try_get::<i64, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<f64, _>(idx) {
            serde_json::Number::from_f64(v)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<String, _>(idx) {
            Value::String(v)
        } else {
            Value::Null
        };

        object.insert(column.name().to_string(), value);
    }
    object
}
