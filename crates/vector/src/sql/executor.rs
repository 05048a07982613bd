use async_trait::async_trait;
use std::collections::HashMap;
use vecroute_common::{Result, VecRouteError};

use crate::types::Metadata;

/// Bind parameter or column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Vector(Vec<f32>),
    Json(serde_json::Value),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<Vec<f32>> for SqlValue {
    fn from(value: Vec<f32>) -> Self {
        SqlValue::Vector(value)
    }
}

/// Result row keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    columns: HashMap<String, SqlValue>,
}

impl SqlRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: SqlValue) -> Self {
        self.columns.insert(column.into(), value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    fn require(&self, column: &str) -> Result<&SqlValue> {
        self.get(column)
            .ok_or_else(|| VecRouteError::sql(format!("Missing column '{}' in result row", column)))
    }

    pub fn get_text(&self, column: &str) -> Result<String> {
        match self.require(column)? {
            SqlValue::Text(value) => Ok(value.clone()),
            SqlValue::Int(value) => Ok(value.to_string()),
            other => Err(type_error(column, "text", other)),
        }
    }

    pub fn get_i64(&self, column: &str) -> Result<i64> {
        match self.require(column)? {
            SqlValue::Int(value) => Ok(*value),
            other => Err(type_error(column, "integer", other)),
        }
    }

    pub fn get_f64(&self, column: &str) -> Result<f64> {
        match self.require(column)? {
            SqlValue::Float(value) => Ok(*value),
            SqlValue::Int(value) => Ok(*value as f64),
            other => Err(type_error(column, "float", other)),
        }
    }

    pub fn get_vector(&self, column: &str) -> Result<Vec<f32>> {
        match self.require(column)? {
            SqlValue::Vector(value) => Ok(value.clone()),
            other => Err(type_error(column, "vector", other)),
        }
    }

    /// Decode a JSON object column into string metadata
    ///
    /// NULL or a missing column yields an empty map; non-string values are
    /// kept in their JSON text form.
    pub fn get_metadata(&self, column: &str) -> Result<Metadata> {
        match self.get(column) {
            None | Some(SqlValue::Null) => Ok(Metadata::new()),
            Some(SqlValue::Json(serde_json::Value::Object(map))) => Ok(map
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| {
                    let text = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), text)
                })
                .collect()),
            Some(other) => Err(type_error(column, "json object", other)),
        }
    }
}

fn type_error(column: &str, expected: &str, got: &SqlValue) -> VecRouteError {
    VecRouteError::sql(format!(
        "Column '{}' expected {}, got {:?}",
        column, expected, got
    ))
}

/// Parameterized statement execution against a relational engine
///
/// Placeholders are positional (`$1`, `$2`, ...). Implementations bind
/// [`SqlValue::Vector`] as the engine's vector type and
/// [`SqlValue::Json`] as JSON/JSONB.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a statement that returns rows
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>>;

    /// Run a statement, returning the number of affected rows
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;
}
