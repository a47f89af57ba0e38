//! Relational database access for lambda functions.
//!
//! A [`Connection`] executes single statements and all-or-nothing
//! transactions against either a lazily created pool or a single lazily
//! created connection. [`Mysql`] and [`Postgres`] are the two components
//! which handlers resolve, each configured from its own environment variables.
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

mod config;
mod connection;
mod driver;
mod services;

pub use config::{
    ConfigError, DatabaseConfig, Dialect, Environment, MysqlArgs, PoolTeardown, PostgresArgs,
};
pub use connection::{Mode, SqlConnection};
pub use services::{Mysql, Postgres};

/// Marker message of every committed transaction.
pub const TRANSACTION_SUCCESS_MESSAGE: &str = "Succesfully executed all queries in transaction!";

/// Row is a single result row, keyed by column name in SELECT order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Scalar is a positional input of a Query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("NULL"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(n) => write!(f, "{n}"),
            Scalar::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}
impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value.into())
    }
}
impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}
impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}
impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}
impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}
impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Null)
    }
}

/// Query is a statement with its positional inputs.
/// Placeholders follow the dialect of the database (`?` or `$1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub statement: String,
    #[serde(default)]
    pub inputs: Vec<Scalar>,
}

impl Query {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            inputs: Vec::new(),
        }
    }

    pub fn with_inputs<I, S>(statement: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self {
            statement: statement.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
        }
    }
}

/// QueryResult holds the rows of an executed statement.
///
/// Rows are empty for statements which don't produce them (DDL or DML),
/// and `metadata` then carries execution info such as `rowsAffected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult<T = Row> {
    pub rows: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl QueryResult {
    /// Decode rows into a typed representation.
    pub fn decode<T>(self) -> Result<QueryResult<T>, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let rows = self
            .rows
            .into_iter()
            .map(|row| serde_json::from_value(serde_json::Value::Object(row)))
            .collect::<Result<Vec<T>, _>>()?;

        Ok(QueryResult {
            rows,
            metadata: self.metadata,
        })
    }
}

/// TransactionResult is returned by a committed transaction.
/// Failed transactions are always reported as an `Error::Transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub message: String,
}

impl TransactionResult {
    pub fn success() -> Self {
        Self {
            message: TRANSACTION_SUCCESS_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("query failed")]
    Query(#[source] sqlx::Error),
    #[error("transaction failed and was rolled back")]
    Transaction(#[source] sqlx::Error),
    #[error("failed to decode query rows")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    // Re-classify a failure to establish a connection as a transaction failure.
    fn into_transaction(self) -> Self {
        match self {
            Error::Query(err) => Error::Transaction(err),
            other => other,
        }
    }
}

/// Connection is the capability set of a relational database component.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Execute a single statement.
    async fn execute(&self, query: &Query) -> Result<QueryResult, Error>;

    /// Execute `queries` in order within one transaction, which is
    /// committed if all succeed and is otherwise rolled back.
    async fn execute_transaction(&self, queries: &[Query]) -> Result<TransactionResult, Error>;

    /// Release resources held by this Connection.
    /// It's a no-op if the Connection was never used.
    async fn end(&self) -> Result<(), Error>;
}
