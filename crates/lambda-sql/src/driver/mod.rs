//! Execution of statements, and mapping of their rows into JSON, for each
//! database which a SqlConnection may speak to.
//!
//! Each dialect runs on its native sqlx driver so that rows can be decoded
//! by the declared type of each column.
use crate::{Query, QueryResult, Row};
use futures::future::BoxFuture;
use serde_json::Value;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

mod mysql;
mod postgres;
mod sqlite;

/// Driver runs a Query on a connection of its database.
pub(crate) trait Driver: sqlx::Database {
    fn run<'c>(
        conn: &'c mut Self::Connection,
        query: &'c Query,
    ) -> BoxFuture<'c, Result<QueryResult, sqlx::Error>>;
}

// Rows are returned as-is. Statements which produce no rows instead
// report their execution metadata.
fn collect(rows: Vec<Row>, rows_affected: u64, last_insert_id: Option<i64>) -> QueryResult {
    let metadata = if rows.is_empty() {
        Some(serde_json::json!({
            "rowsAffected": rows_affected,
            "lastInsertId": last_insert_id,
        }))
    } else {
        None
    };
    QueryResult { rows, metadata }
}

fn text<T: ToString>(value: Option<T>) -> Value {
    value
        .map(|value| Value::String(value.to_string()))
        .unwrap_or_default()
}

fn timestamp(value: Option<DateTime<Utc>>) -> Value {
    value
        .map(|value| Value::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
        .unwrap_or_default()
}

fn datetime(value: Option<NaiveDateTime>) -> Value {
    value
        .map(|value| Value::String(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
        .unwrap_or_default()
}

// Raw values which aren't UTF-8 are rendered as an array of bytes.
fn raw(value: Option<Vec<u8>>) -> Value {
    match value.map(String::from_utf8) {
        None => Value::Null,
        Some(Ok(text)) => Value::String(text),
        Some(Err(err)) => Value::from(err.into_bytes()),
    }
}
