use super::{collect, datetime, raw, text, timestamp, Driver};
use crate::{Query, QueryResult, Row, Scalar};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::{future::BoxFuture, FutureExt, TryStreamExt};
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlConnection, MySqlRow};
use sqlx::types::{BigDecimal, JsonValue};
use sqlx::{Column, Row as _, TypeInfo};

fn bind(query: &Query) -> sqlx::query::Query<'_, sqlx::MySql, MySqlArguments> {
    query
        .inputs
        .iter()
        .fold(sqlx::query(&query.statement), |q, input| match input {
            Scalar::Null => q.bind(None::<&str>),
            Scalar::Bool(b) => q.bind(*b),
            Scalar::Int(i) => q.bind(*i),
            Scalar::Float(n) => q.bind(*n),
            Scalar::Text(s) => q.bind(s.as_str()),
        })
}

impl Driver for sqlx::MySql {
    fn run<'c>(
        conn: &'c mut MySqlConnection,
        query: &'c Query,
    ) -> BoxFuture<'c, Result<QueryResult, sqlx::Error>> {
        async move {
            let mut rows = Vec::new();
            let (mut rows_affected, mut last_insert_id) = (0, None);

            let mut stream = bind(query).fetch_many(conn);
            while let Some(step) = stream.try_next().await? {
                match step {
                    sqlx::Either::Left(done) => {
                        rows_affected += done.rows_affected();
                        last_insert_id = i64::try_from(done.last_insert_id()).ok();
                    }
                    sqlx::Either::Right(row) => rows.push(to_json(&row)?),
                }
            }
            Ok(collect(rows, rows_affected, last_insert_id))
        }
        .boxed()
    }
}

fn to_json(row: &MySqlRow) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();

    for column in row.columns() {
        let index = column.ordinal();

        let value = match column.type_info().name() {
            // TINYINT(1) columns are reported as BOOLEAN, but read as numbers.
            "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR"
            | "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED"
            | "INT UNSIGNED" | "BIGINT UNSIGNED" => integer(row, index)?,
            "FLOAT" => row.try_get::<Option<f32>, _>(index)?.into(),
            "DOUBLE" => row.try_get::<Option<f64>, _>(index)?.into(),
            // Rendered as text, which preserves their precision.
            "DECIMAL" => text(row.try_get::<Option<BigDecimal>, _>(index)?),
            "TIMESTAMP" => timestamp(row.try_get::<Option<DateTime<Utc>>, _>(index)?),
            "DATETIME" => datetime(row.try_get::<Option<NaiveDateTime>, _>(index)?),
            "DATE" => text(row.try_get::<Option<NaiveDate>, _>(index)?),
            "TIME" => text(row.try_get::<Option<NaiveTime>, _>(index)?),
            "JSON" => row
                .try_get::<Option<JsonValue>, _>(index)?
                .unwrap_or_default(),
            // Strings, enums, sets, blobs and bit fields.
            _ => raw(row.try_get_unchecked::<Option<Vec<u8>>, _>(index)?),
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

// Signedness is a column flag, and each integer type checks it on decode.
fn integer(row: &MySqlRow, index: usize) -> Result<Value, sqlx::Error> {
    match row.try_get::<Option<i64>, _>(index) {
        Ok(value) => Ok(value.into()),
        Err(_) => Ok(row.try_get::<Option<u64>, _>(index)?.into()),
    }
}
