use super::{collect, raw, Driver};
use crate::{Query, QueryResult, Row, Scalar};
use futures::{future::BoxFuture, FutureExt, TryStreamExt};
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Column, Row as _};

fn bind(query: &Query) -> sqlx::query::Query<'_, sqlx::Sqlite, SqliteArguments<'_>> {
    query
        .inputs
        .iter()
        .fold(sqlx::query(&query.statement), |q, input| match input {
            Scalar::Null => q.bind(None::<i64>),
            Scalar::Bool(b) => q.bind(*b),
            Scalar::Int(i) => q.bind(*i),
            Scalar::Float(n) => q.bind(*n),
            Scalar::Text(s) => q.bind(s.as_str()),
        })
}

impl Driver for sqlx::Sqlite {
    fn run<'c>(
        conn: &'c mut SqliteConnection,
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
                        last_insert_id = Some(done.last_insert_rowid());
                    }
                    sqlx::Either::Right(row) => rows.push(to_json(&row)?),
                }
            }
            Ok(collect(rows, rows_affected, last_insert_id))
        }
        .boxed()
    }
}

fn to_json(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();

    for column in row.columns() {
        out.insert(column.name().to_string(), to_value(row, column.ordinal())?);
    }
    Ok(out)
}

// SQLite types values rather than columns, so attempt each storage
// class in turn. Decoding checks the value's type for compatibility.
fn to_value(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.into());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v.into());
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Ok(v.into());
    }
    Ok(raw(row.try_get::<Option<Vec<u8>>, _>(index)?))
}
