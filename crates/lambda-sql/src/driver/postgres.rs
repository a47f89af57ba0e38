use super::{collect, datetime, raw, text, timestamp, Driver};
use crate::{Query, QueryResult, Row, Scalar};
use futures::{future::BoxFuture, FutureExt, TryStreamExt};
use serde_json::Value;
use sqlx::encode::IsNull;
use sqlx::postgres::{types::Oid, PgArgumentBuffer, PgArguments, PgConnection, PgRow, PgTypeInfo};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{BigDecimal, JsonValue, Uuid};
use sqlx::{Column, Row as _, TypeInfo};

/// A NULL input whose type is left for the server to infer from its use.
struct UntypedNull;

impl sqlx::Type<sqlx::Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        // OID zero declares the parameter type as unspecified.
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> IsNull {
        IsNull::Yes
    }
}

fn bind(query: &Query) -> sqlx::query::Query<'_, sqlx::Postgres, PgArguments> {
    query
        .inputs
        .iter()
        .fold(sqlx::query(&query.statement), |q, input| match input {
            Scalar::Null => q.bind(UntypedNull),
            Scalar::Bool(b) => q.bind(*b),
            Scalar::Int(i) => q.bind(*i),
            Scalar::Float(n) => q.bind(*n),
            Scalar::Text(s) => q.bind(s.as_str()),
        })
}

impl Driver for sqlx::Postgres {
    fn run<'c>(
        conn: &'c mut PgConnection,
        query: &'c Query,
    ) -> BoxFuture<'c, Result<QueryResult, sqlx::Error>> {
        async move {
            let mut rows = Vec::new();
            let mut rows_affected = 0;

            let mut stream = bind(query).fetch_many(conn);
            while let Some(step) = stream.try_next().await? {
                match step {
                    sqlx::Either::Left(done) => rows_affected += done.rows_affected(),
                    sqlx::Either::Right(row) => rows.push(to_json(&row)?),
                }
            }
            Ok(collect(rows, rows_affected, None))
        }
        .boxed()
    }
}

fn to_json(row: &PgRow) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();

    for column in row.columns() {
        let index = column.ordinal();

        let value = match column.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(index)?.into(),
            "INT2" => row.try_get::<Option<i16>, _>(index)?.into(),
            "INT4" => row.try_get::<Option<i32>, _>(index)?.into(),
            "INT8" => row.try_get::<Option<i64>, _>(index)?.into(),
            "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.into(),
            "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.into(),
            // Rendered as text, which preserves their precision.
            "NUMERIC" => text(row.try_get::<Option<BigDecimal>, _>(index)?),
            "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "UNKNOWN" => {
                row.try_get::<Option<String>, _>(index)?.into()
            }
            "UUID" => text(row.try_get::<Option<Uuid>, _>(index)?),
            "JSON" | "JSONB" => row
                .try_get::<Option<JsonValue>, _>(index)?
                .unwrap_or_default(),
            "TIMESTAMPTZ" => timestamp(row.try_get::<Option<DateTime<Utc>>, _>(index)?),
            "TIMESTAMP" => datetime(row.try_get::<Option<NaiveDateTime>, _>(index)?),
            "DATE" => text(row.try_get::<Option<NaiveDate>, _>(index)?),
            "TIME" => text(row.try_get::<Option<NaiveTime>, _>(index)?),
            "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.into(),
            _ => untyped(row, index)?,
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

// Values are sent in their binary encoding, which for enums and other
// text-like types is their label.
fn untyped(row: &PgRow, index: usize) -> Result<Value, sqlx::Error> {
    Ok(raw(row.try_get_unchecked::<Option<Vec<u8>>, _>(index)?))
}
