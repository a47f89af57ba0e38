//! Tests against a live Postgres, which run only when `POSTGRES_URL` is set.
use lambda_sql::{Connection, Error, Mode, Postgres, Query, Scalar};
use pretty_assertions::assert_eq;
use serde_json::json;

// Each test uses its own table, as tests run concurrently.
async fn fixture(table: &str) -> Option<(Postgres, Postgres)> {
    if std::env::var("POSTGRES_URL").is_err() {
        eprintln!("POSTGRES_URL is not set; skipping");
        return None;
    }
    let direct = Postgres::from_env_with_mode(Mode::Direct).unwrap();
    let pooled = Postgres::from_env_with_mode(Mode::Pooled).unwrap();

    direct
        .execute_transaction(&[
            Query::new(format!("drop table if exists {table}")),
            Query::new(format!(
                "create table {table} (
                    id serial primary key,
                    name text,
                    flag boolean,
                    amount numeric(10, 2),
                    created_at timestamptz,
                    day date,
                    external_id uuid,
                    doc jsonb
                )"
            )),
            Query::with_inputs(
                format!(
                    "insert into {table} (name, flag, amount, created_at, day, external_id, doc)
                    values ($1, $2, $3::numeric, $4::timestamptz, $5::date, $6::uuid, $7::jsonb)"
                ),
                [
                    Scalar::from("ada"),
                    Scalar::from(true),
                    Scalar::from("12.50"),
                    Scalar::from("2024-03-01T12:30:00Z"),
                    Scalar::from("2024-03-01"),
                    Scalar::from("1b4e28ba-2fa1-11d2-883f-0016d3cca427"),
                    Scalar::from(r#"{"tags": ["x"]}"#),
                ],
            ),
        ])
        .await
        .unwrap();

    Some((direct, pooled))
}

#[tokio::test]
async fn test_typed_columns() {
    let Some((direct, pooled)) = fixture("lambda_typed_columns").await else {
        return;
    };
    let query = Query::new("select * from lambda_typed_columns");

    let from_direct = direct.execute(&query).await.unwrap();
    let from_pool = pooled.execute(&query).await.unwrap();
    assert_eq!(from_direct, from_pool);

    assert_eq!(
        serde_json::to_value(&from_pool.rows).unwrap(),
        json!([{
            "id": 1,
            "name": "ada",
            "flag": true,
            "amount": "12.50",
            "created_at": "2024-03-01T12:30:00Z",
            "day": "2024-03-01",
            "external_id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
            "doc": {"tags": ["x"]},
        }])
    );
    // Columns keep the order in which they were selected.
    let columns: Vec<_> = from_pool.rows[0].keys().cloned().collect();
    assert_eq!(&columns[..3], &["id", "name", "flag"]);

    let now = pooled.execute(&Query::new("select now() as at")).await.unwrap();
    assert!(now.rows[0]["at"].is_string(), "{now:?}");

    direct.end().await.unwrap();
    pooled.end().await.unwrap();
}

#[tokio::test]
async fn test_null_inputs_take_the_type_of_their_use() {
    let Some((direct, pooled)) = fixture("lambda_null_inputs").await else {
        return;
    };

    // Fresh connections in both modes, with NULL bound to boolean and timestamptz columns.
    for (conn, name) in [(&pooled, "grace"), (&direct, "linus")] {
        conn.execute(&Query::with_inputs(
            "insert into lambda_null_inputs (name, flag, created_at) values ($1, $2, $3)",
            [Scalar::from(name), Scalar::Null, Scalar::Null],
        ))
        .await
        .unwrap();
    }

    for conn in [&pooled, &direct] {
        let result = conn
            .execute(&Query::with_inputs(
                "select id from lambda_null_inputs where name = $1",
                [Scalar::Null],
            ))
            .await
            .unwrap();
        assert!(result.rows.is_empty());

        let result = conn
            .execute(&Query::new(
                "select name, flag from lambda_null_inputs where flag is null order by id",
            ))
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&result.rows).unwrap(),
            json!([{"name": "grace", "flag": null}, {"name": "linus", "flag": null}])
        );
    }

    direct.end().await.unwrap();
    pooled.end().await.unwrap();
}

#[tokio::test]
async fn test_failed_transaction_is_rolled_back() {
    let Some((direct, pooled)) = fixture("lambda_rollback").await else {
        return;
    };

    for conn in [&direct, &pooled] {
        let err = conn
            .execute_transaction(&[
                Query::with_inputs("insert into lambda_rollback (name) values ($1)", [
                    Scalar::from("barbara"),
                ]),
                Query::new("delete from lambda_rollback where name = 'ada'"),
                Query::new("insert into lambda_rollback (id) values ('not a number')"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transaction(_)), "{err:?}");

        let names = conn
            .execute(&Query::new("select name from lambda_rollback"))
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&names.rows).unwrap(),
            json!([{"name": "ada"}])
        );
    }

    let result = pooled
        .execute(&Query::new(
            "update lambda_rollback set amount = amount + 1 where name = 'ada'",
        ))
        .await
        .unwrap();
    assert_eq!(result.metadata.unwrap()["rowsAffected"], json!(1));

    direct.end().await.unwrap();
    pooled.end().await.unwrap();
}
