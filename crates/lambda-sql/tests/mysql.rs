//! Tests against a live MySQL, which run only when `MYSQL_URL` is set.
use lambda_sql::{Connection, Error, Mode, Mysql, Query, Scalar};
use pretty_assertions::assert_eq;
use serde_json::json;

// Each test uses its own table, as tests run concurrently.
async fn fixture(table: &str) -> Option<(Mysql, Mysql)> {
    if std::env::var("MYSQL_URL").is_err() {
        eprintln!("MYSQL_URL is not set; skipping");
        return None;
    }
    let direct = Mysql::from_env_with_mode(Mode::Direct).unwrap();
    let pooled = Mysql::from_env_with_mode(Mode::Pooled).unwrap();

    // DDL commits implicitly in MySQL, so the fixture isn't a transaction.
    for query in [
        Query::new(format!("drop table if exists {table}")),
        Query::new(format!(
            "create table {table} (
                id int unsigned auto_increment primary key,
                name varchar(64),
                flag boolean,
                amount decimal(10, 2),
                created_at datetime,
                updated_at timestamp null,
                day date,
                doc json
            ) engine = InnoDB"
        )),
        Query::with_inputs(
            format!(
                "insert into {table} (name, flag, amount, created_at, updated_at, day, doc)
                values (?, ?, ?, ?, ?, ?, ?)"
            ),
            [
                Scalar::from("ada"),
                Scalar::from(true),
                Scalar::from("12.50"),
                Scalar::from("2024-03-01 12:30:00"),
                Scalar::from("2024-03-01 12:30:00"),
                Scalar::from("2024-03-01"),
                Scalar::from(r#"{"tags": ["x"]}"#),
            ],
        ),
    ] {
        direct.execute(&query).await.unwrap();
    }

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
            "flag": 1,
            "amount": "12.50",
            "created_at": "2024-03-01T12:30:00",
            "updated_at": "2024-03-01T12:30:00Z",
            "day": "2024-03-01",
            "doc": {"tags": ["x"]},
        }])
    );

    let now = pooled.execute(&Query::new("select now() as at")).await.unwrap();
    assert!(now.rows[0]["at"].is_string(), "{now:?}");

    direct.end().await.unwrap();
    pooled.end().await.unwrap();
}

#[tokio::test]
async fn test_null_inputs_and_insert_ids() {
    let Some((direct, pooled)) = fixture("lambda_null_inputs").await else {
        return;
    };

    for (conn, name, id) in [(&pooled, "grace", 2), (&direct, "linus", 3)] {
        let result = conn
            .execute(&Query::with_inputs(
                "insert into lambda_null_inputs (name, flag, created_at) values (?, ?, ?)",
                [Scalar::from(name), Scalar::Null, Scalar::Null],
            ))
            .await
            .unwrap();
        assert_eq!(
            result.metadata.unwrap(),
            json!({"rowsAffected": 1, "lastInsertId": id})
        );
    }

    for conn in [&pooled, &direct] {
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
                Query::with_inputs("insert into lambda_rollback (name) values (?)", [
                    Scalar::from("barbara"),
                ]),
                Query::new("delete from lambda_rollback where name = 'ada'"),
                Query::new("insert into lambda_missing (id) values (1)"),
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

    direct.end().await.unwrap();
    pooled.end().await.unwrap();
}
