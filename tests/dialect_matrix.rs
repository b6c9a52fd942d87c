#![cfg(feature = "test-utils")]

use std::sync::Arc;

use sql_runner::prelude::*;
use sql_runner::test_utils::{Call, ScriptedDriver, ScriptedProvider};

async fn dispatched(kind: DialectKind, descriptor: &QueryDescriptor) -> Call {
    let driver = ScriptedDriver::new();
    let runner = DialectRunner::new(
        Arc::new(ScriptedProvider::new(driver.clone())),
        Dialect::from_kind(kind),
        RunnerOptions::default(),
    );
    runner.execute(descriptor).await.unwrap();
    driver.calls().remove(0)
}

#[tokio::test]
async fn one_descriptor_three_backends() {
    let descriptor = QueryDescriptor::update("update t set flag = ?, note = '?' where id = ?")
        .bind(false)
        .bind(7);

    let expected = [
        (
            DialectKind::Oracle,
            "update t set flag = :1, note = '?' where id = :2",
            Value::Int(0),
        ),
        (
            DialectKind::Postgres,
            "update t set flag = $1, note = '?' where id = $2",
            Value::Bool(false),
        ),
        (
            DialectKind::Sqlite,
            "update t set flag = ?1, note = '?' where id = ?2",
            Value::Int(0),
        ),
    ];

    for (kind, sql, flag) in expected {
        assert_eq!(
            dispatched(kind, &descriptor).await,
            Call::Execute {
                sql: sql.to_string(),
                bindings: vec![flag, Value::Int(7)],
            },
            "{kind}"
        );
    }
}

#[tokio::test]
async fn row_returning_projects_requested_columns() -> Result<(), SqlRunnerError> {
    let driver = ScriptedDriver::new();
    driver.push_response(
        RawResponse::with_rows(
            vec!["id".into(), "title".into(), "done".into()],
            vec![vec![Value::Int(4), Value::from("x"), Value::Bool(false)]],
        )
        .update_count(1),
    );
    let runner = DialectRunner::new(
        Arc::new(ScriptedProvider::new(driver.clone())),
        Dialect::postgres(),
        RunnerOptions::default(),
    );

    let ok = runner
        .execute(
            &QueryDescriptor::insert("insert into todo (title) values (?) returning *")
                .bind("x")
                .returning(["id"]),
        )
        .await?;
    let rows = ok.as_returning().unwrap();
    assert_eq!(rows[0].values(), &[Value::Int(4)]);

    driver.push_response(RawResponse::with_rows(
        vec!["id".into()],
        vec![vec![Value::Int(5)]],
    ));
    let err = runner
        .execute(
            &QueryDescriptor::insert("insert into todo (title) values (?) returning id")
                .bind("y")
                .returning(["uuid"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SqlRunnerError::ReturningMismatch(_)));
    Ok(())
}
