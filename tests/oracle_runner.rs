#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::time::Duration;

use sql_runner::prelude::*;
use sql_runner::test_utils::{Call, ScriptedDriver, ScriptedProvider};

fn oracle_runner() -> (ScriptedDriver, Arc<ScriptedProvider>, DialectRunner<ScriptedProvider>) {
    let driver = ScriptedDriver::new();
    let provider = Arc::new(ScriptedProvider::new(driver.clone()));
    let runner = DialectRunner::new(
        Arc::clone(&provider),
        Dialect::oracle(),
        RunnerOptions::default(),
    );
    (driver, provider, runner)
}

fn people() -> RawResponse {
    RawResponse::with_rows(
        vec!["id".into(), "name".into()],
        vec![
            vec![Value::Int(1), Value::from("ada")],
            vec![Value::Int(2), Value::from("grace")],
            vec![Value::Int(3), Value::from("barbara")],
        ],
    )
}

#[tokio::test]
async fn update_is_translated_and_reports_affected_rows() -> Result<(), SqlRunnerError> {
    let (driver, provider, runner) = oracle_runner();
    driver.push_response(RawResponse::with_update_count(1));

    let result = runner
        .execute(
            &QueryDescriptor::update("update t set x=? where id=?")
                .bind(true)
                .bind(5),
        )
        .await?;

    assert_eq!(result, NormalizedResult::Affected(1));
    assert_eq!(
        driver.calls(),
        vec![Call::Execute {
            sql: "update t set x=:1 where id=:2".into(),
            bindings: vec![Value::Int(1), Value::Int(5)],
        }]
    );
    assert_eq!(provider.acquired(), 1);
    assert_eq!(provider.released(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_and_malformed_queries_never_reach_the_backend() {
    let (driver, provider, runner) = oracle_runner();

    let err = runner
        .execute(&QueryDescriptor::select("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlRunnerError::EmptyQuery));

    let err = runner
        .execute(&QueryDescriptor::select("select * from t where a = ?").bind(1).bind(2))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlRunnerError::MalformedQuery(_)));

    assert!(driver.calls().is_empty());
    assert_eq!(provider.acquired(), provider.released());
}

#[tokio::test]
async fn backend_failure_keeps_the_driver_error() {
    let (driver, _provider, runner) = oracle_runner();
    driver.push_failure("ORA-00942: table or view does not exist");

    let err = runner
        .execute(&QueryDescriptor::select("select * from missing"))
        .await
        .unwrap_err();

    match &err {
        SqlRunnerError::QueryExecution { sql, .. } => assert_eq!(sql, "select * from missing"),
        other => panic!("expected QueryExecution, got {other:?}"),
    }
    assert!(err.driver_error().unwrap().to_string().contains("ORA-00942"));
}

#[tokio::test]
async fn select_first_and_pluck_shapes() -> Result<(), SqlRunnerError> {
    let (driver, _provider, runner) = oracle_runner();
    driver.push_response(people());
    driver.push_response(RawResponse::with_rows(vec!["id".into()], Vec::new()));
    driver.push_response(people());

    let rows = runner
        .execute(&QueryDescriptor::select("select id, name from people"))
        .await?
        .into_rows()
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.rows()[1].get("name"), Some(&Value::from("grace")));

    let first = runner
        .execute(&QueryDescriptor::first("select id from people where id = ?").bind(99))
        .await?;
    assert_eq!(first, NormalizedResult::Row(None));

    let names = runner
        .execute(&QueryDescriptor::pluck("select id, name from people", "name"))
        .await?;
    assert_eq!(
        names.as_scalars().unwrap(),
        &[Value::from("ada"), Value::from("grace"), Value::from("barbara")]
    );
    Ok(())
}

#[tokio::test]
async fn returning_reads_out_binds_in_slot_order() -> Result<(), SqlRunnerError> {
    let (driver, _provider, runner) = oracle_runner();
    driver.push_response(
        RawResponse::with_update_count(2)
            .out_bind("returnParam", Value::Int(10))
            .out_bind("returnParam1", Value::from("a"))
            .out_bind("returnParam2", Value::Int(11))
            .out_bind("returnParam3", Value::from("b")),
    );

    let result = runner
        .execute(
            &QueryDescriptor::insert("insert into t (name) select name from staging")
                .returning(["id", "name"]),
        )
        .await?;

    let rows = result.as_returning().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("id"), Some(&Value::Int(10)));
    assert_eq!(rows[0].get("name"), Some(&Value::from("a")));
    assert_eq!(rows[1].get("id"), Some(&Value::Int(11)));
    assert_eq!(rows[1].get("name"), Some(&Value::from("b")));
    Ok(())
}

#[tokio::test]
async fn returning_with_an_odd_slot_count_is_rejected() {
    let (driver, _provider, runner) = oracle_runner();
    driver.push_response(
        RawResponse::with_update_count(1)
            .out_bind("returnParam", Value::Int(10))
            .out_bind("returnParam1", Value::from("a"))
            .out_bind("returnParam2", Value::Int(11)),
    );

    let err = runner
        .execute(
            &QueryDescriptor::insert("insert into t (name) values (?)")
                .bind("a")
                .returning(["id", "name"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SqlRunnerError::ReturningMismatch(_)));
}

#[tokio::test]
async fn unknown_methods_pass_through_unless_strict() -> Result<(), SqlRunnerError> {
    let (driver, provider, runner) = oracle_runner();
    driver.push_response(people());
    let method: Method = "columnInfo".parse().unwrap();
    let descriptor = QueryDescriptor::new("select id, name from people", method);

    let raw = runner.execute(&descriptor).await?;
    assert_eq!(raw.as_raw(), Some(&people()));

    let strict = DialectRunner::new(
        provider,
        Dialect::oracle(),
        RunnerOptions::builder().strict_methods(true).build()?,
    );
    driver.push_response(people());
    let err = strict.execute(&descriptor).await.unwrap_err();
    assert!(matches!(err, SqlRunnerError::UnsupportedMethod(name) if name == "columnInfo"));
    Ok(())
}

#[tokio::test]
async fn output_transform_sees_the_raw_response() -> Result<(), SqlRunnerError> {
    let (driver, _provider, runner) = oracle_runner();
    driver.push_response(RawResponse::with_update_count(4));

    let result = runner
        .execute(
            &QueryDescriptor::del("delete from t where stale = ?")
                .bind(true)
                .output(|raw| Ok(serde_json::json!({ "deleted": raw.affected() }))),
        )
        .await?;
    assert_eq!(result.as_custom(), Some(&serde_json::json!({ "deleted": 4 })));
    Ok(())
}

#[tokio::test]
async fn commit_restores_autocommit_and_releases() -> Result<(), SqlRunnerError> {
    let (driver, provider, runner) = oracle_runner();
    driver.push_response(RawResponse::with_update_count(1));

    let mut tx = runner.start_transaction().await?;
    assert!(!driver.current_autocommit());
    tx.execute(&QueryDescriptor::update("update t set x = ?").bind(false))
        .await?;
    let outcome = tx.commit().await?;

    assert!(outcome.committed());
    assert!(driver.current_autocommit());
    assert_eq!(
        driver.calls(),
        vec![
            Call::SetAutocommit(false),
            Call::Execute {
                sql: "update t set x = :1".into(),
                bindings: vec![Value::Int(0)],
            },
            Call::Commit,
            Call::SetAutocommit(true),
        ]
    );
    assert_eq!(provider.released(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_commit_still_restores_autocommit() -> Result<(), SqlRunnerError> {
    let (driver, provider, runner) = oracle_runner();
    driver.fail_commit("ORA-02091: transaction rolled back");

    let tx = runner.start_transaction().await?;
    let err = tx.commit().await.unwrap_err();

    assert!(matches!(
        err,
        SqlRunnerError::TransactionEnd {
            action: sql_runner::TxAction::Commit,
            ..
        }
    ));
    assert!(driver.current_autocommit());
    assert_eq!(driver.calls().last(), Some(&Call::SetAutocommit(true)));
    assert_eq!(provider.released(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_rollback_is_reported() -> Result<(), SqlRunnerError> {
    let (driver, _provider, runner) = oracle_runner();
    driver.fail_rollback("ORA-03113: end-of-file on communication channel");

    let tx = runner.start_transaction().await?;
    let err = tx.rollback().await.unwrap_err();
    assert!(matches!(
        err,
        SqlRunnerError::TransactionEnd {
            action: sql_runner::TxAction::Rollback,
            ..
        }
    ));
    assert!(err.driver_error().unwrap().to_string().contains("ORA-03113"));
    assert!(driver.current_autocommit());
    Ok(())
}

#[tokio::test]
async fn failed_autocommit_restore_surfaces_after_a_good_commit() -> Result<(), SqlRunnerError> {
    let (driver, provider, runner) = oracle_runner();
    driver.fail_set_autocommit(true, "ORA-03114: not connected");

    let tx = runner.start_transaction().await?;
    let err = tx.commit().await.unwrap_err();
    assert!(matches!(err, SqlRunnerError::Autocommit { enabled: true, .. }));
    assert_eq!(provider.released(), 1);
    Ok(())
}

#[tokio::test]
async fn start_failures_are_transaction_start_errors() {
    let (driver, provider, runner) = oracle_runner();

    provider.set_fail_acquire(true);
    let err = runner.start_transaction().await.unwrap_err();
    assert!(matches!(err, SqlRunnerError::TransactionStart(_)));
    provider.set_fail_acquire(false);

    driver.fail_set_autocommit(false, "ORA-01031: insufficient privileges");
    let err = runner.start_transaction().await.unwrap_err();
    match err {
        SqlRunnerError::TransactionStart(inner) => {
            assert!(matches!(*inner, SqlRunnerError::Autocommit { enabled: false, .. }));
        }
        other => panic!("expected TransactionStart, got {other:?}"),
    }
    assert_eq!(provider.acquired(), provider.released());
}

#[tokio::test]
async fn savepoints_use_oracle_syntax_without_release() -> Result<(), SqlRunnerError> {
    let (driver, _provider, runner) = oracle_runner();

    let mut tx = runner.start_transaction().await?;
    let first = tx.savepoint().await?;
    let second = tx.savepoint().await?;
    assert_eq!(first.name(), "sp_1");
    assert_eq!(second.name(), "sp_2");
    tx.rollback_to_savepoint(&first).await?;
    tx.release_savepoint(second).await?;
    let outcome = tx.commit().await?;
    assert_eq!(outcome.savepoints(), 2);

    assert_eq!(
        driver.statements(),
        vec![
            "SAVEPOINT sp_1".to_string(),
            "SAVEPOINT sp_2".to_string(),
            "ROLLBACK TO SAVEPOINT sp_1".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn dropping_an_active_transaction_rolls_back() -> Result<(), SqlRunnerError> {
    let (driver, provider, runner) = oracle_runner();

    {
        let mut tx = runner.start_transaction().await?;
        tx.execute(&QueryDescriptor::update("update t set x = 1"))
            .await?;
    }

    for _ in 0..50 {
        if provider.released() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }

    let calls = driver.calls();
    assert!(calls.contains(&Call::Rollback));
    assert_eq!(calls.last(), Some(&Call::SetAutocommit(true)));
    assert_eq!(provider.released(), 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_commit_still_restores_autocommit() -> Result<(), SqlRunnerError> {
    let (driver, provider, runner) = oracle_runner();
    driver.stall_commit();

    let tx = runner.start_transaction().await?;
    let timed_out = tokio::time::timeout(Duration::from_millis(10), tx.commit()).await;
    assert!(timed_out.is_err());

    for _ in 0..50 {
        if provider.released() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }

    let calls = driver.calls();
    assert!(!calls.contains(&Call::Rollback));
    assert_eq!(
        calls,
        vec![
            Call::SetAutocommit(false),
            Call::Commit,
            Call::SetAutocommit(true),
        ]
    );
    assert!(driver.current_autocommit());
    assert_eq!(provider.released(), 1);
    Ok(())
}

#[tokio::test]
async fn lease_goes_back_once() -> Result<(), SqlRunnerError> {
    let (_driver, provider, _runner) = oracle_runner();

    let lease = sql_runner::Lease::acquire(&provider).await?;
    assert!(lease.is_held());
    assert_eq!(format!("{lease:?}"), "Lease { held: true }");
    lease.release();

    assert_eq!(provider.acquired(), 1);
    assert_eq!(provider.released(), 1);
    Ok(())
}

#[tokio::test]
async fn stream_stops_at_the_first_sink_failure() {
    let (driver, _provider, runner) = oracle_runner();
    driver.set_cursor_rows(people().to_row_set().into_rows());

    let mut seen = Vec::new();
    let mut sink = sink_fn(|row: Row| {
        let id = *row.get("id").and_then(Value::as_int).unwrap_or(&0);
        if id == 2 {
            return Err(SinkError::new("disk full"));
        }
        seen.push(id);
        Ok(())
    });

    let err = runner
        .stream(&QueryDescriptor::select("select id, name from people"), &mut sink)
        .await
        .unwrap_err();
    drop(sink);

    assert!(matches!(
        err,
        SqlRunnerError::Stream(StreamError::Sink { rows_delivered: 1, .. })
    ));
    assert_eq!(seen, vec![1]);
}

#[tokio::test]
async fn stream_reports_cursor_errors_and_fetch_size() -> Result<(), SqlRunnerError> {
    let (driver, provider, _runner) = oracle_runner();
    driver.set_cursor_rows(people().to_row_set().into_rows());
    driver.fail_cursor_at(2, "ORA-01555: snapshot too old");
    let runner = DialectRunner::new(
        provider,
        Dialect::oracle(),
        RunnerOptions::builder().stream_fetch_size(25).build()?,
    );

    let mut rows: Vec<Row> = Vec::new();
    let err = runner
        .stream(
            &QueryDescriptor::select("select id, name from people where active = ?").bind(true),
            &mut rows,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SqlRunnerError::Stream(StreamError::Cursor { rows_delivered: 2, .. })
    ));
    assert_eq!(rows.len(), 2);
    assert_eq!(
        driver.calls(),
        vec![Call::OpenCursor {
            sql: "select id, name from people where active = :1".into(),
            bindings: vec![Value::Int(1)],
            fetch_size: 25,
        }]
    );
    Ok(())
}

#[tokio::test]
async fn cursor_open_failure_is_an_execution_error() {
    let (driver, _provider, runner) = oracle_runner();
    driver.fail_cursor_open("ORA-00904: invalid identifier");

    let mut rows: Vec<Row> = Vec::new();
    let err = runner
        .stream(&QueryDescriptor::select("select nope from people"), &mut rows)
        .await
        .unwrap_err();
    assert!(matches!(err, SqlRunnerError::QueryExecution { .. }));
    assert!(rows.is_empty());
}
