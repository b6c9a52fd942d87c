#![cfg(feature = "postgres")]

use std::env;
use std::sync::Arc;

use sql_runner::prelude::*;

// Runs only when SQL_RUNNER_PG_URL points at a scratch database.
fn pg_url() -> Option<String> {
    env::var("SQL_RUNNER_PG_URL").ok()
}

#[tokio::test]
async fn postgres_round_trip() -> Result<(), SqlRunnerError> {
    let Some(url) = pg_url() else {
        return Ok(());
    };
    let pool = PgManager::from_url(&url)?.build_pool().await?;
    let runner = DialectRunner::new(Arc::new(pool), Dialect::postgres(), RunnerOptions::default());

    let mut tx = runner.start_transaction().await?;
    tx.execute(&QueryDescriptor::raw("create table runner_todo_tx (id serial primary key, title text not null, done boolean not null default false)"))
        .await?;
    let inserted = tx
        .execute(
            &QueryDescriptor::insert("insert into runner_todo_tx (title, done) values (?, ?), (?, ?) returning id, title")
                .bind("a")
                .bind(true)
                .bind("b")
                .bind(false)
                .returning(["id", "title"]),
        )
        .await?;
    let rows = inserted.as_returning().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("title"), Some(&Value::from("b")));

    let done = tx
        .execute(&QueryDescriptor::pluck("select title from runner_todo_tx where done = ?", "title").bind(true))
        .await?;
    assert_eq!(done.as_scalars().unwrap(), &[Value::from("a")]);

    let mut streamed: Vec<Row> = Vec::new();
    let summary = tx
        .stream(&QueryDescriptor::select("select id, title from runner_todo_tx order by id"), &mut streamed)
        .await?;
    assert_eq!(summary.rows, 2);

    // Nothing from this transaction survives, the table included.
    tx.rollback().await?;
    let err = runner
        .execute(&QueryDescriptor::select("select * from runner_todo_tx"))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlRunnerError::QueryExecution { .. }));
    Ok(())
}
