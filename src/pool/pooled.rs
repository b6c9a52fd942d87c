use std::ops::DerefMut;

use async_trait::async_trait;
use bb8::{ManageConnection, Pool, PooledConnection};

use crate::driver::{CursorOptions, Driver, RawResponse, RowCursor};
use crate::error::{DriverError, SqlRunnerError};
use crate::types::Value;

use super::ConnectionProvider;

#[async_trait]
impl<M> ConnectionProvider for Pool<M>
where
    M: ManageConnection,
    M::Connection: Driver,
{
    type Conn = PooledConnection<'static, M>;

    async fn acquire(&self) -> Result<Self::Conn, SqlRunnerError> {
        self.get_owned()
            .await
            .map_err(|e| SqlRunnerError::ConnectionError(format!("pool checkout error: {e:?}")))
    }
}

// Checked-out connections go back to their pool when dropped.
#[async_trait]
impl<M> Driver for PooledConnection<'static, M>
where
    M: ManageConnection,
    M::Connection: Driver,
{
    async fn execute(&mut self, sql: &str, bindings: &[Value]) -> Result<RawResponse, DriverError> {
        self.deref_mut().execute(sql, bindings).await
    }

    async fn open_cursor<'a>(
        &'a mut self,
        sql: &str,
        bindings: &[Value],
        options: CursorOptions,
    ) -> Result<RowCursor<'a>, DriverError> {
        self.deref_mut().open_cursor(sql, bindings, options).await
    }

    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.deref_mut().set_autocommit(enabled).await
    }

    fn autocommit(&self) -> bool {
        (**self).autocommit()
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.deref_mut().commit().await
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.deref_mut().rollback().await
    }
}
