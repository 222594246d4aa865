use super::{Connection, ResponseFuture};
use crate::protocol::value::encode_args;
use crate::protocol::{Command, DriverError, DriverResult, ResultSet, Statement, Value};

impl Connection {
    /// Server-side id for `sql`, prepared on first use and cached after
    pub fn prepare(&self, sql: &str) -> DriverResult<i64> {
        if let Some(id) = self.inner.prepared.get(sql) {
            tracing::debug!(id, "Prepared statement cache hit");
            return Ok(id);
        }

        let outcome = self
            .send_command(Command::Prepare {
                sql: sql.to_string(),
            })?
            .get_outcome(self.inner.config.request_timeout)?;

        let id = outcome.as_scalar().and_then(Value::as_i64).ok_or_else(|| {
            DriverError::ProtocolError(format!(
                "Expected prepared statement id, got {:?}",
                outcome
            ))
        })?;

        tracing::debug!(id, "Prepared statement cached");
        self.inner.prepared.insert(sql, id);
        Ok(id)
    }

    /// Send a query without waiting for its rows.
    ///
    /// With arguments the statement is prepared first, which blocks for one
    /// round trip on a cache miss. Without arguments the SQL text is sent as
    /// is.
    pub fn execute_async(&self, sql: &str, args: &[Value]) -> DriverResult<ResponseFuture> {
        let statement = if args.is_empty() {
            Statement::Sql(sql.to_string())
        } else {
            // reject unmarshallable args before any round trip
            encode_args(args)?;
            Statement::Prepared(self.prepare(sql)?)
        };

        self.send_command(Command::Run {
            statement,
            args: args.to_vec(),
        })
    }

    /// Execute a query and wait for its rows
    pub fn execute(&self, sql: &str, args: &[Value]) -> DriverResult<ResultSet> {
        self.execute_async(sql, args)?.get()
    }
}
