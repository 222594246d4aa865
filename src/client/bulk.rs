use super::{Connection, ResponseFuture};
use crate::protocol::value::encode_rows;
use crate::protocol::{Command, DriverResult, Row};

impl Connection {
    /// Send every row in one `batch` request against the prepared `sql`.
    ///
    /// The statement is always prepared, even for zero rows.
    pub fn batch_insert_async(&self, sql: &str, rows: &[Row]) -> DriverResult<ResponseFuture> {
        encode_rows(rows)?;
        let prepared_id = self.prepare(sql)?;

        self.send_command(Command::Batch {
            prepared_id,
            rows: rows.to_vec(),
        })
    }

    /// Bulk insert rows and wait for the server to acknowledge
    pub fn batch_insert(&self, sql: &str, rows: &[Row]) -> DriverResult<()> {
        self.batch_insert_async(sql, rows)?.get()?;
        Ok(())
    }
}
