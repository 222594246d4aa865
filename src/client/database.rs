use super::Connection;
use crate::protocol::{Command, DriverResult};

impl Connection {
    /// Switch the connection to `database`
    pub fn use_database(&self, database: &str) -> DriverResult<()> {
        tracing::info!("Using database {}", database);
        self.send_command(Command::Use {
            database: database.to_string(),
        })?
        .get_outcome(self.inner.config.request_timeout)?;
        Ok(())
    }
}
