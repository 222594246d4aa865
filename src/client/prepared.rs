use std::collections::HashMap;

use parking_lot::Mutex;

/// SQL text to server-assigned statement id, for one connection.
///
/// Entries are never evicted.
#[derive(Debug, Default)]
pub struct StatementCache {
    entries: Mutex<HashMap<String, i64>>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sql: &str) -> Option<i64> {
        self.entries.lock().get(sql).copied()
    }

    /// Two callers preparing the same text may both insert; the ids are
    /// interchangeable and the last one stays.
    pub fn insert(&self, sql: &str, id: i64) {
        self.entries.lock().insert(sql.to_string(), id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
