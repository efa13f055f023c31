//! Per-invocation session state

use campaign_common::crypto::EncryptionKey;
use campaign_common::types::now_ns;

/// A SQL statement that failed during the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementError {
    pub sql: String,
    /// SQLite extended result code, when the failure came from SQLite
    pub code: Option<i32>,
    pub message: String,
}

impl StatementError {
    pub fn new(sql: &str, err: &rusqlite::Error) -> Self {
        Self {
            sql: sql.split_whitespace().collect::<Vec<_>>().join(" "),
            code: err.sqlite_error().map(|e| e.extended_code),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for StatementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {}) in: {}", self.message, code, self.sql),
            None => write!(f, "{} in: {}", self.message, self.sql),
        }
    }
}

/// Fixed clock, optional encryption key, and error accumulator for one session.
///
/// Every create/delete time written during a session uses [`Session::now`].
#[derive(Debug)]
pub struct Session {
    now: i64,
    key: Option<EncryptionKey>,
    errors: Vec<StatementError>,
}

impl Session {
    pub fn new() -> Self {
        Self::at(now_ns())
    }

    /// Session pinned to a given timestamp
    pub fn at(now: i64) -> Self {
        Self {
            now,
            key: None,
            errors: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: Option<EncryptionKey>) -> Self {
        self.key = key;
        self
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn key(&self) -> Option<&EncryptionKey> {
        self.key.as_ref()
    }

    pub fn record(&mut self, error: StatementError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[StatementError] {
        &self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Hand over the accumulated errors, leaving the list empty
    pub fn take_errors(&mut self) -> Vec<StatementError> {
        std::mem::take(&mut self.errors)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_clock_is_fixed() {
        let session = Session::at(1234);
        assert_eq!(session.now(), 1234);
        assert!(session.key().is_none());
    }

    #[test]
    fn test_error_accumulation() {
        let mut session = Session::at(1);
        let err = rusqlite::Error::QueryReturnedNoRows;
        session.record(StatementError::new("select  *\n from nowhere", &err));
        assert_eq!(session.error_count(), 1);
        assert_eq!(session.errors()[0].sql, "select * from nowhere");
        assert!(session.errors()[0].code.is_none());

        let taken = session.take_errors();
        assert_eq!(taken.len(), 1);
        assert_eq!(session.error_count(), 0);
    }
}
