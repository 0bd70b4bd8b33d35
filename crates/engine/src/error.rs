use thiserror::Error;

/// Longest SQL prefix kept in a [`EngineError::Statement`] message.
const SQL_HEAD_LEN: usize = 120;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("failed to open connection: {0}")]
    Connect(String),

    #[error("statement failed: {message} (sql: {sql})")]
    Statement { sql: String, message: String },

    #[error("connection {0} is closed")]
    Closed(u64),

    #[error("engine worker is gone")]
    WorkerGone,
}

impl EngineError {
    pub fn statement(sql: &str, message: impl Into<String>) -> Self {
        Self::Statement {
            sql: sql_head(sql),
            message: message.into(),
        }
    }
}

/// First line of `sql`, truncated on a char boundary.
pub fn sql_head(sql: &str) -> String {
    let line = sql.trim().lines().next().unwrap_or_default();
    match line.char_indices().nth(SQL_HEAD_LEN) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineError, sql_head};

    #[test]
    fn statement_error_keeps_only_first_line() {
        let err = EngineError::statement("SELECT 1\nFROM nowhere", "boom");
        assert_eq!(
            err.to_string(),
            "statement failed: boom (sql: SELECT 1)"
        );
    }

    #[test]
    fn long_sql_is_truncated() {
        let sql = "x".repeat(500);
        let head = sql_head(&sql);
        assert!(head.ends_with("..."));
        assert_eq!(head.len(), 123);
    }
}
