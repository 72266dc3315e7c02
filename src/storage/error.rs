//! 知识库错误类型
//!
//! AlreadyExists / Exists / Missing 是可被指令层吞掉的「软」错误，其余降级为 Error 控制结果。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Table already exists: {0}")]
    AlreadyExists(String),

    #[error("Key already exists: {0}")]
    Exists(String),

    #[error("Key not found: {0}")]
    Missing(String),

    #[error("Table does not exist: {0}")]
    MissingTable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("No available connections in the pool after {0}s")]
    PoolExhausted(u64),

    #[error("Connection pool lock poisoned")]
    Poisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blocking task failed: {0}")]
    Blocking(String),
}

impl StorageError {
    /// 是否为约束冲突（主键重复）
    pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
