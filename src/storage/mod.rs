//! 本地知识库：SQLite 连接池、客户端、select DSL 与键值表操作
//!
//! 全部为同步 API；引擎侧通过 tokio::task::spawn_blocking 调用。

pub mod client;
pub mod dsl;
pub mod error;
pub mod kv;
pub mod pool;

pub use client::{JsonRow, SqliteClient};
pub use dsl::{KeyMatcher, SelectQuery};
pub use error::StorageError;
pub use kv::{quote_identifier, KvStore, COLUMNS, RECORD_VERSION};
pub use pool::{ConnectionPool, PooledConnection};
