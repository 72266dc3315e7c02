//! SQLite 客户端：基于连接池的 execute / fetch_all / 事务
//!
//! 查询结果行转为 JSON 对象（列名 -> 值），BLOB 以十六进制字符串表示。

use std::path::Path;
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{Params, Row, Transaction};
use serde_json::{Map, Value};

use crate::storage::{ConnectionPool, StorageError};

/// 一行查询结果
pub type JsonRow = Map<String, Value>;

pub struct SqliteClient {
    pool: ConnectionPool,
}

impl SqliteClient {
    pub fn open(path: impl AsRef<Path>, pool_size: usize, acquire_timeout: Duration) -> Result<Self, StorageError> {
        Ok(Self {
            pool: ConnectionPool::open(path, pool_size, acquire_timeout)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.pool.path()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// 执行非查询语句，返回受影响行数
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, StorageError> {
        let conn = self.pool.acquire()?;
        conn.execute(sql, params).map_err(|e| {
            tracing::debug!(sql, error = %e, "Statement failed");
            StorageError::from(e)
        })
    }

    /// 执行多条语句（不带参数）
    pub fn execute_batch(&self, sql: &str) -> Result<(), StorageError> {
        let conn = self.pool.acquire()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// 查询全部结果行
    pub fn fetch_all<P: Params>(&self, sql: &str, params: P) -> Result<Vec<JsonRow>, StorageError> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(params, |row| row_to_json(row, &columns))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 在单个事务中执行 f：返回 Ok 时提交，返回 Err 时回滚
    pub fn transaction<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StorageError>,
    {
        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

fn row_to_json(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<JsonRow> {
    let mut obj = Map::with_capacity(columns.len());
    for (i, name) in columns.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::from(v),
            ValueRef::Real(v) => Value::from(v),
            ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::String(b.iter().map(|x| format!("{x:02x}")).collect()),
        };
        obj.insert(name.clone(), value);
    }
    Ok(obj)
}
