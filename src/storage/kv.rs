//! 键值知识库：固定表结构 `key TEXT PRIMARY KEY, content TEXT, version INTEGER`
//!
//! 表名与列名只允许字母、数字和下划线，并以双引号包裹后拼入 SQL；值一律走参数绑定。

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use rusqlite::params;

use crate::storage::{JsonRow, KeyMatcher, SelectQuery, SqliteClient, StorageError};

/// 记录版本号
pub const RECORD_VERSION: i64 = 1;

/// 固定表结构的列
pub const COLUMNS: [&str; 3] = ["key", "content", "version"];

/// 校验并引用标识符
pub fn quote_identifier(name: &str) -> Result<String, StorageError> {
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(StorageError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

fn create_table_on(client: &SqliteClient, table: &str) -> Result<(), StorageError> {
    let quoted = quote_identifier(table)?;
    let sql = format!("CREATE TABLE {quoted} (key TEXT PRIMARY KEY, content TEXT, version INTEGER)");
    match client.execute_batch(&sql) {
        Err(StorageError::Sqlite(e)) if e.to_string().contains("already exists") => {
            Err(StorageError::AlreadyExists(table.trim().to_string()))
        }
        Err(e) => Err(e),
        Ok(()) => {
            tracing::info!(table = table.trim(), "Created table");
            Ok(())
        }
    }
}

pub struct KvStore {
    client: RwLock<SqliteClient>,
    pool_size: usize,
    acquire_timeout: Duration,
}

impl KvStore {
    pub fn open(path: impl AsRef<Path>, pool_size: usize, acquire_timeout: Duration) -> Result<Self, StorageError> {
        Ok(Self {
            client: RwLock::new(SqliteClient::open(path, pool_size, acquire_timeout)?),
            pool_size,
            acquire_timeout,
        })
    }

    fn client(&self) -> Result<std::sync::RwLockReadGuard<'_, SqliteClient>, StorageError> {
        self.client.read().map_err(|_| StorageError::Poisoned)
    }

    pub fn path(&self) -> Result<PathBuf, StorageError> {
        Ok(self.client()?.path().to_path_buf())
    }

    /// 切换到另一个数据库文件并确保目标表存在；任一步失败时保留原连接池
    pub fn relocate(&self, path: impl AsRef<Path>, table: &str) -> Result<(), StorageError> {
        quote_identifier(table)?;
        let fresh = SqliteClient::open(path, self.pool_size, self.acquire_timeout)?;
        match create_table_on(&fresh, table) {
            Ok(()) | Err(StorageError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }
        let mut client = self.client.write().map_err(|_| StorageError::Poisoned)?;
        *client = fresh;
        tracing::info!(db = %client.path().display(), table = table.trim(), "Knowledge base relocated");
        Ok(())
    }

    /// 创建固定结构的表；表已存在时返回 AlreadyExists
    pub fn create_table(&self, table: &str) -> Result<(), StorageError> {
        create_table_on(&*self.client()?, table)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, StorageError> {
        let rows = self.client()?.fetch_all(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table.trim()],
        )?;
        Ok(!rows.is_empty())
    }

    fn require_table(&self, table: &str) -> Result<String, StorageError> {
        let quoted = quote_identifier(table)?;
        if !self.table_exists(table)? {
            return Err(StorageError::MissingTable(table.trim().to_string()));
        }
        Ok(quoted)
    }

    /// 插入一条记录；主键已存在时返回 Exists
    pub fn insert(&self, table: &str, key: &str, content: &str) -> Result<(), StorageError> {
        let quoted = self.require_table(table)?;
        let key = key.trim();
        let sql = format!("INSERT INTO {quoted} (key, content, version) VALUES (?1, ?2, ?3)");
        self.client()?
            .transaction(|tx| {
                tx.execute(&sql, params![key, content.trim(), RECORD_VERSION])?;
                Ok(())
            })
            .map_err(|e| match e {
                StorageError::Sqlite(ref inner) if StorageError::is_constraint_violation(inner) => {
                    StorageError::Exists(key.to_string())
                }
                other => other,
            })
    }

    /// 更新一条记录；主键不存在时返回 Missing
    pub fn update(&self, table: &str, key: &str, content: &str) -> Result<(), StorageError> {
        let quoted = self.require_table(table)?;
        let key = key.trim();
        let sql = format!("UPDATE {quoted} SET content = ?1, version = ?2 WHERE key = ?3");
        let changed = self.client()?.transaction(|tx| {
            Ok(tx.execute(&sql, params![content.trim(), RECORD_VERSION, key])?)
        })?;
        if changed == 0 {
            return Err(StorageError::Missing(key.to_string()));
        }
        Ok(())
    }

    /// 执行 select DSL；未指定表时使用 default_table
    pub fn select(&self, query: &SelectQuery, default_table: &str) -> Result<Vec<JsonRow>, StorageError> {
        let table = query.table.as_deref().unwrap_or(default_table);
        let quoted = self.require_table(table)?;
        let columns = match &query.columns {
            Some(cols) => {
                let mut quoted_cols = Vec::with_capacity(cols.len());
                for col in cols {
                    if !COLUMNS.contains(&col.as_str()) {
                        return Err(StorageError::InvalidQuery(format!(
                            "Invalid column '{col}' in table '{table}'"
                        )));
                    }
                    quoted_cols.push(quote_identifier(col)?);
                }
                quoted_cols.join(", ")
            }
            None => "*".to_string(),
        };

        let client = self.client()?;
        let mut results = Vec::new();
        for group in &query.groups {
            for candidate in group {
                let (op, value) = match candidate {
                    KeyMatcher::Exact(v) => ("=", v),
                    KeyMatcher::Like(v) => ("LIKE", v),
                };
                let sql = format!("SELECT {columns} FROM {quoted} WHERE key {op} ?1");
                match client.fetch_all(&sql, params![value]) {
                    Ok(rows) if !rows.is_empty() => {
                        results.extend(rows);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Select candidate failed"),
                }
            }
        }
        Ok(results)
    }

    /// 执行任意写语句（可包含多条）
    pub fn execute_raw(&self, sql: &str) -> Result<(), StorageError> {
        self.client()?.execute_batch(sql)
    }

    /// 执行任意查询语句
    pub fn fetch_raw(&self, sql: &str) -> Result<Vec<JsonRow>, StorageError> {
        self.client()?.fetch_all(sql, [])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, KvStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path().join("kb.db"), 2, Duration::from_secs(1)).unwrap();
        store.create_table("notes").unwrap();
        (dir, store)
    }

    #[test]
    fn test_create_table_twice_reports_already_exists() {
        let (_dir, store) = store();
        assert!(matches!(store.create_table("notes"), Err(StorageError::AlreadyExists(_))));
        assert!(matches!(store.create_table("bad name"), Err(StorageError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_insert_then_update() {
        let (_dir, store) = store();
        store.insert("notes", "rust", "ownership").unwrap();
        assert!(matches!(store.insert("notes", "rust", "again"), Err(StorageError::Exists(_))));
        assert!(matches!(store.update("notes", "go", "x"), Err(StorageError::Missing(_))));
        store.update("notes", "rust", "borrowing").unwrap();

        let rows = store.fetch_raw("SELECT content, version FROM notes").unwrap();
        assert_eq!(rows[0]["content"], "borrowing");
        assert_eq!(rows[0]["version"], RECORD_VERSION);
    }

    #[test]
    fn test_select_short_circuits_per_group() {
        let (_dir, store) = store();
        store.insert("notes", "alpha", "A").unwrap();
        store.insert("notes", "alphabet", "AB").unwrap();
        store.insert("notes", "beta", "B").unwrap();

        let query = SelectQuery::parse(r"\select missing | beta | alpha, alp? \columns key \select").unwrap();
        let rows = store.select(&query, "notes").unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r["key"].as_str().unwrap().to_string()).collect();
        assert_eq!(keys[0], "beta");
        assert_eq!(keys.len(), 3);
        assert!(rows[0].get("content").is_none());
    }

    #[test]
    fn test_select_unknown_table_or_column() {
        let (_dir, store) = store();
        let query = SelectQuery::parse(r"\select a \from nowhere \select").unwrap();
        assert!(matches!(store.select(&query, "notes"), Err(StorageError::MissingTable(_))));
        let query = SelectQuery::parse(r"\select a \columns secret \select").unwrap();
        assert!(matches!(store.select(&query, "notes"), Err(StorageError::InvalidQuery(_))));
    }

    #[test]
    fn test_relocate_switches_database() {
        let (dir, store) = store();
        store.relocate(dir.path().join("other.db"), "fresh").unwrap();
        assert!(!store.table_exists("notes").unwrap());
        assert!(store.table_exists("fresh").unwrap());
        assert_eq!(store.path().unwrap(), dir.path().join("other.db"));
    }

    #[test]
    fn test_relocate_with_bad_table_keeps_current_database() {
        let (dir, store) = store();
        let before = store.path().unwrap();
        let err = store.relocate(dir.path().join("other.db"), "bad name").unwrap_err();
        assert!(matches!(err, StorageError::InvalidIdentifier(_)));
        assert_eq!(store.path().unwrap(), before);
        assert!(store.table_exists("notes").unwrap());
    }
}
