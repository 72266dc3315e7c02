//! 有界 SQLite 连接池
//!
//! 启动时一次性打开 pool_size 个连接；acquire 在池空时阻塞等待，超时返回 PoolExhausted。
//! PooledConnection 在 Drop 时归还连接并唤醒一个等待者。

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use crate::storage::StorageError;

pub struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
    size: usize,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    /// 打开数据库文件（父目录不存在时创建）并建立 size 个连接
    pub fn open(path: impl AsRef<Path>, size: usize, acquire_timeout: Duration) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let size = size.max(1);
        let connections = (0..size)
            .map(|_| Connection::open(&path))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(db = %path.display(), size, "SQLite pool opened");
        Ok(Self {
            path,
            idle: Mutex::new(connections),
            available: Condvar::new(),
            size,
            acquire_timeout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 当前空闲连接数
    pub fn idle(&self) -> usize {
        self.idle.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// 取一个连接；池空时最多等待 acquire_timeout
    pub fn acquire(&self) -> Result<PooledConnection<'_>, StorageError> {
        let guard = self.idle.lock().map_err(|_| StorageError::Poisoned)?;
        let (mut guard, waited) = self
            .available
            .wait_timeout_while(guard, self.acquire_timeout, |idle| idle.is_empty())
            .map_err(|_| StorageError::Poisoned)?;
        match guard.pop() {
            Some(conn) => Ok(PooledConnection {
                pool: self,
                conn: Some(conn),
            }),
            None => {
                debug_assert!(waited.timed_out());
                tracing::error!("Connection pool exhausted");
                Err(StorageError::PoolExhausted(self.acquire_timeout.as_secs()))
            }
        }
    }

    fn release(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(conn);
            self.available.notify_one();
        }
    }
}

/// 借出的连接；Drop 时归还到池中
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // conn 仅在 drop 中被取走
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
