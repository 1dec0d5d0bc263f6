//! 版本化静态资源缓存
//!
//! 资源副本按 (缓存名称, URL) 存放；缓存名称带版本号后缀，
//! 激活新版本时旧名称下的条目整体清除。
//!
//! 同一 URL 可能同时存在于多个版本的缓存中：查找时命中任意版本，
//! 最新写入的优先，因此新版本未装完时旧版本仍可继续服务。

use crate::error::StoreError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// 错误上报用的表名
const TABLE: &str = "cache_entries";

/// 缓存的一份资源副本
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAsset {
    /// 资源完整 URL
    pub url: String,
    /// 入缓存时的响应状态码
    pub status: u16,
    /// 响应内容类型
    pub content_type: String,
    /// 响应体
    pub body: Vec<u8>,
    /// 入缓存时间（RFC 3339）
    pub cached_at: String,
}

/// 静态资源缓存
///
/// 与提交队列分开存放：两者生命周期不同，缓存可以随版本升级整体丢弃
#[derive(Clone)]
pub struct AssetCache {
    conn: Arc<Mutex<Connection>>,
}

impl AssetCache {
    /// 打开（必要时创建）资源缓存
    pub async fn open(path: impl Into<String>) -> Result<Self, StoreError> {
        let path = path.into();
        let db_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&db_path))
            .await
            .map_err(|e| StoreError::unavailable(&path, e))??;

        debug!("资源缓存已打开: {}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 写入一份资源副本（同名同 URL 覆盖，最新写入优先）
    pub async fn put(
        &self,
        cache_name: &str,
        url: &str,
        status: u16,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError> {
        let conn = Arc::clone(&self.conn);
        let cache_name = cache_name.to_string();
        let url = url.to_string();
        let content_type = content_type.to_string();
        tokio::task::spawn_blocking(move || {
            let cached_at = Utc::now().to_rfc3339();
            let conn = lock(&conn);
            conn.execute(
                "INSERT INTO cache_entries (cache_name, url, status, content_type, body, cached_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(cache_name, url) DO UPDATE SET \
                 status = excluded.status, content_type = excluded.content_type, \
                 body = excluded.body, cached_at = excluded.cached_at",
                params![cache_name, url, status, content_type, body, cached_at],
            )
            .map_err(|e| StoreError::transaction(TABLE, e))?;

            debug!("缓存写入: {} ← {}", cache_name, url);

            Ok(())
        })
        .await
        .map_err(|e| StoreError::transaction(TABLE, e))?
    }

    /// 在所有版本的缓存中查找 URL，最新写入的优先
    pub async fn get(&self, url: &str) -> Result<Option<CachedAsset>, StoreError> {
        let conn = Arc::clone(&self.conn);
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            conn.query_row(
                "SELECT url, status, content_type, body, cached_at FROM cache_entries \
                 WHERE url = ?1 ORDER BY cached_at DESC LIMIT 1",
                params![url],
                |row| {
                    Ok(CachedAsset {
                        url: row.get(0)?,
                        status: row.get(1)?,
                        content_type: row.get(2)?,
                        body: row.get(3)?,
                        cached_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(|e| StoreError::transaction(TABLE, e))
        })
        .await
        .map_err(|e| StoreError::transaction(TABLE, e))?
    }

    /// 现存的全部缓存名称
    pub async fn cache_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let mut stmt = conn
                .prepare("SELECT DISTINCT cache_name FROM cache_entries ORDER BY cache_name")
                .map_err(|e| StoreError::transaction(TABLE, e))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| StoreError::transaction(TABLE, e))?;

            let mut names = Vec::new();
            for row in rows {
                names.push(row.map_err(|e| StoreError::transaction(TABLE, e))?);
            }
            Ok(names)
        })
        .await
        .map_err(|e| StoreError::transaction(TABLE, e))?
    }

    /// 整体删除一个名称下的缓存
    ///
    /// # 返回
    /// 返回删除的条目数；名称不存在时为 0，不是错误
    pub async fn delete_cache(&self, cache_name: &str) -> Result<u64, StoreError> {
        let conn = Arc::clone(&self.conn);
        let cache_name = cache_name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let removed = conn
                .execute(
                    "DELETE FROM cache_entries WHERE cache_name = ?1",
                    params![cache_name],
                )
                .map_err(|e| StoreError::transaction(TABLE, e))?;
            Ok(removed as u64)
        })
        .await
        .map_err(|e| StoreError::transaction(TABLE, e))?
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|e| e.into_inner())
}

fn open_connection(path: &str) -> Result<Connection, StoreError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::unavailable(path, e))?;
        }
    }

    let conn = Connection::open(path).map_err(|e| StoreError::unavailable(path, e))?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(|e| StoreError::unavailable(path, e))?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cache_entries (
            cache_name   TEXT NOT NULL,
            url          TEXT NOT NULL,
            status       INTEGER NOT NULL,
            content_type TEXT NOT NULL,
            body         BLOB NOT NULL,
            cached_at    TEXT NOT NULL,
            PRIMARY KEY (cache_name, url)
        );",
    )
    .map_err(|e| StoreError::unavailable(path, e))?;

    Ok(conn)
}
