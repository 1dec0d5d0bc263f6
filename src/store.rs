//! 本地持久存储 - 基础设施层
//!
//! ## 职责
//!
//! 唯一的 SQLite 连接持有者，向上层暴露三个分区的读写能力：
//!
//! 1. **pending_submissions**：待同步的提交队列（本地自增主键，删除后不复用）
//! 2. **cached_question_papers**：试卷列表缓存（服务端主键）
//! 3. **cached_submissions**：已提交记录缓存（服务端主键）
//!
//! ## 设计特点
//!
//! - 每个操作都是单分区、单记录的独立事务，不承诺跨分区原子性
//! - 记录写入后不可变，只能整条删除
//! - 阻塞的 SQLite 调用全部移交 tokio 阻塞线程池执行

use crate::error::StoreError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// 库结构版本，库文件版本高于此值时拒绝打开
const SCHEMA_VERSION: u32 = 1;

/// 存储分区
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// 待同步的提交队列
    PendingSubmissions,
    /// 试卷列表缓存
    CachedQuestionPapers,
    /// 已提交记录缓存
    CachedSubmissions,
}

impl Partition {
    /// 分区对应的表名
    pub fn table(self) -> &'static str {
        match self {
            Partition::PendingSubmissions => "pending_submissions",
            Partition::CachedQuestionPapers => "cached_question_papers",
            Partition::CachedSubmissions => "cached_submissions",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// 分区中的一条记录
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// 记录主键（队列分区由存储分配，缓存分区为服务端 ID）
    pub id: i64,
    /// 入库时间（RFC 3339）
    pub captured_at: String,
    /// 记录内容
    pub payload: JsonValue,
}

/// 本地持久存储
///
/// 内部以 `Arc<Mutex<Connection>>` 共享连接，克隆句柄开销很小。
/// 句柄在应用启动时显式构造，再传给需要它的组件。
#[derive(Clone)]
pub struct SubmissionStore {
    conn: Arc<Mutex<Connection>>,
    path: String,
}

impl SubmissionStore {
    /// 打开（必要时创建）本地存储
    ///
    /// 幂等：数据库文件、父目录和三个分区表不存在时自动创建。
    ///
    /// # 返回
    /// 文件无法打开或库版本高于程序支持的版本时返回 `StoreError::Unavailable`
    pub async fn open(path: impl Into<String>) -> Result<Self, StoreError> {
        let path = path.into();
        let db_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&db_path))
            .await
            .map_err(|e| StoreError::unavailable(&path, e))??;

        debug!("本地存储已打开: {} (库版本 {})", path, SCHEMA_VERSION);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// 存储文件路径
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 写入或覆盖一条记录
    ///
    /// # 参数
    /// - `partition`: 目标分区
    /// - `id`: 记录主键；队列分区传 `None` 由存储分配（严格递增，删除后不复用），
    ///   缓存分区必须携带服务端 ID，按 ID 覆盖写入
    /// - `payload`: 记录内容
    ///
    /// # 返回
    /// 返回带主键和入库时间的完整记录
    pub async fn put(
        &self,
        partition: Partition,
        id: Option<i64>,
        payload: JsonValue,
    ) -> Result<StoredRecord, StoreError> {
        let conn = Arc::clone(&self.conn);
        let table = partition.table();
        tokio::task::spawn_blocking(move || {
            let text =
                serde_json::to_string(&payload).map_err(|e| StoreError::transaction(table, e))?;
            let captured_at = Utc::now().to_rfc3339();
            let conn = lock(&conn);
            let id = match id {
                Some(id) => {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (id, captured_at, payload) VALUES (?1, ?2, ?3) \
                             ON CONFLICT(id) DO UPDATE SET \
                             captured_at = excluded.captured_at, payload = excluded.payload"
                        ),
                        params![id, captured_at, text],
                    )
                    .map_err(|e| StoreError::transaction(table, e))?;
                    id
                }
                None if partition == Partition::PendingSubmissions => {
                    conn.execute(
                        &format!("INSERT INTO {table} (captured_at, payload) VALUES (?1, ?2)"),
                        params![captured_at, text],
                    )
                    .map_err(|e| StoreError::transaction(table, e))?;
                    conn.last_insert_rowid()
                }
                None => return Err(StoreError::MissingKey { partition: table }),
            };

            debug!("写入分区 {}: 记录 #{}", table, id);

            Ok(StoredRecord {
                id,
                captured_at,
                payload,
            })
        })
        .await
        .map_err(|e| StoreError::transaction(table, e))?
    }

    /// 读取分区内全部记录
    ///
    /// # 返回
    /// 按写入顺序（主键升序）返回；分区为空时返回空列表，不是错误
    pub async fn get_all(&self, partition: Partition) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = Arc::clone(&self.conn);
        let table = partition.table();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT id, captured_at, payload FROM {table} ORDER BY id ASC"
                ))
                .map_err(|e| StoreError::transaction(table, e))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(|e| StoreError::transaction(table, e))?;

            let mut records = Vec::new();
            for row in rows {
                let (id, captured_at, text) = row.map_err(|e| StoreError::transaction(table, e))?;
                let payload =
                    serde_json::from_str(&text).map_err(|e| StoreError::transaction(table, e))?;
                records.push(StoredRecord {
                    id,
                    captured_at,
                    payload,
                });
            }
            Ok(records)
        })
        .await
        .map_err(|e| StoreError::transaction(table, e))?
    }

    /// 删除一条记录
    ///
    /// # 返回
    /// 记录存在并被删除返回 `true`；记录不存在是无操作，返回 `false`（不是错误）
    pub async fn delete(&self, partition: Partition, id: i64) -> Result<bool, StoreError> {
        let conn = Arc::clone(&self.conn);
        let table = partition.table();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let affected = conn
                .execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])
                .map_err(|e| StoreError::transaction(table, e))?;

            if affected > 0 {
                debug!("删除分区 {} 记录 #{}", table, id);
            }

            Ok(affected > 0)
        })
        .await
        .map_err(|e| StoreError::transaction(table, e))?
    }

    /// 分区内记录数量
    pub async fn count(&self, partition: Partition) -> Result<u64, StoreError> {
        let conn = Arc::clone(&self.conn);
        let table = partition.table();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .map_err(|e| StoreError::transaction(table, e))?;
            Ok(count as u64)
        })
        .await
        .map_err(|e| StoreError::transaction(table, e))?
    }
}

/// 取得连接锁，锁中毒时恢复内层连接继续使用
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
    let _journal: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .map_err(|e| StoreError::unavailable(path, e))?;

    initialize_schema(&conn).map_err(|e| StoreError::unavailable(path, e))?;
    check_version(&conn, path)?;

    Ok(conn)
}

fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS pending_submissions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            captured_at TEXT NOT NULL,
            payload     TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS cached_question_papers (
            id          INTEGER PRIMARY KEY,
            captured_at TEXT NOT NULL,
            payload     TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS cached_submissions (
            id          INTEGER PRIMARY KEY,
            captured_at TEXT NOT NULL,
            payload     TEXT NOT NULL
        );",
    )
}

fn check_version(conn: &Connection, path: &str) -> Result<(), StoreError> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM _meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::unavailable(path, e))?;

    match stored.and_then(|v| v.parse::<u32>().ok()) {
        Some(version) if version > SCHEMA_VERSION => Err(StoreError::unavailable(
            path,
            format!("库版本 {} 高于程序支持的版本 {}", version, SCHEMA_VERSION),
        )),
        Some(_) => Ok(()),
        None => {
            conn.execute(
                "INSERT OR REPLACE INTO _meta (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )
            .map_err(|e| StoreError::unavailable(path, e))?;
            Ok(())
        }
    }
}
