use thiserror::Error;

/// 应用程序错误类型
///
/// 离线组件组装过程中可能出现的两类失败，
/// 由编排层统一捕获并降级处理
#[derive(Debug, Error)]
pub enum AgentError {
    /// 本地存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 本地存储错误
///
/// 区分两种情况：
/// - `Unavailable`：存储整体不可用，离线能力降级为仅在线模式
/// - `Transaction`：单次读写失败，向直接调用方上报，不在内部重试
#[derive(Debug, Error)]
pub enum StoreError {
    /// 存储不可用（无法打开数据库文件，或库版本高于程序支持的版本）
    #[error("存储不可用 ({path}): {reason}")]
    Unavailable { path: String, reason: String },

    /// 单次读写事务失败
    #[error("存储事务失败 (分区: {partition}): {source}")]
    Transaction {
        partition: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 缓存分区的记录必须携带服务端分配的主键
    #[error("分区 {partition} 的记录缺少主键")]
    MissingKey { partition: &'static str },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置字段不能为空
    #[error("配置字段 {field} 不能为空")]
    EmptyField { field: &'static str },

    /// 应用源地址解析失败
    #[error("无法解析应用源地址: {value}")]
    InvalidOrigin { value: String },

    /// API 路径前缀必须以 / 开头
    #[error("API 路径前缀必须以 / 开头: {value}")]
    BadApiPrefix { value: String },
}

// ========== 便捷构造函数 ==========

impl StoreError {
    /// 创建存储不可用错误
    pub fn unavailable(path: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::Unavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// 创建事务失败错误
    pub fn transaction(
        partition: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::Transaction {
            partition,
            source: Box::new(source),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AgentResult<T> = std::result::Result<T, AgentError>;
