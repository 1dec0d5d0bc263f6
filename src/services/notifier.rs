//! 同步通知服务 - 业务能力层
//!
//! 只负责"发出一条用户可见通知"能力，不关心流程

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::{debug, info};

/// 同步完成通知的固定标题
pub const SYNC_DONE_TITLE: &str = "Submission Synced";

/// 同步通知服务
///
/// 职责：
/// - 将同步完成事件追加写入通知文件，一行一条
/// - 同时镜像到日志输出
/// - 只处理单条通知
/// - 不关心队列状态和流程顺序
pub struct Notifier {
    notify_file_path: String,
}

impl Notifier {
    /// 创建新的通知服务
    pub fn new() -> Self {
        Self {
            notify_file_path: "notify.txt".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            notify_file_path: path.into(),
        }
    }

    /// 发出一条"提交已同步"通知
    ///
    /// # 参数
    /// - `record_id`: 已同步的队列记录主键
    /// - `file_name`: 答题文件名
    ///
    /// # 返回
    /// 返回是否成功写入；调用方可以忽略失败，通知是尽力而为的
    pub async fn notify_synced(&self, record_id: i64, file_name: &str) -> Result<()> {
        info!("🔔 {}: 记录 #{} ({})", SYNC_DONE_TITLE, record_id, file_name);

        debug!(
            "写入通知文件: {} | 记录 {}",
            self.notify_file_path, record_id
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.notify_file_path)?;

        let line = format!(
            "{} | {} | 记录 #{} ({}) 已同步到服务器\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            SYNC_DONE_TITLE,
            record_id,
            file_name
        );

        file.write_all(line.as_bytes())?;

        Ok(())
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
