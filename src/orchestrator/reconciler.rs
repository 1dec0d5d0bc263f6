//! 后台同步处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是 `submit-answer` 同步标签触发后的处理器，负责清空待同步队列。
//!
//! ## 核心功能
//!
//! 1. **顺序重放**：按入队顺序逐条投递，绝不并发
//! 2. **确认后删除**：只有服务端确认（任意 2xx）才删除记录
//! 3. **不提前中止**：单条投递失败不阻塞后续记录
//! 4. **重复触发安全**：队列为空时零网络调用、零副作用
//! 5. **同步通知**：每条同步成功的记录发出一次用户可见通知
//!
//! ## 设计特点
//!
//! - 通知失败只记警告：记录已安全送达并删除，不因通知回滚任何事情
//! - 删除失败时记录保留，下次触发会重新投递；服务端对重复提交负责去重

use crate::clients::{DeliveryOutcome, ExamApiClient};
use crate::models::PendingSubmission;
use crate::services::Notifier;
use crate::store::{Partition, SubmissionStore};
use anyhow::{Context, Result};
use tracing::{error, info, warn};

/// 一次同步触发的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    /// 送达并删除的记录数
    pub delivered: usize,
    /// 保留在队列中的记录数
    pub retained: usize,
}

impl SyncStats {
    /// 队列是否已清空
    pub fn is_drained(&self) -> bool {
        self.retained == 0
    }
}

/// 清空待同步队列
///
/// # 参数
/// - `store`: 本地存储句柄
/// - `client`: 考试平台客户端
/// - `notifier`: 同步完成通知服务
///
/// # 返回
/// 返回本次触发的同步统计；队列本身读不出来才返回错误
pub async fn drain_queue(
    store: &SubmissionStore,
    client: &ExamApiClient,
    notifier: &Notifier,
) -> Result<SyncStats> {
    let records = store
        .get_all(Partition::PendingSubmissions)
        .await
        .context("无法读取待同步队列")?;

    if records.is_empty() {
        info!("♻️ 待同步队列为空，本次触发无事可做");
        return Ok(SyncStats::default());
    }

    log_drain_start(records.len());

    let mut stats = SyncStats::default();

    // ========== 按入队顺序逐条重放（绝不并发） ==========
    for record in records {
        let record_id = record.id;
        let pending = match PendingSubmission::try_from(record) {
            Ok(pending) => pending,
            Err(e) => {
                // 载荷坏了也不删：数据不静默丢失，留给人工处理
                error!("[记录 #{}] 载荷无法解析，保留在队列中: {}", record_id, e);
                stats.retained += 1;
                continue;
            }
        };

        info!(
            "[记录 #{}] 📤 重放投递: 试卷 {} 文件 {}",
            pending.id, pending.payload.question_paper_id, pending.payload.file_name
        );

        match client.submit_answer(&pending.payload).await {
            DeliveryOutcome::Accepted => {
                handle_accepted(store, notifier, &pending, &mut stats).await;
            }
            DeliveryOutcome::Rejected(status) => {
                warn!(
                    "[记录 #{}] ⚠️ 服务端拒绝 ({}), 保留待下次触发",
                    pending.id, status
                );
                stats.retained += 1;
            }
            DeliveryOutcome::Unreachable(reason) => {
                info!(
                    "[记录 #{}] 📴 网络不可达 ({}), 保留待下次触发",
                    pending.id, reason
                );
                stats.retained += 1;
            }
        }
    }

    log_drain_complete(&stats);

    Ok(stats)
}

/// 服务端确认后的收尾：删除记录、发出通知
async fn handle_accepted(
    store: &SubmissionStore,
    notifier: &Notifier,
    pending: &PendingSubmission,
    stats: &mut SyncStats,
) {
    match store.delete(Partition::PendingSubmissions, pending.id).await {
        Ok(_) => {
            info!("[记录 #{}] ✓ 已送达并出队", pending.id);
            stats.delivered += 1;
            if let Err(e) = notifier.notify_synced(pending.id, &pending.payload.file_name).await {
                warn!("[记录 #{}] 同步通知写入失败: {}", pending.id, e);
            }
        }
        Err(e) => {
            // 记录留在队列里，下次触发重投；服务端负责对重复提交去重
            error!("[记录 #{}] 投递成功但出队失败: {}", pending.id, e);
            stats.retained += 1;
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_drain_start(total: usize) {
    info!("{}", "─".repeat(60));
    info!("♻️ 开始后台同步: {} 条待同步记录", total);
    info!("{}", "─".repeat(60));
}

fn log_drain_complete(stats: &SyncStats) {
    info!(
        "✓ 后台同步结束: 送达 {} 条, 保留 {} 条",
        stats.delivered, stats.retained
    );
}
