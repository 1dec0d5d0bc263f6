//! 提交捕获流程 - 流程层
//!
//! 核心职责：定义"一份提交"的完整捕获流程
//!
//! 流程顺序：
//! 1. 尝试立即投递
//! 2. 投递失败 → 写入待同步队列（兜底）
//! 3. 注册 submit-answer 同步标签

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::{DeliveryOutcome, ExamApiClient};
use crate::config::Config;
use crate::models::{SubmissionPayload, SubmissionRequest};
use crate::services::{SyncRegistry, SUBMIT_ANSWER_TAG};
use crate::store::{Partition, SubmissionStore};
use crate::utils::logging::truncate_text;
use crate::workflow::submission_ctx::SubmissionCtx;

/// 捕获结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// 已直接送达服务端
    Delivered,
    /// 已入队等待后台同步
    Queued,
}

/// 提交捕获流程
///
/// - 编排完整的捕获流程
/// - 决定何时投递、何时入队、何时注册同步标签
/// - 依赖全部显式传入，测试时可替换为临时存储
/// - 投递失败不是错误；只有写入队列失败才向上传播
pub struct CaptureFlow {
    client: Arc<ExamApiClient>,
    store: SubmissionStore,
    registry: Arc<SyncRegistry>,
    verbose_logging: bool,
}

impl CaptureFlow {
    /// 创建新的提交捕获流程
    pub fn new(
        client: Arc<ExamApiClient>,
        store: SubmissionStore,
        registry: Arc<SyncRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            client,
            store,
            registry,
            verbose_logging: config.verbose_logging,
        }
    }

    pub async fn run(
        &self,
        request: &SubmissionRequest,
        ctx: &SubmissionCtx,
    ) -> Result<CaptureOutcome> {
        let payload = SubmissionPayload::from(request);

        if self.verbose_logging {
            self.log_payload(ctx, &payload);
        }

        // ========== 流程 1: 尝试立即投递 ==========
        info!("[提交 {}] 📤 尝试立即投递...", ctx.submission_index);

        match self.client.submit_answer(&payload).await {
            DeliveryOutcome::Accepted => {
                info!("[提交 {}] ✓ 已直接送达服务端", ctx.submission_index);
                return Ok(CaptureOutcome::Delivered);
            }
            DeliveryOutcome::Rejected(status) => {
                warn!(
                    "[提交 {}] ⚠️ 服务端拒绝 ({}), 转入待同步队列",
                    ctx.submission_index, status
                );
            }
            DeliveryOutcome::Unreachable(reason) => {
                info!(
                    "[提交 {}] 📴 网络不可达 ({}), 转入待同步队列",
                    ctx.submission_index, reason
                );
            }
        }

        // ========== 流程 2: 写入待同步队列 ==========
        // 投递失败绝不丢数据；队列写不进去才是硬失败
        let record = self
            .store
            .put(
                Partition::PendingSubmissions,
                None,
                serde_json::to_value(&payload)?,
            )
            .await
            .with_context(|| format!("{} 无法写入待同步队列", ctx))?;

        info!(
            "[提交 {}] 📦 已入队: 记录 #{}",
            ctx.submission_index, record.id
        );

        // ========== 流程 3: 注册同步标签 ==========
        self.registry.register(SUBMIT_ANSWER_TAG);

        Ok(CaptureOutcome::Queued)
    }

    // ========== 日志辅助方法 ==========

    /// 显示载荷预览
    fn log_payload(&self, ctx: &SubmissionCtx, payload: &SubmissionPayload) {
        info!(
            "[提交 {}] 载荷: 试卷 {} | 文件 {} | 内容 {}",
            ctx.submission_index,
            payload.question_paper_id,
            payload.file_name,
            truncate_text(&payload.file_content, 48)
        );
    }
}
