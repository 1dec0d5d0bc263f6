//! 提交代理 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责答卷捕获、离线降级和网络恢复监听。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：打开本地存储、构建客户端、重挂遗留的同步标签
//! 2. **路由生命周期**：安装（预缓存外壳）成功后再激活（清旧版本缓存）
//! 3. **离线降级**：本地存储不可用时只警告一次，降级为仅在线模式
//! 4. **顺序捕获**：扫描提交目录并逐份捕获（直接送达或入队待同步）
//! 5. **快照刷新**：通过响应路由刷新试卷列表快照
//! 6. **同步触发**：网络可达且有在册标签时触发后台同步
//! 7. **驻留监听**：watch 模式下按固定间隔探测网络恢复
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单份提交的细节
//! - **资源所有者**：唯一持有存储句柄和路由器的模块
//! - **向下委托**：捕获委托 `CaptureFlow`，同步委托 `reconciler`

use crate::clients::{DeliveryOutcome, ExamApiClient};
use crate::config::Config;
use crate::error::AgentResult;
use crate::models::{SubmissionPayload, SubmissionRequest};
use crate::orchestrator::reconciler;
use crate::router::{AssetCache, FetchRequest, ResponseSource, Router};
use crate::services::{Notifier, SyncRegistry, SUBMIT_ANSWER_TAG};
use crate::store::{Partition, SubmissionStore};
use crate::workflow::{CaptureFlow, CaptureOutcome, SubmissionCtx};
use anyhow::{bail, Result};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    client: Arc<ExamApiClient>,
    registry: Arc<SyncRegistry>,
    notifier: Notifier,
    offline: Option<OfflineStack>,
}

/// 离线能力组件组
///
/// 本地存储打不开时整组缺席，应用降级为仅在线模式
struct OfflineStack {
    store: SubmissionStore,
    flow: CaptureFlow,
    router: Router,
}

impl App {
    /// 初始化应用
    ///
    /// 本地存储不可用不是致命错误：记一次警告后以仅在线模式继续
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let client = Arc::new(ExamApiClient::new(&config));
        let registry = Arc::new(SyncRegistry::new());
        let notifier = Notifier::with_path(&config.notify_file);

        let offline =
            match build_offline_stack(&config, Arc::clone(&client), Arc::clone(&registry)).await {
                Ok(stack) => Some(stack),
                Err(e) => {
                    // 只报告一次，之后静默走仅在线模式
                    warn!("⚠️ 本地存储不可用，离线捕获降级为仅在线模式: {}", e);
                    None
                }
            };

        // 上一次运行遗留的队列在启动时重新挂上同步标签
        if let Some(stack) = &offline {
            match stack.store.count(Partition::PendingSubmissions).await {
                Ok(0) => {}
                Ok(depth) => {
                    registry.register(SUBMIT_ANSWER_TAG);
                    info!("♻️ 发现上次遗留的 {} 条待同步记录", depth);
                }
                Err(e) => warn!("读取队列深度失败: {}", e),
            }
        }

        Ok(Self {
            config,
            client,
            registry,
            notifier,
            offline,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        self.install_router().await;

        // 扫描并逐份捕获待提交答卷
        let requests = self.load_spool().await?;
        let stats = self.capture_all(requests).await;

        // 刷新试卷列表快照（离线时拿到合成响应，自动跳过）
        self.refresh_paper_cache().await;

        // 触发一次后台同步
        self.fire_due_sync().await;

        print_final_stats(&stats, self.queue_depth().await);

        // watch 模式驻留监听网络恢复
        if self.config.watch_mode {
            self.watch_loop().await;
        }

        Ok(())
    }

    /// 安装并激活响应路由
    ///
    /// 预缓存失败不阻止启动：跳过激活，旧版本缓存继续服务
    async fn install_router(&self) {
        let stack = match &self.offline {
            Some(stack) => stack,
            None => return,
        };

        match stack.router.install().await {
            Ok(()) => {
                if let Err(e) = stack.router.activate().await {
                    warn!("⚠️ 旧版本缓存清理失败: {}", e);
                }
            }
            Err(e) => warn!("⚠️ 外壳资源预缓存未完成，保留旧版本缓存: {}", e),
        }
    }

    /// 加载提交目录
    async fn load_spool(&self) -> Result<Vec<SubmissionRequest>> {
        info!("\n📁 正在扫描待提交的答卷...");
        crate::models::load_spool_folder(&self.config.spool_folder).await
    }

    /// 逐份捕获所有答卷
    async fn capture_all(&self, requests: Vec<SubmissionRequest>) -> CaptureStats {
        if requests.is_empty() {
            warn!("⚠️ 没有找到待提交的TOML文件");
            return CaptureStats::default();
        }

        info!("✓ 找到 {} 份待提交答卷\n", requests.len());

        let mut stats = CaptureStats::default();

        for (idx, request) in requests.iter().enumerate() {
            let submission_index = idx + 1;
            let ctx = SubmissionCtx::new(
                request.question_paper_id,
                submission_index,
                request.file_name.clone(),
            );

            let outcome = match &self.offline {
                Some(stack) => stack.flow.run(request, &ctx).await,
                None => self.capture_online_only(request, &ctx).await,
            };

            match outcome {
                Ok(CaptureOutcome::Delivered) => {
                    stats.delivered += 1;
                    cleanup_spool_file(request, &ctx);
                }
                Ok(CaptureOutcome::Queued) => {
                    stats.queued += 1;
                    cleanup_spool_file(request, &ctx);
                }
                Err(e) => {
                    error!("{} ❌ 捕获失败: {}", ctx, e);
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// 仅在线模式的直接投递（本地存储不可用时的降级路径）
    async fn capture_online_only(
        &self,
        request: &SubmissionRequest,
        ctx: &SubmissionCtx,
    ) -> Result<CaptureOutcome> {
        let payload = SubmissionPayload::from(request);
        match self.client.submit_answer(&payload).await {
            DeliveryOutcome::Accepted => {
                info!("{} ✓ 已直接送达服务端", ctx);
                Ok(CaptureOutcome::Delivered)
            }
            DeliveryOutcome::Rejected(status) => {
                bail!("服务端拒绝且队列不可用 (状态码 {})", status)
            }
            DeliveryOutcome::Unreachable(reason) => {
                bail!("网络不可达且队列不可用: {}", reason)
            }
        }
    }

    /// 通过响应路由刷新试卷列表快照
    async fn refresh_paper_cache(&self) {
        let stack = match &self.offline {
            Some(stack) => stack,
            None => return,
        };

        let url = format!(
            "{}{}question-papers",
            self.config.router.app_origin, self.config.router.api_prefix
        );

        match stack.router.handle(&FetchRequest::get(url)).await {
            Ok(resp) if resp.source == ResponseSource::Synthesized => {
                info!("📴 离线状态，试卷快照维持上次内容");
            }
            Ok(resp) if resp.status.is_success() => debug!("✓ 试卷列表快照已刷新"),
            Ok(resp) => debug!("试卷列表请求返回 {}", resp.status),
            Err(e) => warn!("试卷快照刷新失败: {}", e),
        }
    }

    /// 网络可达且有在册标签时触发后台同步
    async fn fire_due_sync(&self) {
        let stack = match &self.offline {
            Some(stack) => stack,
            None => return,
        };

        if !self.registry.has_pending() {
            return;
        }

        if !self.client.probe().await {
            info!("📴 网络不可达，同步标签保持在册");
            return;
        }

        for tag in self.registry.take_due() {
            match tag.as_str() {
                SUBMIT_ANSWER_TAG => self.run_submission_sync(stack, &tag).await,
                other => debug!("没有对应处理器的同步标签: {}", other),
            }
        }
    }

    /// 执行一次 submit-answer 标签的同步
    ///
    /// 处理后仍有剩余记录（或队列读不出来）时重新挂上标签，等待下次触发
    async fn run_submission_sync(&self, stack: &OfflineStack, tag: &str) {
        info!("⚡ 触发同步标签: {}", tag);

        match reconciler::drain_queue(&stack.store, &self.client, &self.notifier).await {
            Ok(stats) if stats.is_drained() => {}
            Ok(stats) => {
                self.registry.register(tag);
                info!("♻️ 仍有 {} 条记录待同步，标签重新在册", stats.retained);
            }
            Err(e) => {
                error!("❌ 后台同步失败: {}", e);
                self.registry.register(tag);
            }
        }
    }

    /// 当前队列深度（读不出来按 0 报告，不中断流程）
    async fn queue_depth(&self) -> u64 {
        match &self.offline {
            Some(stack) => match stack.store.count(Partition::PendingSubmissions).await {
                Ok(depth) => depth,
                Err(e) => {
                    debug!("读取队列深度失败: {}", e);
                    0
                }
            },
            None => 0,
        }
    }

    /// 驻留监听网络恢复，不返回
    async fn watch_loop(&self) {
        info!(
            "👀 进入驻留监听模式 (探测间隔 {} 秒)",
            self.config.probe_interval_secs
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.probe_interval_secs));
        let mut was_online = true;

        loop {
            interval.tick().await;
            let online = self.client.probe().await;

            if online && !was_online {
                info!("📶 网络已恢复");
            }
            if !online && was_online {
                info!("📴 网络已断开");
            }
            was_online = online;

            if online && self.registry.has_pending() {
                self.fire_due_sync().await;
            }
        }
    }
}

/// 构建离线能力组件组
///
/// 任何一个环节失败都视为存储不可用，由调用方统一降级处理
async fn build_offline_stack(
    config: &Config,
    client: Arc<ExamApiClient>,
    registry: Arc<SyncRegistry>,
) -> AgentResult<OfflineStack> {
    let store = SubmissionStore::open(&config.store_path).await?;
    let cache = AssetCache::open(&config.cache_path).await?;
    let router = Router::new(config.router.clone(), store.clone(), cache)?;
    let flow = CaptureFlow::new(client, store.clone(), registry, config);

    Ok(OfflineStack {
        store,
        flow,
        router,
    })
}

/// 捕获统计
#[derive(Debug, Default)]
struct CaptureStats {
    delivered: usize,
    queued: usize,
    failed: usize,
}

/// 捕获完成后清理来源 TOML 文件
///
/// 送达和入队都算捕获完成：记录已进入存储或服务端，TOML 使命结束
fn cleanup_spool_file(request: &SubmissionRequest, ctx: &SubmissionCtx) {
    if let Some(path) = &request.file_path {
        match fs::remove_file(path) {
            Ok(_) => info!("{} 🗑️ 已删除提交文件: {}", ctx, path),
            Err(e) => warn!("{} 提交文件删除失败 ({}): {}", ctx, path, e),
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 离线答卷提交代理");
    info!("📊 服务端地址: {}", config.api_base_url);
    info!("📊 提交目录: {}", config.spool_folder);
    info!("{}", "=".repeat(60));
}

fn print_final_stats(stats: &CaptureStats, queue_depth: u64) {
    info!("\n{}", "=".repeat(60));
    info!("📊 本轮捕获统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 直接送达: {}", stats.delivered);
    info!("📦 入队待同步: {}", stats.queued);
    info!("❌ 捕获失败: {}", stats.failed);
    info!("♻️ 当前队列深度: {}", queue_depth);
    info!("{}", "=".repeat(60));
}
