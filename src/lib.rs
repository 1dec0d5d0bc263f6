//! # Offline Answer Submit
//!
//! 一个面向弱网考场的离线答卷提交代理
//!
//! 答卷捕获永不因断网失败：能送达就直接送达，送不达就落到本地
//! 持久队列，网络恢复后按入队顺序重放，服务端确认一条删除一条。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `store` - 唯一的 SQLite 连接持有者，三个分区的读写能力
//! - `router` - 网络感知的响应路由（独立子系统，自带版本化资源缓存）
//!
//! ### ② 业务能力层（Services / Clients）
//! - `clients/ExamApiClient` - 考试平台投递与连通性探测能力
//! - `services/SyncRegistry` - 同步标签登记能力
//! - `services/Notifier` - 同步完成通知能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/SubmissionCtx` - 上下文封装（question_paper_id + submission_index）
//! - `workflow/CaptureFlow` - 捕获流程（投递 → 入队 → 挂同步标签）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/agent` - 提交代理，管理资源、降级和同步时机
//! - `orchestrator/reconciler` - 后台同步处理器，清空待同步队列
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod router;
pub mod store;

pub mod clients;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{DeliveryOutcome, ExamApiClient};
pub use config::{Config, RouterConfig};
pub use error::{AgentError, AgentResult, ConfigError, StoreError};
pub use models::{PendingSubmission, SubmissionPayload, SubmissionRequest};
pub use orchestrator::{drain_queue, App, SyncStats};
pub use router::{FetchRequest, RequestClass, ResponseSource, RoutedResponse, Router};
pub use services::{Notifier, SyncRegistry, SUBMIT_ANSWER_TAG, SYNC_DONE_TITLE};
pub use store::{Partition, StoredRecord, SubmissionStore};
pub use workflow::{CaptureFlow, CaptureOutcome, SubmissionCtx};
