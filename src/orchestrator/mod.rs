//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责捕获调度和后台同步的时机控制，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `agent` - 提交代理
//! - 管理应用生命周期（初始化、运行、驻留监听）
//! - 组装离线组件组（存储、捕获流程、响应路由），失败时降级为仅在线模式
//! - 扫描提交目录并逐份捕获（Vec<SubmissionRequest>）
//! - 决定后台同步的触发时机（网络可达 + 标签在册）
//! - 输出全局统计信息
//!
//! ### `reconciler` - 后台同步处理器
//! - 按入队顺序重放待同步队列
//! - 服务端确认后删除记录并发出同步通知
//! - 单条失败不中止，保留记录等待下次触发
//! - 输出单次同步的统计信息
//!
//! ## 层次关系
//!
//! ```text
//! agent (决定何时捕获、何时同步)
//!     ↓
//! reconciler (清空一次待同步队列)
//!     ↓
//! workflow::CaptureFlow (捕获单份提交)
//!     ↓
//! services / clients (能力层：notify / sync_registry / exam_api)
//!     ↓
//! store / router (基础设施：本地存储、响应路由)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：agent 管时机，reconciler 管一次清空
//! 2. **资源隔离**：只有编排层持有存储句柄和路由器
//! 3. **向下依赖**：编排层 → workflow → services → store
//! 4. **无业务逻辑**：只做调度和统计，不做具体投递判断

pub mod agent;
pub mod reconciler;

// 重新导出主要类型
pub use agent::App;
pub use reconciler::{drain_queue, SyncStats};
