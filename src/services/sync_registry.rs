//! 后台同步注册表 - 业务能力层
//!
//! 记录"哪些同步标签待触发"。调度由外部决定（网络恢复监听循环），
//! 本模块只维护标签集合。

use std::collections::BTreeSet;
use std::sync::Mutex;
use tracing::debug;

/// 答题提交使用的同步标签
pub const SUBMIT_ANSWER_TAG: &str = "submit-answer";

/// 后台同步注册表
///
/// 职责：
/// - 注册同步标签（重复注册合并为一次）
/// - 触发时整体取出待触发的标签
/// - 队列未清空时允许重新注册同一标签
pub struct SyncRegistry {
    tags: Mutex<BTreeSet<String>>,
}

impl SyncRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            tags: Mutex::new(BTreeSet::new()),
        }
    }

    /// 注册一个同步标签
    ///
    /// # 返回
    /// 标签是新注册的返回 `true`；已存在时合并为一次注册，返回 `false`
    pub fn register(&self, tag: &str) -> bool {
        let added = self.lock().insert(tag.to_string());
        if added {
            debug!("注册同步标签: {}", tag);
        }
        added
    }

    /// 指定标签是否在册
    pub fn is_registered(&self, tag: &str) -> bool {
        self.lock().contains(tag)
    }

    /// 是否有任何待触发的标签
    pub fn has_pending(&self) -> bool {
        !self.lock().is_empty()
    }

    /// 取出全部待触发标签
    ///
    /// 取出后注册表清空；触发处理后若仍有剩余记录，由调用方重新注册
    pub fn take_due(&self) -> Vec<String> {
        let mut tags = self.lock();
        let due: Vec<String> = tags.iter().cloned().collect();
        tags.clear();
        due
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.tags.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SyncRegistry {
    fn default() -> Self {
        Self::new()
    }
}
