//! 提交处理上下文
//!
//! 封装"我正在处理哪一份答题提交"这一信息

use std::fmt::Display;

/// 提交处理上下文
///
/// 包含处理单份提交所需的所有上下文信息
#[derive(Debug, Clone)]
pub struct SubmissionCtx {
    /// 目标试卷 ID
    pub question_paper_id: i64,

    /// 提交在本次扫描中的序号（仅用于日志显示）
    pub submission_index: usize,

    /// 答题文件名
    pub file_name: String,
}

impl SubmissionCtx {
    /// 创建新的提交上下文
    pub fn new(question_paper_id: i64, submission_index: usize, file_name: String) -> Self {
        Self {
            question_paper_id,
            submission_index,
            file_name,
        }
    }
}

impl Display for SubmissionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[提交 {} 试卷#{} 文件#{}]",
            self.submission_index, self.question_paper_id, self.file_name
        )
    }
}
