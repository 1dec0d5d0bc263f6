//! 答题提交相关的数据模型

use crate::store::StoredRecord;
use serde::{Deserialize, Serialize};

/// 一份待提交的答题请求
///
/// 由提交目录中的 TOML 文件加载而来，`file_content` 已编码为 data URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// 目标试卷 ID
    pub question_paper_id: i64,
    /// 答题文件名
    pub file_name: String,
    /// 文件内容（data URL 形式的 base64 编码）
    pub file_content: String,
    /// 来源 TOML 文件路径（捕获成功后清理用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// 投递载荷（提交接口的 JSON 请求体）
///
/// 字段名按服务端约定使用 camelCase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub question_paper_id: i64,
    pub file_name: String,
    pub file_content: String,
}

impl From<&SubmissionRequest> for SubmissionPayload {
    fn from(request: &SubmissionRequest) -> Self {
        Self {
            question_paper_id: request.question_paper_id,
            file_name: request.file_name.clone(),
            file_content: request.file_content.clone(),
        }
    }
}

/// 队列中的一条待同步提交
///
/// 是存储记录在提交域上的类型化视图
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSubmission {
    /// 存储分配的记录主键
    pub id: i64,
    /// 入队时间（RFC 3339）
    pub captured_at: String,
    /// 投递载荷
    pub payload: SubmissionPayload,
}

impl TryFrom<StoredRecord> for PendingSubmission {
    type Error = serde_json::Error;

    fn try_from(record: StoredRecord) -> Result<Self, Self::Error> {
        let payload: SubmissionPayload = serde_json::from_value(record.payload)?;
        Ok(Self {
            id: record.id,
            captured_at: record.captured_at,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format_is_camel_case() {
        let payload = SubmissionPayload {
            question_paper_id: 7,
            file_name: "ans.pdf".to_string(),
            file_content: "data:application/pdf;base64,AAA=".to_string(),
        };

        let value = serde_json::to_value(&payload).expect("载荷序列化失败");
        assert_eq!(value["questionPaperId"], 7);
        assert_eq!(value["fileName"], "ans.pdf");
        assert_eq!(value["fileContent"], "data:application/pdf;base64,AAA=");
    }
}
