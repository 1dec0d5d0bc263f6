/// 考试平台 API 客户端
///
/// 封装所有与考试平台提交接口相关的调用逻辑
use crate::config::Config;
use crate::models::SubmissionPayload;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// 单次投递的结果
///
/// 投递失败是一种结果而不是错误：调用方据此决定入队还是保留在队列中，
/// 永远不会因为投递失败而中断流程
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 服务端已接收（任意 2xx 状态码）
    Accepted,
    /// 服务端拒绝（非 2xx 状态码）
    Rejected(StatusCode),
    /// 网络层不可达（连接失败或超时）
    Unreachable(String),
}

/// 考试平台 API 客户端
pub struct ExamApiClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

/// 单次投递请求的超时
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// 连通性探测的超时（比投递超时更短，避免拖慢监听循环）
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

impl ExamApiClient {
    /// 创建新的考试平台客户端
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            token: config.session_token.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// 使用自定义地址创建（测试时指向本地模拟服务）
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    /// 提交答题文件
    ///
    /// # 参数
    /// - `payload`: 投递载荷（camelCase JSON 请求体）
    ///
    /// # 返回
    /// 返回投递结果，三种情况都不是错误
    pub async fn submit_answer(&self, payload: &SubmissionPayload) -> DeliveryOutcome {
        let endpoint = format!("{}/api/submissions", self.base_url);

        debug!(
            "投递答题文件: 试卷 {} 文件 {}",
            payload.question_paper_id, payload.file_name
        );

        let response = self
            .http
            .post(&endpoint)
            .header("examtoken", &self.token)
            .timeout(DELIVERY_TIMEOUT)
            .json(payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                debug!("投递成功: {}", resp.status());
                DeliveryOutcome::Accepted
            }
            Ok(resp) => {
                warn!("服务端拒绝投递: {} ({})", resp.status(), endpoint);
                DeliveryOutcome::Rejected(resp.status())
            }
            Err(e) => {
                debug!("网络层投递失败: {}", e);
                DeliveryOutcome::Unreachable(e.to_string())
            }
        }
    }

    /// 连通性探测
    ///
    /// 只关心网络层是否可达：服务端返回任何状态码都算在线
    pub async fn probe(&self) -> bool {
        let endpoint = format!("{}/api/health", self.base_url);

        match self
            .http
            .get(&endpoint)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => {
                debug!("连通性探测成功: {}", resp.status());
                true
            }
            Err(e) => {
                debug!("连通性探测失败: {}", e);
                false
            }
        }
    }
}
