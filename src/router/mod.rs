//! 网络感知的响应路由 - 独立子系统
//!
//! ## 职责
//!
//! 本子系统为同一来源的所有请求决定响应来路，是离线体验的另一半：
//! 提交队列保证「写」不丢，响应路由保证「读」不白屏。
//!
//! ## 路由策略（按固定优先级）
//!
//! 1. **跨源请求**：原样放行，不缓存、不合成兜底
//! 2. **API 请求**：网络优先，断网时合成固定形态的离线 JSON 响应
//! 3. **静态资源**：缓存优先，未命中取网络并写入版本化缓存
//! 4. **页面导航**：网络优先 → 缓存 → 外壳页面兜底
//! 5. **其余同源请求**：缓存优先，网络兜底，不合成错误
//!
//! 路由同时维护本地存储的新鲜度：集合端点的 GET 成功响应会按
//! 服务端 ID 写入对应缓存分区，离线时上层可以直接读取快照。
//!
//! ## 生命周期
//!
//! - [`Router::install`]：把配置的外壳资源预缓存进当前版本缓存，整体成功或失败
//! - [`Router::activate`]：清除名称不等于当前版本的所有缓存
//!
//! install 失败时不应执行 activate，旧版本缓存继续服务。

pub mod asset_cache;
pub mod classify;

pub use asset_cache::{AssetCache, CachedAsset};
pub use classify::{classify, RequestClass};

use crate::config::RouterConfig;
use crate::error::ConfigError;
use crate::store::{Partition, SubmissionStore};
use anyhow::{bail, Context, Result};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 单次路由请求的网络超时
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// 离线合成响应的提示语
const OFFLINE_MESSAGE: &str = "网络不可用，请求已离线受理，恢复连接后自动同步";

/// 一次待路由的请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 请求完整地址
    pub url: String,
    /// 请求方法
    pub method: Method,
    /// 是否为整页导航请求
    pub navigation: bool,
}

impl FetchRequest {
    /// 普通 GET 请求
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            navigation: false,
        }
    }

    /// 整页导航请求
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            navigation: true,
        }
    }
}

/// 响应的来路
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// 直接来自网络
    Network,
    /// 来自本地缓存
    Cache,
    /// 外壳页面兜底
    Shell,
    /// 本地合成（离线提示）
    Synthesized,
}

/// 路由后的响应
#[derive(Debug, Clone)]
pub struct RoutedResponse {
    /// 响应状态码
    pub status: StatusCode,
    /// 响应内容类型
    pub content_type: String,
    /// 响应体
    pub body: Vec<u8>,
    /// 响应来路
    pub source: ResponseSource,
}

/// 网络感知的响应路由器
pub struct Router {
    config: RouterConfig,
    origin: Url,
    store: SubmissionStore,
    cache: AssetCache,
    http: reqwest::Client,
}

impl Router {
    /// 创建路由器
    ///
    /// # 返回
    /// 路由配置不合法（缓存名为空、外壳列表为空、前缀或源地址格式错误）
    /// 时返回 `ConfigError`，不会带着坏配置继续运行
    pub fn new(
        config: RouterConfig,
        store: SubmissionStore,
        cache: AssetCache,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let origin = Url::parse(&config.app_origin).map_err(|_| ConfigError::InvalidOrigin {
            value: config.app_origin.clone(),
        })?;

        Ok(Self {
            config,
            origin,
            store,
            cache,
            http: reqwest::Client::new(),
        })
    }

    /// 预缓存外壳资源（安装阶段）
    ///
    /// 整体成功或整体失败：先取齐全部资源再写缓存，任何一个资源
    /// 取不到就返回错误且不写入任何条目，调用方此时不应执行
    /// [`Router::activate`]
    pub async fn install(&self) -> Result<()> {
        let cache_name = self.config.versioned_cache_name();
        info!("📦 预缓存外壳资源 → {}", cache_name);

        // 先取齐，全部成功才落缓存
        let mut fetched = Vec::with_capacity(self.config.shell_assets.len());
        for asset in &self.config.shell_assets {
            let url = self.shell_url(asset)?;
            let resp = self
                .fetch(&Method::GET, &url)
                .await
                .with_context(|| format!("外壳资源 {} 请求失败", asset))?;
            if !resp.status.is_success() {
                bail!("外壳资源 {} 返回状态码 {}", asset, resp.status);
            }
            debug!("  ✓ {}", asset);
            fetched.push((url, resp));
        }

        for (url, resp) in fetched {
            self.cache
                .put(
                    &cache_name,
                    url.as_str(),
                    resp.status.as_u16(),
                    &resp.content_type,
                    resp.body,
                )
                .await
                .with_context(|| format!("外壳资源 {} 写入缓存失败", url))?;
        }

        info!("✓ 外壳资源预缓存完成 ({} 个)", self.config.shell_assets.len());
        Ok(())
    }

    /// 清除旧版本缓存（激活阶段）
    ///
    /// 只在 [`Router::install`] 成功后调用；当前版本之外的缓存全部删除
    pub async fn activate(&self) -> Result<()> {
        let current = self.config.versioned_cache_name();

        for name in self.cache.cache_names().await? {
            if name != current {
                let removed = self.cache.delete_cache(&name).await?;
                info!("🧹 清除旧版本缓存: {} ({} 条)", name, removed);
            }
        }

        Ok(())
    }

    /// 路由一个请求
    ///
    /// # 返回
    /// API 请求总能得到响应（必要时合成）；其余分类在网络和缓存都
    /// 无法给出响应时返回错误
    pub async fn handle(&self, request: &FetchRequest) -> Result<RoutedResponse> {
        let url = Url::parse(&request.url)
            .with_context(|| format!("无法解析请求地址: {}", request.url))?;

        match classify(&url, &self.origin, request.navigation, &self.config) {
            RequestClass::CrossOrigin => self.pass_through(request, &url).await,
            RequestClass::Api => Ok(self.network_first_api(request, &url).await),
            RequestClass::StaticAsset => self.cache_first_store(request, &url).await,
            RequestClass::Navigation => self.navigate_with_fallback(request, &url).await,
            RequestClass::Default => self.cache_first(request, &url).await,
        }
    }

    // ========== 五种路由策略 ==========

    /// 跨源请求：原样放行
    async fn pass_through(&self, request: &FetchRequest, url: &Url) -> Result<RoutedResponse> {
        self.fetch(&request.method, url)
            .await
            .with_context(|| format!("跨源请求失败: {}", url))
    }

    /// API 请求：网络优先，断网时合成离线响应
    ///
    /// 成功的集合响应顺带刷新本地缓存分区
    async fn network_first_api(&self, request: &FetchRequest, url: &Url) -> RoutedResponse {
        match self.fetch(&request.method, url).await {
            Ok(resp) => {
                if resp.status.is_success() {
                    self.refresh_partition(&request.method, url, &resp).await;
                }
                resp
            }
            Err(e) => {
                info!("📴 API 请求网络失败 ({}), 合成离线响应: {}", url.path(), e);
                synthesize_offline_response()
            }
        }
    }

    /// 静态资源：缓存优先，未命中取网络并写入当前版本缓存
    async fn cache_first_store(&self, request: &FetchRequest, url: &Url) -> Result<RoutedResponse> {
        if let Some(asset) = self.cache.get(url.as_str()).await? {
            debug!("缓存命中: {}", url.path());
            return Ok(cached_response(asset));
        }

        let resp = self
            .fetch(&request.method, url)
            .await
            .with_context(|| format!("静态资源请求失败: {}", url))?;

        // 只缓存成功响应，错误页不进缓存
        if resp.status.is_success() {
            let cache_name = self.config.versioned_cache_name();
            if let Err(e) = self
                .cache
                .put(
                    &cache_name,
                    url.as_str(),
                    resp.status.as_u16(),
                    &resp.content_type,
                    resp.body.clone(),
                )
                .await
            {
                warn!("静态资源写入缓存失败 ({}): {}", url.path(), e);
            }
        }

        Ok(resp)
    }

    /// 页面导航：网络优先 → 缓存 → 外壳页面兜底
    async fn navigate_with_fallback(
        &self,
        request: &FetchRequest,
        url: &Url,
    ) -> Result<RoutedResponse> {
        match self.fetch(&request.method, url).await {
            Ok(resp) => return Ok(resp),
            Err(e) => debug!("导航请求网络失败 ({}), 尝试缓存: {}", url.path(), e),
        }

        if let Some(asset) = self.cache.get(url.as_str()).await? {
            return Ok(cached_response(asset));
        }

        // 外壳列表首项是兜底页面，客户端路由拿到它仍能渲染任意页面
        let shell = match self.config.shell_assets.first() {
            Some(shell) => shell,
            None => bail!("外壳资源列表为空，导航请求无法兜底"),
        };
        let shell_url = self.shell_url(shell)?;
        match self.cache.get(shell_url.as_str()).await? {
            Some(asset) => {
                info!("⛑️ 导航兜底: {} → {}", url.path(), shell);
                let mut resp = cached_response(asset);
                resp.source = ResponseSource::Shell;
                Ok(resp)
            }
            None => bail!("导航请求无法完成，外壳页面 {} 未缓存", shell),
        }
    }

    /// 其余同源请求：缓存优先，网络兜底，不写缓存也不合成错误
    async fn cache_first(&self, request: &FetchRequest, url: &Url) -> Result<RoutedResponse> {
        if let Some(asset) = self.cache.get(url.as_str()).await? {
            debug!("缓存命中: {}", url.path());
            return Ok(cached_response(asset));
        }

        self.fetch(&request.method, url)
            .await
            .with_context(|| format!("请求失败: {}", url))
    }

    // ========== 网络与缓存分区刷新 ==========

    /// 发出实际的网络请求
    async fn fetch(&self, method: &Method, url: &Url) -> reqwest::Result<RoutedResponse> {
        let resp = self
            .http
            .request(method.clone(), url.clone())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = resp.bytes().await?.to_vec();

        Ok(RoutedResponse {
            status,
            content_type,
            body,
            source: ResponseSource::Network,
        })
    }

    /// 用集合端点的成功响应刷新本地缓存分区
    ///
    /// 快照按服务端 ID 覆盖写入；刷新失败只记日志，不影响响应本身
    async fn refresh_partition(&self, method: &Method, url: &Url, resp: &RoutedResponse) {
        if *method != Method::GET {
            return;
        }

        let partition = match url.path().strip_prefix(self.config.api_prefix.as_str()) {
            Some("question-papers") => Partition::CachedQuestionPapers,
            Some("submissions") => Partition::CachedSubmissions,
            _ => return,
        };

        let items: Vec<JsonValue> = match serde_json::from_slice(&resp.body) {
            Ok(items) => items,
            Err(_) => {
                debug!("集合响应不是 JSON 数组，跳过分区刷新: {}", url.path());
                return;
            }
        };

        let mut refreshed = 0usize;
        for item in items {
            let id = match item.get("id").and_then(JsonValue::as_i64) {
                Some(id) => id,
                None => continue,
            };
            match self.store.put(partition, Some(id), item).await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!("分区 {} 刷新失败 (记录 #{}): {}", partition, id, e),
            }
        }

        if refreshed > 0 {
            debug!("分区 {} 已刷新 {} 条快照", partition, refreshed);
        }
    }

    /// 外壳资源路径拼成完整地址
    fn shell_url(&self, path: &str) -> Result<Url> {
        self.origin
            .join(path)
            .with_context(|| format!("无法拼接外壳资源地址: {}", path))
    }
}

/// 缓存副本转为响应
fn cached_response(asset: CachedAsset) -> RoutedResponse {
    RoutedResponse {
        status: StatusCode::from_u16(asset.status).unwrap_or(StatusCode::OK),
        content_type: asset.content_type,
        body: asset.body,
        source: ResponseSource::Cache,
    }
}

/// 合成固定形态的离线响应（503 + JSON 错误体）
fn synthesize_offline_response() -> RoutedResponse {
    let body = serde_json::json!({ "error": OFFLINE_MESSAGE });
    RoutedResponse {
        status: StatusCode::SERVICE_UNAVAILABLE,
        content_type: "application/json".to_string(),
        body: body.to_string().into_bytes(),
        source: ResponseSource::Synthesized,
    }
}

// ========== 单元测试 ==========

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_response_shape_is_stable() {
        let resp = synthesize_offline_response();

        assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.content_type, "application/json");
        assert_eq!(resp.source, ResponseSource::Synthesized);

        let value: JsonValue = serde_json::from_slice(&resp.body).expect("离线响应体必须是合法 JSON");
        assert!(value.get("error").and_then(JsonValue::as_str).is_some());
    }

    #[test]
    fn test_fetch_request_constructors() {
        let plain = FetchRequest::get("https://exam.xdf.cn/api/health");
        assert_eq!(plain.method, Method::GET);
        assert!(!plain.navigation);

        let nav = FetchRequest::navigate("https://exam.xdf.cn/papers/3");
        assert_eq!(nav.method, Method::GET);
        assert!(nav.navigation);
    }
}
