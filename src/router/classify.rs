//! 请求分类
//!
//! 按固定优先级把请求归入五类，顺序不可调换：
//! 跨源 → API → 静态资源 → 导航 → 其余。
//! 例如带静态扩展名的 API 路径按 API 处理，带扩展名的导航按静态资源处理。

use crate::config::RouterConfig;
use crate::utils::mime::is_static_asset_path;
use reqwest::Url;

/// 请求分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// 跨源请求：原样放行，不缓存、不合成兜底
    CrossOrigin,
    /// API 请求：网络优先，断网时合成离线响应
    Api,
    /// 静态资源：缓存优先，未命中取网络并写入版本化缓存
    StaticAsset,
    /// 页面导航：网络优先，缓存兜底，最后回退外壳页面
    Navigation,
    /// 其余同源请求：缓存优先，网络兜底，不合成错误
    Default,
}

/// 对一个请求分类
///
/// # 参数
/// - `url`: 请求的完整地址
/// - `origin`: 应用自身的源（已解析）
/// - `navigation`: 是否为整页导航请求
pub fn classify(url: &Url, origin: &Url, navigation: bool, config: &RouterConfig) -> RequestClass {
    if url.origin() != origin.origin() {
        return RequestClass::CrossOrigin;
    }

    if url.path().starts_with(config.api_prefix.as_str()) {
        return RequestClass::Api;
    }

    if is_static_asset_path(url.path()) {
        return RequestClass::StaticAsset;
    }

    if navigation {
        return RequestClass::Navigation;
    }

    RequestClass::Default
}

// ========== 单元测试 ==========
