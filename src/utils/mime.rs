//! MIME 类型与 data URL 工具
//!
//! 答卷文件编码和静态资源分类共用同一份扩展名表

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use phf::{phf_map, phf_set, Map, Set};
use std::path::Path;

/// 扩展名 → MIME 类型映射
pub static MIME_TYPES: Map<&'static str, &'static str> = phf_map! {
    "html" => "text/html",
    "css" => "text/css",
    "js" => "application/javascript",
    "mjs" => "application/javascript",
    "json" => "application/json",
    "webmanifest" => "application/manifest+json",
    "png" => "image/png",
    "jpg" => "image/jpeg",
    "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "svg" => "image/svg+xml",
    "webp" => "image/webp",
    "ico" => "image/x-icon",
    "woff" => "font/woff",
    "woff2" => "font/woff2",
    "ttf" => "font/ttf",
    "otf" => "font/otf",
    "pdf" => "application/pdf",
    "txt" => "text/plain",
    "doc" => "application/msword",
    "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "zip" => "application/zip",
};

/// 静态资源扩展名白名单（响应路由分类用）
///
/// 注意不含 html：整页加载按导航请求处理，不按静态资源处理
pub static STATIC_ASSET_EXTS: Set<&'static str> = phf_set! {
    "css", "js", "mjs", "json", "webmanifest",
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico",
    "woff", "woff2", "ttf", "otf",
};

/// 推断文件的 MIME 类型，未知扩展名回退为二进制流
pub fn mime_for_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .and_then(|e| MIME_TYPES.get(e.as_str()).copied())
        .unwrap_or("application/octet-stream")
}

/// 判断 URL 路径是否命中静态资源白名单
pub fn is_static_asset_path(path: &str) -> bool {
    match path.rsplit_once('.') {
        Some((_, ext)) => STATIC_ASSET_EXTS.contains(ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// 将文件内容编码为 data URL
///
/// # 参数
/// - `path`: 文件路径（用于推断 MIME 类型）
/// - `bytes`: 文件内容
///
/// # 返回
/// 形如 `data:application/pdf;base64,AAA=` 的字符串
pub fn to_data_url(path: &Path, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_for_path(path), STANDARD.encode(bytes))
}
