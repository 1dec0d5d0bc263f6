use crate::error::ConfigError;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 考试平台 API 地址
    pub api_base_url: String,
    /// 会话令牌
    pub session_token: String,
    /// 本地存储数据库文件路径
    pub store_path: String,
    /// 静态资源缓存数据库文件路径
    pub cache_path: String,
    /// 待提交答卷的 TOML 文件存放目录
    pub spool_folder: String,
    /// 同步完成通知写入的文件
    pub notify_file: String,
    /// 网络探测间隔（秒）
    pub probe_interval_secs: u64,
    /// 队列处理完后是否驻留监听网络恢复
    pub watch_mode: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 响应路由配置
    pub router: RouterConfig,
}

/// 响应路由配置
///
/// 缓存名称与版本在构造时一次性传入，运行期间只读。
/// 版本号变更后，旧版本缓存会在 activate 时清除。
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// 应用自身源（跨源判定基准）
    pub app_origin: String,
    /// API 请求路径前缀
    pub api_prefix: String,
    /// 静态资源缓存名称
    pub cache_name: String,
    /// 缓存版本号
    pub cache_version: u32,
    /// 应用外壳资源列表（install 时预缓存，首项为导航兜底页）
    pub shell_assets: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://exam.xdf.cn".to_string(),
            session_token: "8A1C0E5F4B2D4936A7E1205F3C88D412".to_string(),
            store_path: "offline_queue.db".to_string(),
            cache_path: "asset_cache.db".to_string(),
            spool_folder: "outbox_toml".to_string(),
            notify_file: "notify.txt".to_string(),
            probe_interval_secs: 30,
            watch_mode: false,
            verbose_logging: false,
            router: RouterConfig::default(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            app_origin: "https://exam.xdf.cn".to_string(),
            api_prefix: "/api/".to_string(),
            cache_name: "exam-shell".to_string(),
            cache_version: 1,
            shell_assets: vec![
                "/index.html".to_string(),
                "/static/app.js".to_string(),
                "/static/app.css".to_string(),
                "/static/logo.png".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(default.api_base_url),
            session_token: std::env::var("SESSION_TOKEN").unwrap_or(default.session_token),
            store_path: std::env::var("STORE_PATH").unwrap_or(default.store_path),
            cache_path: std::env::var("CACHE_PATH").unwrap_or(default.cache_path),
            spool_folder: std::env::var("SPOOL_FOLDER").unwrap_or(default.spool_folder),
            notify_file: std::env::var("NOTIFY_FILE").unwrap_or(default.notify_file),
            probe_interval_secs: std::env::var("PROBE_INTERVAL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.probe_interval_secs),
            watch_mode: std::env::var("WATCH_MODE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.watch_mode),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            router: RouterConfig::from_env(),
        }
    }
}

impl RouterConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            app_origin: std::env::var("APP_ORIGIN").unwrap_or(default.app_origin),
            api_prefix: std::env::var("API_PREFIX").unwrap_or(default.api_prefix),
            cache_name: std::env::var("CACHE_NAME").unwrap_or(default.cache_name),
            cache_version: std::env::var("CACHE_VERSION").ok().and_then(|v| v.parse().ok()).unwrap_or(default.cache_version),
            shell_assets: std::env::var("SHELL_ASSETS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(default.shell_assets),
        }
    }

    /// 当前版本的完整缓存名称，形如 `exam-shell-v1`
    pub fn versioned_cache_name(&self) -> String {
        format!("{}-v{}", self.cache_name, self.cache_version)
    }

    /// 校验路由配置
    ///
    /// # 返回
    /// 配置不合法时返回具体的 `ConfigError`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_name.is_empty() {
            return Err(ConfigError::EmptyField { field: "cache_name" });
        }
        if self.shell_assets.is_empty() {
            return Err(ConfigError::EmptyField { field: "shell_assets" });
        }
        if !self.api_prefix.starts_with('/') {
            return Err(ConfigError::BadApiPrefix {
                value: self.api_prefix.clone(),
            });
        }
        Ok(())
    }
}
