use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};
use crate::services::batch_builder::MAX_CHUNK_SIZE;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 控制器地址（含协议），方法路径为 `{controller_url}/method/{method}/`
    pub controller_url: String,
    /// 单次 HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    /// batch 默认分块大小
    pub default_chunk_size: usize,
    /// 单实例锁名称
    pub lock_name: String,
    /// 是否启用单实例锁
    pub use_instance_lock: bool,
    /// 日志过滤规则（RUST_LOG 优先）
    pub log_filter: String,
    /// 运行日志文件，启动时写入头部
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 10,
            default_chunk_size: 50,
            lock_name: "pycode_worker".to_string(),
            use_instance_lock: true,
            log_filter: "info".to_string(),
            log_file: None,
        }
    }
}

impl Config {
    /// 从默认值加环境变量构建配置
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置，再应用环境变量覆盖
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())?.with_env_overrides()
    }

    /// 解析 TOML 文本，缺省字段取默认值
    pub fn from_toml_str(content: &str, origin: &str) -> AppResult<Self> {
        let config = toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: origin.to_string(),
            source,
        })?;
        Self::validate(config)
    }

    fn with_env_overrides(mut self) -> AppResult<Self> {
        if let Ok(v) = std::env::var("CONTROLLER_URL") {
            self.controller_url = v;
        }
        if let Some(v) = parse_env("REQUEST_TIMEOUT_SECS", "u64")? {
            self.request_timeout_secs = v;
        }
        if let Some(v) = parse_env("DEFAULT_CHUNK_SIZE", "usize")? {
            self.default_chunk_size = v;
        }
        if let Ok(v) = std::env::var("LOCK_NAME") {
            self.lock_name = v;
        }
        if let Some(v) = parse_env("USE_INSTANCE_LOCK", "bool")? {
            self.use_instance_lock = v;
        }
        if let Ok(v) = std::env::var("LOG_FILTER") {
            self.log_filter = v;
        }
        if let Ok(v) = std::env::var("LOG_FILE") {
            self.log_file = Some(v);
        }
        self.validate()
    }

    /// 校验取值范围
    fn validate(self) -> AppResult<Self> {
        if !(1..=MAX_CHUNK_SIZE).contains(&self.default_chunk_size) {
            return Err(ConfigError::OutOfRange {
                field: "default_chunk_size".to_string(),
                value: self.default_chunk_size.to_string(),
                expected: format!("[1, {}]", MAX_CHUNK_SIZE),
            }
            .into());
        }
        Ok(self)
    }

    /// 单次请求超时
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(var_name: &str, expected_type: &str) -> AppResult<Option<T>> {
    match std::env::var(var_name) {
        Ok(value) => value.parse().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}
