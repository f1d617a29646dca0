use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 本地参数校验错误（在发出任何请求之前）
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// API 调用错误
    #[error(transparent)]
    Api(#[from] ApiError),
    /// 脚本引擎错误
    #[error(transparent)]
    Script(#[from] ScriptError),
    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 参数校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 分块大小不在 [1, 50] 范围内
    #[error("chunk_size must be within the range [1, 50], got {0}")]
    InvalidChunkSize(String),
    /// 批量请求中出现重复的请求名
    #[error("duplicate key: {0}")]
    DuplicateName(String),
    /// 超时不是非负有限秒数
    #[error("timeout must be a non-negative number of seconds, got {0}")]
    InvalidTimeout(String),
    /// 调用描述格式不正确
    #[error("bad call specification at position {index}: {reason}")]
    BadCallSpec { index: usize, reason: String },
    /// 存储键不是字符串
    #[error("key must be a string")]
    KeyNotString,
    /// 存储键过长
    #[error("max key length is {max}")]
    KeyTooLong { max: usize, len: usize },
    /// 日志级别不合法
    #[error("log_level must be one of {allowed:?}, got {level:?}")]
    InvalidLogLevel {
        level: String,
        allowed: &'static [&'static str],
    },
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败（连接失败、超时等）
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// batch 响应不是 JSON
    #[error("batch response is not JSON (status {status}): {raw}")]
    BatchFailed { status: u16, raw: String },
    /// batch 响应携带顶层 error
    #[error("batch call returned an error (status {status}): {raw}")]
    BatchApiCall { status: u16, raw: String },
    /// 单次 API 调用失败
    #[error("[{status}][{error}] {description}")]
    Bitrix {
        status: u16,
        error: String,
        description: String,
    },
    /// 控制器上找不到可复用模块
    #[error("{0}")]
    ReusableNotFound(String),
    /// 读取存储值失败
    #[error("{status}")]
    GetValue { status: u16 },
    /// 写入存储值失败
    #[error("{status}")]
    SetValue { status: u16 },
    /// 控制器返回了无法解析的响应
    #[error("unexpected response from {endpoint} (status {status}): {raw}")]
    UnexpectedResponse {
        endpoint: String,
        status: u16,
        raw: String,
    },
}

/// 脚本引擎错误
#[derive(Debug, Error)]
pub enum ScriptError {
    /// 引擎初始化失败
    #[error("failed to initialise script engine: {0}")]
    EngineInit(String),
    /// 引擎内部错误（非脚本抛出的异常）
    #[error("script engine failure: {0}")]
    Engine(String),
    /// 脚本线程异常退出
    #[error("script thread aborted: {0}")]
    Aborted(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("failed to parse config file {path}: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值超出允许范围
    #[error("config value {field} = {value} is out of range, expected {expected}")]
    OutOfRange {
        field: String,
        value: String,
        expected: String,
    },
    /// 环境变量解析失败
    #[error("environment variable {var_name} has invalid value '{value}', expected {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

impl AppError {
    /// 错误类型名
    ///
    /// 抛入任务代码时作为 JS 异常的 `name`，任务报告中呈现为 `"<name>: <message>"`
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "ValueError",
            AppError::Api(e) => match e {
                ApiError::Transport { .. } => "TransportError",
                ApiError::BatchFailed { .. } => "BatchFailed",
                ApiError::BatchApiCall { .. } => "BatchApiCallError",
                ApiError::Bitrix { .. } => "BitrixApiError",
                ApiError::ReusableNotFound(_) => "ReusableNotFound",
                ApiError::GetValue { .. } => "GetValueError",
                ApiError::SetValue { .. } => "SetValueError",
                ApiError::UnexpectedResponse { .. } => "UnexpectedResponse",
            },
            AppError::Script(_) => "ScriptError",
            AppError::Config(_) => "ConfigError",
        }
    }

    /// 创建网络请求失败错误
    pub fn transport(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Api(ApiError::Transport {
            endpoint: endpoint.into(),
            source,
        })
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
