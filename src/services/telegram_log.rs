//! 日志转发服务 - 业务能力层
//!
//! 把任务代码的日志转发给控制器，由控制器投递到 Telegram。发出即忘，不关心结果

use serde_json::json;
use tracing::warn;

use crate::clients::ControllerClient;
use crate::error::{AppResult, ValidationError};

/// 允许的日志级别
pub const LOG_LEVELS: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// 日志转发服务
pub struct TelegramLog {
    controller: ControllerClient,
    secret: String,
}

impl TelegramLog {
    /// 创建新的日志转发服务
    pub fn new(controller: ControllerClient, secret: impl Into<String>) -> Self {
        Self {
            controller,
            secret: secret.into(),
        }
    }

    /// 转发一条日志
    ///
    /// 级别不合法时在发请求前失败；请求本身的失败只记录警告
    pub async fn log(&self, log_level: &str, log_type: &str, message: &str) -> AppResult<()> {
        validate_level(log_level)?;

        let data = json!({
            "log_level": log_level,
            "log_type": log_type,
            "message": message,
        });

        match self
            .controller
            .call_method("telegramlog", Some(&data), &self.secret)
            .await
        {
            Ok(response) if !response.is_ok() => {
                warn!("⚠️ 日志转发被控制器拒绝，状态码 {}", response.status);
            }
            Ok(_) => {}
            Err(e) => warn!("⚠️ 日志转发失败: {}", e),
        }

        Ok(())
    }
}

/// 级别不区分大小写
pub fn validate_level(log_level: &str) -> Result<(), ValidationError> {
    let upper = log_level.to_uppercase();
    if LOG_LEVELS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidLogLevel {
            level: log_level.to_string(),
            allowed: LOG_LEVELS,
        })
    }
}
