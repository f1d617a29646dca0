//! 键值存储服务 - 业务能力层
//!
//! 通过控制器读写任务的持久化键值

use serde_json::{json, Value as JsonValue};

use crate::clients::http::is_truthy;
use crate::clients::ControllerClient;
use crate::error::{ApiError, AppResult, ValidationError};

/// 键的最大长度（字符数）
pub const MAX_KEY_LENGTH: usize = 255;

/// 存储服务
pub struct StorageService {
    controller: ControllerClient,
    secret: String,
}

impl StorageService {
    /// 创建新的存储服务
    pub fn new(controller: ControllerClient, secret: impl Into<String>) -> Self {
        Self {
            controller,
            secret: secret.into(),
        }
    }

    /// 读取值
    pub async fn get_value(&self, key: &str) -> AppResult<JsonValue> {
        validate_key(key)?;

        let response = self
            .controller
            .call_method("storage/get_value", Some(&json!({ "key": key })), &self.secret)
            .await?;

        if response.is_ok() {
            if let Some(data) = response.json() {
                return Ok(data.get("value").cloned().unwrap_or(JsonValue::Null));
            }
        }

        Err(ApiError::GetValue {
            status: response.status,
        }
        .into())
    }

    /// 写入值，返回控制器的 `ok`
    pub async fn set_value(&self, key: &str, value: &JsonValue) -> AppResult<bool> {
        validate_key(key)?;

        let response = self
            .controller
            .call_method(
                "storage/set_value",
                Some(&json!({ "key": key, "value": value })),
                &self.secret,
            )
            .await?;

        if response.is_ok() {
            if let Some(data) = response.json() {
                return Ok(data.get("ok").map(is_truthy).unwrap_or(false));
            }
        }

        Err(ApiError::SetValue {
            status: response.status,
        }
        .into())
    }
}

/// 校验键长度，在发出请求之前失败
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    let len = key.chars().count();
    if len > MAX_KEY_LENGTH {
        return Err(ValidationError::KeyTooLong {
            max: MAX_KEY_LENGTH,
            len,
        });
    }
    Ok(())
}
