//! 宿主 API - 基础设施层
//!
//! 把脚本里 `pycode.*` 的调用翻译成对业务能力层的异步调用。
//! 运行在脚本线程上，通过运行时句柄阻塞等待结果。

use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tokio::runtime::Handle;
use tracing::debug;

use crate::clients::http::is_truthy;
use crate::clients::{ControllerClient, CrmClient};
use crate::config::Config;
use crate::error::{AppError, AppResult, ValidationError};
use crate::infrastructure::js_executor::HostBridge;
use crate::models::{BatchOptions, CallSpec};
use crate::services::batch_builder::MAX_CHUNK_SIZE;
use crate::services::{file_fetch, reusable, BatchExecutor, StorageService, TelegramLog};
use crate::workflow::ExecutionContext;

/// 单个任务的宿主能力集合
pub struct HostApi {
    handle: Handle,
    http: reqwest::Client,
    crm: CrmClient,
    controller: ControllerClient,
    storage: StorageService,
    telegram: TelegramLog,
    secret: String,
    default_chunk_size: usize,
}

impl HostApi {
    pub fn new(
        handle: Handle,
        http: reqwest::Client,
        controller: ControllerClient,
        ctx: ExecutionContext,
        config: &Config,
    ) -> Self {
        let secret = ctx.secret.clone();
        Self {
            crm: CrmClient::new(http.clone(), ctx, config.request_timeout()),
            storage: StorageService::new(controller.clone(), secret.clone()),
            telegram: TelegramLog::new(controller.clone(), secret.clone()),
            handle,
            http,
            controller,
            secret,
            default_chunk_size: config.default_chunk_size,
        }
    }

    /// 执行一次调用，返回 `ok` 的内容
    pub fn call(&self, op: &str, payload: &JsonValue) -> AppResult<JsonValue> {
        debug!("宿主调用: {}", op);
        match op {
            "call_api_method" => self.call_api_method(payload),
            "batch_api_call" => self.batch_api_call(payload),
            "storage.get_value" => {
                let key = string_key(payload)?;
                self.handle.block_on(self.storage.get_value(&key))
            }
            "storage.set_value" => {
                let key = string_key(payload)?;
                let value = payload.get("value").cloned().unwrap_or(JsonValue::Null);
                let ok = self.handle.block_on(self.storage.set_value(&key, &value))?;
                Ok(JsonValue::Bool(ok))
            }
            "telegramlog" => self.telegramlog(payload),
            "get_b64_file" => {
                let url = display_text(payload.get("url"));
                let (name, content) = self.handle.block_on(file_fetch::get_b64_file(
                    &self.http,
                    &url,
                    self.crm.default_timeout(),
                ))?;
                Ok(json!([name, content]))
            }
            "image_to_blogpost" => {
                let image_url = display_text(payload.get("image_url"));
                let title = display_text(payload.get("title"));
                self.handle.block_on(file_fetch::image_to_blogpost(
                    &self.crm,
                    &self.http,
                    &image_url,
                    &title,
                ))
            }
            "get_reusable" => {
                let name = display_text(payload.get("name"));
                let code = self.handle.block_on(reusable::fetch_reusable(
                    &self.controller,
                    &self.secret,
                    &name,
                ))?;
                Ok(JsonValue::String(code))
            }
            other => Err(ValidationError::BadCallSpec {
                index: 0,
                reason: format!("unknown host operation '{}'", other),
            }
            .into()),
        }
    }

    fn call_api_method(&self, payload: &JsonValue) -> AppResult<JsonValue> {
        let method = display_text(payload.get("method"));
        let params = payload.get("params").filter(|p| !p.is_null()).cloned();
        self.handle.block_on(self.crm.call_api_method(&method, params))
    }

    fn batch_api_call(&self, payload: &JsonValue) -> AppResult<JsonValue> {
        let options = self.batch_options(payload)?;

        let methods = match payload.get("methods") {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| CallSpec::from_json(i, item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ValidationError::BadCallSpec {
                    index: 0,
                    reason: "methods must be an array".to_string(),
                }
                .into())
            }
        };

        let executor = BatchExecutor::new(self.crm.clone());
        let result = self.handle.block_on(executor.execute(&methods, &options))?;

        // 以 [名称, 结果] 对的形式返回，脚本侧据此保持顺序
        let pairs: Vec<JsonValue> = result
            .iter()
            .map(|(name, entry)| json!([name, entry]))
            .collect();
        Ok(JsonValue::Array(pairs))
    }

    fn batch_options(&self, payload: &JsonValue) -> Result<BatchOptions, ValidationError> {
        let halt = payload.get("halt").map(is_truthy).unwrap_or(false);

        let chunk_size = match payload.get("chunk_size") {
            None | Some(JsonValue::Null) => self.default_chunk_size,
            Some(value) => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| (1..=MAX_CHUNK_SIZE).contains(n))
                .ok_or_else(|| ValidationError::InvalidChunkSize(value.to_string()))?,
        };

        let timeout = match payload.get("timeout") {
            None | Some(JsonValue::Null) => self.crm.default_timeout(),
            Some(value) => value
                .as_f64()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .ok_or_else(|| ValidationError::InvalidTimeout(value.to_string()))?,
        };

        Ok(BatchOptions {
            halt: u8::from(halt),
            chunk_size,
            timeout,
        })
    }

    fn telegramlog(&self, payload: &JsonValue) -> AppResult<JsonValue> {
        let level = match payload.get("log_level") {
            Some(JsonValue::String(level)) => level.clone(),
            other => {
                return Err(ValidationError::InvalidLogLevel {
                    level: other.map(JsonValue::to_string).unwrap_or_default(),
                    allowed: crate::services::telegram_log::LOG_LEVELS,
                }
                .into())
            }
        };
        let log_type = display_text(payload.get("log_type"));
        let message = display_text(payload.get("message"));

        self.handle
            .block_on(self.telegram.log(&level, &log_type, &message))?;
        Ok(JsonValue::Null)
    }
}

impl HostBridge for HostApi {
    fn dispatch(&self, op: &str, payload: &str) -> String {
        let reply = serde_json::from_str::<JsonValue>(payload)
            .map_err(|e| {
                AppError::from(ValidationError::BadCallSpec {
                    index: 0,
                    reason: format!("payload is not JSON: {}", e),
                })
            })
            .and_then(|payload| self.call(op, &payload));
        envelope(reply)
    }
}

/// `{"ok": value}` 或 `{"error": {"name": kind, "message": msg}}`
pub fn envelope(reply: AppResult<JsonValue>) -> String {
    let body = match reply {
        Ok(value) => json!({ "ok": value }),
        Err(e) => json!({ "error": { "name": e.kind(), "message": e.to_string() } }),
    };
    body.to_string()
}

fn string_key(payload: &JsonValue) -> Result<String, ValidationError> {
    payload
        .get("key")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or(ValidationError::KeyNotString)
}

/// 字符串原样取出，其他值取其 JSON 文本
fn display_text(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
