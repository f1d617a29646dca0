/// CRM REST API 客户端
///
/// 每个任务持有一个实例，域名和令牌在调用时从执行上下文读取
use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::clients::http::RawResponse;
use crate::error::{ApiError, AppError, AppResult};
use crate::workflow::ExecutionContext;

/// CRM 客户端
#[derive(Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    ctx: ExecutionContext,
    default_timeout: Duration,
}

impl CrmClient {
    /// 创建新的 CRM 客户端
    pub fn new(http: reqwest::Client, ctx: ExecutionContext, default_timeout: Duration) -> Self {
        Self {
            http,
            ctx,
            default_timeout,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// 方法地址：`{domain}/method/{api_method}/`，域名不带协议时补 https
    pub fn method_url(&self, api_method: &str) -> String {
        let domain = self.ctx.domain.trim_end_matches('/');
        if domain.contains("://") {
            format!("{}/method/{}/", domain, api_method)
        } else {
            format!("https://{}/method/{}/", domain, api_method)
        }
    }

    /// 发出一次物理请求，不解释响应内容
    ///
    /// # 参数
    /// - `api_method`: API 方法名，如 `crm.lead.list` 或 `batch`
    /// - `params`: 方法参数（JSON 对象）
    /// - `timeout`: 本次请求超时
    pub async fn api_call(
        &self,
        api_method: &str,
        params: &JsonValue,
        timeout: Duration,
    ) -> AppResult<RawResponse> {
        let url = self.method_url(api_method);
        debug!("调用 CRM 方法 {} ({})", api_method, self.ctx);

        let response = self
            .http
            .post(&url)
            .query(&[("auth", self.ctx.auth_token.as_str())])
            .json(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::transport(&url, e))?;

        RawResponse::read(&url, response).await
    }

    /// 单次调用 API 方法
    ///
    /// 非 2xx 或响应不是 JSON 时返回 `BitrixApiError`
    pub async fn call_api_method(
        &self,
        api_method: &str,
        params: Option<JsonValue>,
    ) -> AppResult<JsonValue> {
        let params = params.unwrap_or_else(|| json!({}));
        let response = self
            .api_call(api_method, &params, self.default_timeout)
            .await?;

        if response.is_ok() {
            if let Some(data) = response.json() {
                return Ok(data);
            }
        }

        Err(bitrix_error(&response).into())
    }
}

/// 从失败响应构建 `BitrixApiError`
fn bitrix_error(response: &RawResponse) -> ApiError {
    let parsed = response.json();
    let body = parsed.as_ref().filter(|v| v.is_object());

    let error = body
        .and_then(|v| v.get("error"))
        .and_then(JsonValue::as_str)
        .unwrap_or("unknown_error")
        .to_string();
    let description = match body {
        Some(v) => v
            .get("error_description")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string(),
        None => response.text(),
    };

    ApiError::Bitrix {
        status: response.status,
        error,
        description,
    }
}
