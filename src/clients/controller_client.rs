/// 控制器 API 客户端
///
/// 封装所有与任务控制器的交互：拉取任务、提交结果以及通用方法调用
use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::clients::http::{is_truthy, RawResponse};
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::models::{FetchedTask, TaskEnvelope, TaskReport};

/// 控制器客户端
#[derive(Clone)]
pub struct ControllerClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ControllerClient {
    /// 创建新的控制器客户端
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.controller_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/method/{}/", self.base_url, method)
    }

    /// 调用控制器方法
    ///
    /// # 参数
    /// - `method`: 方法路径，如 `get_pycode_task`、`storage/get_value`
    /// - `data`: JSON 请求体（可选）
    /// - `secret`: 认证 secret，放在查询参数中
    pub async fn call_method(
        &self,
        method: &str,
        data: Option<&JsonValue>,
        secret: &str,
    ) -> AppResult<RawResponse> {
        let url = self.method_url(method);
        debug!("调用控制器方法: {}", method);

        let mut request = self
            .http
            .post(&url)
            .query(&[("secret", secret)])
            .timeout(self.timeout);
        if let Some(data) = data {
            request = request.json(data);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::transport(&url, e))?;

        RawResponse::read(&url, response).await
    }

    /// 拉取下一个任务，队列为空时返回 `None`
    ///
    /// 响应本身无法解析，或任务连 ID 都取不到时返回 `UnexpectedResponse`；
    /// 其余字段不合法的任务以 [`FetchedTask::Malformed`] 交给调用方上报
    pub async fn get_task(&self, secret: &str) -> AppResult<Option<FetchedTask>> {
        let response = self.call_method("get_pycode_task", None, secret).await?;
        let unexpected = || ApiError::UnexpectedResponse {
            endpoint: "get_pycode_task".to_string(),
            status: response.status,
            raw: response.text(),
        };

        let envelope: TaskEnvelope =
            serde_json::from_slice(&response.body).map_err(|_| unexpected())?;

        match envelope.task {
            None => Ok(None),
            Some(task) => FetchedTask::from_value(&task)
                .map(Some)
                .ok_or_else(|| unexpected().into()),
        }
    }

    /// 提交任务报告
    ///
    /// # 返回
    /// 控制器确认（2xx 且 `ok` 为真）时返回 true
    pub async fn set_task_result(&self, secret: &str, report: &TaskReport) -> AppResult<bool> {
        let data = json!({
            "secret": secret,
            "task_id": report.task_id,
            "is_success": report.is_success,
            "result": report.result,
            "error": report.error,
        });

        let response = self
            .call_method("set_pycode_task_result", Some(&data), secret)
            .await?;

        let acknowledged = response.is_ok()
            && response
                .json()
                .and_then(|v| v.get("ok").cloned())
                .map(|ok| is_truthy(&ok))
                .unwrap_or(false);

        Ok(acknowledged)
    }
}
