//! 可复用模块服务 - 业务能力层
//!
//! 只负责从控制器取回模块源码；在新作用域中执行由脚本层完成

use serde_json::{json, Value as JsonValue};

use crate::clients::ControllerClient;
use crate::error::{ApiError, AppResult};

/// 取回名为 `name` 的模块源码
pub async fn fetch_reusable(
    controller: &ControllerClient,
    secret: &str,
    name: &str,
) -> AppResult<String> {
    let response = controller
        .call_method("get_reusable", Some(&json!({ "name": name })), secret)
        .await?;

    if !response.is_ok() {
        return Err(ApiError::ReusableNotFound(name.to_string()).into());
    }

    let code = response
        .json()
        .and_then(|v| v.get("code").and_then(JsonValue::as_str).map(str::to_string))
        .ok_or_else(|| ApiError::UnexpectedResponse {
            endpoint: "get_reusable".to_string(),
            status: response.status,
            raw: response.text(),
        })?;

    Ok(code)
}
