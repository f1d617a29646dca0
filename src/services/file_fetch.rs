//! 文件下载服务 - 业务能力层
//!
//! 下载文件并转成 CRM 接受的 `[文件名, base64]` 形式

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::clients::{CrmClient, RawResponse};
use crate::error::{AppError, AppResult};

/// 下载文件，返回 (文件名, base64 内容)
///
/// 文件名取 URL 最后一个 `/` 之后的部分
pub async fn get_b64_file(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> AppResult<(String, String)> {
    let name = file_name_from_url(url).to_string();

    let response = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| AppError::transport(url, e))?;
    let raw = RawResponse::read(url, response).await?;

    debug!("已下载 {} ({} 字节)", name, raw.body.len());

    Ok((name, STANDARD.encode(&raw.body)))
}

pub fn file_name_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// 下载图片并发布为动态（`log.blogpost.add`），返回接口的 `result`
pub async fn image_to_blogpost(
    crm: &CrmClient,
    http: &reqwest::Client,
    image_url: &str,
    title: &str,
) -> AppResult<JsonValue> {
    let (name, content) = get_b64_file(http, image_url, crm.default_timeout()).await?;

    let response = crm
        .call_api_method(
            "log.blogpost.add",
            Some(json!({
                "POST_TITLE": title,
                "POST_MESSAGE": "[B][/B]",
                "FILES": [[name, content]],
            })),
        )
        .await?;

    Ok(response.get("result").cloned().unwrap_or(JsonValue::Null))
}
