//! 原始 HTTP 响应
//!
//! 客户端只负责传输，响应的业务解释交给调用方

use serde_json::Value as JsonValue;

/// 已读取完毕的 HTTP 响应
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// 读取 reqwest 响应体
    pub(crate) async fn read(endpoint: &str, response: reqwest::Response) -> crate::AppResult<Self> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| crate::AppError::transport(endpoint, e))?
            .to_vec();
        Ok(Self { status, body })
    }

    /// 2xx
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 响应体解析为 JSON，失败返回 None
    pub fn json(&self) -> Option<JsonValue> {
        serde_json::from_slice(&self.body).ok()
    }

    /// 响应体文本，非 UTF-8 字节以 `\xNN` 形式保留
    pub fn text(&self) -> String {
        decode_backslash_replace(&self.body)
    }
}

/// 宽松解码：合法 UTF-8 原样保留，非法字节替换为 `\xNN`
pub fn decode_backslash_replace(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                // valid_up_to 之前的部分一定是合法 UTF-8
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let bad_len = e.error_len().unwrap_or(after.len());
                for b in &after[..bad_len] {
                    out.push_str(&format!("\\x{:02x}", b));
                }
                rest = &after[bad_len..];
            }
        }
    }
}

/// 按 Python 的真值规则判断 JSON 值
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}
