//! batch 执行 - 业务能力层
//!
//! 按块发出物理请求，解码每块的响应，合并成一个有序的结果集
//!
//! 任意一块失败则整个调用失败，之前成功的块对调用方不可见

use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, error};

use crate::clients::{CrmClient, RawResponse};
use crate::error::{ApiError, AppResult};
use crate::models::{BatchCallResult, BatchOptions, BatchResult, CallSpec};
use crate::services::batch_builder::{self, Command};

/// 每块响应中按请求名索引的五个结果表
const RESULT_KEYS: [&str; 5] = [
    "result",
    "result_error",
    "result_time",
    "result_total",
    "result_next",
];

/// batch 执行器
pub struct BatchExecutor {
    client: CrmClient,
}

impl BatchExecutor {
    /// 创建新的 batch 执行器
    pub fn new(client: CrmClient) -> Self {
        Self { client }
    }

    /// 执行 batch 调用
    ///
    /// # 参数
    /// - `methods`: 调用描述，见 [`CallSpec`]
    /// - `options`: halt / 分块大小 / 超时
    ///
    /// # 返回
    /// 每个调用一条结果，顺序与 `methods` 一致
    pub async fn execute(
        &self,
        methods: &[CallSpec],
        options: &BatchOptions,
    ) -> AppResult<BatchResult> {
        batch_builder::validate_chunk_size(options.chunk_size)?;

        if methods.is_empty() {
            return Ok(BatchResult::new());
        }

        let chunks = batch_builder::build_chunks(methods, options.chunk_size)?;
        let total_chunks = chunks.len();
        let mut results = BatchResult::new();

        for (index, chunk) in chunks.iter().enumerate() {
            debug!(
                "发送 batch 第 {}/{} 块，共 {} 条命令",
                index + 1,
                total_chunks,
                chunk.len()
            );
            self.execute_chunk(chunk, options, &mut results).await?;
        }

        Ok(results)
    }

    async fn execute_chunk(
        &self,
        chunk: &[Command],
        options: &BatchOptions,
        results: &mut BatchResult,
    ) -> AppResult<()> {
        let cmd: Map<String, JsonValue> = chunk
            .iter()
            .map(|c| (c.name.clone(), JsonValue::String(c.command.clone())))
            .collect();
        let params = json!({ "cmd": cmd, "halt": options.halt });

        let response = self
            .client
            .api_call("batch", &params, options.timeout)
            .await?;

        let data = decode_chunk_response(&response)?;
        merge_chunk(chunk, &data, results);
        Ok(())
    }
}

/// 解析一块的响应体
///
/// - 不是 JSON：`BatchFailed`
/// - 顶层 `error` 非空：`BatchApiCallError`
/// - 非 2xx 或缺少 `result` 对象：`BatchFailed`
pub fn decode_chunk_response(response: &RawResponse) -> Result<JsonValue, ApiError> {
    let Some(data) = response.json().filter(JsonValue::is_object) else {
        let raw = response.text();
        error!("batch 响应无法解析 (状态码 {}): {}", response.status, raw);
        return Err(ApiError::BatchFailed {
            status: response.status,
            raw,
        });
    };

    if data
        .get("error")
        .map(crate::clients::http::is_truthy)
        .unwrap_or(false)
    {
        return Err(ApiError::BatchApiCall {
            status: response.status,
            raw: response.text(),
        });
    }

    if !response.is_ok() || !data.get("result").is_some_and(JsonValue::is_object) {
        let raw = response.text();
        error!("batch 响应缺少结果 (状态码 {}): {}", response.status, raw);
        return Err(ApiError::BatchFailed {
            status: response.status,
            raw,
        });
    }

    Ok(data)
}

/// 结果表统一成字符串键的对象
///
/// 上游 JSON 序列化会把稀疏的整数键数组写成列表（`{"0": x}` 变成 `[x]`，`{}` 变成 `[]`），
/// 这里把列表重新按下标转成键
pub fn normalize_result_table(value: Option<&JsonValue>) -> Map<String, JsonValue> {
    match value {
        Some(JsonValue::Object(map)) => map.clone(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        _ => Map::new(),
    }
}

/// 把一块的结果按提交顺序并入总结果
fn merge_chunk(chunk: &[Command], data: &JsonValue, results: &mut BatchResult) {
    let body = data.get("result");
    let [result, result_error, result_time, result_total, _result_next] =
        RESULT_KEYS.map(|key| normalize_result_table(body.and_then(|b| b.get(key))));

    let lookup = |table: &Map<String, JsonValue>, name: &str| {
        table.get(name).cloned().unwrap_or(JsonValue::Null)
    };

    for command in chunk {
        let name = command.name.as_str();
        results.insert(
            command.name.clone(),
            BatchCallResult {
                result: lookup(&result, name),
                error: lookup(&result_error, name),
                time: lookup(&result_time, name),
                total: lookup(&result_total, name),
                // 历史行为：next 取自 result_total
                next: lookup(&result_total, name),
            },
        );
    }
}
