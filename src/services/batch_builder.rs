//! batch 请求构建 - 业务能力层
//!
//! 只负责把调用描述变成 batch 命令并切块，不发请求
//!
//! ```text
//! ("request1", "crm.lead.list", {"filter": {"ASSIGNED_BY_ID": 42, "STATUS_ID": 1}})
//!     ↓
//! ("request1", "crm.lead.list?filter[ASSIGNED_BY_ID]=42%26filter[STATUS_ID]=1")
//! ```

use std::collections::HashSet;

use serde_json::{Map, Value as JsonValue};

use crate::error::ValidationError;
use crate::models::CallSpec;

/// 单个物理 batch 请求允许的最大命令数
pub const MAX_CHUNK_SIZE: usize = 50;

/// 命名后的调用
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCall {
    pub name: String,
    pub method: String,
    pub params: Option<Map<String, JsonValue>>,
}

/// batch 命令：请求名 + `cmd` 中的命令串
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub command: String,
}

/// 校验分块大小
pub fn validate_chunk_size(chunk_size: usize) -> Result<(), ValidationError> {
    if (1..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        Ok(())
    } else {
        Err(ValidationError::InvalidChunkSize(chunk_size.to_string()))
    }
}

/// 为调用补全名称并检查唯一性
///
/// 未命名的调用得到 `data_<i>`，`i` 是它在全部调用中的位置（命名调用也占位）
pub fn normalize(methods: &[CallSpec]) -> Result<Vec<NormalizedCall>, ValidationError> {
    let mut seen = HashSet::with_capacity(methods.len());
    let mut normalized = Vec::with_capacity(methods.len());

    for (i, spec) in methods.iter().enumerate() {
        let call = match spec {
            CallSpec::Named {
                name,
                method,
                params,
            } => NormalizedCall {
                name: name.clone(),
                method: method.clone(),
                params: params.clone(),
            },
            CallSpec::Unnamed { method, params } => NormalizedCall {
                name: format!("data_{}", i),
                method: method.clone(),
                params: params.clone(),
            },
        };

        if !seen.insert(call.name.clone()) {
            return Err(ValidationError::DuplicateName(call.name));
        }
        normalized.push(call);
    }

    Ok(normalized)
}

/// 把参数展开成 PHP 风格的查询串：`filter[ID]=1&select[0]=TITLE`
///
/// 键的各段和值各自做 URL 编码，方括号保留原样；null 与空容器不输出
pub fn convert_params(params: &Map<String, JsonValue>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        flatten_param(urlencoding::encode(key).into_owned(), value, &mut pairs);
    }
    pairs.join("&")
}

fn flatten_param(prefix: String, value: &JsonValue, out: &mut Vec<String>) {
    match value {
        JsonValue::Null => {}
        JsonValue::Bool(b) => out.push(format!("{}={}", prefix, if *b { 1 } else { 0 })),
        JsonValue::Number(n) => out.push(format!("{}={}", prefix, n)),
        JsonValue::String(s) => out.push(format!("{}={}", prefix, urlencoding::encode(s))),
        JsonValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_param(format!("{}[{}]", prefix, i), item, out);
            }
        }
        JsonValue::Object(map) => {
            for (key, item) in map {
                flatten_param(
                    format!("{}[{}]", prefix, urlencoding::encode(key)),
                    item,
                    out,
                );
            }
        }
    }
}

/// 对整条查询串再编码一次，只保留 `[`、`]`、`=` 和非保留字符
///
/// 命令串里的 `&` 必须变成 `%26`，否则会被当成外层参数的分隔符
pub fn quote_command_query(query: &str) -> String {
    urlencoding::encode(query)
        .replace("%5B", "[")
        .replace("%5D", "]")
        .replace("%3D", "=")
}

/// 构建单条命令串：`<method>?<encoded-params>`
pub fn build_command(method: &str, params: Option<&Map<String, JsonValue>>) -> String {
    let query = params.map(convert_params).unwrap_or_default();
    format!("{}?{}", method, quote_command_query(&query))
}

/// 把列表切成不超过 `chunk_size` 的块，顺序不变
pub fn to_chunks<T: Clone>(items: &[T], chunk_size: usize) -> Vec<Vec<T>> {
    items
        .chunks(chunk_size.max(1))
        .map(<[T]>::to_vec)
        .collect()
}

/// 校验 → 命名 → 编码 → 切块
pub fn build_chunks(
    methods: &[CallSpec],
    chunk_size: usize,
) -> Result<Vec<Vec<Command>>, ValidationError> {
    validate_chunk_size(chunk_size)?;

    let commands: Vec<Command> = normalize(methods)?
        .into_iter()
        .map(|call| Command {
            command: build_command(&call.method, call.params.as_ref()),
            name: call.name,
        })
        .collect();

    Ok(to_chunks(&commands, chunk_size))
}
