//! 返回值可序列化校验
//!
//! 任务返回值必须能无损编码为 JSON 才能提交给控制器

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::infrastructure::ScriptValue;

/// 返回值无法编码为 JSON
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("value is not JSON serializable: {repr}")]
pub struct NotSerializable {
    /// 值的字符串表示，仅用于日志
    pub repr: String,
}

/// 把脚本值转成线上格式
///
/// `undefined` 视为 `null`；其余必须是严格 JSON
pub fn to_wire(value: &ScriptValue) -> Result<JsonValue, NotSerializable> {
    match value {
        ScriptValue::Undefined => Ok(JsonValue::Null),
        ScriptValue::Json(text) => serde_json::from_str(text).map_err(|_| NotSerializable {
            repr: text.clone(),
        }),
        ScriptValue::Opaque(repr) => Err(NotSerializable { repr: repr.clone() }),
    }
}
