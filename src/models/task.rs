//! 任务与任务报告

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// 任务 ID（控制器可能返回数字或字符串）
///
/// 其他形态原样保留，提交报告时回传给控制器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Int(i64),
    Str(String),
    Other(JsonValue),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Int(id) => write!(f, "{}", id),
            TaskId::Str(id) => f.write_str(id),
            TaskId::Other(id) => write!(f, "{}", id),
        }
    }
}

/// 从控制器拉取的任务
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// 任务代码，必须定义 `main`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub code: String,
    /// CRM 门户域名
    #[serde(default, deserialize_with = "null_as_empty")]
    pub domain: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub auth_token: String,
    /// 传给 `main` 的位置参数，非数组时按空数组处理
    #[serde(default)]
    pub args: JsonValue,
    #[serde(default)]
    pub request_data: JsonValue,
}

impl Task {
    /// `main` 的位置参数
    pub fn positional_args(&self) -> Vec<JsonValue> {
        match &self.args {
            JsonValue::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }
}

/// null 按空串处理
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// `get_pycode_task` 的响应，`task` 先保留原始 JSON
#[derive(Debug, Deserialize)]
pub struct TaskEnvelope {
    #[serde(default)]
    pub task: Option<JsonValue>,
}

/// 拉取到的任务
#[derive(Debug, Clone)]
pub enum FetchedTask {
    /// 可以执行
    Ready(Task),
    /// 字段不合法，但能取回 ID，按失败上报
    Malformed { id: TaskId, reason: String },
}

impl FetchedTask {
    /// 解析任务描述；连 ID 都取不到时返回 None
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        match Task::deserialize(value) {
            Ok(task) => Some(FetchedTask::Ready(task)),
            Err(e) => {
                let id = value.get("id").filter(|id| !id.is_null())?;
                Some(FetchedTask::Malformed {
                    id: TaskId::deserialize(id).ok()?,
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// 任务执行报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub is_success: bool,
    pub result: JsonValue,
    pub error: Option<String>,
}
