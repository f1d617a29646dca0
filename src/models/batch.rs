//! batch 调用的数据结构

use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::ValidationError;

/// 单个 API 方法的参数，`None` 等同于空对象
pub type ApiParams = Option<Map<String, JsonValue>>;

/// 调用描述
///
/// - `("user.get", None)`：自动命名为 `data_<i>`
/// - `("users", "user.get", {"FILTER": {"ACTIVE": "Y"}})`：显式命名
#[derive(Debug, Clone, PartialEq)]
pub enum CallSpec {
    Unnamed {
        method: String,
        params: ApiParams,
    },
    Named {
        name: String,
        method: String,
        params: ApiParams,
    },
}

impl CallSpec {
    pub fn unnamed(method: impl Into<String>, params: ApiParams) -> Self {
        CallSpec::Unnamed {
            method: method.into(),
            params,
        }
    }

    pub fn named(name: impl Into<String>, method: impl Into<String>, params: ApiParams) -> Self {
        CallSpec::Named {
            name: name.into(),
            method: method.into(),
            params,
        }
    }

    /// 从 JSON 数组 `[method, params]` 或 `[name, method, params]` 解析
    pub fn from_json(index: usize, value: &JsonValue) -> Result<Self, ValidationError> {
        let bad = |reason: &str| ValidationError::BadCallSpec {
            index,
            reason: reason.to_string(),
        };

        let items = value
            .as_array()
            .ok_or_else(|| bad("expected [method, params] or [name, method, params]"))?;

        let text = |v: &JsonValue, what: &str| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| bad(&format!("{} must be a string", what)))
        };
        let params = |v: Option<&JsonValue>| match v {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Object(map)) => Ok(Some(map.clone())),
            Some(_) => Err(bad("params must be an object or null")),
        };

        match items.len() {
            2 => Ok(CallSpec::Unnamed {
                method: text(&items[0], "method")?,
                params: params(items.get(1))?,
            }),
            3 => Ok(CallSpec::Named {
                name: text(&items[0], "name")?,
                method: text(&items[1], "method")?,
                params: params(items.get(2))?,
            }),
            _ => Err(bad("expected 2 or 3 elements")),
        }
    }
}

/// batch 调用选项
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// 非 0 时远端在首个错误后停止处理同一物理请求中的后续命令
    pub halt: u8,
    /// 每个物理请求的命令数上限，合法范围 [1, 50]
    pub chunk_size: usize,
    pub timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            halt: 0,
            chunk_size: 50,
            timeout: Duration::from_secs(10),
        }
    }
}

/// 单个请求的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchCallResult {
    pub result: JsonValue,
    pub error: JsonValue,
    pub time: JsonValue,
    pub total: JsonValue,
    pub next: JsonValue,
}

impl BatchCallResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_null()
    }
}

/// batch 调用结果：请求名 → 结果，保持提交顺序
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchResult {
    entries: IndexMap<String, BatchCallResult>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: String, result: BatchCallResult) {
        self.entries.insert(name, result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&BatchCallResult> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BatchCallResult)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 所有请求都没有错误
    pub fn all_ok(&self) -> bool {
        self.iter_errors().next().is_none()
    }

    pub fn iter_errors(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.iter()
            .filter(|(_, res)| !res.is_ok())
            .map(|(name, res)| (name, &res.error))
    }

    pub fn errors(&self) -> IndexMap<String, JsonValue> {
        self.iter_errors()
            .map(|(name, err)| (name.to_string(), err.clone()))
            .collect()
    }

    pub fn iter_successes(&self) -> impl Iterator<Item = (&str, &BatchCallResult)> {
        self.iter().filter(|(_, res)| res.is_ok())
    }

    pub fn successes(&self) -> IndexMap<String, BatchCallResult> {
        self.iter_successes()
            .map(|(name, res)| (name.to_string(), res.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_spec_from_json() {
        let unnamed = CallSpec::from_json(0, &json!(["user.get", null])).unwrap();
        assert_eq!(unnamed, CallSpec::unnamed("user.get", None));

        let named = CallSpec::from_json(1, &json!(["lead", "crm.lead.get", {"ID": 42}])).unwrap();
        let CallSpec::Named { name, params, .. } = named else {
            panic!("expected named spec");
        };
        assert_eq!(name, "lead");
        assert_eq!(params.unwrap()["ID"], 42);
    }

    #[test]
    fn test_call_spec_rejects_bad_shapes() {
        assert!(CallSpec::from_json(0, &json!("user.get")).is_err());
        assert!(CallSpec::from_json(0, &json!(["a", "b", {}, 4])).is_err());
        assert!(CallSpec::from_json(0, &json!(["user.get", [1, 2]])).is_err());
        assert!(CallSpec::from_json(0, &json!([42, null])).is_err());
    }

    #[test]
    fn test_result_views() {
        let mut results = BatchResult::new();
        results.insert(
            "ok".into(),
            BatchCallResult {
                result: json!({"ID": "1"}),
                ..Default::default()
            },
        );
        results.insert(
            "bad".into(),
            BatchCallResult {
                error: json!({"error": "ERROR_METHOD_NOT_FOUND"}),
                ..Default::default()
            },
        );

        assert!(!results.all_ok());
        assert_eq!(results.errors().keys().collect::<Vec<_>>(), vec!["bad"]);
        assert_eq!(results.successes().keys().collect::<Vec<_>>(), vec!["ok"]);

        let serialized = serde_json::to_value(&results).unwrap();
        assert_eq!(serialized["ok"]["result"]["ID"], "1");
        assert!(serialized["bad"]["result"].is_null());
    }
}
