//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 QuickJS 运行时，只暴露"执行 JS"的能力。
//! 脚本能接触到的外部能力只有 `pycode` 命名空间，全部经由 [`HostBridge`] 回到 Rust。
//!
//! 运行时不是 `Send` 的：整个执行器在一个阻塞线程里创建、使用、销毁。

use std::fmt;
use std::rc::Rc;

use rquickjs::{CatchResultExt, Context, Function, Runtime};
use serde_json::Value as JsonValue;

use crate::error::ScriptError;

const PRELUDE: &str = include_str!("prelude.js");

/// 在全局作用域里执行 `__task_source`，捕获一切抛出值
const DRIVER: &str = r#"
(function () {
  try {
    (0, eval)(globalThis.__task_source);
    return null;
  } catch (e) {
    return __describe_error(e);
  } finally {
    delete globalThis.__task_source;
  }
})()
"#;

/// 脚本调用宿主的入口
///
/// `op` 为操作名，`payload` 与返回值都是 JSON 文本：
/// 成功 `{"ok": ...}`，失败 `{"error": {"name": ..., "message": ...}}`
pub trait HostBridge {
    fn dispatch(&self, op: &str, payload: &str) -> String;
}

/// 脚本抛出的异常
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFailure {
    pub name: String,
    pub message: String,
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// 从脚本中读出的值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptValue {
    /// `undefined`
    Undefined,
    /// 严格 JSON 编码后的文本
    Json(String),
    /// 无法无损编码的值，附带其字符串表示
    Opaque(String),
}

/// JS 执行器
pub struct JsExecutor {
    context: Context,
    _runtime: Runtime,
}

impl JsExecutor {
    /// 创建新的执行器（空白全局作用域）
    pub fn new() -> Result<Self, ScriptError> {
        let runtime = Runtime::new().map_err(|e| ScriptError::EngineInit(e.to_string()))?;
        let context = Context::full(&runtime).map_err(|e| ScriptError::EngineInit(e.to_string()))?;
        Ok(Self {
            context,
            _runtime: runtime,
        })
    }

    /// 安装宿主桥和 `pycode` 命名空间
    pub fn install_host<H: HostBridge + 'static>(&self, host: Rc<H>) -> Result<(), ScriptError> {
        self.context.with(|ctx| {
            let call = Function::new(ctx.clone(), move |op: String, payload: String| {
                host.dispatch(&op, &payload)
            })
            .catch(&ctx)
            .map_err(|e| ScriptError::Engine(e.to_string()))?;

            ctx.globals()
                .set("__host_call", call)
                .catch(&ctx)
                .map_err(|e| ScriptError::Engine(e.to_string()))?;

            ctx.eval::<(), _>(PRELUDE)
                .catch(&ctx)
                .map_err(|e| ScriptError::Engine(e.to_string()))
        })
    }

    /// 把 JSON 值设为全局变量
    pub fn set_global_json(&self, name: &str, value: &JsonValue) -> Result<(), ScriptError> {
        let text = serde_json::to_string(value).map_err(|e| ScriptError::Engine(e.to_string()))?;
        self.context.with(|ctx| {
            let parsed = ctx
                .json_parse(text)
                .catch(&ctx)
                .map_err(|e| ScriptError::Engine(e.to_string()))?;
            ctx.globals()
                .set(name, parsed)
                .catch(&ctx)
                .map_err(|e| ScriptError::Engine(e.to_string()))
        })
    }

    /// 在全局作用域执行源码
    ///
    /// # 返回
    /// - `Ok(None)`: 正常执行完毕
    /// - `Ok(Some(failure))`: 脚本抛出了异常
    /// - `Err(..)`: 引擎自身出错
    pub fn exec(&self, source: &str) -> Result<Option<ScriptFailure>, ScriptError> {
        self.context.with(|ctx| {
            ctx.globals()
                .set("__task_source", source)
                .catch(&ctx)
                .map_err(|e| ScriptError::Engine(e.to_string()))?;

            let outcome: Option<Vec<String>> = ctx
                .eval(DRIVER)
                .catch(&ctx)
                .map_err(|e| ScriptError::Engine(e.to_string()))?;

            Ok(outcome.map(|parts| {
                let mut parts = parts.into_iter();
                ScriptFailure {
                    name: parts.next().unwrap_or_else(|| "Error".to_string()),
                    message: parts.next().unwrap_or_default(),
                }
            }))
        })
    }

    /// 读取全局变量并尝试严格 JSON 编码
    pub fn read_global(&self, name: &str) -> Result<ScriptValue, ScriptError> {
        self.context.with(|ctx| {
            let globals = ctx.globals();
            let encode: Function = globals
                .get("__encode_wire")
                .catch(&ctx)
                .map_err(|e| ScriptError::Engine(e.to_string()))?;
            let value: rquickjs::Value = globals
                .get(name)
                .catch(&ctx)
                .map_err(|e| ScriptError::Engine(e.to_string()))?;

            let parts: Vec<String> = encode
                .call((value,))
                .catch(&ctx)
                .map_err(|e| ScriptError::Engine(e.to_string()))?;

            let mut parts = parts.into_iter();
            let kind = parts.next().unwrap_or_default();
            let text = parts.next().unwrap_or_default();
            Ok(match kind.as_str() {
                "undefined" => ScriptValue::Undefined,
                "json" => ScriptValue::Json(text),
                _ => ScriptValue::Opaque(text),
            })
        })
    }
}
