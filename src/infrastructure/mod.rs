pub mod host_api;
pub mod js_executor;

pub use host_api::HostApi;
pub use js_executor::{HostBridge, JsExecutor, ScriptFailure, ScriptValue};
