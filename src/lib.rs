//! # Pycode Worker
//!
//! 从控制器拉取任务、在嵌入式 JS 引擎中执行任务代码、回报结果的工作进程，
//! 以及任务代码使用的批量 CRM 客户端。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有脚本引擎，只暴露能力
//! - `JsExecutor` - 每个任务一个全新的 QuickJS 运行时
//! - `HostApi` - 脚本中 `pycode.*` 调用的宿主实现
//!
//! ### ② 客户端（Clients）
//! - `CrmClient` - CRM REST API，域名和令牌来自执行上下文
//! - `ControllerClient` - 任务控制器 API
//!
//! ### ③ 业务能力层（Services）
//! - `batch_builder` / `BatchExecutor` - 命名、编码、分块、合并
//! - `StorageService` / `TelegramLog` / `file_fetch` / `reusable`
//!
//! ### ④ 流程层（Workflow）
//! - `ExecutionContext` - 当前任务的 secret、门户和令牌
//! - `TaskRunner` - 一个任务的完整流程（执行 → 校验 → 提交）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `TaskLoop` - 串行消费任务队列并统计

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ControllerClient, CrmClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{BatchCallResult, BatchOptions, BatchResult, CallSpec, Task, TaskReport};
pub use orchestrator::{LoopStats, TaskLoop};
pub use services::BatchExecutor;
pub use workflow::{ExecutionContext, TaskRunner};
