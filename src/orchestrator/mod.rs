//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 拉取任务、逐个交给流程层执行、汇总统计。只做调度，不做具体业务判断。
//!
//! ## 层次关系
//!
//! ```text
//! task_loop (处理任务队列)
//!     ↓
//! workflow::TaskRunner (处理单个任务)
//!     ↓
//! infrastructure (JsExecutor + HostApi)
//!     ↓
//! services (能力层：batch / storage / telegramlog / 文件)
//!     ↓
//! clients (CRM / 控制器)
//! ```

pub mod task_loop;

pub use task_loop::{LoopStats, TaskLoop};
