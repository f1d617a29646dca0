//! 任务执行流程 - 流程层
//!
//! 核心职责：定义"一个任务"的完整处理流程
//!
//! 流程顺序：
//! 1. 准备执行环境（`pycode`、`pycode_request_data`、参数、结果槽）
//! 2. 执行任务代码并调用 `main(...args)`
//! 3. 校验返回值可序列化
//! 4. 向控制器提交报告
//!
//! 任务代码的任何失败都被收进报告，不会从这里逃出

use std::rc::Rc;

use serde_json::Value as JsonValue;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::clients::ControllerClient;
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, ScriptError};
use crate::infrastructure::{HostApi, JsExecutor, ScriptFailure, ScriptValue};
use crate::models::{Task, TaskId, TaskReport};
use crate::utils::logging::truncate_text;
use crate::workflow::serializable::to_wire;
use crate::workflow::ExecutionContext;

/// 返回值无法序列化时的报告错误
pub const NOT_SERIALIZABLE: &str = "The return value is not JSON serializable";

/// 任务描述不合法时报告中的错误前缀
pub const MALFORMED_TASK: &str = "ValueError: malformed task";

/// 追加在任务代码之后的调用语句
const MAIN_CALL: &str = "\nglobalThis.__task_result = main(...globalThis.__task_args);\n";

/// 脚本执行的结果
#[derive(Debug)]
struct ScriptOutcome {
    failure: Option<ScriptFailure>,
    result: ScriptValue,
}

/// 任务执行器
///
/// - 每个任务一个全新的脚本环境
/// - 不持有跨任务的状态
pub struct TaskRunner {
    http: reqwest::Client,
    controller: ControllerClient,
    config: Config,
}

impl TaskRunner {
    /// 创建新的任务执行器
    pub fn new(http: reqwest::Client, controller: ControllerClient, config: Config) -> Self {
        Self {
            http,
            controller,
            config,
        }
    }

    /// 执行任务并提交报告
    ///
    /// # 返回
    /// 最终的 `is_success`；提交失败时为 false
    pub async fn process_task(&self, task: &Task, secret: &str) -> AppResult<bool> {
        let mut ctx = ExecutionContext::default();
        ctx.set(secret, &task.domain, &task.auth_token);
        info!("[任务 {}] {} ▶️ 开始执行", task.id, ctx);

        let report = self.execute(task, ctx).await;

        if report.is_success {
            info!("[任务 {}] ✅ 执行成功", task.id);
        } else {
            warn!(
                "[任务 {}] ❌ 执行失败: {}",
                task.id,
                report.error.as_deref().unwrap_or_default()
            );
        }

        self.submit(&report, secret).await
    }

    /// 上报一个无法解析的任务，不执行任何代码
    pub async fn report_malformed(
        &self,
        id: &TaskId,
        reason: &str,
        secret: &str,
    ) -> AppResult<bool> {
        warn!("[任务 {}] ❌ 任务描述不合法: {}", id, reason);
        let report = TaskReport {
            task_id: id.clone(),
            is_success: false,
            result: JsonValue::Null,
            error: Some(format!("{}: {}", MALFORMED_TASK, reason)),
        };
        self.submit(&report, secret).await
    }

    /// 提交报告；控制器未确认或网络失败都记为失败，不重试
    async fn submit(&self, report: &TaskReport, secret: &str) -> AppResult<bool> {
        match self.controller.set_task_result(secret, report).await {
            Ok(true) => Ok(report.is_success),
            Ok(false) => {
                error!("[任务 {}] ⚠️ 控制器未确认任务结果", report.task_id);
                Ok(false)
            }
            Err(e @ AppError::Api(ApiError::Transport { .. })) => {
                error!("[任务 {}] ⚠️ 提交任务结果失败: {}", report.task_id, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// 执行脚本并生成报告，不发出提交请求
    pub async fn execute(&self, task: &Task, ctx: ExecutionContext) -> TaskReport {
        let host = HostApi::new(
            Handle::current(),
            self.http.clone(),
            self.controller.clone(),
            ctx,
            &self.config,
        );
        let code = task.code.clone();
        let args = JsonValue::Array(task.positional_args());
        let request_data = task.request_data.clone();

        let joined =
            tokio::task::spawn_blocking(move || run_script(host, &code, &args, &request_data))
                .await;

        let outcome = match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return engine_failure(task, e),
            Err(e) => return engine_failure(task, ScriptError::Aborted(e.to_string())),
        };

        let mut report = TaskReport {
            task_id: task.id.clone(),
            is_success: outcome.failure.is_none(),
            result: JsonValue::Null,
            error: outcome.failure.map(|f| f.to_string()),
        };

        match to_wire(&outcome.result) {
            Ok(value) => report.result = value,
            Err(e) => {
                warn!(
                    "[任务 {}] 返回值无法序列化: {}",
                    task.id,
                    truncate_text(&e.repr, 200)
                );
                report.is_success = false;
                report.error = Some(NOT_SERIALIZABLE.to_string());
            }
        }

        report
    }
}

/// 在当前线程上完成一次脚本执行
fn run_script(
    host: HostApi,
    code: &str,
    args: &JsonValue,
    request_data: &JsonValue,
) -> Result<ScriptOutcome, ScriptError> {
    let executor = JsExecutor::new()?;
    executor.install_host(Rc::new(host))?;
    executor.set_global_json("pycode_request_data", request_data)?;
    executor.set_global_json("__task_args", args)?;
    executor.set_global_json("__task_result", &JsonValue::Null)?;

    let source = format!("{}{}", code, MAIN_CALL);
    let failure = executor.exec(&source)?;
    if let Some(failure) = &failure {
        debug!("脚本抛出异常: {}", failure);
    }

    let result = executor.read_global("__task_result")?;
    Ok(ScriptOutcome { failure, result })
}

fn engine_failure(task: &Task, e: ScriptError) -> TaskReport {
    let e = AppError::from(e);
    error!("[任务 {}] 脚本引擎异常: {}", task.id, e);
    TaskReport {
        task_id: task.id.clone(),
        is_success: false,
        result: JsonValue::Null,
        error: Some(format!("{}: {}", e.kind(), e)),
    }
}
