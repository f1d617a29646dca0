//! 任务循环 - 编排层
//!
//! 反复拉取任务并交给 [`TaskRunner`]，直到队列为空或控制器不可用。
//! 严格串行：同一时刻只有一个任务在执行。

use tracing::{error, info};

use crate::clients::ControllerClient;
use crate::config::Config;
use crate::models::FetchedTask;
use crate::workflow::TaskRunner;

/// 循环统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    /// 已处理的任务数
    pub processed: usize,
    /// 失败（或报告未被确认）的任务数
    pub errors: usize,
}

/// 任务循环
pub struct TaskLoop {
    controller: ControllerClient,
    runner: TaskRunner,
}

impl TaskLoop {
    /// 创建新的任务循环，HTTP 连接池在全部任务间共享
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::new();
        let controller = ControllerClient::new(http.clone(), config);
        Self {
            runner: TaskRunner::new(http, controller.clone(), config.clone()),
            controller,
        }
    }

    /// 运行到队列为空
    pub async fn run(&self, secret: &str) -> LoopStats {
        let mut stats = LoopStats::default();

        loop {
            let task = match self.controller.get_task(secret).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    info!("📭 任务队列为空");
                    break;
                }
                Err(e) => {
                    error!("❌ 拉取任务失败: {}", e);
                    break;
                }
            };

            stats.processed += 1;
            let (id, outcome) = match &task {
                FetchedTask::Ready(task) => {
                    (&task.id, self.runner.process_task(task, secret).await)
                }
                FetchedTask::Malformed { id, reason } => {
                    (id, self.runner.report_malformed(id, reason, secret).await)
                }
            };
            match outcome {
                Ok(true) => {}
                Ok(false) => stats.errors += 1,
                Err(e) => {
                    error!("[任务 {}] ❌ 处理过程中发生错误: {}", id, e);
                    stats.errors += 1;
                }
            }
        }

        stats
    }
}
