pub mod execution_ctx;
pub mod serializable;
pub mod task_runner;

pub use execution_ctx::ExecutionContext;
pub use task_runner::TaskRunner;
