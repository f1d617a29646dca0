pub mod batch;
pub mod task;

pub use batch::{ApiParams, BatchCallResult, BatchOptions, BatchResult, CallSpec};
pub use task::{FetchedTask, Task, TaskEnvelope, TaskId, TaskReport};
