pub mod batch_builder;
pub mod batch_executor;
pub mod file_fetch;
pub mod reusable;
pub mod storage;
pub mod telegram_log;

pub use batch_executor::BatchExecutor;
pub use storage::StorageService;
pub use telegram_log::TelegramLog;
