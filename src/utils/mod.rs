pub mod instance_lock;
pub mod logging;

pub use instance_lock::InstanceLock;
