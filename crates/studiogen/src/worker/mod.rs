pub mod pool;
pub mod retry;

pub use pool::{TaskFailure, TaskOutcome, WorkerPool};
pub use retry::retry_once;
