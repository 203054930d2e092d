//! Task-to-task decorators
//!
//! Decorators wrap a task and add behavior around its contract without
//! changing it: same name, same error propagation, and the wrapped task's
//! whole-rollback capability is preserved through the wrapper.

pub mod log;
pub mod retry;

pub use log::LogTask;
pub use retry::RetryTask;
