//! Sagaflow Core
//!
//! Task contract, error model and execution context for the sagaflow
//! orchestration engine. This crate defines the vocabulary the flow
//! executors in `sagaflow_engine` are built from: a task is a named,
//! reversible, async unit of work, and failures are attributed to tasks
//! by name so a caller can always reconstruct which part of a composed
//! flow failed and whether its compensation failed too.
//!
//! # Features
//!
//! - Reversible tasks: every task pairs a forward action with a
//!   compensation, the saga building block
//! - Precise failure attribution: `TaskError`/`FlowError` values compose
//!   hierarchically and render deterministically
//! - Cancellable execution context with a shared, typed key/value store
//! - Decorators: logging and retry wrappers that preserve the task
//!   contract, including the whole-rollback capability
//!
//! # Getting Started
//!
//! ```rust,no_run
//! use sagaflow_core::{ExecContext, FnTask, Task};
//!
//! let task = FnTask::new("reserve", |ctx: ExecContext| async move {
//!     ctx.set("reservation", "r-1").await?;
//!     Ok(())
//! })
//! .with_compensation(|ctx: ExecContext| async move {
//!     ctx.set("reservation", serde_json::Value::Null).await?;
//!     Ok(())
//! });
//!
//! tokio::runtime::Runtime::new().unwrap().block_on(async {
//!     let ctx = ExecContext::new();
//!     task.execute(&ctx).await.unwrap();
//! });
//! ```

/// Execution context threaded through every task call
pub mod context;

/// Task and flow error types
pub mod error;

/// The task contract and the closure-backed leaf task
pub mod task;

/// Logging and retry decorators
pub mod decorator;

// Re-export important types
pub use context::{ContextError, ExecContext};
pub use decorator::{LogTask, RetryTask};
pub use error::{BoxError, FlowError, TaskError, TaskErrors};
pub use task::{new_task, CompensateAll, FnTask, Task, TaskFn, TaskFuture};
