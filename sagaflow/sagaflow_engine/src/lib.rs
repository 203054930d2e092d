//! Sagaflow Engine - Saga orchestration over reversible tasks
//!
//! Features:
//! - Ordered flows that stop at the first failure and compensate the
//!   completed prefix in reverse order
//! - Unordered flows whose children run independently, optionally
//!   concurrently, and compensate themselves on failure
//! - Flows nest as ordinary tasks, with an opt-in full-rollback cascade
//!   through nested flows
//! - Failures attributed to tasks by name in a structured error tree
//! - Lifecycle hooks, error observers, and a reusable [`FlowBuilder`]
//!
//! # Getting Started
//!
//! ```rust,no_run
//! use sagaflow_core::{new_task, BoxError, ExecContext, Task};
//! use sagaflow_engine::{Flow, FlowBuilder};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), BoxError> {
//!     let runtime = tokio::runtime::Runtime::new()?;
//!     runtime.block_on(async {
//!         let mut flow = FlowBuilder::new()
//!             .undo_all_tasks(true)
//!             .line_flow("checkout");
//!
//!         flow.add_task(Arc::new(new_task("reserve", |ctx: ExecContext| async move {
//!             ctx.set("order_id", "ord-42").await?;
//!             Ok(())
//!         })));
//!         flow.add_task(Arc::new(
//!             new_task("charge", |_ctx| async { Err(BoxError::from("card declined")) })
//!                 .with_compensation(|_ctx| async { Ok(()) }),
//!         ));
//!
//!         if let Err(err) = flow.execute(&ExecContext::new()).await {
//!             println!("rolled back: {}", err);
//!         }
//!         Ok(())
//!     })
//! }
//! ```

/// Shared configuration stamped onto freshly built flows
pub mod builder;

/// The flow contract plus hook and error-observer types
pub mod flow;

/// Ordered execution with reverse-order rollback
pub mod line;

/// Unordered execution with per-task self-compensation
pub mod unordered;

pub use builder::FlowBuilder;
pub use flow::{ErrorHandler, Flow, Hook};
pub use line::LineFlow;
pub use unordered::UnorderedFlow;

/// Error types from across the engine
pub mod error {
    pub use sagaflow_core::context::ContextError;
    pub use sagaflow_core::error::{BoxError, FlowError, TaskError, TaskErrors};
}

/// Creates an empty ordered flow with default options
pub fn line_flow(name: &str) -> LineFlow {
    LineFlow::new(name)
}

/// Creates an empty unordered flow with default options
pub fn unordered_flow(name: &str) -> UnorderedFlow {
    UnorderedFlow::new(name)
}
