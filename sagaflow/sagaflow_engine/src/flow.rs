use sagaflow_core::{FlowError, Task};
use std::sync::Arc;

/// Lifecycle hook run around a flow's forward pass or rollback pass
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Observer invoked with a flow's final error, side effect only
pub type ErrorHandler = Arc<dyn Fn(&FlowError) + Send + Sync>;

/// A composite task that accepts child tasks
///
/// A flow is itself a [`Task`], so flows nest arbitrarily: adding a flow
/// to another flow composes their rollback behavior through the task
/// contract.
pub trait Flow: Task {
    /// Appends a child task
    ///
    /// # Panics
    ///
    /// Panics once the flow's execution has started; the child list is
    /// append-only and freezes the moment execution begins.
    fn add_task(&mut self, task: Arc<dyn Task>);
}

pub(crate) fn fire(hook: &Option<Hook>) {
    if let Some(hook) = hook {
        hook();
    }
}

pub(crate) fn report(handler: &Option<ErrorHandler>, err: &FlowError) {
    if let Some(handler) = handler {
        handler(err);
    }
}
