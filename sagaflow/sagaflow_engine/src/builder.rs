use crate::flow::{ErrorHandler, Hook};
use crate::line::LineFlow;
use crate::unordered::UnorderedFlow;
use sagaflow_core::FlowError;
use std::sync::Arc;

/// Reusable flow configuration
///
/// Collects options and hooks once, then stamps them onto any number of
/// freshly built flows. Options that do not apply to a flow kind are
/// ignored: `concurrent` only affects unordered flows and
/// `undo_failed_task` only affects ordered ones.
#[derive(Clone, Default)]
pub struct FlowBuilder {
    undo_failed_task: bool,
    undo_all_tasks: bool,
    concurrent: bool,
    before_execute: Option<Hook>,
    after_execute: Option<Hook>,
    before_compensate: Option<Hook>,
    after_compensate: Option<Hook>,
    error_handler: Option<ErrorHandler>,
}

impl FlowBuilder {
    /// Creates a builder with every option off
    pub fn new() -> Self {
        FlowBuilder::default()
    }

    /// Runs the children of unordered flows concurrently
    pub fn concurrent(mut self, enabled: bool) -> Self {
        self.concurrent = enabled;
        self
    }

    /// Includes the failing task itself in an ordered flow's rollback
    pub fn undo_failed_task(mut self, enabled: bool) -> Self {
        self.undo_failed_task = enabled;
        self
    }

    /// Lets rollback cascade through children exposing the full-rollback
    /// capability
    pub fn undo_all_tasks(mut self, enabled: bool) -> Self {
        self.undo_all_tasks = enabled;
        self
    }

    /// Hook fired when a flow's execution starts
    pub fn before_execute(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_execute = Some(Arc::new(hook));
        self
    }

    /// Hook fired when a flow's execution finishes
    pub fn after_execute(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_execute = Some(Arc::new(hook));
        self
    }

    /// Hook fired when a flow's rollback pass starts
    pub fn before_compensate(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_compensate = Some(Arc::new(hook));
        self
    }

    /// Hook fired when a flow's rollback pass finishes
    pub fn after_compensate(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_compensate = Some(Arc::new(hook));
        self
    }

    /// Observer invoked with a flow's final error
    pub fn error_handler(mut self, handler: impl Fn(&FlowError) + Send + Sync + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Builds an empty ordered flow carrying this configuration
    pub fn line_flow(&self, name: impl Into<String>) -> LineFlow {
        let mut flow = LineFlow::new(name);
        flow.undo_failed_task = self.undo_failed_task;
        flow.undo_all_tasks = self.undo_all_tasks;
        flow.before_execute = self.before_execute.clone();
        flow.after_execute = self.after_execute.clone();
        flow.before_compensate = self.before_compensate.clone();
        flow.after_compensate = self.after_compensate.clone();
        flow.error_handler = self.error_handler.clone();
        flow
    }

    /// Builds an empty unordered flow carrying this configuration
    pub fn unordered_flow(&self, name: impl Into<String>) -> UnorderedFlow {
        let mut flow = UnorderedFlow::new(name);
        flow.undo_all_tasks = self.undo_all_tasks;
        flow.concurrent = self.concurrent;
        flow.before_execute = self.before_execute.clone();
        flow.after_execute = self.after_execute.clone();
        flow.before_compensate = self.before_compensate.clone();
        flow.after_compensate = self.after_compensate.clone();
        flow.error_handler = self.error_handler.clone();
        flow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Flow;
    use sagaflow_core::{new_task, BoxError, ExecContext, Task};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_builder_stamps_options_onto_line_flow() {
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let undo_events = Arc::clone(&events);
        let do_events = Arc::clone(&events);

        let failing = new_task("charge", move |_ctx| {
            let events = Arc::clone(&do_events);
            async move {
                events.lock().unwrap().push("do charge".to_string());
                Err(BoxError::from("declined"))
            }
        })
        .with_compensation(move |_ctx| {
            let events = Arc::clone(&undo_events);
            async move {
                events.lock().unwrap().push("undo charge".to_string());
                Ok(())
            }
        });

        let mut flow = FlowBuilder::new()
            .undo_failed_task(true)
            .line_flow("checkout");
        flow.add_task(Arc::new(failing));

        let ctx = ExecContext::new();
        flow.execute(&ctx).await.unwrap_err();

        assert_eq!(*events.lock().unwrap(), vec!["do charge", "undo charge"]);
    }

    #[tokio::test]
    async fn test_shared_builder_configures_independent_flows() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let builder = FlowBuilder::new()
            .concurrent(true)
            .before_execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let mut line = builder.line_flow("checkout");
        let mut unordered = builder.unordered_flow("billing");
        line.add_task(Arc::new(new_task("reserve", |_ctx| async { Ok(()) })));
        unordered.add_task(Arc::new(new_task("charge", |_ctx| async { Ok(()) })));

        let ctx = ExecContext::new();
        line.execute(&ctx).await.unwrap();
        unordered.execute(&ctx).await.unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(line.tasks().len(), 1);
        assert_eq!(unordered.tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_cloned_builder_keeps_error_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let builder = FlowBuilder::new().error_handler(move |_err| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut flow = builder.clone().line_flow("checkout");
        flow.add_task(Arc::new(new_task("boom", |_ctx| async {
            Err(BoxError::from("boom"))
        })));

        let ctx = ExecContext::new();
        flow.execute(&ctx).await.unwrap_err();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
