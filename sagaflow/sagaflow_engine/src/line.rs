use crate::flow::{fire, report, ErrorHandler, Flow, Hook};
use async_trait::async_trait;
use sagaflow_core::{BoxError, ExecContext, FlowError, Task, TaskError, TaskErrors};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Ordered saga executor
///
/// Runs its children strictly in declaration order and stops at the first
/// failure. The completed prefix is then compensated in strict reverse
/// order, and the result is a [`FlowError`] attributing the forward
/// failure and every compensation failure to its task by name.
///
/// Children never run concurrently, so tasks may pass state to their
/// successors through the [`ExecContext`] store without extra
/// coordination.
pub struct LineFlow {
    name: String,
    tasks: Vec<Arc<dyn Task>>,

    /// Count of children whose forward action completed, -1 until
    /// execution starts. Rollback walks this prefix in reverse.
    index: AtomicI64,

    pub(crate) undo_failed_task: bool,
    pub(crate) undo_all_tasks: bool,

    pub(crate) before_execute: Option<Hook>,
    pub(crate) after_execute: Option<Hook>,
    pub(crate) before_compensate: Option<Hook>,
    pub(crate) after_compensate: Option<Hook>,
    pub(crate) error_handler: Option<ErrorHandler>,
}

impl LineFlow {
    /// Creates an empty ordered flow with default options
    pub fn new(name: impl Into<String>) -> Self {
        LineFlow {
            name: name.into(),
            tasks: Vec::new(),
            index: AtomicI64::new(-1),
            undo_failed_task: false,
            undo_all_tasks: false,
            before_execute: None,
            after_execute: None,
            before_compensate: None,
            after_compensate: None,
            error_handler: None,
        }
    }

    /// When enabled, the failing task itself is included in the rollback
    /// pass. Off by default: a task that failed its forward action is
    /// normally assumed to have left nothing behind.
    pub fn with_undo_failed_task(mut self, enabled: bool) -> Self {
        self.undo_failed_task = enabled;
        self
    }

    /// When enabled, rollback asks each child for its full-rollback
    /// capability before falling back to plain compensation. Nested
    /// flows that expose the capability then cascade the rollback to
    /// their own children.
    pub fn with_undo_all_tasks(mut self, enabled: bool) -> Self {
        self.undo_all_tasks = enabled;
        self
    }

    /// Hook fired when execution starts, before the first child runs
    pub fn with_before_execute(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_execute = Some(Arc::new(hook));
        self
    }

    /// Hook fired when execution finishes, successful or not
    pub fn with_after_execute(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_execute = Some(Arc::new(hook));
        self
    }

    /// Hook fired when a rollback pass starts, even when there is
    /// nothing to compensate
    pub fn with_before_compensate(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_compensate = Some(Arc::new(hook));
        self
    }

    /// Hook fired when a rollback pass finishes
    pub fn with_after_compensate(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_compensate = Some(Arc::new(hook));
        self
    }

    /// Observer invoked with the final [`FlowError`] before it is
    /// returned to the caller
    pub fn with_error_handler(mut self, handler: impl Fn(&FlowError) + Send + Sync + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// All children in declaration order
    pub fn tasks(&self) -> &[Arc<dyn Task>] {
        &self.tasks
    }

    /// The prefix of children whose forward action has completed
    pub fn done_tasks(&self) -> &[Arc<dyn Task>] {
        &self.tasks[..self.done_count()]
    }

    /// Appends several children at once
    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = Arc<dyn Task>>) {
        for task in tasks {
            Flow::add_task(self, task);
        }
    }

    fn started(&self) -> bool {
        self.index.load(Ordering::SeqCst) > -1
    }

    fn done_count(&self) -> usize {
        let index = self.index.load(Ordering::SeqCst);
        index.clamp(0, self.tasks.len() as i64) as usize
    }

    async fn run(&self, ctx: &ExecContext) -> Result<(), FlowError> {
        fire(&self.before_execute);
        let result = self.run_tasks(ctx).await;
        fire(&self.after_execute);
        result
    }

    async fn run_tasks(&self, ctx: &ExecContext) -> Result<(), FlowError> {
        self.index.store(0, Ordering::SeqCst);
        for task in &self.tasks {
            match task.execute(ctx).await {
                Ok(()) => {
                    self.index.fetch_add(1, Ordering::SeqCst);
                }
                Err(do_err) => {
                    if self.undo_failed_task {
                        self.index.fetch_add(1, Ordering::SeqCst);
                    }
                    log::debug!(
                        "task '{}' failed in flow '{}', rolling back {} completed task(s)",
                        task.name(),
                        self.name,
                        self.done_count()
                    );
                    let undo_errs = self.rollback(ctx).await;
                    let err = self.attribute(task.name(), do_err, undo_errs);
                    report(&self.error_handler, &err);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Compensates the completed prefix in reverse order, collecting
    /// failures instead of stopping at them. Does not touch the
    /// progress index, so the rollback can be retried.
    async fn rollback(&self, ctx: &ExecContext) -> TaskErrors {
        fire(&self.before_compensate);

        let mut errs = TaskErrors::new();
        for task in self.tasks[..self.done_count()].iter().rev() {
            let result = match task.as_compensate_all() {
                Some(all) if self.undo_all_tasks => all.compensate_all(ctx).await,
                _ => task.compensate(ctx).await,
            };
            if let Err(err) = result {
                errs.append(task.name(), None, Some(err));
            }
        }

        fire(&self.after_compensate);
        errs
    }

    /// Builds the flow's final error. A rollback failure of the task that
    /// failed its forward action merges into a single entry carrying both
    /// sides; all other rollback failures follow in collection order.
    fn attribute(&self, failed: &str, do_err: BoxError, undo_errs: TaskErrors) -> FlowError {
        if undo_errs.is_empty() {
            return FlowError::new(
                self.name.clone(),
                TaskError::new(failed, Some(do_err), None).into(),
            );
        }

        let mut failed_undo_err: Option<BoxError> = None;
        let mut rest = Vec::new();
        for undo_err in undo_errs {
            let (name, _, undo) = undo_err.into_parts();
            if name == failed {
                failed_undo_err = undo;
            } else {
                rest.push(TaskError::new(name, None, undo));
            }
        }

        let mut errs: TaskErrors = TaskError::new(failed, Some(do_err), failed_undo_err).into();
        for err in rest {
            errs.push(err);
        }
        FlowError::new(self.name.clone(), errs)
    }
}

#[async_trait]
impl Task for LineFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        self.run(ctx).await.map_err(BoxError::from)
    }

    /// Rolls back whatever prefix has completed so far. Before execution
    /// has started this compensates nothing, though the rollback hooks
    /// still fire.
    async fn compensate(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        let errs = self.rollback(ctx).await;
        if errs.is_empty() {
            return Ok(());
        }
        let err = FlowError::new(self.name.clone(), errs);
        report(&self.error_handler, &err);
        Err(BoxError::from(err))
    }
}

impl Flow for LineFlow {
    fn add_task(&mut self, task: Arc<dyn Task>) {
        assert!(
            !self.started(),
            "tasks cannot be added to a flow whose execution has started"
        );
        self.tasks.push(task);
    }
}

impl fmt::Display for LineFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineFlow(name={})", self.name)
    }
}

impl fmt::Debug for LineFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineFlow")
            .field("name", &self.name)
            .field("tasks", &self.tasks.len())
            .field("index", &self.index.load(Ordering::SeqCst))
            .field("undo_failed_task", &self.undo_failed_task)
            .field("undo_all_tasks", &self.undo_all_tasks)
            .finish()
    }
}
