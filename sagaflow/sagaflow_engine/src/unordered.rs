use crate::flow::{fire, report, ErrorHandler, Flow, Hook};
use async_trait::async_trait;
use sagaflow_core::{BoxError, CompensateAll, ExecContext, FlowError, Task, TaskErrors};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Saga executor for independent tasks
///
/// Children carry no ordering relationship: each one runs on its own,
/// optionally concurrently, and a child that fails compensates itself
/// immediately instead of waiting for the flow to unwind siblings.
/// The flow's own [`Task::compensate`] is therefore a no-op; a full
/// rollback of every child goes through [`CompensateAll`] and only does
/// work when the full-rollback policy is enabled.
pub struct UnorderedFlow {
    name: String,
    tasks: Vec<Arc<dyn Task>>,
    started: AtomicBool,

    pub(crate) undo_all_tasks: bool,
    pub(crate) concurrent: bool,

    pub(crate) before_execute: Option<Hook>,
    pub(crate) after_execute: Option<Hook>,
    pub(crate) before_compensate: Option<Hook>,
    pub(crate) after_compensate: Option<Hook>,
    pub(crate) error_handler: Option<ErrorHandler>,
}

/// Result of one child's forward attempt, including the outcome of its
/// immediate self-compensation when the attempt failed
struct UnitOutcome {
    name: String,
    do_err: Option<BoxError>,
    undo_err: Option<BoxError>,
}

impl UnorderedFlow {
    /// Creates an empty unordered flow with default options
    pub fn new(name: impl Into<String>) -> Self {
        UnorderedFlow {
            name: name.into(),
            tasks: Vec::new(),
            started: AtomicBool::new(false),
            undo_all_tasks: false,
            concurrent: false,
            before_execute: None,
            after_execute: None,
            before_compensate: None,
            after_compensate: None,
            error_handler: None,
        }
    }

    /// When enabled, children run concurrently on spawned tasks instead
    /// of one after another
    pub fn with_concurrent(mut self, enabled: bool) -> Self {
        self.concurrent = enabled;
        self
    }

    /// Enables the full-rollback capability. Off by default, and without
    /// it [`CompensateAll::compensate_all`] does nothing.
    pub fn with_undo_all_tasks(mut self, enabled: bool) -> Self {
        self.undo_all_tasks = enabled;
        self
    }

    /// Hook fired when execution starts, before any child runs
    pub fn with_before_execute(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_execute = Some(Arc::new(hook));
        self
    }

    /// Hook fired when execution finishes, successful or not
    pub fn with_after_execute(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_execute = Some(Arc::new(hook));
        self
    }

    /// Hook fired when a full rollback starts. Per-child
    /// self-compensation during execution does not fire it.
    pub fn with_before_compensate(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_compensate = Some(Arc::new(hook));
        self
    }

    /// Hook fired when a full rollback finishes
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

    /// Appends several children at once
    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = Arc<dyn Task>>) {
        for task in tasks {
            Flow::add_task(self, task);
        }
    }

    async fn run(&self, ctx: &ExecContext) -> Result<(), FlowError> {
        fire(&self.before_execute);
        let result = self.run_units(ctx).await;
        fire(&self.after_execute);
        result
    }

    async fn run_units(&self, ctx: &ExecContext) -> Result<(), FlowError> {
        self.started.store(true, Ordering::SeqCst);

        let expected = self.tasks.len();
        let (tx, mut rx) = mpsc::channel(expected.max(1));
        for task in &self.tasks {
            if self.concurrent {
                let task = Arc::clone(task);
                let ctx = ctx.clone();
                let tx = tx.clone();
                let undo_all = self.undo_all_tasks;
                tokio::spawn(async move {
                    let outcome = run_unit(task.as_ref(), &ctx, undo_all).await;
                    let _ = tx.send(outcome).await;
                });
            } else {
                let outcome = run_unit(task.as_ref(), ctx, self.undo_all_tasks).await;
                let _ = tx.send(outcome).await;
            }
        }
        // The collector's copy must go away so a panicked child cannot
        // leave the drain below waiting forever.
        drop(tx);

        let mut received = 0;
        let mut errs = TaskErrors::new();
        while let Some(outcome) = rx.recv().await {
            received += 1;
            if let Some(do_err) = outcome.do_err {
                errs.append(outcome.name, Some(do_err), outcome.undo_err);
            }
        }
        if received != expected {
            log::warn!(
                "flow '{}' collected {} of {} task results",
                self.name,
                received,
                expected
            );
        }

        if errs.is_empty() {
            return Ok(());
        }
        let err = FlowError::new(self.name.clone(), errs);
        report(&self.error_handler, &err);
        Err(err)
    }

    /// Compensates every child in declaration order when the
    /// full-rollback policy is enabled, preferring a child's own
    /// full-rollback capability where it has one
    async fn rollback_all(&self, ctx: &ExecContext) -> Result<(), FlowError> {
        if !self.undo_all_tasks {
            return Ok(());
        }

        fire(&self.before_compensate);
        let mut errs = TaskErrors::new();
        for task in &self.tasks {
            let result = match task.as_compensate_all() {
                Some(all) => all.compensate_all(ctx).await,
                None => task.compensate(ctx).await,
            };
            if let Err(err) = result {
                errs.append(task.name(), None, Some(err));
            }
        }
        fire(&self.after_compensate);

        if errs.is_empty() {
            return Ok(());
        }
        let err = FlowError::new(self.name.clone(), errs);
        report(&self.error_handler, &err);
        Err(err)
    }
}

async fn run_unit(task: &dyn Task, ctx: &ExecContext, undo_all: bool) -> UnitOutcome {
    let name = task.name().to_string();
    match task.execute(ctx).await {
        Ok(()) => UnitOutcome {
            name,
            do_err: None,
            undo_err: None,
        },
        Err(do_err) => {
            let undo_result = match task.as_compensate_all() {
                Some(all) if undo_all => all.compensate_all(ctx).await,
                _ => task.compensate(ctx).await,
            };
            UnitOutcome {
                name,
                do_err: Some(do_err),
                undo_err: undo_result.err(),
            }
        }
    }
}

#[async_trait]
impl Task for UnorderedFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        self.run(ctx).await.map_err(BoxError::from)
    }

    /// Intentionally a no-op: a child that failed already compensated
    /// itself during `execute`, and successful children are left alone
    /// unless the caller asks for a full rollback
    async fn compensate(&self, _ctx: &ExecContext) -> Result<(), BoxError> {
        Ok(())
    }

    fn as_compensate_all(&self) -> Option<&dyn CompensateAll> {
        Some(self)
    }
}

#[async_trait]
impl CompensateAll for UnorderedFlow {
    async fn compensate_all(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        self.rollback_all(ctx).await.map_err(BoxError::from)
    }
}

impl Flow for UnorderedFlow {
    fn add_task(&mut self, task: Arc<dyn Task>) {
        assert!(
            !self.started.load(Ordering::SeqCst),
            "tasks cannot be added to a flow whose execution has started"
        );
        self.tasks.push(task);
    }
}

impl fmt::Display for UnorderedFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnorderedFlow(name={})", self.name)
    }
}

impl fmt::Debug for UnorderedFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnorderedFlow")
            .field("name", &self.name)
            .field("tasks", &self.tasks.len())
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("undo_all_tasks", &self.undo_all_tasks)
            .field("concurrent", &self.concurrent)
            .finish()
    }
}
