//! The task contract and the closure-backed leaf task.

use crate::context::ExecContext;
use crate::error::BoxError;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by a task action function
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// Action function backing an [`FnTask`]
pub type TaskFn = Arc<dyn Fn(ExecContext) -> TaskFuture + Send + Sync>;

/// An atomic, reversible, named unit of work
///
/// `execute` performs the forward action and `compensate` reverses it;
/// both observe the cancellable [`ExecContext`] they are given. A task's
/// name is assigned at construction and never changes; it is how failures
/// are attributed. Flows implement `Task` themselves, which is what lets
/// flows nest arbitrarily.
#[async_trait]
pub trait Task: fmt::Display + Send + Sync {
    /// Returns the task's name
    fn name(&self) -> &str;

    /// Performs the forward action
    async fn execute(&self, ctx: &ExecContext) -> Result<(), BoxError>;

    /// Reverses a completed forward action
    async fn compensate(&self, ctx: &ExecContext) -> Result<(), BoxError>;

    /// Returns the whole-rollback capability if this task carries one
    ///
    /// Flows use this to decide between a single compensating step and a
    /// full cascading rollback of the task's internal state. The default
    /// is `None`; only tasks with internal children (or decorators
    /// wrapping one) return `Some`.
    fn as_compensate_all(&self) -> Option<&dyn CompensateAll> {
        None
    }
}

/// Optional capability: roll back a task's entire internal state
///
/// For a nested flow this is the difference between invoking the flow's
/// own `compensate` (a no-op for the unordered flow, whose children have
/// already self-compensated) and genuinely rolling back every child.
#[async_trait]
pub trait CompensateAll: Send + Sync {
    /// Rolls back everything this task did, cascading into its children
    async fn compensate_all(&self, ctx: &ExecContext) -> Result<(), BoxError>;
}

fn boxed_task_fn<F, Fut>(f: F) -> TaskFn
where
    F: Fn(ExecContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |ctx| -> TaskFuture { Box::pin(f(ctx)) })
}

/// The basic leaf task: an async action with an optional compensation
///
/// Without an attached compensation, `compensate` is a no-op success.
#[derive(Clone)]
pub struct FnTask {
    name: String,
    action: TaskFn,
    compensation: Option<TaskFn>,
}

impl FnTask {
    /// Creates a task named `name` backed by the `action` closure
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty; the name is the task's identity and an
    /// empty one is a programming error, not a runtime condition.
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(ExecContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let name = name.into();
        assert!(!name.is_empty(), "the task name must not be empty");
        FnTask {
            name,
            action: boxed_task_fn(action),
            compensation: None,
        }
    }

    /// Attaches the compensation closure reversing the action
    pub fn with_compensation<F, Fut>(mut self, compensation: F) -> Self
    where
        F: Fn(ExecContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.compensation = Some(boxed_task_fn(compensation));
        self
    }
}

#[async_trait]
impl Task for FnTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        (self.action)(ctx.clone()).await
    }

    async fn compensate(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        match &self.compensation {
            Some(compensation) => (compensation)(ctx.clone()).await,
            None => Ok(()),
        }
    }
}

impl fmt::Display for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task(name={})", self.name)
    }
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("has_compensation", &self.compensation.is_some())
            .finish()
    }
}

/// Create a new task from an action closure
///
/// Shorthand for [`FnTask::new`].
pub fn new_task<F, Fut>(name: impl Into<String>, action: F) -> FnTask
where
    F: Fn(ExecContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    FnTask::new(name, action)
}
