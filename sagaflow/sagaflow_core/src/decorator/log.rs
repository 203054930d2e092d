use crate::context::ExecContext;
use crate::error::BoxError;
use crate::task::{CompensateAll, Task};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Log sink invoked by [`LogTask`] with a preformatted message
pub type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Decorator that emits a log line immediately before delegating
pub struct LogTask {
    inner: Arc<dyn Task>,
    log: LogFn,
}

impl LogTask {
    /// Wraps `task`, sending a message to `log` before every delegation
    pub fn new(task: Arc<dyn Task>, log: impl Fn(&str) + Send + Sync + 'static) -> Self {
        LogTask {
            inner: task,
            log: Arc::new(log),
        }
    }

    /// Wraps `task`, logging through the `log` facade at debug level
    pub fn debug(task: Arc<dyn Task>) -> Self {
        LogTask::new(task, |msg| log::debug!("{}", msg))
    }
}

#[async_trait]
impl Task for LogTask {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        (self.log)(&format!("executing the task '{}'", self.inner.name()));
        self.inner.execute(ctx).await
    }

    async fn compensate(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        (self.log)(&format!("compensating the task '{}'", self.inner.name()));
        self.inner.compensate(ctx).await
    }

    fn as_compensate_all(&self) -> Option<&dyn CompensateAll> {
        self.inner
            .as_compensate_all()
            .map(|_| self as &dyn CompensateAll)
    }
}

#[async_trait]
impl CompensateAll for LogTask {
    async fn compensate_all(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        (self.log)(&format!("compensating all tasks of '{}'", self.inner.name()));
        match self.inner.as_compensate_all() {
            Some(all) => all.compensate_all(ctx).await,
            None => self.inner.compensate(ctx).await,
        }
    }
}

impl fmt::Display for LogTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for LogTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogTask")
            .field("name", &self.inner.name())
            .finish()
    }
}
