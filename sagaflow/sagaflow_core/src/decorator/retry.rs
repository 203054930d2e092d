use crate::context::ExecContext;
use crate::error::BoxError;
use crate::task::{CompensateAll, Task};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Decorator that retries the forward action and the compensation
///
/// The wrapped call runs once immediately; on failure it is retried up to
/// `retries` more times, waiting `interval` before each retry (no wait
/// after the final attempt). The wait observes cancellation: if the
/// context is cancelled while waiting or before a retry starts, the last
/// observed error is returned without further attempts. Forward and
/// compensation calls retry independently of each other.
pub struct RetryTask {
    inner: Arc<dyn Task>,
    retries: u32,
    interval: Duration,
}

impl RetryTask {
    /// Wraps `task`, retrying failures `retries` times, `interval` apart
    pub fn new(task: Arc<dyn Task>, retries: u32, interval: Duration) -> Self {
        RetryTask {
            inner: task,
            retries,
            interval,
        }
    }

    async fn retry<F, Fut>(&self, ctx: &ExecContext, attempt: F) -> Result<(), BoxError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), BoxError>>,
    {
        let mut last = match attempt().await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        for _ in 0..self.retries {
            if ctx.is_cancelled() {
                return Err(last);
            }

            if !self.interval.is_zero() {
                tokio::select! {
                    _ = sleep(self.interval) => {}
                    _ = ctx.cancelled() => return Err(last),
                }
            }

            match attempt().await {
                Ok(()) => return Ok(()),
                Err(err) => last = err,
            }
        }

        Err(last)
    }
}

#[async_trait]
impl Task for RetryTask {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        self.retry(ctx, || self.inner.execute(ctx)).await
    }

    async fn compensate(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        self.retry(ctx, || self.inner.compensate(ctx)).await
    }

    fn as_compensate_all(&self) -> Option<&dyn CompensateAll> {
        self.inner
            .as_compensate_all()
            .map(|_| self as &dyn CompensateAll)
    }
}

#[async_trait]
impl CompensateAll for RetryTask {
    async fn compensate_all(&self, ctx: &ExecContext) -> Result<(), BoxError> {
        match self.inner.as_compensate_all() {
            Some(all) => self.retry(ctx, || all.compensate_all(ctx)).await,
            None => self.retry(ctx, || self.inner.compensate(ctx)).await,
        }
    }
}

impl fmt::Display for RetryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for RetryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTask")
            .field("name", &self.inner.name())
            .field("retries", &self.retries)
            .field("interval", &self.interval)
            .finish()
    }
}
