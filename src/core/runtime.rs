use crate::domain::ports::ConfigProvider;
use crate::utils::error::{DispatchError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Enforces the concurrency ceiling and the per-invocation time budget.
///
/// Requests over the ceiling are rejected immediately instead of queueing.
/// The budget drops the in-flight future when it expires; a backend call
/// that was already sent may still complete on the backend side.
#[derive(Debug, Clone)]
pub struct InvocationLimiter {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    timeout: Duration,
}

impl InvocationLimiter {
    pub fn new(max_concurrency: usize, timeout: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            timeout,
        }
    }

    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        Self::new(config.max_concurrency(), config.invocation_timeout())
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.permits.available_permits()
    }

    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.run_with_budget(work, None).await
    }

    /// Like [`run`](Self::run), but the budget is capped by `deadline` when
    /// the host reports less time left than the configured timeout.
    pub async fn run_with_budget<T, F>(&self, work: F, deadline: Option<Duration>) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .permits
            .try_acquire()
            .map_err(|_| DispatchError::Throttled {
                limit: self.max_concurrency,
            })?;

        let budget = match deadline {
            Some(deadline) => deadline.min(self.timeout),
            None => self.timeout,
        };

        match tokio::time::timeout(budget, work).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout { budget }),
        }
    }
}
