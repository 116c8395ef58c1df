use crate::acquire::Acquisition;
use crate::error::Result;
use async_trait::async_trait;
use futures::StreamExt;
use futures::future::BoxFuture;
use std::time::Duration;

/// One acquisition, boxed so that a runner can own it.
pub type AcquireTask = BoxFuture<'static, Result<Acquisition>>;

/// Runs acquisitions concurrently.
///
/// Results come back in task order. A task that fails or overruns `timeout`
/// yields `None`; nothing is cleaned up after a task that overran.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, tasks: Vec<AcquireTask>, timeout: Duration) -> Vec<Option<Acquisition>>;
}

/// Runs each task on its own Tokio task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner {
    concurrency: Option<usize>,
}

impl TokioRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run at most `limit` tasks at a time.
    #[must_use]
    pub fn with_concurrency(limit: usize) -> Self {
        Self { concurrency: Some(limit.max(1)) }
    }
}

#[async_trait]
impl TaskRunner for TokioRunner {
    async fn run(&self, tasks: Vec<AcquireTask>, timeout: Duration) -> Vec<Option<Acquisition>> {
        let limit = self.concurrency.unwrap_or(tasks.len()).max(1);
        let slots: Vec<BoxFuture<'static, Option<Acquisition>>> = tasks
            .into_iter()
            .enumerate()
            .map(|(slot, task)| -> BoxFuture<'static, Option<Acquisition>> {
                Box::pin(async move {
                    let joined = tokio::spawn(tokio::time::timeout(timeout, task)).await;
                    match joined {
                        Ok(Ok(Ok(acquisition))) => Some(acquisition),
                        Ok(Ok(Err(err))) => {
                            tracing::warn!(slot, error = ?err, "acquisition failed");
                            None
                        },
                        Ok(Err(_)) => {
                            tracing::warn!(slot, ?timeout, "acquisition timed out");
                            None
                        },
                        Err(err) => {
                            tracing::warn!(slot, %err, "acquisition task did not complete");
                            None
                        },
                    }
                })
            })
            .collect();
        futures::stream::iter(slots)
            .buffered(limit)
            .collect()
            .await
    }
}
