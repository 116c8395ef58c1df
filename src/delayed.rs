use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default delay before transient files are removed.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(60);

/// Work that runs once after a delay unless cancelled first.
///
/// Dropping the handle does not cancel anything; the work still runs.
#[derive(Debug)]
pub struct DelayedTask {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl DelayedTask {
    /// Run `work` on the current Tokio runtime after `delay`.
    pub fn spawn<F>(delay: Duration, work: F) -> Result<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current().or_raise(|| ErrorKind::Runtime)?;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let task = runtime.spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => tracing::debug!("delayed task cancelled"),
                () = tokio::time::sleep(delay) => work.await,
            }
        });
        Ok(Self { token, task })
    }

    /// Stop the work from starting. Has no effect once it has started.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the work to run (or be cancelled).
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            tracing::warn!(%err, "delayed task did not complete");
        }
    }
}

/// Delete `paths` after `delay`. Files that are already gone are fine;
/// other failures are logged.
pub fn schedule_cleanup(paths: Vec<PathBuf>, delay: Duration) -> Result<DelayedTask> {
    let paths: BTreeSet<PathBuf> = paths.into_iter().collect();
    tracing::debug!(files = paths.len(), ?delay, "scheduled cleanup of transient files");
    DelayedTask::spawn(delay, async move {
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "removed transient file"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
                Err(err) => tracing::warn!(path = %path.display(), %err, "could not remove transient file"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_runs_after_delay() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let task = DelayedTask::spawn(Duration::from_millis(10), async move { flag.store(true, Ordering::SeqCst) }).unwrap();
        assert!(!ran.load(Ordering::SeqCst));
        task.join().await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let task = DelayedTask::spawn(Duration::from_secs(60), async move { flag.store(true, Ordering::SeqCst) }).unwrap();
        task.cancel();
        task.join().await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_requires_runtime() {
        let err = DelayedTask::spawn(Duration::ZERO, async {}).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Runtime));
    }

    #[tokio::test]
    async fn test_cleanup_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let missing = dir.path().join("already-gone.png");

        let task = schedule_cleanup(vec![a.clone(), missing, a.clone(), b.clone()], Duration::ZERO).unwrap();
        task.join().await;
        assert!(!a.exists());
        assert!(!b.exists());
    }
}
