//! Background task failure source.

use crate::failure::{payload_message, FailureCallback, FailureInfo, FailureKind, FailureSource};
use crate::{CrashError, CrashResult};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

/// Reports spawned tasks that panicked.
///
/// Tasks are routed through [`watch`](Self::watch) or [`spawn`](Self::spawn);
/// a panic surfaces as an `ApplicationTaskException` instead of vanishing
/// with a dropped `JoinHandle`.
#[derive(Default)]
pub struct TaskFailureSource {
    callback: Mutex<Option<FailureCallback>>,
}

impl TaskFailureSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Spawn `future` on the current runtime and watch it.
    pub fn spawn<F>(self: &Arc<Self>, future: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.watch(tokio::spawn(future))
    }

    /// Await `handle` in the background. The returned handle yields the
    /// task's output, or `None` if it failed.
    pub fn watch<T: Send + 'static>(self: &Arc<Self>, handle: JoinHandle<T>) -> JoinHandle<Option<T>> {
        let source = self.clone();
        tokio::spawn(async move {
            match handle.await {
                Ok(value) => Some(value),
                Err(e) => {
                    source.observe(e);
                    None
                }
            }
        })
    }

    /// Report a task's join error. Cancellation is not a failure.
    pub fn observe(&self, error: JoinError) {
        if !error.is_panic() {
            debug!("Watched task cancelled");
            return;
        }

        let payload = error.into_panic();
        let message = payload_message(&*payload);

        let callback = self.callback.lock().clone();
        let Some(callback) = callback else {
            warn!(message = %message, "Task panicked before crash reporting was attached");
            return;
        };

        callback(FailureInfo {
            kind: FailureKind::TaskFailure,
            type_name: "TaskPanic".to_string(),
            message,
            stack_trace: None,
            fatal: false,
            origin: self.name(),
        });
    }
}

impl FailureSource for TaskFailureSource {
    fn name(&self) -> &'static str {
        "task"
    }

    fn register(&self, callback: FailureCallback) -> CrashResult<()> {
        let mut slot = self.callback.lock();
        if slot.is_some() {
            return Err(CrashError::AlreadyRegistered(self.name()));
        }
        *slot = Some(callback);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_source() -> (Arc<TaskFailureSource>, Arc<Mutex<Vec<FailureInfo>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let source = TaskFailureSource::new();
        source
            .register(Arc::new(move |info| sink.lock().push(info)))
            .unwrap();
        (source, seen)
    }

    #[tokio::test]
    async fn test_panicked_task_reported() {
        let (source, seen) = recording_source();

        let result = source.spawn(async { panic!("task blew up") }).await.unwrap();
        assert_eq!(result, None::<()>);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, FailureKind::TaskFailure);
        assert_eq!(seen[0].message, "task blew up");
        assert!(!seen[0].fatal);
        assert_eq!(seen[0].event_name(), "ApplicationTaskException");
    }

    #[tokio::test]
    async fn test_successful_task_passes_output_through() {
        let (source, seen) = recording_source();

        let result = source.spawn(async { 7 }).await.unwrap();
        assert_eq!(result, Some(7));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_task_not_reported() {
        let (source, seen) = recording_source();

        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let result = source.watch(handle).await.unwrap();
        assert_eq!(result, None);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_register_twice_rejected() {
        let (source, _) = recording_source();
        assert!(matches!(
            source.register(Arc::new(|_| {})),
            Err(CrashError::AlreadyRegistered("task"))
        ));
    }
}
