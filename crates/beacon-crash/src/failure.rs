//! Failure notifications and the sources that produce them.

use crate::CrashResult;
use std::sync::Arc;

/// Event name for a failure that terminates the process.
pub const EVENT_APPLICATION_CRASH: &str = "ApplicationCrash";

/// Event name for a non-fatal uncaught failure.
pub const EVENT_APPLICATION_EXCEPTION: &str = "ApplicationException";

/// Event name for a failed background task nobody awaited.
pub const EVENT_TASK_EXCEPTION: &str = "ApplicationTaskException";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Unwinding panic caught by the process panic hook.
    Panic,
    /// A spawned task that panicked.
    TaskFailure,
    /// A fatal OS signal.
    Signal,
}

/// One uncaught failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInfo {
    pub kind: FailureKind,
    /// Short type label, e.g. `Panic` or `SIGABRT`.
    pub type_name: String,
    pub message: String,
    /// Newline-separated frames.
    pub stack_trace: Option<String>,
    pub fatal: bool,
    /// Name of the source that observed it.
    pub origin: &'static str,
}

impl FailureInfo {
    pub fn event_name(&self) -> &'static str {
        if self.fatal {
            EVENT_APPLICATION_CRASH
        } else if self.kind == FailureKind::TaskFailure {
            EVENT_TASK_EXCEPTION
        } else {
            EVENT_APPLICATION_EXCEPTION
        }
    }
}

/// Callback a source invokes for every failure it observes.
pub type FailureCallback = Arc<dyn Fn(FailureInfo) + Send + Sync>;

/// A platform mechanism that observes uncaught failures.
pub trait FailureSource: Send + Sync {
    /// Short name used as [`FailureInfo::origin`].
    fn name(&self) -> &'static str;

    /// Start delivering failures to `callback`.
    fn register(&self, callback: FailureCallback) -> CrashResult<()>;
}

/// Text of a panic payload.
pub(crate) fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
