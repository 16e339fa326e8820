//! Process panic hook source.

use crate::failure::{payload_message, FailureCallback, FailureInfo, FailureKind, FailureSource};
use crate::{CrashError, CrashResult};
use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicBool, Ordering};

/// The panic hook is process-wide; chain onto it once.
static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Reports panics through `std::panic::set_hook`.
///
/// A panic on the thread named `main` is fatal; anywhere else it is an
/// application exception. The previously installed hook still runs afterwards.
#[derive(Debug, Default)]
pub struct PanicHookSource;

impl PanicHookSource {
    pub fn new() -> Self {
        Self
    }
}

impl FailureSource for PanicHookSource {
    fn name(&self) -> &'static str {
        "panic-hook"
    }

    fn register(&self, callback: FailureCallback) -> CrashResult<()> {
        if HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(CrashError::AlreadyRegistered(self.name()));
        }

        let origin = self.name();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture();

            let mut message = payload_message(info.payload());
            if let Some(location) = info.location() {
                message = format!(
                    "{message} at {}:{}:{}",
                    location.file(),
                    location.line(),
                    location.column()
                );
            }

            callback(FailureInfo {
                kind: FailureKind::Panic,
                type_name: "Panic".to_string(),
                message,
                stack_trace: Some(backtrace.to_string()),
                fatal: std::thread::current().name() == Some("main"),
                origin,
            });

            previous(info);
        }));

        Ok(())
    }
}
