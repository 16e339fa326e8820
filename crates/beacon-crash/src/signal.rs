//! Fatal OS signal source.

use crate::failure::{FailureCallback, FailureInfo, FailureKind, FailureSource};
use crate::{CrashError, CrashResult};
use parking_lot::Mutex;
use signal_hook::consts::signal::{SIGABRT, SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::{Handle, Signals};
use signal_hook::low_level::emulate_default_handler;
use tracing::error;

/// Signals reported by default.
///
/// Termination requests (SIGTERM, SIGINT, SIGHUP) belong to the host's own
/// shutdown path and are only reported when passed to
/// [`SignalSource::with_signals`]. SIGSEGV and friends cannot be handled by
/// `signal-hook` at all.
pub const CRASH_SIGNALS: [i32; 2] = [SIGABRT, SIGQUIT];

/// Reports fatal signals from a dedicated thread.
///
/// After the report is queued the signal's default disposition is emulated,
/// so the process still terminates the way it would have without us.
pub struct SignalSource {
    signals: Vec<i32>,
    emulate_default: bool,
    handle: Mutex<Option<Handle>>,
}

impl SignalSource {
    pub fn new() -> Self {
        Self::with_signals(&CRASH_SIGNALS)
    }

    pub fn with_signals(signals: &[i32]) -> Self {
        Self {
            signals: signals.to_vec(),
            emulate_default: true,
            handle: Mutex::new(None),
        }
    }

    /// Report only; leave the process running.
    pub fn without_default_action(mut self) -> Self {
        self.emulate_default = false;
        self
    }

    /// Stop listening.
    pub fn close(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.close();
        }
    }
}

impl Default for SignalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureSource for SignalSource {
    fn name(&self) -> &'static str {
        "signal"
    }

    fn register(&self, callback: FailureCallback) -> CrashResult<()> {
        let mut slot = self.handle.lock();
        if slot.is_some() {
            return Err(CrashError::AlreadyRegistered(self.name()));
        }

        let mut signals = Signals::new(&self.signals)?;
        let handle = signals.handle();
        let emulate_default = self.emulate_default;
        let origin = self.name();

        std::thread::Builder::new()
            .name("beacon-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    let name = signal_name(signal);
                    callback(FailureInfo {
                        kind: FailureKind::Signal,
                        type_name: name.to_string(),
                        message: format!("Process received {name}"),
                        stack_trace: None,
                        fatal: true,
                        origin,
                    });

                    if emulate_default {
                        if let Err(e) = emulate_default_handler(signal) {
                            error!(signal = name, error = %e, "Failed to apply default signal action");
                        }
                    }
                }
            })?;

        *slot = Some(handle);
        Ok(())
    }
}

impl Drop for SignalSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn signal_name(signal: i32) -> &'static str {
    match signal {
        SIGABRT => "SIGABRT",
        SIGQUIT => "SIGQUIT",
        SIGTERM => "SIGTERM",
        SIGINT => "SIGINT",
        SIGHUP => "SIGHUP",
        SIGUSR1 => "SIGUSR1",
        SIGUSR2 => "SIGUSR2",
        _ => "SIGNAL",
    }
}
