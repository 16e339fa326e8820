//! Turns failures into events.

use crate::failure::{FailureCallback, FailureInfo, FailureSource};
use crate::CrashResult;
use beacon_core::{Props, SystemInfo};
use beacon_outbox::EventTracker;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Symbol prefixes of frames that belong to the runtime rather than the app.
const RUNTIME_FRAME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "<std::",
    "<core::",
    "<alloc::",
    "rust_begin_unwind",
    "__rust",
    "__libc_start",
    "tokio::runtime::",
    "beacon_crash::",
];

/// Reports each failure as a summary event followed by one event per
/// application stack frame, all keyed by the failure's timestamp.
///
/// ```text
/// ApplicationCrash { "2024-05-01T10:00:00.000000Z": "00 Fatal Panic: boom (Linux6.1-x86_64-en-US)" }
/// ApplicationCrash { "2024-05-01T10:00:00.000000Z": "01 myapp::load_config at ./src/config.rs:42:9" }
/// ```
///
/// After a fatal failure has been reported every later notification is
/// ignored; several sources tend to fire for the same crash.
pub struct CrashReporter {
    tracker: Arc<dyn EventTracker>,
    platform: String,
    fatal_reported: AtomicBool,
}

impl CrashReporter {
    pub fn new(tracker: Arc<dyn EventTracker>, system: &SystemInfo) -> Arc<Self> {
        Arc::new(Self {
            tracker,
            platform: system.platform_tag(),
            fatal_reported: AtomicBool::new(false),
        })
    }

    /// Register with a source.
    pub fn attach(self: &Arc<Self>, source: &dyn FailureSource) -> CrashResult<()> {
        source.register(self.callback())?;
        info!(source = source.name(), "Crash reporting source attached");
        Ok(())
    }

    pub fn callback(self: &Arc<Self>) -> FailureCallback {
        let reporter = self.clone();
        Arc::new(move |failure| {
            reporter.report(failure);
        })
    }

    /// Report a failure now. Returns `false` if it was suppressed.
    pub fn report(&self, failure: FailureInfo) -> bool {
        self.report_at(failure, Utc::now())
    }

    pub fn report_at(&self, failure: FailureInfo, at: DateTime<Utc>) -> bool {
        if self.fatal_reported.load(Ordering::SeqCst) {
            debug!(origin = failure.origin, "Fatal failure already reported, ignoring");
            return false;
        }
        if failure.fatal && self.fatal_reported.swap(true, Ordering::SeqCst) {
            return false;
        }

        let event = failure.event_name();
        let stamp = at.to_rfc3339_opts(SecondsFormat::Micros, true);

        if failure.fatal {
            // Queue the report but hold delivery; the process is going down.
            self.tracker.pause();
        }

        let summary = format!(
            "{}{}: {} ({})",
            if failure.fatal { "Fatal " } else { "" },
            failure.type_name,
            failure.message,
            self.platform
        );
        self.emit(event, &stamp, 0, &summary);

        let frames = failure
            .stack_trace
            .as_deref()
            .map(stack_frames)
            .unwrap_or_default();
        for (i, frame) in frames.iter().enumerate() {
            self.emit(event, &stamp, i + 1, frame);
        }

        error!(
            event,
            kind = ?failure.kind,
            type_name = %failure.type_name,
            message = %failure.message,
            frames = frames.len(),
            origin = failure.origin,
            "Tracked uncaught failure"
        );
        true
    }

    pub fn fatal_reported(&self) -> bool {
        self.fatal_reported.load(Ordering::SeqCst)
    }

    fn emit(&self, event: &str, stamp: &str, seq: usize, text: &str) {
        let mut props = Props::new();
        props.insert(stamp.to_string(), Value::String(format!("{seq:02} {text}")));
        self.tracker.track_event(event, Some(props));
    }
}

/// Application frames of a backtrace, one entry per frame.
///
/// Accepts the `std::backtrace::Backtrace` layout (`N: symbol` followed by an
/// optional `at file:line:col` line) as well as one frame per line. Location
/// lines are folded into their frame; separators and runtime frames are
/// dropped.
pub fn stack_frames(stack: &str) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    let mut keep_location = false;

    for line in stack.split(['\r', '\n']) {
        let line = line.trim();
        if line.is_empty() || line.starts_with("---") {
            continue;
        }

        if let Some(location) = line.strip_prefix("at ") {
            if keep_location {
                if let Some(frame) = frames.last_mut() {
                    frame.push_str(" at ");
                    frame.push_str(location);
                }
            }
            keep_location = false;
            continue;
        }

        let symbol = strip_frame_index(line);
        keep_location = !is_runtime_frame(symbol);
        if keep_location {
            frames.push(symbol.to_string());
        }
    }

    frames
}

fn strip_frame_index(line: &str) -> &str {
    match line.split_once(": ") {
        Some((index, rest)) if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => {
            rest
        }
        _ => line,
    }
}

fn is_runtime_frame(symbol: &str) -> bool {
    symbol == "_start" || RUNTIME_FRAME_PREFIXES.iter().any(|p| symbol.starts_with(p))
}
