//! Uncaught failure reporting for Beacon.
//!
//! [`CrashReporter`] turns [`FailureInfo`] notifications into events on a
//! [`BeaconClient`](beacon_outbox::BeaconClient). Notifications come from
//! [`FailureSource`] backends:
//!
//! - [`PanicHookSource`]: unwinding panics
//! - [`TaskFailureSource`]: panicked tokio tasks
//! - `SignalSource` (unix): SIGABRT, SIGQUIT

mod error;
pub mod failure;
mod panic_hook;
mod reporter;
#[cfg(unix)]
mod signal;
mod task;

pub use error::{CrashError, CrashResult};
pub use failure::{FailureCallback, FailureInfo, FailureKind, FailureSource};
pub use panic_hook::PanicHookSource;
pub use reporter::{stack_frames, CrashReporter};
#[cfg(unix)]
pub use signal::{SignalSource, CRASH_SIGNALS};
pub use task::TaskFailureSource;

use beacon_core::{BeaconConfig, SystemInfo};
use beacon_outbox::BeaconClient;
use std::sync::Arc;
use tracing::{info, warn};

/// Crash reporting wired to a client.
pub struct CrashReporting {
    pub reporter: Arc<CrashReporter>,
    /// Route background tasks through this to have their panics reported.
    pub tasks: Arc<TaskFailureSource>,
    #[cfg(unix)]
    pub signals: Option<SignalSource>,
}

/// Attach the standard sources to `client` when crash reporting is enabled.
///
/// Sources that cannot be registered are skipped with a warning.
pub fn install(client: Arc<BeaconClient>, config: &BeaconConfig) -> Option<CrashReporting> {
    if !config.enable_crash_reporting {
        return None;
    }

    let system = SystemInfo::detect(
        &config.app_version,
        &config.app_build_number,
        config.debug_mode(),
    );
    let reporter = CrashReporter::new(client, &system);

    if let Err(e) = reporter.attach(&PanicHookSource::new()) {
        warn!(error = %e, "Panic reporting unavailable");
    }

    let tasks = TaskFailureSource::new();
    if let Err(e) = reporter.attach(tasks.as_ref()) {
        warn!(error = %e, "Task failure reporting unavailable");
    }

    #[cfg(unix)]
    let signals = {
        let source = SignalSource::new();
        match reporter.attach(&source) {
            Ok(()) => Some(source),
            Err(e) => {
                warn!(error = %e, "Signal reporting unavailable");
                None
            }
        }
    };

    info!("Crash reporting enabled");

    Some(CrashReporting {
        reporter,
        tasks,
        #[cfg(unix)]
        signals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_disabled_by_default() {
        let config = BeaconConfig::new("A-US-1");
        let client = Arc::new(BeaconClient::new(&config));
        assert!(install(client, &config).is_none());
    }

    #[tokio::test]
    async fn test_fatal_report_lands_in_durable_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = BeaconConfig::new("A-US-1");
        config.enable_persistence = true;
        config.cache_dir = Some(dir.path().to_path_buf());

        let client = Arc::new(BeaconClient::new(&config));
        let reporter = CrashReporter::new(client.clone(), &SystemInfo::detect("1", "1", false));

        assert!(reporter.report(FailureInfo {
            kind: FailureKind::Signal,
            type_name: "SIGABRT".into(),
            message: "Process received SIGABRT".into(),
            stack_trace: Some("app::worker::run\napp::main".into()),
            fatal: true,
            origin: "test",
        }));
        assert!(client.is_paused());

        let log = client.pipeline().as_durable().unwrap().log();
        let lines: Vec<String> = log
            .snapshot()
            .unwrap()
            .into_iter()
            .map(|stored| match stored {
                beacon_outbox::StoredRecord::Valid(record) => {
                    assert_eq!(record.event_name(), "ApplicationCrash");
                    let props = record.props().unwrap();
                    props.values().next().unwrap().as_str().unwrap().to_string()
                }
                beacon_outbox::StoredRecord::Invalid { reason } => panic!("{reason}"),
            })
            .collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("00 Fatal SIGABRT: Process received SIGABRT ("));
        assert_eq!(lines[1], "01 app::worker::run");
        assert_eq!(lines[2], "02 app::main");

        client.dispose().await;
    }
}
