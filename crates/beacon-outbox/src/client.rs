//! Application-facing client.

use crate::{EventPipeline, Pipeline};
use beacon_core::{BeaconConfig, EventRecord, Props, SystemInfo, SystemInfoProvider};
use beacon_transport::{HttpTransport, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the crash reporter needs from a client.
pub trait EventTracker: Send + Sync {
    fn track_event(&self, name: &str, props: Option<Props>);

    /// Hold delivery for the pause cooldown.
    fn pause(&self);
}

/// Tracks events through the pipeline chosen by the configuration.
///
/// Nothing here returns an error to the caller. Invalid input, disk failures
/// and collector problems are logged and the event is dropped.
pub struct BeaconClient {
    pipeline: Pipeline,
    disposed: AtomicBool,
}

impl BeaconClient {
    /// HTTP transport and system metadata detected from the host process.
    pub fn new(config: &BeaconConfig) -> Self {
        let system = SystemInfo::detect(
            &config.app_version,
            &config.app_build_number,
            config.debug_mode(),
        );
        Self::with_parts(
            config,
            Arc::new(HttpTransport::from_config(config)),
            Arc::new(system),
        )
    }

    /// HTTP transport with host-supplied system metadata.
    pub fn with_system_info(config: &BeaconConfig, provider: &dyn SystemInfoProvider) -> Self {
        Self::with_parts(
            config,
            Arc::new(HttpTransport::from_config(config)),
            Arc::new(provider.system_info()),
        )
    }

    pub fn with_parts(
        config: &BeaconConfig,
        transport: Arc<dyn Transport>,
        system: Arc<SystemInfo>,
    ) -> Self {
        let pipeline = Pipeline::from_config(config, transport, system);
        info!(
            durable = pipeline.is_durable(),
            debug = config.debug_mode(),
            "Beacon client created"
        );

        Self {
            pipeline,
            disposed: AtomicBool::new(false),
        }
    }

    /// Fire-and-forget tracking.
    pub fn track_event(&self, name: &str, props: Option<Props>) {
        self.track_event_acked(name, props);
    }

    /// Track and report whether the event was queued (durably appended in
    /// persistent mode).
    pub fn track_event_acked(&self, name: &str, props: Option<Props>) -> bool {
        if self.disposed.load(Ordering::SeqCst) {
            debug!(event = %name, "Client disposed, event dropped");
            return false;
        }

        let record = match EventRecord::new(name, props) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Invalid event, dropped");
                return false;
            }
        };

        self.pipeline.enqueue(record)
    }

    /// Start delivering in the background.
    pub fn start(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            warn!("Client disposed, not starting");
            return;
        }
        if let Err(e) = self.pipeline.start() {
            error!(error = %e, "Failed to start event pipeline");
        }
    }

    /// Stop delivering. Queued events stay queued (on disk in persistent mode).
    pub async fn stop(&self) {
        self.pipeline.stop().await;
    }

    /// Stop and release the pipeline. Later calls do nothing.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pipeline.stop().await;
        info!(backlog = self.pipeline.backlog(), "Beacon client disposed");
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.is_running()
    }

    pub fn pause(&self) {
        self.pipeline.pause();
    }

    pub fn resume(&self) {
        self.pipeline.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.pipeline.is_paused()
    }

    pub fn backlog(&self) -> usize {
        self.pipeline.backlog()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl EventTracker for BeaconClient {
    fn track_event(&self, name: &str, props: Option<Props>) {
        BeaconClient::track_event(self, name, props);
    }

    fn pause(&self) {
        BeaconClient::pause(self);
    }
}
