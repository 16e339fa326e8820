//! Pipeline selection and the pieces both pipelines share.

use crate::{DurablePipeline, OutboxError, OutboxResult, VolatilePipeline};
use async_trait::async_trait;
use beacon_core::{BeaconConfig, EventRecord, SessionManager, SystemInfo};
use beacon_transport::{SendOutcome, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A queue feeding one background consumer that delivers through a [`Transport`].
#[async_trait]
pub trait EventPipeline: Send + Sync {
    /// Queue a record without waiting on the network.
    ///
    /// Returns `false` when the record was dropped; the reason is logged.
    fn enqueue(&self, record: EventRecord) -> bool;

    /// Spawn the consumer on the current tokio runtime. No-op if running.
    fn start(&self) -> OutboxResult<()>;

    /// Signal the consumer and wait for it, bounded by the shutdown grace.
    /// Safe to call repeatedly.
    async fn stop(&self);

    fn is_running(&self) -> bool;

    /// Hold delivery for the configured cooldown. Records keep queueing.
    fn pause(&self);

    /// Lift a pause immediately.
    fn resume(&self);

    fn is_paused(&self) -> bool;

    /// Records queued but not yet resolved.
    fn backlog(&self) -> usize;
}

/// The pipeline chosen by `enable_persistence`.
pub enum Pipeline {
    Volatile(VolatilePipeline),
    Durable(DurablePipeline),
}

impl Pipeline {
    /// Durable when persistence is enabled and the log opens, volatile otherwise.
    pub fn from_config(
        config: &BeaconConfig,
        transport: Arc<dyn Transport>,
        system: Arc<SystemInfo>,
    ) -> Self {
        if config.enable_persistence {
            match DurablePipeline::open(config, transport.clone(), system.clone()) {
                Ok(pipeline) => return Pipeline::Durable(pipeline),
                Err(e) => {
                    error!(
                        error = %e,
                        "Durable event log unavailable, falling back to in-memory delivery"
                    );
                }
            }
        }

        Pipeline::Volatile(VolatilePipeline::new(config, transport, system))
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, Pipeline::Durable(_))
    }

    pub fn as_durable(&self) -> Option<&DurablePipeline> {
        match self {
            Pipeline::Durable(pipeline) => Some(pipeline),
            Pipeline::Volatile(_) => None,
        }
    }

    fn inner(&self) -> &dyn EventPipeline {
        match self {
            Pipeline::Volatile(pipeline) => pipeline,
            Pipeline::Durable(pipeline) => pipeline,
        }
    }
}

#[async_trait]
impl EventPipeline for Pipeline {
    fn enqueue(&self, record: EventRecord) -> bool {
        self.inner().enqueue(record)
    }

    fn start(&self) -> OutboxResult<()> {
        self.inner().start()
    }

    async fn stop(&self) {
        self.inner().stop().await
    }

    fn is_running(&self) -> bool {
        self.inner().is_running()
    }

    fn pause(&self) {
        self.inner().pause()
    }

    fn resume(&self) {
        self.inner().resume()
    }

    fn is_paused(&self) -> bool {
        self.inner().is_paused()
    }

    fn backlog(&self) -> usize {
        self.inner().backlog()
    }
}

/// Send-time context owned by a consumer task.
pub(crate) struct Dispatch {
    pub transport: Arc<dyn Transport>,
    pub system: Arc<SystemInfo>,
    pub session: SessionManager,
}

impl Dispatch {
    /// Attach the current session and system metadata.
    pub fn stamp(&mut self, record: &mut EventRecord) {
        let session_id = self.session.current_session_id();
        record.stamp(session_id, &self.system);
    }
}

/// Log a send outcome the way both consumers report it.
pub(crate) fn log_outcome(record: &EventRecord, outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Delivered => {
            debug!(event = %record.event_name(), "Event delivered");
        }
        SendOutcome::Rejected { status } => {
            warn!(event = %record.event_name(), status, "Event rejected by collector, dropped");
        }
        SendOutcome::Retryable { reason } => {
            warn!(event = %record.event_name(), reason = %reason, "Event delivery failed");
        }
        SendOutcome::Disabled => {
            debug!(event = %record.event_name(), "Tracking disabled, event dropped");
        }
    }
}

/// Resolves once stop was requested or the stop sender is gone.
pub(crate) async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// A running consumer task.
pub(crate) struct Worker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<SessionManager>,
}

impl Worker {
    /// Spawn `consumer` with a fresh stop channel.
    pub fn spawn<F, Fut>(consumer: F) -> OutboxResult<Self>
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: std::future::Future<Output = SessionManager> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| OutboxError::NoRuntime)?;
        let (stop, stop_rx) = watch::channel(false);
        let handle = runtime.spawn(consumer(stop_rx));
        Ok(Self { stop, handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request stop and wait up to `grace`; abort on expiry.
    ///
    /// Returns the session the consumer handed back, if it exited cleanly.
    pub async fn shutdown(self, grace: Duration) -> Option<SessionManager> {
        let _ = self.stop.send(true);
        let mut handle = self.handle;

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(session)) => Some(session),
            Ok(Err(e)) => {
                error!(error = %e, "Event consumer task failed");
                None
            }
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Event consumer did not stop in time, aborting"
                );
                handle.abort();
                None
            }
        }
    }
}

/// Worker plus the session it returns between runs.
#[derive(Default)]
pub(crate) struct WorkerSlot {
    pub worker: Option<Worker>,
    pub session: Option<SessionManager>,
}

impl WorkerSlot {
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}
