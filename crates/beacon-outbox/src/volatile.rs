//! In-memory pipeline.

use crate::pause::PauseGate;
use crate::pipeline::{log_outcome, Dispatch, EventPipeline, Worker, WorkerSlot};
use crate::{OutboxError, OutboxResult};
use async_trait::async_trait;
use beacon_core::{BeaconConfig, EventRecord, SessionManager, SystemInfo};
use beacon_transport::Transport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

struct Channel {
    sender: Option<mpsc::UnboundedSender<EventRecord>>,
    receiver: Option<mpsc::UnboundedReceiver<EventRecord>>,
}

/// Unbounded channel drained by one consumer. Nothing survives a restart and
/// transient failures are not retried.
pub struct VolatilePipeline {
    transport: Arc<dyn Transport>,
    system: Arc<SystemInfo>,
    gate: Arc<PauseGate>,
    grace: Duration,
    queued: Arc<AtomicUsize>,
    channel: Mutex<Channel>,
    slot: Mutex<WorkerSlot>,
}

impl VolatilePipeline {
    pub fn new(config: &BeaconConfig, transport: Arc<dyn Transport>, system: Arc<SystemInfo>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            transport,
            system,
            gate: Arc::new(PauseGate::new(config.pause_cooldown())),
            grace: config.shutdown_grace(),
            queued: Arc::new(AtomicUsize::new(0)),
            channel: Mutex::new(Channel {
                sender: Some(sender),
                receiver: Some(receiver),
            }),
            slot: Mutex::new(WorkerSlot::default()),
        }
    }
}

#[async_trait]
impl EventPipeline for VolatilePipeline {
    fn enqueue(&self, record: EventRecord) -> bool {
        let channel = self.channel.lock();
        let Some(sender) = channel.sender.as_ref() else {
            debug!(event = %record.event_name(), "Pipeline stopped, event dropped");
            return false;
        };

        self.queued.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = sender.send(record) {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            warn!(event = %e.0.event_name(), "Event queue closed, event dropped");
            return false;
        }
        true
    }

    fn start(&self) -> OutboxResult<()> {
        let mut slot = self.slot.lock();
        if slot.is_running() {
            return Ok(());
        }
        // Check before the receiver moves into the consumer.
        tokio::runtime::Handle::try_current().map_err(|_| OutboxError::NoRuntime)?;

        let receiver = {
            let mut channel = self.channel.lock();
            match (channel.receiver.take(), channel.sender.is_some()) {
                (Some(receiver), true) => receiver,
                (leftover, _) => {
                    // Stopped earlier: reopen, carrying over anything still buffered.
                    let (sender, receiver) = mpsc::unbounded_channel();
                    let mut carried = 0;
                    if let Some(mut leftover) = leftover {
                        while let Ok(record) = leftover.try_recv() {
                            if sender.send(record).is_ok() {
                                carried += 1;
                            }
                        }
                    }
                    self.queued.store(carried, Ordering::SeqCst);
                    channel.sender = Some(sender);
                    receiver
                }
            }
        };

        let consumer = VolatileConsumer {
            dispatch: Dispatch {
                transport: self.transport.clone(),
                system: self.system.clone(),
                session: slot.session.take().unwrap_or_default(),
            },
            gate: self.gate.clone(),
            queued: self.queued.clone(),
        };

        slot.worker = Some(Worker::spawn(move |stop| consumer.run(receiver, stop))?);
        info!("In-memory event pipeline started");
        Ok(())
    }

    async fn stop(&self) {
        // Dropping the only sender closes the channel; the consumer drains
        // what is buffered and exits.
        let sender = self.channel.lock().sender.take();
        drop(sender);

        let worker = self.slot.lock().worker.take();
        let Some(worker) = worker else {
            return;
        };

        let session = worker.shutdown(self.grace).await;
        if session.is_none() {
            // The consumer was aborted along with its receiver.
            let lost = self.queued.swap(0, Ordering::SeqCst);
            if lost > 0 {
                warn!(lost, "In-memory events lost with the aborted consumer");
            }
        }
        self.slot.lock().session = session;
        info!("In-memory event pipeline stopped");
    }

    fn is_running(&self) -> bool {
        self.slot.lock().is_running()
    }

    fn pause(&self) {
        self.gate.pause();
    }

    fn resume(&self) {
        self.gate.resume();
    }

    fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    fn backlog(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}

struct VolatileConsumer {
    dispatch: Dispatch,
    gate: Arc<PauseGate>,
    queued: Arc<AtomicUsize>,
}

impl VolatileConsumer {
    async fn run(
        mut self,
        mut receiver: mpsc::UnboundedReceiver<EventRecord>,
        mut stop: watch::Receiver<bool>,
    ) -> SessionManager {
        while let Some(mut record) = receiver.recv().await {
            if !self.gate.wait_until_running(&mut stop).await {
                receiver.close();
                let mut dropped = 1;
                while receiver.try_recv().is_ok() {
                    dropped += 1;
                }
                self.queued.fetch_sub(dropped, Ordering::SeqCst);
                warn!(dropped, "Stopped while paused, queued events dropped");
                break;
            }

            self.dispatch.stamp(&mut record);
            let outcome = self.dispatch.transport.send(&record).await;
            self.queued.fetch_sub(1, Ordering::SeqCst);
            log_outcome(&record, &outcome);
        }

        self.dispatch.session
    }
}
