//! Crash-safe pipeline over the append-only [`EventLog`].
//!
//! Per record, in log order:
//! 1. corrupt line: skip
//! 2. backlog above `max_persisted_events`: skip ("flushed")
//! 3. stamp session and system metadata, wait out any pause, send
//! 4. retryable failure: keep the record, wait `retry_interval`, send it again
//! 5. delivered, rejected or disabled: commit past it
//!
//! Nothing is committed before a terminal outcome, so a record that was
//! appended but not resolved is replayed after a restart.

use crate::log::{EventLog, LogReader, StoredRecord};
use crate::pause::PauseGate;
use crate::pipeline::{
    log_outcome, stop_requested, Dispatch, EventPipeline, Worker, WorkerSlot,
};
use crate::OutboxResult;
use async_trait::async_trait;
use beacon_core::{BeaconConfig, EventRecord, Paths, SessionManager, SystemInfo};
use beacon_transport::Transport;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Interval at which [`DurablePipeline::wait_until_drained`] polls the backlog.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct DurablePipeline {
    log: Arc<EventLog>,
    transport: Arc<dyn Transport>,
    system: Arc<SystemInfo>,
    gate: Arc<PauseGate>,
    max_events: usize,
    retry_interval: Duration,
    grace: Duration,
    slot: Mutex<WorkerSlot>,
}

impl DurablePipeline {
    /// Open the log under the configured cache directory.
    pub fn open(
        config: &BeaconConfig,
        transport: Arc<dyn Transport>,
        system: Arc<SystemInfo>,
    ) -> OutboxResult<Self> {
        let paths = Paths::resolve(config.cache_dir.as_deref())?;
        let log = EventLog::open(paths.event_data_dir())?;

        Ok(Self {
            log: Arc::new(log),
            transport,
            system,
            gate: Arc::new(PauseGate::new(config.pause_cooldown())),
            max_events: config.max_persisted_events,
            retry_interval: config.retry_interval(),
            grace: config.shutdown_grace(),
            slot: Mutex::new(WorkerSlot::default()),
        })
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// Wait until every appended record has been resolved.
    ///
    /// Returns `false` if the backlog was not empty when `timeout` elapsed.
    pub async fn wait_until_drained(&self, timeout: Duration) -> bool {
        let drained = async {
            while self.log.backlog() > 0 {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

#[async_trait]
impl EventPipeline for DurablePipeline {
    fn enqueue(&self, record: EventRecord) -> bool {
        match self.log.append(&record) {
            Ok(()) => true,
            Err(e) => {
                error!(event = %record.event_name(), error = %e, "Failed to persist event");
                false
            }
        }
    }

    fn start(&self) -> OutboxResult<()> {
        let mut slot = self.slot.lock();
        if slot.is_running() {
            return Ok(());
        }

        let reader = self.log.reader()?;
        let consumer = DurableConsumer {
            log: self.log.clone(),
            dispatch: Dispatch {
                transport: self.transport.clone(),
                system: self.system.clone(),
                session: slot.session.take().unwrap_or_default(),
            },
            gate: self.gate.clone(),
            max_events: self.max_events,
            retry_interval: self.retry_interval,
        };

        slot.worker = Some(Worker::spawn(move |stop| consumer.run(reader, stop))?);
        info!(
            path = %self.log.path().display(),
            backlog = self.log.backlog(),
            "Durable event pipeline started"
        );
        Ok(())
    }

    async fn stop(&self) {
        let worker = self.slot.lock().worker.take();
        let Some(worker) = worker else {
            return;
        };

        let session = worker.shutdown(self.grace).await;
        self.slot.lock().session = session;
        info!(backlog = self.log.backlog(), "Durable event pipeline stopped");
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
        self.log.backlog()
    }
}

enum Step {
    Advance,
    Stop,
}

struct DurableConsumer {
    log: Arc<EventLog>,
    dispatch: Dispatch,
    gate: Arc<PauseGate>,
    max_events: usize,
    retry_interval: Duration,
}

impl DurableConsumer {
    async fn run(mut self, mut reader: LogReader, mut stop: watch::Receiver<bool>) -> SessionManager {
        loop {
            if *stop.borrow() {
                break;
            }

            let entry = match reader.next_entry() {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    tokio::select! {
                        _ = self.log.wait_for_append() => continue,
                        _ = stop_requested(&mut stop) => break,
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to read durable log");
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_interval) => continue,
                        _ = stop_requested(&mut stop) => break,
                    }
                }
            };

            match self.process(entry.record, &mut stop).await {
                Step::Advance => self.commit(&mut reader, entry.next_offset),
                Step::Stop => break,
            }
        }

        self.dispatch.session
    }

    async fn process(&mut self, stored: StoredRecord, stop: &mut watch::Receiver<bool>) -> Step {
        let mut record = match stored {
            StoredRecord::Valid(record) => record,
            StoredRecord::Invalid { reason } => {
                warn!(reason = %reason, "Skipping corrupt record in durable log");
                return Step::Advance;
            }
        };

        let backlog = self.log.backlog();
        if backlog > self.max_events {
            warn!(
                event = %record.event_name(),
                backlog,
                max = self.max_events,
                "Durable log over capacity, event flushed"
            );
            return Step::Advance;
        }

        self.dispatch.stamp(&mut record);

        loop {
            if !self.gate.wait_until_running(stop).await {
                return Step::Stop;
            }

            let outcome = self.dispatch.transport.send(&record).await;
            if outcome.is_terminal() {
                log_outcome(&record, &outcome);
                return Step::Advance;
            }

            warn!(
                event = %record.event_name(),
                retry_in_secs = self.retry_interval.as_secs(),
                "Event delivery failed, will retry"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.retry_interval) => {}
                _ = stop_requested(stop) => return Step::Stop,
            }
        }
    }

    fn commit(&self, reader: &mut LogReader, next_offset: u64) {
        match self.log.commit(next_offset) {
            Ok(true) => {
                if let Err(e) = reader.rewind() {
                    error!(error = %e, "Failed to rewind durable log reader");
                }
            }
            Ok(false) => {}
            Err(e) => {
                error!(offset = next_offset, error = %e, "Failed to commit durable log cursor");
            }
        }
    }
}
