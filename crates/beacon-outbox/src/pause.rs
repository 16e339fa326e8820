//! Pause gate between the queue and the transport.

use crate::pipeline::stop_requested;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseState {
    Running,
    Paused { until: Instant },
}

/// `Running` / `Paused { until }` state shared by producers and the consumer.
///
/// While paused, records keep queueing but nothing is sent. The gate reopens
/// by itself once the cooldown elapses, or immediately on [`resume`](Self::resume).
pub struct PauseGate {
    state: Mutex<PauseState>,
    changed: Notify,
    cooldown: Duration,
}

impl PauseGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(PauseState::Running),
            changed: Notify::new(),
            cooldown,
        }
    }

    /// Hold sends for one cooldown from now.
    pub fn pause(&self) {
        let until = Instant::now() + self.cooldown;
        *self.state.lock() = PauseState::Paused { until };
        info!(cooldown_secs = self.cooldown.as_secs(), "Event delivery paused");
        self.changed.notify_waiters();
    }

    /// Reopen the gate now.
    pub fn resume(&self) {
        let mut state = self.state.lock();
        if *state != PauseState::Running {
            *state = PauseState::Running;
            info!("Event delivery resumed");
        }
        drop(state);
        self.changed.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused_until().is_some()
    }

    /// Wait until sends are allowed. Returns `false` if stop was requested first.
    pub async fn wait_until_running(&self, stop: &mut watch::Receiver<bool>) -> bool {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let Some(until) = self.paused_until() else {
                return true;
            };

            debug!("Delivery paused, waiting");
            tokio::select! {
                _ = tokio::time::sleep_until(until) => {}
                _ = &mut notified => {}
                _ = stop_requested(stop) => return false,
            }
        }
    }

    /// Deadline of the current pause, clearing it if it already passed.
    fn paused_until(&self) -> Option<Instant> {
        let mut state = self.state.lock();
        match *state {
            PauseState::Running => None,
            PauseState::Paused { until } if Instant::now() >= until => {
                *state = PauseState::Running;
                debug!("Pause cooldown elapsed");
                None
            }
            PauseState::Paused { until } => Some(until),
        }
    }
}
