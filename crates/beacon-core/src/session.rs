//! Rolling session identifiers.
//!
//! A session groups a burst of related events. The id rotates once the
//! pipeline has been idle for [`SESSION_TIMEOUT_MINUTES`].
//!
//! The manager is owned by a pipeline's consumer task and is never shared,
//! so it carries no locking. Callers that break that assumption must
//! serialize access themselves.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;

/// Inactivity window after which a new session starts.
pub const SESSION_TIMEOUT_MINUTES: i64 = 60;

/// Upper bound (exclusive) of the random suffix mixed into session ids.
const SESSION_SUFFIX_RANGE: u64 = 100_000_000;

/// Tracks the active session id.
#[derive(Debug, Clone)]
pub struct SessionManager {
    session_id: String,
    last_touched: DateTime<Utc>,
}

impl SessionManager {
    /// Start a fresh session now.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Start a fresh session at an explicit instant.
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            session_id: new_session_id_at(now),
            last_touched: now,
        }
    }

    /// Return the active session id, rotating it if the pipeline was idle
    /// for the full timeout.
    pub fn current_session_id(&mut self) -> &str {
        self.current_session_id_at(Utc::now())
    }

    /// [`current_session_id`](Self::current_session_id) against an explicit clock.
    pub fn current_session_id_at(&mut self, now: DateTime<Utc>) -> &str {
        if now.signed_duration_since(self.last_touched) >= TimeDelta::minutes(SESSION_TIMEOUT_MINUTES)
        {
            self.session_id = new_session_id_at(now);
            tracing::debug!(session_id = %self.session_id, "Session rotated after inactivity");
        }

        self.last_touched = now;
        &self.session_id
    }

    pub fn last_touched(&self) -> DateTime<Utc> {
        self.last_touched
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a session id: epoch seconds followed by an 8-digit random suffix.
pub fn new_session_id_at(now: DateTime<Utc>) -> String {
    let epoch_secs = now.timestamp().max(0) as u64;
    let suffix = rand::thread_rng().gen_range(0..SESSION_SUFFIX_RANGE);
    (epoch_secs * SESSION_SUFFIX_RANGE + suffix).to_string()
}
