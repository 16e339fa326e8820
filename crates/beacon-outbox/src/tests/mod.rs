//! Pipeline integration tests.
//!
//! - `ordering.rs`     - append order, retry in place, rejection handling
//! - `crash_safety.rs` - replay after restart, torn and corrupt records
//! - `capacity.rs`     - backlog cap
//! - `pausing.rs`      - pause cooldown and resume
//! - `lifecycle.rs`    - start/stop/restart, bounded shutdown
//! - `volatile.rs`     - in-memory pipeline behaviour
//! - `client.rs`       - BeaconClient facade

mod crash_safety;
mod lifecycle;
mod volatile;
