//! Delivery pipelines for Beacon events.
//!
//! Two interchangeable pipelines sit between the tracking call and the
//! collector:
//!
//! - [`VolatilePipeline`]: unbounded in-memory channel, no durability
//! - [`DurablePipeline`]: append-only log on disk, replayed in order after a
//!   restart, retried in place on transient failures
//!
//! [`BeaconClient`] picks one from the configuration and is the surface
//! applications talk to.

mod client;
mod durable;
mod error;
pub mod log;
mod pause;
mod pipeline;
mod volatile;

#[cfg(test)]
mod tests;

pub use client::{BeaconClient, EventTracker};
pub use durable::DurablePipeline;
pub use error::{OutboxError, OutboxResult};
pub use log::{EventLog, StoredRecord};
pub use pause::PauseGate;
pub use pipeline::{EventPipeline, Pipeline};
pub use volatile::VolatilePipeline;
