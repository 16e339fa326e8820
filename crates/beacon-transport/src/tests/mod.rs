//! End-to-end transport tests against a local mock collector.
//!
//! - `collector.rs` - MockCollector: a minimal HTTP/1.1 server that records
//!   requests and answers with scripted status codes
//! - `delivery.rs`  - wire contract and status classification over real HTTP

mod delivery;
