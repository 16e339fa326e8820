//! Core types for the Beacon telemetry pipeline.
//!
//! - [`EventRecord`]: one tracked occurrence, stamped with a session and
//!   system metadata just before it is sent
//! - [`SessionManager`]: rolling session id, rotated after an hour of
//!   pipeline inactivity
//! - [`SystemInfo`]: read-only device/runtime metadata
//! - [`BeaconConfig`] / [`AppKey`]: configuration surface
//! - [`Paths`]: cache directory layout

mod config;
mod error;
pub mod event;
mod paths;
pub mod session;
pub mod system_info;

pub use config::{AppKey, BeaconConfig, Region, DEFAULT_MAX_PERSISTED_EVENTS};
pub use error::{CoreError, CoreResult};
pub use event::{EventRecord, Props};
pub use paths::Paths;
pub use session::{new_session_id_at, SessionManager, SESSION_TIMEOUT_MINUTES};
pub use system_info::{StaticSystemInfo, SystemInfo, SystemInfoProvider, SDK_VERSION};
