//! # lanwatch-core
//!
//! Shared vocabulary of the monitor: device profiles, anomaly events, the
//! storage and notification collaborator traits, and the bounded event bus
//! that connects the capture thread to the processing thread.
//!
//! ### Key Submodules:
//! - `models`: `DeviceProfile`, `AnomalyEvent`, `CapturedFrame`
//! - `sink`: `EventStore` and `Notifier` collaborator traits
//! - `events`: bounded frame queue with explicit backpressure

pub mod error;
pub mod events;
pub mod models;
pub mod sink;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::models::*;
    pub use crate::sink::*;
}

pub use error::PersistenceError;
