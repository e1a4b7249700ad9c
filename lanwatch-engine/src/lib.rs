//! # lanwatch-engine
//!
//! Wires the capture source, the event bus, the device registry and the
//! anomaly detector together.
//!
//! ### Key Submodules:
//! - `pipeline`: per-frame registry → detector → storage/notification
//! - `runtime`: capture and processing threads joined by the event bus
//! - `notify`: in-process broadcast of alerts and device changes

pub mod error;
pub mod notify;
pub mod pipeline;
pub mod runtime;

pub use self::{
    error::EngineError,
    notify::{BroadcastNotifier, Notification},
    pipeline::{FrameOutcome, Pipeline},
    runtime::{Engine, RunSummary},
};

pub mod prelude {
    pub use super::{BroadcastNotifier, Engine, EngineError, Notification, Pipeline, RunSummary};
}
