//! ## lanwatch-core::events
//! Bounded hand-off between the capture thread and the processing thread.

mod bus;

pub use bus::{BackpressurePolicy, EventBus, EventError};
