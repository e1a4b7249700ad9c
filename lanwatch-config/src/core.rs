//! Core system configuration parameters.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use lanwatch_core::events::BackpressurePolicy;

use crate::validation;

#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct CoreConfig {
    /// Queue between the capture and processing threads.
    #[validate(nested)]
    pub event_bus: EventBusConfig,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct EventBusConfig {
    /// Capacity of the event bus (must be a power of two).
    #[validate(range(min = 64, max = 1048576))]
    #[validate(custom(function = validation::validate_power_of_two))]
    pub capacity: usize,

    /// What the capture thread does when the bus is full.
    pub backpressure: BackpressurePolicy,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: 8192,
            backpressure: BackpressurePolicy::DropOldest,
        }
    }
}
