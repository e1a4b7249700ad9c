//! Custom validation functions for configuration.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

use lanwatch_protocols::MacAddr;

lazy_static! {
    static ref INTERFACE_NAME: Regex =
        Regex::new(r"^[A-Za-z0-9_.:\-]+$").expect("static interface regex");
}

/// Validate that an interface name is something a capture backend could name.
pub fn validate_interface(name: &str) -> Result<(), ValidationError> {
    if !name.is_empty() && name.len() <= 64 && INTERFACE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_interface"))
    }
}

/// Validate that a given value is a power of two.
pub fn validate_power_of_two(value: &usize) -> Result<(), ValidationError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_power_of_two"))
    }
}

/// Every entry must parse as a MAC in `:`, `-` or bare hex notation.
pub fn validate_mac_list(macs: &[String]) -> Result<(), ValidationError> {
    for raw in macs {
        if raw.parse::<MacAddr>().is_err() {
            let mut err = ValidationError::new("invalid_mac");
            err.message = Some(format!("'{raw}' is not a MAC address").into());
            return Err(err);
        }
    }
    Ok(())
}

pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("invalid_log_level")),
    }
}
