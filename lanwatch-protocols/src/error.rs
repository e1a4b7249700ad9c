use thiserror::Error;

/// Reasons a captured frame could not be turned into a [`crate::Frame`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{layer} truncated: need {needed} bytes, got {got}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        got: usize,
    },
    #[error("malformed {layer}: {reason}")]
    Malformed { layer: &'static str, reason: String },
}

impl DecodeError {
    pub(crate) fn malformed(layer: &'static str, reason: impl ToString) -> Self {
        DecodeError::Malformed {
            layer,
            reason: reason.to_string(),
        }
    }
}
