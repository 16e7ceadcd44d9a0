use thiserror::Error;

/// Shared error enum for the cycler crates
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CyclerError {
    /// Malformed object identifier
    #[error("invalid object id '{0}'")]
    InvalidObjectId(String),

    /// Tick outside the representable grid
    #[error("invalid tick {tick}: not in [{min_tick}, {max_tick}]")]
    InvalidTick {
        tick: i32,
        min_tick: i32,
        max_tick: i32,
    },

    /// Invalid parameter
    #[error("invalid parameter '{parameter}': got '{value}', expected {expected}")]
    InvalidParameter {
        parameter: String,
        value: String,
        expected: String,
    },

    /// A ledger field did not decode to the expected shape
    #[error("malformed field '{field}': {reason}")]
    MalformedField { field: String, reason: String },
}

impl CyclerError {
    pub fn invalid_parameter(parameter: &str, value: &str, expected: &str) -> Self {
        CyclerError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    pub fn malformed_field(field: &str, reason: &str) -> Self {
        CyclerError::MalformedField {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}
