use thiserror::Error;

/// Errors surfaced while parsing a configured threshold value.
///
/// A malformed threshold is fatal at setup time; it is never silently
/// replaced with the default.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThresholdError {
    /// The numeric portion of the value could not be parsed.
    #[error("invalid threshold number: {0:?}")]
    InvalidNumber(String),

    /// The unit suffix is not one of b, kb, mb, or gb.
    #[error("unknown threshold unit: {0:?}")]
    UnknownUnit(String),

    /// The value was negative.
    #[error("threshold must not be negative: {0:?}")]
    Negative(String),
}
