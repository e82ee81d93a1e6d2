use std::fmt;

use super::error::CollectorError;

/// Result type returned by every reader.
pub type CollectorResult<T> = std::result::Result<T, CollectorError>;

/// Outcome of a reader whose sensor may legitimately be missing on a host.
///
/// `Unavailable` carries a short human-readable reason that ends up in the
/// warning logged by the snapshot assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading<T> {
    Available(T),
    Unavailable(String),
}

impl<T> Reading<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Reading::Unavailable(reason.into())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Available(_))
    }

    /// Returns the value, or `None` when the sensor is unavailable.
    pub fn value(self) -> Option<T> {
        match self {
            Reading::Available(value) => Some(value),
            Reading::Unavailable(_) => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Reading<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Available(value) => write!(f, "{}", value),
            Reading::Unavailable(reason) => write!(f, "unavailable ({})", reason),
        }
    }
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// `part / whole` as a percentage, or `None` when `whole` is zero.
pub fn percent(part: f64, whole: f64) -> Option<f64> {
    if whole > 0.0 {
        Some(part / whole * 100.0)
    } else {
        None
    }
}
