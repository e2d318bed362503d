//! Diagnostic confidence.
//!
//! A confidence is a value in [0.0, 1.0]. Construction from untrusted input
//! is validated; adjustments made by conflict resolution are clamped so a
//! chain of deltas can never leave the valid range.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Confidence attached to a pathway result or a final diagnosis.
///
/// # Examples
///
/// ```
/// use dxfusion::Confidence;
///
/// let conf = Confidence::new(0.95).unwrap();
/// assert_eq!(conf.adjust(0.10).value(), 1.0);
/// assert!((conf.adjust(-0.05).value() - 0.90).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    /// Minimum valid confidence value.
    pub const MIN_VALUE: f64 = 0.0;

    /// Maximum valid confidence value.
    pub const MAX_VALUE: f64 = 1.0;

    /// Creates a confidence with validation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ConfidenceOutOfRange` if the value is NaN or
    /// not in [0.0, 1.0].
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_nan() || !(Self::MIN_VALUE..=Self::MAX_VALUE).contains(&value) {
            return Err(ValidationError::ConfidenceOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// Creates a confidence, clamping into range. NaN maps to zero.
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(Self::MIN_VALUE, Self::MAX_VALUE))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.0
    }

    /// Applies a signed delta, clamped to [0.0, 1.0].
    #[must_use]
    pub fn adjust(self, delta: f64) -> Self {
        Self::clamped(self.0 + delta)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
