//! Error types for dxfusion.
//!
//! All errors are strongly typed using thiserror so callers can branch on
//! the exact failure. Invalid input and configuration errors abort the
//! current case only; they never touch process-wide configuration.

use thiserror::Error;

/// Malformed or out-of-range case input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Confidence value {value} is out of range [0.0, 1.0]")]
    ConfidenceOutOfRange {
        value: f64,
    },

    #[error("Age {value} is negative")]
    NegativeAge {
        value: f64,
    },

    #[error("Tumor size {value} cm is negative")]
    NegativeSize {
        value: f64,
    },

    #[error("Field '{field}' is not a finite number")]
    NonFinite {
        field: String,
    },

    #[error("Reactivity {value} for marker '{marker}' is out of range [0.0, 1.0]")]
    ReactivityOutOfRange {
        marker: String,
        value: f64,
    },

    #[error("Marker name cannot be empty")]
    EmptyMarkerName,

    #[error("Marker '{marker}' appears more than once on the panel")]
    DuplicateMarker {
        marker: String,
    },

    #[error("Probability {value} for label '{label}' is out of range [0.0, 1.0]")]
    ProbabilityOutOfRange {
        label: String,
        value: f64,
    },

    #[error("Malformed case input: {reason}")]
    Malformed {
        reason: String,
    },
}

/// The active diagnosis space is not covered by a required table, or a
/// tunable is out of its valid range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Diagnosis space cannot be empty")]
    EmptyDiagnosisSpace,

    #[error("Diagnosis label '{label}' appears more than once")]
    DuplicateLabel {
        label: String,
    },

    #[error("Prior table band '{band}' has no entry for label '{label}'")]
    MissingPriorEntry {
        band: String,
        label: String,
    },

    #[error("Prior table has no age bands")]
    NoAgeBands,

    #[error("Likelihood profile '{profile}' has no entry for label '{label}'")]
    MissingLikelihoodEntry {
        profile: String,
        label: String,
    },

    #[error("Lineage table is missing required lineage '{lineage}'")]
    MissingLineage {
        lineage: String,
    },

    #[error("Pathway role '{role}' refers to label '{label}' outside the diagnosis space")]
    UnknownPathwayLabel {
        role: String,
        label: String,
    },

    #[error("Conflict catalog is incomplete: {reason}")]
    ConflictCatalog {
        reason: String,
    },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    #[error("Failed to load configuration: {message}")]
    Load {
        message: String,
    },
}

/// Top-level error type for dxfusion.
#[derive(Debug, Error)]
pub enum DxError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Degenerate evidence: prior x likelihood is zero for all {labels} labels")]
    DegenerateEvidence {
        labels: usize,
    },

    #[error("Collaborator '{name}' failed: {message}")]
    Collaborator {
        name: String,
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl DxError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a collaborator failure.
    #[must_use]
    pub fn collaborator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns true if this is an invalid-input error.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if the evidence contradicted the whole diagnosis space.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateEvidence { .. })
    }
}

/// Result type alias for dxfusion operations.
pub type DxResult<T> = Result<T, DxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_reactivity() {
        let err = ValidationError::ReactivityOutOfRange {
            marker: "MDM2".to_string(),
            value: 1.5,
        };
        let msg = format!("{err}");
        assert!(msg.contains("MDM2"));
        assert!(msg.contains("1.5"));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn test_configuration_error_missing_prior() {
        let err = ConfigurationError::MissingPriorEntry {
            band: "adult".to_string(),
            label: "LMS".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("adult"));
        assert!(msg.contains("LMS"));
    }

    #[test]
    fn test_dx_error_from_validation() {
        let err: DxError = ValidationError::NegativeAge { value: -1.0 }.into();
        assert!(err.is_invalid_input());
        assert!(!err.is_configuration());
        assert!(!err.is_degenerate());
    }

    #[test]
    fn test_dx_error_from_configuration() {
        let err: DxError = ConfigurationError::EmptyDiagnosisSpace.into();
        assert!(err.is_configuration());
        assert!(format!("{err}").contains("cannot be empty"));
    }

    #[test]
    fn test_dx_error_degenerate() {
        let err = DxError::DegenerateEvidence { labels: 5 };
        assert!(err.is_degenerate());
        assert!(format!("{err}").contains("5 labels"));
    }

    #[test]
    fn test_dx_error_collaborator() {
        let err = DxError::collaborator("subtyping", "timeout");
        let msg = format!("{err}");
        assert!(msg.contains("subtyping"));
        assert!(msg.contains("timeout"));
    }
}
