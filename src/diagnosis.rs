//! Diagnosis labels and the fixed diagnosis space.
//!
//! The diagnosis space is deployment configuration, not code: labels are
//! plain strings validated once when the space is built.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// A single diagnosis label (e.g. `DDLPS`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagnosisLabel(String);

impl DiagnosisLabel {
    /// Dedifferentiated liposarcoma.
    pub const DDLPS: &'static str = "DDLPS";
    /// Rhabdomyosarcoma.
    pub const RMS: &'static str = "RMS";
    /// Undifferentiated pleomorphic sarcoma.
    pub const UPS: &'static str = "UPS";
    /// Leiomyosarcoma.
    pub const LMS: &'static str = "LMS";
    /// Any sarcoma outside the named labels.
    pub const OTHER_SARCOMA: &'static str = "OtherSarcoma";
    /// Well-differentiated liposarcoma (morphology candidate only).
    pub const WDLPS: &'static str = "WDLPS";
    /// Malignant peripheral nerve sheath tumor (morphology candidate only).
    pub const MPNST: &'static str = "MPNST";
    /// Desmoid-type fibromatosis (morphology candidate only).
    pub const FIBROMATOSIS: &'static str = "Fibromatosis";
    /// Non-mesenchymal epithelial neoplasm.
    pub const EPITHELIAL: &'static str = "EpithelialNeoplasm";

    /// Creates a label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the label text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiagnosisLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DiagnosisLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Ordered set of mutually exclusive diagnosis labels.
///
/// - Empty spaces are rejected.
/// - Duplicate labels are rejected (a silent dedup would hide a typo in
///   the deployment configuration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DiagnosisSpace(Vec<DiagnosisLabel>);

impl DiagnosisSpace {
    /// Construct a validated diagnosis space.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::EmptyDiagnosisSpace` or
    /// `ConfigurationError::DuplicateLabel`.
    pub fn new(labels: Vec<DiagnosisLabel>) -> Result<Self, ConfigurationError> {
        if labels.is_empty() {
            return Err(ConfigurationError::EmptyDiagnosisSpace);
        }

        let mut seen: HashSet<&DiagnosisLabel> = HashSet::with_capacity(labels.len());
        for label in &labels {
            if !seen.insert(label) {
                return Err(ConfigurationError::DuplicateLabel {
                    label: label.to_string(),
                });
            }
        }

        Ok(Self(labels))
    }

    /// Returns the labels in configured order.
    #[must_use]
    pub fn labels(&self) -> &[DiagnosisLabel] {
        &self.0
    }

    /// Iterates labels in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &DiagnosisLabel> {
        self.0.iter()
    }

    /// Returns true if the label is part of this space.
    #[must_use]
    pub fn contains(&self, label: &DiagnosisLabel) -> bool {
        self.0.contains(label)
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a validated space; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for DiagnosisSpace {
    fn default() -> Self {
        Self(
            [
                DiagnosisLabel::DDLPS,
                DiagnosisLabel::RMS,
                DiagnosisLabel::UPS,
                DiagnosisLabel::LMS,
                DiagnosisLabel::OTHER_SARCOMA,
            ]
            .into_iter()
            .map(DiagnosisLabel::new)
            .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for DiagnosisSpace {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Vec::<DiagnosisLabel>::deserialize(deserializer)?;
        DiagnosisSpace::new(raw).map_err(serde::de::Error::custom)
    }
}
