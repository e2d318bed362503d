//! Morphology channel.
//!
//! Feature extraction from slides is an external collaborator behind
//! [`HistologyExtractor`]. The scorer only pattern-matches the extracted
//! features to a candidate set and turns that set into a likelihood vector
//! that is never zero for any label.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MorphologyConfig;
use crate::diagnosis::{DiagnosisLabel, DiagnosisSpace};
use crate::distribution::Distribution;
use crate::error::DxResult;
use crate::evidence::MorphologyFeatures;

/// Turns raw histology input into morphology features.
pub trait HistologyExtractor: Send + Sync {
    /// Raw input type; opaque to the engine.
    type Input;

    /// Name of the extractor (for audit/debugging).
    fn name(&self) -> &str;

    /// Extracts cell type, atypia grade, mitotic count and necrosis.
    ///
    /// # Errors
    ///
    /// Implementations report failures as `DxError::Collaborator` or
    /// `DxError::InvalidInput`.
    fn extract(&self, input: &Self::Input) -> DxResult<MorphologyFeatures>;
}

/// Extractor for callers that already hold extracted features.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrecomputedFeatures;

impl HistologyExtractor for PrecomputedFeatures {
    type Input = MorphologyFeatures;

    fn name(&self) -> &str {
        "precomputed"
    }

    fn extract(&self, input: &MorphologyFeatures) -> DxResult<MorphologyFeatures> {
        Ok(input.clone())
    }
}

/// Output of the morphology channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphologyAssessment {
    /// May include labels outside the diagnosis space (e.g. MPNST).
    pub candidates: BTreeSet<DiagnosisLabel>,
    pub features: MorphologyFeatures,
    /// Over the diagnosis space only.
    pub likelihood: Distribution,
}

impl MorphologyAssessment {
    /// True if any of the labels is a morphology candidate.
    #[must_use]
    pub fn supports_any(&self, labels: &[DiagnosisLabel]) -> bool {
        labels.iter().any(|l| self.candidates.contains(l))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MorphologyScorer<'a> {
    space: &'a DiagnosisSpace,
    config: &'a MorphologyConfig,
}

impl<'a> MorphologyScorer<'a> {
    #[must_use]
    pub const fn new(space: &'a DiagnosisSpace, config: &'a MorphologyConfig) -> Self {
        Self { space, config }
    }

    /// Candidate labels for the features; empty when no rule matches.
    #[must_use]
    pub fn candidates(&self, features: &MorphologyFeatures) -> BTreeSet<DiagnosisLabel> {
        self.config
            .rules
            .iter()
            .find(|rule| rule.matches(features.cell_type, features.atypia))
            .map(|rule| rule.candidates.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Scores already-extracted features.
    #[must_use]
    pub fn score(&self, features: &MorphologyFeatures) -> MorphologyAssessment {
        let candidates = self.candidates(features);
        let likelihood = self
            .space
            .iter()
            .map(|label| {
                let value = if candidates.contains(label) {
                    self.config.candidate_likelihood
                } else {
                    self.config.non_candidate_likelihood
                };
                (label.clone(), value)
            })
            .collect();
        debug!(
            ?candidates,
            cell_type = ?features.cell_type,
            atypia = ?features.atypia,
            "morphology scored"
        );
        MorphologyAssessment {
            candidates,
            features: features.clone(),
            likelihood,
        }
    }
}
