//! Diagnostic report returned by the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::confidence::Confidence;
use crate::conflict::{Conflict, Resolution};
use crate::diagnosis::DiagnosisLabel;
use crate::distribution::Distribution;
use crate::evidence::CaseId;
use crate::pathway::PathwayOutcome;
use crate::uncertainty::{
    ConfidenceInterval, PosteriorDecision, RecommendationTier, SensitivityReport,
};

/// Final diagnosis: a single label or a composite.
///
/// Composite variants are never collapsed to one of their labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalDiagnosis {
    /// Pathway match with an assigned confidence.
    Confirmed { label: DiagnosisLabel },

    /// Primary diagnosis with a heterologous differentiation component.
    HeterologousDifferentiation {
        label: DiagnosisLabel,
        differentiation: String,
    },

    /// Two diagnoses that the evidence cannot separate.
    CollisionCandidate {
        primary: DiagnosisLabel,
        secondary: DiagnosisLabel,
    },

    /// A diagnosis was ruled out; `most_likely` is the best remaining label.
    Excluded {
        excluded: DiagnosisLabel,
        most_likely: DiagnosisLabel,
    },

    /// The panel could not decide; `most_likely` comes from the posterior.
    Indeterminate { most_likely: DiagnosisLabel },

    /// Outside the sarcoma diagnosis space.
    NonMesenchymal { label: DiagnosisLabel },

    /// No confident pathway match; the posterior decides.
    MostLikely { label: DiagnosisLabel },
}

impl FinalDiagnosis {
    /// The label a single-label summary would show.
    #[must_use]
    pub fn primary_label(&self) -> &DiagnosisLabel {
        match self {
            Self::Confirmed { label }
            | Self::HeterologousDifferentiation { label, .. }
            | Self::NonMesenchymal { label }
            | Self::MostLikely { label } => label,
            Self::CollisionCandidate { primary, .. } => primary,
            Self::Excluded { most_likely, .. } | Self::Indeterminate { most_likely } => most_likely,
        }
    }

    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(
            self,
            Self::HeterologousDifferentiation { .. } | Self::CollisionCandidate { .. }
        )
    }
}

impl fmt::Display for FinalDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed { label } => write!(f, "{label}"),
            Self::HeterologousDifferentiation {
                label,
                differentiation,
            } => write!(f, "{label} with heterologous {differentiation} differentiation"),
            Self::CollisionCandidate { primary, secondary } => {
                write!(f, "collision tumor candidate: {primary} / {secondary}")
            }
            Self::Excluded {
                excluded,
                most_likely,
            } => write!(f, "{excluded} excluded (most likely {most_likely})"),
            Self::Indeterminate { most_likely } => {
                write!(f, "indeterminate (most likely {most_likely})")
            }
            Self::NonMesenchymal { label } => write!(f, "{label} (non-mesenchymal)"),
            Self::MostLikely { label } => write!(f, "{label} (posterior)"),
        }
    }
}

/// Result of an external subtyping service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtype {
    pub service: String,
    pub label: String,
}

/// Everything the engine concluded for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub case_id: CaseId,
    pub final_diagnosis: FinalDiagnosis,
    /// Working confidence after every resolution.
    pub confidence: Confidence,
    pub posterior: Distribution,
    pub entropy: f64,
    pub confidence_interval: ConfidenceInterval,
    pub sensitivity: SensitivityReport,
    pub recommendation_tier: RecommendationTier,
    /// Decision rule over the top posterior probability.
    pub decision: PosteriorDecision,
    /// In application order.
    pub applied_resolutions: Vec<Resolution>,
    pub conflicts: Vec<Conflict>,
    /// `None` when the dispatched sub-pathway did not match.
    pub pathway: Option<PathwayOutcome>,
    pub activated_lineages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<Subtype>,
    pub config_fingerprint: String,
    pub config_version: u64,
}

impl DiagnosticReport {
    /// Label and probability at the top of the posterior.
    #[must_use]
    pub fn top(&self) -> Option<(&DiagnosisLabel, f64)> {
        self.posterior.top()
    }

    /// True if the case should go back to a tumor board: the entropy tier
    /// asks for review or the posterior decision asks for re-evaluation.
    #[must_use]
    pub fn requires_review(&self) -> bool {
        self.recommendation_tier == RecommendationTier::MultidisciplinaryReview
            || self.decision == PosteriorDecision::Reevaluate
    }
}
