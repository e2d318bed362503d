use std::fmt;

use serde::{Deserialize, Serialize};

use crate::confidence::Confidence;
use crate::diagnosis::DiagnosisLabel;
use crate::distribution::Distribution;

/// Sub-pathway reached by lineage dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubPathway {
    Liposarcoma,
    Rhabdomyosarcoma,
    Undifferentiated,
}

impl fmt::Display for SubPathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Liposarcoma => write!(f, "liposarcoma"),
            Self::Rhabdomyosarcoma => write!(f, "rhabdomyosarcoma"),
            Self::Undifferentiated => write!(f, "undifferentiated"),
        }
    }
}

/// Liposarcoma sub-pathway match, refined by the myogenic markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiposarcomaFinding {
    /// MDM2 and CDK4 reactive, no myogenic signal.
    Plain,
    /// Myoglobin reactive, Myogenin negative.
    HeterologousMyogenic,
    /// Myoglobin and Myogenin both reactive: liposarcoma vs rhabdomyosarcoma.
    CollisionCandidate,
}

/// Rhabdomyosarcoma sub-pathway outcome on (Myogenin, Desmin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhabdomyosarcomaFinding {
    /// Both reactive.
    Positive,
    /// Both negative.
    Excluded,
    /// Exactly one reactive.
    Uncertain,
}

/// Undifferentiated sub-pathway outcome, by the lineages that did activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndifferentiatedFinding {
    SmoothMuscle,
    /// Neural or vascular lineage.
    OtherLineage,
    NoLineage,
}

/// Closed set of pathway outcomes that produce a result.
///
/// "No match" is not a variant: the classifier returns `None` instead, so
/// it cannot be confused with a low-confidence match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "pathway", content = "finding", rename_all = "snake_case")]
pub enum PathwayOutcome {
    Epithelial,
    Liposarcoma(LiposarcomaFinding),
    Rhabdomyosarcoma(RhabdomyosarcomaFinding),
    Undifferentiated(UndifferentiatedFinding),
}

impl fmt::Display for PathwayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epithelial => write!(f, "epithelial"),
            Self::Liposarcoma(finding) => write!(f, "liposarcoma({finding:?})"),
            Self::Rhabdomyosarcoma(finding) => write!(f, "rhabdomyosarcoma({finding:?})"),
            Self::Undifferentiated(finding) => write!(f, "undifferentiated({finding:?})"),
        }
    }
}

/// Result of a pathway that matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayResult {
    pub outcome: PathwayOutcome,
    /// Point diagnosis the pathway is about.
    pub diagnosis: DiagnosisLabel,
    /// `None` when the pathway deliberately assigns no confidence.
    pub confidence: Option<Confidence>,
    pub likelihood: Distribution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up: Vec<String>,
}

impl PathwayResult {
    /// Appends to the notes.
    pub fn add_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{existing}; {note}"),
            None => note,
        });
    }
}
