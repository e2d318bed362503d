//! Conflict types for contradictory evidence.
//!
//! Conflicts are explicit objects, not hidden errors. Each detected
//! conflict produces exactly one [`Resolution`], and every resolution is
//! kept on the report in the order it was applied.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Recognized kinds of contradictory evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// MDM2/CDK4-positive pathway but morphology excludes every
    /// amplicon-associated diagnosis.
    MolecularVsMorphology,

    /// Myoglobin reactive, Myogenin negative, in a liposarcoma-positive case.
    HeterologousDifferentiation,

    /// Myoglobin and Myogenin reactive in a liposarcoma-positive case.
    CollisionTumor,

    /// Myogenin and Desmin disagree in the rhabdomyosarcoma sub-pathway.
    IndeterminateMyogenicPanel,

    /// MDM2/CDK4-positive pathway but FISH shows no MDM2 amplification.
    AmplificationNotDetected,
}

impl ConflictKind {
    /// Short stable identifier suitable for logging.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MolecularVsMorphology => "molecular_vs_morphology",
            Self::HeterologousDifferentiation => "heterologous_differentiation",
            Self::CollisionTumor => "collision_tumor",
            Self::IndeterminateMyogenicPanel => "indeterminate_myogenic_panel",
            Self::AmplificationNotDetected => "amplification_not_detected",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A piece of evidence taking part in a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "channel", content = "name", rename_all = "snake_case")]
pub enum EvidenceKey {
    /// An immunohistochemical marker.
    Marker(String),
    /// The morphology candidate set.
    MorphologyCandidates,
    /// The lineage pathway outcome.
    PathwayOutcome,
    /// A molecular test result.
    Molecular(String),
}

impl EvidenceKey {
    #[must_use]
    pub fn marker(name: &str) -> Self {
        Self::Marker(name.to_string())
    }

    #[must_use]
    pub fn molecular(test: &str) -> Self {
        Self::Molecular(test.to_string())
    }
}

/// A detected conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub involved: BTreeSet<EvidenceKey>,
}

impl Conflict {
    #[must_use]
    pub fn new(kind: ConflictKind, involved: impl IntoIterator<Item = EvidenceKey>) -> Self {
        Self {
            kind,
            involved: involved.into_iter().collect(),
        }
    }
}

/// Which evidence a resolution lets win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPriority {
    Molecular,
    ExclusionLogic,
    Morphology,
}

impl fmt::Display for ResolutionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Molecular => write!(f, "molecular"),
            Self::ExclusionLogic => write!(f, "exclusion_logic"),
            Self::Morphology => write!(f, "morphology"),
        }
    }
}

/// How one conflict was resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub conflict: ConflictKind,
    pub priority: ResolutionPriority,
    /// Signed change applied to the working confidence.
    pub confidence_delta: f64,
    pub interpretation: String,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({:+.2}): {}",
            self.conflict, self.priority, self.confidence_delta, self.interpretation
        )
    }
}
