//! Liposarcoma sub-pathway.

use crate::config::EngineConfig;
use crate::confidence::Confidence;
use crate::evidence::IhcPanel;

use super::markers::{CDK4, MDM2, MYOGENIN, MYOGLOBIN};
use super::outcome::{LiposarcomaFinding, PathwayOutcome, PathwayResult};

/// Confidence for the joint MDM2 + CDK4 condition.
pub const MATCH_CONFIDENCE: f64 = 0.95;

/// Follow-up asking for molecular confirmation of the amplicon.
pub const FISH_FOLLOW_UP: &str = "FISH to confirm MDM2 amplification";

/// Refines a match using Myoglobin / Myogenin.
#[must_use]
pub fn finding(ihc: &IhcPanel) -> LiposarcomaFinding {
    match (ihc.is_reactive(MYOGLOBIN), ihc.is_reactive(MYOGENIN)) {
        (true, false) => LiposarcomaFinding::HeterologousMyogenic,
        (true, true) => LiposarcomaFinding::CollisionCandidate,
        (false, _) => LiposarcomaFinding::Plain,
    }
}

/// Returns `None` unless both MDM2 and CDK4 are reactive.
#[must_use]
pub fn evaluate(ihc: &IhcPanel, config: &EngineConfig) -> Option<PathwayResult> {
    if !(ihc.is_reactive(MDM2) && ihc.is_reactive(CDK4)) {
        return None;
    }

    let finding = finding(ihc);
    let profiles = &config.likelihoods;
    let labels = &config.labels;
    let (likelihood, notes, mut follow_up) = match finding {
        LiposarcomaFinding::Plain => (profiles.liposarcoma.clone(), None, Vec::new()),
        LiposarcomaFinding::HeterologousMyogenic => (
            profiles.liposarcoma_heterologous.clone(),
            Some(
                "dedifferentiated liposarcoma with heterologous myogenic differentiation"
                    .to_string(),
            ),
            Vec::new(),
        ),
        LiposarcomaFinding::CollisionCandidate => (
            profiles.collision.clone(),
            Some(format!(
                "collision tumor candidate: {} vs {}",
                labels.liposarcoma, labels.rhabdomyosarcoma
            )),
            vec!["MyoD1 immunostain to characterise the myogenic component".to_string()],
        ),
    };
    follow_up.insert(0, FISH_FOLLOW_UP.to_string());

    Some(PathwayResult {
        outcome: PathwayOutcome::Liposarcoma(finding),
        diagnosis: labels.liposarcoma.clone(),
        confidence: Some(Confidence::clamped(MATCH_CONFIDENCE)),
        likelihood,
        notes,
        follow_up,
    })
}
