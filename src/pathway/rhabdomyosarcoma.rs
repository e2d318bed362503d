//! Rhabdomyosarcoma sub-pathway.
//!
//! Inclusion needs both Myogenin and Desmin (AND), exclusion needs both
//! negative (NOR), and a single reactive marker is indeterminate (XOR).

use crate::config::EngineConfig;
use crate::confidence::Confidence;
use crate::evidence::IhcPanel;

use super::markers::{DESMIN, MYOGENIN};
use super::outcome::{PathwayOutcome, PathwayResult, RhabdomyosarcomaFinding};

pub const POSITIVE_CONFIDENCE: f64 = 0.90;
pub const EXCLUSION_CONFIDENCE: f64 = 0.98;

#[must_use]
pub fn finding(ihc: &IhcPanel) -> RhabdomyosarcomaFinding {
    match (ihc.is_reactive(MYOGENIN), ihc.is_reactive(DESMIN)) {
        (true, true) => RhabdomyosarcomaFinding::Positive,
        (false, false) => RhabdomyosarcomaFinding::Excluded,
        _ => RhabdomyosarcomaFinding::Uncertain,
    }
}

#[must_use]
pub fn evaluate(ihc: &IhcPanel, config: &EngineConfig) -> PathwayResult {
    let finding = finding(ihc);
    let profiles = &config.likelihoods;
    let (confidence, likelihood, notes, follow_up) = match finding {
        RhabdomyosarcomaFinding::Positive => (
            Some(Confidence::clamped(POSITIVE_CONFIDENCE)),
            profiles.rms_positive.clone(),
            "rhabdomyosarcoma, subtyping required",
            "rhabdomyosarcoma subtyping",
        ),
        RhabdomyosarcomaFinding::Excluded => (
            Some(Confidence::clamped(EXCLUSION_CONFIDENCE)),
            profiles.rms_excluded.clone(),
            "rhabdomyosarcoma excluded",
            "consider other spindle-cell sarcomas",
        ),
        RhabdomyosarcomaFinding::Uncertain => (
            None,
            profiles.rms_uncertain.clone(),
            "myogenic panel indeterminate (Myogenin/Desmin discordant)",
            "supplementary MyoD1 immunostain or molecular testing",
        ),
    };

    PathwayResult {
        outcome: PathwayOutcome::Rhabdomyosarcoma(finding),
        diagnosis: config.labels.rhabdomyosarcoma.clone(),
        confidence,
        likelihood,
        notes: Some(notes.to_string()),
        follow_up: vec![follow_up.to_string()],
    }
}
