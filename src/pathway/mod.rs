//! Layered immunohistochemistry decision tree.
//!
//! Routing runs as an explicit state machine (see [`state`]): the lineage
//! gate sends any epithelial signal to a terminal leaf, lineage
//! classification collects every activated lineage, and dispatch picks one
//! sub-pathway by a fixed precedence list. Co-activated lineages are kept on
//! the classification and noted on the result.

mod liposarcoma;
mod outcome;
mod rhabdomyosarcoma;
pub mod state;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confidence::Confidence;
use crate::config::{EngineConfig, NEURAL, SMOOTH_MUSCLE, VASCULAR};
use crate::evidence::IhcPanel;

pub use outcome::{
    LiposarcomaFinding, PathwayOutcome, PathwayResult, RhabdomyosarcomaFinding, SubPathway,
    UndifferentiatedFinding,
};
pub use state::{Stage, Terminal};

/// Marker names used by the sub-pathway rules.
pub mod markers {
    pub const MDM2: &str = "MDM2";
    pub const CDK4: &str = "CDK4";
    pub const MYOGENIN: &str = "Myogenin";
    pub const MYOGLOBIN: &str = "Myoglobin";
    pub const DESMIN: &str = "Desmin";
}

pub use liposarcoma::{FISH_FOLLOW_UP, MATCH_CONFIDENCE as LIPOSARCOMA_CONFIDENCE};
pub use rhabdomyosarcoma::{
    EXCLUSION_CONFIDENCE as RMS_EXCLUSION_CONFIDENCE,
    POSITIVE_CONFIDENCE as RMS_POSITIVE_CONFIDENCE,
};

/// Everything the decision tree concluded for one panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Layers visited, in order.
    pub stages: Vec<Stage>,
    /// Lineages with a reactive marker. Empty when the gate short-circuits.
    pub activated: Vec<String>,
    /// Sub-pathway dispatched to; `None` for the epithelial leaf.
    pub sub_pathway: Option<SubPathway>,
    /// `None` means the dispatched sub-pathway did not match.
    pub result: Option<PathwayResult>,
}

impl Classification {
    /// True if a sub-pathway was reached but did not match.
    #[must_use]
    pub fn is_no_match(&self) -> bool {
        self.result.is_none()
    }
}

/// The decision tree over a fixed configuration.
#[derive(Debug, Clone, Copy)]
pub struct LineagePathway<'a> {
    config: &'a EngineConfig,
}

impl<'a> LineagePathway<'a> {
    #[must_use]
    pub const fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Routes a panel through the three layers and evaluates the leaf.
    #[must_use]
    pub fn classify(&self, ihc: &IhcPanel) -> Classification {
        let route = state::route(ihc, &self.config.lineage);
        let (sub_pathway, mut result) = match route.terminal {
            Terminal::Epithelial => (None, Some(self.epithelial())),
            Terminal::SubPathway(sub) => {
                let result = match sub {
                    SubPathway::Liposarcoma => liposarcoma::evaluate(ihc, self.config),
                    SubPathway::Rhabdomyosarcoma => {
                        Some(rhabdomyosarcoma::evaluate(ihc, self.config))
                    }
                    SubPathway::Undifferentiated => Some(self.undifferentiated(&route.activated)),
                };
                (Some(sub), result)
            }
        };

        if route.activated.len() > 1 {
            if let Some(result) = result.as_mut() {
                result.add_note(format!("co-activated lineages: {}", route.activated.join(", ")));
            }
        }

        debug!(
            stages = ?route.stages,
            activated = ?route.activated,
            sub_pathway = ?sub_pathway,
            outcome = ?result.as_ref().map(|r| r.outcome),
            "ihc panel classified"
        );

        Classification {
            stages: route.stages,
            activated: route.activated,
            sub_pathway,
            result,
        }
    }

    fn epithelial(&self) -> PathwayResult {
        PathwayResult {
            outcome: PathwayOutcome::Epithelial,
            diagnosis: self.config.labels.epithelial.clone(),
            confidence: Some(Confidence::clamped(self.config.lineage.epithelial_confidence)),
            likelihood: self.config.likelihoods.epithelial.clone(),
            notes: Some("epithelial lineage; sarcoma sub-pathways not evaluated".to_string()),
            follow_up: vec!["carcinoma work-up (cytokeratin subset panel)".to_string()],
        }
    }

    fn undifferentiated(&self, activated: &[String]) -> PathwayResult {
        let has = |name: &str| activated.iter().any(|a| a == name);
        let labels = &self.config.labels;
        let profiles = &self.config.likelihoods;
        let (finding, diagnosis, likelihood) = if has(SMOOTH_MUSCLE) {
            (
                UndifferentiatedFinding::SmoothMuscle,
                labels.leiomyosarcoma.clone(),
                profiles.smooth_muscle.clone(),
            )
        } else if has(NEURAL) || has(VASCULAR) {
            (
                UndifferentiatedFinding::OtherLineage,
                labels.other_sarcoma.clone(),
                profiles.other_lineage.clone(),
            )
        } else {
            (
                UndifferentiatedFinding::NoLineage,
                labels.undifferentiated.clone(),
                profiles.undifferentiated.clone(),
            )
        };

        PathwayResult {
            outcome: PathwayOutcome::Undifferentiated(finding),
            diagnosis,
            confidence: None,
            likelihood,
            notes: None,
            follow_up: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(scores: &[(&str, f64)]) -> Classification {
        let config = EngineConfig::default();
        let panel = IhcPanel::from_scores(scores.iter().copied()).unwrap();
        LineagePathway::new(&config).classify(&panel)
    }

    #[test]
    fn epithelial_leaf_skips_sarcoma_pathways() {
        let c = classify(&[("CK", 1.0), ("MDM2", 1.0), ("CDK4", 1.0)]);
        assert_eq!(c.sub_pathway, None);
        assert_eq!(c.stages, vec![Stage::LineageGate]);
        let result = c.result.unwrap();
        assert_eq!(result.outcome, PathwayOutcome::Epithelial);
        assert!(result.likelihood.iter().all(|(_, v)| v < 0.01));
        assert_eq!(result.confidence.map(|c| c.value()), Some(0.90));
    }

    #[test]
    fn epithelial_confidence_follows_config() {
        let mut config = EngineConfig::default();
        config.lineage.epithelial_confidence = 0.6;
        let panel = IhcPanel::from_scores([("EMA", 1.0)]).unwrap();
        let result = LineagePathway::new(&config).classify(&panel).result.unwrap();
        assert_eq!(result.confidence.unwrap().value(), 0.6);
    }

    #[test]
    fn liposarcoma_no_match_is_none() {
        let c = classify(&[("MDM2", 1.0)]);
        assert_eq!(c.sub_pathway, Some(SubPathway::Liposarcoma));
        assert!(c.is_no_match());
    }

    #[test]
    fn no_backtracking_after_liposarcoma_no_match() {
        // Skeletal muscle is active too, but dispatch already chose liposarcoma.
        let c = classify(&[("MDM2", 1.0), ("Myogenin", 1.0), ("Desmin", 1.0)]);
        assert_eq!(c.sub_pathway, Some(SubPathway::Liposarcoma));
        assert!(c.result.is_none());
    }

    #[test]
    fn undifferentiated_by_lineage() {
        let lms = classify(&[("SMA", 1.0)]).result.unwrap();
        assert_eq!(
            lms.outcome,
            PathwayOutcome::Undifferentiated(UndifferentiatedFinding::SmoothMuscle)
        );
        assert_eq!(lms.diagnosis.as_str(), "LMS");

        let other = classify(&[("S100", 1.0)]).result.unwrap();
        assert_eq!(other.diagnosis.as_str(), "OtherSarcoma");

        let ups = classify(&[]).result.unwrap();
        assert_eq!(
            ups.outcome,
            PathwayOutcome::Undifferentiated(UndifferentiatedFinding::NoLineage)
        );
        assert_eq!(ups.diagnosis.as_str(), "UPS");
        assert!(ups.confidence.is_none());
    }

    #[test]
    fn co_activation_is_noted() {
        let c = classify(&[("MDM2", 1.0), ("CDK4", 1.0), ("Myogenin", 1.0)]);
        assert_eq!(c.activated.len(), 2);
        let notes = c.result.unwrap().notes.unwrap();
        assert!(notes.contains("skeletal_muscle"));
        assert!(notes.contains("adipocytic"));
    }
}
