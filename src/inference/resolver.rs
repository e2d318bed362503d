use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confidence::Confidence;
use crate::config::{ConflictConfig, PathwayLabels};
use crate::conflict::{Conflict, ConflictKind, Resolution};
use crate::diagnosis::DiagnosisLabel;
use crate::distribution::Distribution;
use crate::pathway::{LiposarcomaFinding, PathwayOutcome, PathwayResult, RhabdomyosarcomaFinding};
use crate::report::FinalDiagnosis;

use super::policies::{detect_conflicts, resolution_for, EvidenceView};

const HETEROLOGOUS_DIFFERENTIATION: &str = "myogenic";

/// Diagnosis and confidence after every conflict has been resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDiagnosis {
    pub final_diagnosis: FinalDiagnosis,
    pub confidence: Confidence,
    /// In application order.
    pub applied_resolutions: Vec<Resolution>,
    pub conflicts: Vec<Conflict>,
}

/// Detects conflicts and folds their resolutions over a baseline diagnosis.
#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver<'a> {
    labels: &'a PathwayLabels,
    config: &'a ConflictConfig,
}

impl<'a> ConflictResolver<'a> {
    #[must_use]
    pub const fn new(labels: &'a PathwayLabels, config: &'a ConflictConfig) -> Self {
        Self { labels, config }
    }

    /// Resolves the evidence into a final diagnosis.
    ///
    /// Resolutions are applied in detection order. The posterior itself is
    /// never modified; only the diagnosis and its confidence are.
    #[must_use]
    pub fn resolve(&self, view: &EvidenceView<'_>) -> ResolvedDiagnosis {
        let conflicts = detect_conflicts(view, self.config);
        let baseline = self.baseline(view);

        let resolved = conflicts.iter().fold(baseline, |working, conflict| {
            let resolution = resolution_for(conflict, view, self.config);
            debug!(
                conflict = %conflict.kind,
                delta = resolution.confidence_delta,
                "applying resolution"
            );
            self.apply(working, conflict, resolution, view.posterior)
        });

        ResolvedDiagnosis {
            conflicts,
            ..resolved
        }
    }

    fn baseline(&self, view: &EvidenceView<'_>) -> ResolvedDiagnosis {
        let posterior = view.posterior;
        let (final_diagnosis, assigned) = match view.classification.result.as_ref() {
            None => (
                FinalDiagnosis::MostLikely {
                    label: self.most_likely(posterior, None),
                },
                None,
            ),
            Some(result) => (self.diagnosis_for(result, posterior), result.confidence),
        };

        let confidence = assigned.unwrap_or_else(|| {
            let label = final_diagnosis.primary_label();
            let p = posterior
                .get(label)
                .or_else(|| posterior.top().map(|(_, p)| p))
                .unwrap_or(0.0);
            Confidence::clamped(p)
        });

        ResolvedDiagnosis {
            final_diagnosis,
            confidence,
            applied_resolutions: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    fn diagnosis_for(&self, result: &PathwayResult, posterior: &Distribution) -> FinalDiagnosis {
        let label = result.diagnosis.clone();
        match result.outcome {
            PathwayOutcome::Epithelial => FinalDiagnosis::NonMesenchymal { label },
            PathwayOutcome::Liposarcoma(LiposarcomaFinding::Plain)
            | PathwayOutcome::Rhabdomyosarcoma(RhabdomyosarcomaFinding::Positive) => {
                FinalDiagnosis::Confirmed { label }
            }
            PathwayOutcome::Liposarcoma(LiposarcomaFinding::HeterologousMyogenic) => {
                FinalDiagnosis::HeterologousDifferentiation {
                    label,
                    differentiation: HETEROLOGOUS_DIFFERENTIATION.to_string(),
                }
            }
            PathwayOutcome::Liposarcoma(LiposarcomaFinding::CollisionCandidate) => {
                FinalDiagnosis::CollisionCandidate {
                    primary: label,
                    secondary: self.labels.rhabdomyosarcoma.clone(),
                }
            }
            PathwayOutcome::Rhabdomyosarcoma(RhabdomyosarcomaFinding::Excluded) => {
                FinalDiagnosis::Excluded {
                    most_likely: self.most_likely(posterior, Some(&label)),
                    excluded: label,
                }
            }
            PathwayOutcome::Rhabdomyosarcoma(RhabdomyosarcomaFinding::Uncertain) => {
                FinalDiagnosis::Indeterminate {
                    most_likely: self.most_likely(posterior, None),
                }
            }
            PathwayOutcome::Undifferentiated(_) => FinalDiagnosis::MostLikely { label },
        }
    }

    fn apply(
        &self,
        mut working: ResolvedDiagnosis,
        conflict: &Conflict,
        resolution: Resolution,
        posterior: &Distribution,
    ) -> ResolvedDiagnosis {
        working.confidence = working.confidence.adjust(resolution.confidence_delta);
        working.final_diagnosis = match conflict.kind {
            ConflictKind::MolecularVsMorphology => working.final_diagnosis,
            ConflictKind::HeterologousDifferentiation => {
                FinalDiagnosis::HeterologousDifferentiation {
                    label: self.labels.liposarcoma.clone(),
                    differentiation: HETEROLOGOUS_DIFFERENTIATION.to_string(),
                }
            }
            ConflictKind::CollisionTumor => FinalDiagnosis::CollisionCandidate {
                primary: self.labels.liposarcoma.clone(),
                secondary: self.labels.rhabdomyosarcoma.clone(),
            },
            ConflictKind::IndeterminateMyogenicPanel => FinalDiagnosis::Indeterminate {
                most_likely: self.most_likely(posterior, None),
            },
            ConflictKind::AmplificationNotDetected => FinalDiagnosis::Excluded {
                excluded: self.labels.liposarcoma.clone(),
                most_likely: self.most_likely(posterior, Some(&self.labels.liposarcoma)),
            },
        };
        working.applied_resolutions.push(resolution);
        working
    }

    /// Top posterior label, skipping `excluded` when another label exists.
    fn most_likely(
        &self,
        posterior: &Distribution,
        excluded: Option<&DiagnosisLabel>,
    ) -> DiagnosisLabel {
        let ranked = posterior.ranked();
        ranked
            .iter()
            .find(|(label, _)| Some(label) != excluded)
            .or_else(|| ranked.first())
            .map_or_else(|| self.labels.undifferentiated.clone(), |(label, _)| label.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::conflict::ResolutionPriority;
    use crate::evidence::{AtypiaGrade, CellType, IhcPanel, MolecularFindings, MorphologyFeatures};
    use crate::morphology::MorphologyScorer;
    use crate::pathway::LineagePathway;

    fn resolve_with(
        config: &EngineConfig,
        scores: &[(&str, f64)],
        features: MorphologyFeatures,
        posterior: &Distribution,
    ) -> ResolvedDiagnosis {
        resolve_with_molecular(config, scores, features, posterior, MolecularFindings::default())
    }

    fn resolve_with_molecular(
        config: &EngineConfig,
        scores: &[(&str, f64)],
        features: MorphologyFeatures,
        posterior: &Distribution,
        molecular: MolecularFindings,
    ) -> ResolvedDiagnosis {
        let ihc = IhcPanel::from_scores(scores.iter().copied()).unwrap();
        let classification = LineagePathway::new(config).classify(&ihc);
        let morphology =
            MorphologyScorer::new(&config.diagnosis_space, &config.morphology).score(&features);
        let view = EvidenceView {
            classification: &classification,
            morphology: &morphology,
            posterior,
            molecular: &molecular,
        };
        ConflictResolver::new(&config.labels, &config.conflicts).resolve(&view)
    }

    fn spindle_high() -> MorphologyFeatures {
        MorphologyFeatures::new(CellType::Spindle, AtypiaGrade::High)
    }

    fn posterior() -> Distribution {
        Distribution::from([
            ("DDLPS", 0.1),
            ("RMS", 0.1),
            ("UPS", 0.5),
            ("LMS", 0.2),
            ("OtherSarcoma", 0.1),
        ])
    }

    #[test]
    fn no_conflict_passes_through() {
        let config = EngineConfig::default();
        let scores = [("MDM2", 1.0), ("CDK4", 1.0)];
        let r = resolve_with(&config, &scores, spindle_high(), &posterior());
        assert_eq!(r.final_diagnosis, FinalDiagnosis::Confirmed { label: "DDLPS".into() });
        assert_eq!(r.confidence.value(), 0.95);
        assert!(r.applied_resolutions.is_empty());
        assert!(r.conflicts.is_empty());
    }

    #[test]
    fn heterologous_raises_confidence_and_clamps() {
        let config = EngineConfig::default();
        let r = resolve_with(
            &config,
            &[("MDM2", 1.0), ("CDK4", 0.3), ("Myoglobin", 1.0)],
            spindle_high(),
            &posterior(),
        );
        assert!(matches!(r.final_diagnosis, FinalDiagnosis::HeterologousDifferentiation { .. }));
        // 0.95 + 0.10 clamps to 1.0
        assert_eq!(r.confidence.value(), 1.0);
        assert_eq!(r.applied_resolutions.len(), 1);
        assert_eq!(r.applied_resolutions[0].priority, ResolutionPriority::ExclusionLogic);
    }

    #[test]
    fn resolutions_accumulate_in_order() {
        let config = EngineConfig::default();
        let r = resolve_with(
            &config,
            &[("MDM2", 1.0), ("CDK4", 1.0), ("Myoglobin", 1.0), ("Myogenin", 1.0)],
            MorphologyFeatures::new(CellType::Epithelioid, AtypiaGrade::Low),
            &posterior(),
        );
        let kinds: Vec<_> = r.applied_resolutions.iter().map(|res| res.conflict).collect();
        assert_eq!(kinds, vec![ConflictKind::MolecularVsMorphology, ConflictKind::CollisionTumor]);
        // 0.95 - 0.05 - 0.15
        assert!((r.confidence.value() - 0.75).abs() < 1e-9);
        assert_eq!(
            r.final_diagnosis,
            FinalDiagnosis::CollisionCandidate {
                primary: "DDLPS".into(),
                secondary: "RMS".into()
            }
        );
    }

    #[test]
    fn indeterminate_defers_to_posterior() {
        let config = EngineConfig::default();
        let scores = [("Desmin", 1.0), ("Myogenin", 0.0)];
        let r = resolve_with(&config, &scores, spindle_high(), &posterior());
        // Desmin alone activates skeletal muscle and smooth muscle; skeletal muscle wins dispatch.
        assert_eq!(r.final_diagnosis, FinalDiagnosis::Indeterminate { most_likely: "UPS".into() });
        // posterior(UPS) 0.5 - 0.10
        assert!((r.confidence.value() - 0.4).abs() < 1e-9);
        assert_eq!(r.applied_resolutions[0].priority, ResolutionPriority::Morphology);
    }

    #[test]
    fn exclusion_names_best_remaining_label() {
        let config = EngineConfig::default();
        let skewed = Distribution::from([
            ("DDLPS", 0.1),
            ("RMS", 0.6),
            ("UPS", 0.2),
            ("LMS", 0.05),
            ("OtherSarcoma", 0.05),
        ]);
        let ihc_scores = [("MyoD1", 1.0), ("Myogenin", 0.0), ("Desmin", 0.0)];
        let r = resolve_with(&config, &ihc_scores, spindle_high(), &skewed);
        assert_eq!(
            r.final_diagnosis,
            FinalDiagnosis::Excluded {
                excluded: "RMS".into(),
                most_likely: "UPS".into()
            }
        );
        assert_eq!(r.confidence.value(), 0.98);
    }

    #[test]
    fn epithelial_confidence_is_the_configured_value() {
        let mut config = EngineConfig::default();
        config.lineage.epithelial_confidence = 0.85;
        let r = resolve_with(&config, &[("CK", 1.0)], spindle_high(), &posterior());
        assert_eq!(
            r.final_diagnosis,
            FinalDiagnosis::NonMesenchymal {
                label: "EpithelialNeoplasm".into()
            }
        );
        assert_eq!(r.confidence.value(), 0.85);
        assert!(posterior().iter().all(|(_, p)| p != 0.85));
    }

    #[test]
    fn negative_fish_excludes_liposarcoma() {
        let config = EngineConfig::default();
        let r = resolve_with_molecular(
            &config,
            &[("MDM2", 1.0), ("CDK4", 1.0)],
            spindle_high(),
            &posterior(),
            MolecularFindings::mdm2_fish(false),
        );
        assert_eq!(
            r.final_diagnosis,
            FinalDiagnosis::Excluded {
                excluded: "DDLPS".into(),
                most_likely: "UPS".into()
            }
        );
        // 0.95 - 0.40
        assert!((r.confidence.value() - 0.55).abs() < 1e-9);
        assert_eq!(r.conflicts.len(), 1);
        assert_eq!(r.conflicts[0].kind, ConflictKind::AmplificationNotDetected);
    }

    #[test]
    fn positive_fish_strengthens_the_molecular_resolution() {
        let config = EngineConfig::default();
        let r = resolve_with_molecular(
            &config,
            &[("MDM2", 1.0), ("CDK4", 1.0)],
            MorphologyFeatures::new(CellType::RoundCell, AtypiaGrade::High),
            &posterior(),
            MolecularFindings::mdm2_fish(true),
        );
        assert_eq!(r.final_diagnosis, FinalDiagnosis::Confirmed { label: "DDLPS".into() });
        // 0.95 + 0.05
        assert!((r.confidence.value() - 1.0).abs() < 1e-9);
        assert_eq!(r.applied_resolutions[0].conflict, ConflictKind::MolecularVsMorphology);
    }

    #[test]
    fn no_match_uses_posterior_top() {
        let config = EngineConfig::default();
        let r = resolve_with(&config, &[("MDM2", 1.0)], spindle_high(), &posterior());
        assert_eq!(r.final_diagnosis, FinalDiagnosis::MostLikely { label: "UPS".into() });
        assert!((r.confidence.value() - 0.5).abs() < 1e-12);
    }
}
