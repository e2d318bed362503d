use crate::config::ConflictConfig;
use crate::conflict::{Conflict, ConflictKind, EvidenceKey, Resolution, ResolutionPriority};
use crate::distribution::Distribution;
use crate::evidence::MolecularFindings;
use crate::morphology::MorphologyAssessment;
use crate::pathway::markers::{CDK4, DESMIN, MDM2, MYOGENIN, MYOGLOBIN};
use crate::pathway::{Classification, LiposarcomaFinding, PathwayOutcome, RhabdomyosarcomaFinding};

/// Read-only view of everything conflict detection may look at.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceView<'a> {
    pub classification: &'a Classification,
    pub morphology: &'a MorphologyAssessment,
    pub posterior: &'a Distribution,
    pub molecular: &'a MolecularFindings,
}

impl EvidenceView<'_> {
    fn outcome(&self) -> Option<PathwayOutcome> {
        self.classification.result.as_ref().map(|r| r.outcome)
    }
}

/// A detection rule.
pub type Detector = fn(&EvidenceView<'_>, &ConflictConfig) -> Option<Conflict>;

/// Name of the MDM2 amplification test in evidence keys.
pub const MDM2_FISH: &str = "MDM2 FISH";

/// The conflict catalog, in detection order.
///
/// `AmplificationNotDetected` stays last: its exclusion overrides every
/// liposarcoma diagnosis written before it.
pub const CATALOG: [(ConflictKind, Detector); 5] = [
    (ConflictKind::MolecularVsMorphology, molecular_vs_morphology),
    (ConflictKind::HeterologousDifferentiation, heterologous_differentiation),
    (ConflictKind::CollisionTumor, collision_tumor),
    (ConflictKind::IndeterminateMyogenicPanel, indeterminate_myogenic_panel),
    (ConflictKind::AmplificationNotDetected, amplification_not_detected),
];

/// Runs every catalog entry; result is in catalog order.
#[must_use]
pub fn detect_conflicts(view: &EvidenceView<'_>, config: &ConflictConfig) -> Vec<Conflict> {
    CATALOG
        .iter()
        .filter_map(|(_, detect)| detect(view, config))
        .collect()
}

fn molecular_vs_morphology(view: &EvidenceView<'_>, config: &ConflictConfig) -> Option<Conflict> {
    if !matches!(view.outcome(), Some(PathwayOutcome::Liposarcoma(_))) {
        return None;
    }
    // A negative FISH is its own conflict; the IHC call is no longer the
    // stronger side.
    let fish_negative = view.molecular.mdm2_amplified == Some(false);
    if fish_negative || view.morphology.supports_any(&config.amplicon_labels) {
        return None;
    }
    let mut involved = vec![
        EvidenceKey::marker(MDM2),
        EvidenceKey::marker(CDK4),
        EvidenceKey::MorphologyCandidates,
    ];
    if view.molecular.mdm2_amplified == Some(true) {
        involved.push(EvidenceKey::molecular(MDM2_FISH));
    }
    Some(Conflict::new(ConflictKind::MolecularVsMorphology, involved))
}

fn heterologous_differentiation(
    view: &EvidenceView<'_>,
    _config: &ConflictConfig,
) -> Option<Conflict> {
    let heterologous = PathwayOutcome::Liposarcoma(LiposarcomaFinding::HeterologousMyogenic);
    (view.outcome() == Some(heterologous)).then(|| {
        Conflict::new(
            ConflictKind::HeterologousDifferentiation,
            [
                EvidenceKey::marker(MYOGLOBIN),
                EvidenceKey::marker(MYOGENIN),
                EvidenceKey::PathwayOutcome,
            ],
        )
    })
}

fn collision_tumor(view: &EvidenceView<'_>, _config: &ConflictConfig) -> Option<Conflict> {
    let collision = PathwayOutcome::Liposarcoma(LiposarcomaFinding::CollisionCandidate);
    (view.outcome() == Some(collision)).then(|| {
        Conflict::new(
            ConflictKind::CollisionTumor,
            [
                EvidenceKey::marker(MYOGLOBIN),
                EvidenceKey::marker(MYOGENIN),
                EvidenceKey::marker(MDM2),
                EvidenceKey::marker(CDK4),
            ],
        )
    })
}

fn indeterminate_myogenic_panel(
    view: &EvidenceView<'_>,
    _config: &ConflictConfig,
) -> Option<Conflict> {
    let uncertain = PathwayOutcome::Rhabdomyosarcoma(RhabdomyosarcomaFinding::Uncertain);
    (view.outcome() == Some(uncertain)).then(|| {
        Conflict::new(
            ConflictKind::IndeterminateMyogenicPanel,
            [
                EvidenceKey::marker(MYOGENIN),
                EvidenceKey::marker(DESMIN),
                EvidenceKey::MorphologyCandidates,
            ],
        )
    })
}

fn amplification_not_detected(
    view: &EvidenceView<'_>,
    _config: &ConflictConfig,
) -> Option<Conflict> {
    let amplicon_match = matches!(view.outcome(), Some(PathwayOutcome::Liposarcoma(_)));
    (amplicon_match && view.molecular.mdm2_amplified == Some(false)).then(|| {
        Conflict::new(
            ConflictKind::AmplificationNotDetected,
            [
                EvidenceKey::marker(MDM2),
                EvidenceKey::marker(CDK4),
                EvidenceKey::molecular(MDM2_FISH),
            ],
        )
    })
}

/// The resolution policy for a detected conflict.
///
/// Molecular results reported on the case can change the policy; the
/// detected conflict itself is never modified.
#[must_use]
pub fn resolution_for(
    conflict: &Conflict,
    view: &EvidenceView<'_>,
    config: &ConflictConfig,
) -> Resolution {
    let fish_confirmed = view.molecular.mdm2_amplified == Some(true);
    let (priority, confidence_delta, interpretation) = match conflict.kind {
        ConflictKind::MolecularVsMorphology if fish_confirmed => (
            ResolutionPriority::Molecular,
            config.molecular_confirmed_delta,
            "MDM2 amplification confirmed by FISH; IHC-driven diagnosis retained over morphology",
        ),
        ConflictKind::MolecularVsMorphology => (
            ResolutionPriority::Molecular,
            config.molecular_delta,
            "MDM2/CDK4 co-expression outranks morphology; IHC-driven diagnosis retained",
        ),
        ConflictKind::HeterologousDifferentiation => (
            ResolutionPriority::ExclusionLogic,
            config.heterologous_delta,
            "Myoglobin without Myogenin read as heterologous myogenic differentiation, \
             not primary rhabdomyosarcoma",
        ),
        ConflictKind::CollisionTumor => (
            ResolutionPriority::Molecular,
            config.collision_delta,
            "amplicon and myogenic programs both expressed; \
             reported as a collision-tumor candidate",
        ),
        ConflictKind::IndeterminateMyogenicPanel => (
            ResolutionPriority::Morphology,
            config.indeterminate_delta,
            "Myogenin/Desmin discordant; deferring to the morphology-weighted posterior",
        ),
        ConflictKind::AmplificationNotDetected => (
            ResolutionPriority::Molecular,
            config.amplification_absent_delta,
            "FISH shows no MDM2 amplification; amplicon-driven liposarcoma excluded",
        ),
    };

    Resolution {
        conflict: conflict.kind,
        priority,
        confidence_delta,
        interpretation: interpretation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::evidence::{AtypiaGrade, CellType, IhcPanel, MorphologyFeatures};
    use crate::morphology::MorphologyScorer;
    use crate::pathway::LineagePathway;

    fn detect(scores: &[(&str, f64)], cell: CellType, atypia: AtypiaGrade) -> Vec<ConflictKind> {
        detect_with(scores, cell, atypia, MolecularFindings::default())
    }

    fn detect_with(
        scores: &[(&str, f64)],
        cell: CellType,
        atypia: AtypiaGrade,
        molecular: MolecularFindings,
    ) -> Vec<ConflictKind> {
        let config = EngineConfig::default();
        let ihc = IhcPanel::from_scores(scores.iter().copied()).unwrap();
        let classification = LineagePathway::new(&config).classify(&ihc);
        let morphology = MorphologyScorer::new(&config.diagnosis_space, &config.morphology)
            .score(&MorphologyFeatures::new(cell, atypia));
        let posterior = Distribution::uniform(&config.diagnosis_space);
        let view = EvidenceView {
            classification: &classification,
            morphology: &morphology,
            posterior: &posterior,
            molecular: &molecular,
        };
        detect_conflicts(&view, &config.conflicts)
            .into_iter()
            .map(|c| c.kind)
            .collect()
    }

    #[test]
    fn heterologous_detected_without_molecular_conflict() {
        let kinds = detect(
            &[("MDM2", 1.0), ("CDK4", 0.3), ("Myoglobin", 1.0)],
            CellType::Spindle,
            AtypiaGrade::High,
        );
        assert_eq!(kinds, vec![ConflictKind::HeterologousDifferentiation]);
    }

    #[test]
    fn molecular_conflict_when_morphology_excludes_amplicon_labels() {
        let kinds = detect(&[("MDM2", 1.0), ("CDK4", 1.0)], CellType::RoundCell, AtypiaGrade::High);
        assert_eq!(kinds, vec![ConflictKind::MolecularVsMorphology]);
    }

    #[test]
    fn wdlps_candidate_counts_as_amplicon_support() {
        let kinds = detect(&[("MDM2", 1.0), ("CDK4", 1.0)], CellType::Spindle, AtypiaGrade::Low);
        assert!(kinds.is_empty());
    }

    #[test]
    fn conflicts_come_out_in_catalog_order() {
        let kinds = detect(
            &[("MDM2", 1.0), ("CDK4", 1.0), ("Myoglobin", 1.0), ("Myogenin", 1.0)],
            CellType::Epithelioid,
            AtypiaGrade::High,
        );
        assert_eq!(kinds, vec![ConflictKind::MolecularVsMorphology, ConflictKind::CollisionTumor]);
    }

    #[test]
    fn discordant_myogenic_panel_is_indeterminate() {
        let kinds = detect(&[("Myogenin", 1.0)], CellType::RoundCell, AtypiaGrade::High);
        assert_eq!(kinds, vec![ConflictKind::IndeterminateMyogenicPanel]);
    }

    #[test]
    fn negative_fish_replaces_molecular_conflict() {
        let kinds = detect_with(
            &[("MDM2", 1.0), ("CDK4", 1.0)],
            CellType::RoundCell,
            AtypiaGrade::High,
            MolecularFindings::mdm2_fish(false),
        );
        assert_eq!(kinds, vec![ConflictKind::AmplificationNotDetected]);
    }

    #[test]
    fn negative_fish_is_detected_after_refinement_conflicts() {
        let kinds = detect_with(
            &[("MDM2", 1.0), ("CDK4", 0.3), ("Myoglobin", 1.0)],
            CellType::Spindle,
            AtypiaGrade::High,
            MolecularFindings::mdm2_fish(false),
        );
        assert_eq!(
            kinds,
            vec![ConflictKind::HeterologousDifferentiation, ConflictKind::AmplificationNotDetected]
        );
    }

    #[test]
    fn negative_fish_outside_liposarcoma_is_ignored() {
        let kinds = detect_with(
            &[("SMA", 1.0)],
            CellType::Spindle,
            AtypiaGrade::High,
            MolecularFindings::mdm2_fish(false),
        );
        assert!(kinds.is_empty());
    }

    #[test]
    fn positive_fish_joins_the_molecular_conflict() {
        let config = EngineConfig::default();
        let ihc = IhcPanel::from_scores([("MDM2", 1.0), ("CDK4", 1.0)]).unwrap();
        let classification = LineagePathway::new(&config).classify(&ihc);
        let morphology = MorphologyScorer::new(&config.diagnosis_space, &config.morphology)
            .score(&MorphologyFeatures::new(CellType::RoundCell, AtypiaGrade::High));
        let posterior = Distribution::uniform(&config.diagnosis_space);
        let molecular = MolecularFindings::mdm2_fish(true);
        let view = EvidenceView {
            classification: &classification,
            morphology: &morphology,
            posterior: &posterior,
            molecular: &molecular,
        };

        let conflicts = detect_conflicts(&view, &config.conflicts);
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].involved.contains(&EvidenceKey::molecular(MDM2_FISH)));

        let r = resolution_for(&conflicts[0], &view, &config.conflicts);
        assert_eq!(r.priority, ResolutionPriority::Molecular);
        assert!((r.confidence_delta - 0.05).abs() < 1e-12);
        assert!(r.interpretation.contains("FISH"));
    }

    #[test]
    fn resolution_uses_configured_deltas() {
        let engine_config = EngineConfig::default();
        let ihc = IhcPanel::new();
        let classification = LineagePathway::new(&engine_config).classify(&ihc);
        let morphology =
            MorphologyScorer::new(&engine_config.diagnosis_space, &engine_config.morphology)
                .score(&MorphologyFeatures::new(CellType::Spindle, AtypiaGrade::High));
        let posterior = Distribution::uniform(&engine_config.diagnosis_space);
        let molecular = MolecularFindings::default();
        let view = EvidenceView {
            classification: &classification,
            morphology: &morphology,
            posterior: &posterior,
            molecular: &molecular,
        };

        let mut config = ConflictConfig::default();
        config.molecular_delta = -0.2;
        let conflict = Conflict::new(
            ConflictKind::MolecularVsMorphology,
            [EvidenceKey::MorphologyCandidates],
        );
        let r = resolution_for(&conflict, &view, &config);
        assert_eq!(r.priority, ResolutionPriority::Molecular);
        assert_eq!(r.confidence_delta, -0.2);

        let conflict = Conflict::new(
            ConflictKind::HeterologousDifferentiation,
            [EvidenceKey::PathwayOutcome],
        );
        let r = resolution_for(&conflict, &view, &ConflictConfig::default());
        assert_eq!(r.priority, ResolutionPriority::ExclusionLogic);
        assert!((r.confidence_delta - 0.10).abs() < 1e-12);

        let conflict = Conflict::new(
            ConflictKind::AmplificationNotDetected,
            [EvidenceKey::molecular(MDM2_FISH)],
        );
        let r = resolution_for(&conflict, &view, &ConflictConfig::default());
        assert!((r.confidence_delta + 0.40).abs() < 1e-12);
    }
}
