use dxfusion::pathway::{
    LiposarcomaFinding, RhabdomyosarcomaFinding, Stage, UndifferentiatedFinding,
    LIPOSARCOMA_CONFIDENCE, RMS_EXCLUSION_CONFIDENCE, RMS_POSITIVE_CONFIDENCE,
};
use dxfusion::{Classification, EngineConfig, IhcPanel, LineagePathway, PathwayOutcome, SubPathway};

fn classify(scores: &[(&str, f64)]) -> Classification {
    let config = EngineConfig::default();
    let ihc = IhcPanel::from_scores(scores.iter().copied()).unwrap();
    LineagePathway::new(&config).classify(&ihc)
}

fn outcome(scores: &[(&str, f64)]) -> Option<PathwayOutcome> {
    classify(scores).result.map(|r| r.outcome)
}

#[test]
fn rhabdomyosarcoma_truth_table() {
    use RhabdomyosarcomaFinding::{Excluded, Positive, Uncertain};

    // MyoD1 keeps the skeletal-muscle lineage active for every row.
    let rows = [
        (1.0, 1.0, Positive),
        (1.0, 0.0, Uncertain),
        (0.0, 1.0, Uncertain),
        (0.0, 0.0, Excluded),
    ];
    for (myogenin, desmin, expected) in rows {
        let c = classify(&[("MyoD1", 1.0), ("Myogenin", myogenin), ("Desmin", desmin)]);
        assert_eq!(c.sub_pathway, Some(SubPathway::Rhabdomyosarcoma));
        let result = c.result.unwrap();
        assert_eq!(
            result.outcome,
            PathwayOutcome::Rhabdomyosarcoma(expected),
            "myogenin={myogenin} desmin={desmin}"
        );

        let confidence = result.confidence.map(|c| c.value());
        match expected {
            Positive => assert_eq!(confidence, Some(RMS_POSITIVE_CONFIDENCE)),
            Excluded => assert_eq!(confidence, Some(RMS_EXCLUSION_CONFIDENCE)),
            Uncertain => assert_eq!(confidence, None),
        }
    }
}

#[test]
fn focal_reactivity_counts() {
    assert_eq!(
        outcome(&[("MyoD1", 1.0), ("Myogenin", 0.05), ("Desmin", 0.1)]),
        Some(PathwayOutcome::Rhabdomyosarcoma(RhabdomyosarcomaFinding::Positive))
    );
}

#[test]
fn liposarcoma_requires_both_amplicon_markers() {
    for scores in [&[("MDM2", 1.0)][..], &[("CDK4", 0.6)][..]] {
        let c = classify(scores);
        assert_eq!(c.sub_pathway, Some(SubPathway::Liposarcoma));
        assert!(c.is_no_match(), "{scores:?} should not match");
    }

    let c = classify(&[("MDM2", 1.0), ("CDK4", 1.0)]);
    let result = c.result.unwrap();
    assert_eq!(result.outcome, PathwayOutcome::Liposarcoma(LiposarcomaFinding::Plain));
    assert_eq!(result.confidence.unwrap().value(), LIPOSARCOMA_CONFIDENCE);
}

#[test]
fn liposarcoma_refinement_by_myogenic_markers() {
    let base = [("MDM2", 1.0), ("CDK4", 0.3)];
    let with = |extra: &[(&'static str, f64)]| {
        let mut scores = base.to_vec();
        scores.extend_from_slice(extra);
        outcome(&scores)
    };

    assert_eq!(
        with(&[("Myoglobin", 1.0)]),
        Some(PathwayOutcome::Liposarcoma(LiposarcomaFinding::HeterologousMyogenic))
    );
    assert_eq!(
        with(&[("Myoglobin", 1.0), ("Myogenin", 1.0)]),
        Some(PathwayOutcome::Liposarcoma(LiposarcomaFinding::CollisionCandidate))
    );
    // Myogenin alone activates skeletal muscle but adipocytic wins dispatch.
    assert_eq!(
        with(&[("Myogenin", 1.0)]),
        Some(PathwayOutcome::Liposarcoma(LiposarcomaFinding::Plain))
    );
}

#[test]
fn adipocytic_takes_precedence_over_skeletal_muscle() {
    let c = classify(&[("MDM2", 1.0), ("CDK4", 1.0), ("Myogenin", 1.0), ("Desmin", 1.0)]);
    assert_eq!(c.sub_pathway, Some(SubPathway::Liposarcoma));
    assert_eq!(c.activated.len(), 3);
    let notes = c.result.unwrap().notes.unwrap();
    assert!(notes.contains("co-activated lineages"), "{notes}");
}

#[test]
fn undifferentiated_leaves() {
    assert_eq!(
        outcome(&[("SMA", 1.0)]),
        Some(PathwayOutcome::Undifferentiated(UndifferentiatedFinding::SmoothMuscle))
    );
    assert_eq!(
        outcome(&[("S100", 1.0)]),
        Some(PathwayOutcome::Undifferentiated(UndifferentiatedFinding::OtherLineage))
    );
    assert_eq!(
        outcome(&[("CD31", 0.5)]),
        Some(PathwayOutcome::Undifferentiated(UndifferentiatedFinding::OtherLineage))
    );
    assert_eq!(
        outcome(&[]),
        Some(PathwayOutcome::Undifferentiated(UndifferentiatedFinding::NoLineage))
    );
}

#[test]
fn epithelial_gate_short_circuits() {
    let c = classify(&[("CK", 1.0), ("MDM2", 1.0), ("CDK4", 1.0)]);
    assert_eq!(c.result.unwrap().outcome, PathwayOutcome::Epithelial);
    assert_eq!(c.sub_pathway, None);
    assert!(c.activated.is_empty());
    assert_eq!(c.stages, vec![Stage::LineageGate]);
}

#[test]
fn full_route_visits_every_layer() {
    let c = classify(&[("MDM2", 1.0), ("CDK4", 1.0)]);
    assert_eq!(
        c.stages,
        vec![Stage::LineageGate, Stage::LineageClassification, Stage::Dispatch]
    );
}
