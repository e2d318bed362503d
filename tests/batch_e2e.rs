use std::sync::Arc;

use dxfusion::{
    AnatomicSite, AtypiaGrade, BatchConfig, BatchRunner, CaseData, CellType, ClinicalFeatures,
    DiagnosisEngine, EngineConfig, FinalDiagnosis, IhcPanel, MorphologyFeatures, Sex,
};

fn case(scores: &[(&str, f64)], cell_type: CellType) -> CaseData<MorphologyFeatures> {
    CaseData::new(
        ClinicalFeatures::new(45.0, Sex::Female, AnatomicSite::Retroperitoneum, 12.0).unwrap(),
        MorphologyFeatures::new(cell_type, AtypiaGrade::High),
        IhcPanel::from_scores(scores.iter().copied()).unwrap(),
    )
}

#[test]
fn mixed_batch_matches_sequential_runs() {
    let engine = Arc::new(DiagnosisEngine::with_config(EngineConfig::default()).unwrap());
    let runner = BatchRunner::start(
        Arc::clone(&engine),
        BatchConfig {
            workers: 4,
            queue_capacity: 8,
        },
    )
    .unwrap();

    let cases = vec![
        case(&[("MDM2", 1.0), ("CDK4", 0.3), ("Myoglobin", 1.0)], CellType::Spindle),
        case(
            &[("MDM2", 1.0), ("CDK4", 0.3), ("Myoglobin", 1.0), ("Myogenin", 1.0)],
            CellType::Spindle,
        ),
        case(&[("CK", 1.0)], CellType::Epithelioid),
        case(&[("MyoD1", 1.0), ("Myogenin", 1.0), ("Desmin", 1.0)], CellType::RoundCell),
        case(&[("SMA", 1.0)], CellType::Spindle),
    ];
    let expected: Vec<_> = cases.iter().map(|c| engine.diagnose(c).unwrap()).collect();

    let results = runner.run(cases).unwrap();
    assert_eq!(results.len(), expected.len());
    for (got, want) in results.into_iter().zip(expected) {
        assert_eq!(got.unwrap(), want);
    }
}

#[test]
fn repeated_batches_reuse_the_pool() {
    let engine = Arc::new(DiagnosisEngine::with_config(EngineConfig::default()).unwrap());
    let runner = BatchRunner::start(engine, BatchConfig::default()).unwrap();

    for round in 0..3u32 {
        let cases: Vec<_> = (0..10)
            .map(|_| case(&[("MDM2", 1.0), ("CDK4", 1.0)], CellType::Spindle))
            .collect();
        let results = runner.run(cases).unwrap();
        let confirmed = results.iter().all(|r| {
            r.as_ref().is_ok_and(|report| {
                matches!(report.final_diagnosis, FinalDiagnosis::Confirmed { .. })
            })
        });
        assert!(confirmed, "round {round}");
    }
}
