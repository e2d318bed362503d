use std::sync::Arc;
use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use dxfusion::{
    AnatomicSite, AtypiaGrade, BatchConfig, BatchRunner, CaseData, CellType, ClinicalFeatures,
    DiagnosisEngine, EngineConfig, IhcPanel, MorphologyFeatures, Sex,
};

fn heterologous_case(age: f64) -> CaseData<MorphologyFeatures> {
    CaseData::new(
        ClinicalFeatures::new(age, Sex::Male, AnatomicSite::DeepThigh, 20.0).unwrap(),
        MorphologyFeatures::new(CellType::Spindle, AtypiaGrade::High),
        IhcPanel::from_scores([
            ("MDM2", 1.0),
            ("CDK4", 0.3),
            ("Myoglobin", 1.0),
            ("Myogenin", 0.0),
            ("Desmin", 0.0),
        ])
        .unwrap(),
    )
}

fn bench_single_case(c: &mut Criterion) {
    let engine = DiagnosisEngine::with_config(EngineConfig::default()).unwrap();
    let case = heterologous_case(59.0);

    let mut group = c.benchmark_group("diagnose");
    group.throughput(Throughput::Elements(1));
    group.bench_function("single_case", |b| {
        b.iter(|| engine.diagnose(black_box(&case)).unwrap());
    });

    // Bootstrap dominates; measure the pipeline with a token resample count.
    let mut config = EngineConfig::default();
    config.uncertainty.bootstrap.resamples = 10;
    let engine = DiagnosisEngine::with_config(config).unwrap();
    group.bench_function("single_case_light_bootstrap", |b| {
        b.iter(|| engine.diagnose(black_box(&case)).unwrap());
    });
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let engine = Arc::new(DiagnosisEngine::with_config(EngineConfig::default()).unwrap());
    let runner = BatchRunner::start(engine, BatchConfig::default()).unwrap();

    let mut group = c.benchmark_group("batch");
    group.throughput(Throughput::Elements(64));
    group.bench_function("64_cases", |b| {
        b.iter_custom(|iters| {
            // Case construction stays outside the timed region.
            let batches: Vec<Vec<_>> = (0..iters)
                .map(|_| (0..64u32).map(|i| heterologous_case(30.0 + f64::from(i))).collect())
                .collect();
            let start = Instant::now();
            for cases in batches {
                runner.run(cases).unwrap();
            }
            start.elapsed()
        });
    });
    group.finish();
}

criterion_group!(diagnose, bench_single_case, bench_batch);
criterion_main!(diagnose);
