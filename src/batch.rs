//! Parallel evaluation of independent cases.
//!
//! Cases share nothing but the engine's configuration snapshot, so a batch is
//! fanned out over a fixed pool of worker threads fed through a bounded
//! queue. Results come back in submission order and a failing case never
//! affects the others.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::DiagnosisEngine;
use crate::error::{DxError, DxResult};
use crate::evidence::CaseData;
use crate::morphology::HistologyExtractor;
use crate::report::DiagnosticReport;

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    /// Maximum queued cases; submission blocks when full.
    pub queue_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
        }
    }
}

type Reply = (usize, DxResult<DiagnosticReport>);

struct Job<H> {
    index: usize,
    case: CaseData<H>,
    reply: Sender<Reply>,
}

/// Fixed pool of diagnosis workers.
pub struct BatchRunner<E: HistologyExtractor> {
    engine: Arc<DiagnosisEngine<E>>,
    tx: Option<Sender<Job<E::Input>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<E> BatchRunner<E>
where
    E: HistologyExtractor + 'static,
    E::Input: Send + 'static,
{
    /// Spawns the workers.
    ///
    /// # Errors
    ///
    /// Returns `DxError::Internal` if a worker thread cannot be spawned.
    pub fn start(engine: Arc<DiagnosisEngine<E>>, config: BatchConfig) -> DxResult<Self> {
        let workers = config.workers.max(1);
        let (tx, rx) = bounded::<Job<E::Input>>(config.queue_capacity.max(1));

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job<E::Input>> = rx.clone();
            let engine = Arc::clone(&engine);
            let handle = thread::Builder::new()
                .name(format!("dxfusion-batch-{idx}"))
                .spawn(move || {
                    for job in rx {
                        let result = engine.diagnose(&job.case);
                        let _ = job.reply.send((job.index, result));
                    }
                })
                .map_err(|e| DxError::internal(format!("failed to spawn batch worker: {e}")))?;
            handles.push(handle);
        }
        debug!(workers, "batch pool started");

        Ok(Self {
            engine,
            tx: Some(tx),
            workers: handles,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<DiagnosisEngine<E>> {
        &self.engine
    }

    /// Diagnoses every case; `result[i]` belongs to `cases[i]`.
    ///
    /// # Errors
    ///
    /// The outer error is returned only if the pool is gone. Per-case
    /// failures are reported in the inner results.
    pub fn run(&self, cases: Vec<CaseData<E::Input>>) -> DxResult<Vec<DxResult<DiagnosticReport>>> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| DxError::internal("batch pool is shut down"))?;
        let total = cases.len();
        // Sized so workers never block on reply.
        let (reply_tx, reply_rx) = bounded::<Reply>(total.max(1));

        for (index, case) in cases.into_iter().enumerate() {
            tx.send(Job {
                index,
                case,
                reply: reply_tx.clone(),
            })
            .map_err(|_| DxError::internal("batch workers disconnected"))?;
        }
        drop(reply_tx);

        let mut slots: Vec<Option<DxResult<DiagnosticReport>>> = (0..total).map(|_| None).collect();
        for (index, result) in reply_rx {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(result);
            }
        }

        let results: Vec<_> = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(DxError::internal("worker exited before replying")))
            })
            .collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(total, failed, "batch complete");
        Ok(results)
    }
}

impl<E: HistologyExtractor> Drop for BatchRunner<E> {
    fn drop(&mut self) {
        // Closing the queue lets workers drain and exit.
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigHandle, EngineConfig};
    use crate::evidence::{
        AnatomicSite, AtypiaGrade, CellType, ClinicalFeatures, IhcPanel, MorphologyFeatures, Sex,
    };

    /// Fails when no features were supplied.
    struct OptionalFeatures;

    impl HistologyExtractor for OptionalFeatures {
        type Input = Option<MorphologyFeatures>;

        fn name(&self) -> &str {
            "optional"
        }

        fn extract(&self, input: &Self::Input) -> DxResult<MorphologyFeatures> {
            input
                .clone()
                .ok_or_else(|| DxError::collaborator("optional", "no features"))
        }
    }

    fn case(
        age: f64,
        features: Option<MorphologyFeatures>,
    ) -> CaseData<Option<MorphologyFeatures>> {
        CaseData::new(
            ClinicalFeatures::new(age, Sex::Unknown, AnatomicSite::Trunk, 5.0).unwrap(),
            features,
            IhcPanel::from_scores([("MDM2", 1.0), ("CDK4", 1.0)]).unwrap(),
        )
    }

    fn runner(workers: usize) -> BatchRunner<OptionalFeatures> {
        let handle = Arc::new(ConfigHandle::new(EngineConfig::default()).unwrap());
        let engine = Arc::new(DiagnosisEngine::new(handle, OptionalFeatures));
        BatchRunner::start(
            engine,
            BatchConfig {
                workers,
                queue_capacity: 2,
            },
        )
        .unwrap()
    }

    #[test]
    fn results_keep_submission_order() {
        let runner = runner(3);
        let features = MorphologyFeatures::new(CellType::Spindle, AtypiaGrade::High);
        let cases: Vec<_> = (0..20u32)
            .map(|i| case(20.0 + f64::from(i), Some(features.clone())))
            .collect();
        let ids: Vec<_> = cases.iter().map(|c| c.case_id).collect();

        let results = runner.run(cases).unwrap();
        assert_eq!(results.len(), 20);
        for (id, result) in ids.iter().zip(&results) {
            assert_eq!(&result.as_ref().unwrap().case_id, id);
        }
    }

    #[test]
    fn failing_case_is_isolated() {
        let runner = runner(2);
        let features = MorphologyFeatures::new(CellType::Spindle, AtypiaGrade::High);
        let results = runner
            .run(vec![
                case(40.0, Some(features.clone())),
                case(41.0, None),
                case(42.0, Some(features)),
            ])
            .unwrap();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(DxError::Collaborator { .. })));
        assert!(results[2].is_ok());
    }

    #[test]
    fn empty_batch() {
        assert!(runner(1).run(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn matches_sequential_diagnosis() {
        let runner = runner(2);
        let c = case(60.0, Some(MorphologyFeatures::new(CellType::Pleomorphic, AtypiaGrade::High)));
        let sequential = runner.engine().diagnose(&c).unwrap();
        let parallel = runner.run(vec![c]).unwrap().pop().unwrap().unwrap();
        assert_eq!(sequential, parallel);
    }
}
