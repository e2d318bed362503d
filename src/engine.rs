//! Diagnosis orchestration.
//!
//! [`DiagnosisEngine::diagnose`] extracts morphology features and hands the
//! assembled [`EvidenceModel`] to [`DiagnosisEngine::diagnose_evidence`],
//! which threads it through the pipeline: prior, lineage pathway, morphology
//! scoring, Bayesian fusion, conflict resolution and uncertainty. Every
//! intermediate value is owned by the call; the only shared state is the
//! configuration snapshot taken when fusion starts.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ConfigHandle, EngineConfig};
use crate::distribution::Distribution;
use crate::error::DxResult;
use crate::evidence::{CaseData, CaseId, EvidenceModel, IhcPanel, MolecularFindings};
use crate::inference::{BayesianIntegrator, ConflictResolver, EvidenceView, IntegrationTerms};
use crate::morphology::{HistologyExtractor, MorphologyScorer, PrecomputedFeatures};
use crate::pathway::{
    Classification, LineagePathway, PathwayOutcome, RhabdomyosarcomaFinding, SubPathway,
    FISH_FOLLOW_UP,
};
use crate::prior::PriorEstimator;
use crate::report::{DiagnosticReport, Subtype};
use crate::uncertainty::{
    FiniteDifferenceSensitivity, SensitivityAnalyzer, UncertaintyQuantifier,
};

const DISCORDANT_AMPLICON_FOLLOW_UP: &str = "MDM2/CDK4 discordant; FISH for MDM2 amplification";

/// External rhabdomyosarcoma subtyping.
///
/// Called only after a positive rhabdomyosarcoma match. The result is
/// reported but never feeds back into the posterior.
pub trait SubtypingService: Send + Sync {
    /// Name of the service (for audit/debugging).
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Implementations report failures as `DxError::Collaborator`.
    fn subtype(&self, ihc: &IhcPanel) -> DxResult<String>;
}

/// The diagnosis orchestrator.
pub struct DiagnosisEngine<E: HistologyExtractor> {
    config: Arc<ConfigHandle>,
    extractor: E,
    subtyper: Option<Box<dyn SubtypingService>>,
    sensitivity: Box<dyn SensitivityAnalyzer>,
}

impl DiagnosisEngine<PrecomputedFeatures> {
    /// Engine over pre-extracted morphology features.
    ///
    /// # Errors
    ///
    /// Returns `DxError::Configuration` if `config` is invalid.
    pub fn with_config(config: EngineConfig) -> DxResult<Self> {
        Ok(Self::new(Arc::new(ConfigHandle::new(config)?), PrecomputedFeatures))
    }
}

impl<E: HistologyExtractor> DiagnosisEngine<E> {
    #[must_use]
    pub fn new(config: Arc<ConfigHandle>, extractor: E) -> Self {
        Self {
            config,
            extractor,
            subtyper: None,
            sensitivity: Box::new(FiniteDifferenceSensitivity),
        }
    }

    #[must_use]
    pub fn with_subtyping(mut self, service: impl SubtypingService + 'static) -> Self {
        self.subtyper = Some(Box::new(service));
        self
    }

    #[must_use]
    pub fn with_sensitivity(mut self, analyzer: impl SensitivityAnalyzer + 'static) -> Self {
        self.sensitivity = Box::new(analyzer);
        self
    }

    /// Shared configuration handle; replace through it to reconfigure.
    #[must_use]
    pub fn config(&self) -> &Arc<ConfigHandle> {
        &self.config
    }

    /// Evaluates one case.
    ///
    /// # Errors
    ///
    /// - `DxError::Configuration` if the active tables do not cover the case
    /// - `DxError::DegenerateEvidence` if the evidence rules out every label
    /// - `DxError::Collaborator` if the extractor, subtyping service or
    ///   sensitivity analyzer fails
    pub fn diagnose(&self, case: &CaseData<E::Input>) -> DxResult<DiagnosticReport> {
        let morphology = self.extractor.extract(&case.histology).inspect_err(|err| {
            warn!(extractor = self.extractor.name(), error = %err, "feature extraction failed");
        })?;
        let evidence = EvidenceModel {
            clinical: case.clinical.clone(),
            morphology,
            ihc: case.ihc.clone(),
            molecular: case.molecular,
        };
        self.diagnose_evidence(case.case_id, &evidence)
    }

    /// Evaluates evidence whose morphology features are already extracted.
    ///
    /// # Errors
    ///
    /// Same as [`diagnose`](Self::diagnose), minus extractor failures.
    pub fn diagnose_evidence(
        &self,
        case_id: CaseId,
        evidence: &EvidenceModel,
    ) -> DxResult<DiagnosticReport> {
        let active = self.config.snapshot();
        let config = &active.config;
        let space = &config.diagnosis_space;

        let prior = PriorEstimator::new(space, &config.prior).estimate_prior(&evidence.clinical)?;
        let classification = LineagePathway::new(config).classify(&evidence.ihc);
        let morphology =
            MorphologyScorer::new(space, &config.morphology).score(&evidence.morphology);

        // A sub-pathway that did not match contributes no IHC evidence; every
        // label then sits at the floor.
        let ihc = classification
            .result
            .as_ref()
            .map_or_else(Distribution::new, |r| r.likelihood.clone());
        let terms = IntegrationTerms {
            prior,
            ihc,
            morphology: morphology.likelihood.clone(),
        };
        let integrator = BayesianIntegrator::new(space, config.integrator);
        let posterior = integrator.integrate_terms(&terms)?;

        let view = EvidenceView {
            classification: &classification,
            morphology: &morphology,
            posterior: &posterior,
            molecular: &evidence.molecular,
        };
        let resolved = ConflictResolver::new(&config.labels, &config.conflicts).resolve(&view);
        let uncertainty =
            UncertaintyQuantifier::new(&config.uncertainty, integrator, &*self.sensitivity)
                .quantify(&posterior, &terms)?;
        let subtype = self.subtype(&classification, &evidence.ihc)?;
        let (notes, follow_up) = annotations(&classification, &evidence.molecular);

        debug!(
            case_id = %case_id,
            reactive = ?evidence.ihc.reactive_markers(),
            posterior = ?posterior.ranked(),
            conflicts = resolved.conflicts.len(),
            "case evidence fused"
        );
        info!(
            case_id = %case_id,
            diagnosis = %resolved.final_diagnosis,
            confidence = resolved.confidence.value(),
            tier = ?uncertainty.recommendation_tier,
            decision = ?uncertainty.decision,
            "case diagnosed"
        );

        Ok(DiagnosticReport {
            case_id,
            final_diagnosis: resolved.final_diagnosis,
            confidence: resolved.confidence,
            entropy: uncertainty.entropy,
            confidence_interval: uncertainty.confidence_interval,
            sensitivity: uncertainty.sensitivity,
            recommendation_tier: uncertainty.recommendation_tier,
            decision: uncertainty.decision,
            applied_resolutions: resolved.applied_resolutions,
            conflicts: resolved.conflicts,
            pathway: classification.result.as_ref().map(|r| r.outcome),
            activated_lineages: classification.activated,
            notes,
            follow_up,
            subtype,
            posterior,
            config_fingerprint: active.fingerprint.clone(),
            config_version: active.version,
        })
    }

    fn subtype(
        &self,
        classification: &Classification,
        ihc: &IhcPanel,
    ) -> DxResult<Option<Subtype>> {
        let positive = classification.result.as_ref().map(|r| r.outcome)
            == Some(PathwayOutcome::Rhabdomyosarcoma(RhabdomyosarcomaFinding::Positive));
        let Some(service) = self.subtyper.as_ref().filter(|_| positive) else {
            return Ok(None);
        };
        let label = service
            .subtype(ihc)
            .inspect_err(|err| warn!(service = service.name(), error = %err, "subtyping failed"))?;
        Ok(Some(Subtype {
            service: service.name().to_string(),
            label,
        }))
    }
}

fn annotations(
    classification: &Classification,
    molecular: &MolecularFindings,
) -> (Vec<String>, Vec<String>) {
    let (mut notes, mut follow_up) = match (&classification.result, classification.sub_pathway) {
        (Some(result), _) => (result.notes.iter().cloned().collect(), result.follow_up.clone()),
        (None, Some(SubPathway::Liposarcoma)) => (
            vec![
                "adipocytic lineage without joint MDM2/CDK4 reactivity; \
                 liposarcoma sub-pathway not matched"
                    .to_string(),
            ],
            vec![DISCORDANT_AMPLICON_FOLLOW_UP.to_string()],
        ),
        (None, sub) => (
            vec![format!(
                "{} sub-pathway not matched",
                sub.map_or_else(|| "lineage".to_string(), |s| s.to_string())
            )],
            Vec::new(),
        ),
    };

    // A reported FISH result already answers the amplification question.
    if let Some(amplified) = molecular.mdm2_amplified {
        follow_up.retain(|f| f != FISH_FOLLOW_UP && f != DISCORDANT_AMPLICON_FOLLOW_UP);
        notes.push(format!(
            "MDM2 FISH: {}",
            if amplified { "amplified" } else { "not amplified" }
        ));
    }
    (notes, follow_up)
}
