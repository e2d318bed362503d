//! # dxfusion - evidence fusion for soft-tissue sarcoma diagnosis
//!
//! dxfusion turns three independent evidence channels for one case into a
//! single, auditable diagnostic report:
//!
//! - **Clinical**: age band, anatomic site and tumour size set the prior.
//! - **Immunohistochemistry**: a layered lineage decision tree produces a
//!   pathway outcome and its likelihood profile.
//! - **Morphology**: extracted histology features produce a candidate set.
//!
//! The channels are fused by Bayes' rule, contradictions between them are
//! resolved by an ordered catalog of explicit policies, and the posterior is
//! annotated with entropy, a bootstrap interval, a sensitivity measure and a
//! recommendation tier.
//!
//! ## Usage
//!
//! ```rust
//! use dxfusion::{
//!     AnatomicSite, AtypiaGrade, CaseData, CellType, ClinicalFeatures, DiagnosisEngine,
//!     EngineConfig, IhcPanel, MorphologyFeatures, Sex,
//! };
//!
//! let engine = DiagnosisEngine::with_config(EngineConfig::default())?;
//! let case = CaseData::new(
//!     ClinicalFeatures::new(59.0, Sex::Male, AnatomicSite::DeepThigh, 20.0)?,
//!     MorphologyFeatures::new(CellType::Spindle, AtypiaGrade::High),
//!     IhcPanel::from_scores([("MDM2", 1.0), ("CDK4", 0.3), ("Myoglobin", 1.0)])?,
//! );
//! let report = engine.diagnose(&case)?;
//! assert_eq!(report.final_diagnosis.primary_label().as_str(), "DDLPS");
//! # Ok::<(), dxfusion::DxError>(())
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

// Core types
pub mod confidence;
pub mod conflict;
pub mod diagnosis;
pub mod distribution;
pub mod error;
pub mod evidence;
pub mod report;

// Configuration
pub mod config;

// Evidence channels
pub mod morphology;
pub mod pathway;
pub mod prior;

// Fusion, resolution and uncertainty
pub mod inference;
pub mod uncertainty;

// Orchestration
pub mod batch;
pub mod engine;

// Re-export primary types at crate root for convenience
pub use batch::{BatchConfig, BatchRunner};
pub use confidence::Confidence;
pub use config::{ActiveConfig, ConfigHandle, EngineConfig};
pub use conflict::{Conflict, ConflictKind, EvidenceKey, Resolution, ResolutionPriority};
pub use diagnosis::{DiagnosisLabel, DiagnosisSpace};
pub use distribution::Distribution;
pub use engine::{DiagnosisEngine, SubtypingService};
pub use error::{ConfigurationError, DxError, DxResult, ValidationError};
pub use evidence::{
    AnatomicSite, AtypiaGrade, CaseData, CaseId, CellType, ClinicalFeatures, EvidenceModel,
    IhcPanel, MolecularFindings, MorphologyFeatures, Sex,
};
pub use inference::{BayesianIntegrator, ConflictResolver, IntegrationTerms, ResolvedDiagnosis};
pub use morphology::{
    HistologyExtractor, MorphologyAssessment, MorphologyScorer, PrecomputedFeatures,
};
pub use pathway::{Classification, LineagePathway, PathwayOutcome, PathwayResult, SubPathway};
pub use prior::{PriorAdjustment, PriorEstimator};
pub use report::{DiagnosticReport, FinalDiagnosis, Subtype};
pub use uncertainty::{
    ConfidenceInterval, FiniteDifferenceSensitivity, PosteriorDecision, RecommendationTier,
    SensitivityAnalyzer, SensitivityReport, UncertaintyAssessment, UncertaintyQuantifier,
};
