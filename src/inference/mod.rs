//! Inference layer.
//!
//! Bayesian fusion of the evidence channels, and reproducible conflict
//! resolution on top of the fused posterior. Detection rules and their
//! resolution policies are pure functions; the resolver folds them over a
//! baseline diagnosis.

mod integrator;
mod policies;
mod resolver;

pub use integrator::{BayesianIntegrator, IntegrationTerms};
pub use policies::{detect_conflicts, resolution_for, Detector, EvidenceView, CATALOG};
pub use resolver::{ConflictResolver, ResolvedDiagnosis};
