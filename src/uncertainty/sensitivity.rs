use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnosis::DiagnosisLabel;
use crate::distribution::Distribution;
use crate::error::DxResult;
use crate::inference::{BayesianIntegrator, IntegrationTerms};

/// Evidence channel feeding the posterior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Prior,
    Ihc,
    Morphology,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prior => write!(f, "prior"),
            Self::Ihc => write!(f, "ihc"),
            Self::Morphology => write!(f, "morphology"),
        }
    }
}

/// The single input entry whose perturbation moved the top label most.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityDriver {
    pub channel: Channel,
    pub label: DiagnosisLabel,
    /// Relative scale applied to the entry.
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    /// Name of the analyzer that produced the report.
    pub method: String,
    /// Largest absolute shift of posterior(top label).
    pub max_shift: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<SensitivityDriver>,
}

/// Everything an analyzer may use.
#[derive(Debug, Clone, Copy)]
pub struct SensitivityInput<'a> {
    pub integrator: &'a BayesianIntegrator<'a>,
    pub terms: &'a IntegrationTerms,
    pub posterior: &'a Distribution,
    /// Relative perturbation size.
    pub epsilon: f64,
}

/// Measures how much the top label's probability moves under small input
/// perturbations.
pub trait SensitivityAnalyzer: Send + Sync {
    /// Name of the analyzer (for audit/debugging).
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Implementations backed by an external service report failures as
    /// `DxError::Collaborator`.
    fn analyze(&self, input: &SensitivityInput<'_>) -> DxResult<SensitivityReport>;
}

/// One-at-a-time finite differences.
///
/// Every entry of the prior and of both likelihood vectors is scaled by
/// `1 - epsilon` and `1 + epsilon` in turn and the posterior recomputed.
/// Likelihood entries missing from a vector are perturbed from their floor.
/// Perturbations that make the evidence degenerate are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct FiniteDifferenceSensitivity;

impl FiniteDifferenceSensitivity {
    fn perturbed(
        terms: &IntegrationTerms,
        channel: Channel,
        label: &DiagnosisLabel,
        factor: f64,
        floors: (f64, f64),
    ) -> IntegrationTerms {
        let mut out = terms.clone();
        let (dist, floor) = match channel {
            Channel::Prior => (&mut out.prior, 0.0),
            Channel::Ihc => (&mut out.ihc, floors.0),
            Channel::Morphology => (&mut out.morphology, floors.1),
        };
        *dist = dist.scaled(label, factor, floor);
        out
    }
}

impl SensitivityAnalyzer for FiniteDifferenceSensitivity {
    fn name(&self) -> &str {
        "finite_difference"
    }

    fn analyze(&self, input: &SensitivityInput<'_>) -> DxResult<SensitivityReport> {
        let mut report = SensitivityReport {
            method: self.name().to_string(),
            max_shift: 0.0,
            driver: None,
        };
        let Some((top, p_top)) = input.posterior.top() else {
            return Ok(report);
        };

        let floors = input.integrator.floors();
        for channel in [Channel::Prior, Channel::Ihc, Channel::Morphology] {
            for label in input.integrator.space().iter() {
                for factor in [1.0 - input.epsilon, 1.0 + input.epsilon] {
                    let terms = Self::perturbed(input.terms, channel, label, factor, floors);
                    let Ok(posterior) = input.integrator.integrate_terms(&terms) else {
                        continue;
                    };
                    let shift = (posterior.get_or(top, 0.0) - p_top).abs();
                    if shift > report.max_shift {
                        report.max_shift = shift;
                        report.driver = Some(SensitivityDriver {
                            channel,
                            label: label.clone(),
                            factor,
                        });
                    }
                }
            }
        }
        Ok(report)
    }
}
