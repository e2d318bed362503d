//! Uncertainty quantification over a fused posterior.
//!
//! Entropy drives the recommendation tier; the top posterior probability
//! drives the [`PosteriorDecision`]. The confidence interval comes from a
//! seeded bootstrap and the sensitivity measure from a pluggable
//! [`SensitivityAnalyzer`].

mod bootstrap;
mod sensitivity;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DecisionThresholds, UncertaintyConfig};
use crate::distribution::Distribution;
use crate::error::DxResult;
use crate::inference::{BayesianIntegrator, IntegrationTerms};

pub use bootstrap::{bootstrap_interval, ConfidenceInterval};
pub use sensitivity::{
    Channel, FiniteDifferenceSensitivity, SensitivityAnalyzer, SensitivityDriver, SensitivityInput,
    SensitivityReport,
};

/// Three-way recommendation derived from posterior entropy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTier {
    Reliable,
    MolecularConfirmation,
    MultidisciplinaryReview,
}

impl RecommendationTier {
    /// Tier for an entropy value under the configured thresholds.
    #[must_use]
    pub fn from_entropy(entropy: f64, config: &UncertaintyConfig) -> Self {
        if entropy < config.reliable_below {
            Self::Reliable
        } else if entropy < config.review_at_or_above {
            Self::MolecularConfirmation
        } else {
            Self::MultidisciplinaryReview
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Reliable => "diagnosis reliable, recommend clinical correlation",
            Self::MolecularConfirmation => "recommend molecular confirmation",
            Self::MultidisciplinaryReview => "recommend multidisciplinary review",
        }
    }
}

impl fmt::Display for RecommendationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// What the top posterior probability licenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosteriorDecision {
    /// Top label above `established_above`.
    Established,
    /// Above `molecular_testing_above` but not established.
    MolecularTesting,
    Reevaluate,
}

impl PosteriorDecision {
    /// Decision for the top label's posterior probability.
    #[must_use]
    pub fn from_top_probability(p_top: f64, thresholds: &DecisionThresholds) -> Self {
        if p_top > thresholds.established_above {
            Self::Established
        } else if p_top > thresholds.molecular_testing_above {
            Self::MolecularTesting
        } else {
            Self::Reevaluate
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Established => "diagnosis established",
            Self::MolecularTesting => "recommend molecular testing",
            Self::Reevaluate => "re-evaluate the case",
        }
    }
}

impl fmt::Display for PosteriorDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyAssessment {
    /// Shannon entropy in bits.
    pub entropy: f64,
    pub confidence_interval: ConfidenceInterval,
    pub sensitivity: SensitivityReport,
    pub recommendation_tier: RecommendationTier,
    pub decision: PosteriorDecision,
}

pub struct UncertaintyQuantifier<'a> {
    config: &'a UncertaintyConfig,
    integrator: BayesianIntegrator<'a>,
    sensitivity: &'a dyn SensitivityAnalyzer,
}

impl<'a> UncertaintyQuantifier<'a> {
    #[must_use]
    pub fn new(
        config: &'a UncertaintyConfig,
        integrator: BayesianIntegrator<'a>,
        sensitivity: &'a dyn SensitivityAnalyzer,
    ) -> Self {
        Self {
            config,
            integrator,
            sensitivity,
        }
    }

    /// Entropy, interval, sensitivity, tier and decision for a posterior.
    ///
    /// `terms` must be the factors `posterior` was integrated from.
    ///
    /// # Errors
    ///
    /// Propagates the sensitivity analyzer's error.
    pub fn quantify(
        &self,
        posterior: &Distribution,
        terms: &IntegrationTerms,
    ) -> DxResult<UncertaintyAssessment> {
        let entropy = posterior.entropy();
        let confidence_interval = bootstrap_interval(posterior, &self.config.bootstrap);
        let sensitivity = self.sensitivity.analyze(&SensitivityInput {
            integrator: &self.integrator,
            terms,
            posterior,
            epsilon: self.config.sensitivity_epsilon,
        })?;
        let recommendation_tier = RecommendationTier::from_entropy(entropy, self.config);
        let p_top = posterior.top().map_or(0.0, |(_, p)| p);
        let decision = PosteriorDecision::from_top_probability(p_top, &self.config.decision);

        debug!(
            entropy,
            ci_low = confidence_interval.low,
            ci_high = confidence_interval.high,
            max_shift = sensitivity.max_shift,
            tier = ?recommendation_tier,
            ?decision,
            "uncertainty quantified"
        );

        Ok(UncertaintyAssessment {
            entropy,
            confidence_interval,
            sensitivity,
            recommendation_tier,
            decision,
        })
    }
}
