use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::IntegratorConfig;
use crate::diagnosis::DiagnosisSpace;
use crate::distribution::Distribution;
use crate::error::{DxError, DxResult};

/// The three factors of a posterior, kept together so they can be
/// re-integrated under perturbation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationTerms {
    pub prior: Distribution,
    pub ihc: Distribution,
    pub morphology: Distribution,
}

/// Fuses prior x IHC likelihood x morphology likelihood.
#[derive(Debug, Clone, Copy)]
pub struct BayesianIntegrator<'a> {
    space: &'a DiagnosisSpace,
    config: IntegratorConfig,
}

impl<'a> BayesianIntegrator<'a> {
    #[must_use]
    pub const fn new(space: &'a DiagnosisSpace, config: IntegratorConfig) -> Self {
        Self { space, config }
    }

    #[must_use]
    pub const fn space(&self) -> &'a DiagnosisSpace {
        self.space
    }

    /// `(ihc_floor, morphology_floor)`.
    #[must_use]
    pub const fn floors(&self) -> (f64, f64) {
        (self.config.ihc_floor, self.config.morphology_floor)
    }

    /// Normalized posterior over the diagnosis space.
    ///
    /// Labels missing from a likelihood vector take the configured floor;
    /// labels missing from the prior count as zero.
    ///
    /// # Errors
    ///
    /// Returns `DxError::DegenerateEvidence` if every unnormalized product is
    /// zero.
    pub fn integrate(
        &self,
        prior: &Distribution,
        likelihood_ihc: &Distribution,
        likelihood_morph: &Distribution,
    ) -> DxResult<Distribution> {
        let unnormalized: Distribution = self
            .space
            .iter()
            .map(|label| {
                let joint = likelihood_ihc.get_or(label, self.config.ihc_floor)
                    * likelihood_morph.get_or(label, self.config.morphology_floor);
                (label.clone(), prior.get_or(label, 0.0) * joint)
            })
            .collect();

        let Some(posterior) = unnormalized.normalized() else {
            warn!(labels = self.space.len(), "evidence contradicts the entire diagnosis space");
            return Err(DxError::DegenerateEvidence {
                labels: self.space.len(),
            });
        };
        debug!(top = ?posterior.top(), "posterior integrated");
        Ok(posterior)
    }

    /// [`integrate`](Self::integrate) over bundled terms.
    ///
    /// # Errors
    ///
    /// Same as [`integrate`](Self::integrate).
    pub fn integrate_terms(&self, terms: &IntegrationTerms) -> DxResult<Distribution> {
        self.integrate(&terms.prior, &terms.ihc, &terms.morphology)
    }
}
