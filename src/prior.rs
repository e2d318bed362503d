//! Prior distribution from clinical features.
//!
//! Base priors come from an age-band table. Site and size adjustments are
//! per-label multipliers applied to the base table; since they only
//! multiply, the order in which they are applied does not matter.

use tracing::debug;

use crate::config::{AgeBand, PriorConfig};
use crate::diagnosis::DiagnosisSpace;
use crate::distribution::Distribution;
use crate::error::{ConfigurationError, DxError, DxResult};
use crate::evidence::ClinicalFeatures;

/// A multiplicative adjustment to the base prior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorAdjustment {
    /// The tumor sits at a site with elevated risk for some labels.
    HighRiskSite,
    /// The tumor exceeds the configured size threshold.
    LargeTumor,
}

impl PriorAdjustment {
    /// Returns true if this adjustment applies to the case.
    #[must_use]
    pub fn applies(self, clinical: &ClinicalFeatures, config: &PriorConfig) -> bool {
        match self {
            Self::HighRiskSite => config.high_risk_sites.contains(clinical.site()),
            Self::LargeTumor => clinical.size_cm() > config.size_threshold_cm,
        }
    }

    /// Multiplies the configured per-label factors into `dist`.
    #[must_use]
    pub fn apply(self, dist: &Distribution, config: &PriorConfig) -> Distribution {
        let factors = match self {
            Self::HighRiskSite => &config.site_factors,
            Self::LargeTumor => &config.size_factors,
        };
        dist.iter()
            .map(|(label, value)| {
                let factor = factors.get(label).copied().unwrap_or(1.0);
                (label.clone(), value * factor)
            })
            .collect()
    }
}

/// Computes a normalized prior over the diagnosis space.
#[derive(Debug, Clone, Copy)]
pub struct PriorEstimator<'a> {
    space: &'a DiagnosisSpace,
    config: &'a PriorConfig,
}

impl<'a> PriorEstimator<'a> {
    #[must_use]
    pub const fn new(space: &'a DiagnosisSpace, config: &'a PriorConfig) -> Self {
        Self { space, config }
    }

    fn band_for(&self, age: f64) -> Result<&'a AgeBand, ConfigurationError> {
        self.config
            .age_bands
            .iter()
            .find(|band| band.max_age.map_or(true, |max| age <= max))
            .ok_or(ConfigurationError::NoAgeBands)
    }

    /// Base prior restricted to the diagnosis space, before adjustments.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::MissingPriorEntry` if the selected band
    /// omits any label of the space.
    pub fn base_prior(
        &self,
        clinical: &ClinicalFeatures,
    ) -> Result<Distribution, ConfigurationError> {
        let band = self.band_for(clinical.age())?;
        let mut base = Distribution::new();
        for label in self.space.iter() {
            let value = band.base.get(label).ok_or_else(|| ConfigurationError::MissingPriorEntry {
                band: band.name.clone(),
                label: label.to_string(),
            })?;
            base.insert(label.clone(), value);
        }
        Ok(base)
    }

    /// Adjustments that apply to this case, in a fixed order.
    #[must_use]
    pub fn adjustments(&self, clinical: &ClinicalFeatures) -> Vec<PriorAdjustment> {
        [PriorAdjustment::HighRiskSite, PriorAdjustment::LargeTumor]
            .into_iter()
            .filter(|adj| adj.applies(clinical, self.config))
            .collect()
    }

    /// Applies adjustments in the given order (any order gives the same result).
    #[must_use]
    pub fn apply_adjustments(
        &self,
        base: &Distribution,
        adjustments: &[PriorAdjustment],
    ) -> Distribution {
        adjustments
            .iter()
            .fold(base.clone(), |dist, adj| adj.apply(&dist, self.config))
    }

    /// Normalized prior for a case.
    ///
    /// # Errors
    ///
    /// - `DxError::Configuration` if the prior table does not cover the space.
    /// - `DxError::DegenerateEvidence` if every adjusted prior is zero.
    pub fn estimate_prior(&self, clinical: &ClinicalFeatures) -> DxResult<Distribution> {
        let base = self.base_prior(clinical)?;
        let adjustments = self.adjustments(clinical);
        let adjusted = self.apply_adjustments(&base, &adjustments);
        let prior = adjusted.normalized().ok_or(DxError::DegenerateEvidence {
            labels: self.space.len(),
        })?;
        debug!(?adjustments, top = ?prior.top(), "prior estimated");
        Ok(prior)
    }
}
