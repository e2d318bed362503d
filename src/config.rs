//! Engine configuration.
//!
//! Every prior, likelihood, marker table and threshold is configuration.
//! A configuration is validated against its own diagnosis space before it
//! can be used, loaded once at startup, and treated as read-only after that.
//! [`ConfigHandle`] swaps whole snapshots so a running case never observes a
//! half-updated configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diagnosis::{DiagnosisLabel, DiagnosisSpace};
use crate::distribution::Distribution;
use crate::error::{ConfigurationError, DxResult};
use crate::evidence::{AnatomicSite, AtypiaGrade, CellType};

/// Lineage name for adipocytic differentiation.
pub const ADIPOCYTIC: &str = "adipocytic";
/// Lineage name for skeletal muscle differentiation.
pub const SKELETAL_MUSCLE: &str = "skeletal_muscle";
/// Lineage name for smooth muscle differentiation.
pub const SMOOTH_MUSCLE: &str = "smooth_muscle";
/// Lineage name for neural / nerve sheath differentiation.
pub const NEURAL: &str = "neural";
/// Lineage name for vascular differentiation.
pub const VASCULAR: &str = "vascular";

/// Which diagnosis label each pathway leaf emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathwayLabels {
    pub liposarcoma: DiagnosisLabel,
    pub rhabdomyosarcoma: DiagnosisLabel,
    pub leiomyosarcoma: DiagnosisLabel,
    pub undifferentiated: DiagnosisLabel,
    pub other_sarcoma: DiagnosisLabel,
    /// Emitted by the epithelial leaf; deliberately outside the sarcoma space.
    pub epithelial: DiagnosisLabel,
}

impl Default for PathwayLabels {
    fn default() -> Self {
        Self {
            liposarcoma: DiagnosisLabel::DDLPS.into(),
            rhabdomyosarcoma: DiagnosisLabel::RMS.into(),
            leiomyosarcoma: DiagnosisLabel::LMS.into(),
            undifferentiated: DiagnosisLabel::UPS.into(),
            other_sarcoma: DiagnosisLabel::OTHER_SARCOMA.into(),
            epithelial: DiagnosisLabel::EPITHELIAL.into(),
        }
    }
}

/// Base priors for one age band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBand {
    pub name: String,
    /// Inclusive upper bound; `None` matches every remaining age.
    pub max_age: Option<f64>,
    pub base: Distribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    /// Evaluated in order; the first band whose `max_age` admits the age wins.
    pub age_bands: Vec<AgeBand>,
    pub high_risk_sites: Vec<AnatomicSite>,
    /// Per-label multiplier when the site is high-risk. Absent labels: 1.0.
    pub site_factors: BTreeMap<DiagnosisLabel, f64>,
    /// Strict lower bound for the size adjustment.
    pub size_threshold_cm: f64,
    /// Per-label multiplier for tumors above the threshold. Absent labels: 1.0.
    pub size_factors: BTreeMap<DiagnosisLabel, f64>,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            age_bands: vec![
                AgeBand {
                    name: "young".to_string(),
                    max_age: Some(50.0),
                    base: Distribution::from([
                        (DiagnosisLabel::DDLPS, 0.10),
                        (DiagnosisLabel::RMS, 0.15),
                        (DiagnosisLabel::UPS, 0.20),
                        (DiagnosisLabel::LMS, 0.20),
                        (DiagnosisLabel::OTHER_SARCOMA, 0.15),
                    ]),
                },
                AgeBand {
                    name: "adult".to_string(),
                    max_age: None,
                    base: Distribution::from([
                        (DiagnosisLabel::DDLPS, 0.35),
                        (DiagnosisLabel::RMS, 0.02),
                        (DiagnosisLabel::UPS, 0.30),
                        (DiagnosisLabel::LMS, 0.20),
                        (DiagnosisLabel::OTHER_SARCOMA, 0.10),
                    ]),
                },
            ],
            high_risk_sites: vec![AnatomicSite::DeepThigh, AnatomicSite::Retroperitoneum],
            site_factors: BTreeMap::from([(DiagnosisLabel::new(DiagnosisLabel::DDLPS), 2.0)]),
            size_threshold_cm: 15.0,
            size_factors: BTreeMap::from([(DiagnosisLabel::new(DiagnosisLabel::DDLPS), 1.5)]),
        }
    }
}

/// A lineage and the markers that activate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageRule {
    pub name: String,
    pub markers: Vec<String>,
}

impl LineageRule {
    fn new(name: &str, markers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            markers: markers.iter().map(|m| (*m).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    /// Any reactive marker here routes to the epithelial leaf.
    pub epithelial_markers: Vec<String>,
    /// Confidence assigned by the epithelial leaf. The sarcoma posterior
    /// says nothing about a non-mesenchymal call.
    pub epithelial_confidence: f64,
    pub lineages: Vec<LineageRule>,
    /// Dispatch precedence when several lineages activate together.
    pub precedence: Vec<String>,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            epithelial_markers: vec!["CK".to_string(), "EMA".to_string()],
            epithelial_confidence: 0.90,
            lineages: vec![
                LineageRule::new(SMOOTH_MUSCLE, &["SMA", "Desmin", "Caldesmon"]),
                LineageRule::new(SKELETAL_MUSCLE, &["Myogenin", "Desmin", "MyoD1"]),
                LineageRule::new(NEURAL, &["S100", "SOX10"]),
                LineageRule::new(VASCULAR, &["CD31", "ERG", "CD34"]),
                LineageRule::new(ADIPOCYTIC, &["MDM2", "CDK4"]),
            ],
            precedence: vec![ADIPOCYTIC.to_string(), SKELETAL_MUSCLE.to_string()],
        }
    }
}

/// IHC likelihood vectors, one per pathway outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LikelihoodProfiles {
    pub liposarcoma: Distribution,
    pub liposarcoma_heterologous: Distribution,
    pub collision: Distribution,
    pub rms_positive: Distribution,
    pub rms_excluded: Distribution,
    pub rms_uncertain: Distribution,
    pub smooth_muscle: Distribution,
    pub other_lineage: Distribution,
    pub undifferentiated: Distribution,
    /// Near-zero for every sarcoma label.
    pub epithelial: Distribution,
}

impl LikelihoodProfiles {
    fn profile(ddlps: f64, rms: f64, ups: f64, lms: f64, other: f64) -> Distribution {
        Distribution::from([
            (DiagnosisLabel::DDLPS, ddlps),
            (DiagnosisLabel::RMS, rms),
            (DiagnosisLabel::UPS, ups),
            (DiagnosisLabel::LMS, lms),
            (DiagnosisLabel::OTHER_SARCOMA, other),
        ])
    }

    /// `(name, profile)` pairs, for validation and logging.
    #[must_use]
    pub fn named(&self) -> [(&'static str, &Distribution); 10] {
        [
            ("liposarcoma", &self.liposarcoma),
            ("liposarcoma_heterologous", &self.liposarcoma_heterologous),
            ("collision", &self.collision),
            ("rms_positive", &self.rms_positive),
            ("rms_excluded", &self.rms_excluded),
            ("rms_uncertain", &self.rms_uncertain),
            ("smooth_muscle", &self.smooth_muscle),
            ("other_lineage", &self.other_lineage),
            ("undifferentiated", &self.undifferentiated),
            ("epithelial", &self.epithelial),
        ]
    }
}

impl Default for LikelihoodProfiles {
    fn default() -> Self {
        Self {
            liposarcoma: Self::profile(0.92, 0.005, 0.03, 0.02, 0.03),
            liposarcoma_heterologous: Self::profile(0.80, 0.01, 0.02, 0.01, 0.02),
            collision: Self::profile(0.60, 0.50, 0.02, 0.02, 0.02),
            rms_positive: Self::profile(0.01, 0.90, 0.05, 0.05, 0.05),
            rms_excluded: Self::profile(0.30, 0.002, 0.30, 0.30, 0.30),
            rms_uncertain: Self::profile(0.10, 0.40, 0.20, 0.20, 0.20),
            smooth_muscle: Self::profile(0.05, 0.02, 0.20, 0.80, 0.10),
            other_lineage: Self::profile(0.05, 0.02, 0.20, 0.10, 0.80),
            undifferentiated: Self::profile(0.10, 0.02, 0.70, 0.10, 0.20),
            epithelial: Self::profile(0.001, 0.001, 0.001, 0.001, 0.001),
        }
    }
}

/// Maps a cell type and atypia grade to candidate diagnoses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphologyRule {
    pub cell_type: CellType,
    /// Grades this rule applies to; empty means any grade.
    #[serde(default)]
    pub atypia: Vec<AtypiaGrade>,
    pub candidates: Vec<DiagnosisLabel>,
}

impl MorphologyRule {
    fn new(cell_type: CellType, atypia: &[AtypiaGrade], candidates: &[&str]) -> Self {
        Self {
            cell_type,
            atypia: atypia.to_vec(),
            candidates: candidates.iter().map(|c| DiagnosisLabel::new(*c)).collect(),
        }
    }

    /// True if this rule covers the given features.
    #[must_use]
    pub fn matches(&self, cell_type: CellType, atypia: AtypiaGrade) -> bool {
        self.cell_type == cell_type && (self.atypia.is_empty() || self.atypia.contains(&atypia))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyConfig {
    /// First matching rule wins.
    pub rules: Vec<MorphologyRule>,
    pub candidate_likelihood: f64,
    /// Must stay above zero.
    pub non_candidate_likelihood: f64,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        use crate::diagnosis::DiagnosisLabel as L;
        Self {
            rules: vec![
                MorphologyRule::new(
                    CellType::Spindle,
                    &[AtypiaGrade::High],
                    &[L::DDLPS, L::UPS, L::LMS, L::MPNST],
                ),
                MorphologyRule::new(
                    CellType::Spindle,
                    &[AtypiaGrade::Low, AtypiaGrade::Intermediate],
                    &[L::WDLPS, L::FIBROMATOSIS],
                ),
                MorphologyRule::new(
                    CellType::Pleomorphic,
                    &[],
                    &[L::UPS, L::DDLPS, L::LMS, L::RMS],
                ),
                MorphologyRule::new(CellType::RoundCell, &[], &[L::RMS, L::OTHER_SARCOMA]),
                MorphologyRule::new(CellType::Epithelioid, &[], &[L::OTHER_SARCOMA]),
                MorphologyRule::new(CellType::Myxoid, &[], &[L::OTHER_SARCOMA, L::DDLPS]),
            ],
            candidate_likelihood: 0.9,
            non_candidate_likelihood: 0.1,
        }
    }
}

/// Floors used for labels missing from a likelihood vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub ihc_floor: f64,
    pub morphology_floor: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            ihc_floor: 0.01,
            morphology_floor: 0.5,
        }
    }
}

/// Parameters of the conflict catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Diagnoses associated with MDM2/CDK4 amplification.
    pub amplicon_labels: Vec<DiagnosisLabel>,
    pub molecular_delta: f64,
    /// Replaces `molecular_delta` when FISH confirmed MDM2 amplification.
    pub molecular_confirmed_delta: f64,
    /// Applied when FISH found no MDM2 amplification on an amplicon match.
    pub amplification_absent_delta: f64,
    pub heterologous_delta: f64,
    pub collision_delta: f64,
    pub indeterminate_delta: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            amplicon_labels: vec![DiagnosisLabel::DDLPS.into(), DiagnosisLabel::WDLPS.into()],
            molecular_delta: -0.05,
            molecular_confirmed_delta: 0.05,
            amplification_absent_delta: -0.40,
            heterologous_delta: 0.10,
            collision_delta: -0.15,
            indeterminate_delta: -0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub resamples: usize,
    /// Categorical draws per resample.
    pub sample_size: usize,
    /// Coverage of the interval, e.g. 0.95.
    pub level: f64,
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            resamples: 1000,
            sample_size: 200,
            level: 0.95,
            seed: 0x5EED_D1A6,
        }
    }
}

/// Posterior thresholds of the decision rule. Both comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionThresholds {
    /// Top posterior above this establishes the diagnosis.
    pub established_above: f64,
    /// Top posterior above this (but not `established_above`) calls for
    /// molecular testing; anything lower is re-evaluated.
    pub molecular_testing_above: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            established_above: 0.90,
            molecular_testing_above: 0.70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyConfig {
    /// Entropy strictly below this is "reliable".
    pub reliable_below: f64,
    /// Entropy at or above this goes to multidisciplinary review.
    pub review_at_or_above: f64,
    pub bootstrap: BootstrapConfig,
    /// Relative perturbation used by the sensitivity analysis.
    pub sensitivity_epsilon: f64,
    pub decision: DecisionThresholds,
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            reliable_below: 0.5,
            review_at_or_above: 1.5,
            bootstrap: BootstrapConfig::default(),
            sensitivity_epsilon: 0.10,
            decision: DecisionThresholds::default(),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub diagnosis_space: DiagnosisSpace,
    pub labels: PathwayLabels,
    pub prior: PriorConfig,
    pub lineage: LineageConfig,
    pub likelihoods: LikelihoodProfiles,
    pub morphology: MorphologyConfig,
    pub integrator: IntegratorConfig,
    pub conflicts: ConflictConfig,
    pub uncertainty: UncertaintyConfig,
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidParameter {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn check_factor(name: &str, value: f64) -> Result<(), ConfigurationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(name, format!("must be a finite non-negative number (got {value})")));
    }
    Ok(())
}

impl EngineConfig {
    /// Checks that every table covers the diagnosis space and every tunable
    /// is in range.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigurationError` found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let space = &self.diagnosis_space;

        let roles = [
            ("liposarcoma", &self.labels.liposarcoma),
            ("rhabdomyosarcoma", &self.labels.rhabdomyosarcoma),
            ("leiomyosarcoma", &self.labels.leiomyosarcoma),
            ("undifferentiated", &self.labels.undifferentiated),
            ("other_sarcoma", &self.labels.other_sarcoma),
        ];
        for (role, label) in roles {
            if !space.contains(label) {
                return Err(ConfigurationError::UnknownPathwayLabel {
                    role: role.to_string(),
                    label: label.to_string(),
                });
            }
        }

        if self.prior.age_bands.is_empty() {
            return Err(ConfigurationError::NoAgeBands);
        }
        for band in &self.prior.age_bands {
            for label in space.iter() {
                let Some(value) = band.base.get(label) else {
                    return Err(ConfigurationError::MissingPriorEntry {
                        band: band.name.clone(),
                        label: label.to_string(),
                    });
                };
                check_factor(&format!("prior.age_bands.{}.{label}", band.name), value)?;
            }
        }
        for (label, factor) in &self.prior.site_factors {
            check_factor(&format!("prior.site_factors.{label}"), *factor)?;
        }
        for (label, factor) in &self.prior.size_factors {
            check_factor(&format!("prior.size_factors.{label}"), *factor)?;
        }
        check_factor("prior.size_threshold_cm", self.prior.size_threshold_cm)?;

        for required in [ADIPOCYTIC, SKELETAL_MUSCLE] {
            if !self.lineage.lineages.iter().any(|l| l.name == required) {
                return Err(ConfigurationError::MissingLineage {
                    lineage: required.to_string(),
                });
            }
        }
        for name in &self.lineage.precedence {
            if !self.lineage.lineages.iter().any(|l| &l.name == name) {
                return Err(ConfigurationError::MissingLineage { lineage: name.clone() });
            }
        }
        if !(0.0..=1.0).contains(&self.lineage.epithelial_confidence) {
            return Err(invalid("lineage.epithelial_confidence", "must be in [0.0, 1.0]"));
        }

        for (profile, vector) in self.likelihoods.named() {
            for label in space.iter() {
                let Some(value) = vector.get(label) else {
                    return Err(ConfigurationError::MissingLikelihoodEntry {
                        profile: profile.to_string(),
                        label: label.to_string(),
                    });
                };
                check_factor(&format!("likelihoods.{profile}.{label}"), value)?;
            }
        }

        let morph = &self.morphology;
        if !(morph.non_candidate_likelihood > 0.0 && morph.non_candidate_likelihood <= 1.0) {
            return Err(invalid("morphology.non_candidate_likelihood", "must be in (0.0, 1.0]"));
        }
        let candidate = morph.candidate_likelihood;
        if !(candidate >= morph.non_candidate_likelihood && candidate <= 1.0) {
            return Err(invalid(
                "morphology.candidate_likelihood",
                "must be in [non_candidate_likelihood, 1.0]",
            ));
        }

        check_factor("integrator.ihc_floor", self.integrator.ihc_floor)?;
        check_factor("integrator.morphology_floor", self.integrator.morphology_floor)?;

        if !self.conflicts.amplicon_labels.contains(&self.labels.liposarcoma) {
            return Err(ConfigurationError::ConflictCatalog {
                reason: format!(
                    "amplicon_labels must include the liposarcoma label '{}'",
                    self.labels.liposarcoma
                ),
            });
        }
        let deltas = [
            ("conflicts.molecular_delta", self.conflicts.molecular_delta),
            ("conflicts.molecular_confirmed_delta", self.conflicts.molecular_confirmed_delta),
            ("conflicts.amplification_absent_delta", self.conflicts.amplification_absent_delta),
            ("conflicts.heterologous_delta", self.conflicts.heterologous_delta),
            ("conflicts.collision_delta", self.conflicts.collision_delta),
            ("conflicts.indeterminate_delta", self.conflicts.indeterminate_delta),
        ];
        for (name, delta) in deltas {
            if !(-1.0..=1.0).contains(&delta) {
                return Err(invalid(name, format!("must be in [-1.0, 1.0] (got {delta})")));
            }
        }

        let unc = &self.uncertainty;
        let ordered = unc.reliable_below >= 0.0 && unc.reliable_below <= unc.review_at_or_above;
        if !(ordered && unc.review_at_or_above.is_finite()) {
            return Err(invalid(
                "uncertainty",
                "thresholds must satisfy 0 <= reliable_below <= review_at_or_above",
            ));
        }
        if unc.bootstrap.resamples == 0 || unc.bootstrap.sample_size == 0 {
            return Err(invalid(
                "uncertainty.bootstrap",
                "resamples and sample_size must be positive",
            ));
        }
        if !(unc.bootstrap.level > 0.0 && unc.bootstrap.level < 1.0) {
            return Err(invalid("uncertainty.bootstrap.level", "must be in (0.0, 1.0)"));
        }
        if !(unc.sensitivity_epsilon > 0.0 && unc.sensitivity_epsilon < 1.0) {
            return Err(invalid("uncertainty.sensitivity_epsilon", "must be in (0.0, 1.0)"));
        }
        let decision = &unc.decision;
        if !(decision.molecular_testing_above >= 0.0
            && decision.molecular_testing_above <= decision.established_above
            && decision.established_above <= 1.0)
        {
            return Err(invalid(
                "uncertainty.decision",
                "thresholds must satisfy 0 <= molecular_testing_above <= established_above <= 1",
            ));
        }

        Ok(())
    }

    /// Parses and validates a JSON configuration. Missing sections take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Load` on malformed JSON, otherwise any
    /// validation failure.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigurationError::Load {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Load` if the file cannot be read or
    /// parsed, otherwise any validation failure.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Load {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    /// Stable hex fingerprint of the canonical JSON form.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Load` if the configuration cannot be
    /// serialized.
    pub fn fingerprint(&self) -> Result<String, ConfigurationError> {
        let bytes = serde_json::to_vec(self).map_err(|e| ConfigurationError::Load {
            message: format!("failed to serialize configuration: {e}"),
        })?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

/// A validated configuration in service, with its audit identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveConfig {
    pub config: EngineConfig,
    pub fingerprint: String,
    /// Increments on every successful replace.
    pub version: u64,
}

/// Process-wide configuration holder.
///
/// Readers take an `Arc` snapshot and keep it for a whole case. Writers
/// validate first and then swap the entire snapshot.
#[derive(Debug)]
pub struct ConfigHandle {
    current: RwLock<Arc<ActiveConfig>>,
}

impl ConfigHandle {
    /// Validates and installs the initial configuration.
    ///
    /// # Errors
    ///
    /// Returns `DxError::Configuration` if validation fails.
    pub fn new(config: EngineConfig) -> DxResult<Self> {
        config.validate()?;
        let fingerprint = config.fingerprint()?;
        info!(
            fingerprint = %fingerprint,
            labels = config.diagnosis_space.len(),
            "configuration loaded"
        );
        Ok(Self {
            current: RwLock::new(Arc::new(ActiveConfig {
                config,
                fingerprint,
                version: 1,
            })),
        })
    }

    /// Loads the initial configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `DxError::Configuration` on read, parse or validation failure.
    pub fn from_json_file(path: impl AsRef<Path>) -> DxResult<Self> {
        Self::new(EngineConfig::from_json_file(path)?)
    }

    /// Current snapshot. Cheap; clone of an `Arc`.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ActiveConfig> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Validates `config` and swaps it in whole. On error the current
    /// configuration stays in service.
    ///
    /// # Errors
    ///
    /// Returns `DxError::Configuration` if validation fails.
    pub fn replace(&self, config: EngineConfig) -> DxResult<u64> {
        config.validate()?;
        let fingerprint = config.fingerprint()?;
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = guard.version + 1;
        *guard = Arc::new(ActiveConfig {
            config,
            fingerprint,
            version,
        });
        info!(version, fingerprint = %guard.fingerprint, "configuration replaced");
        Ok(version)
    }

    /// Re-reads a JSON file and swaps it in.
    ///
    /// # Errors
    ///
    /// Same as [`replace`](Self::replace), plus load failures.
    pub fn reload_from_file(&self, path: impl AsRef<Path>) -> DxResult<u64> {
        self.replace(EngineConfig::from_json_file(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn missing_prior_entry_rejected() {
        let mut config = EngineConfig::default();
        config.prior.age_bands[1].base = Distribution::from([("DDLPS", 0.5), ("RMS", 0.5)]);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingPriorEntry { ref band, .. } if band == "adult"
        ));
    }

    #[test]
    fn missing_likelihood_entry_rejected() {
        let mut config = EngineConfig::default();
        config.likelihoods.rms_excluded = Distribution::from([("DDLPS", 0.3)]);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingLikelihoodEntry { ref profile, .. }
                if profile == "rms_excluded"
        ));
    }

    #[test]
    fn missing_required_lineage_rejected() {
        let mut config = EngineConfig::default();
        config.lineage.lineages.retain(|l| l.name != ADIPOCYTIC);
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigurationError::MissingLineage {
                lineage: ADIPOCYTIC.to_string()
            }
        );
    }

    #[test]
    fn pathway_label_outside_space_rejected() {
        let mut config = EngineConfig::default();
        config.labels.leiomyosarcoma = DiagnosisLabel::new("LMS-X");
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigurationError::UnknownPathwayLabel { .. }
        ));
    }

    #[test]
    fn conflict_catalog_requires_liposarcoma_amplicon() {
        let mut config = EngineConfig::default();
        config.conflicts.amplicon_labels = vec![DiagnosisLabel::WDLPS.into()];
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigurationError::ConflictCatalog { .. }
        ));
    }

    #[test]
    fn zero_non_candidate_likelihood_rejected() {
        let mut config = EngineConfig::default();
        config.morphology.non_candidate_likelihood = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut config = EngineConfig::default();
        config.uncertainty.reliable_below = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn epithelial_confidence_must_be_a_probability() {
        let mut config = EngineConfig::default();
        config.lineage.epithelial_confidence = 1.2;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigurationError::InvalidParameter { ref name, .. }
                if name == "lineage.epithelial_confidence"
        ));
    }

    #[test]
    fn amplification_delta_range_checked() {
        let mut config = EngineConfig::default();
        config.conflicts.amplification_absent_delta = -1.5;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigurationError::InvalidParameter { ref name, .. }
                if name == "conflicts.amplification_absent_delta"
        ));
    }

    #[test]
    fn decision_thresholds_must_be_ordered() {
        let mut config = EngineConfig::default();
        config.uncertainty.decision.molecular_testing_above = 0.95;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigurationError::InvalidParameter { ref name, .. } if name == "uncertainty.decision"
        ));

        config.uncertainty.decision = DecisionThresholds {
            established_above: 0.8,
            molecular_testing_above: 0.8,
        };
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_takes_defaults() {
        let json = r#"{"uncertainty":{"reliable_below":0.3}}"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(config.uncertainty.reliable_below, 0.3);
        assert_eq!(config.uncertainty.review_at_or_above, 1.5);
        assert_eq!(config.prior.size_threshold_cm, 15.0);
    }

    #[test]
    fn malformed_json_is_load_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{not json").unwrap_err(),
            ConfigurationError::Load { .. }
        ));
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = EngineConfig::default();
        let mut b = EngineConfig::default();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        b.conflicts.molecular_delta = -0.06;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn handle_replace_bumps_version() {
        let handle = ConfigHandle::new(EngineConfig::default()).unwrap();
        let before = handle.snapshot();
        let mut next = EngineConfig::default();
        next.uncertainty.reliable_below = 0.4;
        assert_eq!(handle.replace(next).unwrap(), 2);
        let after = handle.snapshot();
        assert_eq!(before.version, 1);
        assert_eq!(after.config.uncertainty.reliable_below, 0.4);
        assert_ne!(before.fingerprint, after.fingerprint);
    }

    #[test]
    fn handle_rejected_replace_keeps_current() {
        let handle = ConfigHandle::new(EngineConfig::default()).unwrap();
        let mut bad = EngineConfig::default();
        bad.prior.age_bands.clear();
        assert!(handle.replace(bad).is_err());
        assert_eq!(handle.snapshot().version, 1);
        assert_eq!(handle.snapshot().config, EngineConfig::default());
    }
}
