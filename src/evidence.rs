//! Typed evidence for a single case.
//!
//! Clinical features, morphology features and the immunohistochemistry
//! panel are validated on construction and immutable for the rest of a run.
//! The histology input itself is opaque here; it is handed to a
//! [`HistologyExtractor`](crate::morphology::HistologyExtractor).

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Unique identifier for a case evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(Uuid);

impl CaseId {
    /// Creates a new random case ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Female,
    Male,
    Unknown,
}

impl Default for Sex {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Anatomic site of the primary tumor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AnatomicSite {
    /// Deep soft tissue of the thigh.
    DeepThigh,
    Retroperitoneum,
    /// Extremity other than deep thigh.
    Extremity,
    Trunk,
    HeadAndNeck,
    /// Any other site, by name.
    Other(String),
}

impl AnatomicSite {
    fn as_key(&self) -> &str {
        match self {
            Self::DeepThigh => "deep_thigh",
            Self::Retroperitoneum => "retroperitoneum",
            Self::Extremity => "extremity",
            Self::Trunk => "trunk",
            Self::HeadAndNeck => "head_and_neck",
            Self::Other(name) => name,
        }
    }
}

impl TryFrom<String> for AnatomicSite {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty() {
            return Err("anatomic site cannot be empty".to_string());
        }
        Ok(match value.to_ascii_lowercase().as_str() {
            "deep_thigh" => Self::DeepThigh,
            "retroperitoneum" => Self::Retroperitoneum,
            "extremity" => Self::Extremity,
            "trunk" => Self::Trunk,
            "head_and_neck" => Self::HeadAndNeck,
            _ => Self::Other(value.to_string()),
        })
    }
}

impl From<AnatomicSite> for String {
    fn from(site: AnatomicSite) -> Self {
        site.as_key().to_string()
    }
}

impl fmt::Display for AnatomicSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

/// Clinical features captured for a case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalFeatures {
    age: f64,
    sex: Sex,
    site: AnatomicSite,
    size_cm: f64,
}

impl ClinicalFeatures {
    /// Creates validated clinical features.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if age or size is negative or not finite.
    pub fn new(
        age: f64,
        sex: Sex,
        site: AnatomicSite,
        size_cm: f64,
    ) -> Result<Self, ValidationError> {
        if !age.is_finite() {
            return Err(ValidationError::NonFinite {
                field: "age".to_string(),
            });
        }
        if !size_cm.is_finite() {
            return Err(ValidationError::NonFinite {
                field: "size_cm".to_string(),
            });
        }
        if age < 0.0 {
            return Err(ValidationError::NegativeAge { value: age });
        }
        if size_cm < 0.0 {
            return Err(ValidationError::NegativeSize { value: size_cm });
        }
        Ok(Self {
            age,
            sex,
            site,
            size_cm,
        })
    }

    #[must_use]
    pub const fn age(&self) -> f64 {
        self.age
    }

    #[must_use]
    pub const fn sex(&self) -> Sex {
        self.sex
    }

    #[must_use]
    pub const fn site(&self) -> &AnatomicSite {
        &self.site
    }

    #[must_use]
    pub const fn size_cm(&self) -> f64 {
        self.size_cm
    }
}

#[derive(Deserialize)]
struct RawClinical {
    age: f64,
    #[serde(default)]
    sex: Sex,
    site: AnatomicSite,
    size_cm: f64,
}

impl<'de> Deserialize<'de> for ClinicalFeatures {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawClinical::deserialize(deserializer)?;
        ClinicalFeatures::new(raw.age, raw.sex, raw.site, raw.size_cm)
            .map_err(serde::de::Error::custom)
    }
}

/// Dominant cell morphology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Spindle,
    Pleomorphic,
    RoundCell,
    Epithelioid,
    Myxoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtypiaGrade {
    Low,
    Intermediate,
    High,
}

/// Morphologic features produced by the histology feature extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphologyFeatures {
    pub cell_type: CellType,
    pub atypia: AtypiaGrade,
    /// Mitoses per 10 high-power fields.
    #[serde(default)]
    pub mitotic_count: u32,
    #[serde(default)]
    pub necrosis_present: bool,
}

impl MorphologyFeatures {
    /// Creates features with no mitoses and no necrosis recorded.
    #[must_use]
    pub const fn new(cell_type: CellType, atypia: AtypiaGrade) -> Self {
        Self {
            cell_type,
            atypia,
            mitotic_count: 0,
            necrosis_present: false,
        }
    }
}

/// Immunohistochemistry panel: marker name to reactivity in [0.0, 1.0].
///
/// Marker names are case-insensitive. Markers that were not listed read as
/// 0.0: a missing marker is a negative result, not missing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IhcPanel(BTreeMap<String, f64>);

impl IhcPanel {
    /// Creates an empty (all-negative) panel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(marker: &str) -> String {
        marker.trim().to_ascii_uppercase()
    }

    /// Records a marker score.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an empty marker name, a score outside
    /// [0.0, 1.0], or a marker that is already on the panel under any
    /// spelling.
    pub fn insert(&mut self, marker: &str, score: f64) -> Result<(), ValidationError> {
        let key = Self::key(marker);
        if key.is_empty() {
            return Err(ValidationError::EmptyMarkerName);
        }
        if score.is_nan() || !(0.0..=1.0).contains(&score) {
            return Err(ValidationError::ReactivityOutOfRange {
                marker: marker.to_string(),
                value: score,
            });
        }
        if self.0.contains_key(&key) {
            return Err(ValidationError::DuplicateMarker { marker: key });
        }
        self.0.insert(key, score);
        Ok(())
    }

    /// Builder-style variant of [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert).
    pub fn with(mut self, marker: &str, score: f64) -> Result<Self, ValidationError> {
        self.insert(marker, score)?;
        Ok(self)
    }

    /// Builds a panel from `(marker, score)` pairs.
    ///
    /// # Errors
    ///
    /// Returns the first invalid entry.
    pub fn from_scores<'a, I>(scores: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut panel = Self::new();
        for (marker, score) in scores {
            panel.insert(marker, score)?;
        }
        Ok(panel)
    }

    /// Reactivity score; unlisted markers are negative.
    #[must_use]
    pub fn reactivity(&self, marker: &str) -> f64 {
        self.0.get(&Self::key(marker)).copied().unwrap_or(0.0)
    }

    /// True if the marker has any nonzero reactivity (focal counts).
    #[must_use]
    pub fn is_reactive(&self, marker: &str) -> bool {
        self.reactivity(marker) > 0.0
    }

    /// True if any of the markers is reactive.
    #[must_use]
    pub fn any_reactive<S: AsRef<str>>(&self, markers: &[S]) -> bool {
        markers.iter().any(|m| self.is_reactive(m.as_ref()))
    }

    /// Reactive markers, in name order.
    #[must_use]
    pub fn reactive_markers(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, score)| **score > 0.0)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

struct IhcPanelVisitor;

impl<'de> Visitor<'de> for IhcPanelVisitor {
    type Value = IhcPanel;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of marker name to reactivity in [0.0, 1.0]")
    }

    // Entries go through `insert` one by one so repeated keys are rejected
    // instead of collapsing into the last value.
    fn visit_map<A>(self, mut access: A) -> Result<IhcPanel, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut panel = IhcPanel::new();
        while let Some((marker, score)) = access.next_entry::<String, f64>()? {
            panel.insert(&marker, score).map_err(de::Error::custom)?;
        }
        Ok(panel)
    }
}

impl<'de> Deserialize<'de> for IhcPanel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(IhcPanelVisitor)
    }
}

/// Molecular test results.
///
/// Every field is optional: an untested marker is unknown, not negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MolecularFindings {
    /// MDM2 amplification by FISH.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mdm2_amplified: Option<bool>,
}

impl MolecularFindings {
    /// Findings with the MDM2 FISH result recorded.
    #[must_use]
    pub const fn mdm2_fish(amplified: bool) -> Self {
        Self {
            mdm2_amplified: Some(amplified),
        }
    }

    /// True if no molecular test was reported.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mdm2_amplified.is_none()
    }
}

/// All evidence for one case after feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceModel {
    pub clinical: ClinicalFeatures,
    pub morphology: MorphologyFeatures,
    pub ihc: IhcPanel,
    #[serde(default)]
    pub molecular: MolecularFindings,
}

/// Input to a single `diagnose` call.
///
/// `H` is the raw histology input; the core never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseData<H> {
    #[serde(default)]
    pub case_id: CaseId,
    pub clinical: ClinicalFeatures,
    pub histology: H,
    pub ihc: IhcPanel,
    #[serde(default, skip_serializing_if = "MolecularFindings::is_empty")]
    pub molecular: MolecularFindings,
}

impl<H> CaseData<H> {
    /// Creates a case with a fresh ID and no molecular results.
    #[must_use]
    pub fn new(clinical: ClinicalFeatures, histology: H, ihc: IhcPanel) -> Self {
        Self {
            case_id: CaseId::new(),
            clinical,
            histology,
            ihc,
            molecular: MolecularFindings::default(),
        }
    }

    #[must_use]
    pub fn with_molecular(mut self, molecular: MolecularFindings) -> Self {
        self.molecular = molecular;
        self
    }
}
