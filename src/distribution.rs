//! Probability distributions and likelihood vectors over diagnosis labels.
//!
//! The same type carries normalized distributions (priors, posteriors) and
//! unnormalized likelihood vectors; `is_normalized` tells them apart.
//! Entries keep insertion order. Anything built by walking a
//! [`DiagnosisSpace`] therefore iterates, ranks and serializes in space
//! order.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::diagnosis::{DiagnosisLabel, DiagnosisSpace};

/// Tolerance used when checking that a distribution sums to one.
pub const SUM_TOLERANCE: f64 = 1e-9;

/// Mapping from diagnosis label to a non-negative weight.
#[derive(Debug, Clone, Default)]
pub struct Distribution(Vec<(DiagnosisLabel, f64)>);

impl Distribution {
    /// Creates an empty distribution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniform distribution over a diagnosis space.
    #[must_use]
    pub fn uniform(space: &DiagnosisSpace) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let p = 1.0 / space.len() as f64;
        space.iter().map(|label| (label.clone(), p)).collect()
    }

    /// Same value for every label in the space.
    #[must_use]
    pub fn constant(space: &DiagnosisSpace, value: f64) -> Self {
        space.iter().map(|label| (label.clone(), value)).collect()
    }

    /// Sets the weight for a label. A new label goes to the end; an
    /// existing one keeps its position.
    pub fn insert(&mut self, label: DiagnosisLabel, value: f64) {
        match self.0.iter_mut().find(|(l, _)| *l == label) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((label, value)),
        }
    }

    /// Returns the weight for a label, if present.
    #[must_use]
    pub fn get(&self, label: &DiagnosisLabel) -> Option<f64> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, v)| *v)
    }

    /// Returns the weight for a label, or `default` when absent.
    #[must_use]
    pub fn get_or(&self, label: &DiagnosisLabel, default: f64) -> f64 {
        self.get(label).unwrap_or(default)
    }

    /// Iterates `(label, weight)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&DiagnosisLabel, f64)> {
        self.0.iter().map(|(label, value)| (label, *value))
    }

    /// Number of labels carried.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no label is carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.0.iter().map(|(_, v)| v).sum()
    }

    /// Divides every weight by the total.
    ///
    /// Returns `None` when the total is zero (or not finite); callers decide
    /// whether that is an error.
    #[must_use]
    pub fn normalized(&self) -> Option<Self> {
        let total = self.sum();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        Some(self.iter().map(|(label, value)| (label.clone(), value / total)).collect())
    }

    /// True if all weights are non-negative and sum to one within tolerance.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.0.iter().all(|(_, v)| *v >= 0.0) && (self.sum() - 1.0).abs() <= SUM_TOLERANCE
    }

    /// Returns a copy with one weight scaled by `factor`. An absent label is
    /// scaled from `default` and appended.
    #[must_use]
    pub fn scaled(&self, label: &DiagnosisLabel, factor: f64, default: f64) -> Self {
        let mut out = self.clone();
        out.insert(label.clone(), self.get_or(label, default) * factor);
        out
    }

    /// Highest-weighted label.
    ///
    /// Ties keep the entry inserted first, i.e. diagnosis-space order for
    /// anything built over a space.
    #[must_use]
    pub fn top(&self) -> Option<(&DiagnosisLabel, f64)> {
        let mut best: Option<(&DiagnosisLabel, f64)> = None;
        for (label, value) in self.iter() {
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((label, value)),
            }
        }
        best
    }

    /// Labels sorted by descending weight; ties keep insertion order.
    #[must_use]
    pub fn ranked(&self) -> Vec<(DiagnosisLabel, f64)> {
        let mut ranked = self.0.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Shannon entropy in bits; zero-probability entries contribute nothing.
    #[must_use]
    pub fn entropy(&self) -> f64 {
        let h: f64 = self
            .0
            .iter()
            .map(|(_, p)| *p)
            .filter(|p| *p > 0.0)
            .map(|p| -p * p.log2())
            .sum();
        // -0.0 for a point mass
        h.max(0.0)
    }
}

/// Equal when both carry the same labels with the same weights, in any
/// order.
impl PartialEq for Distribution {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(label, value)| other.get(label) == Some(value))
    }
}

impl FromIterator<(DiagnosisLabel, f64)> for Distribution {
    fn from_iter<I: IntoIterator<Item = (DiagnosisLabel, f64)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (label, value) in iter {
            out.insert(label, value);
        }
        out
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in &self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

struct DistributionVisitor;

impl<'de> Visitor<'de> for DistributionVisitor {
    type Value = Distribution;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of diagnosis label to weight")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Distribution, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut out = Distribution::new();
        while let Some((label, value)) = access.next_entry::<DiagnosisLabel, f64>()? {
            if out.get(&label).is_some() {
                return Err(de::Error::custom(format!("label '{label}' appears more than once")));
            }
            out.insert(label, value);
        }
        Ok(out)
    }
}

impl<'de> Deserialize<'de> for Distribution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DistributionVisitor)
    }
}

impl<const N: usize> From<[(&str, f64); N]> for Distribution {
    fn from(entries: [(&str, f64); N]) -> Self {
        entries
            .into_iter()
            .map(|(label, value)| (DiagnosisLabel::new(label), value))
            .collect()
    }
}
