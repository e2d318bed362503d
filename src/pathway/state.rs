//! The three-layer routing state machine.
//!
//! ```text
//! LineageGate ──epithelial marker──▶ Done(Epithelial)
//!      │
//!      ▼
//! LineageClassification ──▶ Dispatch{activated} ──precedence──▶ Done(SubPathway)
//! ```
//!
//! Each state moves forward exactly once; no state is revisited.

use serde::{Deserialize, Serialize};

use crate::config::{LineageConfig, ADIPOCYTIC, SKELETAL_MUSCLE};
use crate::evidence::IhcPanel;

use super::outcome::SubPathway;

/// A layer visited while routing, recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LineageGate,
    LineageClassification,
    Dispatch,
}

/// Where routing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Epithelial,
    SubPathway(SubPathway),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathwayState {
    LineageGate,
    LineageClassification,
    Dispatch { activated: Vec<String> },
    Done(Terminal),
}

/// Route taken through the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub stages: Vec<Stage>,
    /// Lineages with at least one reactive marker, in table order.
    pub activated: Vec<String>,
    pub terminal: Terminal,
}

/// Maps a lineage name to the specific sub-pathway it dispatches to.
#[must_use]
pub fn sub_pathway_for_lineage(lineage: &str) -> Option<SubPathway> {
    match lineage {
        ADIPOCYTIC => Some(SubPathway::Liposarcoma),
        SKELETAL_MUSCLE => Some(SubPathway::Rhabdomyosarcoma),
        _ => None,
    }
}

/// Picks the sub-pathway for a set of activated lineages.
///
/// The first precedence entry that is activated and has a specific
/// sub-pathway wins; otherwise the undifferentiated sub-pathway.
#[must_use]
pub fn select_sub_pathway<S: AsRef<str>>(activated: &[S], precedence: &[String]) -> SubPathway {
    precedence
        .iter()
        .filter(|name| activated.iter().any(|a| a.as_ref() == name.as_str()))
        .find_map(|name| sub_pathway_for_lineage(name))
        .unwrap_or(SubPathway::Undifferentiated)
}

/// Lineages activated by the panel, in table order.
#[must_use]
pub fn activated_lineages(ihc: &IhcPanel, config: &LineageConfig) -> Vec<String> {
    config
        .lineages
        .iter()
        .filter(|rule| ihc.any_reactive(&rule.markers))
        .map(|rule| rule.name.clone())
        .collect()
}

impl PathwayState {
    fn stage(&self) -> Option<Stage> {
        match self {
            Self::LineageGate => Some(Stage::LineageGate),
            Self::LineageClassification => Some(Stage::LineageClassification),
            Self::Dispatch { .. } => Some(Stage::Dispatch),
            Self::Done(_) => None,
        }
    }

    fn next(self, ihc: &IhcPanel, config: &LineageConfig) -> Self {
        match self {
            Self::LineageGate => {
                if ihc.any_reactive(&config.epithelial_markers) {
                    Self::Done(Terminal::Epithelial)
                } else {
                    Self::LineageClassification
                }
            }
            Self::LineageClassification => Self::Dispatch {
                activated: activated_lineages(ihc, config),
            },
            Self::Dispatch { activated } => {
                Self::Done(Terminal::SubPathway(select_sub_pathway(&activated, &config.precedence)))
            }
            done @ Self::Done(_) => done,
        }
    }
}

/// Runs the state machine to completion.
#[must_use]
pub fn route(ihc: &IhcPanel, config: &LineageConfig) -> Route {
    let mut state = PathwayState::LineageGate;
    let mut stages = Vec::with_capacity(3);
    let mut activated = Vec::new();

    loop {
        if let Some(stage) = state.stage() {
            stages.push(stage);
        }
        if let PathwayState::Dispatch { activated: lineages } = &state {
            activated.clone_from(lineages);
        }
        state = match state.next(ihc, config) {
            PathwayState::Done(terminal) => {
                return Route {
                    stages,
                    activated,
                    terminal,
                }
            }
            next => next,
        };
    }
}
