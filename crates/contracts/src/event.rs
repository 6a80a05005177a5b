//! FinishedEvent - Monitors output, Dispatcher input
//!
//! A closed interval between two entities, immutable once built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::Entity;

/// Kind of semantic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Contact,
    Grasp,
    SupportedBy,
    Reach,
    PreGrasp,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Contact,
        EventKind::Grasp,
        EventKind::SupportedBy,
        EventKind::Reach,
        EventKind::PreGrasp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Contact => "contact",
            EventKind::Grasp => "grasp",
            EventKind::SupportedBy => "supported_by",
            EventKind::Reach => "reach",
            EventKind::PreGrasp => "pre_grasp",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finished semantic event
///
/// For supported-by events `self_entity` is the supported body and `other`
/// the supporting one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedEvent {
    /// Event kind
    pub kind: EventKind,

    /// Reporting side
    pub self_entity: Entity,

    /// Other side
    pub other: Entity,

    /// Start time (simulation seconds)
    pub start: f64,

    /// End time (simulation seconds), never before `start`
    pub end: f64,

    /// Optional classification label (grasp type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Pair key of symmetric relations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_id: Option<u64>,
}

impl FinishedEvent {
    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Finished event delivery callback
pub type FinishedEventCallback = Arc<dyn Fn(FinishedEvent) + Send + Sync>;
