//! Grasp assist seam.
//!
//! The physical constraint lives in the host engine; the manipulator only
//! decides when to attach and when to release.

use std::sync::{Arc, Mutex};

use contracts::{Entity, GraspAssistConfig};
use serde::Serialize;

/// Attaches / releases the stabilizing constraint of a confirmed grasp
pub trait GraspAssist: Send {
    /// Attach `item` to `hand`. Returns false if the host refused.
    fn attach(&mut self, hand: &Entity, item: &Entity, config: &GraspAssistConfig) -> bool;

    /// Undo the constraint and restore the item's physics
    fn release(&mut self, hand: &Entity, item: &Entity);
}

/// One assist operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AssistAction {
    Attach {
        hand: Entity,
        item: Entity,
        disable_gravity: bool,
        mass_scale: Option<f64>,
    },
    Release {
        hand: Entity,
        item: Entity,
    },
}

/// Assist without a physics backend: records what would have happened.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingGraspAssist {
    actions: Arc<Mutex<Vec<AssistAction>>>,
}

impl RecordingGraspAssist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<AssistAction> {
        self.actions
            .lock()
            .map(|actions| actions.clone())
            .unwrap_or_default()
    }

    fn push(&self, action: AssistAction) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
    }
}

impl GraspAssist for RecordingGraspAssist {
    fn attach(&mut self, hand: &Entity, item: &Entity, config: &GraspAssistConfig) -> bool {
        self.push(AssistAction::Attach {
            hand: hand.clone(),
            item: item.clone(),
            disable_gravity: config.disable_gravity,
            mass_scale: config.scale_mass.then_some(config.mass_scale),
        });
        true
    }

    fn release(&mut self, hand: &Entity, item: &Entity) {
        self.push(AssistAction::Release {
            hand: hand.clone(),
            item: item.clone(),
        });
    }
}
