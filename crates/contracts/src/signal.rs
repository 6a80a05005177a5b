//! Outbound monitor signals and the typed listener interface

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::{Entity, ShapeHandle};

/// Contact begin payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSignal {
    /// Entity owning the reporting volume
    pub self_entity: Entity,

    /// Entity on the other side
    pub other: Entity,

    /// Simulation time of the transition
    pub time: f64,

    /// True when the other side is a plain mesh, false for another contact volume
    pub is_mesh_pair: bool,

    /// Volume that observed the overlap
    pub self_shape: ShapeHandle,

    /// Shape of the other party
    pub other_shape: ShapeHandle,
}

/// A discrete, timestamped notification emitted by a monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum MonitorSignal {
    ContactBegin(ContactSignal),
    ContactEnd {
        self_entity: Entity,
        other: Entity,
        time: f64,
    },
    GraspBegin {
        self_entity: Entity,
        other: Entity,
        time: f64,
        grasp_type: String,
    },
    GraspEnd {
        self_entity: Entity,
        other: Entity,
        time: f64,
    },
    SupportedByBegin {
        supported: Entity,
        supporting: Entity,
        time: f64,
        pair_id: u64,
    },
    SupportedByEnd {
        pair_id1: u64,
        pair_id2: u64,
        time: f64,
    },
    Reach {
        self_entity: Entity,
        other: Entity,
        start: f64,
        end: f64,
    },
    PreGrasp {
        self_entity: Entity,
        other: Entity,
        start: f64,
        end: f64,
    },
}

impl MonitorSignal {
    /// Short label used in logs and metric tags
    pub fn label(&self) -> &'static str {
        match self {
            Self::ContactBegin(_) => "contact_begin",
            Self::ContactEnd { .. } => "contact_end",
            Self::GraspBegin { .. } => "grasp_begin",
            Self::GraspEnd { .. } => "grasp_end",
            Self::SupportedByBegin { .. } => "supported_by_begin",
            Self::SupportedByEnd { .. } => "supported_by_end",
            Self::Reach { .. } => "reach",
            Self::PreGrasp { .. } => "pre_grasp",
        }
    }

    /// Push this signal into the matching listener callback
    pub fn deliver<L: SignalListener + ?Sized>(&self, listener: &mut L) {
        match self {
            Self::ContactBegin(contact) => listener.on_contact_begin(contact),
            Self::ContactEnd {
                self_entity,
                other,
                time,
            } => listener.on_contact_end(self_entity, other, *time),
            Self::GraspBegin {
                self_entity,
                other,
                time,
                grasp_type,
            } => listener.on_grasp_begin(self_entity, other, *time, grasp_type),
            Self::GraspEnd {
                self_entity,
                other,
                time,
            } => listener.on_grasp_end(self_entity, other, *time),
            Self::SupportedByBegin {
                supported,
                supporting,
                time,
                pair_id,
            } => listener.on_supported_by_begin(supported, supporting, *time, *pair_id),
            Self::SupportedByEnd {
                pair_id1,
                pair_id2,
                time,
            } => listener.on_supported_by_end(*pair_id1, *pair_id2, *time),
            Self::Reach {
                self_entity,
                other,
                start,
                end,
            } => listener.on_reach_event(self_entity, other, *start, *end),
            Self::PreGrasp {
                self_entity,
                other,
                start,
                end,
            } => listener.on_pre_grasp_event(self_entity, other, *start, *end),
        }
    }
}

/// Typed outbound callbacks of every monitor.
///
/// All methods default to no-ops so a listener only implements what it
/// consumes. Notifications are push-style; nothing is returned.
#[allow(unused_variables)]
pub trait SignalListener {
    /// Entry point used by signal producers; routes to the typed callbacks
    fn on_signal(&mut self, signal: &MonitorSignal) {
        signal.deliver(self);
    }

    fn on_contact_begin(&mut self, contact: &ContactSignal) {}

    fn on_contact_end(&mut self, self_entity: &Entity, other: &Entity, time: f64) {}

    fn on_grasp_begin(&mut self, self_entity: &Entity, other: &Entity, time: f64, grasp_type: &str) {
    }

    fn on_grasp_end(&mut self, self_entity: &Entity, other: &Entity, time: f64) {}

    fn on_supported_by_begin(
        &mut self,
        supported: &Entity,
        supporting: &Entity,
        time: f64,
        pair_id: u64,
    ) {
    }

    fn on_supported_by_end(&mut self, pair_id1: u64, pair_id2: u64, time: f64) {}

    fn on_reach_event(&mut self, self_entity: &Entity, other: &Entity, start: f64, end: f64) {}

    fn on_pre_grasp_event(&mut self, self_entity: &Entity, other: &Entity, start: f64, end: f64) {}

    /// Every monitor has finished; no more signals follow
    fn on_finish(&mut self, time: f64) {}
}

/// Records signals verbatim (taps and tests)
impl SignalListener for Vec<MonitorSignal> {
    fn on_signal(&mut self, signal: &MonitorSignal) {
        self.push(signal.clone());
    }
}

/// Shared listener: the producer owns one handle, the caller keeps another
impl<L: SignalListener + ?Sized> SignalListener for Arc<Mutex<L>> {
    fn on_signal(&mut self, signal: &MonitorSignal) {
        if let Ok(mut inner) = self.lock() {
            inner.on_signal(signal);
        }
    }

    fn on_finish(&mut self, time: f64) {
        if let Ok(mut inner) = self.lock() {
            inner.on_finish(time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActorHandle, EntityId, EntityKind};

    fn entity(id: u32) -> Entity {
        Entity {
            id: EntityId(id),
            name: format!("E{id}").into(),
            class: None,
            kind: EntityKind::Rigid,
            actor: ActorHandle(id),
        }
    }

    #[test]
    fn test_vec_tap_records_signals() {
        let signals = vec![
            MonitorSignal::GraspBegin {
                self_entity: entity(1),
                other: entity(2),
                time: 1.2,
                grasp_type: "PinchGrasp".to_string(),
            },
            MonitorSignal::SupportedByEnd {
                pair_id1: 7,
                pair_id2: 9,
                time: 3.0,
            },
        ];

        let mut tap: Vec<MonitorSignal> = Vec::new();
        for signal in &signals {
            tap.on_signal(signal);
        }
        assert_eq!(tap, signals);
    }

    #[derive(Default)]
    struct GraspCounter {
        begins: u32,
        ends: u32,
    }

    impl SignalListener for GraspCounter {
        fn on_grasp_begin(&mut self, _: &Entity, _: &Entity, _: f64, _: &str) {
            self.begins += 1;
        }

        fn on_grasp_end(&mut self, _: &Entity, _: &Entity, _: f64) {
            self.ends += 1;
        }
    }

    #[test]
    fn test_default_on_signal_routes_to_typed_callback() {
        let shared = Arc::new(Mutex::new(GraspCounter::default()));
        let mut handle = Arc::clone(&shared);

        handle.on_signal(&MonitorSignal::GraspEnd {
            self_entity: entity(1),
            other: entity(2),
            time: 4.0,
        });
        handle.on_signal(&MonitorSignal::ContactEnd {
            self_entity: entity(1),
            other: entity(2),
            time: 4.0,
        });

        let counter = shared.lock().unwrap();
        assert_eq!(counter.begins, 0);
        assert_eq!(counter.ends, 1);
    }

    #[test]
    fn test_signal_json_is_tagged() {
        let signal = MonitorSignal::Reach {
            self_entity: entity(1),
            other: entity(2),
            start: 0.0,
            end: 3.0,
        };
        let json = serde_json::to_string(&signal).unwrap();
        assert!(json.contains("\"signal\":\"reach\""));
        assert_eq!(signal.label(), "reach");
    }
}
