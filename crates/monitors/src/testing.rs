//! Test doubles shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{
    ActorHandle, Entity, EntityId, EntityKind, InMemoryRegistry, MonitorSignal, OverlapCandidate,
    OverlapNotification, PhysicsView, ShapeHandle, ShapeKind, Vector3,
};

use crate::context::MonitorContext;
use crate::monitor::Monitor;
use crate::scheduler::Scheduler;
use crate::MonitorId;

/// Hand-filled physics state
#[derive(Debug, Default)]
pub struct StubPhysics {
    pub locations: HashMap<ActorHandle, Vector3>,
    pub velocities: HashMap<ActorHandle, Vector3>,
    pub overlaps: HashMap<ShapeHandle, Vec<OverlapCandidate>>,
    pub bones: HashMap<(ActorHandle, String), ShapeHandle>,
}

impl PhysicsView for StubPhysics {
    fn location(&self, actor: ActorHandle) -> Option<Vector3> {
        self.locations.get(&actor).copied()
    }

    fn velocity(&self, actor: ActorHandle) -> Option<Vector3> {
        self.velocities.get(&actor).copied()
    }

    fn overlapping(&self, volume: ShapeHandle) -> Vec<OverlapCandidate> {
        self.overlaps.get(&volume).cloned().unwrap_or_default()
    }

    fn bone_volume(&self, actor: ActorHandle, bone: &str) -> Option<ShapeHandle> {
        self.bones.get(&(actor, bone.to_string())).copied()
    }
}

/// Entity whose actor handle equals its id
pub fn entity(id: u32, kind: EntityKind) -> Entity {
    Entity {
        id: EntityId(id),
        name: format!("E{id}").into(),
        class: None,
        kind,
        actor: ActorHandle(id),
    }
}

/// Registry with the given entities, each owning shape `id * 100`
pub fn registry(entities: &[Entity]) -> Arc<InMemoryRegistry> {
    let mut registry = InMemoryRegistry::new();
    for e in entities {
        registry
            .register(e.clone(), &[ShapeHandle(e.id.0 * 100)])
            .unwrap();
    }
    Arc::new(registry)
}

/// Overlap of `volume` with the mesh of entity `other`
pub fn mesh_overlap(volume: ShapeHandle, other: u32, timestamp: f64) -> OverlapNotification {
    OverlapNotification {
        volume,
        other_actor: ActorHandle(other),
        other_shape: ShapeHandle(other * 100),
        other_kind: ShapeKind::Mesh,
        timestamp,
    }
}

/// Overlap of `volume` with another contact volume owned by `other`
pub fn trigger_overlap(
    volume: ShapeHandle,
    other: u32,
    other_volume: ShapeHandle,
    timestamp: f64,
) -> OverlapNotification {
    OverlapNotification {
        volume,
        other_actor: ActorHandle(other),
        other_shape: other_volume,
        other_kind: ShapeKind::ContactTrigger,
        timestamp,
    }
}

/// Drives a single monitor the way the hub would
pub struct Rig {
    pub scheduler: Scheduler,
    pub physics: StubPhysics,
    pub outbox: Vec<MonitorSignal>,
    pub now: f64,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            scheduler: Scheduler::new(),
            physics: StubPhysics::default(),
            outbox: Vec::new(),
            now: 0.0,
        }
    }

    pub fn ctx(&mut self) -> MonitorContext<'_> {
        MonitorContext::new(
            self.now,
            MonitorId(0),
            &mut self.scheduler,
            &self.physics,
            &mut self.outbox,
        )
    }

    /// Fire every timer up to `t`, then move the clock to `t`
    pub fn advance(&mut self, monitor: &mut impl Monitor, t: f64) {
        while let Some(fired) = self.scheduler.pop_due(t) {
            self.now = fired.time;
            monitor.on_timer(&mut self.ctx(), fired.kind);
        }
        self.now = t;
    }

    pub fn begin(&mut self, monitor: &mut impl Monitor, overlap: OverlapNotification) {
        self.advance(monitor, overlap.timestamp);
        monitor.on_overlap_begin(&mut self.ctx(), &overlap);
    }

    pub fn end(&mut self, monitor: &mut impl Monitor, overlap: OverlapNotification) {
        self.advance(monitor, overlap.timestamp);
        monitor.on_overlap_end(&mut self.ctx(), &overlap);
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.outbox.iter().map(|s| s.label()).collect()
    }
}
