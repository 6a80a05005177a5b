//! Reach and pre-grasp monitor
//!
//! Watches a capture volume around the hand. Candidates are rigid entities
//! inside it; their distance to the owner is sampled on a tick. A reach
//! attempt starts when the candidate was first seen (or last moved away), the
//! pre-grasp phase starts with the first manipulator contact. On grasp begin
//! both intervals are published and detection sleeps until the grasp ends.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{
    Entity, EntityId, EntityRegistry, MonitorSignal, OverlapNotification, ReachConfig, Vector3,
};
use metrics::counter;
use nalgebra::{distance, Point3};
use tracing::{debug, instrument, trace, warn};

use crate::context::MonitorContext;
use crate::delay_buffer::{Concatenation, ConcatenationBuffer, EndedRecord};
use crate::lifecycle::Lifecycle;
use crate::monitor::Monitor;
use crate::scheduler::{TimerHandle, TimerKind};
use crate::tally::OverlapTally;
use crate::{MonitorError, MonitorId};

/// Candidate state: when the current reach attempt started, last sampled distance
#[derive(Debug, Clone)]
struct ReachCandidate {
    entity: Entity,
    first_seen: f64,
    distance: Option<f64>,
}

fn point(v: Vector3) -> Point3<f64> {
    Point3::new(v.x, v.y, v.z)
}

/// Reach / pre-grasp interval detection bound to a sibling manipulator
pub struct ReachMonitor {
    config: ReachConfig,
    registry: Arc<dyn EntityRegistry>,
    owner: Option<Entity>,
    lifecycle: Lifecycle,
    sibling: Option<MonitorId>,
    candidates: HashMap<EntityId, ReachCandidate>,
    tally: OverlapTally,
    /// Manipulator contact begin time per candidate
    contacts: HashMap<EntityId, f64>,
    contact_buffer: ConcatenationBuffer<Entity>,
    grasped: Option<Entity>,
    overlaps_enabled: bool,
    tick: Option<TimerHandle>,
}

impl ReachMonitor {
    pub fn new(config: ReachConfig, registry: Arc<dyn EntityRegistry>) -> Self {
        let contact_buffer = ConcatenationBuffer::new(
            "reach_contact",
            config.max_pre_grasp_gap,
            TimerKind::ReachContactDelay,
        );
        Self {
            config,
            registry,
            owner: None,
            lifecycle: Lifecycle::default(),
            sibling: None,
            candidates: HashMap::new(),
            tally: OverlapTally::default(),
            contacts: HashMap::new(),
            contact_buffer,
            grasped: None,
            overlaps_enabled: false,
            tick: None,
        }
    }

    pub fn config(&self) -> &ReachConfig {
        &self.config
    }

    /// Manipulator whose contact and grasp signals feed this monitor
    pub fn bind_manipulator(&mut self, manipulator: MonitorId) {
        self.sibling = Some(manipulator);
    }

    pub fn sibling(&self) -> Option<MonitorId> {
        self.sibling
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_grasping(&self) -> bool {
        self.grasped.is_some()
    }

    /// Entry point for signals of the sibling manipulator
    pub fn on_manipulator_signal(&mut self, ctx: &mut MonitorContext<'_>, signal: &MonitorSignal) {
        if !self.lifecycle.is_running() {
            return;
        }
        match signal {
            MonitorSignal::ContactBegin(contact) => {
                self.on_contact_begin(ctx, &contact.other, contact.time)
            }
            MonitorSignal::ContactEnd { other, time, .. } => self.on_contact_end(ctx, other, *time),
            MonitorSignal::GraspBegin { other, time, .. } => self.on_grasp_begin(ctx, other, *time),
            MonitorSignal::GraspEnd { other, .. } => self.on_grasp_end(ctx, other),
            _ => {}
        }
    }

    fn distance_to(&self, ctx: &MonitorContext<'_>, entity: &Entity) -> Option<f64> {
        let owner = self.owner.as_ref()?;
        let physics = ctx.physics();
        let own = physics.location(owner.actor)?;
        let other = physics.location(entity.actor)?;
        Some(distance(&point(own), &point(other)))
    }

    fn resolve_candidate(&self, overlap: &OverlapNotification) -> Option<Entity> {
        let owner = self.owner.as_ref()?;
        if overlap.other_actor == owner.actor {
            return None;
        }
        let entity = self
            .registry
            .resolve(overlap.other_actor, overlap.other_shape)?;
        (entity.id != owner.id && entity.is_rigid()).then_some(entity)
    }

    fn add_candidate(&mut self, ctx: &mut MonitorContext<'_>, entity: Entity) {
        let distance = self.distance_to(ctx, &entity);
        trace!(candidate = %entity, ?distance, "Reach candidate added");
        self.candidates.insert(
            entity.id,
            ReachCandidate {
                entity,
                first_seen: ctx.now(),
                distance,
            },
        );
        self.resume_tick(ctx);
    }

    fn resume_tick(&mut self, ctx: &mut MonitorContext<'_>) {
        if self.grasped.is_some() {
            return;
        }
        match self.tick {
            Some(handle) if ctx.timer_active(handle) => ctx.unpause_timer(handle),
            _ => self.tick = Some(ctx.set_timer(TimerKind::ReachTick, self.config.update_rate, true)),
        }
    }

    fn pause_tick(&mut self, ctx: &mut MonitorContext<'_>) {
        if let Some(handle) = self.tick {
            ctx.pause_timer(handle);
        }
    }

    /// Sample distances: approaching keeps the attempt, moving away restarts it
    fn update_candidates(&mut self, ctx: &mut MonitorContext<'_>) {
        let now = ctx.now();
        let min_delta = self.config.min_distance_delta;
        let ids: Vec<EntityId> = self.candidates.keys().copied().collect();
        for id in ids {
            let Some(entity) = self.candidates.get(&id).map(|c| c.entity.clone()) else {
                continue;
            };
            let Some(current) = self.distance_to(ctx, &entity) else {
                continue;
            };
            let Some(candidate) = self.candidates.get_mut(&id) else {
                continue;
            };
            let Some(previous) = candidate.distance else {
                candidate.distance = Some(current);
                continue;
            };

            let diff = previous - current;
            if diff > min_delta {
                candidate.distance = Some(current);
            } else if diff < -min_delta {
                candidate.first_seen = now;
                candidate.distance = Some(current);
            }
        }
    }

    fn on_contact_begin(&mut self, ctx: &mut MonitorContext<'_>, other: &Entity, time: f64) {
        if self.grasped.is_some() {
            return;
        }
        if !self.candidates.contains_key(&other.id) {
            debug!(monitor = %self.config.name, other = %other, "Manipulator contact with a non-candidate");
            return;
        }

        match self.contact_buffer.try_concatenate(ctx, other, time) {
            Concatenation::Concatenated => return,
            Concatenation::Stale(record) => self.expire_contact(ctx, record),
            Concatenation::Fresh => {}
        }
        self.contacts.insert(other.id, time);
    }

    fn on_contact_end(&mut self, ctx: &mut MonitorContext<'_>, other: &Entity, time: f64) {
        if self.grasped.is_some() {
            counter!("semlog_anomalies_total", "kind" => "contact_end_while_grasping").increment(1);
            debug!(monitor = %self.config.name, other = %other, "Manipulator contact end during grasp ignored");
            return;
        }
        if !self.contacts.contains_key(&other.id) {
            return;
        }
        if self.contact_buffer.is_enabled() {
            self.contact_buffer.record_end(ctx, other.clone(), time);
        } else {
            self.expire_contact(
                ctx,
                EndedRecord {
                    key: other.clone(),
                    end_time: time,
                },
            );
        }
    }

    /// Contact really ended: the next reach attempt starts now
    fn expire_contact(&mut self, ctx: &MonitorContext<'_>, record: EndedRecord<Entity>) {
        self.contacts.remove(&record.key.id);
        if let Some(candidate) = self.candidates.get_mut(&record.key.id) {
            candidate.first_seen = ctx.now();
        }
    }

    #[instrument(name = "reach_grasp_begin", skip(self, ctx, other), fields(monitor = %self.config.name, other = %other))]
    fn on_grasp_begin(&mut self, ctx: &mut MonitorContext<'_>, other: &Entity, time: f64) {
        if let Some(current) = &self.grasped {
            counter!("semlog_anomalies_total", "kind" => "reach_already_grasping").increment(1);
            warn!(grasped = %current, "Already grasping, grasp begin ignored");
            return;
        }

        let first_seen = self.candidates.get(&other.id).map(|c| c.first_seen);
        let contact_time = self.contacts.get(&other.id).copied();
        match (first_seen, contact_time) {
            (Some(first_seen), Some(contact_time)) => {
                let Some(owner) = self.owner.clone() else {
                    return;
                };
                debug!(first_seen, contact_time, grasp = time, "Reach and pre-grasp");
                ctx.emit(MonitorSignal::Reach {
                    self_entity: owner.clone(),
                    other: other.clone(),
                    start: first_seen.min(contact_time),
                    end: contact_time,
                });
                ctx.emit(MonitorSignal::PreGrasp {
                    self_entity: owner,
                    other: other.clone(),
                    start: contact_time,
                    end: time.max(contact_time),
                });
            }
            (None, _) => {
                counter!("semlog_anomalies_total", "kind" => "grasp_of_unknown_candidate").increment(1);
                warn!("Grasped entity is not a reach candidate, no reach event");
            }
            (Some(_), None) => {
                counter!("semlog_anomalies_total", "kind" => "grasp_without_contact").increment(1);
                warn!("Grasped entity has no manipulator contact, no reach event");
            }
        }

        // detection sleeps until the grasp ends
        self.grasped = Some(other.clone());
        self.candidates.clear();
        self.contacts.clear();
        self.tally.clear();
        self.contact_buffer.drain(ctx);
        self.pause_tick(ctx);
        self.overlaps_enabled = false;
    }

    fn on_grasp_end(&mut self, ctx: &mut MonitorContext<'_>, other: &Entity) {
        match &self.grasped {
            None => {
                warn!(monitor = %self.config.name, other = %other, "Grasp end without an active grasp");
                return;
            }
            Some(current) if current.id != other.id => {
                counter!("semlog_anomalies_total", "kind" => "grasp_end_mismatch").increment(1);
                warn!(
                    monitor = %self.config.name,
                    grasped = %current,
                    other = %other,
                    "Grasp end for another entity ignored"
                );
                return;
            }
            Some(_) => {}
        }

        self.grasped = None;
        self.overlaps_enabled = true;
        self.rescan(ctx);
    }

    /// Rebuild candidates from whatever overlaps the volume right now
    fn rescan(&mut self, ctx: &mut MonitorContext<'_>) {
        for standing in ctx.physics().overlapping(self.config.volume) {
            let overlap = standing.into_notification(self.config.volume, ctx.now());
            self.on_overlap_begin(ctx, &overlap);
        }
    }
}

impl Monitor for ReachMonitor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[instrument(name = "reach_init", skip(self, _ctx), fields(monitor = %self.config.name))]
    fn init(&mut self, _ctx: &mut MonitorContext<'_>) -> Result<(), MonitorError> {
        if self.lifecycle.is_init() || self.lifecycle.is_finished() {
            return Err(MonitorError::AlreadyInitialized {
                monitor: self.config.name.clone(),
            });
        }
        if self.config.update_rate <= 0.0 {
            return Err(MonitorError::invalid_config(
                &self.config.name,
                "update_rate must be > 0",
            ));
        }
        if self.sibling.is_none() {
            return Err(MonitorError::MissingSibling {
                monitor: self.config.name.clone(),
                sibling: "manipulator",
                actor: self.config.owner,
            });
        }

        let owner = self
            .registry
            .resolve_actor(self.config.owner)
            .ok_or_else(|| MonitorError::owner_not_annotated(&self.config.name, self.config.owner))?;
        debug!(owner = %owner, volume = %self.config.volume, "Reach monitor initialized");

        self.owner = Some(owner);
        self.lifecycle.mark_init();
        Ok(())
    }

    fn start(&mut self, ctx: &mut MonitorContext<'_>) {
        if !self.lifecycle.mark_started() {
            return;
        }
        self.overlaps_enabled = true;
        self.rescan(ctx);
    }

    fn finish(&mut self, ctx: &mut MonitorContext<'_>, forced: bool) {
        if !self.lifecycle.mark_finished() {
            return;
        }
        self.contact_buffer.drain(ctx);
        ctx.clear_timer(&mut self.tick);
        self.candidates.clear();
        self.contacts.clear();
        self.overlaps_enabled = false;
        debug!(monitor = %self.config.name, forced, "Reach monitor finished");
    }

    fn on_overlap_begin(&mut self, ctx: &mut MonitorContext<'_>, overlap: &OverlapNotification) {
        if !self.lifecycle.is_running() || !self.overlaps_enabled {
            return;
        }
        let Some(entity) = self.resolve_candidate(overlap) else {
            return;
        };
        if self.tally.begin(entity.id) {
            self.add_candidate(ctx, entity);
        }
    }

    fn on_overlap_end(&mut self, ctx: &mut MonitorContext<'_>, overlap: &OverlapNotification) {
        if !self.lifecycle.is_running() || !self.overlaps_enabled {
            return;
        }
        let Some(entity) = self.resolve_candidate(overlap) else {
            return;
        };
        if self.tally.end(entity.id) != Some(true) {
            return;
        }
        if self.candidates.remove(&entity.id).is_some() {
            trace!(candidate = %entity, "Reach candidate removed");
            if self.candidates.is_empty() {
                self.pause_tick(ctx);
            }
        }
    }

    fn on_timer(&mut self, ctx: &mut MonitorContext<'_>, kind: TimerKind) {
        if !self.lifecycle.is_running() {
            return;
        }
        match kind {
            TimerKind::ReachTick => self.update_candidates(ctx),
            TimerKind::ReachContactDelay => {
                for record in self.contact_buffer.flush(ctx) {
                    self.expire_contact(ctx, record);
                }
            }
            other => warn!(monitor = %self.config.name, timer = %other, "Unexpected timer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entity, mesh_overlap, registry, Rig};
    use contracts::{ActorHandle, ContactSignal, EntityKind, OverlapCandidate, ShapeHandle, ShapeKind};

    const VOLUME: ShapeHandle = ShapeHandle(901);

    fn started(rig: &mut Rig) -> ReachMonitor {
        let reg = registry(&[
            entity(1, EntityKind::Skeletal),
            entity(2, EntityKind::Rigid),
            entity(3, EntityKind::Static),
        ]);
        let mut reach = ReachMonitor::new(ReachConfig::new("reach", ActorHandle(1), VOLUME), reg);
        reach.bind_manipulator(MonitorId(7));
        reach.init(&mut rig.ctx()).unwrap();
        reach.start(&mut rig.ctx());
        reach
    }

    fn e(id: u32, kind: EntityKind) -> Entity {
        entity(id, kind)
    }

    fn contact_begin(other: Entity, time: f64) -> MonitorSignal {
        MonitorSignal::ContactBegin(ContactSignal {
            self_entity: e(1, EntityKind::Skeletal),
            other,
            time,
            is_mesh_pair: true,
            self_shape: ShapeHandle(11),
            other_shape: ShapeHandle(200),
        })
    }

    fn grasp_begin(other: Entity, time: f64) -> MonitorSignal {
        MonitorSignal::GraspBegin {
            self_entity: e(1, EntityKind::Skeletal),
            other,
            time,
            grasp_type: "Default".into(),
        }
    }

    fn signal(rig: &mut Rig, reach: &mut ReachMonitor, t: f64, signal: MonitorSignal) {
        rig.advance(reach, t);
        reach.on_manipulator_signal(&mut rig.ctx(), &signal);
    }

    fn intervals(rig: &Rig) -> Vec<(&'static str, f64, f64)> {
        rig.outbox
            .iter()
            .filter_map(|s| match s {
                MonitorSignal::Reach { start, end, .. } => Some(("reach", *start, *end)),
                MonitorSignal::PreGrasp { start, end, .. } => Some(("pre_grasp", *start, *end)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_reach_and_pre_grasp_intervals() {
        let mut rig = Rig::new();
        rig.physics.locations.insert(ActorHandle(1), Vector3::new(0.0, 0.0, 0.0));
        rig.physics.locations.insert(ActorHandle(2), Vector3::new(2.0, 0.0, 0.0));
        let mut reach = started(&mut rig);

        rig.begin(&mut reach, mesh_overlap(VOLUME, 2, 0.0));
        assert_eq!(reach.candidate_count(), 1);

        // object approaches the hand
        for step in 1..=30 {
            let t = f64::from(step) * 0.1;
            rig.physics
                .locations
                .insert(ActorHandle(2), Vector3::new(2.0 - t * 0.65, 0.0, 0.0));
            rig.advance(&mut reach, t);
        }

        signal(&mut rig, &mut reach, 3.0, contact_begin(e(2, EntityKind::Rigid), 3.0));
        signal(&mut rig, &mut reach, 3.5, grasp_begin(e(2, EntityKind::Rigid), 3.5));

        assert_eq!(
            intervals(&rig),
            vec![("reach", 0.0, 3.0), ("pre_grasp", 3.0, 3.5)]
        );
        assert!(reach.is_grasping());
        assert_eq!(reach.candidate_count(), 0);
    }

    #[test]
    fn test_moving_away_restarts_attempt() {
        let mut rig = Rig::new();
        rig.physics.locations.insert(ActorHandle(1), Vector3::default());
        rig.physics.locations.insert(ActorHandle(2), Vector3::new(1.0, 0.0, 0.0));
        let mut reach = started(&mut rig);

        rig.begin(&mut reach, mesh_overlap(VOLUME, 2, 0.0));
        rig.advance(&mut reach, 0.5);
        // moves away at t=1.0
        rig.physics.locations.insert(ActorHandle(2), Vector3::new(1.5, 0.0, 0.0));
        rig.advance(&mut reach, 1.0);
        let restarted = rig.now;
        rig.physics.locations.insert(ActorHandle(2), Vector3::new(0.1, 0.0, 0.0));
        rig.advance(&mut reach, 2.0);

        signal(&mut rig, &mut reach, 2.0, contact_begin(e(2, EntityKind::Rigid), 2.0));
        signal(&mut rig, &mut reach, 2.2, grasp_begin(e(2, EntityKind::Rigid), 2.2));

        let (_, start, end) = intervals(&rig)[0];
        assert!(start > 0.5 && start <= restarted + 1e-9, "start {start}");
        assert_eq!(end, 2.0);
    }

    #[test]
    fn test_grasp_of_unknown_candidate_is_dropped() {
        let mut rig = Rig::new();
        let mut reach = started(&mut rig);

        signal(&mut rig, &mut reach, 1.0, grasp_begin(e(2, EntityKind::Rigid), 1.0));
        assert!(intervals(&rig).is_empty());
        assert!(reach.is_grasping());
    }

    #[test]
    fn test_static_and_owner_are_not_candidates() {
        let mut rig = Rig::new();
        let mut reach = started(&mut rig);

        rig.begin(&mut reach, mesh_overlap(VOLUME, 3, 0.1));
        rig.begin(&mut reach, mesh_overlap(VOLUME, 1, 0.1));
        rig.begin(&mut reach, mesh_overlap(VOLUME, 42, 0.1));
        assert_eq!(reach.candidate_count(), 0);
    }

    #[test]
    fn test_contact_jitter_keeps_first_contact_time() {
        let mut rig = Rig::new();
        let mut reach = started(&mut rig);
        let cup = e(2, EntityKind::Rigid);

        rig.begin(&mut reach, mesh_overlap(VOLUME, 2, 0.0));
        signal(&mut rig, &mut reach, 1.0, contact_begin(cup.clone(), 1.0));
        signal(
            &mut rig,
            &mut reach,
            1.1,
            MonitorSignal::ContactEnd {
                self_entity: e(1, EntityKind::Skeletal),
                other: cup.clone(),
                time: 1.1,
            },
        );
        signal(&mut rig, &mut reach, 1.2, contact_begin(cup.clone(), 1.2));
        signal(&mut rig, &mut reach, 2.0, grasp_begin(cup, 2.0));

        assert_eq!(
            intervals(&rig),
            vec![("reach", 0.0, 1.0), ("pre_grasp", 1.0, 2.0)]
        );
    }

    #[test]
    fn test_expired_contact_resets_attempt() {
        let mut rig = Rig::new();
        let mut reach = started(&mut rig);
        let cup = e(2, EntityKind::Rigid);

        rig.begin(&mut reach, mesh_overlap(VOLUME, 2, 0.0));
        signal(&mut rig, &mut reach, 1.0, contact_begin(cup.clone(), 1.0));
        signal(
            &mut rig,
            &mut reach,
            1.5,
            MonitorSignal::ContactEnd {
                self_entity: e(1, EntityKind::Skeletal),
                other: cup.clone(),
                time: 1.5,
            },
        );
        // flush at 1.5 + 0.48
        rig.advance(&mut reach, 3.0);
        signal(&mut rig, &mut reach, 4.0, grasp_begin(cup, 4.0));

        assert!(intervals(&rig).is_empty());
    }

    #[test]
    fn test_grasp_end_rescans_volume() {
        let mut rig = Rig::new();
        rig.physics.overlaps.insert(
            VOLUME,
            vec![OverlapCandidate {
                other_actor: ActorHandle(2),
                other_shape: ShapeHandle(200),
                other_kind: ShapeKind::Mesh,
            }],
        );
        let mut reach = started(&mut rig);
        assert_eq!(reach.candidate_count(), 1);
        let cup = e(2, EntityKind::Rigid);

        signal(&mut rig, &mut reach, 1.0, contact_begin(cup.clone(), 1.0));
        signal(&mut rig, &mut reach, 1.5, grasp_begin(cup.clone(), 1.5));
        assert_eq!(reach.candidate_count(), 0);

        // overlaps ignored while grasping
        rig.end(&mut reach, mesh_overlap(VOLUME, 2, 2.0));
        signal(
            &mut rig,
            &mut reach,
            3.0,
            MonitorSignal::GraspEnd {
                self_entity: e(1, EntityKind::Skeletal),
                other: cup,
                time: 3.0,
            },
        );
        assert!(!reach.is_grasping());
        assert_eq!(reach.candidate_count(), 1);
    }

    #[test]
    fn test_missing_sibling_fails_init() {
        let mut rig = Rig::new();
        let reg = registry(&[entity(1, EntityKind::Skeletal)]);
        let mut reach = ReachMonitor::new(ReachConfig::new("reach", ActorHandle(1), VOLUME), reg);
        let err = reach.init(&mut rig.ctx()).unwrap_err();
        assert!(matches!(err, MonitorError::MissingSibling { .. }));
    }
}
