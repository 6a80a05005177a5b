//! Contact shape monitor
//!
//! Turns overlap transitions of one collision volume into semantically
//! attributed contact begin/end signals:
//! - identity resolution through the injected registry (unknown objects are ignored)
//! - symmetric trigger-vs-trigger suppression: only the side with the greater
//!   entity id reports the pair, at begin and at end
//! - optional jitter concatenation of contact ends
//! - optional periodic supported-by classification over a candidate pool

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{
    ordered_pair_key, pair_key, ContactShapeConfig, ContactSignal, Entity, EntityRegistry,
    MonitorSignal, OverlapNotification, ShapeKind, SupportedByConfig,
};
use tracing::{debug, instrument, trace, warn};

use crate::context::MonitorContext;
use crate::delay_buffer::{Concatenation, ConcatenationBuffer, EndedRecord};
use crate::lifecycle::Lifecycle;
use crate::monitor::Monitor;
use crate::scheduler::{TimerHandle, TimerKind};
use crate::tally::OverlapTally;
use crate::MonitorError;

/// Pair waiting for the supported-by classification
#[derive(Debug, Clone)]
struct SupportCandidate {
    other: Entity,
    other_is_trigger: bool,
}

#[derive(Debug)]
struct SupportedByState {
    config: SupportedByConfig,
    candidates: Vec<SupportCandidate>,
    /// Promoted pairs by unordered pair key
    active_pairs: HashMap<u64, Entity>,
    timer: Option<TimerHandle>,
}

impl SupportedByState {
    fn new(config: SupportedByConfig) -> Self {
        Self {
            config,
            candidates: Vec::new(),
            active_pairs: HashMap::new(),
            timer: None,
        }
    }

    fn add_candidate(&mut self, ctx: &mut MonitorContext<'_>, other: Entity, other_is_trigger: bool) {
        if self.candidates.iter().any(|c| c.other.id == other.id) {
            return;
        }
        self.candidates.push(SupportCandidate {
            other,
            other_is_trigger,
        });

        match self.timer {
            Some(handle) if ctx.timer_active(handle) => {
                if ctx.timer_paused(handle) {
                    ctx.unpause_timer(handle);
                }
            }
            _ => {
                self.timer = Some(ctx.set_timer(
                    TimerKind::SupportedByCheck,
                    self.config.update_interval,
                    true,
                ));
            }
        }
    }

    fn pause_if_idle(&mut self, ctx: &mut MonitorContext<'_>) {
        if self.candidates.is_empty() {
            if let Some(handle) = self.timer {
                ctx.pause_timer(handle);
            }
        }
    }

    fn on_pair_end(&mut self, ctx: &mut MonitorContext<'_>, owner: &Entity, other: &Entity) {
        if let Some(pos) = self.candidates.iter().position(|c| c.other.id == other.id) {
            // never promoted
            self.candidates.remove(pos);
            self.pause_if_idle(ctx);
            return;
        }

        if self.active_pairs.remove(&pair_key(owner.id, other.id)).is_some() {
            Self::emit_pair_end(ctx, owner, other);
        }
    }

    /// Both orderings, so the receiver matches whichever one began the pair
    fn emit_pair_end(ctx: &mut MonitorContext<'_>, owner: &Entity, other: &Entity) {
        ctx.emit(MonitorSignal::SupportedByEnd {
            pair_id1: ordered_pair_key(owner.id, other.id),
            pair_id2: ordered_pair_key(other.id, owner.id),
            time: ctx.now(),
        });
    }

    fn end_all(&mut self, ctx: &mut MonitorContext<'_>, owner: &Entity) {
        ctx.clear_timer(&mut self.timer);
        self.candidates.clear();
        for (_, other) in self.active_pairs.drain() {
            Self::emit_pair_end(ctx, owner, &other);
        }
    }

    fn check(&mut self, ctx: &mut MonitorContext<'_>, owner: &Entity) {
        let physics = ctx.physics();
        let Some(owner_velocity) = physics.velocity(owner.actor) else {
            trace!(owner = %owner, "No velocity for owner, supported-by check skipped");
            return;
        };

        let mut promoted = Vec::new();
        for (idx, candidate) in self.candidates.iter().enumerate() {
            let Some(other_velocity) = physics.velocity(candidate.other.actor) else {
                continue;
            };
            if (owner_velocity.z - other_velocity.z).abs() >= self.config.max_vertical_speed {
                continue;
            }

            let self_supported = if candidate.other_is_trigger {
                match (
                    physics.location(owner.actor),
                    physics.location(candidate.other.actor),
                ) {
                    (Some(own), Some(other)) => own.z > other.z,
                    _ => continue,
                }
            } else {
                true
            };

            let (supported, supporting) = if self_supported {
                (owner, &candidate.other)
            } else {
                (&candidate.other, owner)
            };
            debug!(supported = %supported, supporting = %supporting, "Supported-by begin");
            ctx.emit(MonitorSignal::SupportedByBegin {
                supported: supported.clone(),
                supporting: supporting.clone(),
                time: ctx.now(),
                pair_id: ordered_pair_key(supported.id, supporting.id),
            });
            self.active_pairs
                .insert(pair_key(owner.id, candidate.other.id), candidate.other.clone());
            promoted.push(idx);
        }

        for idx in promoted.into_iter().rev() {
            self.candidates.remove(idx);
        }
        self.pause_if_idle(ctx);
    }
}

/// Contact monitor of a single overlap volume
pub struct ContactShapeMonitor {
    config: ContactShapeConfig,
    registry: Arc<dyn EntityRegistry>,
    owner: Option<Entity>,
    lifecycle: Lifecycle,
    tally: OverlapTally,
    contact_buffer: ConcatenationBuffer<Entity>,
    supported_by: Option<SupportedByState>,
    /// Ignore other contact volumes (bone volumes of a manipulator)
    mesh_only: bool,
}

impl ContactShapeMonitor {
    pub fn new(config: ContactShapeConfig, registry: Arc<dyn EntityRegistry>) -> Self {
        let contact_buffer = ConcatenationBuffer::new(
            "contact",
            config.concatenate_if_smaller,
            TimerKind::ContactDelay,
        );
        let supported_by = config.supported_by.clone().map(SupportedByState::new);
        Self {
            config,
            registry,
            owner: None,
            lifecycle: Lifecycle::default(),
            tally: OverlapTally::default(),
            contact_buffer,
            supported_by,
            mesh_only: false,
        }
    }

    /// Bone volume variant: only plain meshes, no concatenation, no supported-by
    pub(crate) fn bone(config: ContactShapeConfig, registry: Arc<dyn EntityRegistry>) -> Self {
        let mut monitor = Self::new(
            ContactShapeConfig {
                concatenate_if_smaller: 0.0,
                supported_by: None,
                ..config
            },
            registry,
        );
        monitor.mesh_only = true;
        monitor
    }

    pub fn config(&self) -> &ContactShapeConfig {
        &self.config
    }

    /// Resolved owner (after init)
    pub fn owner(&self) -> Option<&Entity> {
        self.owner.as_ref()
    }

    /// Resolve the other party and apply the symmetric tie-break.
    ///
    /// Returns `None` when this side must stay silent for the overlap.
    fn attribute(&self, overlap: &OverlapNotification) -> Option<(Entity, Entity, bool)> {
        let owner = self.owner.as_ref()?;
        if overlap.other_actor == owner.actor {
            return None;
        }

        let other_is_trigger = overlap.other_kind == ShapeKind::ContactTrigger;
        if other_is_trigger && self.mesh_only {
            return None;
        }

        let Some(other) = self
            .registry
            .resolve(overlap.other_actor, overlap.other_shape)
        else {
            trace!(
                monitor = %self.config.name,
                other_actor = %overlap.other_actor,
                "Overlap with unannotated object ignored"
            );
            return None;
        };
        if other.id == owner.id {
            return None;
        }

        if other_is_trigger && owner.id < other.id {
            trace!(
                monitor = %self.config.name,
                other = %other,
                "Symmetric overlap reported by the other volume"
            );
            return None;
        }

        Some((owner.clone(), other, other_is_trigger))
    }

    fn emit_end(ctx: &mut MonitorContext<'_>, owner: &Entity, record: EndedRecord<Entity>) {
        ctx.emit(MonitorSignal::ContactEnd {
            self_entity: owner.clone(),
            other: record.key,
            time: record.end_time,
        });
    }
}

impl Monitor for ContactShapeMonitor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[instrument(name = "contact_shape_init", skip(self, _ctx), fields(monitor = %self.config.name))]
    fn init(&mut self, _ctx: &mut MonitorContext<'_>) -> Result<(), MonitorError> {
        if self.lifecycle.is_init() || self.lifecycle.is_finished() {
            return Err(MonitorError::AlreadyInitialized {
                monitor: self.config.name.clone(),
            });
        }
        if self.config.concatenate_if_smaller < 0.0 {
            return Err(MonitorError::invalid_config(
                &self.config.name,
                "concatenate_if_smaller must be >= 0",
            ));
        }
        if let Some(sb) = &self.config.supported_by {
            if sb.update_interval <= 0.0 {
                return Err(MonitorError::invalid_config(
                    &self.config.name,
                    "supported_by.update_interval must be > 0",
                ));
            }
        }

        let owner = self
            .registry
            .resolve_actor(self.config.owner)
            .ok_or_else(|| MonitorError::owner_not_annotated(&self.config.name, self.config.owner))?;
        debug!(owner = %owner, volume = %self.config.volume, "Contact shape initialized");

        self.owner = Some(owner);
        self.lifecycle.mark_init();
        Ok(())
    }

    fn start(&mut self, ctx: &mut MonitorContext<'_>) {
        if !self.lifecycle.mark_started() {
            return;
        }
        // objects resting in the volume before start
        for standing in ctx.physics().overlapping(self.config.volume) {
            let overlap = standing.into_notification(self.config.volume, ctx.now());
            self.on_overlap_begin(ctx, &overlap);
        }
    }

    #[instrument(name = "contact_shape_finish", skip(self, ctx), fields(monitor = %self.config.name))]
    fn finish(&mut self, ctx: &mut MonitorContext<'_>, forced: bool) {
        if !self.lifecycle.mark_finished() {
            return;
        }
        if let Some(owner) = self.owner.clone() {
            for record in self.contact_buffer.drain(ctx) {
                Self::emit_end(ctx, &owner, record);
            }
            if let Some(sb) = &mut self.supported_by {
                sb.end_all(ctx, &owner);
            }
        }
        debug!(forced, "Contact shape finished");
    }

    #[instrument(
        level = "trace",
        name = "contact_shape_overlap_begin",
        skip(self, ctx, overlap),
        fields(monitor = %self.config.name, other_actor = %overlap.other_actor)
    )]
    fn on_overlap_begin(&mut self, ctx: &mut MonitorContext<'_>, overlap: &OverlapNotification) {
        if !self.lifecycle.is_running() {
            return;
        }
        let Some((owner, other, other_is_trigger)) = self.attribute(overlap) else {
            return;
        };
        if !self.tally.begin(other.id) {
            return;
        }

        if let Some(sb) = &mut self.supported_by {
            sb.add_candidate(ctx, other.clone(), other_is_trigger);
        }

        let now = ctx.now();
        match self.contact_buffer.try_concatenate(ctx, &other, now) {
            Concatenation::Concatenated => {
                debug!(other = %other, "Contact continues after jitter");
                return;
            }
            Concatenation::Stale(record) => Self::emit_end(ctx, &owner, record),
            Concatenation::Fresh => {}
        }

        ctx.emit(MonitorSignal::ContactBegin(ContactSignal {
            self_entity: owner,
            other,
            time: now,
            is_mesh_pair: !other_is_trigger,
            self_shape: self.config.volume,
            other_shape: overlap.other_shape,
        }));
    }

    #[instrument(
        level = "trace",
        name = "contact_shape_overlap_end",
        skip(self, ctx, overlap),
        fields(monitor = %self.config.name, other_actor = %overlap.other_actor)
    )]
    fn on_overlap_end(&mut self, ctx: &mut MonitorContext<'_>, overlap: &OverlapNotification) {
        if !self.lifecycle.is_running() {
            return;
        }
        let Some((owner, other, _)) = self.attribute(overlap) else {
            return;
        };
        match self.tally.end(other.id) {
            Some(true) => {}
            Some(false) => return,
            None => {
                trace!(other = %other, "End without a counted begin");
                return;
            }
        }

        if let Some(sb) = &mut self.supported_by {
            sb.on_pair_end(ctx, &owner, &other);
        }

        let now = ctx.now();
        if self.contact_buffer.is_enabled() {
            self.contact_buffer.record_end(ctx, other, now);
        } else {
            ctx.emit(MonitorSignal::ContactEnd {
                self_entity: owner,
                other,
                time: now,
            });
        }
    }

    fn on_timer(&mut self, ctx: &mut MonitorContext<'_>, kind: TimerKind) {
        if !self.lifecycle.is_running() {
            return;
        }
        let Some(owner) = self.owner.clone() else {
            return;
        };
        match kind {
            TimerKind::ContactDelay => {
                for record in self.contact_buffer.flush(ctx) {
                    Self::emit_end(ctx, &owner, record);
                }
            }
            TimerKind::SupportedByCheck => {
                if let Some(sb) = &mut self.supported_by {
                    sb.check(ctx, &owner);
                }
            }
            other => warn!(monitor = %self.config.name, timer = %other, "Unexpected timer"),
        }
    }
}
