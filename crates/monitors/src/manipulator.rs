//! Manipulator (hand) monitor
//!
//! Fuses bone-level contact monitors into two opposing finger groups:
//! - manipulator contact: number of bones touching an entity goes 0 -> 1 / 1 -> 0
//! - grasp: both groups touch the same entity; exclusive, one grasped entity at a time
//! - grasp and contact ends go through jitter buffers
//! - optional grasp assist attach/release, with a manual override

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{
    ActorHandle, ContactShapeConfig, ContactSignal, Entity, EntityId, EntityRegistry,
    ManipulatorConfig, MonitorSignal, OverlapNotification, ShapeHandle,
};
use metrics::counter;
use tracing::{debug, instrument, trace, warn};

use crate::contact_shape::ContactShapeMonitor;
use crate::context::MonitorContext;
use crate::delay_buffer::{Concatenation, ConcatenationBuffer, EndedRecord};
use crate::error::BoneGroup;
use crate::grasp_assist::GraspAssist;
use crate::lifecycle::Lifecycle;
use crate::monitor::Monitor;
use crate::scheduler::TimerKind;
use crate::MonitorError;

struct BoneMonitor {
    group: BoneGroup,
    volume: ShapeHandle,
    shape: ContactShapeMonitor,
}

/// Bones currently touching one entity, per group
#[derive(Debug, Clone)]
struct BoneContacts {
    entity: Entity,
    group_a: u32,
    group_b: u32,
}

impl BoneContacts {
    fn new(entity: Entity) -> Self {
        Self {
            entity,
            group_a: 0,
            group_b: 0,
        }
    }

    fn count_mut(&mut self, group: BoneGroup) -> &mut u32 {
        match group {
            BoneGroup::A => &mut self.group_a,
            BoneGroup::B => &mut self.group_b,
        }
    }

    fn total(&self) -> u32 {
        self.group_a + self.group_b
    }

    /// Grasp condition
    fn both(&self) -> bool {
        self.group_a > 0 && self.group_b > 0
    }
}

/// Grasp detection for one hand
pub struct ManipulatorMonitor {
    config: ManipulatorConfig,
    registry: Arc<dyn EntityRegistry>,
    owner: Option<Entity>,
    lifecycle: Lifecycle,
    bones: Vec<BoneMonitor>,
    /// Ordered so re-evaluation and teardown are deterministic
    touching: BTreeMap<EntityId, BoneContacts>,
    contact_buffer: ConcatenationBuffer<Entity>,
    grasp_buffer: ConcatenationBuffer<Entity>,
    grasped: Option<Entity>,
    grasp_type: String,
    detection_paused: bool,
    assist: Option<Box<dyn GraspAssist>>,
    assisted: Option<Entity>,
}

impl ManipulatorMonitor {
    pub fn new(config: ManipulatorConfig, registry: Arc<dyn EntityRegistry>) -> Self {
        let contact_buffer = ConcatenationBuffer::new(
            "manipulator_contact",
            config.contact_concatenate_if_smaller,
            TimerKind::ManipulatorContactDelay,
        );
        let grasp_buffer = ConcatenationBuffer::new(
            "grasp",
            config.grasp_concatenate_if_smaller,
            TimerKind::GraspDelay,
        );
        let grasp_type = config.default_grasp_type.clone();
        Self {
            config,
            registry,
            owner: None,
            lifecycle: Lifecycle::default(),
            bones: Vec::new(),
            touching: BTreeMap::new(),
            contact_buffer,
            grasp_buffer,
            grasped: None,
            grasp_type,
            detection_paused: false,
            assist: None,
            assisted: None,
        }
    }

    /// Physics backend for the grasp assist constraint
    pub fn set_grasp_assist(&mut self, assist: Box<dyn GraspAssist>) {
        self.assist = Some(assist);
    }

    pub fn config(&self) -> &ManipulatorConfig {
        &self.config
    }

    pub fn owner(&self) -> Option<&Entity> {
        self.owner.as_ref()
    }

    /// Currently grasped entity (also while its end waits in the jitter buffer)
    pub fn grasped(&self) -> Option<&Entity> {
        self.grasped.as_ref()
    }

    pub fn grasp_type(&self) -> &str {
        &self.grasp_type
    }

    pub fn is_detection_paused(&self) -> bool {
        self.detection_paused
    }

    /// Bone overlap volumes resolved at init
    pub fn bone_volumes(&self) -> impl Iterator<Item = ShapeHandle> + '_ {
        self.bones.iter().map(|b| b.volume)
    }

    /// Label attached to the next grasp begin
    pub fn set_grasp_type(&mut self, label: impl Into<String>) {
        self.grasp_type = label.into();
        debug!(monitor = %self.config.name, grasp_type = %self.grasp_type, "Grasp type changed");
    }

    /// Grasp input axis. Below the threshold grasp detection is paused when
    /// `pause_on_low_input` is set; going back above re-evaluates contacts.
    pub fn set_grasp_input(&mut self, ctx: &mut MonitorContext<'_>, value: f64) {
        if !self.config.pause_on_low_input || !self.lifecycle.is_running() {
            return;
        }
        let pause = value < self.config.input_threshold;
        if pause == self.detection_paused {
            return;
        }
        self.detection_paused = pause;
        debug!(monitor = %self.config.name, paused = pause, value, "Grasp detection toggled");

        if !pause && self.grasped.is_none() {
            let ready = self
                .touching
                .values()
                .find(|c| c.both())
                .map(|c| c.entity.clone());
            if let (Some(item), Some(owner)) = (ready, self.owner.clone()) {
                self.try_begin_grasp(ctx, &owner, &item);
            }
        }
    }

    /// Manual grasp assist toggle.
    ///
    /// Releases the attached item if there is one, otherwise attaches `target`
    /// (or the grasped / first touched entity when no target is given).
    #[instrument(name = "manipulator_manual_assist", skip(self, ctx), fields(monitor = %self.config.name))]
    pub fn trigger_grasp_assist(&mut self, ctx: &mut MonitorContext<'_>, target: Option<ActorHandle>) {
        if !self.lifecycle.is_running() {
            return;
        }
        let Some(owner) = self.owner.clone() else {
            return;
        };
        let Some(publish) = self
            .config
            .grasp_assist
            .as_ref()
            .map(|cfg| cfg.publish_manual_events)
        else {
            warn!("Grasp assist is not configured");
            return;
        };

        if let Some(item) = self.assisted.clone() {
            self.release_assist(&owner, &item);
            if publish && self.is_grasped(&item) {
                self.grasp_buffer.cancel(ctx, &item);
                self.grasped = None;
                ctx.emit(MonitorSignal::GraspEnd {
                    self_entity: owner,
                    other: item,
                    time: ctx.now(),
                });
            }
            return;
        }

        let item = match target {
            Some(actor) => self.registry.resolve_actor(actor),
            None => self
                .grasped
                .clone()
                .or_else(|| self.touching.values().next().map(|c| c.entity.clone())),
        };
        let Some(item) = item else {
            debug!("Nothing to attach");
            return;
        };

        self.attach_assist(&owner, &item);
        if publish && self.assisted.is_some() && self.grasped.is_none() {
            self.grasped = Some(item.clone());
            ctx.emit(MonitorSignal::GraspBegin {
                self_entity: owner,
                other: item,
                time: ctx.now(),
                grasp_type: self.grasp_type.clone(),
            });
        }
    }

    fn is_grasped(&self, entity: &Entity) -> bool {
        self.grasped.as_ref().is_some_and(|g| g.id == entity.id)
    }

    fn route_to_bone(&mut self, ctx: &mut MonitorContext<'_>, overlap: &OverlapNotification, begin: bool) {
        let Some(idx) = self.bones.iter().position(|b| b.volume == overlap.volume) else {
            trace!(volume = %overlap.volume, "Overlap on a volume that is not a bone");
            return;
        };

        let mut captured = Vec::new();
        {
            let mut bone_ctx = ctx.redirect(&mut captured);
            let bone = &mut self.bones[idx].shape;
            if begin {
                bone.on_overlap_begin(&mut bone_ctx, overlap);
            } else {
                bone.on_overlap_end(&mut bone_ctx, overlap);
            }
        }

        let group = self.bones[idx].group;
        self.absorb_bone_signals(ctx, group, captured);
    }

    fn absorb_bone_signals(
        &mut self,
        ctx: &mut MonitorContext<'_>,
        group: BoneGroup,
        signals: Vec<MonitorSignal>,
    ) {
        let Some(owner) = self.owner.clone() else {
            return;
        };
        for signal in signals {
            match signal {
                MonitorSignal::ContactBegin(contact) => {
                    self.on_bone_contact_begin(ctx, &owner, group, contact)
                }
                MonitorSignal::ContactEnd { other, .. } => {
                    self.on_bone_contact_end(ctx, &owner, group, other)
                }
                other => trace!(signal = other.label(), "Bone signal ignored"),
            }
        }
    }

    fn on_bone_contact_begin(
        &mut self,
        ctx: &mut MonitorContext<'_>,
        owner: &Entity,
        group: BoneGroup,
        contact: ContactSignal,
    ) {
        let other = contact.other.clone();
        let contacts = self
            .touching
            .entry(other.id)
            .or_insert_with(|| BoneContacts::new(other.clone()));
        let first = contacts.total() == 0;
        *contacts.count_mut(group) += 1;
        trace!(other = %other, %group, a = contacts.group_a, b = contacts.group_b, "Bone contact begin");

        if first {
            self.manipulator_contact_begin(ctx, owner, contact);
        }
        self.try_begin_grasp(ctx, owner, &other);
    }

    fn on_bone_contact_end(
        &mut self,
        ctx: &mut MonitorContext<'_>,
        owner: &Entity,
        group: BoneGroup,
        other: Entity,
    ) {
        let Some(contacts) = self.touching.get_mut(&other.id) else {
            trace!(other = %other, "Bone contact end without begin");
            return;
        };
        let count = contacts.count_mut(group);
        *count = count.saturating_sub(1);
        let both = contacts.both();
        let last = contacts.total() == 0;
        if last {
            self.touching.remove(&other.id);
        }

        let now = ctx.now();
        if !both && self.is_grasped(&other) && !self.grasp_buffer.contains(&other) {
            if self.grasp_buffer.is_enabled() {
                self.grasp_buffer.record_end(ctx, other.clone(), now);
            } else {
                self.finalize_grasp_end(
                    ctx,
                    owner,
                    EndedRecord {
                        key: other.clone(),
                        end_time: now,
                    },
                );
            }
        }

        if last {
            if self.contact_buffer.is_enabled() {
                self.contact_buffer.record_end(ctx, other, now);
            } else {
                ctx.emit(MonitorSignal::ContactEnd {
                    self_entity: owner.clone(),
                    other,
                    time: now,
                });
            }
        }
    }

    fn manipulator_contact_begin(&mut self, ctx: &mut MonitorContext<'_>, owner: &Entity, contact: ContactSignal) {
        let now = ctx.now();
        match self.contact_buffer.try_concatenate(ctx, &contact.other, now) {
            Concatenation::Concatenated => return,
            Concatenation::Stale(record) => ctx.emit(MonitorSignal::ContactEnd {
                self_entity: owner.clone(),
                other: record.key,
                time: record.end_time,
            }),
            Concatenation::Fresh => {}
        }
        ctx.emit(MonitorSignal::ContactBegin(ContactSignal {
            self_entity: owner.clone(),
            time: now,
            ..contact
        }));
    }

    fn try_begin_grasp(&mut self, ctx: &mut MonitorContext<'_>, owner: &Entity, other: &Entity) {
        if self.detection_paused {
            trace!(other = %other, "Grasp detection paused");
            return;
        }
        if !self.touching.get(&other.id).is_some_and(BoneContacts::both) {
            return;
        }

        let now = ctx.now();
        if let Some(current) = self.grasped.clone() {
            if current.id == other.id {
                match self.grasp_buffer.try_concatenate(ctx, other, now) {
                    Concatenation::Concatenated => {
                        debug!(other = %other, "Grasp continues after jitter");
                        return;
                    }
                    Concatenation::Stale(record) => self.finalize_grasp_end(ctx, owner, record),
                    // already grasped
                    Concatenation::Fresh => return,
                }
            } else {
                for record in self.grasp_buffer.take_expired(now) {
                    self.finalize_grasp_end(ctx, owner, record);
                }
                if let Some(current) = &self.grasped {
                    counter!("semlog_anomalies_total", "kind" => "concurrent_grasp").increment(1);
                    warn!(
                        monitor = %self.config.name,
                        grasped = %current,
                        rejected = %other,
                        "Grasp begin rejected, another entity is already grasped"
                    );
                    return;
                }
            }
        }

        debug!(monitor = %self.config.name, other = %other, grasp_type = %self.grasp_type, "Grasp begin");
        self.grasped = Some(other.clone());
        ctx.emit(MonitorSignal::GraspBegin {
            self_entity: owner.clone(),
            other: other.clone(),
            time: now,
            grasp_type: self.grasp_type.clone(),
        });

        let automatic = self
            .config
            .grasp_assist
            .as_ref()
            .is_some_and(|cfg| !cfg.manual_override);
        if automatic {
            self.attach_assist(owner, other);
        }
    }

    fn finalize_grasp_end(&mut self, ctx: &mut MonitorContext<'_>, owner: &Entity, record: EndedRecord<Entity>) {
        if self.is_grasped(&record.key) {
            self.grasped = None;
        }
        self.release_assist(owner, &record.key);
        debug!(monitor = %self.config.name, other = %record.key, end = record.end_time, "Grasp end");
        ctx.emit(MonitorSignal::GraspEnd {
            self_entity: owner.clone(),
            other: record.key,
            time: record.end_time,
        });
    }

    fn attach_assist(&mut self, owner: &Entity, item: &Entity) {
        let Some(config) = self.config.grasp_assist.as_ref() else {
            return;
        };
        let Some(assist) = self.assist.as_mut() else {
            trace!("No grasp assist backend");
            return;
        };
        if self.assisted.is_some() {
            return;
        }
        if assist.attach(owner, item, config) {
            self.assisted = Some(item.clone());
        } else {
            warn!(monitor = %self.config.name, item = %item, "Grasp assist attach refused");
        }
    }

    fn release_assist(&mut self, owner: &Entity, item: &Entity) {
        if !self.assisted.as_ref().is_some_and(|a| a.id == item.id) {
            return;
        }
        self.assisted = None;
        if let Some(assist) = self.assist.as_mut() {
            assist.release(owner, item);
        }
    }
}

impl Monitor for ManipulatorMonitor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[instrument(name = "manipulator_init", skip(self, ctx), fields(monitor = %self.config.name))]
    fn init(&mut self, ctx: &mut MonitorContext<'_>) -> Result<(), MonitorError> {
        let name = self.config.name.clone();
        if self.lifecycle.is_init() || self.lifecycle.is_finished() {
            return Err(MonitorError::AlreadyInitialized { monitor: name });
        }
        if self.config.grasp_concatenate_if_smaller < 0.0
            || self.config.contact_concatenate_if_smaller < 0.0
        {
            return Err(MonitorError::invalid_config(
                &name,
                "concatenation gaps must be >= 0",
            ));
        }

        let owner = self
            .registry
            .resolve_actor(self.config.owner)
            .ok_or_else(|| MonitorError::owner_not_annotated(&name, self.config.owner))?;

        let (group_a, group_b) = self.config.bone_groups();
        let mut bones = Vec::new();
        for (group, names) in [(BoneGroup::A, group_a), (BoneGroup::B, group_b)] {
            if names.is_empty() {
                return Err(MonitorError::EmptyBoneGroup {
                    monitor: name,
                    group,
                });
            }
            for bone in names {
                let volume = ctx
                    .physics()
                    .bone_volume(owner.actor, &bone)
                    .ok_or_else(|| MonitorError::bone_not_found(&name, group, &bone))?;
                let mut shape = ContactShapeMonitor::bone(
                    ContactShapeConfig::new(format!("{name}/{bone}"), self.config.owner, volume),
                    Arc::clone(&self.registry),
                );
                shape.init(ctx)?;
                bones.push(BoneMonitor {
                    group,
                    volume,
                    shape,
                });
            }
        }

        if self.config.grasp_assist.is_some() && self.assist.is_none() {
            debug!("Grasp assist configured without a backend, attach/release are skipped");
        }
        debug!(owner = %owner, bones = bones.len(), "Manipulator initialized");

        self.bones = bones;
        self.owner = Some(owner);
        self.lifecycle.mark_init();
        Ok(())
    }

    fn start(&mut self, ctx: &mut MonitorContext<'_>) {
        if !self.lifecycle.mark_started() {
            return;
        }
        for idx in 0..self.bones.len() {
            let mut captured = Vec::new();
            self.bones[idx].shape.start(&mut ctx.redirect(&mut captured));
            let group = self.bones[idx].group;
            self.absorb_bone_signals(ctx, group, captured);
        }
    }

    #[instrument(name = "manipulator_finish", skip(self, ctx), fields(monitor = %self.config.name))]
    fn finish(&mut self, ctx: &mut MonitorContext<'_>, forced: bool) {
        if !self.lifecycle.mark_finished() {
            return;
        }

        if let Some(owner) = self.owner.clone() {
            let now = ctx.now();
            for record in self.grasp_buffer.drain(ctx) {
                self.finalize_grasp_end(ctx, &owner, record);
            }
            if let Some(item) = self.grasped.clone() {
                self.finalize_grasp_end(
                    ctx,
                    &owner,
                    EndedRecord {
                        key: item,
                        end_time: now,
                    },
                );
            }
            if let Some(item) = self.assisted.clone() {
                self.release_assist(&owner, &item);
            }

            for record in self.contact_buffer.drain(ctx) {
                ctx.emit(MonitorSignal::ContactEnd {
                    self_entity: owner.clone(),
                    other: record.key,
                    time: record.end_time,
                });
            }
            for (_, contacts) in std::mem::take(&mut self.touching) {
                ctx.emit(MonitorSignal::ContactEnd {
                    self_entity: owner.clone(),
                    other: contacts.entity,
                    time: now,
                });
            }
        }

        let mut discarded = Vec::new();
        let mut bone_ctx = ctx.redirect(&mut discarded);
        for bone in &mut self.bones {
            bone.shape.finish(&mut bone_ctx, forced);
        }
        debug!(forced, "Manipulator finished");
    }

    fn on_overlap_begin(&mut self, ctx: &mut MonitorContext<'_>, overlap: &OverlapNotification) {
        if self.lifecycle.is_running() {
            self.route_to_bone(ctx, overlap, true);
        }
    }

    fn on_overlap_end(&mut self, ctx: &mut MonitorContext<'_>, overlap: &OverlapNotification) {
        if self.lifecycle.is_running() {
            self.route_to_bone(ctx, overlap, false);
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
            TimerKind::GraspDelay => {
                for record in self.grasp_buffer.flush(ctx) {
                    self.finalize_grasp_end(ctx, &owner, record);
                }
            }
            TimerKind::ManipulatorContactDelay => {
                for record in self.contact_buffer.flush(ctx) {
                    ctx.emit(MonitorSignal::ContactEnd {
                        self_entity: owner.clone(),
                        other: record.key,
                        time: record.end_time,
                    });
                }
            }
            other => warn!(monitor = %self.config.name, timer = %other, "Unexpected timer"),
        }
    }
}
