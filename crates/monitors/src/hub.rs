//! Monitor hub: routing, timers and signal fan-out on one thread.
//!
//! The hub owns every monitor, the scheduler and the listeners. Physics
//! notifications are routed by volume handle; before any notification is
//! handled the hub advances simulation time, firing due timers in order.
//! Signals emitted by a manipulator are also fed to the reach monitor bound
//! to it, and whatever that produces is queued behind them.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use contracts::{
    ActorHandle, ContactShapeConfig, EntityRegistry, LoggerBlueprint, ManipulatorConfig,
    MonitorSignal, OverlapNotification, PhysicsView, ReachConfig, ShapeHandle, SignalListener,
};
use slab::Slab;
use tracing::{debug, info, instrument, trace, warn};

use crate::contact_shape::ContactShapeMonitor;
use crate::context::{MonitorContext, MonitorId};
use crate::grasp_assist::GraspAssist;
use crate::lifecycle::Lifecycle;
use crate::manipulator::ManipulatorMonitor;
use crate::monitor::Monitor;
use crate::reach::ReachMonitor;
use crate::scheduler::{Scheduler, TIME_EPSILON};
use crate::MonitorError;

enum MonitorSlot {
    ContactShape(ContactShapeMonitor),
    Manipulator(ManipulatorMonitor),
    Reach(ReachMonitor),
}

impl MonitorSlot {
    fn monitor(&self) -> &dyn Monitor {
        match self {
            MonitorSlot::ContactShape(m) => m,
            MonitorSlot::Manipulator(m) => m,
            MonitorSlot::Reach(m) => m,
        }
    }

    fn monitor_mut(&mut self) -> &mut dyn Monitor {
        match self {
            MonitorSlot::ContactShape(m) => m,
            MonitorSlot::Manipulator(m) => m,
            MonitorSlot::Reach(m) => m,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            MonitorSlot::ContactShape(_) => "contact_shape",
            MonitorSlot::Manipulator(_) => "manipulator",
            MonitorSlot::Reach(_) => "reach",
        }
    }
}

/// Hub counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Notifications delivered to a monitor
    pub overlaps_routed: u64,
    /// Notifications for volumes nobody watches
    pub overlaps_unrouted: u64,
    pub timers_fired: u64,
    /// Signals handed to listeners
    pub signals: u64,
    pub init_failures: u64,
}

/// Owner of all monitors of one episode
pub struct MonitorHub {
    registry: Arc<dyn EntityRegistry>,
    monitors: Slab<MonitorSlot>,
    scheduler: Scheduler,
    routes: HashMap<ShapeHandle, MonitorId>,
    /// manipulator -> reach monitor fed by it
    reach_links: HashMap<MonitorId, MonitorId>,
    listeners: Vec<Box<dyn SignalListener + Send>>,
    now: f64,
    finished: bool,
    stats: HubStats,
}

impl MonitorHub {
    pub fn new(registry: Arc<dyn EntityRegistry>) -> Self {
        Self {
            registry,
            monitors: Slab::new(),
            scheduler: Scheduler::new(),
            routes: HashMap::new(),
            reach_links: HashMap::new(),
            listeners: Vec::new(),
            now: 0.0,
            finished: false,
            stats: HubStats::default(),
        }
    }

    /// Hub with every monitor declared in the blueprint
    pub fn from_blueprint(blueprint: &LoggerBlueprint, registry: Arc<dyn EntityRegistry>) -> Self {
        let mut hub = Self::new(registry);
        for config in &blueprint.contact_shapes {
            hub.add_contact_shape(config.clone());
        }
        for config in &blueprint.manipulators {
            hub.add_manipulator(config.clone());
        }
        for config in &blueprint.reach_monitors {
            hub.add_reach(config.clone());
        }
        hub
    }

    pub fn add_contact_shape(&mut self, config: ContactShapeConfig) -> MonitorId {
        let volume = config.volume;
        let monitor = ContactShapeMonitor::new(config, Arc::clone(&self.registry));
        let id = MonitorId(self.monitors.insert(MonitorSlot::ContactShape(monitor)));
        self.route(volume, id);
        id
    }

    /// Bone volumes are routed once `init_all` resolved them
    pub fn add_manipulator(&mut self, config: ManipulatorConfig) -> MonitorId {
        let monitor = ManipulatorMonitor::new(config, Arc::clone(&self.registry));
        MonitorId(self.monitors.insert(MonitorSlot::Manipulator(monitor)))
    }

    pub fn add_reach(&mut self, config: ReachConfig) -> MonitorId {
        let volume = config.volume;
        let monitor = ReachMonitor::new(config, Arc::clone(&self.registry));
        let id = MonitorId(self.monitors.insert(MonitorSlot::Reach(monitor)));
        self.route(volume, id);
        id
    }

    pub fn add_listener(&mut self, listener: Box<dyn SignalListener + Send>) {
        self.listeners.push(listener);
    }

    pub fn set_grasp_assist(
        &mut self,
        id: MonitorId,
        assist: Box<dyn GraspAssist>,
    ) -> Result<(), MonitorError> {
        match self.monitors.get_mut(id.0) {
            Some(MonitorSlot::Manipulator(m)) => {
                m.set_grasp_assist(assist);
                Ok(())
            }
            _ => Err(MonitorError::unknown_monitor(id, "not a manipulator")),
        }
    }

    fn route(&mut self, volume: ShapeHandle, id: MonitorId) {
        if let Some(previous) = self.routes.insert(volume, id) {
            warn!(%volume, %previous, replacement = %id, "Volume routed to another monitor");
        }
    }

    /// Initialize every monitor. Failed monitors stay inert; their errors are returned.
    #[instrument(name = "hub_init_all", skip(self, physics), fields(monitors = self.monitors.len()))]
    pub fn init_all(&mut self, physics: &dyn PhysicsView) -> Vec<(String, MonitorError)> {
        self.bind_reach_siblings();

        let ids: Vec<MonitorId> = self.monitors.iter().map(|(key, _)| MonitorId(key)).collect();
        let mut failures = Vec::new();
        for id in ids {
            let Some(result) = self.dispatch(physics, id, |slot, ctx| slot.monitor_mut().init(ctx))
            else {
                continue;
            };
            match result {
                Ok(()) => {
                    if let Some(MonitorSlot::Manipulator(m)) = self.monitors.get(id.0) {
                        let volumes: Vec<ShapeHandle> = m.bone_volumes().collect();
                        for volume in volumes {
                            self.route(volume, id);
                        }
                    }
                }
                Err(err) => {
                    let name = self.monitor_name(id);
                    warn!(monitor = %name, error = %err, "Monitor init failed, it stays inert");
                    self.stats.init_failures += 1;
                    failures.push((name, err));
                }
            }
        }
        info!(
            initialized = self.monitors.len() - failures.len(),
            failed = failures.len(),
            "Monitors initialized"
        );
        failures
    }

    fn bind_reach_siblings(&mut self) {
        let manipulators: HashMap<ActorHandle, MonitorId> = self
            .monitors
            .iter()
            .filter_map(|(key, slot)| match slot {
                MonitorSlot::Manipulator(m) => Some((m.config().owner, MonitorId(key))),
                _ => None,
            })
            .collect();

        for (key, slot) in self.monitors.iter_mut() {
            if let MonitorSlot::Reach(reach) = slot {
                if let Some(&manipulator) = manipulators.get(&reach.config().owner) {
                    reach.bind_manipulator(manipulator);
                    self.reach_links.insert(manipulator, MonitorId(key));
                }
            }
        }
    }

    pub fn start_all(&mut self, physics: &dyn PhysicsView) {
        let ids: Vec<MonitorId> = self.monitors.iter().map(|(key, _)| MonitorId(key)).collect();
        for id in ids {
            self.dispatch(physics, id, |slot, ctx| slot.monitor_mut().start(ctx));
        }
    }

    /// Move simulation time forward to `time`, firing due timers at their due times
    pub fn advance_to(&mut self, physics: &dyn PhysicsView, time: f64) {
        if time + TIME_EPSILON < self.now {
            warn!(now = self.now, requested = time, "Simulation time cannot move backwards");
            return;
        }
        while let Some(fired) = self.scheduler.pop_due(time) {
            self.now = self.now.max(fired.time);
            self.stats.timers_fired += 1;
            trace!(timer = %fired.kind, monitor = %fired.owner, at = fired.time, "Timer fired");
            let handled = self
                .dispatch(physics, fired.owner, |slot, ctx| {
                    slot.monitor_mut().on_timer(ctx, fired.kind)
                })
                .is_some();
            if !handled {
                debug!(monitor = %fired.owner, "Timer owner gone");
                self.scheduler.clear(fired.handle);
            }
        }
        self.now = self.now.max(time);
    }

    pub fn overlap_begin(&mut self, physics: &dyn PhysicsView, overlap: &OverlapNotification) {
        self.overlap(physics, overlap, true);
    }

    pub fn overlap_end(&mut self, physics: &dyn PhysicsView, overlap: &OverlapNotification) {
        self.overlap(physics, overlap, false);
    }

    fn overlap(&mut self, physics: &dyn PhysicsView, overlap: &OverlapNotification, begin: bool) {
        self.advance_to(physics, overlap.timestamp);
        let Some(&id) = self.routes.get(&overlap.volume) else {
            self.stats.overlaps_unrouted += 1;
            trace!(volume = %overlap.volume, "Overlap on an unwatched volume");
            return;
        };
        self.stats.overlaps_routed += 1;
        self.dispatch(physics, id, |slot, ctx| {
            let monitor = slot.monitor_mut();
            if begin {
                monitor.on_overlap_begin(ctx, overlap);
            } else {
                monitor.on_overlap_end(ctx, overlap);
            }
        });
    }

    pub fn set_grasp_type(&mut self, id: MonitorId, label: &str) -> Result<(), MonitorError> {
        match self.monitors.get_mut(id.0) {
            Some(MonitorSlot::Manipulator(m)) => {
                m.set_grasp_type(label);
                Ok(())
            }
            _ => Err(MonitorError::unknown_monitor(id, "not a manipulator")),
        }
    }

    pub fn set_grasp_input(
        &mut self,
        physics: &dyn PhysicsView,
        id: MonitorId,
        value: f64,
    ) -> Result<(), MonitorError> {
        self.dispatch(physics, id, |slot, ctx| match slot {
            MonitorSlot::Manipulator(m) => {
                m.set_grasp_input(ctx, value);
                Ok(())
            }
            _ => Err(MonitorError::unknown_monitor(id, "not a manipulator")),
        })
        .unwrap_or_else(|| Err(MonitorError::unknown_monitor(id, "no such monitor")))
    }

    pub fn trigger_grasp_assist(
        &mut self,
        physics: &dyn PhysicsView,
        id: MonitorId,
        target: Option<ActorHandle>,
    ) -> Result<(), MonitorError> {
        self.dispatch(physics, id, |slot, ctx| match slot {
            MonitorSlot::Manipulator(m) => {
                m.trigger_grasp_assist(ctx, target);
                Ok(())
            }
            _ => Err(MonitorError::unknown_monitor(id, "not a manipulator")),
        })
        .unwrap_or_else(|| Err(MonitorError::unknown_monitor(id, "no such monitor")))
    }

    /// Finish every monitor at the current time, then tell listeners no more signals follow
    #[instrument(name = "hub_finish_all", skip(self, physics), fields(now = self.now))]
    pub fn finish_all(&mut self, physics: &dyn PhysicsView, forced: bool) {
        if self.finished {
            return;
        }
        let ids: Vec<MonitorId> = self.monitors.iter().map(|(key, _)| MonitorId(key)).collect();
        for id in ids {
            self.dispatch(physics, id, |slot, ctx| slot.monitor_mut().finish(ctx, forced));
            self.scheduler.clear_owner(id);
        }
        for listener in &mut self.listeners {
            listener.on_finish(self.now);
        }
        self.finished = true;
        info!(stats = ?self.stats, "Monitors finished");
    }

    /// Current simulation time
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn stats(&self) -> HubStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Look a monitor up by its configured name
    pub fn monitor_id(&self, name: &str) -> Option<MonitorId> {
        self.monitors
            .iter()
            .find(|(_, slot)| slot.monitor().name() == name)
            .map(|(key, _)| MonitorId(key))
    }

    pub fn lifecycle(&self, id: MonitorId) -> Option<Lifecycle> {
        self.monitors.get(id.0).map(|slot| *slot.monitor().lifecycle())
    }

    pub fn manipulator(&self, id: MonitorId) -> Option<&ManipulatorMonitor> {
        match self.monitors.get(id.0) {
            Some(MonitorSlot::Manipulator(m)) => Some(m),
            _ => None,
        }
    }

    pub fn reach(&self, id: MonitorId) -> Option<&ReachMonitor> {
        match self.monitors.get(id.0) {
            Some(MonitorSlot::Reach(m)) => Some(m),
            _ => None,
        }
    }

    fn monitor_name(&self, id: MonitorId) -> String {
        self.monitors
            .get(id.0)
            .map(|slot| format!("{} {}", slot.kind(), slot.monitor().name()))
            .unwrap_or_else(|| id.to_string())
    }

    /// Run `f` against one monitor, then deliver what it emitted
    fn dispatch<R>(
        &mut self,
        physics: &dyn PhysicsView,
        id: MonitorId,
        f: impl FnOnce(&mut MonitorSlot, &mut MonitorContext<'_>) -> R,
    ) -> Option<R> {
        let mut outbox = Vec::new();
        let slot = self.monitors.get_mut(id.0)?;
        let result = {
            let mut ctx = MonitorContext::new(self.now, id, &mut self.scheduler, physics, &mut outbox);
            f(slot, &mut ctx)
        };
        self.deliver(physics, id, outbox);
        Some(result)
    }

    fn deliver(&mut self, physics: &dyn PhysicsView, source: MonitorId, signals: Vec<MonitorSignal>) {
        let mut queue: VecDeque<(MonitorId, MonitorSignal)> =
            signals.into_iter().map(|signal| (source, signal)).collect();

        while let Some((from, signal)) = queue.pop_front() {
            self.stats.signals += 1;
            for listener in &mut self.listeners {
                listener.on_signal(&signal);
            }

            let Some(&reach_id) = self.reach_links.get(&from) else {
                continue;
            };
            let relevant = matches!(
                signal,
                MonitorSignal::ContactBegin(_)
                    | MonitorSignal::ContactEnd { .. }
                    | MonitorSignal::GraspBegin { .. }
                    | MonitorSignal::GraspEnd { .. }
            );
            if !relevant {
                continue;
            }

            let mut derived = Vec::new();
            if let Some(MonitorSlot::Reach(reach)) = self.monitors.get_mut(reach_id.0) {
                let mut ctx = MonitorContext::new(
                    self.now,
                    reach_id,
                    &mut self.scheduler,
                    physics,
                    &mut derived,
                );
                reach.on_manipulator_signal(&mut ctx, &signal);
            }
            queue.extend(derived.into_iter().map(|signal| (reach_id, signal)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entity, mesh_overlap, registry, StubPhysics};
    use contracts::{BonePreset, EntityKind, Vector3};
    use std::sync::Mutex;

    const TABLE_VOLUME: ShapeHandle = ShapeHandle(301);
    const REACH_VOLUME: ShapeHandle = ShapeHandle(901);
    const INDEX: ShapeHandle = ShapeHandle(11);
    const THUMB: ShapeHandle = ShapeHandle(12);

    fn tap(hub: &mut MonitorHub) -> Arc<Mutex<Vec<MonitorSignal>>> {
        let signals = Arc::new(Mutex::new(Vec::new()));
        hub.add_listener(Box::new(Arc::clone(&signals)));
        signals
    }

    fn labels(signals: &Arc<Mutex<Vec<MonitorSignal>>>) -> Vec<&'static str> {
        signals.lock().unwrap().iter().map(|s| s.label()).collect()
    }

    fn hand_hub(physics: &mut StubPhysics) -> (MonitorHub, MonitorId, MonitorId) {
        physics.bones.insert((ActorHandle(1), "index".into()), INDEX);
        physics.bones.insert((ActorHandle(1), "thumb".into()), THUMB);

        let reg = registry(&[entity(1, EntityKind::Skeletal), entity(2, EntityKind::Rigid)]);
        let mut hub = MonitorHub::new(reg);

        let mut hand = ManipulatorConfig::new("left_hand", ActorHandle(1));
        hand.preset = BonePreset::Custom;
        hand.group_a = vec!["index".into()];
        hand.group_b = vec!["thumb".into()];
        let hand_id = hub.add_manipulator(hand);
        let reach_id = hub.add_reach(ReachConfig::new("left_reach", ActorHandle(1), REACH_VOLUME));
        (hub, hand_id, reach_id)
    }

    #[test]
    fn test_contact_shape_through_hub() {
        let physics = StubPhysics::default();
        let reg = registry(&[entity(3, EntityKind::Static), entity(2, EntityKind::Rigid)]);
        let mut hub = MonitorHub::new(reg);
        let mut config = ContactShapeConfig::new("table", ActorHandle(3), TABLE_VOLUME);
        config.concatenate_if_smaller = 0.2;
        hub.add_contact_shape(config);
        let signals = tap(&mut hub);

        assert!(hub.init_all(&physics).is_empty());
        hub.start_all(&physics);

        hub.overlap_begin(&physics, &mesh_overlap(TABLE_VOLUME, 2, 0.0));
        hub.overlap_end(&physics, &mesh_overlap(TABLE_VOLUME, 2, 0.1));
        hub.overlap_begin(&physics, &mesh_overlap(TABLE_VOLUME, 2, 0.15));
        hub.overlap_end(&physics, &mesh_overlap(TABLE_VOLUME, 2, 1.0));
        assert_eq!(labels(&signals), vec!["contact_begin"]);

        hub.advance_to(&physics, 2.0);
        assert_eq!(labels(&signals), vec!["contact_begin", "contact_end"]);
        assert_eq!(hub.stats().overlaps_routed, 4);
    }

    #[test]
    fn test_unwatched_volume_is_counted() {
        let physics = StubPhysics::default();
        let mut hub = MonitorHub::new(registry(&[]));
        hub.init_all(&physics);
        hub.start_all(&physics);
        hub.overlap_begin(&physics, &mesh_overlap(ShapeHandle(5), 2, 0.1));
        assert_eq!(hub.stats().overlaps_unrouted, 1);
    }

    #[test]
    fn test_reach_fed_by_manipulator() {
        let mut physics = StubPhysics::default();
        physics.locations.insert(ActorHandle(1), Vector3::default());
        physics.locations.insert(ActorHandle(2), Vector3::new(2.0, 0.0, 0.0));
        let (mut hub, hand_id, reach_id) = hand_hub(&mut physics);
        let signals = tap(&mut hub);

        assert!(hub.init_all(&physics).is_empty());
        assert_eq!(hub.reach(reach_id).and_then(|r| r.sibling()), Some(hand_id));
        hub.start_all(&physics);

        hub.overlap_begin(&physics, &mesh_overlap(REACH_VOLUME, 2, 0.0));
        physics.locations.insert(ActorHandle(2), Vector3::new(0.05, 0.0, 0.0));
        hub.overlap_begin(&physics, &mesh_overlap(INDEX, 2, 3.0));
        hub.overlap_begin(&physics, &mesh_overlap(THUMB, 2, 3.5));

        let recorded = signals.lock().unwrap().clone();
        let intervals: Vec<_> = recorded
            .iter()
            .filter_map(|s| match s {
                MonitorSignal::Reach { start, end, .. } => Some(("reach", *start, *end)),
                MonitorSignal::PreGrasp { start, end, .. } => Some(("pre_grasp", *start, *end)),
                _ => None,
            })
            .collect();
        assert_eq!(intervals, vec![("reach", 0.0, 3.0), ("pre_grasp", 3.0, 3.5)]);

        // grasp begin is delivered to listeners before the derived intervals
        let grasp_pos = recorded.iter().position(|s| s.label() == "grasp_begin");
        let reach_pos = recorded.iter().position(|s| s.label() == "reach");
        assert!(grasp_pos < reach_pos);
    }

    #[test]
    fn test_reach_without_manipulator_is_inert() {
        let physics = StubPhysics::default();
        let reg = registry(&[entity(1, EntityKind::Skeletal)]);
        let mut hub = MonitorHub::new(reg);
        let id = hub.add_reach(ReachConfig::new("lonely", ActorHandle(1), REACH_VOLUME));

        let failures = hub.init_all(&physics);
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1, MonitorError::MissingSibling { .. }));
        assert_eq!(hub.stats().init_failures, 1);
        assert!(!hub.lifecycle(id).unwrap().is_init());
    }

    #[test]
    fn test_time_never_moves_backwards() {
        let physics = StubPhysics::default();
        let mut hub = MonitorHub::new(registry(&[]));
        hub.advance_to(&physics, 2.0);
        hub.advance_to(&physics, 1.0);
        assert_eq!(hub.now(), 2.0);
    }

    #[test]
    fn test_finish_all_notifies_listeners_once() {
        #[derive(Default)]
        struct FinishCounter(u32);
        impl SignalListener for FinishCounter {
            fn on_finish(&mut self, _time: f64) {
                self.0 += 1;
            }
        }

        let mut physics = StubPhysics::default();
        let (mut hub, hand_id, _) = hand_hub(&mut physics);
        let counter = Arc::new(Mutex::new(FinishCounter::default()));
        hub.add_listener(Box::new(Arc::clone(&counter)));
        let signals = tap(&mut hub);

        hub.init_all(&physics);
        hub.start_all(&physics);
        hub.overlap_begin(&physics, &mesh_overlap(INDEX, 2, 0.5));
        hub.overlap_begin(&physics, &mesh_overlap(THUMB, 2, 0.6));
        hub.advance_to(&physics, 1.0);
        hub.finish_all(&physics, false);
        hub.finish_all(&physics, true);

        assert_eq!(counter.lock().unwrap().0, 1);
        assert!(hub.is_finished());
        assert!(hub.lifecycle(hand_id).unwrap().is_finished());
        let labels = labels(&signals);
        assert!(labels.contains(&"grasp_end"));
        assert_eq!(labels.last(), Some(&"contact_end"));
    }

    #[test]
    fn test_grasp_controls_require_a_manipulator() {
        let physics = StubPhysics::default();
        let reg = registry(&[entity(3, EntityKind::Static)]);
        let mut hub = MonitorHub::new(reg);
        let table = hub.add_contact_shape(ContactShapeConfig::new("table", ActorHandle(3), TABLE_VOLUME));

        assert!(hub.set_grasp_type(table, "Pinch").is_err());
        assert!(hub.set_grasp_input(&physics, table, 0.0).is_err());
        assert!(hub.set_grasp_input(&physics, MonitorId(99), 0.0).is_err());
        assert_eq!(hub.monitor_id("table"), Some(table));
    }
}
