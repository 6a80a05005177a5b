//! Per-call monitor context.

use std::fmt;

use contracts::{MonitorSignal, PhysicsView};
use metrics::counter;

use crate::scheduler::{Scheduler, TimerHandle, TimerKind};

/// Identity of a monitor inside a hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorId(pub usize);

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "monitor#{}", self.0)
    }
}

/// Everything a monitor may touch while handling one input.
///
/// Carries the current simulation time, the timer facility scoped to the
/// calling monitor, the read-only physics view and the outbound signal queue.
pub struct MonitorContext<'a> {
    now: f64,
    owner: MonitorId,
    scheduler: &'a mut Scheduler,
    physics: &'a dyn PhysicsView,
    outbox: &'a mut Vec<MonitorSignal>,
}

impl<'a> MonitorContext<'a> {
    pub fn new(
        now: f64,
        owner: MonitorId,
        scheduler: &'a mut Scheduler,
        physics: &'a dyn PhysicsView,
        outbox: &'a mut Vec<MonitorSignal>,
    ) -> Self {
        Self {
            now,
            owner,
            scheduler,
            physics,
            outbox,
        }
    }

    /// Current simulation time
    #[inline]
    pub fn now(&self) -> f64 {
        self.now
    }

    #[inline]
    pub fn owner(&self) -> MonitorId {
        self.owner
    }

    #[inline]
    pub fn physics(&self) -> &'a dyn PhysicsView {
        self.physics
    }

    /// Queue an outbound signal
    pub fn emit(&mut self, signal: MonitorSignal) {
        counter!("semlog_signals_total", "kind" => signal.label()).increment(1);
        self.outbox.push(signal);
    }

    /// Same monitor and clock, different outbound queue.
    ///
    /// Used by composite monitors to capture what an inner monitor emits.
    pub fn redirect<'b>(&'b mut self, outbox: &'b mut Vec<MonitorSignal>) -> MonitorContext<'b> {
        MonitorContext {
            now: self.now,
            owner: self.owner,
            scheduler: &mut *self.scheduler,
            physics: self.physics,
            outbox,
        }
    }

    /// Arm a timer for the calling monitor
    pub fn set_timer(&mut self, kind: TimerKind, delay: f64, looping: bool) -> TimerHandle {
        self.scheduler
            .set_timer(self.owner, kind, self.now, delay, looping)
    }

    /// Cancel and forget a timer slot
    pub fn clear_timer(&mut self, slot: &mut Option<TimerHandle>) {
        if let Some(handle) = slot.take() {
            self.scheduler.clear(handle);
        }
    }

    pub fn pause_timer(&mut self, handle: TimerHandle) {
        self.scheduler.pause(handle, self.now);
    }

    pub fn unpause_timer(&mut self, handle: TimerHandle) {
        self.scheduler.unpause(handle, self.now);
    }

    pub fn timer_active(&self, handle: TimerHandle) -> bool {
        self.scheduler.is_active(handle)
    }

    pub fn timer_paused(&self, handle: TimerHandle) -> bool {
        self.scheduler.is_paused(handle)
    }
}
