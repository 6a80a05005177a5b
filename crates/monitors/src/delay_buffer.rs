//! Jitter concatenation buffer.
//!
//! An ended interaction is parked here instead of being reported. If the same
//! key begins again within `gap` seconds the end and the new begin cancel out
//! and the interaction continues. Otherwise a flush timer finalizes the end
//! at the time it was first observed.
//!
//! One implementation serves contact shapes, manipulator contacts, grasps and
//! reach contacts; only the key type and the timer kind differ.

use std::fmt::Debug;

use contracts::DELAY_BUFFER_FLUSH_FACTOR;
use metrics::counter;
use tracing::trace;

use crate::context::MonitorContext;
use crate::scheduler::{TimerHandle, TimerKind};

/// A parked end
#[derive(Debug, Clone, PartialEq)]
pub struct EndedRecord<K> {
    pub key: K,
    pub end_time: f64,
}

/// Result of checking a begin against parked ends
#[derive(Debug, Clone, PartialEq)]
pub enum Concatenation<K> {
    /// The begin continues the parked interaction; report neither
    Concatenated,
    /// A parked end for this key is older than the gap; the caller must
    /// finalize it before reporting the new begin
    Stale(EndedRecord<K>),
    /// Nothing parked for this key
    Fresh,
}

/// Recently-ended list plus its flush timer
#[derive(Debug)]
pub struct ConcatenationBuffer<K> {
    name: &'static str,
    gap: f64,
    timer_kind: TimerKind,
    recently_ended: Vec<EndedRecord<K>>,
    timer: Option<TimerHandle>,
}

impl<K: PartialEq + Clone + Debug> ConcatenationBuffer<K> {
    /// `gap` of zero disables concatenation
    pub fn new(name: &'static str, gap: f64, timer_kind: TimerKind) -> Self {
        Self {
            name,
            gap: gap.max(0.0),
            timer_kind,
            recently_ended: Vec::new(),
            timer: None,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.gap > 0.0
    }

    #[inline]
    pub fn gap(&self) -> f64 {
        self.gap
    }

    pub fn len(&self) -> usize {
        self.recently_ended.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recently_ended.is_empty()
    }

    /// Is an end parked for `key`
    pub fn contains(&self, key: &K) -> bool {
        self.recently_ended.iter().any(|r| &r.key == key)
    }

    /// Park an end and make sure a flush is scheduled
    pub fn record_end(&mut self, ctx: &mut MonitorContext<'_>, key: K, end_time: f64) {
        trace!(buffer = self.name, key = ?key, end_time, "End parked");
        self.recently_ended.push(EndedRecord { key, end_time });

        let running = self.timer.is_some_and(|h| ctx.timer_active(h));
        if !running {
            self.timer = Some(ctx.set_timer(
                self.timer_kind,
                self.gap * DELAY_BUFFER_FLUSH_FACTOR,
                false,
            ));
        }
    }

    /// Check a begin at `begin_time` against the parked ends
    pub fn try_concatenate(
        &mut self,
        ctx: &mut MonitorContext<'_>,
        key: &K,
        begin_time: f64,
    ) -> Concatenation<K> {
        let Some(pos) = self.recently_ended.iter().position(|r| &r.key == key) else {
            return Concatenation::Fresh;
        };

        let record = self.recently_ended.remove(pos);
        if self.recently_ended.is_empty() {
            ctx.clear_timer(&mut self.timer);
        }

        if begin_time - record.end_time < self.gap {
            counter!("semlog_concatenations_total", "buffer" => self.name).increment(1);
            trace!(
                buffer = self.name,
                key = ?key,
                gap = begin_time - record.end_time,
                "Concatenated"
            );
            Concatenation::Concatenated
        } else {
            Concatenation::Stale(record)
        }
    }

    /// Forget a parked end without finalizing it
    pub fn cancel(&mut self, ctx: &mut MonitorContext<'_>, key: &K) -> bool {
        let before = self.recently_ended.len();
        self.recently_ended.retain(|r| &r.key != key);
        if self.recently_ended.is_empty() {
            ctx.clear_timer(&mut self.timer);
        }
        self.recently_ended.len() != before
    }

    /// Remove and return every end older than the gap, without touching the timer
    pub fn take_expired(&mut self, now: f64) -> Vec<EndedRecord<K>> {
        let gap = self.gap;
        let (expired, young): (Vec<_>, Vec<_>) = std::mem::take(&mut self.recently_ended)
            .into_iter()
            .partition(|r| now - r.end_time > gap);
        self.recently_ended = young;
        expired
    }

    /// Flush timer callback: finalize old ends, reschedule for the rest
    pub fn flush(&mut self, ctx: &mut MonitorContext<'_>) -> Vec<EndedRecord<K>> {
        // the one-shot timer is consumed by firing
        self.timer = None;

        let expired = self.take_expired(ctx.now());
        if !self.recently_ended.is_empty() {
            self.timer = Some(ctx.set_timer(
                self.timer_kind,
                self.gap * DELAY_BUFFER_FLUSH_FACTOR,
                false,
            ));
        }
        expired
    }

    /// Finalize everything immediately (teardown)
    pub fn drain(&mut self, ctx: &mut MonitorContext<'_>) -> Vec<EndedRecord<K>> {
        ctx.clear_timer(&mut self.timer);
        std::mem::take(&mut self.recently_ended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use crate::testing::StubPhysics;
    use crate::MonitorId;

    struct Rig {
        scheduler: Scheduler,
        physics: StubPhysics,
        outbox: Vec<contracts::MonitorSignal>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                scheduler: Scheduler::new(),
                physics: StubPhysics::default(),
                outbox: Vec::new(),
            }
        }

        fn ctx(&mut self, now: f64) -> MonitorContext<'_> {
            MonitorContext::new(
                now,
                MonitorId(0),
                &mut self.scheduler,
                &self.physics,
                &mut self.outbox,
            )
        }
    }

    #[test]
    fn test_begin_within_gap_concatenates() {
        let mut rig = Rig::new();
        let mut buffer = ConcatenationBuffer::new("contact", 0.2, TimerKind::ContactDelay);

        buffer.record_end(&mut rig.ctx(0.1), "B", 0.1);
        assert_eq!(rig.scheduler.len(), 1);

        let outcome = buffer.try_concatenate(&mut rig.ctx(0.15), &"B", 0.15);
        assert_eq!(outcome, Concatenation::Concatenated);
        assert!(buffer.is_empty());
        // last entry gone, timer cancelled
        assert!(rig.scheduler.is_empty());
    }

    #[test]
    fn test_begin_after_gap_is_stale() {
        let mut rig = Rig::new();
        let mut buffer = ConcatenationBuffer::new("contact", 0.2, TimerKind::ContactDelay);

        buffer.record_end(&mut rig.ctx(1.0), "B", 1.0);
        let outcome = buffer.try_concatenate(&mut rig.ctx(1.2), &"B", 1.2);
        assert_eq!(
            outcome,
            Concatenation::Stale(EndedRecord {
                key: "B",
                end_time: 1.0
            })
        );
    }

    #[test]
    fn test_other_key_is_fresh() {
        let mut rig = Rig::new();
        let mut buffer = ConcatenationBuffer::new("grasp", 0.5, TimerKind::GraspDelay);

        buffer.record_end(&mut rig.ctx(0.0), "A", 0.0);
        assert_eq!(
            buffer.try_concatenate(&mut rig.ctx(0.1), &"B", 0.1),
            Concatenation::Fresh
        );
        assert!(buffer.contains(&"A"));
    }

    #[test]
    fn test_flush_keeps_young_and_reschedules() {
        let mut rig = Rig::new();
        let mut buffer = ConcatenationBuffer::new("contact", 0.2, TimerKind::ContactDelay);

        buffer.record_end(&mut rig.ctx(0.0), "old", 0.0);
        // second end while the timer runs: no extra timer
        buffer.record_end(&mut rig.ctx(0.2), "young", 0.2);
        assert_eq!(rig.scheduler.len(), 1);

        let fired = rig.scheduler.pop_due(10.0).unwrap();
        assert!((fired.time - 0.24).abs() < 1e-9);

        let flushed = buffer.flush(&mut rig.ctx(fired.time));
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].key, "old");
        // recorded end time, not flush time
        assert_eq!(flushed[0].end_time, 0.0);

        assert_eq!(buffer.len(), 1);
        assert_eq!(rig.scheduler.len(), 1);

        let fired = rig.scheduler.pop_due(10.0).unwrap();
        let flushed = buffer.flush(&mut rig.ctx(fired.time));
        assert_eq!(flushed[0].key, "young");
        assert_eq!(flushed[0].end_time, 0.2);
        assert!(rig.scheduler.is_empty());
    }

    #[test]
    fn test_cancel_drops_without_finalizing() {
        let mut rig = Rig::new();
        let mut buffer = ConcatenationBuffer::new("grasp", 0.5, TimerKind::GraspDelay);
        buffer.record_end(&mut rig.ctx(1.0), "cup", 1.0);

        assert!(buffer.cancel(&mut rig.ctx(1.1), &"cup"));
        assert!(!buffer.cancel(&mut rig.ctx(1.1), &"cup"));
        assert!(buffer.is_empty());
        assert!(rig.scheduler.is_empty());
    }

    #[test]
    fn test_drain_cancels_timer() {
        let mut rig = Rig::new();
        let mut buffer = ConcatenationBuffer::new("contact", 0.2, TimerKind::ContactDelay);
        buffer.record_end(&mut rig.ctx(0.0), 1u32, 0.0);
        buffer.record_end(&mut rig.ctx(0.05), 2u32, 0.05);

        let drained = buffer.drain(&mut rig.ctx(0.1));
        assert_eq!(drained.len(), 2);
        assert!(rig.scheduler.is_empty());
    }
}
