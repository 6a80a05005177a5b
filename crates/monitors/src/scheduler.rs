//! Simulation-time timer facility.
//!
//! Timers live in a `Slab`; a handle carries the slab key plus a generation
//! counter so a handle kept after its timer fired can never cancel a newer
//! timer that re-used the same slot.
//!
//! Nothing runs on its own: the hub pulls due timers with [`Scheduler::pop_due`]
//! while advancing simulation time, on the same thread as overlap callbacks.

use std::fmt;

use slab::Slab;

use crate::MonitorId;

/// Slack for comparing accumulated float times
pub(crate) const TIME_EPSILON: f64 = 1e-9;

/// What a timer is for (one handle per monitor per kind)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Contact shape jitter buffer flush
    ContactDelay,
    /// Manipulator grasp jitter buffer flush
    GraspDelay,
    /// Manipulator contact jitter buffer flush
    ManipulatorContactDelay,
    /// Periodic supported-by classification
    SupportedByCheck,
    /// Reach monitor manipulator-contact buffer flush
    ReachContactDelay,
    /// Reach distance sampling
    ReachTick,
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::ContactDelay => "contact_delay",
            TimerKind::GraspDelay => "grasp_delay",
            TimerKind::ManipulatorContactDelay => "manipulator_contact_delay",
            TimerKind::SupportedByCheck => "supported_by_check",
            TimerKind::ReachContactDelay => "reach_contact_delay",
            TimerKind::ReachTick => "reach_tick",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    key: usize,
    generation: u64,
}

/// A timer that came due
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub owner: MonitorId,
    pub kind: TimerKind,
    /// Due time (the simulation time the callback runs at)
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TimerState {
    Armed { due: f64 },
    Paused { remaining: f64 },
}

#[derive(Debug)]
struct TimerEntry {
    owner: MonitorId,
    kind: TimerKind,
    generation: u64,
    /// Re-arm period of a looping timer
    period: Option<f64>,
    state: TimerState,
    /// Arming order, breaks ties between equal due times
    seq: u64,
}

/// Cancellable one-shot / looping timers keyed by handle
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: Slab<TimerEntry>,
    next_generation: u64,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer firing `delay` seconds after `now`, repeating every
    /// `delay` when `looping` is set.
    pub fn set_timer(
        &mut self,
        owner: MonitorId,
        kind: TimerKind,
        now: f64,
        delay: f64,
        looping: bool,
    ) -> TimerHandle {
        let delay = delay.max(0.0);
        let generation = self.bump_generation();
        let seq = self.bump_seq();
        let key = self.timers.insert(TimerEntry {
            owner,
            kind,
            generation,
            period: looping.then_some(delay),
            state: TimerState::Armed { due: now + delay },
            seq,
        });
        TimerHandle { key, generation }
    }

    /// Cancel a timer. Returns false for stale handles.
    pub fn clear(&mut self, handle: TimerHandle) -> bool {
        if self.entry(handle).is_some() {
            self.timers.remove(handle.key);
            true
        } else {
            false
        }
    }

    /// Cancel every timer of a monitor
    pub fn clear_owner(&mut self, owner: MonitorId) -> usize {
        let before = self.timers.len();
        self.timers.retain(|_, entry| entry.owner != owner);
        before - self.timers.len()
    }

    /// Freeze a timer, keeping its remaining time
    pub fn pause(&mut self, handle: TimerHandle, now: f64) -> bool {
        match self.entry_mut(handle) {
            Some(entry) => {
                if let TimerState::Armed { due } = entry.state {
                    entry.state = TimerState::Paused {
                        remaining: (due - now).max(0.0),
                    };
                }
                true
            }
            None => false,
        }
    }

    /// Resume a paused timer from `now`
    pub fn unpause(&mut self, handle: TimerHandle, now: f64) -> bool {
        let seq = self.bump_seq();
        match self.entry_mut(handle) {
            Some(entry) => {
                if let TimerState::Paused { remaining } = entry.state {
                    entry.state = TimerState::Armed {
                        due: now + remaining,
                    };
                    entry.seq = seq;
                }
                true
            }
            None => false,
        }
    }

    /// Armed or paused
    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.entry(handle).is_some()
    }

    pub fn is_paused(&self, handle: TimerHandle) -> bool {
        matches!(
            self.entry(handle).map(|e| e.state),
            Some(TimerState::Paused { .. })
        )
    }

    /// Earliest armed due time
    pub fn next_due(&self) -> Option<f64> {
        self.timers
            .iter()
            .filter_map(|(_, entry)| match entry.state {
                TimerState::Armed { due } => Some(due),
                TimerState::Paused { .. } => None,
            })
            .min_by(f64::total_cmp)
    }

    /// Take the earliest timer due at or before `until`.
    ///
    /// One-shot timers are removed; looping timers are re-armed one period
    /// after their due time.
    pub fn pop_due(&mut self, until: f64) -> Option<FiredTimer> {
        let (key, due) = self
            .timers
            .iter()
            .filter_map(|(key, entry)| match entry.state {
                TimerState::Armed { due } if due <= until + TIME_EPSILON => {
                    Some((key, due, entry.seq))
                }
                _ => None,
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.2.cmp(&b.2)))
            .map(|(key, due, _)| (key, due))?;

        let seq = self.bump_seq();
        let entry = &mut self.timers[key];
        let fired = FiredTimer {
            handle: TimerHandle {
                key,
                generation: entry.generation,
            },
            owner: entry.owner,
            kind: entry.kind,
            time: due,
        };

        match entry.period {
            // a zero period would fire forever within one advance
            Some(period) if period > TIME_EPSILON => {
                entry.state = TimerState::Armed { due: due + period };
                entry.seq = seq;
            }
            _ => {
                self.timers.remove(key);
            }
        }

        Some(fired)
    }

    /// Number of live timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    fn entry(&self, handle: TimerHandle) -> Option<&TimerEntry> {
        self.timers
            .get(handle.key)
            .filter(|e| e.generation == handle.generation)
    }

    fn entry_mut(&mut self, handle: TimerHandle) -> Option<&mut TimerEntry> {
        self.timers
            .get_mut(handle.key)
            .filter(|e| e.generation == handle.generation)
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}
