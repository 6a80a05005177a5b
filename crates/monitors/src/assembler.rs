//! Begin/end pairing into finished events.
//!
//! Contacts and grasps are keyed by `(self, other)`; supported-by intervals
//! by the pair id emitted at begin and matched against either ordering at
//! end. Reach and pre-grasp signals already carry both bounds and pass
//! straight through.

use std::collections::HashMap;

use contracts::{
    ContactSignal, Entity, EntityId, EventKind, FinishedEvent, FinishedEventCallback,
    SignalListener,
};
use metrics::{counter, histogram};
use tracing::{debug, instrument, trace, warn};

#[derive(Debug, Clone)]
struct OpenEvent {
    kind: EventKind,
    self_entity: Entity,
    other: Entity,
    start: f64,
    label: Option<String>,
    pair_id: Option<u64>,
}

impl OpenEvent {
    fn close(self, end: f64) -> FinishedEvent {
        FinishedEvent {
            kind: self.kind,
            self_entity: self.self_entity,
            other: self.other,
            start: self.start,
            end,
            label: self.label,
            pair_id: self.pair_id,
        }
    }
}

/// Assembler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    /// Events handed to the callback
    pub finished: u64,
    /// Ends dropped because they preceded their begin
    pub inverted: u64,
    /// Ends with no open begin
    pub unmatched_ends: u64,
    /// Begins for a pair that was already open
    pub duplicate_begins: u64,
}

/// Signal listener producing finished events
pub struct EventAssembler {
    /// Open contacts and grasps
    open: HashMap<(EventKind, EntityId, EntityId), OpenEvent>,
    /// Open supported-by intervals by pair id
    supported_by: HashMap<u64, OpenEvent>,
    callback: FinishedEventCallback,
    stats: AssemblerStats,
    closed: bool,
}

impl EventAssembler {
    pub fn new(callback: FinishedEventCallback) -> Self {
        Self {
            open: HashMap::new(),
            supported_by: HashMap::new(),
            callback,
            stats: AssemblerStats::default(),
            closed: false,
        }
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// Number of events begun but not yet ended
    pub fn open_count(&self) -> usize {
        self.open.len() + self.supported_by.len()
    }

    fn open_pair(&mut self, event: OpenEvent) {
        let key = (event.kind, event.self_entity.id, event.other.id);
        if self.open.contains_key(&key) {
            self.stats.duplicate_begins += 1;
            debug!(
                kind = %event.kind,
                self_entity = %event.self_entity,
                other = %event.other,
                "Begin for an already open pair, keeping the first"
            );
            return;
        }
        self.open.insert(key, event);
    }

    fn close_pair(&mut self, kind: EventKind, self_entity: &Entity, other: &Entity, time: f64) {
        match self.open.remove(&(kind, self_entity.id, other.id)) {
            Some(event) => self.publish(event.close(time)),
            None => {
                self.stats.unmatched_ends += 1;
                debug!(kind = %kind, self_entity = %self_entity, other = %other, "End without begin");
            }
        }
    }

    /// Hand one event to the callback, dropping inverted intervals
    fn publish(&mut self, event: FinishedEvent) {
        if event.end < event.start {
            self.stats.inverted += 1;
            counter!("semlog_anomalies_total", "kind" => "inverted_interval").increment(1);
            warn!(
                kind = %event.kind,
                start = event.start,
                end = event.end,
                "Event ends before it starts, dropped"
            );
            return;
        }

        trace!(kind = %event.kind, start = event.start, end = event.end, "Event finished");
        counter!("semlog_finished_events_total", "kind" => event.kind.as_str()).increment(1);
        histogram!("semlog_event_duration_seconds", "kind" => event.kind.as_str())
            .record(event.duration());
        self.stats.finished += 1;
        (self.callback)(event);
    }

    /// Close every open event at `end_time`, oldest first
    #[instrument(level = "debug", name = "assembler_finish_all", skip(self), fields(open = self.open_count()))]
    pub fn finish_all(&mut self, end_time: f64) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut pending: Vec<OpenEvent> = self
            .open
            .drain()
            .map(|(_, event)| event)
            .chain(self.supported_by.drain().map(|(_, event)| event))
            .collect();
        pending.sort_by(|a, b| a.start.total_cmp(&b.start));

        for event in pending {
            let end = end_time.max(event.start);
            self.publish(event.close(end));
        }
    }
}

impl SignalListener for EventAssembler {
    fn on_contact_begin(&mut self, contact: &ContactSignal) {
        self.open_pair(OpenEvent {
            kind: EventKind::Contact,
            self_entity: contact.self_entity.clone(),
            other: contact.other.clone(),
            start: contact.time,
            label: None,
            pair_id: None,
        });
    }

    fn on_contact_end(&mut self, self_entity: &Entity, other: &Entity, time: f64) {
        self.close_pair(EventKind::Contact, self_entity, other, time);
    }

    fn on_grasp_begin(&mut self, self_entity: &Entity, other: &Entity, time: f64, grasp_type: &str) {
        self.open_pair(OpenEvent {
            kind: EventKind::Grasp,
            self_entity: self_entity.clone(),
            other: other.clone(),
            start: time,
            label: Some(grasp_type.to_string()),
            pair_id: None,
        });
    }

    fn on_grasp_end(&mut self, self_entity: &Entity, other: &Entity, time: f64) {
        self.close_pair(EventKind::Grasp, self_entity, other, time);
    }

    fn on_supported_by_begin(
        &mut self,
        supported: &Entity,
        supporting: &Entity,
        time: f64,
        pair_id: u64,
    ) {
        if self.supported_by.contains_key(&pair_id) {
            self.stats.duplicate_begins += 1;
            debug!(pair_id, "Supported-by already open");
            return;
        }
        self.supported_by.insert(
            pair_id,
            OpenEvent {
                kind: EventKind::SupportedBy,
                self_entity: supported.clone(),
                other: supporting.clone(),
                start: time,
                label: None,
                pair_id: Some(pair_id),
            },
        );
    }

    fn on_supported_by_end(&mut self, pair_id1: u64, pair_id2: u64, time: f64) {
        let open = self
            .supported_by
            .remove(&pair_id1)
            .or_else(|| self.supported_by.remove(&pair_id2));
        match open {
            Some(event) => self.publish(event.close(time)),
            None => {
                self.stats.unmatched_ends += 1;
                debug!(pair_id1, pair_id2, "Supported-by end without begin");
            }
        }
    }

    fn on_reach_event(&mut self, self_entity: &Entity, other: &Entity, start: f64, end: f64) {
        self.publish(FinishedEvent {
            kind: EventKind::Reach,
            self_entity: self_entity.clone(),
            other: other.clone(),
            start,
            end,
            label: None,
            pair_id: None,
        });
    }

    fn on_pre_grasp_event(&mut self, self_entity: &Entity, other: &Entity, start: f64, end: f64) {
        self.publish(FinishedEvent {
            kind: EventKind::PreGrasp,
            self_entity: self_entity.clone(),
            other: other.clone(),
            start,
            end,
            label: None,
            pair_id: None,
        });
    }

    fn on_finish(&mut self, time: f64) {
        self.finish_all(time);
    }
}
