//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 蓝图 + 场景脚本驱动的完整监视器回放
//! - 抖动拼接、抓取互斥、伸手/预抓取、对称触发体、supported-by 场景
//! - 回放 → Dispatcher → JSONL 文件的端到端链路

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{EventKind, FinishedEvent, FinishedEventCallback};
    use scenario::{RunReport, ScenarioRunner, ScenarioScript};

    /// Replay `script` against `blueprint`, both TOML, and collect every finished event
    pub fn replay(blueprint: &str, script: &str) -> (RunReport, Vec<FinishedEvent>) {
        let blueprint = ConfigLoader::load_from_str(blueprint, ConfigFormat::Toml).unwrap();
        let script = ScenarioScript::load_from_str(script, ConfigFormat::Toml).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: FinishedEventCallback = Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        });

        let report = ScenarioRunner::new(&blueprint, script, callback)
            .unwrap()
            .run()
            .unwrap();
        let events = events.lock().unwrap().clone();
        (report, events)
    }

    pub fn of_kind(events: &[FinishedEvent], kind: EventKind) -> Vec<&FinishedEvent> {
        events.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn interval(event: &FinishedEvent) -> (f64, f64) {
        (event.start, event.end)
    }

    pub fn assert_well_formed(events: &[FinishedEvent]) {
        for event in events {
            assert!(event.end >= event.start, "inverted event {event:?}");
        }
    }

    /// Hand (1), cup (2), table (3), plate (4); hand bones index → 11, thumb → 12
    pub const KITCHEN: &str = r#"
[episode]
id = "kitchen"
tick_interval = 0.05

[[entities]]
id = 1
name = "LeftHand"
kind = "skeletal"
actor = 1

[[entities]]
id = 2
name = "Cup"
class = "DrinkingMug"
actor = 2
shapes = [200]

[[entities]]
id = 3
name = "Table"
kind = "static"
actor = 3
shapes = [300]

[[entities]]
id = 4
name = "Plate"
actor = 4
shapes = [400]

[[contact_shapes]]
name = "table_top"
owner = 3
volume = 301
concatenate_if_smaller = 0.2

[[contact_shapes]]
name = "cup_base"
owner = 2
volume = 201
concatenate_if_smaller = 0.2
supported_by = { update_interval = 0.1, max_vertical_speed = 0.5 }

[[manipulators]]
name = "left_hand"
owner = 1
preset = "custom"
group_a = ["index"]
group_b = ["thumb"]

[[reach_monitors]]
name = "left_reach"
owner = 1
volume = 50
"#;

    pub const BONES: &str = r#"
[[bones]]
actor = 1
bone = "index"
volume = 11

[[bones]]
actor = 1
bone = "thumb"
volume = 12
"#;

    /// `[[steps]]` entry for an overlap transition with a plain mesh
    pub fn overlap(time: f64, action: &str, volume: u32, other_actor: u32) -> String {
        format!(
            "\n[[steps]]\ntime = {time}\naction = \"{action}\"\nvolume = {volume}\nother_actor = {other_actor}\nother_shape = {}\n",
            other_actor * 100
        )
    }
}

#[cfg(test)]
mod monitor_scenarios {
    use contracts::EventKind;

    use crate::support::*;

    #[test]
    fn test_jitter_is_one_continuous_contact() {
        // begin 0.0, end 0.1, begin 0.15 with a 0.2 s gap, real end at 1.0
        let script = [
            "end_time = 3.0\n".to_string(),
            overlap(0.0, "overlap_begin", 301, 2),
            overlap(0.1, "overlap_end", 301, 2),
            overlap(0.15, "overlap_begin", 301, 2),
            overlap(1.0, "overlap_end", 301, 2),
        ]
        .concat();

        let (report, events) = replay(KITCHEN, &script);
        assert_well_formed(&events);

        let contacts = of_kind(&events, EventKind::Contact);
        assert_eq!(contacts.len(), 1, "{contacts:?}");
        assert_eq!(contacts[0].self_entity.name.as_str(), "Table");
        assert_eq!(contacts[0].other.name.as_str(), "Cup");
        assert_eq!(interval(contacts[0]), (0.0, 1.0));
        assert_eq!(report.assembler.unmatched_ends, 0);
    }

    #[test]
    fn test_grasp_begins_on_second_group() {
        let script = [
            format!("end_time = 6.0\n{BONES}"),
            r#"
[[steps]]
time = 0.5
action = "set_grasp_type"
monitor = "left_hand"
grasp_type = "PowerGrasp"
"#
            .to_string(),
            overlap(1.0, "overlap_begin", 11, 2),
            overlap(1.2, "overlap_begin", 12, 2),
            overlap(5.0, "overlap_end", 11, 2),
        ]
        .concat();

        let (report, events) = replay(KITCHEN, &script);
        assert!(report.init_failures.is_empty(), "{:?}", report.init_failures);
        assert_well_formed(&events);

        let grasps = of_kind(&events, EventKind::Grasp);
        assert_eq!(grasps.len(), 1);
        assert_eq!(interval(grasps[0]), (1.2, 5.0));
        assert_eq!(grasps[0].label.as_deref(), Some("PowerGrasp"));
        assert_eq!(grasps[0].other.name.as_str(), "Cup");

        // the manipulator-level contact spans the whole touch
        let hand_contacts: Vec<_> = of_kind(&events, EventKind::Contact)
            .into_iter()
            .filter(|e| e.self_entity.name.as_str() == "LeftHand")
            .collect();
        assert_eq!(hand_contacts.len(), 1);
        assert_eq!(interval(hand_contacts[0]).0, 1.0);
    }

    #[test]
    fn test_second_grasp_rejected_while_holding() {
        let script = [
            format!("end_time = 6.0\n{BONES}"),
            overlap(1.0, "overlap_begin", 11, 2),
            overlap(1.2, "overlap_begin", 12, 2),
            overlap(2.0, "overlap_begin", 11, 4),
            overlap(2.1, "overlap_begin", 12, 4),
            overlap(3.0, "overlap_end", 12, 4),
            overlap(3.0, "overlap_end", 11, 4),
            overlap(5.0, "overlap_end", 12, 2),
        ]
        .concat();

        let (_, events) = replay(KITCHEN, &script);
        assert_well_formed(&events);

        let grasps = of_kind(&events, EventKind::Grasp);
        assert_eq!(grasps.len(), 1, "{grasps:?}");
        assert_eq!(grasps[0].other.name.as_str(), "Cup");
        assert_eq!(interval(grasps[0]), (1.2, 5.0));
    }

    #[test]
    fn test_reach_and_pre_grasp_bound_the_grasp() {
        let script = [
            format!("end_time = 4.0\n{BONES}"),
            r#"
[[steps]]
time = 0.0
action = "set_location"
actor = 1
location = { x = 0.0, y = 0.0, z = 0.0 }

[[steps]]
time = 0.0
action = "set_location"
actor = 2
location = { x = 2.0, y = 0.0, z = 0.0 }
"#
            .to_string(),
            overlap(0.0, "overlap_begin", 50, 2),
            r#"
[[steps]]
time = 2.9
action = "set_location"
actor = 2
location = { x = 0.05, y = 0.0, z = 0.0 }
"#
            .to_string(),
            overlap(3.0, "overlap_begin", 11, 2),
            overlap(3.5, "overlap_begin", 12, 2),
        ]
        .concat();

        let (report, events) = replay(KITCHEN, &script);
        assert!(report.init_failures.is_empty(), "{:?}", report.init_failures);
        assert_well_formed(&events);

        let reach = of_kind(&events, EventKind::Reach);
        assert_eq!(reach.len(), 1);
        assert_eq!(interval(reach[0]), (0.0, 3.0));
        assert_eq!(reach[0].other.name.as_str(), "Cup");

        let pre_grasp = of_kind(&events, EventKind::PreGrasp);
        assert_eq!(pre_grasp.len(), 1);
        assert_eq!(interval(pre_grasp[0]), (3.0, 3.5));

        let grasps = of_kind(&events, EventKind::Grasp);
        assert_eq!(interval(grasps[0]), (3.5, 4.0));
    }

    #[test]
    fn test_symmetric_trigger_overlap_reported_once() {
        // cup_base (entity 2) and table_top (entity 3) volumes see each other
        let trigger = |time: f64, action: &str, volume: u32, other_actor: u32, other_shape: u32| {
            format!(
                "\n[[steps]]\ntime = {time}\naction = \"{action}\"\nvolume = {volume}\nother_actor = {other_actor}\nother_shape = {other_shape}\nother_kind = \"contact_trigger\"\n"
            )
        };
        let script = [
            "end_time = 3.0\n".to_string(),
            trigger(1.0, "overlap_begin", 201, 3, 301),
            trigger(1.0, "overlap_begin", 301, 2, 201),
            trigger(2.0, "overlap_end", 201, 3, 301),
            trigger(2.0, "overlap_end", 301, 2, 201),
        ]
        .concat();

        let (_, events) = replay(KITCHEN, &script);

        let contacts = of_kind(&events, EventKind::Contact);
        assert_eq!(contacts.len(), 1, "{contacts:?}");
        assert_eq!(contacts[0].self_entity.name.as_str(), "Table");
        assert_eq!(interval(contacts[0]), (1.0, 2.0));
    }

    #[test]
    fn test_cup_supported_by_table() {
        let script = [
            "end_time = 4.0\n".to_string(),
            r#"
[[steps]]
time = 0.0
action = "set_velocity"
actor = 2
velocity = { x = 0.0, y = 0.0, z = 0.0 }

[[steps]]
time = 0.0
action = "set_velocity"
actor = 3
velocity = { x = 0.0, y = 0.0, z = 0.0 }
"#
            .to_string(),
            overlap(1.0, "overlap_begin", 201, 3),
            overlap(3.0, "overlap_end", 201, 3),
        ]
        .concat();

        let (_, events) = replay(KITCHEN, &script);
        assert_well_formed(&events);

        let supported = of_kind(&events, EventKind::SupportedBy);
        assert_eq!(supported.len(), 1, "{supported:?}");
        assert_eq!(supported[0].self_entity.name.as_str(), "Cup");
        assert_eq!(supported[0].other.name.as_str(), "Table");
        assert!(supported[0].start >= 1.0 && supported[0].start <= 1.1 + 1e-9);
        assert_eq!(supported[0].end, 3.0);
        assert!(supported[0].pair_id.is_some());
    }

    #[test]
    fn test_open_contacts_closed_at_episode_end() {
        let script = ["end_time = 2.5\n".to_string(), overlap(0.5, "overlap_begin", 301, 4)].concat();

        let (report, events) = replay(KITCHEN, &script);

        let contacts = of_kind(&events, EventKind::Contact);
        assert_eq!(contacts.len(), 1);
        assert_eq!(interval(contacts[0]), (0.5, 2.5));
        assert_eq!(report.end_time, 2.5);
    }
}

#[cfg(test)]
mod demo_tests {
    use contracts::EventKind;

    use crate::support::*;

    const BLUEPRINT: &str = include_str!("../../../demos/kitchen.toml");
    const SCRIPT: &str = include_str!("../../../demos/pick_cup.toml");

    #[test]
    fn test_demo_pick_cup() {
        let (report, events) = replay(BLUEPRINT, SCRIPT);
        assert!(report.init_failures.is_empty(), "{:?}", report.init_failures);
        assert_eq!(report.end_time, 8.0);
        assert_well_formed(&events);

        let reach = of_kind(&events, EventKind::Reach);
        assert_eq!(reach.len(), 1);
        assert_eq!(interval(reach[0]), (0.5, 2.8));
        assert_eq!(interval(of_kind(&events, EventKind::PreGrasp)[0]), (2.8, 3.2));

        let grasps = of_kind(&events, EventKind::Grasp);
        assert_eq!(grasps.len(), 1);
        assert_eq!(interval(grasps[0]), (3.2, 6.0));
        assert_eq!(grasps[0].label.as_deref(), Some("PowerGrasp"));

        // lift flicker at 3.6 / 3.7 is absorbed, the cup comes back at 5.5
        let mut table: Vec<_> = of_kind(&events, EventKind::Contact)
            .into_iter()
            .filter(|e| e.self_entity.name.as_str() == "Table")
            .map(interval)
            .collect();
        table.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert_eq!(table, vec![(0.0, 3.8), (5.5, 8.0)]);

        let supported = of_kind(&events, EventKind::SupportedBy);
        assert_eq!(supported.len(), 2);
        assert!(supported.iter().all(|e| e.self_entity.name.as_str() == "Cup"));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{EventKind, FinishedEvent, FinishedEventCallback, SinkConfig, SinkType};
    use dispatcher::create_dispatcher;
    use observability::EventMetricsAggregator;
    use scenario::{ScenarioRunner, ScenarioScript};
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    use crate::support::*;

    /// End-to-end: ScenarioRunner -> channel -> Dispatcher -> JSONL + log sinks
    #[tokio::test]
    async fn test_e2e_replay_to_jsonl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("episode.jsonl");

        let blueprint = ConfigLoader::load_from_str(KITCHEN, ConfigFormat::Toml).unwrap();
        let script = ScenarioScript::load_from_str(
            &[
                format!("end_time = 6.0\n{BONES}"),
                overlap(0.0, "overlap_begin", 301, 2),
                overlap(0.1, "overlap_end", 301, 2),
                overlap(0.15, "overlap_begin", 301, 2),
                overlap(1.0, "overlap_begin", 11, 2),
                overlap(1.2, "overlap_begin", 12, 2),
                overlap(1.5, "overlap_end", 301, 2),
                overlap(5.0, "overlap_end", 12, 2),
                overlap(5.0, "overlap_end", 11, 2),
            ]
            .concat(),
            ConfigFormat::Toml,
        )
        .unwrap();

        let sink_configs = vec![
            SinkConfig {
                name: "file".to_string(),
                sink_type: SinkType::Jsonl,
                queue_capacity: 64,
                params: HashMap::from([("path".to_string(), path.display().to_string())]),
            },
            SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 64,
                params: HashMap::new(),
            },
        ];

        let (tx, rx) = mpsc::channel::<FinishedEvent>(64);
        let dispatcher = create_dispatcher(sink_configs, rx).unwrap();
        let dispatcher_handle = dispatcher.spawn();

        let aggregator = Arc::new(Mutex::new(EventMetricsAggregator::new()));
        let agg = Arc::clone(&aggregator);
        let callback: FinishedEventCallback = Arc::new(move |event| {
            agg.lock().unwrap().update(&event);
            tx.blocking_send(event).unwrap();
        });

        let report = tokio::task::spawn_blocking(move || {
            ScenarioRunner::new(&blueprint, script, callback)
                .unwrap()
                .run()
                .unwrap()
        })
        .await
        .unwrap();

        let sink_metrics = dispatcher_handle.await.unwrap();
        assert_eq!(sink_metrics.len(), 2);
        for (name, snapshot) in &sink_metrics {
            assert_eq!(snapshot.write_count, report.assembler.finished, "sink {name}");
            assert_eq!(snapshot.lost(), 0, "sink {name}");
        }

        let written = std::fs::read_to_string(&path).unwrap();
        let events: Vec<FinishedEvent> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.len() as u64, report.assembler.finished);
        assert_well_formed(&events);

        let table = of_kind(&events, EventKind::Contact)
            .into_iter()
            .find(|e| e.self_entity.name.as_str() == "Table")
            .expect("table contact");
        assert_eq!(interval(table), (0.0, 1.5));

        let grasp = of_kind(&events, EventKind::Grasp);
        assert_eq!(grasp.len(), 1);
        assert_eq!(interval(grasp[0]), (1.2, 5.0));
        assert_eq!(grasp[0].label.as_deref(), Some("Default"));

        let summary = aggregator.lock().unwrap().summary();
        assert_eq!(summary.total_events, report.assembler.finished);
        assert_eq!(aggregator.lock().unwrap().count(EventKind::Grasp), 1);
    }
}
