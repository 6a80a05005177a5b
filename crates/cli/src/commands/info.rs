//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ActorHandle, LoggerBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Blueprint info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    episode: EpisodeInfo,
    entities: Vec<EntityInfo>,
    monitors: Vec<MonitorInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct EpisodeInfo {
    id: String,
    tick_interval: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<f64>,
}

#[derive(Serialize)]
struct EntityInfo {
    id: u32,
    name: String,
    kind: String,
    actor: u32,
    shapes: usize,
}

#[derive(Serialize)]
struct MonitorInfo {
    name: String,
    kind: &'static str,
    owner: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading blueprint info");

    if !args.config.exists() {
        anyhow::bail!("Blueprint file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load blueprint from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize blueprint info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn owner_name(blueprint: &LoggerBlueprint, actor: ActorHandle) -> String {
    blueprint
        .entity_for_actor(actor)
        .map_or_else(|| format!("<{actor}>"), |e| e.name.clone())
}

fn collect_monitors(blueprint: &LoggerBlueprint, detailed: bool) -> Vec<MonitorInfo> {
    let mut monitors = Vec::with_capacity(blueprint.monitor_count());

    for shape in &blueprint.contact_shapes {
        let mut details = Vec::new();
        if detailed {
            details.push(format!("volume {}", shape.volume));
            details.push(format!("jitter window {}s", shape.concatenate_if_smaller));
            match &shape.supported_by {
                Some(sb) => details.push(format!(
                    "supported-by every {}s, max vertical speed {}",
                    sb.update_interval, sb.max_vertical_speed
                )),
                None => details.push("supported-by off".to_string()),
            }
        }
        monitors.push(MonitorInfo {
            name: shape.name.clone(),
            kind: "contact_shape",
            owner: owner_name(blueprint, shape.owner),
            details,
        });
    }

    for hand in &blueprint.manipulators {
        let mut details = Vec::new();
        if detailed {
            let (preset_a, preset_b) = hand.preset.groups();
            let group_a = if hand.group_a.is_empty() { preset_a } else { hand.group_a.clone() };
            let group_b = if hand.group_b.is_empty() { preset_b } else { hand.group_b.clone() };
            details.push(format!("preset {:?}", hand.preset));
            details.push(format!("group A {group_a:?}"));
            details.push(format!("group B {group_b:?}"));
            details.push(format!(
                "jitter windows grasp {}s, contact {}s",
                hand.grasp_concatenate_if_smaller, hand.contact_concatenate_if_smaller
            ));
            details.push(format!("default grasp type {}", hand.default_grasp_type));
            if let Some(assist) = &hand.grasp_assist {
                details.push(format!("grasp assist on '{}'", assist.hand_bone));
            }
        }
        monitors.push(MonitorInfo {
            name: hand.name.clone(),
            kind: "manipulator",
            owner: owner_name(blueprint, hand.owner),
            details,
        });
    }

    for reach in &blueprint.reach_monitors {
        let mut details = Vec::new();
        if detailed {
            details.push(format!("volume {}", reach.volume));
            details.push(format!("update every {}s", reach.update_rate));
            details.push(format!("min distance delta {}", reach.min_distance_delta));
            details.push(format!("max pre-grasp gap {}s", reach.max_pre_grasp_gap));
        }
        monitors.push(MonitorInfo {
            name: reach.name.clone(),
            kind: "reach",
            owner: owner_name(blueprint, reach.owner),
            details,
        });
    }

    monitors
}

fn build_config_info(blueprint: &LoggerBlueprint, args: &InfoArgs) -> ConfigInfo {
    let entities = blueprint
        .entities
        .iter()
        .map(|e| EntityInfo {
            id: e.id,
            name: e.name.clone(),
            kind: format!("{:?}", e.kind),
            actor: e.actor.0,
            shapes: e.shapes.len(),
        })
        .collect();

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        episode: EpisodeInfo {
            id: blueprint.episode.id.clone(),
            tick_interval: blueprint.episode.tick_interval,
            end_time: blueprint.episode.end_time,
        },
        entities,
        monitors: collect_monitors(blueprint, args.monitors),
        sinks,
    }
}

fn print_config_info(blueprint: &LoggerBlueprint, args: &InfoArgs) {
    println!("=== Semlog Blueprint ===\n");

    println!("Episode");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Id: {}", blueprint.episode.id);
    println!("   ├─ Tick interval: {}s", blueprint.episode.tick_interval);
    match blueprint.episode.end_time {
        Some(end) => println!("   └─ End time: {end}s"),
        None => println!("   └─ End time: (scenario)"),
    }

    println!("\nEntities ({})", blueprint.entities.len());
    for (i, entity) in blueprint.entities.iter().enumerate() {
        let prefix = if i == blueprint.entities.len() - 1 { "└─" } else { "├─" };
        println!(
            "   {} {} #{} ({:?}, actor {}, {} shapes)",
            prefix,
            entity.name,
            entity.id,
            entity.kind,
            entity.actor,
            entity.shapes.len()
        );
    }

    let monitors = collect_monitors(blueprint, args.monitors);
    println!("\nMonitors ({})", monitors.len());
    for (i, monitor) in monitors.iter().enumerate() {
        let is_last = i == monitors.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} [{}] on {}", prefix, monitor.name, monitor.kind, monitor.owner);
        for (j, detail) in monitor.details.iter().enumerate() {
            let detail_prefix = if j == monitor.details.len() - 1 { "└─" } else { "├─" };
            println!("   {}  {} {}", child_prefix, detail_prefix, detail);
        }
    }

    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\nSinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let prefix = if i == blueprint.sinks.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {} ({:?}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}
