//! 配置校验模块
//!
//! 校验规则：
//! - 字段级约束 (validator derive: 非空名称、非负间隔 ...)
//! - 实体 id / actor / shape 唯一
//! - 监视器名称与观测体积唯一
//! - 监视器 owner 必须是已声明实体
//! - 机械手两组骨骼非空
//! - 伸手监视器必须有同 owner 的机械手
//! - sink 名称唯一, jsonl 需要 path 参数

use std::collections::HashSet;

use contracts::{ActorHandle, ContractError, LoggerBlueprint, SinkType};
use validator::Validate;

/// 校验 LoggerBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_entities(blueprint)?;
    validate_monitor_names(blueprint)?;
    validate_volumes(blueprint)?;
    validate_owners(blueprint)?;
    validate_bone_groups(blueprint)?;
    validate_reach_siblings(blueprint)?;
    validate_episode(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 字段级校验 (derive 规则)
fn validate_fields(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "blueprint".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

/// 校验实体 id / actor / shape 唯一性
fn validate_entities(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    let mut ids = HashSet::new();
    let mut actors = HashSet::new();
    let mut shapes = HashSet::new();

    for entity in &blueprint.entities {
        if !ids.insert(entity.id) {
            return Err(ContractError::config_validation(
                format!("entities[id={}]", entity.id),
                "duplicate entity id",
            ));
        }
        if !actors.insert(entity.actor) {
            return Err(ContractError::config_validation(
                format!("entities[id={}].actor", entity.id),
                format!("duplicate actor {}", entity.actor),
            ));
        }
        for shape in &entity.shapes {
            if !shapes.insert(*shape) {
                return Err(ContractError::config_validation(
                    format!("entities[id={}].shapes", entity.id),
                    format!("duplicate {shape}"),
                ));
            }
        }
    }
    Ok(())
}

/// 校验监视器名称唯一 (全局)
fn validate_monitor_names(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    let names = blueprint
        .contact_shapes
        .iter()
        .map(|c| c.name.as_str())
        .chain(blueprint.manipulators.iter().map(|m| m.name.as_str()))
        .chain(blueprint.reach_monitors.iter().map(|r| r.name.as_str()));

    for name in names {
        if !seen.insert(name) {
            return Err(ContractError::config_validation(
                format!("monitors[name={name}]"),
                "duplicate monitor name",
            ));
        }
    }
    Ok(())
}

/// 校验观测体积不被多个监视器共享
fn validate_volumes(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    let volumes = blueprint
        .contact_shapes
        .iter()
        .map(|c| (c.name.as_str(), c.volume))
        .chain(
            blueprint
                .reach_monitors
                .iter()
                .map(|r| (r.name.as_str(), r.volume)),
        );

    for (name, volume) in volumes {
        if !seen.insert(volume) {
            return Err(ContractError::config_validation(
                format!("monitors[name={name}].volume"),
                format!("{volume} already observed by another monitor"),
            ));
        }
    }
    Ok(())
}

/// 校验监视器 owner 已声明
fn validate_owners(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    let declared: HashSet<ActorHandle> = blueprint.entities.iter().map(|e| e.actor).collect();
    let owners = blueprint
        .contact_shapes
        .iter()
        .map(|c| (c.name.as_str(), c.owner))
        .chain(
            blueprint
                .manipulators
                .iter()
                .map(|m| (m.name.as_str(), m.owner)),
        )
        .chain(
            blueprint
                .reach_monitors
                .iter()
                .map(|r| (r.name.as_str(), r.owner)),
        );

    for (name, owner) in owners {
        if !declared.contains(&owner) {
            return Err(ContractError::config_validation(
                format!("monitors[name={name}].owner"),
                format!("{owner} is not a declared entity"),
            ));
        }
    }
    Ok(())
}

/// 校验机械手骨骼分组
fn validate_bone_groups(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    for manipulator in &blueprint.manipulators {
        let (group_a, group_b) = manipulator.bone_groups();
        if group_a.is_empty() || group_b.is_empty() {
            return Err(ContractError::config_validation(
                format!("manipulators[{}]", manipulator.name),
                "both bone groups must contain at least one bone",
            ));
        }
    }
    Ok(())
}

/// 校验伸手监视器的机械手兄弟组件
fn validate_reach_siblings(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    for reach in &blueprint.reach_monitors {
        if !blueprint.manipulators.iter().any(|m| m.owner == reach.owner) {
            return Err(ContractError::config_validation(
                format!("reach_monitors[{}].owner", reach.name),
                format!("no manipulator configured for {}", reach.owner),
            ));
        }
    }
    Ok(())
}

/// 校验片段配置
fn validate_episode(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    if let Some(end_time) = blueprint.episode.end_time {
        if end_time < 0.0 {
            return Err(ContractError::config_validation(
                "episode.end_time",
                format!("end_time must be >= 0, got {end_time}"),
            ));
        }
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
        if sink.sink_type == SinkType::Jsonl && !sink.params.contains_key("path") {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.path", idx),
                "jsonl sink requires a 'path' parameter",
            ));
        }
    }
    Ok(())
}
