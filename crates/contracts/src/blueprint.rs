//! LoggerBlueprint - Config Loader 输出
//!
//! 描述完整的日志配置：实体注册表、各类监视器、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{
    ActorHandle, ContactShapeConfig, Entity, EntityId, EntityKind, ManipulatorConfig, ReachConfig,
    ShapeHandle,
};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的日志配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggerBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 片段设置
    #[validate(nested)]
    pub episode: EpisodeConfig,

    /// 语义实体声明
    #[serde(default)]
    pub entities: Vec<EntityConfig>,

    /// 接触形状监视器
    #[serde(default)]
    #[validate(nested)]
    pub contact_shapes: Vec<ContactShapeConfig>,

    /// 机械手 (手部) 监视器
    #[serde(default)]
    #[validate(nested)]
    pub manipulators: Vec<ManipulatorConfig>,

    /// 伸手 / 预抓取监视器
    #[serde(default)]
    #[validate(nested)]
    pub reach_monitors: Vec<ReachConfig>,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 片段配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EpisodeConfig {
    /// 片段 ID
    #[validate(length(min = 1))]
    pub id: String,

    /// 帧间隔 (秒)
    #[serde(default = "default_tick_interval")]
    #[validate(range(min = 0.0001))]
    pub tick_interval: f64,

    /// 片段结束时间 (秒, 可选; 缺省时使用脚本的结束时间)
    #[serde(default)]
    pub end_time: Option<f64>,
}

fn default_tick_interval() -> f64 {
    0.01
}

/// 实体声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// 唯一 ID
    pub id: u32,

    /// 语义名称
    pub name: String,

    /// 本体类 (可选)
    #[serde(default)]
    pub class: Option<String>,

    /// 物理类别
    #[serde(default)]
    pub kind: EntityKind,

    /// 所属 actor
    pub actor: ActorHandle,

    /// 属于该实体的形状
    #[serde(default)]
    pub shapes: Vec<ShapeHandle>,
}

impl EntityConfig {
    /// 转换为运行时实体
    pub fn to_entity(&self) -> Entity {
        Entity {
            id: EntityId(self.id),
            name: self.name.as_str().into(),
            class: self.class.as_deref().map(Into::into),
            kind: self.kind,
            actor: self.actor,
        }
    }
}

/// Sink 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// JSON Lines 文件输出
    Jsonl,
}

impl LoggerBlueprint {
    /// 按 actor 查找实体声明
    pub fn entity_for_actor(&self, actor: ActorHandle) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.actor == actor)
    }

    /// 监视器总数
    pub fn monitor_count(&self) -> usize {
        self.contact_shapes.len() + self.manipulators.len() + self.reach_monitors.len()
    }
}
