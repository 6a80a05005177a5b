//! 场景脚本 - 按时间排序的物理事件与运行时控制
//!
//! 脚本与蓝图使用同一套解析器（TOML / JSON，按扩展名推断）。

use std::path::Path;

use config_loader::{parse, ConfigFormat};
use contracts::{
    ActorHandle, ContractError, OverlapCandidate, OverlapNotification, ShapeHandle, ShapeKind,
    Vector3,
};
use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;

/// 骨骼碰撞体声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoneVolume {
    /// 骨骼所属 actor
    pub actor: ActorHandle,
    /// 骨骼名称
    pub bone: String,
    /// 碰撞体句柄
    pub volume: ShapeHandle,
}

/// 重叠双方
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapSpec {
    pub volume: ShapeHandle,
    pub other_actor: ActorHandle,
    pub other_shape: ShapeHandle,
    #[serde(default)]
    pub other_kind: ShapeKind,
}

impl OverlapSpec {
    pub fn notification(&self, timestamp: f64) -> OverlapNotification {
        OverlapNotification {
            volume: self.volume,
            other_actor: self.other_actor,
            other_shape: self.other_shape,
            other_kind: self.other_kind,
            timestamp,
        }
    }

    pub fn candidate(&self) -> OverlapCandidate {
        OverlapCandidate {
            other_actor: self.other_actor,
            other_shape: self.other_shape,
            other_kind: self.other_kind,
        }
    }
}

/// 单步动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    OverlapBegin(OverlapSpec),
    OverlapEnd(OverlapSpec),
    SetLocation {
        actor: ActorHandle,
        location: Vector3,
    },
    SetVelocity {
        actor: ActorHandle,
        velocity: Vector3,
    },
    SetGraspType {
        monitor: String,
        grasp_type: String,
    },
    SetGraspInput {
        monitor: String,
        value: f64,
    },
    TriggerGraspAssist {
        monitor: String,
        #[serde(default)]
        target: Option<ActorHandle>,
    },
}

impl StepAction {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            StepAction::OverlapBegin(_) => "overlap_begin",
            StepAction::OverlapEnd(_) => "overlap_end",
            StepAction::SetLocation { .. } => "set_location",
            StepAction::SetVelocity { .. } => "set_velocity",
            StepAction::SetGraspType { .. } => "set_grasp_type",
            StepAction::SetGraspInput { .. } => "set_grasp_input",
            StepAction::TriggerGraspAssist { .. } => "trigger_grasp_assist",
        }
    }
}

/// 脚本中的一步
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// 仿真时间 (秒)
    pub time: f64,

    #[serde(flatten)]
    pub action: StepAction,
}

/// 场景脚本
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioScript {
    /// 结束时间 (秒, 可选; 覆盖蓝图中的片段结束时间)
    #[serde(default)]
    pub end_time: Option<f64>,

    /// 帧间隔 (秒, 可选; 覆盖蓝图中的片段帧间隔)
    #[serde(default)]
    pub tick_interval: Option<f64>,

    /// 骨骼碰撞体
    #[serde(default)]
    pub bones: Vec<BoneVolume>,

    /// 按时间排序的步骤
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

impl ScenarioScript {
    /// 从文件加载（按扩展名推断格式）
    pub fn load_from_path(path: &Path) -> Result<Self, ScenarioError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(ContractError::from)?;
        Self::load_from_str(&content, format)
    }

    /// 从字符串加载
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<Self, ScenarioError> {
        let script: ScenarioScript = parse(content, format)?;
        script.validate()?;
        Ok(script)
    }

    /// 时间非负且不递减，结束时间不早于最后一步
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut previous = 0.0_f64;
        for (index, step) in self.steps.iter().enumerate() {
            if !step.time.is_finite() || step.time < 0.0 {
                return Err(ScenarioError::invalid_step(
                    index,
                    format!("time {} must be finite and non-negative", step.time),
                ));
            }
            if step.time < previous {
                return Err(ScenarioError::invalid_step(
                    index,
                    format!("time {} is before the previous step at {}", step.time, previous),
                ));
            }
            previous = step.time;
        }

        if let Some(end) = self.end_time {
            if end < previous {
                return Err(ScenarioError::invalid_step(
                    self.steps.len(),
                    format!("end_time {end} is before the last step at {previous}"),
                ));
            }
        }
        if let Some(tick) = self.tick_interval {
            if tick <= 0.0 {
                return Err(ScenarioError::invalid_step(0, "tick_interval must be > 0"));
            }
        }
        Ok(())
    }

    /// 最后一步的时间
    pub fn last_step_time(&self) -> f64 {
        self.steps.last().map_or(0.0, |s| s.time)
    }
}
