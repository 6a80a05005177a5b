//! Monitor configuration contracts shared by config_loader and monitors.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{ActorHandle, ShapeHandle};

/// Flush delay of every delay buffer, as a multiple of its concatenation gap
pub const DELAY_BUFFER_FLUSH_FACTOR: f64 = 1.2;

/// Contact shape monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContactShapeConfig {
    /// Monitor name (unique)
    #[validate(length(min = 1))]
    pub name: String,

    /// Actor owning the volume
    pub owner: ActorHandle,

    /// Observed overlap volume
    pub volume: ShapeHandle,

    /// Contact jitter concatenation gap in seconds (0 disables)
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub concatenate_if_smaller: f64,

    /// Supported-by detection (disabled when absent)
    #[serde(default)]
    #[validate(nested)]
    pub supported_by: Option<SupportedByConfig>,
}

/// Supported-by sub-check configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SupportedByConfig {
    /// Check interval in seconds
    #[serde(default = "default_sb_update_interval")]
    #[validate(range(min = 0.001))]
    pub update_interval: f64,

    /// Maximum relative vertical speed (m/s) of a resting pair
    #[serde(default = "default_sb_max_vertical_speed")]
    #[validate(range(min = 0.0))]
    pub max_vertical_speed: f64,
}

fn default_sb_update_interval() -> f64 {
    0.1
}

fn default_sb_max_vertical_speed() -> f64 {
    0.5
}

impl Default for SupportedByConfig {
    fn default() -> Self {
        Self {
            update_interval: default_sb_update_interval(),
            max_vertical_speed: default_sb_max_vertical_speed(),
        }
    }
}

/// Named bone layouts for the two finger groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonePreset {
    #[default]
    LeftHand,
    RightHand,
    GenesisLeft,
    /// Only the explicit `group_a` / `group_b` lists are used
    Custom,
}

impl BonePreset {
    /// (group A: fingers, group B: thumb)
    pub fn groups(&self) -> (Vec<String>, Vec<String>) {
        let (a, b): (&[&str], &[&str]) = match self {
            BonePreset::LeftHand => (
                &["index_03_l", "middle_03_l", "ring_03_l", "pinky_03_l"],
                &["thumb_03_l"],
            ),
            BonePreset::RightHand => (
                &["index_03_r", "middle_03_r", "ring_03_r", "pinky_03_r"],
                &["thumb_03_r"],
            ),
            BonePreset::GenesisLeft => (&["lIndex3", "lMid3", "lRing3", "lPinky3"], &["lThumb3"]),
            BonePreset::Custom => (&[], &[]),
        };
        (
            a.iter().map(|s| s.to_string()).collect(),
            b.iter().map(|s| s.to_string()).collect(),
        )
    }
}

/// Manipulator (hand) monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ManipulatorConfig {
    /// Monitor name (unique)
    #[validate(length(min = 1))]
    pub name: String,

    /// Skeletal actor carrying the bones
    pub owner: ActorHandle,

    /// Bone layout preset
    #[serde(default)]
    pub preset: BonePreset,

    /// Explicit finger bones (overrides the preset when non-empty)
    #[serde(default)]
    pub group_a: Vec<String>,

    /// Explicit thumb bones (overrides the preset when non-empty)
    #[serde(default)]
    pub group_b: Vec<String>,

    /// Grasp jitter concatenation gap (seconds)
    #[serde(default = "default_grasp_gap")]
    #[validate(range(min = 0.0))]
    pub grasp_concatenate_if_smaller: f64,

    /// Manipulator contact jitter concatenation gap (seconds)
    #[serde(default = "default_contact_gap")]
    #[validate(range(min = 0.0))]
    pub contact_concatenate_if_smaller: f64,

    /// Grasp type label used until one is set at runtime
    #[serde(default = "default_grasp_type")]
    pub default_grasp_type: String,

    /// Grasp input axis threshold
    #[serde(default = "default_input_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub input_threshold: f64,

    /// Pause grasp detection while the input axis is below the threshold
    #[serde(default)]
    pub pause_on_low_input: bool,

    /// Physical grasp-assist (disabled when absent)
    #[serde(default)]
    #[validate(nested)]
    pub grasp_assist: Option<GraspAssistConfig>,
}

fn default_grasp_gap() -> f64 {
    0.55
}

fn default_contact_gap() -> f64 {
    0.35
}

fn default_grasp_type() -> String {
    "Default".to_string()
}

fn default_input_threshold() -> f64 {
    0.2
}

impl ManipulatorConfig {
    /// Create a config with defaults for the given owner
    pub fn new(name: impl Into<String>, owner: ActorHandle) -> Self {
        Self {
            name: name.into(),
            owner,
            preset: BonePreset::default(),
            group_a: Vec::new(),
            group_b: Vec::new(),
            grasp_concatenate_if_smaller: default_grasp_gap(),
            contact_concatenate_if_smaller: default_contact_gap(),
            default_grasp_type: default_grasp_type(),
            input_threshold: default_input_threshold(),
            pause_on_low_input: false,
            grasp_assist: None,
        }
    }

    /// Effective bone groups: explicit lists win over the preset
    pub fn bone_groups(&self) -> (Vec<String>, Vec<String>) {
        let (preset_a, preset_b) = self.preset.groups();
        let a = if self.group_a.is_empty() {
            preset_a
        } else {
            self.group_a.clone()
        };
        let b = if self.group_b.is_empty() {
            preset_b
        } else {
            self.group_b.clone()
        };
        (a, b)
    }
}

/// Grasp-assist constraint parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GraspAssistConfig {
    /// Bone the constraint is attached to
    #[serde(default = "default_hand_bone")]
    pub hand_bone: String,

    /// Disable gravity on the held body
    #[serde(default = "default_true")]
    pub disable_gravity: bool,

    /// Scale the mass of the held body
    #[serde(default)]
    pub scale_mass: bool,

    #[serde(default = "default_mass_scale")]
    #[validate(range(min = 0.0))]
    pub mass_scale: f64,

    /// Linear limit of the constraint (m)
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub constraint_limit: f64,

    #[serde(default = "default_stiffness")]
    #[validate(range(min = 0.0))]
    pub constraint_stiffness: f64,

    #[serde(default = "default_damping")]
    #[validate(range(min = 0.0))]
    pub constraint_damping: f64,

    #[serde(default = "default_contact_distance")]
    #[validate(range(min = 0.0))]
    pub contact_distance: f64,

    #[serde(default = "default_true")]
    pub parent_dominates: bool,

    /// Only the manual trigger attaches/releases the assist
    #[serde(default)]
    pub manual_override: bool,

    /// Manual triggers also publish grasp begin/end
    #[serde(default)]
    pub publish_manual_events: bool,
}

fn default_hand_bone() -> String {
    "hand_l".to_string()
}

fn default_true() -> bool {
    true
}

fn default_mass_scale() -> f64 {
    0.1
}

fn default_stiffness() -> f64 {
    9_000_000.0
}

fn default_damping() -> f64 {
    500.0
}

fn default_contact_distance() -> f64 {
    0.01
}

impl Default for GraspAssistConfig {
    fn default() -> Self {
        Self {
            hand_bone: default_hand_bone(),
            disable_gravity: true,
            scale_mass: false,
            mass_scale: default_mass_scale(),
            constraint_limit: 0.0,
            constraint_stiffness: default_stiffness(),
            constraint_damping: default_damping(),
            contact_distance: default_contact_distance(),
            parent_dominates: true,
            manual_override: false,
            publish_manual_events: false,
        }
    }
}

/// Reach / pre-grasp monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReachConfig {
    /// Monitor name (unique)
    #[validate(length(min = 1))]
    pub name: String,

    /// Owner actor, must also own a manipulator
    pub owner: ActorHandle,

    /// Capture volume
    pub volume: ShapeHandle,

    /// Distance sampling period (seconds)
    #[serde(default = "default_reach_update_rate")]
    #[validate(range(min = 0.001))]
    pub update_rate: f64,

    /// Distance change below which a candidate is idling (m)
    #[serde(default = "default_min_distance_delta")]
    #[validate(range(min = 0.0))]
    pub min_distance_delta: f64,

    /// Manipulator contact concatenation gap (seconds)
    #[serde(default = "default_pre_grasp_gap")]
    #[validate(range(min = 0.0))]
    pub max_pre_grasp_gap: f64,
}

fn default_reach_update_rate() -> f64 {
    0.027
}

fn default_min_distance_delta() -> f64 {
    0.01
}

fn default_pre_grasp_gap() -> f64 {
    0.4
}

impl ReachConfig {
    /// Create a config with defaults
    pub fn new(name: impl Into<String>, owner: ActorHandle, volume: ShapeHandle) -> Self {
        Self {
            name: name.into(),
            owner,
            volume,
            update_rate: default_reach_update_rate(),
            min_distance_delta: default_min_distance_delta(),
            max_pre_grasp_gap: default_pre_grasp_gap(),
        }
    }
}

impl ContactShapeConfig {
    /// Plain contact shape without concatenation or supported-by
    pub fn new(name: impl Into<String>, owner: ActorHandle, volume: ShapeHandle) -> Self {
        Self {
            name: name.into(),
            owner,
            volume,
            concatenate_if_smaller: 0.0,
            supported_by: None,
        }
    }
}
