//! Monitor error types
//!
//! Only init-time configuration problems are errors. Runtime inconsistencies
//! are logged anomalies and never surface here.

use std::fmt;

use contracts::ActorHandle;
use thiserror::Error;

use crate::MonitorId;

/// Finger group of a manipulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoneGroup {
    /// Fingers
    A,
    /// Thumb
    B,
}

impl fmt::Display for BoneGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoneGroup::A => f.write_str("A"),
            BoneGroup::B => f.write_str("B"),
        }
    }
}

/// Monitor errors
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Owner actor has no entity mapping
    #[error("monitor '{monitor}': owner {actor} is not an annotated entity")]
    OwnerNotAnnotated { monitor: String, actor: ActorHandle },

    /// Required sibling component is missing
    #[error("monitor '{monitor}': no sibling {sibling} on {actor}")]
    MissingSibling {
        monitor: String,
        sibling: &'static str,
        actor: ActorHandle,
    },

    /// Bone name cannot be resolved to an overlap volume
    #[error("monitor '{monitor}': bone '{bone}' of group {group} not found")]
    BoneNotFound {
        monitor: String,
        group: BoneGroup,
        bone: String,
    },

    /// A required bone group has no valid volumes
    #[error("monitor '{monitor}': bone group {group} is empty")]
    EmptyBoneGroup { monitor: String, group: BoneGroup },

    /// Invalid parameter value
    #[error("monitor '{monitor}': {message}")]
    InvalidConfig { monitor: String, message: String },

    /// init() called twice or after finish()
    #[error("monitor '{monitor}' already initialized")]
    AlreadyInitialized { monitor: String },

    /// Operation addressed a monitor that does not exist or has the wrong type
    #[error("{id}: {message}")]
    UnknownMonitor { id: MonitorId, message: String },
}

impl MonitorError {
    pub fn owner_not_annotated(monitor: impl Into<String>, actor: ActorHandle) -> Self {
        Self::OwnerNotAnnotated {
            monitor: monitor.into(),
            actor,
        }
    }

    pub fn bone_not_found(
        monitor: impl Into<String>,
        group: BoneGroup,
        bone: impl Into<String>,
    ) -> Self {
        Self::BoneNotFound {
            monitor: monitor.into(),
            group,
            bone: bone.into(),
        }
    }

    pub fn invalid_config(monitor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            monitor: monitor.into(),
            message: message.into(),
        }
    }

    pub fn unknown_monitor(id: MonitorId, message: impl Into<String>) -> Self {
        Self::UnknownMonitor {
            id,
            message: message.into(),
        }
    }
}
