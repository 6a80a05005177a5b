//! Entity - a semantically annotated simulation object
//!
//! Entities are resolved once per session through the [`EntityRegistry`](crate::EntityRegistry)
//! and then cloned freely into signals and events (all string data is `Arc<str>`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Engine-side actor handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorHandle(pub u32);

/// Engine-side collision shape / volume handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeHandle(pub u32);

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

impl fmt::Display for ShapeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

/// Stable unique entity identity.
///
/// The derived `Ord` is the total order used for symmetric tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human readable semantic identifier (e.g. `"Mug_3Fx9"`), cheap to clone.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct EntityName(Arc<str>);

impl EntityName {
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for EntityName {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for EntityName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityName {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityName({:?})", self.0)
    }
}

impl Serialize for EntityName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

/// Physical category of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Movable rigid body (cups, tools, ...)
    #[default]
    Rigid,
    /// Skeletal mesh (hands, robots, characters)
    Skeletal,
    /// Static geometry (tables, walls)
    Static,
}

/// Resolved semantic entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable unique id
    pub id: EntityId,

    /// Semantic identifier
    pub name: EntityName,

    /// Optional ontology class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<EntityName>,

    /// Physical category
    #[serde(default)]
    pub kind: EntityKind,

    /// Owning actor
    pub actor: ActorHandle,
}

impl Entity {
    /// Reach candidates must be rigid, non-skeletal bodies
    pub fn is_rigid(&self) -> bool {
        self.kind == EntityKind::Rigid
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_total_order() {
        let mut ids = vec![EntityId(7), EntityId(2), EntityId(42)];
        ids.sort();
        assert_eq!(ids, vec![EntityId(2), EntityId(7), EntityId(42)]);
        assert!(EntityId(3) > EntityId(1));
    }

    #[test]
    fn test_entity_serde() {
        let entity = Entity {
            id: EntityId(5),
            name: "Mug".into(),
            class: Some("Cup".into()),
            kind: EntityKind::Rigid,
            actor: ActorHandle(12),
        };
        let json = serde_json::to_string(&entity).unwrap();
        assert!(json.contains("\"name\":\"Mug\""));
        assert!(json.contains("\"kind\":\"rigid\""));

        let parsed: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entity);
    }

    #[test]
    fn test_name_clone_shares_storage() {
        let a: EntityName = "Table".into();
        let b = a.clone();
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
    }
}
