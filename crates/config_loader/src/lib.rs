//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `LoggerBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("logger.toml")).unwrap();
//! println!("Episode: {}", blueprint.episode.id);
//! ```

mod parser;
mod validator;

pub use contracts::LoggerBlueprint;
pub use parser::{parse, ConfigFormat};

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<LoggerBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<LoggerBlueprint, ContractError> {
        let blueprint: LoggerBlueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Validate an already constructed blueprint
    pub fn validate(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Serialize LoggerBlueprint to TOML string
    pub fn to_toml(blueprint: &LoggerBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize LoggerBlueprint to JSON string
    pub fn to_json(blueprint: &LoggerBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[episode]
id = "kitchen_01"
end_time = 10.0

[[entities]]
id = 1
name = "LeftHand"
class = "LeftHand"
kind = "skeletal"
actor = 10

[[entities]]
id = 2
name = "Mug"
class = "Cup"
actor = 20
shapes = [200]

[[entities]]
id = 3
name = "Table"
class = "Table"
kind = "static"
actor = 30
shapes = [300]

[[contact_shapes]]
name = "mug_contact"
owner = 20
volume = 201
concatenate_if_smaller = 0.2

[contact_shapes.supported_by]
update_interval = 0.1

[[manipulators]]
name = "left_hand"
owner = 10
preset = "left_hand"

[[reach_monitors]]
name = "left_reach"
owner = 10
volume = 101

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.episode.id, "kitchen_01");
        assert_eq!(bp.monitor_count(), 3);
        assert_eq!(bp.contact_shapes[0].concatenate_if_smaller, 0.2);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.episode.id, bp2.episode.id);
        assert_eq!(bp.entities.len(), bp2.entities.len());
        assert_eq!(bp.manipulators[0].name, bp2.manipulators[0].name);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.reach_monitors[0].volume, bp2.reach_monitors[0].volume);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = MINIMAL_TOML.replace("id = 3", "id = 2");
        let result = ConfigLoader::load_from_str(&content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }
}
