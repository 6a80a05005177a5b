//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::LoggerBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    episode: String,
    entity_count: usize,
    contact_shape_count: usize,
    manipulator_count: usize,
    reach_count: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating blueprint");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Blueprint validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    episode: blueprint.episode.id.clone(),
                    entity_count: blueprint.entities.len(),
                    contact_shape_count: blueprint.contact_shapes.len(),
                    manipulator_count: blueprint.manipulators.len(),
                    reach_count: blueprint.reach_monitors.len(),
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect non-fatal issues
fn collect_warnings(blueprint: &LoggerBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - events go to the log sink only".to_string());
    }

    if blueprint.monitor_count() == 0 {
        warnings.push("No monitors configured - no events will be produced".to_string());
    }

    for shape in &blueprint.contact_shapes {
        if shape.concatenate_if_smaller == 0.0 {
            warnings.push(format!(
                "Contact shape '{}' has no jitter window - every flicker becomes an event",
                shape.name
            ));
        }
    }

    for entity in &blueprint.entities {
        let watched = blueprint.contact_shapes.iter().any(|s| s.owner == entity.actor)
            || blueprint.manipulators.iter().any(|m| m.owner == entity.actor);
        if entity.shapes.is_empty() && !watched {
            warnings.push(format!(
                "Entity '{}' has no shapes and no monitor - it can only appear through its actor",
                entity.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Blueprint is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Episode: {}", summary.episode);
            println!("  Entities: {}", summary.entity_count);
            println!("  Contact shapes: {}", summary.contact_shape_count);
            println!("  Manipulators: {}", summary.manipulator_count);
            println!("  Reach monitors: {}", summary.reach_count);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Blueprint is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_validate_missing_file() {
        let args = ValidateArgs {
            config: "does/not/exist.toml".into(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_validate_reports_warnings() {
        let file = write_config(
            r#"
[episode]
id = "warn"

[[entities]]
id = 3
name = "Table"
kind = "static"
actor = 3

[[contact_shapes]]
name = "table_top"
owner = 3
volume = 301
concatenate_if_smaller = 0.0
"#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };

        let result = validate_config(&args);
        assert!(result.valid, "{:?}", result.error);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("No sinks")));
        assert!(warnings.iter().any(|w| w.contains("jitter window")));
        assert_eq!(result.summary.unwrap().contact_shape_count, 1);
    }
}
