use crate::config_file::PuzzleGanConfigFile;
use crate::error::{ConfigError, PuzzleGanError, Result};
use clap::ArgMatches;
use std::fs;
use std::path::Path;
use tracing::info;

pub fn generate_config(app_m: &ArgMatches) -> Result<()> {
    let output_path = app_m
        .value_of("OUTPUT_FILE")
        .unwrap_or("puzzle_gan.toml");

    let format = app_m.value_of("FORMAT").unwrap_or("toml");
    let example = app_m.is_present("EXAMPLE");

    write_config(Path::new(output_path), format, example, app_m.is_present("FORCE"))?;

    info!("You can now edit the configuration file and use it with:");
    info!("  puzzle-gan summary {}", output_path);

    Ok(())
}

/// Writes the default (or commented example) configuration to `path`.
pub fn write_config(path: &Path, format: &str, example: bool, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(PuzzleGanError::InvalidInput(format!(
            "File {} already exists. Use --force to overwrite",
            path.display()
        )));
    }

    if example {
        // Comments only survive in TOML
        if format != "toml" {
            return Err(ConfigError::InvalidParameter(
                "Example configuration with comments is only available in TOML format".to_string()
            ).into());
        }

        fs::write(path, PuzzleGanConfigFile::create_example_toml())?;
        info!("Generated example configuration file with comments: {}", path.display());
    } else {
        let config = PuzzleGanConfigFile::generate_default();

        match format {
            "toml" => {
                config.to_toml_file(path)?;
                info!("Generated TOML configuration file: {}", path.display());
            }
            "json" => {
                config.to_json_file(path)?;
                info!("Generated JSON configuration file: {}", path.display());
            }
            _ => {
                return Err(ConfigError::InvalidParameter(format!(
                    "Unknown format: {}. Use 'toml' or 'json'",
                    format
                )).into());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_existing_file_needs_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("puzzle_gan.toml");
        write_config(&path, "toml", true, false).unwrap();
        assert!(write_config(&path, "toml", true, false).is_err());
        write_config(&path, "toml", false, true).unwrap();
        assert!(PuzzleGanConfigFile::from_file(&path).is_ok());
    }

    #[test]
    fn test_example_is_toml_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("puzzle_gan.json");
        let err = write_config(&path, "json", true, false).unwrap_err();
        assert!(err.is_config());
        assert!(!path.exists());
    }
}
