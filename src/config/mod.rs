//! Configuration loading and validation

mod schema;

pub use schema::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Example configuration written by `resp-midi init`
pub const EXAMPLE_CONFIG: &str = include_str!("../../resp-midi.example.yaml");

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<RespConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: RespConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Load the file if one is given, otherwise start from defaults.
///
/// Validation is left to the caller so command-line overrides can be
/// applied first.
pub fn load_or_default(path: Option<&Path>) -> Result<RespConfig> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let config = serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing config {}", path.display()))?;
            Ok(config)
        }
        None => Ok(RespConfig::default()),
    }
}
