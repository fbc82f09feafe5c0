use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse and validate config from a YAML string
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    config.storage.path = expand_tilde(&config.storage.path);

    validate_config(&config)?;
    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error.
/// Comment lines are not checked.
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = yaml_string
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| env_var_pattern().captures_iter(line))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}\n\
         Set them (e.g. export {}=...) or replace them in the config file",
        unexpanded_vars.join(", "),
        unexpanded_vars[0]
    )))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let url = config.feed.url.trim();
    if url.is_empty() {
        errors.push("feed.url must not be empty".to_string());
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("feed.url '{}' must start with http:// or https://", url));
    }

    if config.feed.timeout.is_zero() {
        errors.push("feed.timeout must be greater than zero".to_string());
    }

    if config.manager.id.trim().is_empty() {
        errors.push("manager.id must not be empty".to_string());
    }

    if config.stream.channel_capacity == 0 {
        errors.push("stream.channel_capacity must be greater than zero".to_string());
    }

    if config.storage.path.as_os_str().is_empty() {
        errors.push("storage.path must not be empty".to_string());
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(ConfigError::Validation(errors.remove(0))),
        _ => Err(ConfigError::ValidationList(errors)),
    }
}
