use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = default_config_path();

    if config_path.exists() {
        return Err(format!(
            "Config file already exists at {}. Remove it first or use --stdout.",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;
    }

    fs::write(&config_path, config_content)
        .map_err(|e| format!("Failed to write config to {}: {}", config_path.display(), e))?;

    println!("Config written to {}", config_path.display());
    Ok(())
}

/// ~/.config/alertstream/config.yml, or the system path when there is no home directory
fn default_config_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home_dir) => home_dir.join(".config/alertstream/config.yml"),
        None => PathBuf::from("/etc/alertstream/config.yml"),
    }
}
