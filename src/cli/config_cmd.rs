use std::path::{Path, PathBuf};

use crate::config::AssistConfig;
use crate::error::Result;

/// Print the effective configuration as YAML.
pub async fn run_config(config_path: Option<&Path>) -> Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = AssistConfig::load(config_path, &cwd)?;
    print!("{}", config.to_yaml()?);
    Ok(())
}
