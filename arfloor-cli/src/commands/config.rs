//! Config command implementation

use crate::config::{save_config, Config};
use anyhow::Result;
use colored::*;
use std::path::Path;

/// Print the effective configuration, optionally writing it out
pub fn show(config: &Config, save: Option<&Path>) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    if let Some(path) = save {
        save_config(config, path)?;
        println!("{} Saved to {}", "✓".green().bold(), path.display());
    }
    Ok(())
}
