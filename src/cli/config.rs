//! `montage config`

use anyhow::{Context, Result};
use montage_core::MontageConfig;
use std::path::Path;

/// Print the merged configuration as JSON
pub fn show(path: Option<&Path>) -> Result<()> {
    let config = MontageConfig::load(path).context("Failed to load configuration")?;
    let rendered = serde_json::to_string_pretty(&config)?;
    println!("{}", rendered);
    Ok(())
}
