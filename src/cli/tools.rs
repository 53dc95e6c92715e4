//! `montage tools`

use super::plan::load_catalog;
use anyhow::{anyhow, Result};
use montage_tools::{ToolCategory, ToolRegistry};
use std::fmt::Write;
use std::path::Path;

/// Catalog listing, grouped by category
pub fn render(registry: &ToolRegistry, category: Option<&str>) -> Result<String> {
    let categories = match category {
        Some(name) => vec![ToolCategory::parse(name)
            .ok_or_else(|| anyhow!("Unknown tool category '{}'", name))?],
        None => ToolCategory::ALL.to_vec(),
    };

    let mut out = String::new();
    for category in categories {
        let mut definitions = registry.list_by_category(category);
        if definitions.is_empty() {
            continue;
        }
        definitions.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        writeln!(out, "{}:", category.as_str())?;
        for def in definitions {
            let mut flags = Vec::new();
            if def.read_only {
                flags.push("read-only");
            }
            if !def.enabled {
                flags.push("disabled");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            writeln!(
                out,
                "  {:<24} {:<8} {}{}",
                def.name,
                def.risk_level.as_str(),
                def.description,
                flags
            )?;
        }
    }
    Ok(out)
}

pub fn list(catalog: &Path, category: Option<&str>, names_only: bool) -> Result<()> {
    let registry = load_catalog(catalog)?;
    if names_only {
        for name in registry.list_names() {
            println!("{}", name);
        }
        return Ok(());
    }
    print!("{}", render(&registry, category)?);
    Ok(())
}
