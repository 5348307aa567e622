//! `arraf onboard` — write the default config and create the data directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use arraf_core::config::{get_config_path, save_config, Config};
use arraf_core::utils::{get_data_path, get_history_path};

/// Run the onboard command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    println!();
    println!("{}", "🔮 Arraf — Setup".magenta().bold());
    println!();

    let config_path = config_path.map(PathBuf::from).unwrap_or_else(get_config_path);
    ensure_config(&config_path)?;

    let data_dir = get_data_path();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    println!("  {} data dir at {}", "✓".green(), data_dir.display());

    let history_dir = get_history_path();
    std::fs::create_dir_all(&history_dir)?;

    println!();
    println!(
        "{}",
        "  Setup complete! Add a key with `arraf key set <model> <key>`, then run `arraf chat`."
            .green()
    );
    println!();

    Ok(())
}

/// Write a default config unless one already exists. Returns whether it wrote.
fn ensure_config(path: &Path) -> Result<bool> {
    if path.exists() {
        println!("  {} config already exists at {}", "✓".green(), path.display());
        return Ok(false);
    }

    save_config(&Config::default(), Some(path))
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("  {} created config at {}", "✓".green(), path.display());
    Ok(true)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
