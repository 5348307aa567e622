//! `arraf status` — show configuration, endpoints and key status.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use arraf_core::config::{get_config_path, Config};
use arraf_core::utils::mask_key;
use arraf_providers::ModelRegistry;

use crate::helpers;

/// Run the status command.
pub fn run(config: &Config, config_path: Option<&Path>) -> Result<()> {
    let config_path = config_path.map(PathBuf::from).unwrap_or_else(get_config_path);
    let credentials_path = helpers::expand_tilde(&config.storage.credentials_path);
    let credentials = crate::credential_store(config);
    let registry = ModelRegistry::from_config(config).context("invalid model catalog")?;

    println!();
    println!("{}", "🔮 Arraf Status".magenta().bold());
    println!();

    println!("  {:<18} {} {}", "Config:".bold(), config_path.display(), found(&config_path));
    println!(
        "  {:<18} {} {}",
        "Credentials:".bold(),
        credentials_path.display(),
        found(&credentials_path)
    );
    println!("  {:<18} {}", "Chat endpoint:".bold(), config.endpoints.chat_url);
    println!(
        "  {:<18} {} {}",
        "Speech-to-text:".bold(),
        config.endpoints.transcription_url,
        format!("({})", config.endpoints.transcription_model).dimmed()
    );
    println!("  {:<18} {}", "Default model:".bold(), registry.default_model().display_name);

    println!();
    println!("  {}", "Models:".bold());
    for model in registry.list_models() {
        let status = match credentials.load(&model.id) {
            Some(key) => format!("{} (your key {})", "✓".green(), mask_key(&key).dimmed()),
            None if model.has_fallback_key() => format!("{} (default key)", "✓".green()),
            None => format!("{}", "· no key".dimmed()),
        };
        println!("    {:<20} {}", model.display_name, status);
    }

    println!();
    let transcription = if credentials.load_global().is_some() {
        format!("{} (your key)", "✓".green())
    } else if config.transcription.is_configured() {
        format!("{} (configured)", "✓".green())
    } else {
        format!("{}", "· not configured".dimmed())
    };
    println!("  {:<18} {}", "Transcription key:".bold(), transcription);
    println!();

    Ok(())
}

fn found(path: &Path) -> String {
    if path.exists() {
        "✓".green().to_string()
    } else {
        "(not found)".red().to_string()
    }
}
