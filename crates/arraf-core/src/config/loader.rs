//! Config loader — reads `~/.arraf/config.json`, migrates legacy catalog
//! field names, and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.arraf/config.json`
//! 3. Environment variables `ARRAF_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{Config, ModelConfig};

const ENV_PREFIX: &str = "ARRAF_";
const MODEL_KEY_PREFIX: &str = "ARRAF_MODELS__";
const MODEL_KEY_SUFFIX: &str = "__FALLBACK_KEY";

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the given path (or the default one) + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    apply_env_overrides(load_config_from_path(&config_path), std::env::vars())
}

/// Load config from a specific file path, without env overrides.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return Config::default();
        }
    };

    migrate_config(&mut raw);

    match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to deserialize config: {}", e);
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Rename legacy catalog fields inside `models[]`.
///
/// Older catalogs used `name`, `model`, `defaultApiKey`, and `sections`.
/// Existing new-style fields are never overwritten.
fn migrate_config(raw: &mut serde_json::Value) {
    const RENAMES: &[(&str, &str)] = &[
        ("name", "displayName"),
        ("model", "upstreamModelId"),
        ("defaultApiKey", "fallbackKey"),
        ("sections", "capabilityTags"),
    ];

    let Some(models) = raw.get_mut("models").and_then(|m| m.as_array_mut()) else {
        return;
    };

    for entry in models.iter_mut() {
        let Some(obj) = entry.as_object_mut() else {
            continue;
        };
        for (old, new) in RENAMES {
            if let Some(value) = obj.remove(*old) {
                if !obj.contains_key(*new) {
                    obj.insert((*new).to_string(), value);
                    debug!("Migrated models[].{} → models[].{}", old, new);
                }
            }
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `ARRAF_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `ARRAF_DEFAULTS__MODEL` → `defaults.model`
/// - `ARRAF_ENDPOINTS__CHAT_URL` → `endpoints.chat_url`
/// - `ARRAF_ENDPOINTS__TRANSCRIPTION_URL` → `endpoints.transcription_url`
/// - `ARRAF_ENDPOINTS__TRANSCRIPTION_MODEL` → `endpoints.transcription_model`
/// - `ARRAF_ENDPOINTS__TIMEOUT_SECS` → `endpoints.timeout_secs`
/// - `ARRAF_TRANSCRIPTION__API_KEY` → `transcription.api_key`
/// - `ARRAF_STORAGE__CREDENTIALS_PATH` → `storage.credentials_path`
/// - `ARRAF_MODELS__<ID>__FALLBACK_KEY` → `models[id].fallback_key`
///   (`<ID>` is the model id upper-cased with `-`/`.` as `_`)
fn apply_env_overrides<I>(mut config: Config, vars: I) -> Config
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, val) in vars {
        let Some(field) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        match field {
            "DEFAULTS__MODEL" => config.defaults.model = val,
            "ENDPOINTS__CHAT_URL" => config.endpoints.chat_url = val,
            "ENDPOINTS__TRANSCRIPTION_URL" => config.endpoints.transcription_url = val,
            "ENDPOINTS__TRANSCRIPTION_MODEL" => config.endpoints.transcription_model = val,
            "ENDPOINTS__TIMEOUT_SECS" => match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.endpoints.timeout_secs = secs,
                _ => warn!("Ignoring {}: expected a positive number of seconds", name),
            },
            "TRANSCRIPTION__API_KEY" => config.transcription.api_key = val,
            "STORAGE__CREDENTIALS_PATH" => config.storage.credentials_path = val,
            _ => apply_model_key_env(&mut config, &name, val),
        }
    }
    config
}

/// Apply one `ARRAF_MODELS__<ID>__FALLBACK_KEY` variable, if `name` is one.
fn apply_model_key_env(config: &mut Config, name: &str, val: String) {
    let Some(token) = name
        .strip_prefix(MODEL_KEY_PREFIX)
        .and_then(|rest| rest.strip_suffix(MODEL_KEY_SUFFIX))
    else {
        return;
    };
    if token.is_empty() || val.trim().is_empty() {
        return;
    }

    match config.models.iter_mut().find(|m| env_token(&m.id) == token) {
        Some(model) => model.fallback_key = Some(val),
        None => {
            let mut model = ModelConfig::new(token.to_lowercase().replace('_', "-"));
            model.fallback_key = Some(val);
            config.models.push(model);
        }
    }
    debug!(var = name, "Applied model fallback key from environment");
}

/// Env-var token for a model id: `gemma-3` → `GEMMA_3`.
pub fn env_token(model_id: &str) -> String {
    model_id
        .chars()
        .map(|c| match c {
            '-' | '.' | '/' | ':' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
