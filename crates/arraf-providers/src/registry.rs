//! Model registry — the static built-in catalog plus config-driven overrides.
//!
//! The registry is built once at startup and never mutated. Built-in entries
//! carry **no** credentials: fallback keys come from configuration or the
//! environment (`ARRAF_MODELS__<ID>__FALLBACK_KEY`).

use std::collections::HashSet;

use tracing::{debug, warn};

use arraf_core::config::{Config, ModelConfig};
use arraf_core::{ChatError, ModelEntry};

// ─────────────────────────────────────────────
// Built-in catalog
// ─────────────────────────────────────────────

/// Static description of one built-in model.
#[derive(Clone, Debug)]
pub struct BuiltinModel {
    /// Catalog id (e.g. `"qwen-coder"`).
    pub id: &'static str,
    /// Human-readable name for menus.
    pub display_name: &'static str,
    /// Model string sent to the gateway.
    pub upstream_model_id: &'static str,
    /// Free-form capability/section tags.
    pub capability_tags: &'static [&'static str],
}

impl BuiltinModel {
    fn to_entry(&self) -> ModelEntry {
        ModelEntry::new(self.id, self.display_name, self.upstream_model_id)
            .with_tags(self.capability_tags.iter().copied())
    }
}

/// Built-in models, in display order.
pub static BUILTIN_MODELS: &[BuiltinModel] = &[
    BuiltinModel {
        id: "qwen-coder",
        display_name: "Qwen Coder 32B",
        upstream_model_id: "qwen/qwen-2.5-coder-32b-instruct:free",
        capability_tags: &["interpretation", "astro"],
    },
    BuiltinModel {
        id: "deepseek-r1",
        display_name: "DeepSeek R1",
        upstream_model_id: "deepseek/deepseek-r1-distill-qwen-32b:free",
        capability_tags: &["compatibility", "spiritual"],
    },
    BuiltinModel {
        id: "gemini-flash",
        display_name: "Gemini 2.0 Flash",
        upstream_model_id: "google/gemini-2.0-flash-lite-preview-02-05:free",
        capability_tags: &["political", "horoscope"],
    },
    BuiltinModel {
        id: "gemma-3",
        display_name: "Gemma 3 4B",
        upstream_model_id: "google/gemma-3-4b-it:free",
        capability_tags: &["chat", "interpretation"],
    },
    BuiltinModel {
        id: "deepseek-chat",
        display_name: "DeepSeek Chat",
        upstream_model_id: "deepseek/deepseek-chat:free",
        capability_tags: &["chat", "spiritual", "compatibility"],
    },
];

// ─────────────────────────────────────────────
// ModelRegistry
// ─────────────────────────────────────────────

/// Immutable, ordered model catalog.
#[derive(Clone, Debug)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
    default_index: usize,
}

impl ModelRegistry {
    /// Build a registry from explicit entries.
    ///
    /// Fails on an empty catalog, duplicate ids, or blank upstream ids.
    /// `default_id` falls back to the first entry when absent or unknown.
    pub fn new(entries: Vec<ModelEntry>, default_id: Option<&str>) -> Result<Self, ChatError> {
        if entries.is_empty() {
            return Err(ChatError::InvalidRegistry("catalog is empty".into()));
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.id.trim().is_empty() {
                return Err(ChatError::InvalidRegistry("model with blank id".into()));
            }
            if entry.upstream_model_id.trim().is_empty() {
                return Err(ChatError::InvalidRegistry(format!(
                    "model '{}' has no upstream model id",
                    entry.id
                )));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ChatError::InvalidRegistry(format!(
                    "duplicate model id '{}'",
                    entry.id
                )));
            }
        }

        let default_index = match default_id {
            Some(id) => entries.iter().position(|e| e.id == id).unwrap_or_else(|| {
                warn!(model = id, "default model not in catalog, using first entry");
                0
            }),
            None => 0,
        };

        Ok(ModelRegistry {
            entries,
            default_index,
        })
    }

    /// The built-in catalog without any credentials.
    pub fn builtin() -> Result<Self, ChatError> {
        Self::new(BUILTIN_MODELS.iter().map(BuiltinModel::to_entry).collect(), None)
    }

    /// Built-in catalog merged with `config.models`, default from `config.defaults.model`.
    pub fn from_config(config: &Config) -> Result<Self, ChatError> {
        let entries = merge_catalog(BUILTIN_MODELS, &config.models);
        debug!(
            models = entries.len(),
            with_fallback = entries.iter().filter(|e| e.has_fallback_key()).count(),
            "model registry built"
        );
        Self::new(entries, Some(&config.defaults.model))
    }

    /// All models, in display order.
    pub fn list_models(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn find_by_id(&self, id: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn default_model(&self) -> &ModelEntry {
        &self.entries[self.default_index]
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merge configured overrides over the built-in catalog.
///
/// Known ids are patched in place (order kept); unknown ids with an upstream
/// model id are appended; unknown ids without one are skipped.
fn merge_catalog(builtin: &[BuiltinModel], overrides: &[ModelConfig]) -> Vec<ModelEntry> {
    let mut entries: Vec<ModelEntry> = builtin.iter().map(BuiltinModel::to_entry).collect();

    for cfg in overrides {
        if let Some(entry) = entries.iter_mut().find(|e| e.id == cfg.id) {
            apply_override(entry, cfg);
            continue;
        }

        match &cfg.upstream_model_id {
            Some(upstream) if !upstream.trim().is_empty() => {
                let display = cfg.display_name.clone().unwrap_or_else(|| cfg.id.clone());
                let mut entry = ModelEntry::new(&cfg.id, display, upstream);
                apply_override(&mut entry, cfg);
                entries.push(entry);
            }
            _ => warn!(
                model = %cfg.id,
                "configured model is not built in and has no upstreamModelId, skipping"
            ),
        }
    }

    entries
}

fn apply_override(entry: &mut ModelEntry, cfg: &ModelConfig) {
    if let Some(name) = &cfg.display_name {
        entry.display_name = name.clone();
    }
    if let Some(upstream) = &cfg.upstream_model_id {
        entry.upstream_model_id = upstream.clone();
    }
    if let Some(tags) = &cfg.capability_tags {
        entry.capability_tags = tags.iter().cloned().collect();
    }
    if let Some(key) = &cfg.fallback_key {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            entry.fallback_key = Some(trimmed.to_string());
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_order_and_no_keys() {
        let registry = ModelRegistry::builtin().unwrap();
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(
            ids,
            ["qwen-coder", "deepseek-r1", "gemini-flash", "gemma-3", "deepseek-chat"]
        );
        assert!(registry.list_models().iter().all(|m| !m.has_fallback_key()));
        assert_eq!(registry.default_model().id, "qwen-coder");
    }

    #[test]
    fn test_find_by_id() {
        let registry = ModelRegistry::builtin().unwrap();
        let gemma = registry.find_by_id("gemma-3").unwrap();
        assert_eq!(gemma.display_name, "Gemma 3 4B");
        assert_eq!(gemma.upstream_model_id, "google/gemma-3-4b-it:free");
        assert!(gemma.capability_tags.contains("chat"));
        assert!(registry.find_by_id("gpt-5").is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let entries = vec![
            ModelEntry::new("a", "A", "x/a"),
            ModelEntry::new("a", "A again", "x/a2"),
        ];
        let err = ModelRegistry::new(entries, None).unwrap_err();
        assert!(matches!(err, ChatError::InvalidRegistry(_)));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_and_blank_rejected() {
        assert!(ModelRegistry::new(vec![], None).is_err());
        assert!(ModelRegistry::new(vec![ModelEntry::new("a", "A", " ")], None).is_err());
        assert!(ModelRegistry::new(vec![ModelEntry::new("", "A", "x/a")], None).is_err());
    }

    #[test]
    fn test_unknown_default_falls_back_to_first() {
        let entries = vec![ModelEntry::new("a", "A", "x/a"), ModelEntry::new("b", "B", "x/b")];
        let registry = ModelRegistry::new(entries.clone(), Some("nope")).unwrap();
        assert_eq!(registry.default_model().id, "a");

        let registry = ModelRegistry::new(entries, Some("b")).unwrap();
        assert_eq!(registry.default_model().id, "b");
    }

    #[test]
    fn test_from_config_injects_fallback_key() {
        let mut config = Config::default();
        let mut qwen = ModelConfig::new("qwen-coder");
        qwen.fallback_key = Some("  sk-or-injected ".into());
        config.models.push(qwen);

        let registry = ModelRegistry::from_config(&config).unwrap();
        let qwen = registry.find_by_id("qwen-coder").unwrap();
        assert_eq!(qwen.fallback_key.as_deref(), Some("sk-or-injected"));
        // Untouched entries keep built-in values
        assert!(!registry.find_by_id("gemma-3").unwrap().has_fallback_key());
        assert_eq!(registry.len(), BUILTIN_MODELS.len());
    }

    #[test]
    fn test_from_config_overrides_and_additions() {
        let mut config = Config::default();
        config.defaults.model = "llama-local".into();

        let mut gemini = ModelConfig::new("gemini-flash");
        gemini.display_name = Some("Gemini Flash Lite".into());
        gemini.capability_tags = Some(vec!["vision".into()]);

        let mut llama = ModelConfig::new("llama-local");
        llama.upstream_model_id = Some("meta-llama/llama-3.3-70b-instruct".into());

        let orphan = ModelConfig::new("no-upstream");

        config.models = vec![gemini, llama, orphan];

        let registry = ModelRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), BUILTIN_MODELS.len() + 1);

        let gemini = registry.find_by_id("gemini-flash").unwrap();
        assert_eq!(gemini.display_name, "Gemini Flash Lite");
        assert_eq!(gemini.capability_tags.len(), 1);
        // Position preserved
        assert_eq!(registry.list_models()[2].id, "gemini-flash");

        let llama = registry.find_by_id("llama-local").unwrap();
        assert_eq!(llama.display_name, "llama-local");
        assert_eq!(registry.list_models().last().unwrap().id, "llama-local");
        assert_eq!(registry.default_model().id, "llama-local");

        assert!(registry.find_by_id("no-upstream").is_none());
    }
}
