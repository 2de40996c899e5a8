//! Pipeline configuration and constants.
//!
//! Configuration lives in the external key-value store and is read once at
//! startup plus whenever a global toggle notification arrives. Store
//! failures and absent keys both fall back to the hardcoded defaults.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::store::ConfigStore;

/// Tuning constants.
pub mod constants {
    use std::time::Duration;

    // Batching
    pub const CHUNK_SIZE: usize = 100;

    // Cache
    pub const MAX_CACHE_ITEMS: usize = 1000;

    // Eligibility
    pub const MIN_TEXT_LENGTH: usize = 3;

    // Scheduling
    pub const RETRY_DELAY: Duration = Duration::from_secs(1);
    pub const TOGGLE_SETTLE: Duration = Duration::from_millis(500);
    pub const MUTATION_SETTLE: Duration = Duration::from_secs(1);
    pub const PERIODIC_INTERVAL: Duration = Duration::from_secs(3);

    // Defaults
    pub const DEFAULT_TARGET_LANGUAGE: &str = "Korean";
    pub const DEFAULT_MODEL: &str = "gpt-4.1";
    pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/responses";

    /// Durable marker set on the parent element of every rewritten text
    /// node. Survives script reloads; cleared only by a document load.
    pub const TRANSLATED_ATTR: &str = "data-translated";

    // Elements whose direct text content is never translated
    pub const SKIP_TAGS: &[&str] = &[
        "script", "style", "svg", "head", "noscript", "meta", "nav", "footer", "aside", "header",
    ];

    // Content-role ancestors: a match makes the unit eligible
    pub const CONTENT_TAGS: &[&str] = &[
        "main", "article", "section", "h1", "h2", "h3", "h4", "h5", "h6", "p",
    ];
    pub const CONTENT_CLASSES: &[&str] = &[
        "main",
        "content",
        "post",
        "article",
        "entry",
        "story",
        "comment",
        "reply",
        "text",
        "body",
        "description",
        "caption",
    ];

    // UI-role ancestors: a match (without a content match) rejects the unit
    pub const UI_TAGS: &[&str] = &["nav", "header", "footer", "aside"];
    pub const UI_CLASSES: &[&str] = &[
        "nav",
        "header",
        "footer",
        "sidebar",
        "menu",
        "navigation",
        "breadcrumb",
        "pagination",
        "social",
        "share",
        "ad",
        "advertisement",
        "banner",
        "popup",
        "modal",
        "tooltip",
    ];

    /// Keys consumed from the configuration store.
    pub mod keys {
        pub const TARGET_LANGUAGE: &str = "target_language";
        pub const MODEL: &str = "gpt_model";
        pub const GLOBAL_ENABLED: &str = "translation_enabled";
        pub const ENABLED_ORIGINS: &str = "enabled_origins";
        pub const CACHE: &str = "translation_cache";
        pub const API_TOKEN: &str = "api_token";
    }
}

/// Runtime configuration for one page context.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Language the backend is asked to translate into.
    pub target_language: String,
    /// Model identifier forwarded to the backend.
    pub model_id: String,
    /// Master switch. Defaults to on when the store has no value.
    pub global_enabled: bool,
    /// Per-origin opt-in map. Unseen origins default to off.
    pub per_origin_enabled: HashMap<String, bool>,
    /// Units per batch.
    pub chunk_size: usize,
    /// Cache capacity across all (language, model) partitions.
    pub max_cache_items: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_language: constants::DEFAULT_TARGET_LANGUAGE.to_string(),
            model_id: constants::DEFAULT_MODEL.to_string(),
            global_enabled: true,
            per_origin_enabled: HashMap::new(),
            chunk_size: constants::CHUNK_SIZE,
            max_cache_items: constants::MAX_CACHE_ITEMS,
        }
    }
}

impl PipelineConfig {
    /// Effective enablement for a page: the global switch and the
    /// per-origin opt-in must both be on.
    pub fn enabled_for(&self, origin: &str) -> bool {
        self.global_enabled && self.per_origin_enabled.get(origin).copied().unwrap_or(false)
    }

    pub fn set_origin_enabled(&mut self, origin: &str, enabled: bool) {
        self.per_origin_enabled.insert(origin.to_string(), enabled);
    }

    /// Reads the persisted configuration, substituting defaults for absent
    /// keys. A store failure yields the full default configuration.
    pub async fn load<S: ConfigStore>(store: &S) -> Self {
        let keys = [
            constants::keys::TARGET_LANGUAGE,
            constants::keys::MODEL,
            constants::keys::GLOBAL_ENABLED,
            constants::keys::ENABLED_ORIGINS,
        ];
        let values = match store.get(&keys).await {
            Ok(values) => values,
            Err(err) => {
                warn!("config read failed, using defaults: {err}");
                HashMap::new()
            }
        };

        let mut config = Self::default();
        if let Some(lang) = values
            .get(constants::keys::TARGET_LANGUAGE)
            .and_then(Value::as_str)
        {
            config.target_language = lang.to_string();
        }
        if let Some(model) = values.get(constants::keys::MODEL).and_then(Value::as_str) {
            config.model_id = model.to_string();
        }
        if let Some(enabled) = values
            .get(constants::keys::GLOBAL_ENABLED)
            .and_then(Value::as_bool)
        {
            config.global_enabled = enabled;
        }
        if let Some(origins) = values.get(constants::keys::ENABLED_ORIGINS) {
            match serde_json::from_value::<HashMap<String, bool>>(origins.clone()) {
                Ok(map) => config.per_origin_enabled = map,
                Err(err) => warn!("ignoring malformed origin map: {err}"),
            }
        }
        config
    }

    /// Writes the configuration back to the store. Used by the settings
    /// surface and the CLI; the in-page pipeline itself only reads.
    pub async fn save<S: ConfigStore>(&self, store: &S) -> Result<(), crate::error::StoreError> {
        let mut entries = HashMap::new();
        entries.insert(
            constants::keys::TARGET_LANGUAGE.to_string(),
            Value::String(self.target_language.clone()),
        );
        entries.insert(
            constants::keys::MODEL.to_string(),
            Value::String(self.model_id.clone()),
        );
        entries.insert(
            constants::keys::GLOBAL_ENABLED.to_string(),
            Value::Bool(self.global_enabled),
        );
        entries.insert(
            constants::keys::ENABLED_ORIGINS.to_string(),
            serde_json::to_value(&self.per_origin_enabled)?,
        );
        store.set(entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn empty_store_yields_defaults() {
        let store = MemoryStore::new();
        let config = PipelineConfig::load(&store).await;

        assert_eq!(config.target_language, constants::DEFAULT_TARGET_LANGUAGE);
        assert_eq!(config.model_id, constants::DEFAULT_MODEL);
        assert!(config.global_enabled, "global flag should default to on");
        assert!(config.per_origin_enabled.is_empty());
    }

    #[tokio::test]
    async fn stored_values_override_defaults() {
        let store = MemoryStore::new();
        let mut config = PipelineConfig::default();
        config.target_language = "French".to_string();
        config.model_id = "gpt-4o".to_string();
        config.global_enabled = false;
        config.set_origin_enabled("example.com", true);
        config.save(&store).await.expect("save should succeed");

        let loaded = PipelineConfig::load(&store).await;
        assert_eq!(loaded.target_language, "French");
        assert_eq!(loaded.model_id, "gpt-4o");
        assert!(!loaded.global_enabled);
        assert_eq!(loaded.per_origin_enabled.get("example.com"), Some(&true));
    }

    #[test]
    fn enablement_requires_both_switches() {
        let mut config = PipelineConfig::default();
        assert!(
            !config.enabled_for("example.com"),
            "unseen origins default to off"
        );

        config.set_origin_enabled("example.com", true);
        assert!(config.enabled_for("example.com"));
        assert!(!config.enabled_for("other.com"));

        config.global_enabled = false;
        assert!(
            !config.enabled_for("example.com"),
            "global switch vetoes the origin opt-in"
        );
    }
}
