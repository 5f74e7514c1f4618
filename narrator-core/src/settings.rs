//! Generation settings: provider choice, named presets, request overrides.
//!
//! Settings are layered. Compiled defaults are deep-merged with an optional
//! JSON file, then environment variables override individual fields.
//! [`NarratorSettings::resolve`] turns a preset id into concrete request
//! parameters, consulting an explicit override first, then the preset, then
//! the provider's defaults for the preset's service.

use crate::json_heal::try_parse_with_healing;
use oracle::{OpenAiCompatible, ProviderKind, ReasoningEffort, ServiceKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Preset used by the suggestion and action-choice services.
pub const SUGGESTIONS_PRESET: &str = "suggestions";

/// Preset used by the style reviewer.
pub const STYLE_REVIEWER_PRESET: &str = "style-reviewer";

/// Errors from loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-preset request settings. Unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Raw JSON request body used verbatim in manual mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_body: Option<String>,
    /// Restrict routing to these upstream providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_only: Option<Vec<String>>,
}

impl PresetSettings {
    pub fn for_service(service: ServiceKind) -> Self {
        Self {
            service: Some(service),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    pub fn with_manual_body(mut self, body: impl Into<String>) -> Self {
        self.manual_body = Some(body.into());
        self
    }

    pub fn with_provider_only(mut self, providers: Vec<String>) -> Self {
        self.provider_only = Some(providers);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSettings {
    /// Send each preset's manual body instead of computed extras.
    #[serde(default)]
    pub manual_mode: bool,
}

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarratorSettings {
    pub provider: ProviderKind,
    /// Base URL for `openai-compatible`, or an override for any provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_base_url: Option<String>,
    #[serde(default)]
    pub presets: BTreeMap<String, PresetSettings>,
    #[serde(default)]
    pub advanced: AdvancedSettings,
}

impl Default for NarratorSettings {
    fn default() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert(
            SUGGESTIONS_PRESET.to_string(),
            PresetSettings::for_service(ServiceKind::Suggestions),
        );
        presets.insert(
            STYLE_REVIEWER_PRESET.to_string(),
            PresetSettings::for_service(ServiceKind::Classification),
        );
        Self {
            provider: ProviderKind::OpenRouter,
            custom_base_url: None,
            presets,
            advanced: AdvancedSettings::default(),
        }
    }
}

/// Concrete parameters for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub reasoning_effort: ReasoningEffort,
    pub extra_body: Option<Value>,
}

impl NarratorSettings {
    /// Load from a file (missing file means defaults) and apply environment
    /// overrides.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let mut settings = Self::load_file(path).await?;
        settings.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Defaults deep-merged with the file at `path`, without environment
    /// overrides.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let defaults = serde_json::to_value(Self::default())?;

        let merged = match fs::read_to_string(path).await {
            Ok(content) => {
                tracing::debug!(?path, "loading settings from file");
                let user: Value = serde_json::from_str(&content)?;
                deep_merge(defaults, user)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(?path, "settings file not found, using defaults");
                defaults
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_value(merged)?)
    }

    /// Apply `NARRATOR_PROVIDER`, `NARRATOR_BASE_URL` and
    /// `NARRATOR_MANUAL_MODE`. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = read("NARRATOR_PROVIDER") {
            match v.parse() {
                Ok(provider) => self.provider = provider,
                Err(e) => tracing::warn!(value = %v, error = %e, "ignoring NARRATOR_PROVIDER"),
            }
        }
        if let Some(v) = read("NARRATOR_BASE_URL") {
            self.custom_base_url = Some(v);
        }
        if let Some(v) = read("NARRATOR_MANUAL_MODE") {
            match parse_bool(&v) {
                Some(manual) => self.advanced.manual_mode = manual,
                None => tracing::warn!(value = %v, "ignoring NARRATOR_MANUAL_MODE"),
            }
        }
    }

    /// HTTP client for the configured provider. The key is read from
    /// `<PROVIDER>_API_KEY`; `custom_base_url` replaces the endpoint.
    pub fn client(&self) -> Result<OpenAiCompatible, oracle::Error> {
        match self.custom_base_url.as_deref() {
            Some(url) => OpenAiCompatible::for_provider(
                self.provider,
                std::env::var(self.provider.api_key_var()).ok(),
                Some(url),
            ),
            None => OpenAiCompatible::from_env(self.provider),
        }
    }

    pub fn preset(&self, preset_id: &str) -> Option<&PresetSettings> {
        self.presets.get(preset_id)
    }

    /// Resolve request parameters for a preset.
    pub fn resolve(&self, preset_id: &str, overrides: Option<&PresetSettings>) -> GenerationParams {
        let empty = PresetSettings::default();
        let preset = self.preset(preset_id).unwrap_or_else(|| {
            tracing::debug!(preset_id, "unknown preset, using provider defaults");
            &empty
        });
        let overrides = overrides.unwrap_or(&empty);

        let service = overrides
            .service
            .or(preset.service)
            .unwrap_or(ServiceKind::Narrative);
        let defaults = self.provider.service_defaults(service);

        let reasoning_effort = overrides
            .reasoning_effort
            .or(preset.reasoning_effort)
            .unwrap_or(defaults.reasoning_effort);
        let manual_body = overrides
            .manual_body
            .as_deref()
            .or(preset.manual_body.as_deref());
        let provider_only = overrides
            .provider_only
            .as_deref()
            .or(preset.provider_only.as_deref());

        GenerationParams {
            model: overrides
                .model
                .clone()
                .or_else(|| preset.model.clone())
                .unwrap_or_else(|| defaults.model.to_string()),
            temperature: overrides
                .temperature
                .or(preset.temperature)
                .unwrap_or(defaults.temperature),
            max_tokens: overrides
                .max_tokens
                .or(preset.max_tokens)
                .unwrap_or(defaults.max_tokens),
            reasoning_effort,
            extra_body: build_extra_body(
                self.advanced.manual_mode,
                manual_body,
                reasoning_effort,
                provider_only,
            ),
        }
    }
}

/// Provider-specific request extras.
///
/// In manual mode a manual body that heals to a JSON object is sent as is.
/// Otherwise reasoning effort and a provider allow-list are added when set.
pub fn build_extra_body(
    manual_mode: bool,
    manual_body: Option<&str>,
    reasoning_effort: ReasoningEffort,
    provider_only: Option<&[String]>,
) -> Option<Value> {
    if manual_mode {
        if let Some(body) = manual_body.filter(|b| !b.trim().is_empty()) {
            match try_parse_with_healing::<Value>(body) {
                Some(value @ Value::Object(_)) => return Some(value),
                _ => tracing::warn!("manual body is not a JSON object, using computed extras"),
            }
        }
    }

    let mut extra = Map::new();
    if let Some(effort) = reasoning_effort.as_wire() {
        extra.insert("reasoning".to_string(), json!({ "effort": effort }));
    }
    if let Some(only) = provider_only.filter(|p| !p.is_empty()) {
        extra.insert("provider".to_string(), json!({ "only": only }));
    }

    (!extra.is_empty()).then_some(Value::Object(extra))
}

/// Recursive merge: objects merge per key, anything else is replaced, and
/// nulls in `source` keep the target value.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_provider_defaults() {
        let settings = NarratorSettings::default();
        let params = settings.resolve(SUGGESTIONS_PRESET, None);
        assert_eq!(params.model, "deepseek/deepseek-chat");
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.max_tokens, 8192);
        assert_eq!(params.reasoning_effort, ReasoningEffort::Off);
        assert_eq!(params.extra_body, None);

        let review = settings.resolve(STYLE_REVIEWER_PRESET, None);
        assert_eq!(review.temperature, 0.3);
        assert_eq!(review.reasoning_effort, ReasoningEffort::High);
        assert_eq!(review.extra_body, Some(json!({"reasoning": {"effort": "high"}})));
    }

    #[test]
    fn test_resolve_layers() {
        let mut settings = NarratorSettings::default();
        settings.presets.insert(
            SUGGESTIONS_PRESET.into(),
            PresetSettings::for_service(ServiceKind::Suggestions)
                .with_model("preset-model")
                .with_temperature(0.9),
        );
        let overrides = PresetSettings::default().with_temperature(0.1);

        let params = settings.resolve(SUGGESTIONS_PRESET, Some(&overrides));
        assert_eq!(params.model, "preset-model");
        assert_eq!(params.temperature, 0.1);
        assert_eq!(params.max_tokens, 8192);
    }

    #[test]
    fn test_unknown_preset_uses_narrative_defaults() {
        let params = NarratorSettings::default().resolve("nope", None);
        assert_eq!(params.model, "anthropic/claude-sonnet-4");
        assert_eq!(params.temperature, 0.8);
    }

    #[test]
    fn test_extra_body_variants() {
        assert_eq!(build_extra_body(false, None, ReasoningEffort::Off, None), None);

        let only = vec!["deepinfra".to_string()];
        assert_eq!(
            build_extra_body(false, Some("{\"x\": 1}"), ReasoningEffort::Low, Some(&only)),
            Some(json!({"reasoning": {"effort": "low"}, "provider": {"only": ["deepinfra"]}}))
        );

        assert_eq!(
            build_extra_body(true, Some("{top_k: 40,}"), ReasoningEffort::High, None),
            Some(json!({"top_k": 40}))
        );

        assert_eq!(
            build_extra_body(true, None, ReasoningEffort::Medium, None),
            Some(json!({"reasoning": {"effort": "medium"}}))
        );

        assert_eq!(
            build_extra_body(true, Some("[1, 2]"), ReasoningEffort::Off, None),
            None
        );
    }

    #[test]
    fn test_deep_merge() {
        let merged = deep_merge(
            json!({"a": {"b": 1, "c": 2}, "d": [1], "e": 5}),
            json!({"a": {"c": 3}, "d": [2, 3], "e": null}),
        );
        assert_eq!(merged, json!({"a": {"b": 1, "c": 3}, "d": [2, 3], "e": 5}));
    }

    #[tokio::test]
    async fn test_load_file_merges_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(
            &path,
            r#"{"provider": "groq", "presets": {"suggestions": {"model": "llama-x"}}}"#,
        )
        .await
        .unwrap();

        let settings = NarratorSettings::load_file(&path).await.unwrap();
        assert_eq!(settings.provider, ProviderKind::Groq);
        let preset = settings.preset(SUGGESTIONS_PRESET).unwrap();
        assert_eq!(preset.model.as_deref(), Some("llama-x"));
        assert_eq!(preset.service, Some(ServiceKind::Suggestions));
        assert!(settings.preset(STYLE_REVIEWER_PRESET).is_some());
    }

    #[tokio::test]
    async fn test_missing_file_is_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = NarratorSettings::load_file(dir.path().join("none.json"))
            .await
            .unwrap();
        assert_eq!(settings, NarratorSettings::default());
    }

    #[tokio::test]
    async fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        assert!(matches!(
            NarratorSettings::load_file(&path).await,
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("NARRATOR_PROVIDER", "ollama"),
            ("NARRATOR_MANUAL_MODE", "yes"),
            ("NARRATOR_BASE_URL", "http://gpu:11434"),
        ]
        .into_iter()
        .collect();

        let mut settings = NarratorSettings::default();
        settings.apply_env_overrides(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(settings.provider, ProviderKind::Ollama);
        assert!(settings.advanced.manual_mode);
        assert_eq!(settings.custom_base_url.as_deref(), Some("http://gpu:11434"));
    }

    #[test]
    fn test_client_uses_custom_base_url() {
        let settings = NarratorSettings {
            provider: ProviderKind::OpenaiCompatible,
            custom_base_url: Some("http://localhost:1234/v1/".into()),
            ..Default::default()
        };
        assert_eq!(settings.client().unwrap().base_url(), "http://localhost:1234/v1");

        let settings = NarratorSettings {
            provider: ProviderKind::OpenaiCompatible,
            ..Default::default()
        };
        assert!(matches!(settings.client(), Err(oracle::Error::Config(_))));
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let mut settings = NarratorSettings::default();
        settings.apply_env_overrides(|name| match name {
            "NARRATOR_PROVIDER" => Some("skynet".into()),
            "NARRATOR_MANUAL_MODE" => Some("maybe".into()),
            _ => None,
        });
        assert_eq!(settings, NarratorSettings::default());
    }
}
