//! LLM-backed generation services.
//!
//! Each service renders a system/user prompt pair from its built-in template,
//! sends it through a [`ChatClient`] with parameters resolved from
//! [`NarratorSettings`], heals the reply and coerces it into a typed result.
//! Failures of any kind are logged and produce the service's empty result.

pub mod action_choices;
pub mod coerce;
pub mod style_review;
pub mod suggestions;
pub mod user_style;

pub use action_choices::{ActionChoice, ActionChoicesResult, ActionChoicesService, ChoiceType};
pub use style_review::{PhraseAnalysis, Severity, StyleReviewResult, StyleReviewerService};
pub use suggestions::{StorySuggestion, SuggestionType, SuggestionsResult, SuggestionsService};
pub use user_style::UserStyle;

use crate::context::RenderResult;
use crate::json_heal::HealError;
use crate::settings::{NarratorSettings, PresetSettings};
use crate::story::LorebookEntry;
use crate::template::{self, Namespace};
use oracle::{ChatClient, ChatRequest, Message};
use std::sync::Arc;
use thiserror::Error;

/// Built-in prompt templates, keyed by template id.
pub const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("action-choices", include_str!("prompts/action-choices.txt")),
    ("action-choices-user", include_str!("prompts/action-choices-user.txt")),
    ("suggestions", include_str!("prompts/suggestions.txt")),
    ("suggestions-user", include_str!("prompts/suggestions-user.txt")),
    ("style-reviewer", include_str!("prompts/style-reviewer.txt")),
    ("style-reviewer-user", include_str!("prompts/style-reviewer-user.txt")),
];

/// Errors inside a generation call. Services never return these; they log
/// them and fall back to an empty result.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM error: {0}")]
    Client(#[from] oracle::Error),

    #[error("Unusable reply: {0}")]
    Heal(#[from] HealError),
}

fn builtin(template_id: &str) -> &'static str {
    BUILTIN_TEMPLATES
        .iter()
        .find(|(id, _)| *id == template_id)
        .map(|(_, body)| *body)
        .unwrap_or_default()
}

/// Render a built-in template pair against a namespace.
pub fn render_builtin(template_id: &str, namespace: &Namespace) -> RenderResult {
    RenderResult {
        system: template::render(builtin(template_id), namespace),
        user: template::render(builtin(&format!("{template_id}-user")), namespace),
    }
}

/// Bulleted lorebook listing, at most `cap` entries.
pub(crate) fn lorebook_list(entries: &[LorebookEntry], cap: usize) -> String {
    entries
        .iter()
        .take(cap)
        .map(|e| match &e.description {
            Some(d) if !d.is_empty() => format!("• {} ({}): {d}", e.name, e.entry_type),
            _ => format!("• {} ({})", e.name, e.entry_type),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Client, settings and preset shared by every service.
#[derive(Clone)]
pub struct Generator {
    client: Arc<dyn ChatClient>,
    settings: Arc<NarratorSettings>,
    preset_id: String,
    overrides: Option<PresetSettings>,
}

impl Generator {
    pub fn new(
        client: Arc<dyn ChatClient>,
        settings: Arc<NarratorSettings>,
        preset_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            settings,
            preset_id: preset_id.into(),
            overrides: None,
        }
    }

    pub fn with_preset(mut self, preset_id: impl Into<String>) -> Self {
        self.preset_id = preset_id.into();
        self
    }

    pub fn with_overrides(mut self, overrides: PresetSettings) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn preset_id(&self) -> &str {
        &self.preset_id
    }

    /// Send a prompt pair and return the raw reply text.
    pub async fn complete(&self, prompts: RenderResult) -> Result<String, GenerationError> {
        let params = self
            .settings
            .resolve(&self.preset_id, self.overrides.as_ref());

        let mut messages = Vec::with_capacity(2);
        if !prompts.system.is_empty() {
            messages.push(Message::system(prompts.system));
        }
        messages.push(Message::user(prompts.user));

        let request = ChatRequest::new(params.model, messages)
            .with_temperature(params.temperature)
            .with_max_tokens(params.max_tokens)
            .with_extra_body(params.extra_body);

        let response = self.client.generate_response(request).await?;

        if let Some(usage) = response.usage {
            tracing::debug!(
                preset = %self.preset_id,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "generation usage"
            );
        }

        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use oracle::Role;
    use serde_json::json;

    #[test]
    fn test_lorebook_list() {
        let entries: Vec<LorebookEntry> = (0..20)
            .map(|i| LorebookEntry {
                name: format!("E{i}"),
                entry_type: "location".into(),
                description: (i == 0).then(|| "first".to_string()),
            })
            .collect();
        let list = lorebook_list(&entries, 12);
        assert_eq!(list.lines().count(), 12);
        assert!(list.starts_with("• E0 (location): first\n• E1 (location)\n"));
    }

    #[test]
    fn test_render_builtin_pairs() {
        let mut ns = Namespace::new();
        ns.insert("passageCount".into(), json!(2));
        ns.insert("passages".into(), json!("A\n\n---\n\nB"));
        let prompts = render_builtin("style-reviewer", &ns);
        assert!(prompts.system.contains("JSON"));
        assert!(prompts.user.contains("Review these 2 passages"));
        assert!(prompts.user.contains("A\n\n---\n\nB"));

        assert_eq!(render_builtin("missing", &ns), RenderResult::default());
    }

    #[tokio::test]
    async fn test_complete_sends_resolved_params() {
        let client = Arc::new(ScriptedClient::replies(["ok"]));
        let settings = Arc::new(NarratorSettings::default());
        let generator = Generator::new(client.clone(), settings, "style-reviewer");

        let reply = generator
            .complete(RenderResult {
                system: "sys".into(),
                user: "usr".into(),
            })
            .await
            .unwrap();
        assert_eq!(reply, "ok");

        let request = client.requests().pop().unwrap();
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].content, "usr");
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.extra_body, Some(json!({"reasoning": {"effort": "high"}})));
    }

    #[tokio::test]
    async fn test_complete_with_overrides_and_no_system() {
        let client = Arc::new(ScriptedClient::replies(["ok"]));
        let generator = Generator::new(client.clone(), Arc::new(NarratorSettings::default()), "x")
            .with_preset("suggestions")
            .with_overrides(PresetSettings::default().with_model("m").with_max_tokens(10));

        generator
            .complete(RenderResult {
                system: String::new(),
                user: "u".into(),
            })
            .await
            .unwrap();

        let request = client.requests().pop().unwrap();
        assert_eq!(request.model, "m");
        assert_eq!(request.max_tokens, Some(10));
        assert_eq!(request.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_propagates_client_errors() {
        let client = Arc::new(ScriptedClient::new(Vec::new()));
        let generator = Generator::new(client, Arc::new(NarratorSettings::default()), "suggestions");
        let err = generator.complete(RenderResult::default()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Client(_)));
    }
}
