//! Flat context assembly and template rendering.
//!
//! A [`ContextBuilder`] is created per render through one of two factories:
//! [`ContextBuilder::for_story`] loads story state from a [`StoryStore`], and
//! [`ContextBuilder::for_wizard`] derives it from in-memory wizard data.
//! Callers layer their own runtime values on with [`ContextBuilder::add`] and
//! then [`ContextBuilder::render`] a template pair from the active pack.
//!
//! Nothing here fails: missing stories, templates and store errors all
//! degrade to defaults or empty strings.

use crate::pack::DEFAULT_PACK_ID;
use crate::store::StoryStore;
use crate::story::{Pov, StoryMode, Tense};
use crate::template::{self, Namespace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Templates whose stored content is used verbatim.
pub const EXTERNAL_TEMPLATE_IDS: &[&str] = &[
    "image-style-soft-anime",
    "image-style-semi-realistic",
    "image-style-photorealistic",
    "tool-definitions",
];

/// Protagonist name used when the story has none.
pub const DEFAULT_PROTAGONIST: &str = "the protagonist";

/// How a template id is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// System and `-user` bodies rendered against the namespace.
    Templated,
    /// Raw stored content returned as the system prompt.
    External,
}

impl TemplateKind {
    pub fn of(template_id: &str) -> Self {
        if EXTERNAL_TEMPLATE_IDS.contains(&template_id) {
            TemplateKind::External
        } else {
            TemplateKind::Templated
        }
    }
}

/// Rendered prompt pair. Either half may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    pub system: String,
    pub user: String,
}

/// Options for the builder factories.
#[derive(Debug, Clone, Default)]
pub struct BuilderConfig {
    /// Pack to render from, overriding the story's own.
    pub pack_id: Option<String>,
    /// Leave pack custom-variable defaults out of the namespace.
    pub skip_custom_variables: bool,
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pack_id(mut self, pack_id: impl Into<String>) -> Self {
        self.pack_id = Some(pack_id.into());
        self
    }

    pub fn skip_custom_variables(mut self) -> Self {
        self.skip_custom_variables = true;
        self
    }
}

/// Story creation wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WizardStep {
    PackSelection = 1,
    SettingCreation = 2,
    WritingStyle = 3,
    CharacterCreation = 4,
    SupportingCharacters = 5,
    OpeningGeneration = 6,
}

/// Themes as the wizard holds them: a list or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Themes {
    List(Vec<String>),
    Text(String),
}

impl Themes {
    fn joined(&self) -> String {
        match self {
            Themes::List(items) => items.join(", "),
            Themes::Text(text) => text.clone(),
        }
    }
}

/// Selections accumulated by the story creation wizard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardData {
    #[serde(default)]
    pub pack_id: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub setting_description: Option<String>,
    #[serde(default)]
    pub setting_name: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub themes: Option<Themes>,
    #[serde(default)]
    pub mode: Option<StoryMode>,
    #[serde(default)]
    pub pov: Option<Pov>,
    #[serde(default)]
    pub tense: Option<Tense>,
    #[serde(default)]
    pub protagonist_name: Option<String>,
    #[serde(default)]
    pub protagonist_description: Option<String>,
    #[serde(default)]
    pub current_location: Option<String>,
    #[serde(default)]
    pub story_time: Option<String>,
}

/// Treat empty strings as absent.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn text_or(value: Option<&str>, fallback: &str) -> Value {
    Value::String(non_empty(value).unwrap_or(fallback).to_string())
}

/// Flat namespace plus the pack it renders from.
pub struct ContextBuilder {
    store: Arc<dyn StoryStore>,
    context: Namespace,
    pack_id: String,
}

impl ContextBuilder {
    fn empty(store: Arc<dyn StoryStore>, pack_id: String) -> Self {
        Self {
            store,
            context: Namespace::new(),
            pack_id,
        }
    }

    /// Load the namespace for a stored story.
    pub async fn for_story(
        store: Arc<dyn StoryStore>,
        story_id: &str,
        config: BuilderConfig,
    ) -> Self {
        tracing::debug!(story_id, pack_override = ?config.pack_id, "building story context");

        let (story, characters, locations) = tokio::join!(
            store.story(story_id),
            store.characters(story_id),
            store.locations(story_id),
        );

        let story = match story {
            Ok(Some(story)) => story,
            Ok(None) => {
                tracing::debug!(story_id, "story not found");
                let pack_id = config.pack_id.unwrap_or_else(|| DEFAULT_PACK_ID.to_string());
                return Self::empty(store, pack_id);
            }
            Err(e) => {
                tracing::warn!(story_id, error = %e, "failed to load story");
                let pack_id = config.pack_id.unwrap_or_else(|| DEFAULT_PACK_ID.to_string());
                return Self::empty(store, pack_id);
            }
        };

        let characters = characters.unwrap_or_else(|e| {
            tracing::warn!(story_id, error = %e, "failed to load characters");
            Vec::new()
        });
        let locations = locations.unwrap_or_else(|e| {
            tracing::warn!(story_id, error = %e, "failed to load locations");
            Vec::new()
        });

        let settings = story.settings.clone().unwrap_or_default();
        let protagonist = characters.iter().find(|c| c.is_protagonist());
        let current_location = locations.iter().find(|l| l.current);

        let mut ctx = Namespace::new();
        let mut set = |key: &str, value: Value| {
            ctx.insert(key.to_string(), value);
        };
        set("mode", story.mode.unwrap_or_default().as_str().into());
        set("pov", settings.pov.unwrap_or(Pov::Second).as_str().into());
        set("tense", settings.tense.unwrap_or(Tense::Present).as_str().into());
        set("genre", text_or(story.genre.as_deref(), ""));
        set("tone", text_or(settings.tone.as_deref(), ""));
        set("themes", settings.themes.join(", ").into());
        set("settingDescription", text_or(story.description.as_deref(), ""));
        set(
            "protagonistName",
            text_or(protagonist.map(|c| c.name.as_str()), DEFAULT_PROTAGONIST),
        );
        set(
            "protagonistDescription",
            text_or(protagonist.and_then(|c| c.description.as_deref()), ""),
        );
        set(
            "currentLocation",
            text_or(current_location.map(|l| l.name.as_str()), ""),
        );
        set(
            "storyTime",
            story
                .time_tracker
                .map(|t| t.to_string())
                .unwrap_or_default()
                .into(),
        );
        set("visualProseMode", settings.visual_prose_mode.into());
        set(
            "inlineImageMode",
            (settings.image_generation_mode.as_deref() == Some("inline")).into(),
        );

        let pack_id = match config.pack_id.filter(|p| !p.is_empty()) {
            Some(pack_id) => pack_id,
            None => match store.story_pack_id(story_id).await {
                Ok(Some(pack_id)) if !pack_id.is_empty() => pack_id,
                Ok(_) => DEFAULT_PACK_ID.to_string(),
                Err(e) => {
                    tracing::warn!(story_id, error = %e, "failed to load story pack id");
                    DEFAULT_PACK_ID.to_string()
                }
            },
        };

        let mut builder = Self {
            store,
            context: ctx,
            pack_id,
        };

        if !config.skip_custom_variables {
            builder.load_custom_variables().await;
        }

        tracing::debug!(
            story_id,
            pack_id = %builder.pack_id,
            keys = builder.context.len(),
            "story context ready"
        );
        builder
    }

    /// Derive the namespace from wizard data. Keys belonging to steps not yet
    /// reached are absent.
    pub fn for_wizard(
        store: Arc<dyn StoryStore>,
        data: &WizardData,
        step: WizardStep,
        config: BuilderConfig,
    ) -> Self {
        let pack_id = config
            .pack_id
            .filter(|p| !p.is_empty())
            .or_else(|| non_empty(data.pack_id.as_deref()).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_PACK_ID.to_string());
        let mut builder = Self::empty(store, pack_id);
        let ctx = &mut builder.context;

        if step >= WizardStep::SettingCreation {
            ctx.insert("genre".into(), text_or(data.genre.as_deref(), ""));
            ctx.insert(
                "settingDescription".into(),
                text_or(data.setting_description.as_deref(), ""),
            );
            ctx.insert("settingName".into(), text_or(data.setting_name.as_deref(), ""));
            ctx.insert("tone".into(), text_or(data.tone.as_deref(), ""));
            ctx.insert(
                "themes".into(),
                data.themes.as_ref().map(Themes::joined).unwrap_or_default().into(),
            );
        }

        if step >= WizardStep::WritingStyle {
            ctx.insert("mode".into(), data.mode.unwrap_or_default().as_str().into());
            ctx.insert("pov".into(), data.pov.unwrap_or(Pov::Second).as_str().into());
            ctx.insert(
                "tense".into(),
                data.tense.unwrap_or(Tense::Present).as_str().into(),
            );
        }

        if step >= WizardStep::CharacterCreation {
            ctx.insert(
                "protagonistName".into(),
                text_or(data.protagonist_name.as_deref(), DEFAULT_PROTAGONIST),
            );
            ctx.insert(
                "protagonistDescription".into(),
                text_or(data.protagonist_description.as_deref(), ""),
            );
            ctx.insert(
                "currentLocation".into(),
                text_or(data.current_location.as_deref(), ""),
            );
        }

        // Supporting characters arrive as runtime data through add().

        if step >= WizardStep::OpeningGeneration {
            ctx.insert("storyTime".into(), text_or(data.story_time.as_deref(), ""));
        }

        tracing::debug!(?step, pack_id = %builder.pack_id, keys = builder.context.len(), "wizard context ready");
        builder
    }

    /// Merge runtime values, overwriting existing keys.
    pub fn add<K, V>(&mut self, data: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in data {
            self.context.insert(key.into(), value.into());
        }
        self
    }

    /// Render a template pair from the active pack.
    pub async fn render(&self, template_id: &str) -> RenderResult {
        tracing::debug!(template_id, pack_id = %self.pack_id, "rendering");

        match TemplateKind::of(template_id) {
            TemplateKind::External => RenderResult {
                system: self.template_body(template_id).await,
                user: String::new(),
            },
            TemplateKind::Templated => {
                let user_id = format!("{template_id}-user");
                let (system, user) =
                    tokio::join!(self.template_body(template_id), self.template_body(&user_id));

                if system.is_empty() && user.is_empty() {
                    tracing::debug!(template_id, pack_id = %self.pack_id, "no template content found");
                }

                RenderResult {
                    system: template::render(&system, &self.context),
                    user: template::render(&user, &self.context),
                }
            }
        }
    }

    /// Copy of the namespace.
    pub fn context(&self) -> Namespace {
        self.context.clone()
    }

    pub fn pack_id(&self) -> &str {
        &self.pack_id
    }

    async fn template_body(&self, template_id: &str) -> String {
        match self.store.pack_template(&self.pack_id, template_id).await {
            Ok(Some(template)) => template.content,
            Ok(None) => String::new(),
            Err(e) => {
                tracing::warn!(template_id, pack_id = %self.pack_id, error = %e, "failed to load template");
                String::new()
            }
        }
    }

    /// Add pack custom-variable defaults for keys not already present.
    async fn load_custom_variables(&mut self) {
        match self.store.pack_variables(&self.pack_id).await {
            Ok(variables) => {
                let count = variables.len();
                for variable in variables {
                    self.context
                        .entry(variable.variable_name)
                        .or_insert_with(|| Value::String(variable.default_value.unwrap_or_default()));
                }
                tracing::debug!(pack_id = %self.pack_id, count, "loaded custom variables");
            }
            Err(e) => {
                tracing::warn!(pack_id = %self.pack_id, error = %e, "failed to load custom variables");
            }
        }
    }
}
