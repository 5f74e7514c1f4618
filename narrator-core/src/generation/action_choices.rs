//! Action choices offered to the player after each narration.

use super::coerce::{self, CHOICES, ICON, TEXT, TYPE};
use super::user_style::{length_instruction, pov_instruction, UserStyle};
use super::{lorebook_list, render_builtin, GenerationError, Generator};
use crate::json_heal::{parse_with_healing, HealError};
use crate::settings::{NarratorSettings, PresetSettings, SUGGESTIONS_PRESET};
use crate::story::{LorebookEntry, Pov, StoryEntry, StoryMode, Tense, WorldState};
use crate::template::Namespace;
use oracle::ChatClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Most choices kept from one reply.
pub const MAX_CHOICES: usize = 4;

/// Lorebook entries listed in the prompt.
const LOREBOOK_LIMIT: usize = 12;

/// Story entries quoted as recent context.
const RECENT_ENTRIES: usize = 3;

const DEFAULT_PLAYER: &str = "the player";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceType {
    #[default]
    Action,
    Dialogue,
    Examine,
    Move,
}

const CHOICE_TYPES: &[(&str, ChoiceType)] = &[
    ("action", ChoiceType::Action),
    ("dialogue", ChoiceType::Dialogue),
    ("examine", ChoiceType::Examine),
    ("move", ChoiceType::Move),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionChoice {
    pub text: String,
    #[serde(rename = "type")]
    pub choice_type: ChoiceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionChoicesResult {
    pub choices: Vec<ActionChoice>,
}

impl ActionChoicesResult {
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

/// Heal a reply and coerce it into at most [`MAX_CHOICES`] choices.
pub fn parse_choices(reply: &str) -> Result<ActionChoicesResult, HealError> {
    let value: Value = parse_with_healing(reply)?;
    let choices = coerce::items(&value, CHOICES)
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            Some(ActionChoice {
                text: TEXT.text(obj)?,
                choice_type: coerce::enum_or(TYPE.value(obj), CHOICE_TYPES, ChoiceType::Action),
                icon: ICON.text(obj),
            })
        })
        .take(MAX_CHOICES)
        .collect();
    Ok(ActionChoicesResult { choices })
}

fn recent_context(entries: &[StoryEntry]) -> String {
    let start = entries.len().saturating_sub(RECENT_ENTRIES);
    entries[start..]
        .iter()
        .map(|e| {
            let tag = if e.is_user_action() { "[ACTION]" } else { "[NARRATIVE]" };
            format!("{tag} {}", e.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn joined_or(names: Vec<&str>, fallback: &str) -> String {
    if names.is_empty() {
        fallback.to_string()
    } else {
        names.join(", ")
    }
}

/// Generates short, typed next actions for the player.
#[derive(Clone)]
pub struct ActionChoicesService {
    generator: Generator,
}

impl ActionChoicesService {
    pub fn new(client: Arc<dyn ChatClient>, settings: Arc<NarratorSettings>) -> Self {
        Self {
            generator: Generator::new(client, settings, SUGGESTIONS_PRESET),
        }
    }

    pub fn with_preset(mut self, preset_id: impl Into<String>) -> Self {
        self.generator = self.generator.with_preset(preset_id);
        self
    }

    pub fn with_overrides(mut self, overrides: PresetSettings) -> Self {
        self.generator = self.generator.with_overrides(overrides);
        self
    }

    /// Prompt namespace for one request.
    pub fn namespace(
        &self,
        recent_entries: &[StoryEntry],
        world: &WorldState,
        narrative_response: &str,
        pov: Option<Pov>,
        lorebook: &[LorebookEntry],
    ) -> Namespace {
        let style = UserStyle::from_entries(recent_entries);
        let protagonist = world.protagonist();

        let current_location = match &world.current_location {
            Some(loc) => match loc.description.as_deref().filter(|d| !d.is_empty()) {
                Some(desc) => format!("{} - {desc}", loc.name),
                None => loc.name.clone(),
            },
            None => "Unknown".to_string(),
        };

        let lorebook_context = if lorebook.is_empty() {
            String::new()
        } else {
            format!(
                "\n## Active World Elements\n\
                 These characters, locations, items, and concepts are currently relevant and can be referenced in action choices:\n\
                 {}\n",
                lorebook_list(lorebook, LOREBOOK_LIMIT)
            )
        };

        let mut ns = Namespace::new();
        let mut set = |key: &str, value: Value| {
            ns.insert(key.to_string(), value);
        };
        set("mode", json!(StoryMode::Adventure.as_str()));
        set("pov", json!(pov.unwrap_or(Pov::Second).as_str()));
        set("tense", json!(Tense::Present.as_str()));
        set(
            "protagonistName",
            json!(protagonist.map_or(DEFAULT_PLAYER, |c| c.name.as_str())),
        );
        set(
            "protagonistDescription",
            json!(protagonist
                .and_then(|c| c.description.as_deref())
                .filter(|d| !d.is_empty())
                .map(|d| format!(" ({d})"))
                .unwrap_or_default()),
        );
        set("narrativeResponse", json!(narrative_response));
        set("recentContext", json!(recent_context(recent_entries)));
        set("currentLocation", json!(current_location));
        set(
            "npcsPresent",
            json!(joined_or(world.npcs_present().map(|c| c.name.as_str()).collect(), "None")),
        );
        set(
            "inventory",
            json!(joined_or(world.inventory().map(|i| i.name.as_str()).collect(), "Empty")),
        );
        set(
            "activeQuests",
            json!(joined_or(world.open_quests().map(|b| b.title.as_str()).collect(), "None")),
        );
        set("lorebookContext", json!(lorebook_context));
        set(
            "styleGuidance",
            json!(style.as_ref().map(UserStyle::guidance).unwrap_or_default()),
        );
        set("povInstruction", json!(pov_instruction(style.as_ref(), pov)));
        set("lengthInstruction", json!(length_instruction(style.as_ref())));
        ns
    }

    /// Generate up to four choices. Never fails; any error yields an empty
    /// result.
    pub async fn generate_choices(
        &self,
        recent_entries: &[StoryEntry],
        world: &WorldState,
        narrative_response: &str,
        pov: Option<Pov>,
        lorebook: &[LorebookEntry],
    ) -> ActionChoicesResult {
        let ns = self.namespace(recent_entries, world, narrative_response, pov, lorebook);
        match self.try_generate(&ns).await {
            Ok(result) => {
                tracing::info!(count = result.choices.len(), "generated action choices");
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "action choice generation failed");
                ActionChoicesResult::default()
            }
        }
    }

    async fn try_generate(&self, ns: &Namespace) -> Result<ActionChoicesResult, GenerationError> {
        let reply = self
            .generator
            .complete(render_builtin("action-choices", ns))
            .await?;
        Ok(parse_choices(&reply)?)
    }
}
