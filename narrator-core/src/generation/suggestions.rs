//! Story direction suggestions for creative-writing mode.

use super::coerce::{self, SUGGESTIONS, TEXT, TYPE};
use super::{lorebook_list, render_builtin, GenerationError, Generator};
use crate::json_heal::{parse_with_healing, HealError};
use crate::settings::{NarratorSettings, PresetSettings, SUGGESTIONS_PRESET};
use crate::story::{LorebookEntry, Pov, StoryBeat, StoryEntry, StoryMode, Tense};
use crate::template::Namespace;
use oracle::ChatClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Most suggestions kept from one reply.
pub const MAX_SUGGESTIONS: usize = 3;

const LOREBOOK_LIMIT: usize = 15;
const RECENT_ENTRIES: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    #[default]
    Action,
    Dialogue,
    Revelation,
    Twist,
}

const SUGGESTION_TYPES: &[(&str, SuggestionType)] = &[
    ("action", SuggestionType::Action),
    ("dialogue", SuggestionType::Dialogue),
    ("revelation", SuggestionType::Revelation),
    ("twist", SuggestionType::Twist),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySuggestion {
    pub text: String,
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionsResult {
    pub suggestions: Vec<StorySuggestion>,
}

impl SuggestionsResult {
    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }
}

/// Heal a reply and coerce it into at most [`MAX_SUGGESTIONS`] suggestions.
pub fn parse_suggestions(reply: &str) -> Result<SuggestionsResult, HealError> {
    let value: Value = parse_with_healing(reply)?;
    let suggestions = coerce::items(&value, SUGGESTIONS)
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            Some(StorySuggestion {
                text: TEXT.text(obj)?,
                suggestion_type: coerce::enum_or(
                    TYPE.value(obj),
                    SUGGESTION_TYPES,
                    SuggestionType::Action,
                ),
            })
        })
        .take(MAX_SUGGESTIONS)
        .collect();
    Ok(SuggestionsResult { suggestions })
}

fn recent_content(entries: &[StoryEntry]) -> String {
    let start = entries.len().saturating_sub(RECENT_ENTRIES);
    entries[start..]
        .iter()
        .map(|e| {
            let tag = if e.is_user_action() { "[DIRECTION]" } else { "[NARRATIVE]" };
            format!("{tag} {}", e.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn thread_list(threads: &[StoryBeat]) -> String {
    if threads.is_empty() {
        return "(none)".to_string();
    }
    threads
        .iter()
        .map(|t| match t.description.as_deref().filter(|d| !d.is_empty()) {
            Some(desc) => format!("• {}: {desc}", t.title),
            None => format!("• {}", t.title),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Suggests where a creative-writing story could go next.
#[derive(Clone)]
pub struct SuggestionsService {
    generator: Generator,
}

impl SuggestionsService {
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

    pub fn namespace(
        &self,
        recent_entries: &[StoryEntry],
        active_threads: &[StoryBeat],
        genre: Option<&str>,
        lorebook: &[LorebookEntry],
        pov: Option<Pov>,
        tense: Option<Tense>,
    ) -> Namespace {
        let mode = StoryMode::CreativeWriting;
        let genre = genre
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(|g| format!("## Genre: {g}\n"))
            .unwrap_or_default();
        let lorebook_context = if lorebook.is_empty() {
            String::new()
        } else {
            format!(
                "\n## Lorebook/World Elements\n\
                 The following characters, locations, and concepts exist in this world and can be incorporated into suggestions:\n\
                 {}",
                lorebook_list(lorebook, LOREBOOK_LIMIT)
            )
        };

        Namespace::from([
            ("mode".to_string(), json!(mode.as_str())),
            ("pov".to_string(), json!(pov.unwrap_or(mode.default_pov()).as_str())),
            ("tense".to_string(), json!(tense.unwrap_or(mode.default_tense()).as_str())),
            ("protagonistName".to_string(), json!(crate::context::DEFAULT_PROTAGONIST)),
            ("genre".to_string(), json!(genre)),
            ("recentContent".to_string(), json!(recent_content(recent_entries))),
            ("activeThreads".to_string(), json!(thread_list(active_threads))),
            ("lorebookContext".to_string(), json!(lorebook_context)),
        ])
    }

    /// Generate up to three suggestions. Never fails; any error yields an
    /// empty result.
    pub async fn generate_suggestions(
        &self,
        recent_entries: &[StoryEntry],
        active_threads: &[StoryBeat],
        genre: Option<&str>,
        lorebook: &[LorebookEntry],
        pov: Option<Pov>,
        tense: Option<Tense>,
    ) -> SuggestionsResult {
        let ns = self.namespace(recent_entries, active_threads, genre, lorebook, pov, tense);
        match self.try_generate(&ns).await {
            Ok(result) => {
                tracing::info!(count = result.suggestions.len(), "generated story suggestions");
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "suggestion generation failed");
                SuggestionsResult::default()
            }
        }
    }

    async fn try_generate(&self, ns: &Namespace) -> Result<SuggestionsResult, GenerationError> {
        let reply = self
            .generator
            .complete(render_builtin("suggestions", ns))
            .await?;
        Ok(parse_suggestions(&reply)?)
    }
}
