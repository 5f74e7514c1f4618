//! Story domain records consumed by context assembly and generation.
//!
//! These mirror what the persistence layer hands back. Nothing here writes
//! story state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall story mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoryMode {
    #[default]
    Adventure,
    CreativeWriting,
}

impl StoryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StoryMode::Adventure => "adventure",
            StoryMode::CreativeWriting => "creative-writing",
        }
    }

    /// Point of view a story in this mode uses when none is configured.
    pub fn default_pov(self) -> Pov {
        match self {
            StoryMode::Adventure => Pov::Second,
            StoryMode::CreativeWriting => Pov::Third,
        }
    }

    /// Tense a story in this mode uses when none is configured.
    pub fn default_tense(self) -> Tense {
        match self {
            StoryMode::Adventure => Tense::Present,
            StoryMode::CreativeWriting => Tense::Past,
        }
    }
}

/// Narrative point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pov {
    First,
    Second,
    Third,
}

impl Pov {
    pub fn as_str(self) -> &'static str {
        match self {
            Pov::First => "first",
            Pov::Second => "second",
            Pov::Third => "third",
        }
    }
}

/// Narrative tense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tense {
    Past,
    Present,
}

impl Tense {
    pub fn as_str(self) -> &'static str {
        match self {
            Tense::Past => "past",
            Tense::Present => "present",
        }
    }
}

macro_rules! display_via_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_via_as_str!(StoryMode, Pov, Tense);

/// A story as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mode: Option<StoryMode>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: Option<StorySettings>,
    #[serde(default)]
    pub time_tracker: Option<TimeTracker>,
    /// Preset pack this story renders with.
    #[serde(default)]
    pub pack_id: Option<String>,
}

/// Per-story writing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySettings {
    #[serde(default)]
    pub pov: Option<Pov>,
    #[serde(default)]
    pub tense: Option<Tense>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub visual_prose_mode: bool,
    /// `"inline"` enables inline image requests in narration.
    #[serde(default)]
    pub image_generation_mode: Option<String>,
}

/// Elapsed in-story time, zero-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTracker {
    pub years: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl fmt::Display for TimeTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Year {}, Day {}, {}h {}m",
            u64::from(self.years) + 1,
            u64::from(self.days) + 1,
            self.hours,
            self.minutes
        )
    }
}

/// Relationship value that marks the protagonist.
pub const SELF_RELATIONSHIP: &str = "self";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Character {
    pub fn is_protagonist(&self) -> bool {
        self.relationship.as_deref() == Some(SELF_RELATIONSHIP)
    }

    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub current: bool,
}

/// Location value that marks an item as carried.
pub const INVENTORY: &str = "inventory";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Failed,
}

/// A quest or open plot thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryBeat {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: BeatStatus,
}

impl StoryBeat {
    /// Active or pending beats are still in play.
    pub fn is_open(&self) -> bool {
        matches!(self.status, BeatStatus::Active | BeatStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    UserAction,
    Narration,
    System,
    Retry,
}

/// One turn of the story log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryEntry {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub content: String,
}

impl StoryEntry {
    pub fn user_action(content: impl Into<String>) -> Self {
        Self {
            entry_type: EntryType::UserAction,
            content: content.into(),
        }
    }

    pub fn narration(content: impl Into<String>) -> Self {
        Self {
            entry_type: EntryType::Narration,
            content: content.into(),
        }
    }

    pub fn is_user_action(&self) -> bool {
        self.entry_type == EntryType::UserAction
    }
}

/// A world element surfaced to the model as background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LorebookEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Snapshot of the world handed to action-choice generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldState {
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub story_beats: Vec<StoryBeat>,
    #[serde(default)]
    pub current_location: Option<Location>,
}

impl WorldState {
    pub fn protagonist(&self) -> Option<&Character> {
        self.characters.iter().find(|c| c.is_protagonist())
    }

    /// Active characters other than the protagonist.
    pub fn npcs_present(&self) -> impl Iterator<Item = &Character> {
        self.characters
            .iter()
            .filter(|c| c.is_active() && !c.is_protagonist())
    }

    pub fn inventory(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|i| i.location == INVENTORY)
    }

    pub fn open_quests(&self) -> impl Iterator<Item = &StoryBeat> {
        self.story_beats.iter().filter(|b| b.is_open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_time_at_counter_limits() {
        let t = TimeTracker {
            years: u32::MAX,
            days: u32::MAX,
            hours: 0,
            minutes: 0,
        };
        assert_eq!(t.to_string(), "Year 4294967296, Day 4294967296, 0h 0m");
    }

    #[test]
    fn test_story_time_format() {
        let t = TimeTracker {
            years: 0,
            days: 4,
            hours: 13,
            minutes: 5,
        };
        assert_eq!(t.to_string(), "Year 1, Day 5, 13h 5m");
    }

    #[test]
    fn test_story_deserializes_from_camel_case() {
        let story: Story = serde_json::from_str(
            r#"{
                "id": "s1",
                "mode": "creative-writing",
                "settings": {"pov": "first", "visualProseMode": true, "imageGenerationMode": "inline"},
                "timeTracker": {"years": 1, "days": 2, "hours": 3, "minutes": 4}
            }"#,
        )
        .unwrap();
        assert_eq!(story.mode, Some(StoryMode::CreativeWriting));
        let settings = story.settings.unwrap();
        assert_eq!(settings.pov, Some(Pov::First));
        assert!(settings.visual_prose_mode);
        assert!(settings.themes.is_empty());
        assert_eq!(story.time_tracker.unwrap().minutes, 4);
    }

    #[test]
    fn test_mode_defaults() {
        assert_eq!(StoryMode::Adventure.default_pov(), Pov::Second);
        assert_eq!(StoryMode::Adventure.default_tense(), Tense::Present);
        assert_eq!(StoryMode::CreativeWriting.default_pov(), Pov::Third);
        assert_eq!(StoryMode::CreativeWriting.default_tense(), Tense::Past);
    }

    #[test]
    fn test_world_state_views() {
        let world = WorldState {
            characters: vec![
                Character {
                    name: "Ayla".into(),
                    relationship: Some("self".into()),
                    status: Some("active".into()),
                    ..Default::default()
                },
                Character {
                    name: "Bram".into(),
                    status: Some("active".into()),
                    ..Default::default()
                },
                Character {
                    name: "Cole".into(),
                    status: Some("departed".into()),
                    ..Default::default()
                },
            ],
            items: vec![
                Item {
                    name: "Lantern".into(),
                    location: "inventory".into(),
                },
                Item {
                    name: "Anvil".into(),
                    location: "forge".into(),
                },
            ],
            story_beats: vec![
                StoryBeat {
                    title: "Find the key".into(),
                    status: BeatStatus::Active,
                    ..Default::default()
                },
                StoryBeat {
                    title: "Old news".into(),
                    status: BeatStatus::Completed,
                    ..Default::default()
                },
            ],
            current_location: None,
        };

        assert_eq!(world.protagonist().unwrap().name, "Ayla");
        assert_eq!(world.npcs_present().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["Bram"]);
        assert_eq!(world.inventory().count(), 1);
        assert_eq!(world.open_quests().count(), 1);
    }

    #[test]
    fn test_entry_type_wire_names() {
        let entry: StoryEntry =
            serde_json::from_str(r#"{"type": "user_action", "content": "I run"}"#).unwrap();
        assert!(entry.is_user_action());
    }
}
