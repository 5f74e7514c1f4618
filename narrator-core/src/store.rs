//! Read-only access to persisted story and pack data.
//!
//! [`StoryStore`] is the seam to the persistence layer. [`MemoryStore`] is a
//! reference implementation backed by maps, loadable from JSON fixtures.

use crate::pack::{validate_pack_import, CustomVariable, FullPack, PackError, PackExport, PackTemplate};
use crate::story::{Character, Item, Location, LorebookEntry, Story, StoryBeat, StoryEntry, WorldState};
use crate::variables::VariableRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

/// Errors from store lookups.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Point lookups the context builder needs. Absence is `None` or empty.
#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn story(&self, story_id: &str) -> Result<Option<Story>, StoreError>;

    async fn characters(&self, story_id: &str) -> Result<Vec<Character>, StoreError>;

    async fn locations(&self, story_id: &str) -> Result<Vec<Location>, StoreError>;

    async fn story_pack_id(&self, story_id: &str) -> Result<Option<String>, StoreError>;

    async fn pack_template(
        &self,
        pack_id: &str,
        template_id: &str,
    ) -> Result<Option<PackTemplate>, StoreError>;

    async fn pack_variables(&self, pack_id: &str) -> Result<Vec<CustomVariable>, StoreError>;
}

/// A story with its world and log, as written in a fixture file. The store
/// keeps the story, characters and locations; the rest feeds generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    #[serde(flatten)]
    pub story: Story,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub story_beats: Vec<StoryBeat>,
    #[serde(default)]
    pub entries: Vec<StoryEntry>,
    #[serde(default)]
    pub lorebook: Vec<LorebookEntry>,
}

impl StoryRecord {
    pub fn world_state(&self) -> WorldState {
        WorldState {
            characters: self.characters.clone(),
            items: self.items.clone(),
            story_beats: self.story_beats.clone(),
            current_location: self.locations.iter().find(|l| l.current).cloned(),
        }
    }
}

/// Contents of a fixture file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryFixture {
    #[serde(default)]
    pub stories: Vec<StoryRecord>,
    #[serde(default)]
    pub packs: Vec<PackExport>,
}

#[derive(Debug, Default)]
struct MemoryData {
    stories: HashMap<String, Story>,
    characters: HashMap<String, Vec<Character>>,
    locations: HashMap<String, Vec<Location>>,
    packs: HashMap<String, FullPack>,
}

impl MemoryData {
    fn insert_story(&mut self, record: StoryRecord) {
        let id = record.story.id.clone();
        self.characters.insert(id.clone(), record.characters);
        self.locations.insert(id.clone(), record.locations);
        self.stories.insert(id, record.story);
    }
}

/// In-memory store. Starts with the built-in default pack.
#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_fixture(StoryFixture::default())
    }

    /// Build a store from fixture contents. Packs are imported without
    /// validation.
    pub fn from_fixture(fixture: StoryFixture) -> Self {
        let mut data = MemoryData::default();
        let default_pack = FullPack::builtin_default();
        data.packs.insert(default_pack.pack.id.clone(), default_pack);

        for record in fixture.stories {
            data.insert_story(record);
        }
        for export in fixture.packs {
            let pack = export.into_full_pack();
            data.packs.insert(pack.pack.id.clone(), pack);
        }

        Self {
            data: RwLock::new(data),
        }
    }

    /// Load a fixture file.
    pub async fn load_fixture(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let json = fs::read_to_string(path).await?;
        let fixture: StoryFixture = serde_json::from_str(&json)?;
        Ok(Self::from_fixture(fixture))
    }

    pub async fn insert_story(&self, record: StoryRecord) {
        self.data.write().await.insert_story(record);
    }

    pub async fn insert_pack(&self, pack: FullPack) {
        self.data.write().await.packs.insert(pack.pack.id.clone(), pack);
    }

    /// Import an already validated export, replacing any pack with the same
    /// id. Returns the pack id.
    pub async fn import_pack(&self, export: PackExport) -> String {
        let pack = export.into_full_pack();
        let id = pack.pack.id.clone();
        self.insert_pack(pack).await;
        id
    }

    /// Read, validate and import a pack export file.
    pub async fn load_pack_file(
        &self,
        path: impl AsRef<Path>,
        registry: &VariableRegistry,
    ) -> Result<String, PackError> {
        let json = fs::read_to_string(path).await?;
        let export = validate_pack_import(&json, registry)?;
        Ok(self.import_pack(export).await)
    }

    pub async fn pack(&self, pack_id: &str) -> Option<FullPack> {
        self.data.read().await.packs.get(pack_id).cloned()
    }
}

#[async_trait]
impl StoryStore for MemoryStore {
    async fn story(&self, story_id: &str) -> Result<Option<Story>, StoreError> {
        Ok(self.data.read().await.stories.get(story_id).cloned())
    }

    async fn characters(&self, story_id: &str) -> Result<Vec<Character>, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .characters
            .get(story_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn locations(&self, story_id: &str) -> Result<Vec<Location>, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .locations
            .get(story_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn story_pack_id(&self, story_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .stories
            .get(story_id)
            .and_then(|s| s.pack_id.clone()))
    }

    async fn pack_template(
        &self,
        pack_id: &str,
        template_id: &str,
    ) -> Result<Option<PackTemplate>, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .packs
            .get(pack_id)
            .and_then(|p| p.template(template_id).cloned()))
    }

    async fn pack_variables(&self, pack_id: &str) -> Result<Vec<CustomVariable>, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .packs
            .get(pack_id)
            .map(|p| p.variables.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::DEFAULT_PACK_ID;
    use tempfile::TempDir;

    const FIXTURE: &str = r#"{
        "stories": [{
            "id": "s1",
            "genre": "fantasy",
            "packId": "noir",
            "characters": [{"name": "Ayla", "relationship": "self"}],
            "locations": [{"name": "Harbor", "current": true}]
        }],
        "packs": [{
            "version": 1,
            "pack": {"name": "Noir"},
            "templates": [{"templateId": "intro", "content": "Rain."}]
        }]
    }"#;

    #[tokio::test]
    async fn test_fixture_lookups() {
        let fixture: StoryFixture = serde_json::from_str(FIXTURE).unwrap();
        let store = MemoryStore::from_fixture(fixture);

        let story = store.story("s1").await.unwrap().unwrap();
        assert_eq!(story.genre.as_deref(), Some("fantasy"));
        assert_eq!(store.characters("s1").await.unwrap()[0].name, "Ayla");
        assert!(store.locations("s1").await.unwrap()[0].current);
        assert_eq!(store.story_pack_id("s1").await.unwrap().as_deref(), Some("noir"));
        assert_eq!(
            store.pack_template("noir", "intro").await.unwrap().unwrap().content,
            "Rain."
        );
    }

    #[test]
    fn test_record_world_state() {
        let record: StoryRecord = serde_json::from_str(
            r#"{"id": "s2",
                "locations": [{"name": "Gate"}, {"name": "Hall", "current": true}],
                "items": [{"name": "Key", "location": "inventory"}],
                "storyBeats": [{"title": "Escape", "status": "active"}],
                "entries": [{"type": "narration", "content": "Dark."}]}"#,
        )
        .unwrap();
        assert_eq!(record.story.id, "s2");
        assert_eq!(record.entries.len(), 1);

        let world = record.world_state();
        assert_eq!(world.current_location.clone().map(|l| l.name).as_deref(), Some("Hall"));
        assert_eq!(world.inventory().count(), 1);
        assert_eq!(world.open_quests().count(), 1);
    }

    #[tokio::test]
    async fn test_absent_lookups() {
        let store = MemoryStore::new();
        assert!(store.story("nope").await.unwrap().is_none());
        assert!(store.characters("nope").await.unwrap().is_empty());
        assert!(store.story_pack_id("nope").await.unwrap().is_none());
        assert!(store.pack_template("nope", "x").await.unwrap().is_none());
        assert!(store.pack_variables("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_pack_present() {
        let store = MemoryStore::new();
        let pack = store.pack(DEFAULT_PACK_ID).await.unwrap();
        assert!(pack.pack.is_default);
        assert!(store
            .pack_template(DEFAULT_PACK_ID, "suggestions")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_load_fixture_and_pack_files() {
        let dir = TempDir::new().unwrap();
        let fixture_path = dir.path().join("fixture.json");
        tokio::fs::write(&fixture_path, FIXTURE).await.unwrap();

        let store = MemoryStore::load_fixture(&fixture_path).await.unwrap();
        assert!(store.story("s1").await.unwrap().is_some());

        let pack_path = dir.path().join("pack.json");
        tokio::fs::write(
            &pack_path,
            r#"{"version": 1, "pack": {"name": "Bright Days"},
                "variables": [{"variableName": "mood", "displayName": "Mood",
                               "variableType": "text", "defaultValue": "sunny"}]}"#,
        )
        .await
        .unwrap();

        let registry = VariableRegistry::initialize();
        let id = store.load_pack_file(&pack_path, &registry).await.unwrap();
        assert_eq!(id, "bright-days");
        let vars = store.pack_variables(&id).await.unwrap();
        assert_eq!(vars[0].default_value.as_deref(), Some("sunny"));
    }

    #[tokio::test]
    async fn test_load_missing_fixture_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = MemoryStore::load_fixture(dir.path().join("missing.json")).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
    }
}
