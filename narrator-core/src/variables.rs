//! Catalogue of named template variables.
//!
//! The registry is descriptive metadata: it documents which names a template
//! may reference and validates pack-defined variables. Rendering never
//! consults it. Construct one at startup with [`VariableRegistry::initialize`]
//! and pass it to whoever needs it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from registry mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Variable '{0}' is already registered")]
    Duplicate(String),
}

/// Value type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Text,
    Enum,
}

/// Who fills a variable in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableCategory {
    /// Derived from story state by the context builder.
    System,
    /// Injected by a generation service at render time.
    Runtime,
    /// Declared by a preset pack.
    Custom,
}

impl VariableCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Runtime => "runtime",
            Self::Custom => "custom",
        }
    }
}

impl std::str::FromStr for VariableCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "system" => Ok(Self::System),
            "runtime" => Ok(Self::Runtime),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown variable category: {other}")),
        }
    }
}

/// Metadata for one template variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub category: VariableCategory,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl VariableDefinition {
    pub fn text(
        name: impl Into<String>,
        category: VariableCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            var_type: VariableType::Text,
            category,
            description: description.into(),
            required: false,
            enum_values: None,
        }
    }

    pub fn enumeration(
        name: impl Into<String>,
        category: VariableCategory,
        description: impl Into<String>,
        values: &[&str],
    ) -> Self {
        Self {
            var_type: VariableType::Enum,
            enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
            ..Self::text(name, category, description)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Variables the context builder derives from story state.
pub fn system_variables() -> Vec<VariableDefinition> {
    use VariableCategory::System;
    vec![
        VariableDefinition::text("protagonistName", System, "Name of the main character").required(),
        VariableDefinition::text("currentLocation", System, "Current story location"),
        VariableDefinition::text("storyTime", System, "Current in-story time"),
        VariableDefinition::text("genre", System, "Story genre"),
        VariableDefinition::text("tone", System, "Story tone/mood"),
        VariableDefinition::text("settingDescription", System, "World/setting description"),
        VariableDefinition::text("themes", System, "Story themes as comma-separated list"),
        VariableDefinition::enumeration("mode", System, "Story mode", &["adventure", "creative-writing"])
            .required(),
        VariableDefinition::enumeration("pov", System, "Point of view", &["first", "second", "third"])
            .required(),
        VariableDefinition::enumeration("tense", System, "Narrative tense", &["past", "present"])
            .required(),
    ]
}

/// Variables injected by the context builder and generation services beyond
/// the system set.
pub fn runtime_variables() -> Vec<VariableDefinition> {
    use VariableCategory::Runtime;
    [
        ("protagonistDescription", "Protagonist description"),
        ("settingName", "Name of the setting chosen in the wizard"),
        ("visualProseMode", "Whether narration may use visual formatting"),
        ("inlineImageMode", "Whether narration may request inline images"),
        ("narrativeResponse", "The narration the player is responding to"),
        ("recentContext", "Last few entries tagged [ACTION]/[NARRATIVE]"),
        ("recentContent", "Last few entries tagged [DIRECTION]/[NARRATIVE]"),
        ("styleGuidance", "Observations about the user's own writing style"),
        ("povInstruction", "How to phrase generated actions"),
        ("lengthInstruction", "How long generated actions should be"),
        ("npcsPresent", "Comma-separated names of characters in the scene"),
        ("inventory", "Comma-separated names of carried items"),
        ("activeQuests", "Comma-separated titles of active or pending quests"),
        ("activeThreads", "Bulleted list of open story threads"),
        ("lorebookContext", "Relevant lorebook entries"),
        ("passages", "Narration passages under review"),
        ("passageCount", "Number of passages under review"),
    ]
    .into_iter()
    .map(|(name, description)| VariableDefinition::text(name, Runtime, description))
    .collect()
}

/// Name-keyed table of variable definitions. Listing preserves registration
/// order.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: HashMap<String, VariableDefinition>,
    order: Vec<String>,
}

impl VariableRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the system variables.
    pub fn initialize() -> Self {
        let mut registry = Self::new();
        for definition in system_variables() {
            registry.insert(definition);
        }
        registry
    }

    /// A registry seeded with system and runtime variables.
    pub fn with_runtime_variables() -> Self {
        let mut registry = Self::initialize();
        for definition in runtime_variables() {
            registry.insert(definition);
        }
        registry
    }

    fn insert(&mut self, definition: VariableDefinition) {
        if !self.variables.contains_key(&definition.name) {
            self.order.push(definition.name.clone());
        }
        self.variables.insert(definition.name.clone(), definition);
    }

    /// Register a definition. Fails if the name is taken.
    pub fn register(&mut self, definition: VariableDefinition) -> Result<(), RegistryError> {
        if self.variables.contains_key(&definition.name) {
            return Err(RegistryError::Duplicate(definition.name));
        }
        self.insert(definition);
        Ok(())
    }

    /// Register definitions in order, stopping at the first duplicate.
    /// Definitions registered before the failure stay registered.
    pub fn register_many(
        &mut self,
        definitions: impl IntoIterator<Item = VariableDefinition>,
    ) -> Result<(), RegistryError> {
        for definition in definitions {
            self.register(definition)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn by_category(&self, category: VariableCategory) -> Vec<&VariableDefinition> {
        self.all().into_iter().filter(|v| v.category == category).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn all(&self) -> Vec<&VariableDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.variables.get(name))
            .collect()
    }

    pub fn remove(&mut self, name: &str) -> Option<VariableDefinition> {
        let removed = self.variables.remove(name)?;
        self.order.retain(|n| n != name);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.variables.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_seeds_system_variables() {
        let registry = VariableRegistry::initialize();
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.names()[0], "protagonistName");
        assert!(registry.contains("tense"));
        assert!(registry.get("protagonistName").unwrap().required);

        let pov = registry.get("pov").unwrap();
        assert_eq!(pov.var_type, VariableType::Enum);
        assert_eq!(
            pov.enum_values.as_deref(),
            Some(&["first".to_string(), "second".to_string(), "third".to_string()][..])
        );
    }

    #[test]
    fn test_new_is_empty() {
        assert!(VariableRegistry::new().is_empty());
    }

    #[test]
    fn test_duplicate_is_error() {
        let mut registry = VariableRegistry::initialize();
        let err = registry
            .register(VariableDefinition::text("genre", VariableCategory::Custom, "dup"))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("genre".to_string()));
        assert_eq!(registry.get("genre").unwrap().category, VariableCategory::System);
    }

    #[test]
    fn test_register_many_stops_at_duplicate() {
        let mut registry = VariableRegistry::new();
        let result = registry.register_many([
            VariableDefinition::text("a", VariableCategory::Custom, ""),
            VariableDefinition::text("a", VariableCategory::Custom, ""),
            VariableDefinition::text("b", VariableCategory::Custom, ""),
        ]);
        assert!(result.is_err());
        assert_eq!(registry.names(), vec!["a"]);
    }

    #[test]
    fn test_categories_and_removal() {
        let mut registry = VariableRegistry::with_runtime_variables();
        assert_eq!(registry.by_category(VariableCategory::System).len(), 10);
        assert!(!registry.by_category(VariableCategory::Runtime).is_empty());
        assert!(registry.by_category(VariableCategory::Custom).is_empty());

        let removed = registry.remove("tone").unwrap();
        assert_eq!(removed.name, "tone");
        assert!(!registry.contains("tone"));
        assert!(!registry.names().contains(&"tone"));
        assert!(registry.remove("tone").is_none());

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.all().is_empty());
    }

    #[test]
    fn test_definition_wire_format() {
        let def = VariableDefinition::enumeration("tense", VariableCategory::System, "t", &["past"]);
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["type"], "enum");
        assert_eq!(json["category"], "system");
        assert_eq!(json["enumValues"][0], "past");
    }
}
