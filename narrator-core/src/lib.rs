//! Narrative engine core: prompt assembly and recovery of structured replies.
//!
//! This crate provides:
//! - A flat-namespace [`ContextBuilder`] that renders pack templates
//! - A best-effort JSON healing layer for model output
//! - Generation services for action choices, story suggestions and style review
//! - A registry describing every variable a template may reference
//! - Layered settings that resolve presets to concrete request parameters
//!
//! # Quick Start
//!
//! ```ignore
//! use narrator_core::{ActionChoicesService, NarratorSettings, WorldState};
//! use oracle::{OpenAiCompatible, ProviderKind};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Arc::new(NarratorSettings::load("narrator.json").await?);
//!     let client = Arc::new(OpenAiCompatible::from_env(ProviderKind::OpenRouter)?);
//!
//!     let service = ActionChoicesService::new(client, settings);
//!     let result = service
//!         .generate_choices(&[], &WorldState::default(), "A door creaks open.", None, &[])
//!         .await;
//!     for choice in result.choices {
//!         println!("{:?}: {}", choice.choice_type, choice.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod generation;
pub mod json_heal;
pub mod pack;
pub mod settings;
pub mod store;
pub mod story;
pub mod template;
pub mod testing;
pub mod variables;

// Primary public API
pub use context::{BuilderConfig, ContextBuilder, RenderResult, TemplateKind, WizardData, WizardStep};
pub use generation::{
    ActionChoice, ActionChoicesResult, ActionChoicesService, ChoiceType, GenerationError,
    PhraseAnalysis, Severity, StorySuggestion, StyleReviewResult, StyleReviewerService,
    SuggestionType, SuggestionsResult, SuggestionsService,
};
pub use json_heal::{parse_with_healing, repair, try_parse_with_healing, HealError};
pub use pack::{FullPack, PackError, PackExport};
pub use settings::{NarratorSettings, PresetSettings, SettingsError};
pub use store::{MemoryStore, StoreError, StoryStore};
pub use story::{LorebookEntry, Pov, StoryEntry, StoryMode, Tense, WorldState};
pub use template::Namespace;
pub use testing::{FailingStore, ScriptedClient};
pub use variables::{RegistryError, VariableCategory, VariableDefinition, VariableRegistry};
