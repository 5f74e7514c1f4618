//! Subcommand handlers.

use crate::cli::{SettingsArgs, StoryArgs};
use anyhow::{anyhow, bail, Context, Result};
use narrator_core::context::{BuilderConfig, ContextBuilder};
use narrator_core::json_heal::repair;
use narrator_core::pack::{undeclared_variables, validate_pack_import, PackError};
use narrator_core::store::{MemoryStore, StoryFixture, StoryRecord};
use narrator_core::story::EntryType;
use narrator_core::variables::{VariableCategory, VariableRegistry};
use narrator_core::{
    ActionChoicesService, NarratorSettings, StyleReviewResult, StyleReviewerService,
    SuggestionsService,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

pub async fn heal(file: Option<PathBuf>) -> Result<()> {
    let input = match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("reading stdin")?;
            buf
        }
    };

    let repaired = repair(&input)?;
    let value: Value = serde_json::from_str(&repaired)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub fn variables(category: Option<VariableCategory>, json: bool) -> Result<()> {
    let registry = VariableRegistry::with_runtime_variables();
    let definitions = match category {
        Some(category) => registry.by_category(category),
        None => registry.all(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    for def in definitions {
        let mut line = format!(
            "{:<24} {:<8} {}",
            def.name,
            def.category.as_str(),
            def.description
        );
        if let Some(values) = &def.enum_values {
            line.push_str(&format!(" [{}]", values.join("|")));
        }
        if def.required {
            line.push_str(" (required)");
        }
        println!("{line}");
    }
    Ok(())
}

pub fn providers(json: bool) -> Result<()> {
    let providers = oracle::provider_list();
    if json {
        return print_json(&providers);
    }

    for p in providers {
        println!("{:<18} {} - {}", p.id, p.name, p.description);
        println!(
            "{:<18} endpoint: {}",
            "",
            p.endpoint.unwrap_or("(custom base URL required)")
        );
        if let Some(var) = &p.api_key_var {
            println!("{:<18} key: {var}", "");
        }
        println!(
            "{:<18} narrative model: {} (fallbacks: {})",
            "",
            p.narrative_model,
            p.fallback_models.join(", ")
        );
        if p.capabilities.image_generation {
            println!("{:<18} image generation", "");
        }
    }
    Ok(())
}

pub async fn validate_pack(file: &Path) -> Result<()> {
    let json = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let registry = VariableRegistry::with_runtime_variables();

    let export = match validate_pack_import(&json, &registry) {
        Ok(export) => export,
        Err(PackError::Invalid(problems)) => {
            for problem in &problems {
                eprintln!("error: {problem}");
            }
            bail!("{} has {} problem(s)", file.display(), problems.len());
        }
        Err(e) => return Err(e.into()),
    };

    for template in &export.templates {
        for name in undeclared_variables(&template.content, &registry, &export.variables) {
            eprintln!(
                "warning: template '{}' reads undeclared variable '{name}'",
                template.template_id
            );
        }
    }

    println!(
        "ok: {} ({}), {} templates, {} variables",
        export.pack.name,
        export.pack_id(),
        export.templates.len(),
        export.variables.len()
    );
    Ok(())
}

pub async fn render(
    args: &StoryArgs,
    template: &str,
    pack: Option<&Path>,
    set: Vec<(String, String)>,
    json: bool,
) -> Result<()> {
    let store = MemoryStore::load_fixture(&args.fixture)
        .await
        .with_context(|| format!("loading fixture {}", args.fixture.display()))?;

    let mut config = BuilderConfig::new();
    if let Some(path) = pack {
        let registry = VariableRegistry::with_runtime_variables();
        let pack_id = store
            .load_pack_file(path, &registry)
            .await
            .with_context(|| format!("loading pack {}", path.display()))?;
        config = config.with_pack_id(pack_id);
    }

    let mut builder = ContextBuilder::for_story(Arc::new(store), &args.story, config).await;
    builder.add(set);
    let rendered = builder.render(template).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        println!("=== system ===\n{}\n=== user ===\n{}", rendered.system, rendered.user);
    }
    Ok(())
}

/// What the generation commands need: one story record, settings and a
/// client.
struct Session {
    record: StoryRecord,
    client: Arc<oracle::OpenAiCompatible>,
    settings: Arc<NarratorSettings>,
}

impl Session {
    async fn open(story: &StoryArgs, settings: &SettingsArgs) -> Result<Self> {
        let json = tokio::fs::read_to_string(&story.fixture)
            .await
            .with_context(|| format!("reading {}", story.fixture.display()))?;
        let fixture: StoryFixture = serde_json::from_str(&json)?;
        let record = fixture
            .stories
            .into_iter()
            .find(|r| r.story.id == story.story)
            .ok_or_else(|| anyhow!("story '{}' not found in {}", story.story, story.fixture.display()))?;

        let settings = NarratorSettings::load(&settings.settings).await?;
        let client = settings.client()?;
        tracing::info!(provider = %settings.provider, base_url = client.base_url(), "using provider");

        Ok(Self {
            record,
            client: Arc::new(client),
            settings: Arc::new(settings),
        })
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn choices(story: &StoryArgs, settings: &SettingsArgs, json: bool) -> Result<()> {
    let session = Session::open(story, settings).await?;
    let record = &session.record;

    let narrative = record
        .entries
        .iter()
        .rev()
        .find(|e| e.entry_type == EntryType::Narration)
        .map(|e| e.content.as_str())
        .unwrap_or_default();
    let pov = record.story.settings.as_ref().and_then(|s| s.pov);

    let result = ActionChoicesService::new(session.client.clone(), session.settings.clone())
        .generate_choices(&record.entries, &record.world_state(), narrative, pov, &record.lorebook)
        .await;

    if json {
        return print_json(&result);
    }
    for (i, choice) in result.choices.iter().enumerate() {
        println!("{}. [{:?}] {}", i + 1, choice.choice_type, choice.text);
    }
    Ok(())
}

pub async fn suggest(story: &StoryArgs, settings: &SettingsArgs, json: bool) -> Result<()> {
    let session = Session::open(story, settings).await?;
    let record = &session.record;
    let story_settings = record.story.settings.clone().unwrap_or_default();
    let threads: Vec<_> = record
        .story_beats
        .iter()
        .filter(|b| b.is_open())
        .cloned()
        .collect();

    let result = SuggestionsService::new(session.client.clone(), session.settings.clone())
        .generate_suggestions(
            &record.entries,
            &threads,
            record.story.genre.as_deref(),
            &record.lorebook,
            story_settings.pov,
            story_settings.tense,
        )
        .await;

    if json {
        return print_json(&result);
    }
    for (i, suggestion) in result.suggestions.iter().enumerate() {
        println!("{}. [{:?}] {}", i + 1, suggestion.suggestion_type, suggestion.text);
    }
    Ok(())
}

pub async fn review(story: &StoryArgs, settings: &SettingsArgs, json: bool) -> Result<()> {
    let session = Session::open(story, settings).await?;
    let record = &session.record;
    let story_settings = record.story.settings.clone().unwrap_or_default();

    let result = StyleReviewerService::new(session.client.clone(), session.settings.clone())
        .analyze_style(
            &record.entries,
            record.story.mode.unwrap_or_default(),
            story_settings.pov,
            story_settings.tense,
        )
        .await;

    if json {
        return print_json(&result);
    }
    println!("{}", review_summary(&result));
    Ok(())
}

fn review_summary(result: &StyleReviewResult) -> String {
    if result.reviewed_entry_count == 0 {
        "No review available: no narration was found or the request failed (see log).".to_string()
    } else if result.is_empty() {
        format!("No repetition found in {} passages.", result.reviewed_entry_count)
    } else {
        result.format_for_prompt_injection().trim().to_string()
    }
}
