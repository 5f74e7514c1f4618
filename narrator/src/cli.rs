//! Command-line arguments.

use clap::{Parser, Subcommand};
use narrator_core::variables::VariableCategory;
use std::path::PathBuf;

/// Narrator - prompt assembly and LLM output recovery for interactive fiction
#[derive(Parser)]
#[command(name = "narrator", version, about, long_about = None)]
pub struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Repair malformed JSON from a file or stdin
    Heal {
        /// Input file (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// List template variables
    Variables {
        /// Only show one category (system, runtime, custom)
        #[arg(long)]
        category: Option<VariableCategory>,
    },

    /// List supported LLM providers
    Providers,

    /// Validate a pack export file
    ValidatePack {
        file: PathBuf,
    },

    /// Render a template pair for a stored story
    Render {
        #[command(flatten)]
        story: StoryArgs,
        /// Template id
        #[arg(long)]
        template: String,
        /// Pack export to import and render from
        #[arg(long)]
        pack: Option<PathBuf>,
        /// Extra runtime value, as key=value (repeatable)
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },

    /// Generate action choices for a story
    Choices {
        #[command(flatten)]
        story: StoryArgs,
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Generate story direction suggestions
    Suggest {
        #[command(flatten)]
        story: StoryArgs,
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Review recent narration for repetition
    Review {
        #[command(flatten)]
        story: StoryArgs,
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(clap::Args)]
pub struct StoryArgs {
    /// Story fixture file
    #[arg(long)]
    pub fixture: PathBuf,
    /// Story id within the fixture
    #[arg(long)]
    pub story: String,
}

#[derive(clap::Args)]
pub struct SettingsArgs {
    /// Settings file (defaults apply when missing)
    #[arg(long, env = "NARRATOR_SETTINGS", default_value = "narrator.json")]
    pub settings: PathBuf,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("mood=grim = dark").unwrap(),
            ("mood".to_string(), "grim = dark".to_string())
        );
        assert!(parse_assignment("=x").is_err());
        assert!(parse_assignment("novalue").is_err());
    }

    #[test]
    fn test_render_args() {
        let cli = Cli::try_parse_from([
            "narrator", "render", "--fixture", "f.json", "--story", "s1", "--template", "scene",
            "--set", "a=1", "--set", "b=2",
        ])
        .unwrap();
        match cli.command {
            Commands::Render { story, template, set, pack } => {
                assert_eq!(story.story, "s1");
                assert_eq!(template, "scene");
                assert_eq!(set.len(), 2);
                assert!(pack.is_none());
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_variables_category() {
        let cli = Cli::try_parse_from(["narrator", "variables", "--category", "runtime"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Variables {
                category: Some(VariableCategory::Runtime)
            }
        ));
        assert!(Cli::try_parse_from(["narrator", "variables", "--category", "cosmic"]).is_err());
    }

    #[test]
    fn test_providers_takes_global_json() {
        let cli = Cli::try_parse_from(["narrator", "providers", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Providers));
    }
}
