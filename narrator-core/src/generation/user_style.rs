//! Heuristics over the player's own recent actions.
//!
//! Generated action choices read better when they sound like the player, so
//! we look at how long their actions are, whether they write "I ...", and
//! whether they quote dialogue.

use crate::story::{Pov, StoryEntry};
use once_cell::sync::Lazy;
use regex::Regex;

/// How many recent user actions are sampled.
const SAMPLE_SIZE: usize = 6;

/// How many sampled actions are quoted back to the model.
const QUOTED_EXAMPLES: usize = 4;

static LEADING_I: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^I\s").unwrap());
static INNER_I: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\sI\s").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthClass {
    /// Under 6 words on average.
    Terse,
    Moderate,
    /// Over 15 words on average.
    Verbose,
}

/// What the player's recent actions look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStyle {
    /// The sampled actions, oldest first, trimmed.
    pub actions: Vec<String>,
    pub average_words: u32,
    pub first_person: bool,
    pub uses_quotes: bool,
}

impl UserStyle {
    /// Analyze the last few user actions. `None` when there are none.
    pub fn from_entries(entries: &[StoryEntry]) -> Option<Self> {
        let user_actions: Vec<&StoryEntry> = entries.iter().filter(|e| e.is_user_action()).collect();
        let start = user_actions.len().saturating_sub(SAMPLE_SIZE);
        let actions: Vec<String> = user_actions[start..]
            .iter()
            .map(|e| e.content.trim().to_string())
            .collect();

        if actions.is_empty() {
            return None;
        }

        // Word count by single-space split, so doubled spaces count as words.
        let total_words: usize = actions.iter().map(|a| a.split(' ').count()).sum();
        let average_words = (total_words as f64 / actions.len() as f64).round() as u32;

        let first_person = actions
            .iter()
            .any(|a| LEADING_I.is_match(a) || INNER_I.is_match(a));
        let uses_quotes = actions.iter().any(|a| a.contains('"'));

        Some(Self {
            actions,
            average_words,
            first_person,
            uses_quotes,
        })
    }

    pub fn length_class(&self) -> LengthClass {
        if self.average_words < 6 {
            LengthClass::Terse
        } else if self.average_words > 15 {
            LengthClass::Verbose
        } else {
            LengthClass::Moderate
        }
    }

    /// Prompt section describing the player's style.
    pub fn guidance(&self) -> String {
        let start = self.actions.len().saturating_sub(QUOTED_EXAMPLES);
        let examples = self.actions[start..]
            .iter()
            .map(|a| format!("- \"{a}\""))
            .collect::<Vec<_>>()
            .join("\n");

        let length = match self.length_class() {
            LengthClass::Terse => "Very short and punchy",
            LengthClass::Moderate => "Moderate length",
            LengthClass::Verbose => "Detailed and descriptive",
        };
        let person = if self.first_person {
            "Uses \"I\" statements"
        } else {
            "Uses commands/third person"
        };
        let format = if self.uses_quotes {
            "Sometimes includes dialogue in quotes"
        } else {
            "Primarily action descriptions"
        };

        format!(
            "\n## User's Writing Style (MATCH THIS)\n\
             Here are the user's recent actions - mimic their style:\n\
             {examples}\n\n\
             Style observations to follow:\n\
             - Length: {length} (~{} words average)\n\
             - Person: {person}\n\
             - Format: {format}\n\
             Match their vocabulary, tone, and phrasing patterns.\n",
            self.average_words
        )
    }
}

/// How generated actions should be phrased.
pub fn pov_instruction(style: Option<&UserStyle>, pov: Option<Pov>) -> &'static str {
    match (style, pov) {
        (Some(_), _) => {
            "Write actions in the SAME STYLE as the user examples above. Match their phrasing exactly."
        }
        (None, Some(Pov::Third)) => {
            "Write actions as commands/intentions (e.g., \"Examine the door\", \"Ask the merchant about...\")"
        }
        (None, _) => {
            "Write actions in first person (e.g., \"I examine the door\", \"I ask the merchant about...\")"
        }
    }
}

/// How long generated actions should be.
pub fn length_instruction(style: Option<&UserStyle>) -> String {
    match style {
        Some(style) => format!(
            "Match the length of the user's actions (~{} words). They should feel like something the user would actually write.",
            style.average_words
        ),
        None => "Keep each choice SHORT (under 10 words ideally, max 15). They should be clear, specific actions the USER can take.".to_string(),
    }
}
