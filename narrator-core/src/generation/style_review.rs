//! Repetition review of recent narration.
//!
//! The reviewer reads narration passages and reports overused phrases. Its
//! result can be turned into a `<style_guidance>` block and spliced into the
//! next narrative prompt with [`StyleReviewResult::format_for_prompt_injection`].

use super::coerce::{
    self, ALTERNATIVES, CONTEXTS, FREQUENCY, OVERALL_ASSESSMENT, PHRASE, PHRASES, SEVERITY,
};
use super::{render_builtin, GenerationError, Generator};
use crate::json_heal::{parse_with_healing, HealError};
use crate::settings::{NarratorSettings, PresetSettings, STYLE_REVIEWER_PRESET};
use crate::story::{EntryType, Pov, StoryEntry, StoryMode, Tense};
use crate::template::Namespace;
use oracle::ChatClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;

pub const MAX_PHRASES: usize = 10;
pub const MAX_ALTERNATIVES: usize = 3;
pub const MAX_CONTEXTS: usize = 2;

/// Frequency reported when the model gives none.
const DEFAULT_FREQUENCY: u32 = 2;

const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

const SEVERITIES: &[(&str, Severity)] = &[
    ("low", Severity::Low),
    ("medium", Severity::Medium),
    ("high", Severity::High),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseAnalysis {
    pub phrase: String,
    pub frequency: u32,
    pub severity: Severity,
    pub alternatives: Vec<String>,
    pub contexts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleReviewResult {
    pub phrases: Vec<PhraseAnalysis>,
    pub overall_assessment: String,
    pub reviewed_entry_count: usize,
    /// Unix milliseconds.
    pub timestamp: i64,
}

impl StyleReviewResult {
    /// No phrases and nothing reviewed, stamped now.
    pub fn empty() -> Self {
        Self {
            phrases: Vec::new(),
            overall_assessment: String::new(),
            reviewed_entry_count: 0,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Prompt fragment listing overused phrases, or `""` when there are none.
    pub fn format_for_prompt_injection(&self) -> String {
        if self.phrases.is_empty() {
            return String::new();
        }

        let mut block = String::from(
            "\n\n<style_guidance>\n\
             ## Recent Style Review\n\
             The following phrases have been overused in recent narration. Please vary your language:\n\n",
        );
        for p in &self.phrases {
            let _ = write!(block, "- \"{}\" ({}x, {})", p.phrase, p.frequency, p.severity.as_str());
            if !p.alternatives.is_empty() {
                let _ = write!(block, " - Try: {}", p.alternatives.join(", "));
            }
            block.push('\n');
        }
        if !self.overall_assessment.is_empty() {
            let _ = write!(block, "\nNote: {}", self.overall_assessment);
        }
        block.push_str("\n</style_guidance>");
        block
    }
}

/// Heal a review reply and coerce it into a result covering
/// `reviewed_entry_count` passages.
pub fn parse_review(reply: &str, reviewed_entry_count: usize) -> Result<StyleReviewResult, HealError> {
    let value: Value = parse_with_healing(reply)?;

    let phrases = coerce::items(&value, PHRASES)
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            Some(PhraseAnalysis {
                phrase: PHRASE.text(obj)?,
                frequency: FREQUENCY.count(obj).unwrap_or(DEFAULT_FREQUENCY),
                severity: coerce::enum_or(SEVERITY.value(obj), SEVERITIES, Severity::Low),
                alternatives: coerce::string_list(ALTERNATIVES.array(obj), MAX_ALTERNATIVES),
                contexts: coerce::string_list(CONTEXTS.array(obj), MAX_CONTEXTS),
            })
        })
        .take(MAX_PHRASES)
        .collect();

    let overall_assessment = value
        .as_object()
        .and_then(|obj| OVERALL_ASSESSMENT.text(obj))
        .unwrap_or_default();

    Ok(StyleReviewResult {
        phrases,
        overall_assessment,
        reviewed_entry_count,
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}

/// Reviews narration for repetitive phrasing.
#[derive(Clone)]
pub struct StyleReviewerService {
    generator: Generator,
}

impl StyleReviewerService {
    pub fn new(client: Arc<dyn ChatClient>, settings: Arc<NarratorSettings>) -> Self {
        Self {
            generator: Generator::new(client, settings, STYLE_REVIEWER_PRESET),
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

    /// Review the narration among `entries`. Other entry types are ignored
    /// and no request is made when there is no narration. Never fails.
    pub async fn analyze_style(
        &self,
        entries: &[StoryEntry],
        mode: StoryMode,
        pov: Option<Pov>,
        tense: Option<Tense>,
    ) -> StyleReviewResult {
        let passages: Vec<&str> = entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Narration)
            .map(|e| e.content.as_str())
            .collect();

        tracing::debug!(
            total = entries.len(),
            narration = passages.len(),
            preset = self.generator.preset_id(),
            "style review requested"
        );

        if passages.is_empty() {
            return StyleReviewResult::empty();
        }

        let ns = Namespace::from([
            ("mode".to_string(), json!(mode.as_str())),
            ("pov".to_string(), json!(pov.unwrap_or(mode.default_pov()).as_str())),
            ("tense".to_string(), json!(tense.unwrap_or(mode.default_tense()).as_str())),
            ("protagonistName".to_string(), json!(crate::context::DEFAULT_PROTAGONIST)),
            ("passageCount".to_string(), json!(passages.len())),
            ("passages".to_string(), json!(passages.join(PASSAGE_SEPARATOR))),
        ]);

        match self.try_review(&ns, passages.len()).await {
            Ok(result) => {
                tracing::info!(
                    phrases = result.phrases.len(),
                    reviewed = result.reviewed_entry_count,
                    "style review complete"
                );
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "style review failed");
                StyleReviewResult::empty()
            }
        }
    }

    async fn try_review(
        &self,
        ns: &Namespace,
        passage_count: usize,
    ) -> Result<StyleReviewResult, GenerationError> {
        let reply = self
            .generator
            .complete(render_builtin("style-reviewer", ns))
            .await?;
        Ok(parse_review(&reply, passage_count)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use pretty_assertions::assert_eq;

    fn service(client: &Arc<ScriptedClient>) -> StyleReviewerService {
        StyleReviewerService::new(client.clone(), Arc::new(NarratorSettings::default()))
    }

    fn phrase(text: &str, alternatives: &[&str]) -> PhraseAnalysis {
        PhraseAnalysis {
            phrase: text.into(),
            frequency: 3,
            severity: Severity::Medium,
            alternatives: alternatives.iter().map(|a| a.to_string()).collect(),
            contexts: Vec::new(),
        }
    }

    #[test]
    fn test_parse_aliases_and_defaults() {
        let reply = r#"{
            "issues": [
                {"description": "a shiver ran down", "occurrences": 4, "severity": "HIGH",
                 "suggestions": ["a", "b", "c", "d"], "examples": ["x", "y", "z"]},
                {"phrase": "suddenly", "severity": "critical"},
                {"frequency": 9}
            ],
            "summary": "Mostly fine."
        }"#;
        let result = parse_review(reply, 5).unwrap();

        assert_eq!(result.phrases.len(), 2);
        let first = &result.phrases[0];
        assert_eq!(first.phrase, "a shiver ran down");
        assert_eq!(first.frequency, 4);
        assert_eq!(first.severity, Severity::High);
        assert_eq!(first.alternatives, vec!["a", "b", "c"]);
        assert_eq!(first.contexts, vec!["x", "y"]);

        let second = &result.phrases[1];
        assert_eq!(second.frequency, 2);
        assert_eq!(second.severity, Severity::Low);
        assert!(second.alternatives.is_empty());

        assert_eq!(result.overall_assessment, "Mostly fine.");
        assert_eq!(result.reviewed_entry_count, 5);
    }

    #[test]
    fn test_parse_caps_phrases() {
        let items: Vec<Value> = (0..15).map(|i| json!({"phrase": format!("p{i}")})).collect();
        let result = parse_review(&json!({ "phrases": items }).to_string(), 1).unwrap();
        assert_eq!(result.phrases.len(), MAX_PHRASES);
        assert_eq!(result.overall_assessment, "");
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(StyleReviewResult::empty().format_for_prompt_injection(), "");
    }

    #[test]
    fn test_format_block() {
        let result = StyleReviewResult {
            phrases: vec![phrase("eyes widened", &["gasped", "stared"]), phrase("suddenly", &[])],
            overall_assessment: "Vary openings.".into(),
            reviewed_entry_count: 3,
            timestamp: 0,
        };
        assert_eq!(
            result.format_for_prompt_injection(),
            "\n\n<style_guidance>\n## Recent Style Review\n\
             The following phrases have been overused in recent narration. Please vary your language:\n\n\
             - \"eyes widened\" (3x, medium) - Try: gasped, stared\n\
             - \"suddenly\" (3x, medium)\n\
             \nNote: Vary openings.\n</style_guidance>"
        );
    }

    #[test]
    fn test_format_without_note() {
        let result = StyleReviewResult {
            phrases: vec![phrase("suddenly", &[])],
            overall_assessment: String::new(),
            reviewed_entry_count: 1,
            timestamp: 0,
        };
        assert!(result
            .format_for_prompt_injection()
            .ends_with("- \"suddenly\" (3x, medium)\n\n</style_guidance>"));
    }

    #[test]
    fn test_result_wire_names() {
        let value = serde_json::to_value(StyleReviewResult {
            phrases: vec![phrase("x", &[])],
            overall_assessment: "ok".into(),
            reviewed_entry_count: 2,
            timestamp: 7,
        })
        .unwrap();
        assert_eq!(value["overallAssessment"], json!("ok"));
        assert_eq!(value["reviewedEntryCount"], json!(2));
        assert_eq!(value["phrases"][0]["severity"], json!("medium"));
    }

    #[tokio::test]
    async fn test_no_narration_makes_no_request() {
        let client = Arc::new(ScriptedClient::replies([r#"{"phrases": []}"#]));
        let result = service(&client)
            .analyze_style(&[StoryEntry::user_action("I wait")], StoryMode::Adventure, None, None)
            .await;
        assert!(result.is_empty());
        assert_eq!(result.reviewed_entry_count, 0);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_reviews_narration_only() {
        let client = Arc::new(ScriptedClient::replies([
            r#"```json
{"phrases": [{"phrase": "the wind howled", "frequency": 3, "severity": "medium"}], "overallAssessment": "Good."}
```"#,
        ]));
        let entries = vec![
            StoryEntry::narration("The wind howled."),
            StoryEntry::user_action("I listen"),
            StoryEntry::narration("Again the wind howled."),
        ];
        let result = service(&client)
            .analyze_style(&entries, StoryMode::CreativeWriting, None, None)
            .await;
        assert_eq!(result.reviewed_entry_count, 2);
        assert_eq!(result.phrases[0].phrase, "the wind howled");
        assert!(result.timestamp > 0);

        let request = client.requests().pop().unwrap();
        assert!(request.messages[0].content.contains("third person, past tense"));
        assert!(request.messages[1].content.contains("Review these 2 passages"));
        assert!(request.messages[1]
            .content
            .contains("The wind howled.\n\n---\n\nAgain the wind howled."));
        assert!(!request.messages[1].content.contains("I listen"));
        assert_eq!(request.temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_unusable_reply_is_empty() {
        let client = Arc::new(ScriptedClient::replies(["Everything reads well to me."]));
        let result = service(&client)
            .analyze_style(&[StoryEntry::narration("x")], StoryMode::Adventure, None, None)
            .await;
        assert!(result.is_empty());
        assert_eq!(result.reviewed_entry_count, 0);
    }
}
