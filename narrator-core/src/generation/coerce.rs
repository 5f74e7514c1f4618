//! Shape coercion for healed model replies.
//!
//! Models rename fields, invent enum values and return too many items. Each
//! field is read through an ordered list of candidate names, enums fall back
//! to a safe value, and lists are capped.

use serde_json::{Map, Value};

/// Ordered candidate names for one logical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aliases(pub &'static [&'static str]);

pub const PHRASES: Aliases = Aliases(&["phrases", "issues"]);
pub const PHRASE: Aliases = Aliases(&["phrase", "description"]);
pub const FREQUENCY: Aliases = Aliases(&["frequency", "occurrences"]);
pub const ALTERNATIVES: Aliases = Aliases(&["alternatives", "suggestions"]);
pub const CONTEXTS: Aliases = Aliases(&["contexts", "examples"]);
pub const OVERALL_ASSESSMENT: Aliases = Aliases(&["overallAssessment", "summary"]);
pub const CHOICES: Aliases = Aliases(&["choices"]);
pub const SUGGESTIONS: Aliases = Aliases(&["suggestions"]);
pub const TEXT: Aliases = Aliases(&["text"]);
pub const TYPE: Aliases = Aliases(&["type"]);
pub const SEVERITY: Aliases = Aliases(&["severity"]);
pub const ICON: Aliases = Aliases(&["icon"]);

impl Aliases {
    /// First candidate holding a non-null value.
    pub fn value<'v>(&self, obj: &'v Map<String, Value>) -> Option<&'v Value> {
        self.0
            .iter()
            .filter_map(|name| obj.get(*name))
            .find(|v| !v.is_null())
    }

    /// First candidate holding a non-blank string, trimmed.
    pub fn text(&self, obj: &Map<String, Value>) -> Option<String> {
        self.0
            .iter()
            .filter_map(|name| obj.get(*name)?.as_str())
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// First candidate holding an array.
    pub fn array<'v>(&self, obj: &'v Map<String, Value>) -> Option<&'v Vec<Value>> {
        self.0.iter().find_map(|name| obj.get(*name)?.as_array())
    }

    /// First candidate holding a non-negative count, rounded.
    pub fn count(&self, obj: &Map<String, Value>) -> Option<u32> {
        self.0.iter().find_map(|name| match obj.get(*name)? {
            Value::Number(n) => n.as_f64().and_then(to_count),
            Value::String(s) => s.trim().parse::<f64>().ok().and_then(to_count),
            _ => None,
        })
    }
}

fn to_count(n: f64) -> Option<u32> {
    (n.is_finite() && n >= 0.0 && n <= u32::MAX as f64).then(|| n.round() as u32)
}

/// Look a string up in an allow-list, case-insensitively, or fall back.
pub fn enum_or<T: Copy>(value: Option<&Value>, allowed: &[(&str, T)], fallback: T) -> T {
    let Some(raw) = value.and_then(Value::as_str) else {
        return fallback;
    };
    let needle = raw.trim().to_lowercase();
    allowed
        .iter()
        .find(|(name, _)| *name == needle)
        .map(|(_, v)| *v)
        .unwrap_or(fallback)
}

/// Non-blank strings from an array, trimmed, at most `cap`.
pub fn string_list(items: Option<&Vec<Value>>, cap: usize) -> Vec<String> {
    items
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(cap)
        .map(str::to_string)
        .collect()
}

/// The item list of a reply: the first matching field of a top-level object,
/// or the reply itself when the model sent a bare array.
pub fn items<'v>(reply: &'v Value, field: Aliases) -> &'v [Value] {
    match reply {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => field.array(obj).map(Vec::as_slice).unwrap_or(&[]),
        _ => &[],
    }
}
