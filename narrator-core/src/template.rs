//! Variable interpolation over a flat namespace.
//!
//! Bodies are rendered with minijinja in a single pass: values are inserted as
//! text and never re-rendered. Undefined names render as the empty string and
//! rendering never fails. A body that does not parse as a template falls back
//! to plain `{{ name }}` substitution.

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Flat variable name → value mapping.
pub type Namespace = BTreeMap<String, Value>;

static ENGINE: Lazy<Environment<'static>> = Lazy::new(environment);

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

fn environment<'a>() -> Environment<'a> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env
}

/// Render `body` against `namespace`.
pub fn render(body: &str, namespace: &Namespace) -> String {
    if body.is_empty() {
        return String::new();
    }

    // Null renders as "none" in minijinja; treat it as undefined instead.
    let ctx: BTreeMap<&str, &Value> = namespace
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.as_str(), v))
        .collect();

    match ENGINE.render_str(body, &ctx) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::debug!(error = %e, "template did not parse, using plain substitution");
            substitute(body, namespace)
        }
    }
}

/// Replace each `{{ name }}` with its value, or nothing.
fn substitute(body: &str, namespace: &Namespace) -> String {
    PLACEHOLDER
        .replace_all(body, |caps: &regex::Captures<'_>| {
            namespace.get(&caps[1]).map(display).unwrap_or_default()
        })
        .into_owned()
}

/// Text form of a namespace value.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Top-level names a body reads.
pub fn referenced_variables(body: &str) -> BTreeSet<String> {
    let env = environment();
    match env.template_from_str(body) {
        Ok(template) => template.undeclared_variables(false).into_iter().collect(),
        Err(_) => PLACEHOLDER
            .captures_iter(body)
            .map(|caps| caps[1].to_string())
            .collect(),
    }
}
