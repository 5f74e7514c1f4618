//! Preset packs: bundles of prompt templates and custom variables.
//!
//! A pack is exchanged as a versioned JSON export. Importing validates the
//! whole export and reports every problem at once so an author can fix them
//! in one pass.

use crate::generation::BUILTIN_TEMPLATES;
use crate::template::referenced_variables;
use crate::variables::{VariableCategory, VariableRegistry};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// Pack used when neither the caller nor the story names one.
pub const DEFAULT_PACK_ID: &str = "default-pack";

/// Current export format version.
pub const PACK_EXPORT_VERSION: u32 = 1;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Errors from pack import.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pack: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Pack metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetPack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// One stored template body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackTemplate {
    pub template_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomVariableType {
    Text,
    Textarea,
    Enum,
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub value: String,
    pub label: String,
}

/// A variable declared by a pack, with the default the context builder uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomVariable {
    pub variable_name: String,
    pub display_name: String,
    pub variable_type: CustomVariableType,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub enum_options: Vec<EnumOption>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A pack with all of its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullPack {
    pub pack: PresetPack,
    pub templates: Vec<PackTemplate>,
    pub variables: Vec<CustomVariable>,
}

impl FullPack {
    /// The default pack, carrying the built-in prompt templates.
    pub fn builtin_default() -> Self {
        Self {
            pack: PresetPack {
                id: DEFAULT_PACK_ID.to_string(),
                name: "Default".to_string(),
                description: Some("Built-in prompt templates".to_string()),
                author: None,
                is_default: true,
            },
            templates: BUILTIN_TEMPLATES
                .iter()
                .map(|(id, body)| PackTemplate {
                    template_id: id.to_string(),
                    content: body.to_string(),
                })
                .collect(),
            variables: Vec::new(),
        }
    }

    pub fn template(&self, template_id: &str) -> Option<&PackTemplate> {
        self.templates.iter().find(|t| t.template_id == template_id)
    }
}

/// Pack metadata as it appears in an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackExportMeta {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// Exchange format for packs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackExport {
    pub version: u32,
    pub pack: PackExportMeta,
    #[serde(default)]
    pub templates: Vec<PackTemplate>,
    #[serde(default)]
    pub variables: Vec<CustomVariable>,
}

impl PackExport {
    /// Pack id derived from the pack name.
    pub fn pack_id(&self) -> String {
        slug(&self.pack.name)
    }

    pub fn into_full_pack(self) -> FullPack {
        FullPack {
            pack: PresetPack {
                id: self.pack_id(),
                name: self.pack.name,
                description: self.pack.description,
                author: self.pack.author,
                is_default: false,
            },
            templates: self.templates,
            variables: self.variables,
        }
    }
}

fn slug(name: &str) -> String {
    let mut out = String::new();
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Parse and validate a pack export.
pub fn validate_pack_import(json: &str, registry: &VariableRegistry) -> Result<PackExport, PackError> {
    let export: PackExport = serde_json::from_str(json)?;
    let mut problems = Vec::new();

    if export.version != PACK_EXPORT_VERSION {
        problems.push(format!(
            "unsupported version {} (expected {PACK_EXPORT_VERSION})",
            export.version
        ));
    }

    if export.pack.name.trim().is_empty() || export.pack_id().is_empty() {
        problems.push("pack name must not be empty".to_string());
    }

    let mut seen = HashSet::new();
    for template in &export.templates {
        if template.template_id.trim().is_empty() {
            problems.push("template id must not be empty".to_string());
        } else if !seen.insert(template.template_id.as_str()) {
            problems.push(format!("duplicate template id '{}'", template.template_id));
        }
    }

    let mut names = HashSet::new();
    for variable in &export.variables {
        if !names.insert(variable.variable_name.as_str()) {
            problems.push(format!("duplicate variable '{}'", variable.variable_name));
        }
        if let Err(errors) = validate_custom_variable(variable, registry) {
            problems.extend(errors);
        }
    }

    if problems.is_empty() {
        Ok(export)
    } else {
        Err(PackError::Invalid(problems))
    }
}

/// Check one custom variable, returning every problem found.
pub fn validate_custom_variable(
    variable: &CustomVariable,
    registry: &VariableRegistry,
) -> Result<(), Vec<String>> {
    let name = &variable.variable_name;
    let mut problems = Vec::new();

    if !IDENTIFIER.is_match(name) {
        problems.push(format!("variable name '{name}' is not a valid identifier"));
    }

    if let Some(existing) = registry.get(name) {
        if existing.category != VariableCategory::Custom {
            problems.push(format!("variable '{name}' shadows a built-in variable"));
        }
    }

    if variable.display_name.trim().is_empty() {
        problems.push(format!("variable '{name}' needs a display name"));
    }

    let default = variable.default_value.as_deref();
    match variable.variable_type {
        CustomVariableType::Enum => {
            if variable.enum_options.is_empty() {
                problems.push(format!("enum variable '{name}' needs at least one option"));
            } else if let Some(d) = default {
                if !variable.enum_options.iter().any(|o| o.value == d) {
                    problems.push(format!("default '{d}' of '{name}' is not one of its options"));
                }
            }
        }
        CustomVariableType::Number => {
            if let Some(d) = default {
                if d.trim().parse::<f64>().is_err() {
                    problems.push(format!("default '{d}' of '{name}' is not a number"));
                }
            }
        }
        CustomVariableType::Boolean => {
            if let Some(d) = default {
                if d != "true" && d != "false" {
                    problems.push(format!("default '{d}' of '{name}' must be true or false"));
                }
            }
        }
        CustomVariableType::Text | CustomVariableType::Textarea => {}
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

/// Names a template body reads that neither the registry nor the pack
/// declares.
pub fn undeclared_variables(
    body: &str,
    registry: &VariableRegistry,
    custom: &[CustomVariable],
) -> BTreeSet<String> {
    referenced_variables(body)
        .into_iter()
        .filter(|name| !registry.contains(name))
        .filter(|name| !custom.iter().any(|v| &v.variable_name == name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn variable(name: &str, kind: CustomVariableType, default: Option<&str>) -> CustomVariable {
        CustomVariable {
            variable_name: name.to_string(),
            display_name: name.to_string(),
            variable_type: kind,
            default_value: default.map(str::to_string),
            enum_options: Vec::new(),
            description: None,
        }
    }

    fn export_json(value: serde_json::Value) -> String {
        value.to_string()
    }

    #[test]
    fn test_valid_import() {
        let registry = VariableRegistry::initialize();
        let json = export_json(json!({
            "version": 1,
            "pack": {"name": "Noir Pack", "author": "someone"},
            "templates": [
                {"templateId": "suggestions", "content": "{{ genre }} {{ mood }}"},
                {"templateId": "suggestions-user", "content": "go"}
            ],
            "variables": [{
                "variableName": "mood",
                "displayName": "Mood",
                "variableType": "enum",
                "defaultValue": "grim",
                "enumOptions": [{"value": "grim", "label": "Grim"}]
            }]
        }));

        let export = validate_pack_import(&json, &registry).unwrap();
        assert_eq!(export.pack_id(), "noir-pack");
        let full = export.into_full_pack();
        assert!(!full.pack.is_default);
        assert_eq!(full.template("suggestions-user").unwrap().content, "go");
    }

    #[test]
    fn test_import_collects_all_problems() {
        let registry = VariableRegistry::initialize();
        let json = export_json(json!({
            "version": 2,
            "pack": {"name": "  "},
            "templates": [
                {"templateId": "a", "content": ""},
                {"templateId": "a", "content": ""}
            ],
            "variables": [{
                "variableName": "genre",
                "displayName": "Genre",
                "variableType": "text"
            }]
        }));

        match validate_pack_import(&json, &registry) {
            Err(PackError::Invalid(problems)) => {
                assert_eq!(problems.len(), 4, "{problems:?}");
                assert!(problems[0].contains("version"));
                assert!(problems[1].contains("name"));
                assert!(problems[2].contains("duplicate template id 'a'"));
                assert!(problems[3].contains("shadows"));
            }
            other => panic!("expected invalid pack, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_export_is_json_error() {
        let registry = VariableRegistry::initialize();
        assert!(matches!(
            validate_pack_import("{\"version\": 1}", &registry),
            Err(PackError::Json(_))
        ));
    }

    #[test]
    fn test_custom_variable_rules() {
        let registry = VariableRegistry::initialize();

        assert!(validate_custom_variable(&variable("ok_name", CustomVariableType::Text, None), &registry).is_ok());
        assert!(validate_custom_variable(&variable("9lives", CustomVariableType::Text, None), &registry).is_err());
        assert!(validate_custom_variable(&variable("has space", CustomVariableType::Text, None), &registry).is_err());

        assert!(validate_custom_variable(&variable("n", CustomVariableType::Number, Some("3.5")), &registry).is_ok());
        assert!(validate_custom_variable(&variable("n", CustomVariableType::Number, Some("three")), &registry).is_err());

        assert!(validate_custom_variable(&variable("b", CustomVariableType::Boolean, Some("false")), &registry).is_ok());
        assert!(validate_custom_variable(&variable("b", CustomVariableType::Boolean, Some("yes")), &registry).is_err());

        let empty_enum = variable("e", CustomVariableType::Enum, None);
        assert!(validate_custom_variable(&empty_enum, &registry).is_err());

        let mut bad_default = variable("e", CustomVariableType::Enum, Some("c"));
        bad_default.enum_options = vec![EnumOption {
            value: "a".into(),
            label: "A".into(),
        }];
        let problems = validate_custom_variable(&bad_default, &registry).unwrap_err();
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn test_undeclared_variables() {
        let registry = VariableRegistry::initialize();
        let custom = vec![variable("mood", CustomVariableType::Text, None)];
        let names = undeclared_variables(
            "{{ protagonistName }} feels {{ mood }} in {{ curentLocation }}",
            &registry,
            &custom,
        );
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["curentLocation"]);
    }

    #[test]
    fn test_builtin_default_pack() {
        let pack = FullPack::builtin_default();
        assert_eq!(pack.pack.id, DEFAULT_PACK_ID);
        assert!(pack.pack.is_default);
        assert!(pack.template("action-choices").is_some());
        assert!(pack.template("action-choices-user").is_some());
        assert!(pack.template("style-reviewer-user").is_some());
    }

    #[test]
    fn test_builtin_templates_only_use_known_variables() {
        let registry = VariableRegistry::with_runtime_variables();
        for (id, body) in BUILTIN_TEMPLATES {
            let unknown = undeclared_variables(body, &registry, &[]);
            assert!(unknown.is_empty(), "{id} uses {unknown:?}");
        }
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("  My Great -- Pack! "), "my-great-pack");
    }
}
