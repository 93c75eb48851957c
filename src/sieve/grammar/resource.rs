/// Serialized grammar resources.
///
/// Kinds stay plain strings here; they are checked when a resource is turned
/// into descriptors, so an extension with an unsupported element only fails
/// once a script actually requires it.
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::sieve::error::GrammarError;

/// The base grammar: `{ "keywords": [...] }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrammarDocument {
    #[serde(default)]
    pub keywords: Vec<ElementDoc>,
}

/// An extension: a named bundle of keywords plus its require/forbid list.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionDocument {
    pub name: String,
    /// Comma-separated extension names; a leading `!` forbids instead.
    #[serde(default)]
    pub require: Option<String>,
    #[serde(default)]
    pub keywords: Vec<ElementDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElementDoc {
    pub element: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub overrides: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterDoc>,
    #[serde(default)]
    pub requires: Vec<RequirementDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParameterDoc {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub occurrence: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub case: Option<String>,
    #[serde(default)]
    pub follows: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDoc>,
    #[serde(default)]
    pub requires: Vec<RequirementDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequirementDoc {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub regex: Option<String>,
}

impl GrammarDocument {
    pub fn from_json(resource: &str, json: &str) -> Result<Self, GrammarError> {
        serde_json::from_str(json).map_err(|source| GrammarError::Json {
            resource: resource.to_string(),
            source,
        })
    }
}

impl ExtensionDocument {
    pub fn from_json(resource: &str, json: &str) -> Result<Self, GrammarError> {
        serde_json::from_str(json).map_err(|source| GrammarError::Json {
            resource: resource.to_string(),
            source,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, GrammarError> {
        let json = fs::read_to_string(path).map_err(|source| GrammarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&path.display().to_string(), &json)
    }

    /// Entries of the `require` list, trimmed, empty entries dropped.
    pub fn require_list(&self) -> impl Iterator<Item = &str> {
        self.require
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_defaults() {
        let doc = ExtensionDocument::from_json(
            "inline",
            r#"{ "name": "demo", "keywords": [ { "element": "command", "name": "ping" } ] }"#,
        )
        .unwrap();
        assert_eq!(doc.name, "demo");
        assert_eq!(doc.require_list().count(), 0);
        assert!(!doc.keywords[0].overrides);
        assert!(doc.keywords[0].parameters.is_empty());
    }

    #[test]
    fn test_require_list() {
        let doc = ExtensionDocument::from_json(
            "inline",
            r#"{ "name": "demo", "require": "relational, !spamtest,," }"#,
        )
        .unwrap();
        let required: Vec<_> = doc.require_list().collect();
        assert_eq!(required, vec!["relational", "!spamtest"]);
    }

    #[test]
    fn test_malformed_json_names_resource() {
        let err = ExtensionDocument::from_json("broken.json", "{ \"name\": ").unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
