/// Typed grammar descriptors.
///
/// The keyword and parameter vocabularies are closed; anything else in a
/// resource is rejected while converting it.
use std::fmt;

use regex::Regex;

use crate::sieve::error::GrammarError;
use crate::sieve::grammar::resource::{ElementDoc, ParameterDoc, RequirementDoc};

pub const MATCH_ANYTHING: &str = ".*";

/// Where a descriptor came from, for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Grammar(String),
    Extension(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grammar(name) => write!(f, "grammar '{name}'"),
            Self::Extension(name) => write!(f, "extension '{name}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordKind {
    MatchType,
    Comparator,
    AddressPart,
    Test,
    Command,
}

impl KeywordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MatchType => "matchtype",
            Self::Comparator => "comparator",
            Self::AddressPart => "addresspart",
            Self::Test => "test",
            Self::Command => "command",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    AddressPart,
    Block,
    Comparator,
    MatchType,
    Number,
    RequireStrings,
    String,
    StringList,
    Tag,
    Test,
    TestList,
}

impl ParamKind {
    pub fn from_resource(s: &str) -> Option<Self> {
        match s {
            "addresspart" => Some(Self::AddressPart),
            "block" => Some(Self::Block),
            "comparator" => Some(Self::Comparator),
            "matchtype" => Some(Self::MatchType),
            "number" => Some(Self::Number),
            "requirestrings" => Some(Self::RequireStrings),
            "string" => Some(Self::String),
            "stringlist" => Some(Self::StringList),
            "tag" => Some(Self::Tag),
            "test" => Some(Self::Test),
            "testlist" => Some(Self::TestList),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddressPart => "addresspart",
            Self::Block => "block",
            Self::Comparator => "comparator",
            Self::MatchType => "matchtype",
            Self::Number => "number",
            Self::RequireStrings => "requirestrings",
            Self::String => "string",
            Self::StringList => "stringlist",
            Self::Tag => "tag",
            Self::Test => "test",
            Self::TestList => "testlist",
        }
    }
}

/// How often a parameter may appear, as declared in a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    One,
    Optional,
    Any,
    Some,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Adhere,
    Ignore,
}

/// The remembered value a dependency is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    AddressPart,
    MatchType,
    Comparator,
    Tag,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AddressPart => "address part",
            Self::MatchType => "match type",
            Self::Comparator => "comparator",
            Self::Tag => "tag",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Requirement {
    pub kind: DependencyKind,
    pub name: String,
    /// Anchored, case-insensitive.
    pub pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub kind: ParamKind,
    pub occurrence: Occurrence,
    /// Unanchored source; spliced into the value matchers.
    pub regex: String,
    pub case: Case,
    /// Identifiers this parameter may follow, anchored.
    pub follows: Regex,
    pub name: Option<String>,
    pub parameters: Vec<Parameter>,
    pub requires: Vec<Requirement>,
}

impl Parameter {
    /// The declared name, falling back to the parameter kind.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.as_str())
    }
}

/// A command, test, match type, comparator or address part.
#[derive(Debug, Clone)]
pub struct Keyword {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub requires: Vec<Requirement>,
}

/// A tag an extension grafts onto existing commands or tests.
#[derive(Debug, Clone)]
pub struct TaggedArgument {
    pub extends: Regex,
    pub parameter: Parameter,
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Keyword {
        kind: KeywordKind,
        keyword: Keyword,
        overrides: bool,
    },
    TaggedArgument(TaggedArgument),
}

impl Declaration {
    pub fn from_resource(element: &ElementDoc, origin: &Origin) -> Result<Self, GrammarError> {
        let kind = match element.element.as_str() {
            "matchtype" => KeywordKind::MatchType,
            "comparator" => KeywordKind::Comparator,
            "addresspart" => KeywordKind::AddressPart,
            "test" => KeywordKind::Test,
            "command" => KeywordKind::Command,
            "tagged-argument" if matches!(origin, Origin::Extension(_)) => {
                return tagged_argument(element, origin).map(Self::TaggedArgument);
            }
            other => return Err(unsupported_element(other, origin)),
        };

        Ok(Self::Keyword {
            kind,
            keyword: Keyword {
                name: element.name.clone(),
                parameters: parameters(&element.parameters, origin)?,
                requires: requirements(&element.requires, origin)?,
            },
            overrides: element.overrides,
        })
    }
}

fn unsupported_element(kind: &str, origin: &Origin) -> GrammarError {
    match origin {
        Origin::Grammar(resource) => GrammarError::UnsupportedKeyword {
            kind: kind.to_string(),
            resource: resource.clone(),
        },
        Origin::Extension(extension) => GrammarError::UnsupportedExtensionType {
            kind: kind.to_string(),
            extension: extension.clone(),
        },
    }
}

fn tagged_argument(element: &ElementDoc, origin: &Origin) -> Result<TaggedArgument, GrammarError> {
    let [parameter] = element.parameters.as_slice() else {
        return Err(GrammarError::TaggedArgumentShape {
            origin: origin.to_string(),
        });
    };
    let parameter = self::parameter(parameter, origin)?;
    if parameter.kind != ParamKind::Tag {
        return Err(GrammarError::TaggedArgumentShape {
            origin: origin.to_string(),
        });
    }

    let extends = element.extends.as_deref().unwrap_or(MATCH_ANYTHING);
    Ok(TaggedArgument {
        extends: compile(extends, origin)?,
        parameter,
    })
}

fn parameters(docs: &[ParameterDoc], origin: &Origin) -> Result<Vec<Parameter>, GrammarError> {
    docs.iter().map(|doc| parameter(doc, origin)).collect()
}

fn parameter(doc: &ParameterDoc, origin: &Origin) -> Result<Parameter, GrammarError> {
    let kind = ParamKind::from_resource(&doc.kind).ok_or_else(|| {
        GrammarError::UnsupportedParameter {
            kind: doc.kind.clone(),
            origin: origin.to_string(),
        }
    })?;

    let occurrence = match doc.occurrence.as_deref() {
        None => Occurrence::One,
        Some("optional") => Occurrence::Optional,
        Some("any") => Occurrence::Any,
        Some("some") => Occurrence::Some,
        Some(other) => return Err(unsupported_attribute("occurrence", other, origin)),
    };

    let case = match doc.case.as_deref() {
        None | Some("adhere") => Case::Adhere,
        Some("ignore") => Case::Ignore,
        Some(other) => return Err(unsupported_attribute("case", other, origin)),
    };

    let regex = doc.regex.as_deref().unwrap_or(MATCH_ANYTHING).to_string();
    compile(&regex, origin)?;
    let follows = compile(doc.follows.as_deref().unwrap_or(MATCH_ANYTHING), origin)?;

    Ok(Parameter {
        kind,
        occurrence,
        regex,
        case,
        follows,
        name: doc.name.clone(),
        parameters: parameters(&doc.parameters, origin)?,
        requires: requirements(&doc.requires, origin)?,
    })
}

fn requirements(
    docs: &[RequirementDoc],
    origin: &Origin,
) -> Result<Vec<Requirement>, GrammarError> {
    docs.iter()
        .map(|doc| {
            let kind = match doc.kind.as_str() {
                "addresspart" => DependencyKind::AddressPart,
                "matchtype" => DependencyKind::MatchType,
                "comparator" => DependencyKind::Comparator,
                "tag" => DependencyKind::Tag,
                other => return Err(unsupported_attribute("requirement type", other, origin)),
            };
            let regex = match &doc.regex {
                Some(regex) => regex.clone(),
                None => regex::escape(&doc.name),
            };
            Ok(Requirement {
                kind,
                name: doc.name.clone(),
                pattern: compile(&regex, origin)?,
            })
        })
        .collect()
}

fn unsupported_attribute(attribute: &'static str, value: &str, origin: &Origin) -> GrammarError {
    GrammarError::UnsupportedAttribute {
        attribute,
        value: value.to_string(),
        origin: origin.to_string(),
    }
}

/// Compiles `pattern` anchored to the whole input.
pub fn compile(pattern: &str, origin: &Origin) -> Result<Regex, GrammarError> {
    Regex::new(&format!("(?i)^(?:{pattern})$")).map_err(|source| GrammarError::InvalidPattern {
        pattern: pattern.to_string(),
        origin: origin.to_string(),
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sieve::grammar::resource::ExtensionDocument;

    fn extension(json: &str) -> ExtensionDocument {
        ExtensionDocument::from_json("inline", json).unwrap()
    }

    fn origin() -> Origin {
        Origin::Extension("demo".to_string())
    }

    #[test]
    fn test_parameter_defaults() {
        let doc = extension(
            r#"{ "name": "demo", "keywords": [
                { "element": "command", "name": "ping", "parameters": [ { "type": "string" } ] }
            ] }"#,
        );
        let declaration = Declaration::from_resource(&doc.keywords[0], &origin()).unwrap();
        let Declaration::Keyword { kind, keyword, .. } = &declaration else {
            panic!("Expected keyword");
        };
        assert_eq!(*kind, KeywordKind::Command);
        assert!(matches!(declaration, Declaration::Keyword { overrides: false, .. }));
        let param = &keyword.parameters[0];
        assert_eq!(param.occurrence, Occurrence::One);
        assert_eq!(param.case, Case::Adhere);
        assert_eq!(param.regex, MATCH_ANYTHING);
        assert!(param.follows.is_match("anything at all"));
        assert_eq!(param.display_name(), "string");
    }

    #[test]
    fn test_requirement_defaults_to_literal_name() {
        let doc = extension(
            r#"{ "name": "demo", "keywords": [
                { "element": "matchtype", "name": "count",
                  "requires": [ { "type": "comparator", "name": "i;ascii-numeric" } ] }
            ] }"#,
        );
        let Declaration::Keyword { keyword, .. } =
            Declaration::from_resource(&doc.keywords[0], &origin()).unwrap()
        else {
            panic!("Expected keyword");
        };
        let pattern = &keyword.requires[0].pattern;
        assert!(pattern.is_match("I;ASCII-NUMERIC"));
        assert!(!pattern.is_match("i;ascii-numeric-x"));
    }

    #[test]
    fn test_unsupported_element_names_extension() {
        let doc = extension(
            r#"{ "name": "wrong", "keywords": [ { "element": "silly", "name": "x" } ] }"#,
        );
        let err = Declaration::from_resource(&doc.keywords[0], &Origin::Extension("wrong".into()))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported extension type 'silly' in extension 'wrong'"
        );
    }

    #[test]
    fn test_unsupported_parameter() {
        let doc = extension(
            r#"{ "name": "demo", "keywords": [
                { "element": "test", "name": "t", "parameters": [ { "type": "silly" } ] }
            ] }"#,
        );
        let err = Declaration::from_resource(&doc.keywords[0], &origin()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported parameter type 'silly' in extension 'demo'"
        );
    }

    #[test]
    fn test_tagged_argument_needs_one_tag() {
        let doc = extension(
            r#"{ "name": "demo", "keywords": [
                { "element": "tagged-argument", "extends": "keep",
                  "parameters": [ { "type": "string" } ] }
            ] }"#,
        );
        assert!(matches!(
            Declaration::from_resource(&doc.keywords[0], &origin()),
            Err(GrammarError::TaggedArgumentShape { .. })
        ));
    }

    #[test]
    fn test_tagged_argument_extends_is_anchored() {
        let doc = extension(
            r#"{ "name": "demo", "keywords": [
                { "element": "tagged-argument", "extends": "(fileinto|redirect)",
                  "parameters": [ { "type": "tag", "name": "copy", "regex": "copy" } ] }
            ] }"#,
        );
        let Declaration::TaggedArgument(arg) =
            Declaration::from_resource(&doc.keywords[0], &origin()).unwrap()
        else {
            panic!("Expected tagged argument");
        };
        assert!(arg.extends.is_match("redirect"));
        assert!(!arg.extends.is_match("xredirect"));
    }

    #[test]
    fn test_invalid_pattern() {
        let doc = extension(
            r#"{ "name": "demo", "keywords": [
                { "element": "command", "name": "c",
                  "parameters": [ { "type": "string", "regex": "(" } ] }
            ] }"#,
        );
        let err = Declaration::from_resource(&doc.keywords[0], &origin()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("invalid pattern `(` in extension 'demo'"));
    }
}
