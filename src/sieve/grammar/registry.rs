/// Keyword registry: the live grammar of one parse.
///
/// Built from the base grammar plus every loadable extension resource.
/// Extensions only contribute keywords once a script `require`s them; the
/// require/forbid relations between them are checked when the script ends.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use regex::Regex;
use tracing::{debug, warn};

use crate::sieve::error::{GrammarError, ParseError};
use crate::sieve::grammar::descriptor::{Declaration, Keyword, KeywordKind, Origin, TaggedArgument};
use crate::sieve::grammar::resource::{ExtensionDocument, GrammarDocument};
use crate::sieve::token::Token;

mod builtin {
    include!(concat!(env!("OUT_DIR"), "/builtin_extensions.rs"));
}

const BASE_GRAMMAR: &str = include_str!("../../../grammar/keywords.json");
const BASE_GRAMMAR_NAME: &str = "keywords.json";

#[derive(Debug, Clone, Default)]
pub struct KeywordRegistry {
    commands: BTreeMap<String, Keyword>,
    tests: BTreeMap<String, Keyword>,
    match_types: BTreeMap<String, Keyword>,
    comparators: BTreeMap<String, Keyword>,
    address_parts: BTreeMap<String, Keyword>,
    tagged_arguments: BTreeMap<String, TaggedArgument>,
    available: BTreeMap<String, ExtensionDocument>,
    active: BTreeSet<String>,
    /// Required extension -> active extensions waiting for it.
    missing: BTreeMap<String, Vec<String>>,
    /// Forbidden extension -> active extensions forbidding it.
    forbidden: BTreeMap<String, Vec<String>>,
    /// Value matchers built so far, keyed by source.
    compiled: HashMap<String, Regex>,
}

impl KeywordRegistry {
    /// Loads the built-in grammar and extensions plus `custom` resources.
    ///
    /// With an `enabled` list only the built-in extensions named in it are
    /// loaded; custom extensions are always loaded.
    pub fn new(enabled: Option<&[String]>, custom: &[PathBuf]) -> Result<Self, GrammarError> {
        let base = GrammarDocument::from_json(BASE_GRAMMAR_NAME, BASE_GRAMMAR)?;
        let builtin = builtin::BUILTIN_EXTENSIONS
            .iter()
            .map(|(stem, json)| ExtensionDocument::from_json(&format!("{stem}.json"), json))
            .collect::<Result<Vec<_>, _>>()?;
        let custom = custom
            .iter()
            .map(|path| ExtensionDocument::from_path(path))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_documents(base, builtin, enabled, custom)
    }

    pub fn from_documents(
        base: GrammarDocument,
        builtin: Vec<ExtensionDocument>,
        enabled: Option<&[String]>,
        custom: Vec<ExtensionDocument>,
    ) -> Result<Self, GrammarError> {
        let mut registry = Self::default();
        let origin = Origin::Grammar(BASE_GRAMMAR_NAME.to_string());

        for element in &base.keywords {
            let declaration = Declaration::from_resource(element, &origin)?;
            let Declaration::Keyword { kind, keyword, .. } = declaration else {
                continue;
            };
            let table = registry.table_mut(kind);
            if table.contains_key(&keyword.name) {
                let kind = kind.as_str();
                warn!("redefinition of {kind} {} - skipping", keyword.name);
                continue;
            }
            table.insert(keyword.name.clone(), keyword);
        }

        let builtin = builtin
            .into_iter()
            .filter(|doc| enabled.map_or(true, |names| names.iter().any(|n| *n == doc.name)));
        for doc in builtin {
            registry.make_available(doc);
        }
        for doc in custom {
            registry.make_available(doc);
        }

        Ok(registry)
    }

    fn make_available(&mut self, doc: ExtensionDocument) {
        if self.available.contains_key(&doc.name) {
            warn!("overwriting extension \"{}\"", doc.name);
        }
        self.available.insert(doc.name.clone(), doc);
    }

    fn table_mut(&mut self, kind: KeywordKind) -> &mut BTreeMap<String, Keyword> {
        match kind {
            KeywordKind::MatchType => &mut self.match_types,
            KeywordKind::Comparator => &mut self.comparators,
            KeywordKind::AddressPart => &mut self.address_parts,
            KeywordKind::Test => &mut self.tests,
            KeywordKind::Command => &mut self.commands,
        }
    }

    /// Makes the keywords of extension `name` available to the script.
    ///
    /// Unknown or already active extensions are ignored.
    pub fn activate(&mut self, name: &str) -> Result<(), GrammarError> {
        if self.active.contains(name) {
            return Ok(());
        }
        let Some(doc) = self.available.get(name) else {
            return Ok(());
        };

        let origin = Origin::Extension(doc.name.clone());
        let declarations = doc
            .keywords
            .iter()
            .map(|element| Declaration::from_resource(element, &origin))
            .collect::<Result<Vec<_>, _>>()?;
        let requires: Vec<String> = doc.require_list().map(str::to_string).collect();

        debug!(extension = name, "activating extension");
        self.active.insert(name.to_string());
        self.missing.remove(name);

        for item in requires {
            if let Some(other) = item.strip_prefix('!') {
                debug!(
                    extension = name,
                    forbids = other,
                    "recording forbidden extension"
                );
                let forbidders = self.forbidden.entry(other.to_string()).or_default();
                forbidders.push(name.to_string());
            } else if !self.active.contains(&item) {
                debug!(extension = name, requires = %item, "extension requirement not yet met");
                self.missing.entry(item).or_default().push(name.to_string());
            }
        }

        for declaration in declarations {
            match declaration {
                Declaration::Keyword {
                    kind,
                    keyword,
                    overrides,
                } => {
                    let table = self.table_mut(kind);
                    if overrides || !table.contains_key(&keyword.name) {
                        table.insert(keyword.name.clone(), keyword);
                    }
                }
                Declaration::TaggedArgument(argument) => {
                    let key = argument.parameter.display_name().to_string();
                    self.tagged_arguments.insert(key, argument);
                }
            }
        }

        Ok(())
    }

    /// Final cross-extension check, run once the whole script is read.
    pub fn validate_requires(&self, token: &Token) -> Result<(), ParseError> {
        let mut problems = Vec::new();

        for (required, by) in &self.missing {
            problems.push(format!(
                "extension `{required}` is required by `{}`",
                by.join(", ")
            ));
        }
        for (forbidden, by) in &self.forbidden {
            if self.active.contains(forbidden) {
                problems.push(format!(
                    "extension {forbidden} cannot be loaded together with {}",
                    by.join(", ")
                ));
            }
        }

        if problems.is_empty() {
            return Ok(());
        }
        let problems = problems.join("\n");
        Err(ParseError::new(
            token,
            format!("extension requirements are not fulfilled:\n{problems}"),
        ))
    }

    /// Compiles `source` once per registry; later calls share the result.
    pub(crate) fn regex(&mut self, source: &str) -> Result<Regex, regex::Error> {
        if let Some(regex) = self.compiled.get(source) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(source)?;
        self.compiled.insert(source.to_string(), regex.clone());
        Ok(regex)
    }

    #[cfg(test)]
    pub(crate) fn cached_patterns(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn is_test(&self, name: &str) -> bool {
        self.tests.contains_key(name)
    }

    pub fn command(&self, name: &str) -> Option<&Keyword> {
        self.commands.get(name)
    }

    pub fn test(&self, name: &str) -> Option<&Keyword> {
        self.tests.get(name)
    }

    pub fn match_type(&self, name: &str) -> Option<&Keyword> {
        self.match_types.get(name)
    }

    pub fn comparator(&self, name: &str) -> Option<&Keyword> {
        self.comparators.get(name)
    }

    pub fn address_part(&self, name: &str) -> Option<&Keyword> {
        self.address_parts.get(name)
    }

    /// Tagged arguments whose `extends` pattern matches `command`.
    pub fn tagged_arguments_for<'a>(
        &'a self,
        command: &'a str,
    ) -> impl Iterator<Item = &'a TaggedArgument> {
        self.tagged_arguments
            .values()
            .filter(move |arg| arg.extends.is_match(command))
    }

    pub fn tagged_argument(&self, name: &str) -> Option<&TaggedArgument> {
        self.tagged_arguments.get(name)
    }

    /// Names accepted by `require`.
    pub fn require_strings(&self) -> impl Iterator<Item = &str> {
        self.available.keys().map(String::as_str)
    }

    pub fn match_types(&self) -> impl Iterator<Item = &str> {
        self.match_types.keys().map(String::as_str)
    }

    pub fn comparators(&self) -> impl Iterator<Item = &str> {
        self.comparators.keys().map(String::as_str)
    }

    pub fn address_parts(&self) -> impl Iterator<Item = &str> {
        self.address_parts.keys().map(String::as_str)
    }

    pub fn tests(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    pub fn active_extensions(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(String::as_str)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains(name)
    }
}
