/// Per-command argument validation.
///
/// A [`Semantics`] is created for every command or test the parser meets.
/// It expands the keyword's grammar into a queue of expected arguments and
/// checks each following token against that queue. Matching a tag or match
/// type can push more arguments to the front, and remembers what was used
/// so dependencies can be checked once the command is complete.
use std::collections::VecDeque;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::sieve::error::ParseError;
use crate::sieve::grammar::descriptor::{
    Case, DependencyKind, Occurrence, ParamKind, Parameter, Requirement, MATCH_ANYTHING,
};
use crate::sieve::grammar::KeywordRegistry;
use crate::sieve::token::{Token, TokenType};

static TEST_PREDECESSORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:if|elsif|anyof|allof|not)$").unwrap());

static FOLLOWS_ANYTHING: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("(?i)^(?:{MATCH_ANYTHING})$")).unwrap());

static FOLLOWS_COMPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new("(?i)^(?:comparator)$").unwrap());

/// Remaining matches an argument allows. Only ever tightens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    One,
    Optional,
    Any,
    Some,
    Satisfied,
}

impl Quantifier {
    fn tighten(self) -> Self {
        match self {
            Self::One | Self::Optional | Self::Satisfied => Self::Satisfied,
            Self::Some | Self::Any => Self::Any,
        }
    }

    fn is_mandatory(self) -> bool {
        matches!(self, Self::One | Self::Some)
    }
}

impl From<Occurrence> for Quantifier {
    fn from(occurrence: Occurrence) -> Self {
        match occurrence {
            Occurrence::One => Self::One,
            Occurrence::Optional => Self::Optional,
            Occurrence::Any => Self::Any,
            Occurrence::Some => Self::Some,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hook {
    Require,
    MatchType,
    Comparator,
    AddressPart,
    Tag,
}

/// Value pattern of an argument. Vocabulary patterns are resolved against
/// the registry at match time so freshly activated extensions count.
#[derive(Debug, Clone)]
enum Pattern {
    Regex(String),
    MatchTypes,
    Comparators,
    AddressParts,
    Tests,
    RequireStrings,
}

impl Pattern {
    fn literal(regex: &str) -> Self {
        Self::Regex(regex.to_string())
    }

    fn source(&self, registry: &KeywordRegistry) -> String {
        match self {
            Self::Regex(regex) => regex.clone(),
            Self::MatchTypes => alternation(registry.match_types()),
            Self::Comparators => alternation(registry.comparators()),
            Self::AddressParts => alternation(registry.address_parts()),
            Self::Tests => alternation(registry.tests()),
            Self::RequireStrings => alternation(registry.require_strings()),
        }
    }
}

fn alternation<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let names: Vec<String> = names.map(regex::escape).collect();
    format!("({})", names.join("|"))
}

#[derive(Debug, Clone)]
struct Argument {
    kind: TokenType,
    occurrence: Quantifier,
    pattern: Pattern,
    case: Case,
    name: String,
    sub_args: Vec<Argument>,
    hook: Option<Hook>,
    follows: Regex,
}

impl Argument {
    fn new(kind: TokenType, pattern: Pattern, name: impl Into<String>) -> Self {
        Self {
            kind,
            occurrence: Quantifier::One,
            pattern,
            case: Case::Adhere,
            name: name.into(),
            sub_args: Vec::new(),
            hook: None,
            follows: FOLLOWS_ANYTHING.clone(),
        }
    }

    fn occurs(mut self, occurrence: Quantifier) -> Self {
        self.occurrence = occurrence;
        self
    }

    fn hook(mut self, hook: Hook) -> Self {
        self.hook = Some(hook);
        self
    }

    fn sub_args(mut self, sub_args: Vec<Argument>) -> Self {
        self.sub_args = sub_args;
        self
    }

    fn follows(mut self, follows: &Regex) -> Self {
        self.follows = follows.clone();
        self
    }

    fn case(mut self, case: Case) -> Self {
        self.case = case;
        self
    }

    /// Regex over the raw token text; the value lands in `one` or `two`.
    fn matcher(&self, registry: &mut KeywordRegistry, token: &Token) -> Result<Regex, ParseError> {
        let value = self.pattern.source(registry);
        let source = if self.kind.intersects(TokenType::STRING) {
            let flags = match self.case {
                Case::Ignore => "si",
                Case::Adhere => "s",
            };
            let multiline = format!(r"text:[^\n]*\n(?P<one>{value})\.\r?\n?");
            let quoted = format!(r#""(?P<two>{value})""#);
            format!("(?{flags})^(?:{multiline}|{quoted})$")
        } else if self.kind == TokenType::TAG {
            format!("(?si)^:(?P<one>{value})$")
        } else {
            format!("(?si)^(?P<one>{value})$")
        };
        registry
            .regex(&source)
            .map_err(|e| ParseError::new(token, format!("invalid grammar pattern: {e}")))
    }
}

/// Expands grammar parameters into expected arguments.
fn make_arguments(parameters: &[Parameter]) -> Vec<Argument> {
    let mut arguments = Vec::new();
    for param in parameters {
        let occurrence = Quantifier::from(param.occurrence);
        let name = param.display_name();
        let argument = match param.kind {
            ParamKind::AddressPart => {
                Argument::new(TokenType::TAG, Pattern::AddressParts, "address part")
                    .occurs(occurrence)
                    .hook(Hook::AddressPart)
                    .sub_args(make_arguments(&param.parameters))
                    .follows(&param.follows)
            }
            ParamKind::Block => {
                Argument::new(TokenType::BLOCK_START, Pattern::literal(r"\{"), "block")
                    .sub_args(make_arguments(&param.parameters))
            }
            ParamKind::Comparator => {
                Argument::new(TokenType::TAG, Pattern::literal("comparator"), "comparator")
                    .occurs(occurrence)
                    .sub_args(vec![comparator_string()])
                    .follows(&param.follows)
            }
            ParamKind::MatchType => Argument::new(TokenType::TAG, Pattern::MatchTypes, "match type")
                .occurs(occurrence)
                .hook(Hook::MatchType)
                .sub_args(make_arguments(&param.parameters))
                .follows(&param.follows),
            ParamKind::Number => Argument::new(TokenType::NUMBER, value_pattern(param), name)
                .occurs(occurrence)
                .follows(&param.follows),
            ParamKind::RequireStrings => {
                Argument::new(TokenType::STRING_LIST, Pattern::RequireStrings, name)
                    .occurs(occurrence)
                    .hook(Hook::Require)
            }
            ParamKind::String => Argument::new(TokenType::STRING, value_pattern(param), name)
                .occurs(occurrence)
                .case(param.case)
                .follows(&param.follows),
            ParamKind::StringList => {
                Argument::new(TokenType::STRING_LIST, value_pattern(param), name)
                    .occurs(occurrence)
                    .case(param.case)
                    .follows(&param.follows)
            }
            ParamKind::Tag => tag_argument(param),
            ParamKind::Test => Argument::new(TokenType::IDENTIFIER, Pattern::Tests, name)
                .occurs(occurrence)
                .sub_args(make_arguments(&param.parameters))
                .follows(&param.follows),
            ParamKind::TestList => {
                let open = Pattern::literal(r"\(");
                arguments.push(Argument::new(TokenType::LEFT_PARENTHESIS, open, name));
                Argument::new(TokenType::IDENTIFIER, Pattern::Tests, name)
                    .occurs(Quantifier::Some)
                    .sub_args(make_arguments(&param.parameters))
            }
        };
        arguments.push(argument);
    }
    arguments
}

fn comparator_string() -> Argument {
    let name = "comparator string";
    Argument::new(TokenType::STRING, Pattern::Comparators, name)
        .hook(Hook::Comparator)
        .follows(&FOLLOWS_COMPARATOR)
}

fn value_pattern(param: &Parameter) -> Pattern {
    Pattern::Regex(param.regex.clone())
}

fn tag_argument(param: &Parameter) -> Argument {
    Argument::new(TokenType::TAG, value_pattern(param), param.display_name())
        .occurs(param.occurrence.into())
        .hook(Hook::Tag)
        .sub_args(make_arguments(&param.parameters))
        .follows(&param.follows)
}

/// A requirement to check once the command is complete.
#[derive(Debug, Clone)]
struct Dependency {
    origin: DependencyKind,
    origin_name: String,
    requirement: Requirement,
}

#[derive(Debug, Clone)]
pub struct Semantics {
    arguments: VecDeque<Argument>,
    followup: TokenType,
    match_type: Option<String>,
    comparator: Option<String>,
    address_part: Option<String>,
    tags: Vec<String>,
    deps: Vec<Dependency>,
}

impl Semantics {
    /// Resolves `token` as a command or test and checks it may follow
    /// `prev`, the logical predecessor at the same nesting level.
    pub fn new(
        registry: &KeywordRegistry,
        token: &Token,
        prev: Option<&Token>,
    ) -> Result<Self, ParseError> {
        let command = token.text.to_lowercase();

        let (keyword, followup, is_test) = if let Some(keyword) = registry.command(&command) {
            (keyword, TokenType::SEMICOLON, false)
        } else if let Some(keyword) = registry.test(&command) {
            (keyword, TokenType::BLOCK_START, true)
        } else {
            return Err(ParseError::new(token, format!("unknown command {command}")));
        };

        if is_test {
            let Some(prev) = prev else {
                return Err(ParseError::new(
                    token,
                    format!("{command} may not appear as first command"),
                ));
            };
            if !TEST_PREDECESSORS.is_match(&prev.text) {
                return Err(ParseError::new(
                    token,
                    format!("{command} may not appear after {}", prev.text),
                ));
            }
        } else if prev.is_some() || matches!(command.as_str(), "elsif" | "else") {
            let Some(prev) = prev else {
                return Err(ParseError::new(
                    token,
                    format!("{command} cannot be the first token"),
                ));
            };
            let predecessor = prev.text.to_lowercase();
            let valid_after = match command.as_str() {
                "require" => predecessor == "require",
                "elsif" | "else" => matches!(predecessor.as_str(), "if" | "elsif"),
                _ => registry.is_command(&predecessor),
            };
            if !valid_after {
                return Err(ParseError::new(
                    token,
                    format!("{command} may not appear after {}", prev.text),
                ));
            }
        }

        let mut arguments: VecDeque<Argument> = make_arguments(&keyword.parameters).into();
        for tagged in registry.tagged_arguments_for(&command) {
            if tagged.parameter.kind == ParamKind::Tag {
                arguments.push_front(tag_argument(&tagged.parameter));
            }
        }

        Ok(Self {
            arguments,
            followup,
            match_type: None,
            comparator: None,
            address_part: None,
            tags: Vec::new(),
            deps: Vec::new(),
        })
    }

    /// Drops exhausted and skippable arguments until the head accepts the
    /// type of `token`.
    fn valid_type(&mut self, token: &Token) -> Result<(), ParseError> {
        while let Some(head) = self.arguments.front() {
            if head.occurrence != Quantifier::Satisfied {
                if token.is(head.kind) {
                    return Ok(());
                }
                if head.occurrence.is_mandatory() {
                    return Err(ParseError::expected(token, &[head.kind]));
                }
            }
            self.arguments.pop_front();
        }
        Err(ParseError::expected(token, &[self.followup]))
    }

    pub fn validate_token(
        &mut self,
        registry: &mut KeywordRegistry,
        token: &Token,
    ) -> Result<(), ParseError> {
        self.valid_type(token)?;

        for index in 0..self.arguments.len() {
            let arg = &self.arguments[index];
            if arg.occurrence == Quantifier::Satisfied || !token.is(arg.kind) {
                continue;
            }

            let matcher = arg.matcher(registry, token)?;
            if let Some(caps) = matcher.captures(&token.text) {
                let text = caps
                    .name("one")
                    .filter(|m| !m.as_str().is_empty())
                    .or_else(|| caps.name("two"))
                    .map_or("", |m| m.as_str())
                    .to_string();

                let arg = &mut self.arguments[index];
                arg.occurrence = arg.occurrence.tighten();
                let sub_args = arg.sub_args.clone();
                let hook = arg.hook;

                self.add_arguments(&text, sub_args);
                if let Some(hook) = hook {
                    self.invoke(hook, registry, token, &text)?;
                }
                return Ok(());
            }

            if arg.occurrence == Quantifier::One {
                return Err(ParseError::new(
                    token,
                    format!("{} {} where {} expected", token.kind, token.text, arg.name),
                ));
            }
        }

        Err(unexpected(token))
    }

    /// Queues the sub-arguments whose `follows` pattern accepts `identifier`,
    /// keeping their declared order.
    fn add_arguments(&mut self, identifier: &str, sub_args: Vec<Argument>) {
        for arg in sub_args.into_iter().rev() {
            if arg.follows.is_match(identifier) {
                self.arguments.push_front(arg);
            }
        }
    }

    fn add_dependencies(&mut self, origin: DependencyKind, name: &str, requires: &[Requirement]) {
        for requirement in requires {
            self.deps.push(Dependency {
                origin,
                origin_name: name.to_string(),
                requirement: requirement.clone(),
            });
        }
    }

    fn invoke(
        &mut self,
        hook: Hook,
        registry: &mut KeywordRegistry,
        token: &Token,
        value: &str,
    ) -> Result<(), ParseError> {
        match hook {
            Hook::Require => registry
                .activate(value)
                .map_err(|e| ParseError::new(token, e.to_string()))?,
            Hook::MatchType => {
                let name = value.to_lowercase();
                if let Some(keyword) = registry.match_type(&name) {
                    let args = make_arguments(&keyword.parameters);
                    let requires = keyword.requires.clone();
                    self.add_arguments(&name, args);
                    self.add_dependencies(DependencyKind::MatchType, &name, &requires);
                }
                self.match_type = Some(name);
            }
            Hook::AddressPart => {
                let name = value.to_lowercase();
                if let Some(keyword) = registry.address_part(&name) {
                    let args = make_arguments(&keyword.parameters);
                    let requires = keyword.requires.clone();
                    self.add_arguments(&name, args);
                    self.add_dependencies(DependencyKind::AddressPart, &name, &requires);
                }
                self.address_part = Some(name);
            }
            Hook::Comparator => {
                if let Some(keyword) = registry.comparator(value) {
                    let requires = keyword.requires.clone();
                    self.add_dependencies(DependencyKind::Comparator, value, &requires);
                }
                self.comparator = Some(value.to_string());
            }
            Hook::Tag => {
                let name = value.to_lowercase();
                if let Some(tagged) = registry.tagged_argument(&name) {
                    let requires = tagged.parameter.requires.clone();
                    self.add_dependencies(DependencyKind::Tag, &name, &requires);
                }
                self.tags.push(name);
            }
        }
        Ok(())
    }

    /// Turns the head argument into a repeatable string matcher for the
    /// items of a bracketed list.
    pub fn start_string_list(&mut self, token: &Token) -> Result<(), ParseError> {
        self.valid_type(token)?;
        if let Some(head) = self.arguments.front_mut() {
            head.kind = TokenType::STRING;
            head.occurrence = Quantifier::Some;
        }
        Ok(())
    }

    /// After a comma another item is mandatory.
    pub fn continue_string_list(&mut self) {
        if let Some(head) = self.arguments.front_mut() {
            *head = Argument {
                occurrence: Quantifier::Some,
                ..head.clone()
            };
        }
    }

    pub fn end_string_list(&mut self) {
        self.arguments.pop_front();
    }

    /// Checks that nothing mandatory is left and that every recorded
    /// dependency is met. `token` is the one ending the command or test.
    pub fn done(&self, token: &Token) -> Result<(), ParseError> {
        if let Some(arg) = self.arguments.iter().find(|a| a.occurrence.is_mandatory()) {
            return Err(ParseError::expected(token, &[arg.kind]));
        }

        for dep in &self.deps {
            let values: Vec<&str> = match dep.requirement.kind {
                DependencyKind::AddressPart => self.address_part.as_deref().into_iter().collect(),
                DependencyKind::MatchType => self.match_type.as_deref().into_iter().collect(),
                DependencyKind::Comparator => self.comparator.as_deref().into_iter().collect(),
                DependencyKind::Tag => self.tags.iter().map(String::as_str).collect(),
            };
            if !values.iter().any(|v| dep.requirement.pattern.is_match(v)) {
                return Err(ParseError::new(
                    token,
                    format!(
                        "{} {} requires use of {} {}",
                        dep.origin, dep.origin_name, dep.requirement.kind, dep.requirement.name
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Occurrence of every queued argument, front first.
    pub fn quantifiers(&self) -> Vec<Quantifier> {
        self.arguments.iter().map(|a| a.occurrence).collect()
    }
}

fn unexpected(token: &Token) -> ParseError {
    ParseError::new(token, format!("unexpected {} {}", token.kind, token.text))
}
