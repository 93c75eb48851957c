/// Recursive descent SIEVE parser.
///
/// Drives the scanner, checks every command and test against the keyword
/// registry and records all tokens, including whitespace and comments, in a
/// lossless parse tree.
use std::path::PathBuf;

use tracing::debug;

use crate::sieve::error::{Error, GrammarError, ParseError};
use crate::sieve::grammar::KeywordRegistry;
use crate::sieve::lexer::Scanner;
use crate::sieve::semantics::Semantics;
use crate::sieve::token::{Token, TokenType};
use crate::sieve::tree::{NodeId, ParseTree, ROOT};

/// Deepest nesting of blocks and tests a script may use.
pub const MAX_NESTING: usize = 128;

/// How a command sequence ended.
#[derive(Debug, Clone, PartialEq)]
enum Boundary {
    /// The script is exhausted; carries the script-end token.
    ScriptEnd(Token),
    /// Something other than a command follows, e.g. a closing brace.
    Open,
}

#[derive(Debug, Clone)]
pub struct Parser {
    pristine: KeywordRegistry,
    registry: KeywordRegistry,
    tree: ParseTree,
}

impl Parser {
    /// `enabled` restricts the built-in extensions (`None` loads all of
    /// them); `custom` names extra extension resources.
    pub fn new(enabled: Option<&[String]>, custom: &[PathBuf]) -> Result<Self, GrammarError> {
        Ok(Self::with_registry(KeywordRegistry::new(enabled, custom)?))
    }

    pub fn with_registry(registry: KeywordRegistry) -> Self {
        Self {
            registry: registry.clone(),
            pristine: registry,
            tree: ParseTree::default(),
        }
    }

    /// Parses `script` with a fresh copy of the registry. On failure the
    /// partial tree stays available.
    pub fn parse(&mut self, script: &str) -> Result<(), ParseError> {
        debug!(bytes = script.len(), "parsing script");
        let mut run = Run {
            scanner: Scanner::new(script),
            tree: ParseTree::default(),
            registry: self.pristine.clone(),
            depth: 0,
        };
        let result = run.script();
        self.tree = run.tree;
        self.registry = run.registry;
        match &result {
            Ok(()) => debug!(nodes = self.tree.len(), "script parsed"),
            Err(e) => debug!(error = %e, "script rejected"),
        }
        result
    }

    pub fn parse_tree(&self) -> &ParseTree {
        &self.tree
    }

    pub fn dump_parse_tree(&self) -> String {
        self.tree.dump()
    }

    /// The parsed script, reassembled from the tree.
    pub fn script_text(&self) -> String {
        self.tree.text()
    }

    /// Registry state after the most recent parse.
    pub fn registry(&self) -> &KeywordRegistry {
        &self.registry
    }
}

/// Checks `script` against the base grammar and every built-in extension.
pub fn validate(script: &str) -> Result<(), Error> {
    let mut parser = Parser::new(None, &[])?;
    parser.parse(script)?;
    Ok(())
}

/// State of a single parse.
struct Run {
    scanner: Scanner,
    tree: ParseTree,
    registry: KeywordRegistry,
    depth: usize,
}

impl Run {
    fn script(&mut self) -> Result<(), ParseError> {
        match self.commands(ROOT)? {
            Boundary::ScriptEnd(_) => Ok(()),
            Boundary::Open => {
                let token = self.next_token();
                Err(ParseError::expected(&token, &[TokenType::SCRIPT_END]))
            }
        }
    }

    /// Enters one more level of nesting at `token`. An error aborts the
    /// parse, so only successful levels are left again.
    fn descend(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.depth == MAX_NESTING {
            return Err(ParseError::new(
                token,
                format!("nesting deeper than {MAX_NESTING} levels"),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn next_token(&mut self) -> Token {
        self.scanner.next_token(&mut self.tree)
    }

    /// The logical predecessor of the next child of `parent`: the last
    /// significant sibling, or `parent` itself after an opening delimiter.
    fn prev_token(&self, parent: NodeId) -> Option<Token> {
        let children = self.tree.children(parent)?;
        for &child in children.iter().rev() {
            let Some(prev) = self.tree.node(child) else {
                continue;
            };
            if prev.is(TokenType::PASSTHROUGH) {
                continue;
            }
            if prev.is(TokenType::BLOCK_START | TokenType::COMMA | TokenType::LEFT_PARENTHESIS) {
                break;
            }
            return Some(prev.clone());
        }
        self.tree.node(parent).cloned()
    }

    fn commands(&mut self, parent: NodeId) -> Result<Boundary, ParseError> {
        while self.scanner.next_token_is(TokenType::IDENTIFIER) {
            let token = self.next_token();
            let prev = self.prev_token(parent);
            let mut semantics = Semantics::new(&self.registry, &token, prev.as_ref())?;

            let node = self.tree.push(parent, token);
            self.arguments(node, &mut semantics)?;

            let token = self.next_token();
            if token.is(TokenType::SEMICOLON) {
                semantics.done(&token)?;
                self.tree.push(node, token);
                continue;
            }

            semantics.validate_token(&mut self.registry, &token)?;
            if !token.is(TokenType::BLOCK_START) {
                return Err(ParseError::expected(&token, &[TokenType::SEMICOLON]));
            }
            self.descend(&token)?;
            self.tree.push(node, token);
            self.block(node)?;
            self.depth -= 1;
        }

        if self.scanner.next_token_is(TokenType::SCRIPT_END) {
            // consuming it attaches any trailing whitespace and comments
            let token = self.next_token();
            self.registry.validate_requires(&token)?;
            return Ok(Boundary::ScriptEnd(token));
        }
        Ok(Boundary::Open)
    }

    fn arguments(&mut self, parent: NodeId, semantics: &mut Semantics) -> Result<(), ParseError> {
        loop {
            let single = TokenType::NUMBER | TokenType::TAG;
            if self.scanner.next_token_is(single) {
                let token = self.next_token();
                semantics.validate_token(&mut self.registry, &token)?;
                self.tree.push(parent, token);
            } else if self.scanner.next_token_is(TokenType::STRING_LIST) {
                self.string_list(parent, semantics)?;
            } else {
                break;
            }
        }

        if self.scanner.next_token_is(TokenType::TEST_LIST) {
            self.test_list(parent, semantics)?;
        }
        Ok(())
    }

    fn string_list(&mut self, parent: NodeId, semantics: &mut Semantics) -> Result<(), ParseError> {
        if !self.scanner.next_token_is(TokenType::LEFT_BRACKET) {
            return self.string(parent, semantics);
        }

        let token = self.next_token();
        semantics.start_string_list(&token)?;
        self.tree.push(parent, token);

        if self.scanner.next_token_is(TokenType::RIGHT_BRACKET) {
            let token = self.next_token();
            self.tree.push(parent, token);
            semantics.end_string_list();
            return Ok(());
        }

        loop {
            self.string(parent, semantics)?;

            let token = self.next_token();
            if !token.is(TokenType::COMMA | TokenType::RIGHT_BRACKET) {
                return Err(ParseError::expected(
                    &token,
                    &[TokenType::COMMA, TokenType::RIGHT_BRACKET],
                ));
            }
            let closed = token.is(TokenType::RIGHT_BRACKET);
            if !closed {
                semantics.continue_string_list();
            }
            self.tree.push(parent, token);
            if closed {
                break;
            }
        }

        semantics.end_string_list();
        Ok(())
    }

    fn string(&mut self, parent: NodeId, semantics: &mut Semantics) -> Result<(), ParseError> {
        let token = self.next_token();
        semantics.validate_token(&mut self.registry, &token)?;
        self.tree.push(parent, token);
        Ok(())
    }

    fn test_list(&mut self, parent: NodeId, semantics: &mut Semantics) -> Result<(), ParseError> {
        if !self.scanner.next_token_is(TokenType::LEFT_PARENTHESIS) {
            return self.test(parent, semantics);
        }

        let token = self.next_token();
        semantics.validate_token(&mut self.registry, &token)?;
        self.tree.push(parent, token);

        loop {
            self.test(parent, semantics)?;

            let token = self.next_token();
            if !token.is(TokenType::COMMA | TokenType::RIGHT_PARENTHESIS) {
                return Err(ParseError::expected(
                    &token,
                    &[TokenType::COMMA, TokenType::RIGHT_PARENTHESIS],
                ));
            }
            let closed = token.is(TokenType::RIGHT_PARENTHESIS);
            self.tree.push(parent, token);
            if closed {
                return Ok(());
            }
        }
    }

    fn test(&mut self, parent: NodeId, semantics: &mut Semantics) -> Result<(), ParseError> {
        let token = self.next_token();
        semantics.validate_token(&mut self.registry, &token)?;
        self.descend(&token)?;

        let prev = self.prev_token(parent);
        let mut test = Semantics::new(&self.registry, &token, prev.as_ref())?;
        let node = self.tree.push(parent, token);

        self.arguments(node, &mut test)?;

        let next = self.scanner.peek_next_token().clone();
        test.done(&next)?;
        self.depth -= 1;
        Ok(())
    }

    fn block(&mut self, parent: NodeId) -> Result<(), ParseError> {
        if let Boundary::ScriptEnd(token) = self.commands(parent)? {
            return Err(ParseError::expected(&token, &[TokenType::BLOCK_END]));
        }

        let token = self.next_token();
        if !token.is(TokenType::BLOCK_END) {
            return Err(ParseError::expected(&token, &[TokenType::BLOCK_END]));
        }
        self.tree.push(parent, token);
        Ok(())
    }
}
