/// SIEVE token model (RFC 5228 lexical elements).
///
/// Token types are bit flags so a token can be tested against a union of
/// types with a single `&`.
use std::fmt;
use std::ops::BitOr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenType(u32);

impl TokenType {
    pub const UNKNOWN: Self = Self(0x0000);
    pub const SCRIPT_END: Self = Self(0x0001);
    pub const LEFT_BRACKET: Self = Self(0x0002);
    pub const RIGHT_BRACKET: Self = Self(0x0004);
    pub const BLOCK_START: Self = Self(0x0008);
    pub const BLOCK_END: Self = Self(0x0010);
    pub const LEFT_PARENTHESIS: Self = Self(0x0020);
    pub const RIGHT_PARENTHESIS: Self = Self(0x0040);
    pub const COMMA: Self = Self(0x0080);
    pub const SEMICOLON: Self = Self(0x0100);
    pub const WHITESPACE: Self = Self(0x0200);
    pub const TAG: Self = Self(0x0400);
    pub const QUOTED_STRING: Self = Self(0x0800);
    pub const NUMBER: Self = Self(0x1000);
    pub const COMMENT: Self = Self(0x2000);
    pub const MULTILINE_STRING: Self = Self(0x4000);
    pub const IDENTIFIER: Self = Self(0x8000);

    /// Quoted or multi-line string.
    pub const STRING: Self = Self::QUOTED_STRING.union(Self::MULTILINE_STRING);
    /// A single string or the opening bracket of a list.
    pub const STRING_LIST: Self = Self::STRING.union(Self::LEFT_BRACKET);
    /// A single test or the opening parenthesis of a list.
    pub const TEST_LIST: Self = Self::IDENTIFIER.union(Self::LEFT_PARENTHESIS);
    /// Tokens without grammatical meaning, routed around the grammar driver.
    pub const PASSTHROUGH: Self = Self::WHITESPACE.union(Self::COMMENT);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if the two masks share at least one type.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::IDENTIFIER => "identifier",
            Self::WHITESPACE => "whitespace",
            Self::QUOTED_STRING => "quoted string",
            Self::TAG => "tag",
            Self::SEMICOLON => "semicolon",
            Self::LEFT_BRACKET => "left bracket",
            Self::RIGHT_BRACKET => "right bracket",
            Self::BLOCK_START => "block start",
            Self::BLOCK_END => "block end",
            Self::LEFT_PARENTHESIS => "left parenthesis",
            Self::RIGHT_PARENTHESIS => "right parenthesis",
            Self::COMMA => "comma",
            Self::NUMBER => "number",
            Self::COMMENT => "comment",
            Self::MULTILINE_STRING => "multiline string",
            Self::SCRIPT_END => "script end",
            Self::STRING => "string",
            Self::STRING_LIST => "string list",
            _ => "unknown token",
        }
    }
}

impl BitOr for TokenType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lexeme with its exact source text and 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenType,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenType, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    /// True if this token's type is any of the types in `mask`.
    pub fn is(&self, mask: TokenType) -> bool {
        self.kind.intersects(mask)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Diagnostic rendering: `<text> type:<name> line:<n>`.
    pub fn dump(&self) -> String {
        let text = escape(&self.text);
        format!("<{text}> type:{} line:{}", self.kind, self.line)
    }
}

/// Makes line breaks and tabs visible.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_masks() {
        let quoted = Token::new(TokenType::QUOTED_STRING, "\"a\"", 1);
        assert!(quoted.is(TokenType::STRING));
        assert!(quoted.is(TokenType::STRING_LIST));
        assert!(!quoted.is(TokenType::TEST_LIST));

        let bracket = Token::new(TokenType::LEFT_BRACKET, "[", 1);
        assert!(bracket.is(TokenType::STRING_LIST));
        assert!(!bracket.is(TokenType::STRING));
    }

    #[test]
    fn test_unknown_matches_nothing() {
        let token = Token::new(TokenType::UNKNOWN, "@", 3);
        assert!(!token.is(TokenType::UNKNOWN));
        assert!(!token.is(TokenType::SCRIPT_END | TokenType::IDENTIFIER));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(TokenType::STRING_LIST.name(), "string list");
        assert_eq!(TokenType::TEST_LIST.name(), "unknown token");
        let mixed = TokenType::COMMA | TokenType::SEMICOLON;
        assert_eq!(mixed.name(), "unknown token");
    }

    #[test]
    fn test_dump_escapes_control_characters() {
        let token = Token::new(TokenType::COMMENT, "# hi\r\n", 2);
        assert_eq!(token.dump(), "<# hi\\r\\n> type:comment line:2");
    }
}
