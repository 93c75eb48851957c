/// SIEVE script scanner (RFC 5228).
///
/// Tokenizes the whole script up front by trying an ordered table of
/// patterns at the current offset. Whitespace and comments are kept as
/// tokens so the parse tree can reproduce the input byte for byte.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::sieve::token::{Token, TokenType};

/// Tried in order; the first pattern matching at the current offset wins.
const TOKEN_PATTERNS: &[(TokenType, &str)] = &[
    (TokenType::LEFT_BRACKET, r"\["),
    (TokenType::RIGHT_BRACKET, r"\]"),
    (TokenType::BLOCK_START, r"\{"),
    (TokenType::BLOCK_END, r"\}"),
    (TokenType::LEFT_PARENTHESIS, r"\("),
    (TokenType::RIGHT_PARENTHESIS, r"\)"),
    (TokenType::COMMA, r","),
    (TokenType::SEMICOLON, r";"),
    (TokenType::WHITESPACE, r"[ \r\n\t]+"),
    (TokenType::TAG, r":[[:alpha:]_][[:alnum:]_]*\b"),
    // Escaped quotes are allowed; a backslash only escapes when it is not
    // itself escaped.
    (
        TokenType::QUOTED_STRING,
        r#""(?:(?:[^"]*[^"\\])?(?:\\\\)*\\")*[^"]*""#,
    ),
    (TokenType::NUMBER, r"[[:digit:]]+[KMG]?\b"),
    (
        TokenType::COMMENT,
        r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/|#[^\r\n]*\r?(?:\n|$)",
    ),
    (
        TokenType::MULTILINE_STRING,
        r"text:[ \t]*(?:#[^\r\n]*)?\r?\n(?:\.[^\r\n]+\r?\n|[^.][^\r\n]*\r?\n)*\.\r?(?:\n|$)",
    ),
    (TokenType::IDENTIFIER, r"[[:alpha:]_][[:alnum:]_]*\b"),
    (TokenType::UNKNOWN, r"[^ \r\n\t]+"),
];

static COMPILED_PATTERNS: Lazy<Vec<(TokenType, Regex)>> = Lazy::new(|| {
    TOKEN_PATTERNS
        .iter()
        .map(|&(kind, pattern)| {
            let regex = Regex::new(&format!("^(?:{pattern})")).unwrap();
            (kind, regex)
        })
        .collect()
});

/// Receives whitespace and comment tokens skipped by [`Scanner::next_token`].
pub trait Passthrough {
    fn passthrough(&mut self, token: Token);
}

impl<F: FnMut(Token)> Passthrough for F {
    fn passthrough(&mut self, token: Token) {
        self(token)
    }
}

/// Splits a script into tokens.
///
/// Scanning stops right after the first unknown lexeme; otherwise the
/// stream is terminated by a single script-end token.
pub fn tokenize(script: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while pos < script.len() {
        let rest = &script[pos..];
        let Some((kind, len)) = COMPILED_PATTERNS
            .iter()
            .find_map(|(kind, re)| re.find(rest).map(|m| (*kind, m.end())))
            .filter(|&(_, len)| len > 0)
        else {
            tokens.push(Token::new(TokenType::UNKNOWN, "", line));
            return tokens;
        };

        let text = &rest[..len];
        tokens.push(Token::new(kind, text, line));
        if kind == TokenType::UNKNOWN {
            return tokens;
        }

        pos += len;
        line += text.matches('\n').count();
    }

    tokens.push(Token::new(TokenType::SCRIPT_END, "", line));
    tokens
}

/// Token stream with passthrough-skipping lookahead.
#[derive(Debug, Clone)]
pub struct Scanner {
    tokens: Vec<Token>,
    pos: usize,
}

impl Scanner {
    pub fn new(script: &str) -> Self {
        Self {
            tokens: tokenize(script),
            pos: 0,
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    // The stream always ends with script-end or unknown; reads past the end
    // keep returning that final token.
    fn token_at(&self, index: usize) -> &Token {
        &self.tokens[index.min(self.tokens.len() - 1)]
    }

    /// The most recently consumed token.
    pub fn current_token(&self) -> Option<&Token> {
        self.pos.checked_sub(1).map(|i| self.token_at(i))
    }

    pub fn current_token_is(&self, mask: TokenType) -> bool {
        self.current_token().is_some_and(|t| t.is(mask))
    }

    /// The next significant token, without consuming anything.
    pub fn peek_next_token(&self) -> &Token {
        let mut index = self.pos;
        loop {
            let token = self.token_at(index);
            if !token.is(TokenType::PASSTHROUGH) || index >= self.tokens.len() {
                return token;
            }
            index += 1;
        }
    }

    pub fn next_token_is(&self, mask: TokenType) -> bool {
        self.peek_next_token().is(mask)
    }

    /// Consumes up to and including the next significant token, handing
    /// every whitespace and comment token on the way to `sink`.
    pub fn next_token(&mut self, sink: &mut impl Passthrough) -> Token {
        loop {
            let token = self.token_at(self.pos).clone();
            self.pos += 1;
            if !token.is(TokenType::PASSTHROUGH) || self.pos > self.tokens.len() {
                return token;
            }
            sink.passthrough(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(script: &str) -> Vec<TokenType> {
        tokenize(script).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = tokenize("require \"fileinto\";");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenType::IDENTIFIER,
                TokenType::WHITESPACE,
                TokenType::QUOTED_STRING,
                TokenType::SEMICOLON,
                TokenType::SCRIPT_END,
            ]
        );
        assert_eq!(tokens[2].text, "\"fileinto\"");
    }

    #[test]
    fn test_tags_and_strings() {
        let tokens = tokenize("header :contains \"Subject\" \"SPAM\"");
        assert_eq!(tokens[2].kind, TokenType::TAG);
        assert_eq!(tokens[2].text, ":contains");
    }

    #[test]
    fn test_escaped_quotes() {
        let tokens = tokenize(r#""a\"b" "c\\""#);
        assert_eq!(tokens[0].text, r#""a\"b""#);
        assert_eq!(tokens[2].text, r#""c\\""#);
        assert_eq!(tokens[3].kind, TokenType::SCRIPT_END);
    }

    #[test]
    fn test_comments_keep_their_text() {
        let tokens = tokenize("# Filter: test\nkeep; /* a ** b */");
        assert_eq!(tokens[0].kind, TokenType::COMMENT);
        assert_eq!(tokens[0].text, "# Filter: test\n");
        assert_eq!(tokens[4].text, "/* a ** b */");
    }

    #[test]
    fn test_multiline_before_identifier() {
        let tokens = tokenize("text:\nhello\n..dotted\n.\n");
        assert_eq!(tokens[0].kind, TokenType::MULTILINE_STRING);
        assert_eq!(tokens[0].text, "text:\nhello\n..dotted\n.\n");

        // a bare `text` is still an identifier
        assert_eq!(kinds("text")[0], TokenType::IDENTIFIER);
    }

    #[test]
    fn test_number_with_suffix() {
        assert_eq!(tokenize("100K")[0].text, "100K");
        assert_eq!(kinds("100x"), vec![TokenType::UNKNOWN]);
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("keep;\n\nstop;");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[3].line, 3);
    }

    #[test]
    fn test_stops_at_unknown_lexeme() {
        let tokens = tokenize("keep; @bad stop;");
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenType::UNKNOWN));
        assert_eq!(tokens.last().map(|t| t.text.as_str()), Some("@bad"));
        assert!(!tokens.iter().any(|t| t.is(TokenType::SCRIPT_END)));
    }

    #[test]
    fn test_lookahead_skips_passthrough() {
        let mut scanner = Scanner::new("  # c\n keep");
        assert!(scanner.next_token_is(TokenType::IDENTIFIER));
        assert!(scanner.current_token().is_none());

        let mut skipped = Vec::new();
        let token = scanner.next_token(&mut |t: Token| skipped.push(t.text));
        assert_eq!(token.text, "keep");
        assert_eq!(skipped, vec!["  ", "# c\n", " "]);
        assert!(scanner.current_token_is(TokenType::IDENTIFIER));
        assert!(scanner.next_token_is(TokenType::SCRIPT_END));
    }
}
