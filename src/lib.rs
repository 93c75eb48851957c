//! Lossless, extension-aware SIEVE (RFC 5228) parsing and validation.
//!
//! ```
//! use sieve_syntax::Parser;
//!
//! let script = concat!(
//!     "require \"fileinto\";\n",
//!     "if header :contains \"Subject\" \"spam\" {\n",
//!     "  fileinto \"Junk\";\n",
//!     "}\n",
//! );
//! let mut parser = Parser::new(None, &[]).unwrap();
//! parser.parse(script).unwrap();
//! assert_eq!(parser.script_text(), script);
//! ```

pub mod sieve;

pub use sieve::error::{Error, GrammarError, ParseError};
pub use sieve::grammar::KeywordRegistry;
pub use sieve::parser::{validate, Parser};
pub use sieve::token::{Token, TokenType};
pub use sieve::tree::{NodeId, ParseTree};
