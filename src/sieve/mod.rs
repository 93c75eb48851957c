pub mod error;
pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod semantics;
pub mod token;
pub mod tree;
