//! Lexer utilities and tokenization for mechanism sources.

pub mod tokenizer;
pub mod winnow;

pub use tokenizer::{lex, lex_file, Keyword, LexerError, Token, TokenKind};
