//! Front end of the mechanism compiler: a winnow based lexer and a
//! recursive descent parser that builds the `mech_core` AST.

pub mod lexer;
pub mod parser;

pub use lexer::{lex, Keyword, LexerError, Token, TokenKind};
pub use parser::{parse, parse_source, ModParser};
