use super::winnow::{
    backtrack_err, is_ident_continue, is_ident_start, parse_number, parse_string_literal,
    rest_of_line, verbatim_body, ws, MULTI_PUNCT, SINGLE_PUNCT,
};
use mech_core::span::{FileId, Span};
use std::fmt;
use thiserror::Error;
use winnow::combinator::alt;
use winnow::error::{ContextError, ErrMode};
use winnow::token::take_while;
use winnow::{ModalResult, Parser};

macro_rules! keywords {
    ($($variant:ident => $lexeme:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant,)*
        }

        impl Keyword {
            pub fn from_lexeme(lexeme: &str) -> Option<Self> {
                match lexeme {
                    $($lexeme => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $lexeme,)*
                }
            }
        }
    };
}

keywords! {
    Neuron => "NEURON",
    Parameter => "PARAMETER",
    State => "STATE",
    Assigned => "ASSIGNED",
    Constant => "CONSTANT",
    Units => "UNITS",
    Independent => "INDEPENDENT",
    Partial => "PARTIAL",
    Match => "MATCH",
    Initial => "INITIAL",
    Breakpoint => "BREAKPOINT",
    Constructor => "CONSTRUCTOR",
    Destructor => "DESTRUCTOR",
    Before => "BEFORE",
    After => "AFTER",
    Derivative => "DERIVATIVE",
    Kinetic => "KINETIC",
    Linear => "LINEAR",
    NonLinear => "NONLINEAR",
    Discrete => "DISCRETE",
    Procedure => "PROCEDURE",
    Function => "FUNCTION",
    FunctionTable => "FUNCTION_TABLE",
    NetReceive => "NET_RECEIVE",
    Suffix => "SUFFIX",
    PointProcess => "POINT_PROCESS",
    Range => "RANGE",
    Global => "GLOBAL",
    UseIon => "USEION",
    Read => "READ",
    Write => "WRITE",
    Valence => "VALENCE",
    NonspecificCurrent => "NONSPECIFIC_CURRENT",
    ElectrodeCurrent => "ELECTRODE_CURRENT",
    Pointer => "POINTER",
    BbcorePointer => "BBCOREPOINTER",
    ThreadSafe => "THREADSAFE",
    Represents => "REPRESENTS",
    Local => "LOCAL",
    If => "IF",
    Else => "ELSE",
    While => "WHILE",
    From => "FROM",
    To => "TO",
    By => "BY",
    Solve => "SOLVE",
    Method => "METHOD",
    SteadyState => "STEADYSTATE",
    Conserve => "CONSERVE",
    Compartment => "COMPARTMENT",
    Lag => "LAG",
    MutexLock => "MUTEXLOCK",
    MutexUnlock => "MUTEXUNLOCK",
    Plot => "PLOT",
    Vs => "VS",
}

impl Keyword {
    /// Keywords that can only open a top-level block.
    pub fn is_top_level(&self) -> bool {
        matches!(
            self,
            Keyword::Neuron
                | Keyword::Parameter
                | Keyword::State
                | Keyword::Assigned
                | Keyword::Constant
                | Keyword::Units
                | Keyword::Independent
                | Keyword::Partial
                | Keyword::Match
                | Keyword::Initial
                | Keyword::Breakpoint
                | Keyword::Constructor
                | Keyword::Destructor
                | Keyword::Before
                | Keyword::After
                | Keyword::Derivative
                | Keyword::Kinetic
                | Keyword::Linear
                | Keyword::NonLinear
                | Keyword::Discrete
                | Keyword::Procedure
                | Keyword::Function
                | Keyword::FunctionTable
                | Keyword::NetReceive
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.lexeme == symbol
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    pub fn keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenKind::Keyword(keyword) => Some(keyword),
            _ => None,
        }
    }

    pub fn line(&self) -> u32 {
        self.span.line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    /// `m'`, `x''`: the lexeme keeps its quotes.
    PrimeName,
    Integer,
    Real,
    /// Lexeme includes the surrounding quotes.
    StringLiteral,
    Symbol,
    Keyword(Keyword),
    /// Text between `VERBATIM` and `ENDVERBATIM`.
    Verbatim,
    /// Trimmed text following `TITLE`.
    Title,
}

#[derive(Debug, Error)]
pub enum LexerError {
    #[error("lexer error: {0}")]
    Message(String),
    #[error("lexer error at {line}:{column}: {message}")]
    At {
        message: String,
        line: u32,
        column: u32,
        offset: usize,
    },
}

impl LexerError {
    /// Location of the failure, when known.
    pub fn span(&self) -> Option<Span> {
        match self {
            LexerError::Message(_) => None,
            LexerError::At {
                line,
                column,
                offset,
                ..
            } => Some(Span::new(0, *offset as u32, *offset as u32 + 1, *line, *column)),
        }
    }
}

impl From<ContextError> for LexerError {
    fn from(err: ContextError) -> Self {
        LexerError::Message(err.to_string())
    }
}

impl From<ErrMode<ContextError>> for LexerError {
    fn from(err: ErrMode<ContextError>) -> Self {
        match err {
            ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => LexerError::from(ctx),
            ErrMode::Incomplete(_) => LexerError::Message("incomplete input".to_string()),
        }
    }
}

/// Byte offset to 1-based line/column.
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    fn position(&self, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let column = offset - self.line_starts[line] + 1;
        (line as u32 + 1, column as u32)
    }

    fn span(&self, file: FileId, start: usize, end: usize) -> Span {
        let (line, column) = self.position(start);
        Span::new(file, start as u32, end as u32, line, column)
    }

    fn error(&self, offset: usize, err: ErrMode<ContextError>, fallback: &str) -> LexerError {
        let (line, column) = self.position(offset);
        let message = match LexerError::from(err) {
            LexerError::Message(message) if !message.trim().is_empty() => message,
            _ => fallback.to_string(),
        };
        LexerError::At {
            message,
            line,
            column,
            offset,
        }
    }
}

pub fn lex(source: &str) -> Result<Vec<Token>, LexerError> {
    lex_file(source, 0)
}

pub fn lex_file(source: &str, file: FileId) -> Result<Vec<Token>, LexerError> {
    let index = LineIndex::new(source);
    let mut input = source;
    let mut tokens = Vec::new();
    while !input.is_empty() {
        let before_ws = source.len() - input.len();
        ws.parse_next(&mut input)
            .map_err(|err| index.error(before_ws, err, "unterminated COMMENT block"))?;
        if input.is_empty() {
            break;
        }
        let start = source.len() - input.len();
        let kind = token_parser()
            .parse_next(&mut input)
            .map_err(|err| index.error(start, err, "unexpected character"))?;
        let mut end = source.len() - input.len();
        let mut lexeme = source[start..end].to_string();
        let kind = match kind {
            TokenKind::Ident if lexeme == "TITLE" => {
                let title = rest_of_line(&mut input)
                    .map_err(|err| index.error(start, err, "malformed TITLE"))?;
                end = source.len() - input.len();
                lexeme = title.trim().to_string();
                TokenKind::Title
            }
            TokenKind::Ident if lexeme == "VERBATIM" => {
                let body = verbatim_body(&mut input).map_err(|err| {
                    index.error(start, err, "VERBATIM block without ENDVERBATIM")
                })?;
                end = source.len() - input.len();
                lexeme = body.to_string();
                TokenKind::Verbatim
            }
            TokenKind::Ident => match Keyword::from_lexeme(&lexeme) {
                Some(keyword) => TokenKind::Keyword(keyword),
                None => TokenKind::Ident,
            },
            other => other,
        };
        tokens.push(Token {
            kind,
            lexeme,
            span: index.span(file, start, end),
        });
    }
    Ok(tokens)
}

fn token_parser<'a>() -> impl Parser<&'a str, TokenKind, ErrMode<ContextError>> {
    alt((string_token, number_token, ident_token, symbol_token))
}

fn string_token(input: &mut &str) -> ModalResult<TokenKind> {
    parse_string_literal(input).map(|_| TokenKind::StringLiteral)
}

fn number_token(input: &mut &str) -> ModalResult<TokenKind> {
    parse_number(input).map(|real| {
        if real {
            TokenKind::Real
        } else {
            TokenKind::Integer
        }
    })
}

fn ident_token(input: &mut &str) -> ModalResult<TokenKind> {
    (
        take_while(1, is_ident_start),
        take_while(0.., is_ident_continue),
    )
        .parse_next(input)?;
    let primes: &str = take_while(0.., |c: char| c == '\'').parse_next(input)?;
    if primes.is_empty() {
        Ok(TokenKind::Ident)
    } else {
        Ok(TokenKind::PrimeName)
    }
}

fn symbol_token(input: &mut &str) -> ModalResult<TokenKind> {
    alt((
        multi_punct_token.map(|_| TokenKind::Symbol),
        single_punct_token.map(|_| TokenKind::Symbol),
    ))
    .parse_next(input)
}

fn multi_punct_token(input: &mut &str) -> ModalResult<&'static str> {
    for sym in MULTI_PUNCT {
        if let Some(rest) = input.strip_prefix(sym) {
            *input = rest;
            return Ok(*sym);
        }
    }
    Err(backtrack_err())
}

fn single_punct_token(input: &mut &str) -> ModalResult<char> {
    match input.chars().next() {
        Some(c) if SINGLE_PUNCT.contains(c) => {
            *input = &input[c.len_utf8()..];
            Ok(c)
        }
        _ => Err(backtrack_err()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        lex(source)
            .expect("lexes")
            .into_iter()
            .map(|token| (token.kind, token.lexeme))
            .collect()
    }

    #[test]
    fn numbers_identifiers_and_primes() {
        assert_eq!(
            kinds("m' = .5e-3 * 2 + x1"),
            vec![
                (TokenKind::PrimeName, "m'".to_string()),
                (TokenKind::Symbol, "=".to_string()),
                (TokenKind::Real, ".5e-3".to_string()),
                (TokenKind::Symbol, "*".to_string()),
                (TokenKind::Integer, "2".to_string()),
                (TokenKind::Symbol, "+".to_string()),
                (TokenKind::Ident, "x1".to_string()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let source = "NEURON : trailing\n? another\nCOMMENT\nanything { here\nENDCOMMENT\n{ }";
        assert_eq!(
            kinds(source),
            vec![
                (TokenKind::Keyword(Keyword::Neuron), "NEURON".to_string()),
                (TokenKind::Symbol, "{".to_string()),
                (TokenKind::Symbol, "}".to_string()),
            ]
        );
    }

    #[test]
    fn title_and_verbatim_are_single_tokens() {
        let tokens = lex("TITLE  hh channel  \nVERBATIM\n  x++;\nENDVERBATIM").expect("lexes");
        assert_eq!(tokens[0].kind, TokenKind::Title);
        assert_eq!(tokens[0].lexeme, "hh channel");
        assert_eq!(tokens[1].kind, TokenKind::Verbatim);
        assert_eq!(tokens[1].lexeme, "\n  x++;\n");
        assert_eq!(tokens[1].span.line, 2);
    }

    #[test]
    fn reaction_operators() {
        let lexemes: Vec<_> = kinds("~ a <-> b ~ c -> d ~ e << (1)")
            .into_iter()
            .filter(|(kind, _)| *kind == TokenKind::Symbol)
            .map(|(_, lexeme)| lexeme)
            .collect();
        assert_eq!(lexemes, vec!["~", "<->", "~", "->", "~", "<<", "(", ")"]);
    }

    #[test]
    fn spans_carry_line_and_column() {
        let tokens = lex("a\n  bb").expect("lexes");
        assert_eq!((tokens[1].span.line, tokens[1].span.column), (2, 3));
        assert_eq!((tokens[1].span.lo, tokens[1].span.hi), (4, 6));
    }

    #[test]
    fn unterminated_verbatim_is_an_error() {
        let err = lex("VERBATIM\n int x;").unwrap_err();
        assert!(err.to_string().contains("ENDVERBATIM"), "{err}");
        assert_eq!(err.span().map(|span| span.line), Some(1));
    }

    #[test]
    fn unexpected_character_reports_position() {
        let err = lex("x = 1\n  $").unwrap_err();
        assert_eq!(err.span().map(|span| (span.line, span.column)), Some((2, 3)));
    }
}
