//! Recursive descent parser over the token slice produced by the lexer.
//!
//! Errors never abort the parse. Each syntax error is recorded, the parser
//! skips to the next statement boundary and keeps going, so one run reports
//! every problem it can see. Any error means no AST is returned.

use mech_core::ast::{Ast, NodeId, Program};
use mech_core::diagnostics::{Diagnostic, DiagnosticReport};
use mech_core::span::{FileId, Span};

use crate::lexer::{self, Keyword, Token, TokenKind};

mod blocks;
mod expr;
mod stmt;

const PARSER_CONTEXT: &str = "mech.parser";

/// How far a syntax error should unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recovery {
    /// Skip to the next statement boundary.
    Statement,
    /// The token stream ended inside a construct; the enclosing block reports.
    Eof,
    /// An unterminated block was already reported; unwind to top level.
    Unclosed,
}

#[derive(Debug, Clone)]
pub(crate) struct SyntaxError {
    pub message: String,
    pub span: Span,
    pub recovery: Recovery,
}

pub(crate) type PResult<T> = Result<T, SyntaxError>;

/// Parser for mechanism sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModParser {
    file: FileId,
}

impl ModParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(file: FileId) -> Self {
        Self { file }
    }

    /// Parse a token sequence. The report carries an AST only when no error
    /// was found.
    pub fn parse_tokens(&self, tokens: &[Token]) -> DiagnosticReport<Ast> {
        let mut parser = Parser::new(tokens);
        let program = parser.parse_program();
        mech_core::debug!(
            "parsed {} tokens into {} nodes with {} error(s)",
            tokens.len(),
            parser.ast.len(),
            parser.errors.len()
        );
        if parser.errors.is_empty() {
            let mut ast = parser.ast;
            if let Some(root) = ast.cast_mut::<Program>(ast.root()) {
                root.blocks = program;
            }
            DiagnosticReport::success(ast)
        } else {
            DiagnosticReport::failure(parser.errors)
        }
    }

    /// Lex and parse source text. Lexer failures become syntax diagnostics.
    pub fn parse_source(&self, source: &str) -> DiagnosticReport<Ast> {
        match lexer::lex_file(source, self.file) {
            Ok(tokens) => self.parse_tokens(&tokens),
            Err(err) => {
                let mut diagnostic = Diagnostic::syntax(err.to_string(), Span::synthetic())
                    .with_source_context(PARSER_CONTEXT);
                diagnostic.span = err.span().map(|span| Span { file: self.file, ..span });
                DiagnosticReport::failure(vec![diagnostic])
            }
        }
    }
}

pub fn parse(tokens: &[Token]) -> DiagnosticReport<Ast> {
    ModParser::new().parse_tokens(tokens)
}

pub fn parse_source(source: &str) -> DiagnosticReport<Ast> {
    ModParser::new().parse_source(source)
}

/// Parse a single expression, used by tests and tooling.
pub fn parse_expression(tokens: &[Token]) -> DiagnosticReport<(Ast, NodeId)> {
    let mut parser = Parser::new(tokens);
    let result = parser.expression();
    match result {
        Ok(id) if parser.at_end() && parser.errors.is_empty() => {
            DiagnosticReport::success((parser.ast, id))
        }
        Ok(_) => {
            let token = parser.peek_description();
            parser.record(parser.error_here(format!("unexpected trailing {token}")));
            DiagnosticReport::failure(parser.errors)
        }
        Err(err) => {
            parser.force_record(err);
            DiagnosticReport::failure(parser.errors)
        }
    }
}

pub(crate) struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    pub(crate) ast: Ast,
    errors: Vec<Diagnostic>,
    /// Nesting of braced blocks currently open.
    depth: usize,
    unclosed_reported: bool,
}

impl<'t> Parser<'t> {
    pub(crate) fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            ast: Ast::new(),
            errors: Vec::new(),
            depth: 0,
            unclosed_reported: false,
        }
    }

    // ------------------------------------------------------------ cursor

    pub(crate) fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_nth(&self, n: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + n)
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(crate) fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn previous(&self) -> Option<&'t Token> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    /// Span of the last consumed token.
    pub(crate) fn prev_span(&self) -> Span {
        self.previous().map(|t| t.span).unwrap_or_default()
    }

    /// Span from `start` to the last consumed token.
    pub(crate) fn span_from(&self, start: Span) -> Span {
        start.to(self.prev_span())
    }

    pub(crate) fn check_symbol(&self, symbol: &str) -> bool {
        self.peek().is_some_and(|t| t.is_symbol(symbol))
    }

    pub(crate) fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    pub(crate) fn check_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    pub(crate) fn eat_symbol(&mut self, symbol: &str) -> bool {
        if self.check_symbol(symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_symbol(&mut self, symbol: &str) -> PResult<&'t Token> {
        if self.check_symbol(symbol) {
            return self.advance().ok_or_else(|| self.eof_error(symbol));
        }
        Err(self.expected(&format!("`{symbol}`")))
    }

    pub(crate) fn expect_keyword(&mut self, keyword: Keyword) -> PResult<&'t Token> {
        if self.check_keyword(keyword) {
            return self.advance().ok_or_else(|| self.eof_error(keyword.as_str()));
        }
        Err(self.expected(&format!("`{keyword}`")))
    }

    pub(crate) fn expect_ident(&mut self, what: &str) -> PResult<&'t Token> {
        if self.check_kind(TokenKind::Ident) {
            return self.advance().ok_or_else(|| self.eof_error(what));
        }
        Err(self.expected(what))
    }

    /// Identifier, or a keyword used as a name (`BEFORE BREAKPOINT`).
    pub(crate) fn expect_word(&mut self, what: &str) -> PResult<&'t Token> {
        match self.peek() {
            Some(token) if matches!(token.kind, TokenKind::Ident | TokenKind::Keyword(_)) => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.expected(what)),
        }
    }

    pub(crate) fn expect_integer(&mut self, what: &str) -> PResult<u32> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Integer => {
                self.pos += 1;
                token.lexeme.parse().map_err(|_| SyntaxError {
                    message: format!("invalid {what} `{}`", token.lexeme),
                    span: token.span,
                    recovery: Recovery::Statement,
                })
            }
            _ => Err(self.expected(what)),
        }
    }

    // ------------------------------------------------------------ errors

    pub(crate) fn peek_description(&self) -> String {
        match self.peek() {
            Some(token) => match token.kind {
                TokenKind::Verbatim => "VERBATIM block".to_string(),
                TokenKind::Title => "TITLE".to_string(),
                _ => format!("`{}`", token.lexeme),
            },
            None => "end of input".to_string(),
        }
    }

    pub(crate) fn expected(&self, what: &str) -> SyntaxError {
        match self.peek() {
            Some(_) => self.error_here(format!("expected {what}, found {}", self.peek_description())),
            None => self.eof_error(what),
        }
    }

    pub(crate) fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            span: self.peek().map(|t| t.span).unwrap_or_else(|| self.prev_span()),
            recovery: Recovery::Statement,
        }
    }

    fn eof_error(&self, what: &str) -> SyntaxError {
        SyntaxError {
            message: format!("expected {what}, found end of input"),
            span: self.prev_span(),
            recovery: Recovery::Eof,
        }
    }

    /// Record an error unless an enclosing block will report it instead.
    pub(crate) fn record(&mut self, err: SyntaxError) {
        match err.recovery {
            Recovery::Unclosed => {}
            Recovery::Eof if self.depth > 0 || self.unclosed_reported => {}
            _ => self.force_record(err),
        }
    }

    fn force_record(&mut self, err: SyntaxError) {
        mech_core::debug!("syntax error at {}: {}", err.span, err.message);
        self.errors.push(
            Diagnostic::syntax(err.message, err.span).with_source_context(PARSER_CONTEXT),
        );
    }

    /// Report a block whose `}` never came, once.
    fn unclosed(&mut self, open: Span) -> SyntaxError {
        if !self.unclosed_reported {
            self.unclosed_reported = true;
            self.force_record(SyntaxError {
                message: "unterminated block: missing `}` for this `{`".to_string(),
                span: open,
                recovery: Recovery::Unclosed,
            });
        }
        SyntaxError {
            message: String::new(),
            span: open,
            recovery: Recovery::Unclosed,
        }
    }

    /// A token that can only start a top-level block.
    pub(crate) fn at_top_level_keyword(&self) -> bool {
        self.peek()
            .and_then(Token::keyword)
            .is_some_and(|k| k.is_top_level())
    }

    /// Skip the rest of a broken statement. Stops outside nested braces at a
    /// token on a later line than `error_line`, at the `}` closing the current
    /// block, or at a top-level keyword.
    fn recover_statement(&mut self, error_line: u32) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if depth == 0 {
                if token.is_symbol("}") || token.keyword().is_some_and(|k| k.is_top_level()) {
                    break;
                }
                if token.line() > error_line {
                    break;
                }
            }
            if token.is_symbol("{") {
                depth += 1;
            } else if token.is_symbol("}") {
                depth -= 1;
            }
            self.pos += 1;
        }
    }

    /// Skip to the next top-level keyword outside any braces.
    fn recover_top_level(&mut self) {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if depth == 0 && self.pos > start && token.keyword().is_some_and(|k| k.is_top_level()) {
                break;
            }
            if token.is_symbol("{") {
                depth += 1;
            } else if token.is_symbol("}") {
                depth = depth.saturating_sub(1);
            }
            self.pos += 1;
        }
    }

    // ------------------------------------------------------------ blocks

    /// `{ item* }` where `item` parses one entry. Broken entries are recorded
    /// and skipped. Returns the items and the span of the opening brace.
    pub(crate) fn braced<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<(Vec<T>, Span)> {
        let open = self.expect_symbol("{")?.span;
        self.depth += 1;
        let result = self.braced_items(open, &mut item);
        self.depth -= 1;
        result.map(|items| (items, open))
    }

    fn braced_items<T>(
        &mut self,
        open: Span,
        item: &mut impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let mut items = Vec::new();
        loop {
            if self.at_end() || self.at_top_level_keyword() {
                return Err(self.unclosed(open));
            }
            if self.eat_symbol("}") {
                return Ok(items);
            }
            let before = self.pos;
            match item(self) {
                Ok(value) => items.push(value),
                Err(err) => match err.recovery {
                    Recovery::Unclosed => return Err(err),
                    Recovery::Eof => {}
                    Recovery::Statement => {
                        self.record(err);
                        if self.pos == before {
                            self.pos += 1;
                        }
                        let line = self.prev_span().line;
                        self.recover_statement(line);
                    }
                },
            }
        }
    }

    /// Collect the raw lexemes of a `{ ... }` region.
    pub(crate) fn raw_braced(&mut self) -> PResult<String> {
        let open = self.expect_symbol("{")?.span;
        let mut depth = 1usize;
        let mut parts = Vec::new();
        while let Some(token) = self.advance() {
            if token.is_symbol("{") {
                depth += 1;
            } else if token.is_symbol("}") {
                depth -= 1;
                if depth == 0 {
                    return Ok(parts.join(" "));
                }
            }
            parts.push(token.lexeme.clone());
        }
        Err(self.unclosed(open))
    }

    // ------------------------------------------------------------ program

    fn parse_program(&mut self) -> Vec<NodeId> {
        let mut blocks = Vec::new();
        while !self.at_end() {
            match self.top_level() {
                Ok(id) => blocks.push(id),
                Err(err) => {
                    let recovery = err.recovery;
                    self.record(err);
                    if recovery == Recovery::Statement {
                        self.recover_top_level();
                    }
                }
            }
        }
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mech_core::ast::NodeType;
    use pretty_assertions::assert_eq;

    fn errors(source: &str) -> Vec<(u32, u32, String)> {
        parse_source(source)
            .diagnostics
            .into_iter()
            .map(|d| {
                let span = d.span.unwrap_or_default();
                (span.line, span.column, d.message)
            })
            .collect()
    }

    #[test]
    fn unterminated_block_reports_opening_brace_once() {
        let report = parse_source("NEURON {\n  SUFFIX hh\n}\nINITIAL {\n  m = 1\n");
        assert!(report.value.is_none());
        assert_eq!(report.diagnostics.len(), 1);
        let span = report.diagnostics[0].span.unwrap_or_default();
        assert_eq!((span.line, span.column), (4, 9));
    }

    #[test]
    fn unterminated_block_with_dangling_expression() {
        let errs = errors("BREAKPOINT {\n  x = 1 +");
        assert_eq!(errs.len(), 1);
        assert_eq!((errs[0].0, errs[0].1), (1, 12));
    }

    #[test]
    fn missing_brace_before_next_block_is_one_error() {
        let errs = errors("INITIAL {\n  m = 1\n\nBREAKPOINT {\n  m = 2\n}\n");
        assert_eq!(errs.len(), 1, "{errs:?}");
        assert_eq!((errs[0].0, errs[0].1), (1, 9));
    }

    #[test]
    fn recovery_collects_errors_from_several_statements() {
        let errs = errors("INITIAL {\n  m = * 2\n  h = 1\n  n = )\n}\n");
        assert_eq!(errs.len(), 2, "{errs:?}");
        assert_eq!(errs[0].0, 2);
        assert_eq!(errs[1].0, 4);
    }

    #[test]
    fn stray_top_level_tokens_are_reported() {
        let errs = errors("x = 1\nNEURON { SUFFIX a }\n");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].2.contains("top-level"), "{}", errs[0].2);
    }

    #[test]
    fn successful_parse_has_program_root() {
        let ast = parse_source("NEURON { SUFFIX pas }")
            .value
            .expect("parses");
        assert_eq!(ast.node_type(ast.root()), NodeType::Program);
        assert_eq!(ast.top_level().len(), 1);
    }
}
