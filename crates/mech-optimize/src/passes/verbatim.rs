//! VERBATIM blocks are passed to the backend untouched except for line
//! endings and surrounding blank lines. Unbalanced brackets are reported
//! here, before they surface as C compiler errors far from the source.

use crate::error::semantic_diagnostic;
use crate::pass::{OptimizePass, PassName};
use mech_core::ast::nodes::Verbatim;
use mech_core::ast::{Ast, NodeId};
use mech_core::diagnostics::Diagnostic;
use mech_core::visitor::{transform_ast, AstTransformer};
use mech_core::{CompilationContext, Result};

pub struct VerbatimPass;

impl OptimizePass for VerbatimPass {
    fn name(&self) -> PassName {
        PassName::Verbatim
    }

    fn run(&self, ast: &mut Ast, ctx: &mut CompilationContext) -> Result<()> {
        let mut rewriter = VerbatimRewriter::default();
        transform_ast(&mut rewriter, ast)?;
        mech_core::debug!("verbatim: {} block(s) normalized", rewriter.blocks);
        ctx.diagnostics.add_diagnostics(rewriter.diagnostics);
        Ok(())
    }
}

#[derive(Default)]
struct VerbatimRewriter {
    blocks: usize,
    diagnostics: Vec<Diagnostic>,
}

impl AstTransformer for VerbatimRewriter {
    fn transform_verbatim(&mut self, ast: &mut Ast, id: NodeId) -> Result<()> {
        let span = ast.span(id);
        let Some(block) = ast.cast_mut::<Verbatim>(id) else {
            return Ok(());
        };
        if let Err(message) = check_balanced(&block.text) {
            self.diagnostics.push(semantic_diagnostic(
                PassName::Verbatim,
                format!("VERBATIM block: {message}"),
                span,
            ));
        }
        block.text = normalize(&block.text);
        self.blocks += 1;
        Ok(())
    }
}

/// LF line endings, no trailing whitespace, no leading or trailing blank
/// lines.
pub fn normalize(text: &str) -> String {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r').trim_end())
        .collect();
    let first = lines.iter().position(|line| !line.is_empty());
    let last = lines.iter().rposition(|line| !line.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}

/// Bracket nesting of C text, ignoring comments and literals.
pub fn check_balanced(text: &str) -> std::result::Result<(), String> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut line = 1;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                    }
                    if previous == '*' && next == '/' {
                        closed = true;
                        break;
                    }
                    previous = next;
                }
                if !closed {
                    return Err("unterminated comment".into());
                }
            }
            '"' | '\'' => {
                let mut escaped = false;
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                    }
                    if escaped {
                        escaped = false;
                    } else if next == '\\' {
                        escaped = true;
                    } else if next == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(format!("unterminated literal opened on line {line}"));
                }
            }
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, opened)) => {
                        return Err(format!(
                            "`{c}` on line {line} does not close `{open}` from line {opened}"
                        ))
                    }
                    None => return Err(format!("unmatched `{c}` on line {line}")),
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some((open, opened)) => Err(format!("`{open}` from line {opened} is never closed")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_strips_blank_edges_and_carriage_returns() {
        let text = "\r\n\n  int x = 1;  \r\n  x++;\r\n\n";
        assert_eq!(normalize(text), "  int x = 1;\n  x++;");
        assert_eq!(normalize("\n \n"), "");
    }

    #[test]
    fn brackets_inside_comments_and_strings_are_ignored() {
        let text = "if (a) { printf(\"}\"); } // )\n/* ( */ char c = '[';";
        assert_eq!(check_balanced(text), Ok(()));
    }

    #[test]
    fn mismatched_brackets_are_reported_with_lines() {
        assert_eq!(
            check_balanced("f(a[1)]"),
            Err("`)` on line 1 does not close `[` from line 1".to_string())
        );
        assert_eq!(
            check_balanced("{\n"),
            Err("`{` from line 1 is never closed".to_string())
        );
        assert_eq!(check_balanced("}"), Err("unmatched `}` on line 1".to_string()));
    }
}
