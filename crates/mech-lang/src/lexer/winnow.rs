use winnow::combinator::{alt, cut_err, repeat};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::token::{literal, take_till, take_until, take_while};
use winnow::{ModalResult, Parser};

pub(crate) const MULTI_PUNCT: &[&str] = &["<->", "->", "<<", "<=", ">=", "==", "!=", "&&", "||"];
pub(crate) const SINGLE_PUNCT: &str = "=+-*/^<>!~(){}[],";

/// Whitespace, `:`/`?` line comments and `COMMENT ... ENDCOMMENT` blocks.
pub(crate) fn ws(input: &mut &str) -> ModalResult<()> {
    repeat::<_, _, (), _, _>(0.., alt((whitespace, line_comment, comment_block)))
        .parse_next(input)?;
    Ok(())
}

pub(crate) fn whitespace(input: &mut &str) -> ModalResult<()> {
    take_while(1.., char::is_whitespace)
        .map(|_| ())
        .parse_next(input)
}

pub(crate) fn line_comment(input: &mut &str) -> ModalResult<()> {
    alt((literal(":"), literal("?"))).parse_next(input)?;
    take_till(0.., |c: char| c == '\n').parse_next(input)?;
    Ok(())
}

pub(crate) fn comment_block(input: &mut &str) -> ModalResult<()> {
    keyword("COMMENT").parse_next(input)?;
    cut_err(take_until(0.., "ENDCOMMENT"))
        .context(StrContext::Label("COMMENT block without ENDCOMMENT"))
        .parse_next(input)?;
    literal("ENDCOMMENT").parse_next(input)?;
    Ok(())
}

/// Body of a `VERBATIM` block up to (and consuming) `ENDVERBATIM`.
pub(crate) fn verbatim_body<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let body = cut_err(take_until(0.., "ENDVERBATIM"))
        .context(StrContext::Label("VERBATIM block without ENDVERBATIM"))
        .parse_next(input)?;
    literal("ENDVERBATIM").parse_next(input)?;
    Ok(body)
}

/// Rest of the current line, used for `TITLE`.
pub(crate) fn rest_of_line<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_till(0.., |c: char| c == '\n').parse_next(input)
}

/// Exact keyword without identifier continuation.
pub(crate) fn keyword<'a>(
    kw: &'static str,
) -> impl Parser<&'a str, (), ErrMode<ContextError>> {
    move |input: &mut &str| {
        literal(kw).parse_next(input)?;
        if input.chars().next().is_some_and(is_ident_continue) {
            Err(backtrack_err())
        } else {
            Ok(())
        }
    }
}

pub(crate) fn parse_string_literal(input: &mut &str) -> ModalResult<String> {
    let slice = *input;
    if !slice.starts_with('"') {
        return Err(backtrack_err());
    }
    match slice[1..].find('"') {
        Some(end) => {
            let literal = slice[..end + 2].to_string();
            *input = &slice[end + 2..];
            Ok(literal)
        }
        None => Err(ErrMode::Cut(ContextError::new())),
    }
}

/// Digits with optional fraction and exponent. Returns true for reals.
pub(crate) fn parse_number(input: &mut &str) -> ModalResult<bool> {
    let bytes = input.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let int_digits = idx;
    let mut real = false;
    if idx < bytes.len() && bytes[idx] == b'.' {
        let mut frac = idx + 1;
        while frac < bytes.len() && bytes[frac].is_ascii_digit() {
            frac += 1;
        }
        if int_digits == 0 && frac == idx + 1 {
            return Err(backtrack_err());
        }
        idx = frac;
        real = true;
    } else if int_digits == 0 {
        return Err(backtrack_err());
    }
    if idx < bytes.len() && (bytes[idx] == b'e' || bytes[idx] == b'E') {
        let mut exp = idx + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            idx = exp;
            real = true;
        }
    }
    *input = &input[idx..];
    Ok(real)
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic()
}

pub(crate) fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphanumeric()
}

pub(crate) fn backtrack_err() -> ErrMode<ContextError> {
    ErrMode::Backtrack(ContextError::new())
}
