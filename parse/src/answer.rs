use std::ops::Range;

use crate::{
    ParseError,
    ast::Node,
    lexer::{Delimiter, Token, TokenKind, tokenize},
    normalizer::lower,
    parser::{ParseOptions, SyntaxError, parse_member},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMember {
    /// The member's LaTeX as it appeared in the input.
    pub source: String,
    pub node: Result<Node, ParseError>,
}

/// An answer split into its top-level members. Each member parses and
/// normalizes independently, so one bad member leaves the others intact.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnswer {
    pub members: Vec<ParsedMember>,
}

fn empty_input(position: usize, found: &str) -> ParseError {
    SyntaxError {
        position,
        expected: "expression".into(),
        found: found.into(),
    }
    .into()
}

/// Strips `\boxed{...}` from around the token stream, if present.
fn unbox(mut tokens: Vec<Token>, source_len: usize) -> Result<(Vec<Token>, usize), ParseError> {
    if tokens.first().map(|t| t.kind) != Some(TokenKind::Boxed) {
        return Ok((tokens, source_len));
    }
    let curly = |kind| kind == TokenKind::Open(Delimiter::Curly);
    match tokens.get(1) {
        Some(token) if curly(token.kind) => {}
        Some(token) => {
            return Err(SyntaxError {
                position: token.span.start,
                expected: "'{'".into(),
                found: token.to_small_string(),
            }
            .into());
        }
        None => {
            return Err(SyntaxError {
                position: source_len,
                expected: "'{'".into(),
                found: "end of input".into(),
            }
            .into());
        }
    }

    let mut depth = 0usize;
    let mut close = None;
    for (i, token) in tokens.iter().enumerate().skip(1) {
        match token.kind {
            TokenKind::Open(Delimiter::Curly) => depth += 1,
            TokenKind::Close(Delimiter::Curly) => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return Err(SyntaxError {
            position: source_len,
            expected: "'}'".into(),
            found: "end of input".into(),
        }
        .into());
    };
    if let Some(trailing) = tokens.get(close + 1) {
        return Err(SyntaxError {
            position: trailing.span.start,
            expected: "end of input".into(),
            found: trailing.to_small_string(),
        }
        .into());
    }
    let end = tokens[close].span.start;
    if close == 2 {
        return Err(empty_input(end, "'}'"));
    }
    tokens.truncate(close);
    tokens.drain(..2);
    Ok((tokens, end))
}

/// Splits at depth-zero `,` and `;`, keeping the separator positions.
fn split_members(tokens: Vec<Token>, end: usize) -> Vec<(Vec<Token>, usize)> {
    let mut members = vec![];
    let mut current = vec![];
    let mut depth = 0i32;
    for token in tokens {
        match token.kind {
            TokenKind::Open(_) => depth += 1,
            TokenKind::Close(_) => depth -= 1,
            TokenKind::Comma | TokenKind::Semicolon if depth == 0 => {
                members.push((std::mem::take(&mut current), token.span.start));
                continue;
            }
            _ => {}
        }
        current.push(token);
    }
    members.push((current, end));
    members
}

fn source_of(input: &str, tokens: &[Token]) -> String {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => {
            let span: Range<usize> = first.span.start..last.span.end;
            input[span].to_string()
        }
        _ => String::new(),
    }
}

/// Parses an answer such as `\boxed{1, x^2}`. A lexical error fails the
/// whole answer; syntax and normalization errors are kept per member.
pub fn parse_answer(input: &str, options: &ParseOptions) -> Result<ParsedAnswer, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(empty_input(input.len(), "end of input"));
    }
    let (tokens, end) = unbox(tokens, input.len())?;

    let members = split_members(tokens, end)
        .into_iter()
        .map(|(tokens, end)| {
            let source = source_of(input, &tokens);
            let node = if tokens.is_empty() {
                Err(empty_input(end, "separator or end of input"))
            } else {
                parse_member(tokens, end, options)
                    .map_err(ParseError::from)
                    .and_then(|syntax| lower(syntax).map_err(ParseError::from))
            };
            ParsedMember { source, node }
        })
        .collect();

    Ok(ParsedAnswer { members })
}
