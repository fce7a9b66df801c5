pub mod lexer;
pub mod parser;
pub mod syntax;

pub mod answer;
pub mod ast;
pub mod function;
pub mod normalizer;

use std::fmt;

use derive_more::From;

pub use answer::{ParsedAnswer, ParsedMember, parse_answer};
pub use ast::Node;
pub use parser::ParseOptions;

use lexer::LexError;
use normalizer::UnsupportedConstructError;
use parser::SyntaxError;

#[derive(Debug, Clone, PartialEq, From)]
pub enum ParseError {
    Lex(LexError),
    Syntax(SyntaxError),
    Unsupported(UnsupportedConstructError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(e) => write!(f, "{e}"),
            ParseError::Syntax(e) => write!(f, "{e}"),
            ParseError::Unsupported(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Reads a parameter declaration like `$a, b_1, \theta$` into names in
/// declaration order.
pub fn parse_parameter_names(input: &str) -> Result<Vec<String>, ParseError> {
    let tokens = lexer::tokenize(input)?;
    Ok(parser::parse_parameter_names(
        tokens,
        input.len(),
        &ParseOptions::default(),
    )?)
}
