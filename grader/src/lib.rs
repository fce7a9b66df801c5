pub mod config;
pub mod equivalence;
pub mod extract;
pub mod grader;
pub mod result;

pub use config::{ConfigError, GradeConfig};
pub use grader::{Grader, parse_with_binding};
pub use result::{EquivalenceResult, NumericResult, ParameterDict, ParseResult};

/// Parses and evaluates one boxed answer with freshly drawn parameters.
pub fn parse(latex_input: &str, parameters: &str) -> ParseResult {
    Grader::new().parse(latex_input, parameters)
}

/// Decides whether the boxed answer in `candidate_text` is numerically
/// equivalent to `reference_latex`.
pub fn evaluate_equivalence(reference_latex: &str, candidate_text: &str, parameters: &str) -> EquivalenceResult {
    Grader::new().evaluate_equivalence(reference_latex, candidate_text, parameters)
}
