use eval::{EvalOptions, ParameterBinding, evaluate};
use parse::{ParseError, ParseOptions, parse_answer, parse_parameter_names};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, warn};

use crate::{
    config::GradeConfig,
    equivalence::compare,
    extract::isolate_answer,
    result::{EquivalenceResult, ParameterDict, ParseResult},
};

/// Runs both grading operations with one source of randomness for the
/// parameter draws.
#[derive(Debug, Clone)]
pub struct Grader<R = StdRng> {
    rng: R,
    config: GradeConfig,
}

impl Grader<StdRng> {
    pub fn new() -> Self {
        Self::from_config(GradeConfig::default())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), GradeConfig::default())
    }

    /// Seeds from `config.seed`, or from OS entropy when it is unset.
    pub fn from_config(config: GradeConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(rng, config)
    }
}

impl Default for Grader<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Grader<R> {
    pub fn with_rng(rng: R, config: GradeConfig) -> Self {
        Self { rng, config }
    }

    fn bind(&mut self, parameters: &str) -> Result<ParameterBinding, ParseError> {
        let names = if parameters.trim().is_empty() {
            vec![]
        } else {
            parse_parameter_names(parameters)?
        };
        let binding = ParameterBinding::bind(&names, &mut self.rng);
        debug!(parameters = ?binding, "bound parameters");
        Ok(binding)
    }

    /// Parses `latex` and evaluates every member under a fresh binding of
    /// `parameters`.
    pub fn parse(&mut self, latex: &str, parameters: &str) -> ParseResult {
        match self.bind(parameters) {
            Ok(binding) => parse_with_binding(latex, &binding, &self.config.eval_options()),
            Err(e) => {
                warn!(error = %e, "invalid parameter declaration");
                ParseResult::failure(format!("invalid parameters: {e}"), ParameterDict::default())
            }
        }
    }

    /// Compares the boxed answer in `candidate` against `reference`, with
    /// one binding shared by both sides.
    pub fn evaluate_equivalence(&mut self, reference: &str, candidate: &str, parameters: &str) -> EquivalenceResult {
        let binding = match self.bind(parameters) {
            Ok(binding) => binding,
            Err(e) => {
                warn!(error = %e, "invalid parameter declaration");
                let message = format!("invalid parameters: {e}");
                let failed = ParseResult::failure(message.clone(), ParameterDict::default());
                return EquivalenceResult {
                    success: false,
                    is_equivalent: false,
                    error_message: Some(message),
                    model_result: failed.clone(),
                    solution_result: failed,
                };
            }
        };

        let options = self.config.eval_options();
        let solution_result = parse_with_binding(reference, &binding, &options);
        let model_result = parse_with_binding(isolate_answer(candidate), &binding, &options);

        match compare(&solution_result, &model_result, self.config.tolerance) {
            Ok(()) => {
                debug!("answers are equivalent");
                EquivalenceResult {
                    success: true,
                    is_equivalent: true,
                    error_message: None,
                    model_result,
                    solution_result,
                }
            }
            Err(mismatch) => {
                warn!(%mismatch, "answers are not equivalent");
                EquivalenceResult {
                    success: mismatch.compared(),
                    is_equivalent: false,
                    error_message: Some(mismatch.to_string()),
                    model_result,
                    solution_result,
                }
            }
        }
    }
}

/// Parses and evaluates `latex` under an existing binding.
pub fn parse_with_binding(latex: &str, binding: &ParameterBinding, options: &EvalOptions) -> ParseResult {
    let parameter_dict = ParameterDict::from(binding);
    let answer = match parse_answer(latex, &ParseOptions::with_variables(binding.names())) {
        Ok(answer) => answer,
        Err(e) => {
            debug!(latex, error = %e, "answer failed to parse");
            return ParseResult::failure(e.to_string(), parameter_dict);
        }
    };

    let mut result = ParseResult {
        parameter_dict,
        ..Default::default()
    };
    let single = answer.members.len() == 1;
    let mut errors = vec![];
    let mut fail = |index: usize, message: String| {
        if single {
            errors.push(message);
        } else {
            errors.push(format!("member {}: {message}", index + 1));
        }
    };

    for (index, member) in answer.members.into_iter().enumerate() {
        result.extracted_solutions.push(member.source);
        let node = match member.node {
            Ok(node) => node,
            Err(e) => {
                result.intermediate_expressions.push(None);
                result.canonical_expressions.push(None);
                result.evaluation_results.push(None);
                fail(index, e.to_string());
                continue;
            }
        };
        result.intermediate_expressions.push(Some(node.to_string()));
        let substituted = node.substitute(&|name: &str| binding.get(name));
        result.canonical_expressions.push(Some(substituted.to_string()));

        match evaluate(&node, binding, options) {
            Ok(value) if value.is_finite() => {
                debug!(member = index + 1, %value, "evaluated");
                result.evaluation_results.push(Some(value.into()));
            }
            Ok(value) => {
                result.evaluation_results.push(None);
                fail(index, format!("result {value} is not finite"));
            }
            Err(e) => {
                result.evaluation_results.push(None);
                fail(index, e.to_string());
            }
        }
    }

    if result.evaluation_results.iter().all(Option::is_none) {
        result.evaluation_results.clear();
    }
    if !errors.is_empty() {
        debug!(latex, ?errors, "answer failed to evaluate");
        result.error_message = Some(errors.join("; "));
    }
    result.success = result.error_message.is_none();
    result
}
