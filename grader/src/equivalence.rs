use std::fmt;

use eval::{ComplexFormatParseError, Value};

use crate::result::{NumericResult, ParseResult};

/// Why two answers were not found equivalent.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    SolutionFailed(String),
    ModelFailed(String),
    MalformedNumber(ComplexFormatParseError),
    CountMismatch { solution: usize, model: usize },
    ValueMismatch { index: usize, solution: Value, model: Value },
}

impl Mismatch {
    /// Whether both answers evaluated, so the comparison itself happened.
    pub fn compared(&self) -> bool {
        matches!(self, Mismatch::CountMismatch { .. } | Mismatch::ValueMismatch { .. })
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::SolutionFailed(message) => {
                write!(f, "Failed to evaluate reference solution: {message}")
            }
            Mismatch::ModelFailed(message) => write!(f, "Failed to evaluate model response: {message}"),
            Mismatch::MalformedNumber(e) => write!(f, "{e}"),
            Mismatch::CountMismatch { solution, model } => write!(
                f,
                "reference solution has {solution} result{}, model response has {model}",
                if *solution == 1 { "" } else { "s" }
            ),
            Mismatch::ValueMismatch {
                index,
                solution,
                model,
            } => write!(
                f,
                "result {} differs: reference solution gives {solution}, model response gives {model}",
                index + 1
            ),
        }
    }
}

fn failure_message(result: &ParseResult) -> String {
    result
        .error_message
        .clone()
        .unwrap_or_else(|| "no result".into())
}

fn values(results: &[Option<NumericResult>]) -> Result<Vec<Value>, Mismatch> {
    results
        .iter()
        .map(|result| match result {
            Some(result) => result.to_value().map_err(Mismatch::MalformedNumber),
            None => Err(Mismatch::MalformedNumber(ComplexFormatParseError {
                text: "null".into(),
            })),
        })
        .collect()
}

/// Positional comparison of two evaluated answers within
/// `|a - b| <= tolerance * max(1, |a|, |b|)`.
pub fn compare(solution: &ParseResult, model: &ParseResult, tolerance: f64) -> Result<(), Mismatch> {
    if !solution.success {
        return Err(Mismatch::SolutionFailed(failure_message(solution)));
    }
    if !model.success {
        return Err(Mismatch::ModelFailed(failure_message(model)));
    }
    let solution_values = values(&solution.evaluation_results)?;
    let model_values = values(&model.evaluation_results)?;
    if solution_values.len() != model_values.len() {
        return Err(Mismatch::CountMismatch {
            solution: solution_values.len(),
            model: model_values.len(),
        });
    }
    match solution_values
        .iter()
        .zip(&model_values)
        .position(|(a, b)| !a.approx_eq(*b, tolerance))
    {
        Some(index) => Err(Mismatch::ValueMismatch {
            index,
            solution: solution_values[index],
            model: model_values[index],
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn evaluated(results: &[NumericResult]) -> ParseResult {
        ParseResult {
            success: true,
            evaluation_results: results.iter().cloned().map(Some).collect(),
            ..Default::default()
        }
    }

    fn real(x: f64) -> NumericResult {
        NumericResult::Real(x)
    }

    #[test]
    fn tolerance() {
        assert_eq!(compare(&evaluated(&[real(4.0)]), &evaluated(&[real(4.0 + 1e-9)]), 1e-6), Ok(()));
        assert_matches!(
            compare(&evaluated(&[real(4.0)]), &evaluated(&[real(5.0)]), 1e-6),
            Err(Mismatch::ValueMismatch { index: 0, .. })
        );
    }

    #[test]
    fn comparison_is_positional() {
        let solution = evaluated(&[real(1.0), real(2.0)]);
        let model = evaluated(&[real(2.0), real(1.0)]);
        assert_matches!(
            compare(&solution, &model, 1e-6),
            Err(Mismatch::ValueMismatch { index: 0, .. })
        );
    }

    #[test]
    fn count_mismatch_is_explained() {
        let mismatch = compare(&evaluated(&[real(1.0)]), &evaluated(&[real(1.0), real(2.0)]), 1e-6)
            .unwrap_err();
        assert!(mismatch.compared());
        assert_eq!(
            mismatch.to_string(),
            "reference solution has 1 result, model response has 2"
        );
    }

    #[test]
    fn complex_results_are_parsed_back() {
        let solution = evaluated(&[NumericResult::Complex("(0+1j)".into())]);
        let model = evaluated(&[NumericResult::Complex("(1e-12+1j)".into())]);
        assert_eq!(compare(&solution, &model, 1e-6), Ok(()));

        let malformed = evaluated(&[NumericResult::Complex("(0+1i)".into())]);
        assert_matches!(compare(&solution, &malformed, 1e-6), Err(Mismatch::MalformedNumber(_)));
    }

    #[test]
    fn failed_sides_are_surfaced() {
        let failed = ParseResult::failure("expected expression", Default::default());
        let mismatch = compare(&evaluated(&[real(1.0)]), &failed, 1e-6).unwrap_err();
        assert!(!mismatch.compared());
        assert_eq!(
            mismatch.to_string(),
            "Failed to evaluate model response: expected expression"
        );
    }
}
