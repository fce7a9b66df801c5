use num_complex::Complex64;
use parse::{
    Node,
    ast::{BinaryOperator, Callee, Direction, SumProdKind},
    lexer::RelationKind,
};

use crate::{
    EvalError,
    binding::ParameterBinding,
    builtins::{self, as_integer},
    value::Value,
};

type Result<T> = std::result::Result<T, EvalError>;

/// Nodes and weights of 5-point Gauss-Legendre on `[-1, 1]`.
const GAUSS_LEGENDRE: [(f64, f64); 5] = [
    (0.0, 0.568_888_888_888_888_9),
    (-0.538_469_310_105_683_1, 0.478_628_670_499_366_5),
    (0.538_469_310_105_683_1, 0.478_628_670_499_366_5),
    (-0.906_179_845_938_664, 0.236_926_885_056_189_1),
    (0.906_179_845_938_664, 0.236_926_885_056_189_1),
];

const LIMIT_INITIAL_STEP: f64 = 0.1;
const LIMIT_AGREEMENT: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct EvalOptions {
    pub quadrature_panels: usize,
    pub limit_steps: usize,
    pub max_series_terms: u64,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            quadrature_panels: 64,
            limit_steps: 10,
            max_series_terms: 1_000_000,
        }
    }
}

/// Evaluates one answer member. For `lhs = rhs` the right-hand side is
/// evaluated.
pub fn evaluate(node: &Node, binding: &ParameterBinding, options: &EvalOptions) -> Result<Value> {
    let target = match node {
        Node::Relation {
            kind: RelationKind::Equal,
            right,
            ..
        } => right.as_ref(),
        Node::Relation { kind, .. } => {
            return Err(EvalError::Unsupported(format!("relation '{kind}'")));
        }
        _ => node,
    };
    binding.check(target)?;
    Evaluator {
        binding,
        options,
        scopes: vec![],
    }
    .eval(target)
}

struct Evaluator<'a> {
    binding: &'a ParameterBinding,
    options: &'a EvalOptions,
    scopes: Vec<(&'a str, Value)>,
}

impl<'a> Evaluator<'a> {
    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(&(_, value)) = self.scopes.iter().rev().find(|(n, _)| *n == name) {
            return Ok(value);
        }
        if let Some(value) = self.binding.get(name) {
            return Ok(Value::Real(value));
        }
        match name {
            "e" => Ok(Value::Real(std::f64::consts::E)),
            "pi" => Ok(Value::Real(std::f64::consts::PI)),
            "i" => Ok(Value::imaginary_unit()),
            _ => Err(EvalError::UnknownParameter(name.into())),
        }
    }

    fn with_bound(&mut self, variable: &'a str, value: Value, body: &'a Node) -> Result<Value> {
        self.scopes.push((variable, value));
        let result = self.eval(body);
        self.scopes.pop();
        result
    }

    fn eval_all(&mut self, args: &'a [Node]) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn eval(&mut self, node: &'a Node) -> Result<Value> {
        match node {
            Node::Number(x) => Ok(Value::Real(*x)),
            Node::Symbol(name) => self.lookup(name),
            Node::BinaryOperation {
                operation,
                left,
                right,
            } => {
                let a = self.eval(left)?;
                let b = self.eval(right)?;
                match operation {
                    BinaryOperator::Add => Ok(builtins::add(a, b)),
                    BinaryOperator::Sub => Ok(builtins::subtract(a, b)),
                    BinaryOperator::Mul => Ok(builtins::multiply(a, b)),
                    BinaryOperator::Div => builtins::divide(a, b),
                }
            }
            Node::UnaryMinus(x) => Ok(builtins::negate(self.eval(x)?)),
            Node::Power { base, exponent } => {
                let base = self.eval(base)?;
                builtins::power(base, self.eval(exponent)?)
            }
            Node::Group(x) => self.eval(x),
            Node::Fraction {
                numerator,
                denominator,
            } => {
                let numerator = self.eval(numerator)?;
                builtins::divide(numerator, self.eval(denominator)?)
            }
            Node::Binomial { top, bottom } => {
                let top = self.eval(top)?;
                builtins::binomial(top, self.eval(bottom)?)
            }
            Node::FunctionCall {
                callee: Callee::Builtin(function),
                args,
            } => builtins::call(*function, &self.eval_all(args)?),
            Node::FunctionCall {
                callee: Callee::User(name),
                ..
            } => Err(EvalError::UnknownParameter(name.clone())),
            Node::PowerOfFunction {
                function,
                exponent,
                args,
            } => {
                let value = builtins::call(*function, &self.eval_all(args)?)?;
                builtins::power(value, self.eval(exponent)?)
            }
            Node::Factorial(x) => builtins::factorial(self.eval(x)?),
            Node::SumProd {
                kind,
                variable,
                lower_bound,
                upper_bound,
                body,
            } => self.sum_prod(*kind, variable, lower_bound, upper_bound, body),
            Node::Integral {
                lower_bound: Some(lower_bound),
                upper_bound: Some(upper_bound),
                integrand,
                variable,
            } => {
                let a = self.real_bound(lower_bound, "integral bound")?;
                let b = self.real_bound(upper_bound, "integral bound")?;
                let value = self.integral(variable, integrand, a, b)?;
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(EvalError::domain("integral does not converge"))
                }
            }
            Node::Integral { .. } => Err(EvalError::Unsupported("an indefinite integral".into())),
            Node::Limit {
                variable,
                approach,
                direction,
                body,
            } => self.limit(variable, approach, *direction, body),
            Node::Relation { .. } => Err(EvalError::Unsupported("a nested relation".into())),
        }
    }

    fn real_bound(&mut self, node: &'a Node, what: &str) -> Result<f64> {
        match self.eval(node)? {
            Value::Real(x) if !x.is_nan() => Ok(x),
            _ => Err(EvalError::domain(format!("{what} must be real"))),
        }
    }

    fn integer_bound(&mut self, node: &'a Node) -> Result<i64> {
        let x = self.real_bound(node, "series bound")?;
        as_integer(x).ok_or_else(|| EvalError::domain(format!("series bound {x} is not an integer")))
    }

    fn sum_prod(
        &mut self,
        kind: SumProdKind,
        variable: &'a str,
        lower_bound: &'a Node,
        upper_bound: &'a Node,
        body: &'a Node,
    ) -> Result<Value> {
        let lower = self.integer_bound(lower_bound)?;
        let upper = self.integer_bound(upper_bound)?;
        let mut total = match kind {
            SumProdKind::Sum => Value::Real(0.0),
            SumProdKind::Prod => Value::Real(1.0),
        };
        if upper < lower {
            return Ok(total);
        }
        let terms = (upper as i128 - lower as i128 + 1) as u128;
        if terms > self.options.max_series_terms as u128 {
            return Err(EvalError::domain(format!(
                "series has {terms} terms, more than {}",
                self.options.max_series_terms
            )));
        }
        for k in lower..=upper {
            let term = self.with_bound(variable, Value::Real(k as f64), body)?;
            total = match kind {
                SumProdKind::Sum => builtins::add(total, term),
                SumProdKind::Prod => builtins::multiply(total, term),
            };
        }
        Ok(total)
    }

    fn integral(&mut self, variable: &'a str, integrand: &'a Node, a: f64, b: f64) -> Result<Value> {
        if a == b {
            return Ok(Value::Real(0.0));
        }
        if a > b {
            return Ok(builtins::negate(self.integral(variable, integrand, b, a)?));
        }
        let stretch = |t: f64| t / (1.0 - t);
        let jacobian = |t: f64| 1.0 / ((1.0 - t) * (1.0 - t));
        let total = match (a.is_infinite(), b.is_infinite()) {
            (false, false) => self.quadrature(variable, integrand, a, b, |t| (t, 1.0))?,
            (false, true) => {
                self.quadrature(variable, integrand, 0.0, 1.0, |t| (a + stretch(t), jacobian(t)))?
            }
            (true, false) => {
                self.quadrature(variable, integrand, 0.0, 1.0, |t| (b - stretch(t), jacobian(t)))?
            }
            (true, true) => {
                let below = self.quadrature(variable, integrand, 0.0, 1.0, |t| (-stretch(t), jacobian(t)))?;
                let above = self.quadrature(variable, integrand, 0.0, 1.0, |t| (stretch(t), jacobian(t)))?;
                below + above
            }
        };
        Ok(Value::from_complex(total))
    }

    /// Composite Gauss-Legendre over `[t0, t1]` of `f(x(t)) * x'(t)`.
    fn quadrature(
        &mut self,
        variable: &'a str,
        integrand: &'a Node,
        t0: f64,
        t1: f64,
        substitution: impl Fn(f64) -> (f64, f64),
    ) -> Result<Complex64> {
        let panels = self.options.quadrature_panels.max(1);
        let half_width = 0.5 * (t1 - t0) / panels as f64;
        let mut total = Complex64::new(0.0, 0.0);
        for panel in 0..panels {
            let middle = t0 + (2 * panel + 1) as f64 * half_width;
            for (node, weight) in GAUSS_LEGENDRE {
                let (x, derivative) = substitution(middle + half_width * node);
                let value = self.with_bound(variable, Value::Real(x), integrand)?;
                total += value.to_complex() * (weight * derivative * half_width);
            }
        }
        Ok(total)
    }

    fn limit(
        &mut self,
        variable: &'a str,
        approach: &'a Node,
        direction: Option<Direction>,
        body: &'a Node,
    ) -> Result<Value> {
        let target = self.real_bound(approach, "limit point")?;
        let result = if target.is_infinite() {
            self.one_sided_limit(variable, body, target, -target.signum())?
        } else {
            match direction {
                Some(Direction::FromAbove) => self.one_sided_limit(variable, body, target, 1.0)?,
                Some(Direction::FromBelow) => self.one_sided_limit(variable, body, target, -1.0)?,
                None => {
                    let above = self.one_sided_limit(variable, body, target, 1.0)?;
                    let below = self.one_sided_limit(variable, body, target, -1.0)?;
                    if !above.approx_eq(below, LIMIT_AGREEMENT) {
                        return Err(EvalError::domain(format!(
                            "one-sided limits differ: {below} from below, {above} from above"
                        )));
                    }
                    above
                }
            }
        };
        if result.is_finite() {
            Ok(result)
        } else {
            Err(EvalError::domain("limit does not converge"))
        }
    }

    /// Richardson extrapolation of samples taken at halving distances from
    /// `target` on the given side.
    fn one_sided_limit(&mut self, variable: &'a str, body: &'a Node, target: f64, side: f64) -> Result<Value> {
        let steps = self.options.limit_steps.max(1);
        let mut previous: Vec<Complex64> = vec![];
        for k in 0..steps {
            let h = LIMIT_INITIAL_STEP / 2f64.powi(k as i32);
            let x = if target.is_infinite() {
                target.signum() / h
            } else {
                target + side * h * target.abs().max(1.0)
            };
            let sample = self.with_bound(variable, Value::Real(x), body)?;
            let mut row = Vec::with_capacity(k + 1);
            row.push(sample.to_complex());
            for j in 1..=k {
                let refined = row[j - 1] + (row[j - 1] - previous[j - 1]) / (2f64.powi(j as i32) - 1.0);
                row.push(refined);
            }
            previous = row;
        }
        previous
            .last()
            .map(|&z| Value::from_complex(z))
            .ok_or_else(|| EvalError::domain("limit without samples"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parse::{ParseOptions, parse_answer};
    use rand::{SeedableRng, rngs::StdRng};

    fn run(source: &str) -> Result<Value> {
        let names = vec!["x".to_string()];
        let binding = ParameterBinding::bind(&names, &mut StdRng::seed_from_u64(0));
        let mut answer = parse_answer(source, &ParseOptions::with_variables(["x"])).unwrap();
        let node = answer.members.remove(0).node.unwrap();
        evaluate(&node, &binding, &EvalOptions::default())
    }

    #[track_caller]
    fn assert_close(source: &str, expected: f64) {
        let actual = run(source).unwrap();
        assert!(
            actual.approx_eq(Value::Real(expected), 1e-6),
            "{source}: expected {expected}, got {actual}"
        );
    }

    #[test]
    fn relations() {
        assert_close("y = x + 1", 3.0);
        assert_matches!(run("x < 3"), Err(EvalError::Unsupported(_)));
    }

    #[test]
    fn series() {
        assert_close(r"\sum_{k=1}^{10} k", 55.0);
        assert_close(r"\prod_{k=1}^{5} k", 120.0);
        assert_close(r"\sum_{k=3}^{1} k", 0.0);
        assert_close(r"\prod_{k=3}^{1} k", 1.0);
        assert_close(r"\sum_{k=1}^{x} k^2", 5.0);
        assert_matches!(run(r"\sum_{k=1}^{2.5} k"), Err(EvalError::Domain(_)));
        assert_matches!(run(r"\sum_{k=1}^{10^7} k"), Err(EvalError::Domain(_)));
    }

    #[test]
    fn bound_variables_shadow_parameters() {
        assert_close(r"\sum_{x=1}^{3} x", 6.0);
        assert_close(r"x + \sum_{x=1}^{3} x", 8.0);
    }

    #[test]
    fn integrals() {
        assert_close(r"\int_0^1 x^2 dx", 1.0 / 3.0);
        assert_close(r"\int_0^{\pi} \sin t \, dt", 2.0);
        assert_close(r"\int_1^0 x dx", -0.5);
        assert_close(r"\int_0^\infty e^{-t} dt", 1.0);
        assert_close(r"\int_{-\infty}^{\infty} e^{-t^2} dt", std::f64::consts::PI.sqrt());
        assert_close(r"\int_{-\infty}^{0} e^{t} dt", 1.0);
        assert_matches!(run(r"\int x dx"), Err(EvalError::Unsupported(_)));
    }

    #[test]
    fn limits() {
        assert_close(r"\lim_{t \to 0} \frac{\sin t}{t}", 1.0);
        assert_close(r"\lim_{n \to \infty} (1 + \frac{1}{n})^n", std::f64::consts::E);
        assert_close(r"\lim_{t \to 0^+} \frac{|t|}{t}", 1.0);
        assert_close(r"\lim_{t \to 0^-} \frac{|t|}{t}", -1.0);
        assert_matches!(run(r"\lim_{t \to 0} \frac{|t|}{t}"), Err(EvalError::Domain(_)));
    }

    #[test]
    fn unknown_symbols() {
        assert_eq!(run("x + y"), Err(EvalError::UnknownParameter("y".into())));
    }
}
