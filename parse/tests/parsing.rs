use assert_matches::assert_matches;
use parse::{Node, ParseError, ParseOptions, parse_answer, parse_parameter_names};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn options() -> ParseOptions {
    ParseOptions::with_variables(["x", "a", "b"])
}

/// Parses a one-member answer.
fn parse_expression(source: &str, options: &ParseOptions) -> Result<Node, ParseError> {
    let mut answer = parse_answer(source, options)?;
    assert_eq!(answer.members.len(), 1, "{source}");
    answer.members.remove(0).node
}

#[track_caller]
fn assert_canonical(source: &str, expected: &str) {
    println!("expression: {source}");
    let node = parse_expression(source, &options()).unwrap();
    assert_eq!(node.to_string(), expected);
}

#[rstest]
#[case(r"2x", "2*x")]
#[case(r"x a b", "(x*a)*b")]
#[case(r"2/3x", "(2/3)*x")]
#[case(r"\frac{1}{2}x", "(1/2)*x")]
#[case(r"(x+1)(x-1)", "(x + 1)*(x - 1)")]
#[case(r"(x+1)x", "(x + 1)*x")]
#[case(r"(x+1)\sin x", "(x + 1)*sin(x)")]
#[case(r"\sin x \cos x", "sin(x)*cos(x)")]
#[case(r"\sin 2x", "sin(2*x)")]
#[case(r"\sin x a", "sin(x)*a")]
#[case(r"a \cos x \left(a + b\right)", "(a*cos(x))*(a + b)")]
#[case(r"\ln x \cdot a", "ln(x)*a")]
#[case(r"\sin x / 2", "sin(x)/2")]
#[case(r"\sin x^2", "sin(x^2)")]
#[case(r"x^2 a", "(x^2)*a")]
#[case(r"x(x+1)", "x*(x + 1)")]
#[case(r"y(x)", "y(x)")]
#[case(r"\ln x + 1", "ln(x) + 1")]
#[case(r"\log_2 x", "log(x, 2)")]
#[case(r"\sqrt{x}", "sqrt(x)")]
#[case(r"|x - a|", "abs(x - a)")]
#[case(r"\binom{a}{b}", "binomial(a, b)")]
#[case(r"\sin^{-1} x", "asin(x)")]
#[case(r"\arcsin x", "asin(x)")]
#[case(r"\operatorname{arsinh}(x)", "asinh(x)")]
#[case(r"\cos^2 x", "cos(x)^2")]
#[case(r"3!", "3!")]
#[case(r"\prod_{k=1}^{a} k", "product(k, 1, a, k)")]
#[case(r"\int_{0}^{1} \frac{dx}{1+x}", "integral(1/(1 + x), x, 0, 1)")]
#[case(r"\int_{0}^{1} \frac{{x}{d x}}{1+x}", "integral(x/(1 + x), x, 0, 1)")]
#[case(r"\int \frac{{x}{d x}}{1+x}", "integral(x/(1 + x), x)")]
#[case(r"\lim_{t \to \infty} \frac{1}{t}", "limit(1/t, t, inf)")]
#[case(r"\lim_{t \to 0^{-}} t", "limit(t, t, 0, -)")]
#[case(r"\left[ x \right]", "(x)")]
fn canonical(#[case] source: &str, #[case] expected: &str) {
    assert_canonical(source, expected);
}

#[rstest]
#[case(r"x^")]
#[case(r"\frac{1}")]
#[case(r"(x+1")]
#[case(r"x +")]
#[case(r"\sum_{k}^{3} k")]
fn syntax_error(#[case] source: &str) {
    assert_matches!(parse_expression(source, &options()), Err(ParseError::Syntax(_)));
}

#[rstest]
#[case(r"\frac{d}{dx} x^2")]
#[case(r"\frac{\partial f}{\partial x}")]
#[case(r"x'")]
#[case(r"\int x")]
#[case(r"\sin(x, a)")]
fn unsupported(#[case] source: &str) {
    assert_matches!(parse_expression(source, &options()), Err(ParseError::Unsupported(_)));
}

#[rstest]
#[case(r"\foo x")]
#[case(r"x # 2")]
#[case(r"\text{hello world}")]
fn lex_error(#[case] source: &str) {
    assert_matches!(parse_expression(source, &options()), Err(ParseError::Lex(_)));
}

#[test]
fn members_render_independently() {
    let answer = parse_answer(r"\boxed{x; \frac{1}{x}, x^}", &options()).unwrap();
    let rendered = answer
        .members
        .iter()
        .map(|m| m.node.as_ref().map(ToString::to_string).ok())
        .collect::<Vec<_>>();
    assert_eq!(rendered, [Some("x".to_string()), Some("1/x".to_string()), None]);
}

#[test]
fn rendering_is_deterministic() {
    let source = r"\frac{24\pi\sqrt{2\pi}}{36\pi^{2}+48} a^{-1/2} e^{a}";
    let first = parse_expression(source, &options()).unwrap();
    let second = parse_expression(source, &options()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn parameter_declarations() {
    assert_eq!(
        parse_parameter_names(r"$a, b_{12}; \theta, a$").unwrap(),
        ["a", "b_12", "theta"]
    );
    assert_matches!(parse_parameter_names("ab"), Err(_));
}
