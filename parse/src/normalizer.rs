use std::fmt;

use crate::{
    ast::{BinaryOperator, Callee, Node},
    function::Function,
    syntax::Syntax,
};

/// A construct the grammar accepts but which has no numeric meaning here,
/// such as a symbolic derivative.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsupportedConstructError {
    pub construct: String,
}

impl UnsupportedConstructError {
    fn new(construct: impl Into<String>) -> Self {
        Self {
            construct: construct.into(),
        }
    }
}

impl fmt::Display for UnsupportedConstructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported construct: {}", self.construct)
    }
}

fn contains_differential(syntax: &Syntax) -> bool {
    match syntax {
        Syntax::Differential { .. } => true,
        Syntax::BinaryOperation { left, right, .. }
        | Syntax::Juxtaposition { left, right, .. }
        | Syntax::Relation { left, right, .. } => {
            contains_differential(left) || contains_differential(right)
        }
        Syntax::Neg(x) | Syntax::Group(x) | Syntax::Dagger(x) | Syntax::Factorial(x) => {
            contains_differential(x)
        }
        Syntax::Power { base, exponent } => {
            contains_differential(base) || contains_differential(exponent)
        }
        _ => false,
    }
}

fn lower_box(syntax: Box<Syntax>) -> Result<Box<Node>, UnsupportedConstructError> {
    lower(*syntax).map(Box::new)
}

fn lower_all(args: Vec<Syntax>) -> Result<Vec<Node>, UnsupportedConstructError> {
    args.into_iter().map(lower).collect()
}

fn check_arity(function: Function, count: usize) -> Result<(), UnsupportedConstructError> {
    if function.arity().contains(&count) {
        Ok(())
    } else {
        Err(UnsupportedConstructError::new(format!(
            "{function} with {count} argument{}",
            if count == 1 { "" } else { "s" }
        )))
    }
}

fn is_braced_differential(syntax: &Syntax) -> bool {
    matches!(syntax, Syntax::Group(inner) if inner.is_differential())
}

/// Drops the braces of `{x}{d x}`, the numerator shape of
/// `\int \frac{{x}{d x}}{…}`. Other juxtapositions are left alone.
fn ungroup_pair(left: Syntax, right: Syntax) -> (Syntax, Syntax) {
    if !is_braced_differential(&left) && !is_braced_differential(&right) {
        return (left, right);
    }
    let ungroup = |syntax: Syntax| match syntax {
        Syntax::Group(inner) => *inner,
        other => other,
    };
    (ungroup(left), ungroup(right))
}

/// Removes the differential from an integral body and returns the
/// integrand with the integration variable.
fn split_differential(body: Syntax) -> Result<(Syntax, String), UnsupportedConstructError> {
    let missing = || UnsupportedConstructError::new("integral without a differential");
    match body {
        Syntax::Differential {
            variable: Some(variable),
            partial: false,
        } => Ok((Syntax::Number("1".into()), variable)),
        Syntax::Group(inner) if contains_differential(&inner) => split_differential(*inner),
        Syntax::Juxtaposition { left, right, .. } => match ungroup_pair(*left, *right) {
            (
                integrand,
                Syntax::Differential {
                    variable: Some(variable),
                    partial: false,
                },
            )
            | (
                Syntax::Differential {
                    variable: Some(variable),
                    partial: false,
                },
                integrand,
            ) => Ok((integrand, variable)),
            (left, right) => {
                if contains_differential(&left) || contains_differential(&right) {
                    Err(UnsupportedConstructError::new("differential inside an integrand"))
                } else {
                    Err(missing())
                }
            }
        },
        Syntax::Fraction {
            numerator,
            denominator,
        } => {
            let (numerator, variable) = split_differential(*numerator)?;
            Ok((
                Syntax::Fraction {
                    numerator: Box::new(numerator),
                    denominator,
                },
                variable,
            ))
        }
        _ => Err(missing()),
    }
}

/// Lowers a parse tree to the canonical AST.
pub fn lower(syntax: Syntax) -> Result<Node, UnsupportedConstructError> {
    Ok(match syntax {
        Syntax::Number(text) => Node::Number(
            text.parse()
                .map_err(|_| UnsupportedConstructError::new(format!("number '{text}'")))?,
        ),
        Syntax::Symbol(name) => Node::Symbol(name),
        Syntax::Infinity => Node::Number(f64::INFINITY),
        Syntax::BinaryOperation {
            operation,
            left,
            right,
        } => Node::BinaryOperation {
            operation,
            left: lower_box(left)?,
            right: lower_box(right)?,
        },
        Syntax::Juxtaposition { left, right, .. } => Node::BinaryOperation {
            operation: BinaryOperator::Mul,
            left: lower_box(left)?,
            right: lower_box(right)?,
        },
        Syntax::Neg(x) => Node::UnaryMinus(lower_box(x)?),
        Syntax::Power { base, exponent } => Node::Power {
            base: lower_box(base)?,
            exponent: lower_box(exponent)?,
        },
        Syntax::Dagger(x) => Node::FunctionCall {
            callee: Callee::Builtin(Function::Conjugate),
            args: vec![lower(*x)?],
        },
        Syntax::Group(x) => Node::Group(lower_box(x)?),
        Syntax::Fraction {
            numerator,
            denominator,
        } => {
            let bare_operator = matches!(*numerator, Syntax::Differential { variable: None, .. });
            if bare_operator || contains_differential(&denominator) {
                return Err(UnsupportedConstructError::new("derivative"));
            }
            Node::Fraction {
                numerator: lower_box(numerator)?,
                denominator: lower_box(denominator)?,
            }
        }
        Syntax::Binomial { top, bottom } => Node::Binomial {
            top: lower_box(top)?,
            bottom: lower_box(bottom)?,
        },
        Syntax::Root { index, radicand } => {
            let mut args = vec![lower(*radicand)?];
            if let Some(index) = index {
                args.push(lower(*index)?);
            }
            Node::FunctionCall {
                callee: Callee::Builtin(Function::Sqrt),
                args,
            }
        }
        Syntax::Apply { function, args, .. } => {
            check_arity(function, args.len())?;
            Node::FunctionCall {
                callee: Callee::Builtin(function),
                args: lower_all(args)?,
            }
        }
        Syntax::ApplyUser { name, args } => match name.parse::<Function>() {
            Ok(function) => {
                check_arity(function, args.len())?;
                Node::FunctionCall {
                    callee: Callee::Builtin(function),
                    args: lower_all(args)?,
                }
            }
            Err(_) => Node::FunctionCall {
                callee: Callee::User(name),
                args: lower_all(args)?,
            },
        },
        Syntax::PowerOfFunction {
            function,
            exponent,
            args,
        } => {
            check_arity(function, args.len())?;
            Node::PowerOfFunction {
                function,
                exponent: lower_box(exponent)?,
                args: lower_all(args)?,
            }
        }
        Syntax::Factorial(x) => Node::Factorial(lower_box(x)?),
        Syntax::Prime(_) => return Err(UnsupportedConstructError::new("derivative")),
        Syntax::Differential { partial: true, .. } => {
            return Err(UnsupportedConstructError::new("partial derivative"));
        }
        Syntax::Differential { .. } => {
            return Err(UnsupportedConstructError::new("differential outside an integral"));
        }
        Syntax::SumProd {
            kind,
            variable,
            lower_bound,
            upper_bound,
            body,
        } => Node::SumProd {
            kind,
            variable,
            lower_bound: lower_box(lower_bound)?,
            upper_bound: lower_box(upper_bound)?,
            body: lower_box(body)?,
        },
        Syntax::Integral {
            lower_bound,
            upper_bound,
            body,
        } => {
            let (integrand, variable) = split_differential(*body)?;
            Node::Integral {
                lower_bound: lower_bound.map(lower_box).transpose()?,
                upper_bound: upper_bound.map(lower_box).transpose()?,
                integrand: Box::new(lower(integrand)?),
                variable,
            }
        }
        Syntax::Limit {
            variable,
            approach,
            direction,
            body,
        } => Node::Limit {
            variable,
            approach: lower_box(approach)?,
            direction,
            body: lower_box(body)?,
        },
        Syntax::Relation { kind, left, right } => Node::Relation {
            kind,
            left: lower_box(left)?,
            right: lower_box(right)?,
        },
    })
}
