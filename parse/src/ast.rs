use std::{collections::BTreeSet, fmt};

use crate::{function::Function, lexer::RelationKind};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOperator::Add => " + ",
            BinaryOperator::Sub => " - ",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
        })
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum SumProdKind {
    Sum,
    Prod,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Direction {
    FromAbove,
    FromBelow,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Callee {
    Builtin(Function),
    User(String),
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Builtin(function) => write!(f, "{function}"),
            Callee::User(name) => f.write_str(name),
        }
    }
}

/// Symbols with a fixed meaning unless declared as parameters.
pub const CONSTANTS: &[&str] = &["e", "pi", "i"];

#[derive(Debug, PartialEq, Clone)]
pub enum Node {
    Number(f64),
    Symbol(String),
    BinaryOperation {
        operation: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    UnaryMinus(Box<Node>),
    Power {
        base: Box<Node>,
        exponent: Box<Node>,
    },
    Group(Box<Node>),
    Fraction {
        numerator: Box<Node>,
        denominator: Box<Node>,
    },
    Binomial {
        top: Box<Node>,
        bottom: Box<Node>,
    },
    FunctionCall {
        callee: Callee,
        args: Vec<Node>,
    },
    PowerOfFunction {
        function: Function,
        exponent: Box<Node>,
        args: Vec<Node>,
    },
    Factorial(Box<Node>),
    SumProd {
        kind: SumProdKind,
        variable: String,
        lower_bound: Box<Node>,
        upper_bound: Box<Node>,
        body: Box<Node>,
    },
    Integral {
        lower_bound: Option<Box<Node>>,
        upper_bound: Option<Box<Node>>,
        integrand: Box<Node>,
        variable: String,
    },
    Limit {
        variable: String,
        approach: Box<Node>,
        direction: Option<Direction>,
        body: Box<Node>,
    },
    Relation {
        kind: RelationKind,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    /// Symbols referenced by this node that are not bound by an enclosing
    /// sum, product, integral or limit. User function names count.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        self.collect_free_symbols(&mut vec![], &mut symbols);
        symbols
    }

    fn collect_free_symbols<'a>(&'a self, bound: &mut Vec<&'a str>, symbols: &mut BTreeSet<String>) {
        fn scoped<'a>(
            variable: &'a str,
            body: &'a Node,
            bound: &mut Vec<&'a str>,
            symbols: &mut BTreeSet<String>,
        ) {
            bound.push(variable);
            body.collect_free_symbols(bound, symbols);
            bound.pop();
        }
        match self {
            Node::Number(_) => {}
            Node::Symbol(name) => {
                if !bound.contains(&name.as_str()) {
                    symbols.insert(name.clone());
                }
            }
            Node::BinaryOperation { left, right, .. }
            | Node::Relation { left, right, .. }
            | Node::Power {
                base: left,
                exponent: right,
            }
            | Node::Fraction {
                numerator: left,
                denominator: right,
            }
            | Node::Binomial {
                top: left,
                bottom: right,
            } => {
                left.collect_free_symbols(bound, symbols);
                right.collect_free_symbols(bound, symbols);
            }
            Node::UnaryMinus(x) | Node::Group(x) | Node::Factorial(x) => {
                x.collect_free_symbols(bound, symbols)
            }
            Node::FunctionCall { callee, args } => {
                if let Callee::User(name) = callee {
                    if !bound.contains(&name.as_str()) {
                        symbols.insert(name.clone());
                    }
                }
                for arg in args {
                    arg.collect_free_symbols(bound, symbols);
                }
            }
            Node::PowerOfFunction { exponent, args, .. } => {
                exponent.collect_free_symbols(bound, symbols);
                for arg in args {
                    arg.collect_free_symbols(bound, symbols);
                }
            }
            Node::SumProd {
                variable,
                lower_bound,
                upper_bound,
                body,
                ..
            } => {
                lower_bound.collect_free_symbols(bound, symbols);
                upper_bound.collect_free_symbols(bound, symbols);
                scoped(variable, body, bound, symbols);
            }
            Node::Integral {
                lower_bound,
                upper_bound,
                integrand,
                variable,
            } => {
                for b in [lower_bound, upper_bound].into_iter().flatten() {
                    b.collect_free_symbols(bound, symbols);
                }
                scoped(variable, integrand, bound, symbols);
            }
            Node::Limit {
                variable,
                approach,
                body,
                ..
            } => {
                approach.collect_free_symbols(bound, symbols);
                scoped(variable, body, bound, symbols);
            }
        }
    }

    /// Replaces free symbols for which `lookup` has a value with numbers.
    pub fn substitute(&self, lookup: &impl Fn(&str) -> Option<f64>) -> Node {
        self.substitute_helper(lookup, &mut vec![])
    }

    fn substitute_helper<'a>(
        &'a self,
        lookup: &impl Fn(&str) -> Option<f64>,
        bound: &mut Vec<&'a str>,
    ) -> Node {
        let go = |node: &'a Node, bound: &mut Vec<&'a str>| -> Box<Node> {
            Box::new(node.substitute_helper(lookup, bound))
        };
        match self {
            Node::Symbol(name) if !bound.contains(&name.as_str()) => match lookup(name) {
                Some(value) => Node::Number(value),
                None => self.clone(),
            },
            Node::Number(_) | Node::Symbol(_) => self.clone(),
            Node::BinaryOperation {
                operation,
                left,
                right,
            } => Node::BinaryOperation {
                operation: *operation,
                left: go(left, bound),
                right: go(right, bound),
            },
            Node::UnaryMinus(x) => Node::UnaryMinus(go(x, bound)),
            Node::Power { base, exponent } => Node::Power {
                base: go(base, bound),
                exponent: go(exponent, bound),
            },
            Node::Group(x) => Node::Group(go(x, bound)),
            Node::Fraction {
                numerator,
                denominator,
            } => Node::Fraction {
                numerator: go(numerator, bound),
                denominator: go(denominator, bound),
            },
            Node::Binomial { top, bottom } => Node::Binomial {
                top: go(top, bound),
                bottom: go(bottom, bound),
            },
            Node::FunctionCall { callee, args } => Node::FunctionCall {
                callee: callee.clone(),
                args: args.iter().map(|a| *go(a, bound)).collect(),
            },
            Node::PowerOfFunction {
                function,
                exponent,
                args,
            } => Node::PowerOfFunction {
                function: *function,
                exponent: go(exponent, bound),
                args: args.iter().map(|a| *go(a, bound)).collect(),
            },
            Node::Factorial(x) => Node::Factorial(go(x, bound)),
            Node::SumProd {
                kind,
                variable,
                lower_bound,
                upper_bound,
                body,
            } => {
                let lower_bound = go(lower_bound, bound);
                let upper_bound = go(upper_bound, bound);
                bound.push(variable);
                let body = go(body, bound);
                bound.pop();
                Node::SumProd {
                    kind: *kind,
                    variable: variable.clone(),
                    lower_bound,
                    upper_bound,
                    body,
                }
            }
            Node::Integral {
                lower_bound,
                upper_bound,
                integrand,
                variable,
            } => {
                let lower_bound = lower_bound.as_ref().map(|b| go(b, bound));
                let upper_bound = upper_bound.as_ref().map(|b| go(b, bound));
                bound.push(variable);
                let integrand = go(integrand, bound);
                bound.pop();
                Node::Integral {
                    lower_bound,
                    upper_bound,
                    integrand,
                    variable: variable.clone(),
                }
            }
            Node::Limit {
                variable,
                approach,
                direction,
                body,
            } => {
                let approach = go(approach, bound);
                bound.push(variable);
                let body = go(body, bound);
                bound.pop();
                Node::Limit {
                    variable: variable.clone(),
                    approach,
                    direction: *direction,
                    body,
                }
            }
            Node::Relation { kind, left, right } => Node::Relation {
                kind: *kind,
                left: go(left, bound),
                right: go(right, bound),
            },
        }
    }
}

/// Renders a node, parenthesized unless it is atomic.
struct Operand<'a>(&'a Node);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let atomic = match self.0 {
            Node::Number(x) => *x >= 0.0,
            Node::Symbol(_)
            | Node::Group(_)
            | Node::Binomial { .. }
            | Node::FunctionCall { .. }
            | Node::SumProd { .. }
            | Node::Integral { .. }
            | Node::Limit { .. } => true,
            _ => false,
        };
        if atomic {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Node]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Number(x) if x.is_infinite() => {
                f.write_str(if *x > 0.0 { "inf" } else { "-inf" })
            }
            Node::Number(x) => write!(f, "{x}"),
            Node::Symbol(name) => f.write_str(name),
            Node::BinaryOperation {
                operation,
                left,
                right,
            } => write!(f, "{}{operation}{}", Operand(left), Operand(right)),
            Node::UnaryMinus(x) => write!(f, "-{}", Operand(x)),
            Node::Power { base, exponent } => {
                write!(f, "{}^{}", Operand(base), Operand(exponent))
            }
            Node::Group(x) => write!(f, "({x})"),
            Node::Fraction {
                numerator,
                denominator,
            } => write!(f, "{}/{}", Operand(numerator), Operand(denominator)),
            Node::Binomial { top, bottom } => write!(f, "binomial({top}, {bottom})"),
            Node::FunctionCall { callee, args } => {
                write!(f, "{callee}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Node::PowerOfFunction {
                function,
                exponent,
                args,
            } => {
                write!(f, "{function}(")?;
                write_list(f, args)?;
                write!(f, ")^{}", Operand(exponent))
            }
            Node::Factorial(x) => write!(f, "{}!", Operand(x)),
            Node::SumProd {
                kind,
                variable,
                lower_bound,
                upper_bound,
                body,
            } => {
                let name = match kind {
                    SumProdKind::Sum => "sum",
                    SumProdKind::Prod => "product",
                };
                write!(f, "{name}({variable}, {lower_bound}, {upper_bound}, {body})")
            }
            Node::Integral {
                lower_bound,
                upper_bound,
                integrand,
                variable,
            } => {
                write!(f, "integral({integrand}, {variable}")?;
                if lower_bound.is_some() || upper_bound.is_some() {
                    for bound in [lower_bound, upper_bound] {
                        match bound {
                            Some(b) => write!(f, ", {b}")?,
                            None => f.write_str(", none")?,
                        }
                    }
                }
                f.write_str(")")
            }
            Node::Limit {
                variable,
                approach,
                direction,
                body,
            } => {
                write!(f, "limit({body}, {variable}, {approach}")?;
                match direction {
                    Some(Direction::FromAbove) => f.write_str(", +")?,
                    Some(Direction::FromBelow) => f.write_str(", -")?,
                    None => {}
                }
                f.write_str(")")
            }
            Node::Relation { kind, left, right } => write!(f, "{left} {kind} {right}"),
        }
    }
}
