use crate::{
    ast::{BinaryOperator, Direction, SumProdKind},
    function::Function,
    lexer::RelationKind,
};

/// Which implicit-multiplication shape joined two adjacent factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjacency {
    NumberOrSymbol,
    Groups,
    Functions,
    Fraction,
    Power,
    GroupFunction,
    DelimitedFunction,
    /// `\sin x` followed by anything its bare argument stopped at.
    BareFunction,
    Differential,
}

/// Parser output before normalization. Keeps grammar-level detail the
/// normalizer consumes: adjacency shapes, differential markers, roots and
/// derivative forms.
#[derive(Debug, Clone, PartialEq)]
pub enum Syntax {
    Number(String),
    Symbol(String),
    Infinity,
    BinaryOperation {
        operation: BinaryOperator,
        left: Box<Syntax>,
        right: Box<Syntax>,
    },
    Juxtaposition {
        adjacency: Adjacency,
        left: Box<Syntax>,
        right: Box<Syntax>,
    },
    Neg(Box<Syntax>),
    Power {
        base: Box<Syntax>,
        exponent: Box<Syntax>,
    },
    Dagger(Box<Syntax>),
    Group(Box<Syntax>),
    Fraction {
        numerator: Box<Syntax>,
        denominator: Box<Syntax>,
    },
    Binomial {
        top: Box<Syntax>,
        bottom: Box<Syntax>,
    },
    Root {
        index: Option<Box<Syntax>>,
        radicand: Box<Syntax>,
    },
    Apply {
        function: Function,
        args: Vec<Syntax>,
        delimited: bool,
    },
    ApplyUser {
        name: String,
        args: Vec<Syntax>,
    },
    PowerOfFunction {
        function: Function,
        exponent: Box<Syntax>,
        args: Vec<Syntax>,
    },
    Factorial(Box<Syntax>),
    Prime(Box<Syntax>),
    Differential {
        variable: Option<String>,
        partial: bool,
    },
    SumProd {
        kind: SumProdKind,
        variable: String,
        lower_bound: Box<Syntax>,
        upper_bound: Box<Syntax>,
        body: Box<Syntax>,
    },
    Integral {
        lower_bound: Option<Box<Syntax>>,
        upper_bound: Option<Box<Syntax>>,
        body: Box<Syntax>,
    },
    Limit {
        variable: String,
        approach: Box<Syntax>,
        direction: Option<Direction>,
        body: Box<Syntax>,
    },
    Relation {
        kind: RelationKind,
        left: Box<Syntax>,
        right: Box<Syntax>,
    },
}

impl Syntax {
    /// The factor that decides which adjacency rule applies to whatever
    /// follows this node.
    pub fn last_factor(&self) -> &Syntax {
        match self {
            Syntax::BinaryOperation {
                operation: BinaryOperator::Mul | BinaryOperator::Div,
                right,
                ..
            }
            | Syntax::Juxtaposition { right, .. } => right.last_factor(),
            _ => self,
        }
    }

    pub fn is_differential(&self) -> bool {
        matches!(self, Syntax::Differential { .. })
    }
}
