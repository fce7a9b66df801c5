use std::ops::RangeInclusive;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Builtin functions recognized by name.
///
/// `to_string` is the canonical spelling used when rendering; every
/// `serialize` attribute is an alias accepted from LaTeX commands and
/// `\operatorname{...}` wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum Function {
    #[strum(to_string = "sin")]
    Sin,
    #[strum(to_string = "cos")]
    Cos,
    #[strum(to_string = "tan")]
    Tan,
    #[strum(to_string = "sec")]
    Sec,
    #[strum(to_string = "csc", serialize = "cosec")]
    Csc,
    #[strum(to_string = "cot")]
    Cot,
    #[strum(to_string = "sinh")]
    Sinh,
    #[strum(to_string = "cosh")]
    Cosh,
    #[strum(to_string = "tanh")]
    Tanh,
    #[strum(to_string = "sech")]
    Sech,
    #[strum(to_string = "csch")]
    Csch,
    #[strum(to_string = "coth")]
    Coth,
    #[strum(to_string = "asin", serialize = "arcsin")]
    Asin,
    #[strum(to_string = "acos", serialize = "arccos")]
    Acos,
    #[strum(to_string = "atan", serialize = "arctan")]
    Atan,
    #[strum(to_string = "asec", serialize = "arcsec")]
    Asec,
    #[strum(to_string = "acsc", serialize = "arccsc")]
    Acsc,
    #[strum(to_string = "acot", serialize = "arccot")]
    Acot,
    #[strum(to_string = "asinh", serialize = "arsinh", serialize = "arcsinh")]
    Asinh,
    #[strum(to_string = "acosh", serialize = "arcosh", serialize = "arccosh")]
    Acosh,
    #[strum(to_string = "atanh", serialize = "artanh", serialize = "arctanh")]
    Atanh,
    #[strum(to_string = "asech", serialize = "arsech", serialize = "arcsech")]
    Asech,
    #[strum(to_string = "acsch", serialize = "arcsch", serialize = "arccsch")]
    Acsch,
    #[strum(to_string = "acoth", serialize = "arcoth", serialize = "arccoth")]
    Acoth,
    #[strum(to_string = "log")]
    Log,
    #[strum(to_string = "ln")]
    Ln,
    #[strum(to_string = "lg")]
    Lg,
    #[strum(to_string = "exp")]
    Exp,
    #[strum(to_string = "sqrt")]
    Sqrt,
    #[strum(to_string = "abs")]
    Abs,
    #[strum(to_string = "floor")]
    Floor,
    #[strum(to_string = "ceil", serialize = "ceiling")]
    Ceil,
    #[strum(to_string = "conjugate", serialize = "conj", serialize = "overline", serialize = "bar")]
    Conjugate,
    #[strum(to_string = "min")]
    Min,
    #[strum(to_string = "max")]
    Max,
    #[strum(to_string = "Gamma")]
    Gamma,
    #[strum(to_string = "bra")]
    Bra,
    #[strum(to_string = "ket")]
    Ket,
    #[strum(to_string = "braket")]
    InnerProduct,
}

impl Function {
    /// The function named by `f^{-1}`, for the trigonometric and hyperbolic
    /// families.
    pub fn inverse(self) -> Option<Function> {
        use Function::*;
        Some(match self {
            Sin => Asin,
            Cos => Acos,
            Tan => Atan,
            Sec => Asec,
            Csc => Acsc,
            Cot => Acot,
            Sinh => Asinh,
            Cosh => Acosh,
            Tanh => Atanh,
            Sech => Asech,
            Csch => Acsch,
            Coth => Acoth,
            _ => return None,
        })
    }

    pub fn arity(self) -> RangeInclusive<usize> {
        use Function::*;
        match self {
            Log | Sqrt => 1..=2,
            Min | Max => 1..=usize::MAX,
            InnerProduct => 2..=2,
            _ => 1..=1,
        }
    }

    /// Whether `\f x` without brackets is accepted.
    pub fn allows_bare_argument(self) -> bool {
        !matches!(self, Function::Min | Function::Max | Function::InnerProduct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn aliases() {
        assert_eq!("arcsin".parse(), Ok(Function::Asin));
        assert_eq!("arcsinh".parse(), Ok(Function::Asinh));
        assert_eq!("arsinh".parse(), Ok(Function::Asinh));
        assert_eq!("overline".parse(), Ok(Function::Conjugate));
        assert_eq!("Gamma".parse(), Ok(Function::Gamma));
        assert!("gamma".parse::<Function>().is_err());
        assert!("x".parse::<Function>().is_err());
    }

    #[test]
    fn canonical_names_parse_back() {
        for function in Function::iter() {
            assert_eq!(function.to_string().parse(), Ok(function));
        }
    }

    #[test]
    fn inverses() {
        assert_eq!(Function::Sin.inverse(), Some(Function::Asin));
        assert_eq!(Function::Coth.inverse(), Some(Function::Acoth));
        assert_eq!(Function::Ln.inverse(), None);
    }
}
