use std::collections::HashSet;

use parse::{Node, ast::CONSTANTS};
use rand::Rng;

use crate::EvalError;

/// The value `x` always takes.
pub const X_VALUE: f64 = 2.0;

/// Numeric values for the declared parameters, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterBinding {
    values: Vec<(String, f64)>,
}

impl ParameterBinding {
    /// Binds `x` to 2 and draws every other name uniformly from `[1, 2)`,
    /// one draw per name in order.
    pub fn bind<R: Rng + ?Sized>(names: &[String], rng: &mut R) -> Self {
        let mut seen = HashSet::new();
        names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .map(|name| {
                let value = if name == "x" {
                    X_VALUE
                } else {
                    rng.gen_range(1.0..2.0)
                };
                (name.clone(), value)
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    /// Fails on the first free symbol that is neither declared nor a
    /// constant.
    pub fn check(&self, node: &Node) -> Result<(), EvalError> {
        match node
            .free_symbols()
            .into_iter()
            .find(|symbol| self.get(symbol).is_none() && !CONSTANTS.contains(&symbol.as_str()))
        {
            Some(symbol) => Err(EvalError::UnknownParameter(symbol)),
            None => Ok(()),
        }
    }
}

/// Binds names to given values. A repeated name keeps its first value.
impl<S: Into<String>> FromIterator<(S, f64)> for ParameterBinding {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut binding = Self::default();
        for (name, value) in iter {
            let name = name.into();
            if binding.get(&name).is_none() {
                binding.values.push((name, value));
            }
        }
        binding
    }
}
