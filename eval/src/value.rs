use std::{fmt, str::FromStr};

use num_complex::Complex64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Real(f64),
    Complex(Complex64),
}

impl Value {
    pub fn imaginary_unit() -> Value {
        Value::Complex(Complex64::new(0.0, 1.0))
    }

    /// Collapses a complex number with an exactly zero imaginary part to a
    /// real.
    pub fn from_complex(z: Complex64) -> Value {
        if z.im == 0.0 {
            Value::Real(z.re)
        } else {
            Value::Complex(z)
        }
    }

    pub fn to_complex(self) -> Complex64 {
        match self {
            Value::Real(x) => Complex64::new(x, 0.0),
            Value::Complex(z) => z,
        }
    }

    pub fn as_real(self) -> Option<f64> {
        match self {
            Value::Real(x) => Some(x),
            Value::Complex(_) => None,
        }
    }

    pub fn magnitude(self) -> f64 {
        match self {
            Value::Real(x) => x.abs(),
            Value::Complex(z) => z.norm(),
        }
    }

    pub fn is_finite(self) -> bool {
        match self {
            Value::Real(x) => x.is_finite(),
            Value::Complex(z) => z.is_finite(),
        }
    }

    /// `|a - b| <= tolerance * max(1, |a|, |b|)`
    pub fn approx_eq(self, other: Value, tolerance: f64) -> bool {
        let difference = (self.to_complex() - other.to_complex()).norm();
        difference <= tolerance * self.magnitude().max(other.magnitude()).max(1.0)
    }
}

/// Complex values print as `(a+bj)` and reals as plain numbers.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Real(x) => write!(f, "{x}"),
            Value::Complex(z) => {
                let sign = if z.im.is_sign_negative() { '-' } else { '+' };
                write!(f, "({}{sign}{}j)", z.re, z.im.abs())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplexFormatParseError {
    pub text: String,
}

impl fmt::Display for ComplexFormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse '{}' as a complex number", self.text)
    }
}

impl std::error::Error for ComplexFormatParseError {}

impl FromStr for Value {
    type Err = ComplexFormatParseError;

    /// Accepts `(a+bj)`, `a+bj`, `bj` and plain reals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ComplexFormatParseError { text: s.to_string() };
        let trimmed = s.trim();
        let inner = match trimmed.strip_prefix('(') {
            Some(rest) => rest.strip_suffix(')').ok_or_else(error)?.trim(),
            None => trimmed,
        };

        let Some(body) = inner.strip_suffix('j') else {
            return inner.parse().map(Value::Real).map_err(|_| error());
        };
        let bytes = body.as_bytes();
        let split = (1..bytes.len())
            .rev()
            .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'));
        let (re, im) = match split {
            Some(i) => (&body[..i], &body[i..]),
            None => ("0", body),
        };
        let im = match im {
            "" | "+" => "1",
            "-" => "-1",
            other => other,
        };
        let re: f64 = re.trim().parse().map_err(|_| error())?;
        let im: f64 = im.trim().parse().map_err(|_| error())?;
        Ok(Value::Complex(Complex64::new(re, im)))
    }
}
