use std::f64::consts::{FRAC_PI_2, LN_10, PI};

use num_complex::Complex64;
use parse::function::Function;

use crate::{EvalError, value::Value};

type Result<T> = std::result::Result<T, EvalError>;

fn map(a: Value, real: fn(f64) -> f64, complex: fn(Complex64) -> Complex64) -> Value {
    match a {
        Value::Real(x) => Value::Real(real(x)),
        Value::Complex(z) => Value::from_complex(complex(z)),
    }
}

fn real_argument(a: Value, function: Function) -> Result<f64> {
    a.as_real()
        .ok_or_else(|| EvalError::domain(format!("{function} of a complex number")))
}

/// Rounds to an integer when within `1e-9` of one.
pub fn as_integer(x: f64) -> Option<i64> {
    let rounded = x.round();
    ((x - rounded).abs() <= 1e-9 && rounded.abs() < 9.0e15).then_some(rounded as i64)
}

pub fn add(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Real(x), Value::Real(y)) => Value::Real(x + y),
        _ => Value::from_complex(a.to_complex() + b.to_complex()),
    }
}

pub fn subtract(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Real(x), Value::Real(y)) => Value::Real(x - y),
        _ => Value::from_complex(a.to_complex() - b.to_complex()),
    }
}

pub fn multiply(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Real(x), Value::Real(y)) => Value::Real(x * y),
        _ => Value::from_complex(a.to_complex() * b.to_complex()),
    }
}

pub fn divide(a: Value, b: Value) -> Result<Value> {
    if b.magnitude() <= f64::EPSILON {
        return Err(EvalError::DivisionByZero);
    }
    Ok(match (a, b) {
        (Value::Real(x), Value::Real(y)) => Value::Real(x / y),
        _ => Value::from_complex(a.to_complex() / b.to_complex()),
    })
}

pub fn negate(a: Value) -> Value {
    match a {
        Value::Real(x) => Value::Real(-x),
        Value::Complex(z) => Value::Complex(-z),
    }
}

fn reciprocal(a: Value) -> Result<Value> {
    divide(Value::Real(1.0), a)
}

pub fn power(base: Value, exponent: Value) -> Result<Value> {
    match (base, exponent) {
        (Value::Real(b), Value::Real(e)) => {
            if b == 0.0 && e < 0.0 {
                Err(EvalError::DivisionByZero)
            } else if b < 0.0 && e.is_finite() && e.fract() != 0.0 {
                Ok(Value::from_complex(Complex64::new(b, 0.0).powf(e)))
            } else {
                Ok(Value::Real(b.powf(e)))
            }
        }
        _ => {
            let (b, e) = (base.to_complex(), exponent.to_complex());
            if b.norm() == 0.0 {
                return if e.re > 0.0 {
                    Ok(Value::Real(0.0))
                } else {
                    Err(EvalError::DivisionByZero)
                };
            }
            Ok(Value::from_complex(b.powc(e)))
        }
    }
}

pub fn ln(a: Value) -> Result<Value> {
    match a {
        Value::Real(x) if x > 0.0 => Ok(Value::Real(x.ln())),
        Value::Real(x) if x < 0.0 => Ok(Value::Complex(Complex64::new((-x).ln(), PI))),
        Value::Complex(z) if z.norm() > 0.0 => Ok(Value::from_complex(z.ln())),
        _ => Err(EvalError::domain("logarithm of zero")),
    }
}

fn sqrt(a: Value) -> Value {
    match a {
        Value::Real(x) if x >= 0.0 => Value::Real(x.sqrt()),
        Value::Real(x) => Value::Complex(Complex64::new(0.0, (-x).sqrt())),
        Value::Complex(z) => Value::from_complex(z.sqrt()),
    }
}

fn asin(a: Value) -> Value {
    match a {
        Value::Real(x) if x.abs() <= 1.0 => Value::Real(x.asin()),
        Value::Real(x) => {
            let y = (x.abs() + (x * x - 1.0).sqrt()).ln();
            if x > 1.0 {
                Value::Complex(Complex64::new(FRAC_PI_2, -y))
            } else {
                Value::Complex(Complex64::new(-FRAC_PI_2, y))
            }
        }
        Value::Complex(z) => Value::from_complex(z.asin()),
    }
}

fn acos(a: Value) -> Value {
    match a {
        Value::Real(x) if x.abs() <= 1.0 => Value::Real(x.acos()),
        Value::Real(_) => subtract(Value::Real(FRAC_PI_2), asin(a)),
        Value::Complex(z) => Value::from_complex(z.acos()),
    }
}

fn acot(a: Value) -> Value {
    match a {
        Value::Real(x) if x == 0.0 => Value::Real(FRAC_PI_2),
        Value::Real(x) => Value::Real((1.0 / x).atan()),
        Value::Complex(z) => Value::from_complex(z.inv().atan()),
    }
}

fn acosh(a: Value) -> Value {
    match a {
        Value::Real(x) if x >= 1.0 => Value::Real(x.acosh()),
        Value::Real(x) if x >= -1.0 => Value::Complex(Complex64::new(0.0, x.acos())),
        Value::Real(x) => Value::Complex(Complex64::new((-x + (x * x - 1.0).sqrt()).ln(), PI)),
        Value::Complex(z) => Value::from_complex(z.acosh()),
    }
}

fn atanh(a: Value) -> Result<Value> {
    match a {
        Value::Real(x) if x.abs() < 1.0 => Ok(Value::Real(x.atanh())),
        Value::Real(x) if x.abs() == 1.0 => Err(EvalError::domain("atanh at a pole")),
        Value::Real(x) => {
            let ratio = Complex64::new((1.0 + x) / (1.0 - x), 0.0);
            Ok(Value::from_complex(ratio.ln() * 0.5))
        }
        Value::Complex(z) => Ok(Value::from_complex(z.atanh())),
    }
}

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

fn lanczos_gamma(z: Complex64) -> Complex64 {
    if z.re < 0.5 {
        // reflection
        let pi = Complex64::new(PI, 0.0);
        return pi / ((pi * z).sin() * lanczos_gamma(1.0 - z));
    }
    let z = z - 1.0;
    let mut sum = Complex64::new(LANCZOS_COEFFICIENTS[0], 0.0);
    for (i, &c) in LANCZOS_COEFFICIENTS.iter().enumerate().skip(1) {
        sum += c / (z + i as f64);
    }
    let t = z + LANCZOS_G + 0.5;
    (2.0 * PI).sqrt() * t.powc(z + 0.5) * (-t).exp() * sum
}

pub fn gamma(a: Value) -> Result<Value> {
    match a {
        Value::Real(x) => {
            if x <= 0.0 && as_integer(x).is_some() {
                return Err(EvalError::domain("gamma at a non-positive integer"));
            }
            if x > 171.7 {
                return Ok(Value::Real(f64::INFINITY));
            }
            Ok(Value::Real(lanczos_gamma(Complex64::new(x, 0.0)).re))
        }
        Value::Complex(z) => Ok(Value::from_complex(lanczos_gamma(z))),
    }
}

pub fn factorial(a: Value) -> Result<Value> {
    let n = a
        .as_real()
        .and_then(as_integer)
        .filter(|&n| n >= 0)
        .ok_or_else(|| EvalError::domain("factorial of a non-negative integer only"))?;
    if n > 170 {
        return Ok(Value::Real(f64::INFINITY));
    }
    Ok(Value::Real((1..=n).map(|k| k as f64).product()))
}

pub fn binomial(top: Value, bottom: Value) -> Result<Value> {
    let (Some(n), Some(k)) = (top.as_real(), bottom.as_real()) else {
        return Err(EvalError::domain("binomial of a complex number"));
    };
    match as_integer(k) {
        Some(k) if k < 0 => Ok(Value::Real(0.0)),
        Some(k) if k <= 100_000 => {
            if as_integer(n).is_some_and(|n| n >= 0 && k > n) {
                return Ok(Value::Real(0.0));
            }
            let mut result = 1.0;
            for i in 0..k {
                result *= (n - i as f64) / (i + 1) as f64;
            }
            Ok(Value::Real(result))
        }
        _ => {
            let numerator = gamma(Value::Real(n + 1.0))?;
            let denominator = multiply(gamma(Value::Real(k + 1.0))?, gamma(Value::Real(n - k + 1.0))?);
            divide(numerator, denominator)
        }
    }
}

fn extremum(args: &[Value], function: Function, pick: fn(f64, f64) -> f64) -> Result<Value> {
    let mut values = args.iter().map(|&a| real_argument(a, function));
    let first = values
        .next()
        .ok_or_else(|| EvalError::domain(format!("{function} of nothing")))??;
    values
        .try_fold(first, |best, x| Ok::<_, EvalError>(pick(best, x?)))
        .map(Value::Real)
}

/// Applies a builtin to already evaluated arguments.
pub fn call(function: Function, args: &[Value]) -> Result<Value> {
    use Function::*;
    let Some(&a) = args.first() else {
        return Err(EvalError::Unsupported(format!("{function} without arguments")));
    };
    let second = args.get(1).copied();
    Ok(match function {
        Sin => map(a, f64::sin, Complex64::sin),
        Cos => map(a, f64::cos, Complex64::cos),
        Tan => map(a, f64::tan, Complex64::tan),
        Sec => reciprocal(call(Cos, args)?)?,
        Csc => reciprocal(call(Sin, args)?)?,
        Cot => divide(call(Cos, args)?, call(Sin, args)?)?,
        Sinh => map(a, f64::sinh, Complex64::sinh),
        Cosh => map(a, f64::cosh, Complex64::cosh),
        Tanh => map(a, f64::tanh, Complex64::tanh),
        Sech => reciprocal(call(Cosh, args)?)?,
        Csch => reciprocal(call(Sinh, args)?)?,
        Coth => divide(call(Cosh, args)?, call(Sinh, args)?)?,
        Asin => asin(a),
        Acos => acos(a),
        Atan => map(a, f64::atan, Complex64::atan),
        Asec => acos(reciprocal(a)?),
        Acsc => asin(reciprocal(a)?),
        Acot => acot(a),
        Asinh => map(a, f64::asinh, Complex64::asinh),
        Acosh => acosh(a),
        Atanh => atanh(a)?,
        Asech => acosh(reciprocal(a)?),
        Acsch => map(reciprocal(a)?, f64::asinh, Complex64::asinh),
        Acoth => atanh(reciprocal(a)?)?,
        Log => match second {
            Some(base) => divide(ln(a)?, ln(base)?)?,
            None => ln(a)?,
        },
        Ln => ln(a)?,
        Lg => match a {
            Value::Real(x) if x > 0.0 => Value::Real(x.log10()),
            _ => divide(ln(a)?, Value::Real(LN_10))?,
        },
        Exp => map(a, f64::exp, Complex64::exp),
        Sqrt => match second {
            Some(index) => power(a, reciprocal(index)?)?,
            None => sqrt(a),
        },
        Abs => Value::Real(a.magnitude()),
        Floor => Value::Real(real_argument(a, function)?.floor()),
        Ceil => Value::Real(real_argument(a, function)?.ceil()),
        Conjugate | Bra => Value::from_complex(a.to_complex().conj()),
        Ket => a,
        InnerProduct => {
            let b = second.ok_or_else(|| EvalError::Unsupported(format!("{function} of one argument")))?;
            multiply(Value::from_complex(a.to_complex().conj()), b)
        }
        Min => extremum(args, function, f64::min)?,
        Max => extremum(args, function, f64::max)?,
        Gamma => gamma(a)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn close(actual: Value, re: f64, im: f64) -> bool {
        actual.approx_eq(Value::Complex(Complex64::new(re, im)), 1e-9)
    }

    #[test]
    fn inverse_trig_outside_the_real_domain() {
        let asin2 = call(Function::Asin, &[Value::Real(2.0)]).unwrap();
        assert!(close(asin2, FRAC_PI_2, -1.3169578969248166), "{asin2}");
        let acos2 = call(Function::Acos, &[Value::Real(2.0)]).unwrap();
        assert!(close(acos2, 0.0, 1.3169578969248166), "{acos2}");
        let acosh_half = call(Function::Acosh, &[Value::Real(0.5)]).unwrap();
        assert!(close(acosh_half, 0.0, 0.5_f64.acos()), "{acosh_half}");
        let atanh2 = call(Function::Atanh, &[Value::Real(2.0)]).unwrap();
        assert!(close(atanh2, 0.5 * 3.0_f64.ln(), FRAC_PI_2), "{atanh2}");
    }

    #[test]
    fn poles_and_zeros() {
        assert_matches!(call(Function::Atanh, &[Value::Real(1.0)]), Err(EvalError::Domain(_)));
        assert_matches!(call(Function::Ln, &[Value::Real(0.0)]), Err(EvalError::Domain(_)));
        assert_matches!(gamma(Value::Real(-2.0)), Err(EvalError::Domain(_)));
        assert_matches!(divide(Value::Real(1.0), Value::Real(1e-17)), Err(EvalError::DivisionByZero));
        assert_matches!(power(Value::Real(0.0), Value::Real(-1.0)), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn negative_logarithm_and_root() {
        assert!(close(ln(Value::Real(-1.0)).unwrap(), 0.0, PI));
        assert_eq!(call(Function::Sqrt, &[Value::Real(-4.0)]), Ok(Value::Complex(Complex64::new(0.0, 2.0))));
        let cube_root = power(Value::Real(-8.0), Value::Real(1.0 / 3.0)).unwrap();
        assert!(close(cube_root, 1.0, 3.0_f64.sqrt()), "{cube_root}");
    }

    #[test]
    fn gamma_and_factorial() {
        assert!(gamma(Value::Real(5.0)).unwrap().approx_eq(Value::Real(24.0), 1e-12));
        assert!(gamma(Value::Real(0.5)).unwrap().approx_eq(Value::Real(PI.sqrt()), 1e-12));
        assert_eq!(factorial(Value::Real(5.0)), Ok(Value::Real(120.0)));
        assert_eq!(factorial(Value::Real(0.0)), Ok(Value::Real(1.0)));
        assert_matches!(factorial(Value::Real(2.5)), Err(EvalError::Domain(_)));
        assert_matches!(factorial(Value::Real(-1.0)), Err(EvalError::Domain(_)));
    }

    #[test]
    fn binomials() {
        assert_eq!(binomial(Value::Real(5.0), Value::Real(2.0)), Ok(Value::Real(10.0)));
        assert_eq!(binomial(Value::Real(3.0), Value::Real(5.0)), Ok(Value::Real(0.0)));
        assert_eq!(binomial(Value::Real(2.5), Value::Real(1.0)), Ok(Value::Real(2.5)));
        let half = binomial(Value::Real(1.0), Value::Real(0.5)).unwrap();
        assert!(half.approx_eq(Value::Real(4.0 / PI), 1e-9), "{half}");
    }

    #[test]
    fn conjugates_and_inner_product() {
        let z = Value::Complex(Complex64::new(1.0, 2.0));
        assert_eq!(call(Function::Bra, &[z]), Ok(Value::Complex(Complex64::new(1.0, -2.0))));
        assert_eq!(call(Function::Ket, &[z]), Ok(z));
        assert_eq!(call(Function::InnerProduct, &[z, z]), Ok(Value::Real(5.0)));
        let magnitude = call(Function::Abs, &[z]).unwrap();
        assert!(magnitude.approx_eq(Value::Real(5.0_f64.sqrt()), 1e-12));
    }

    #[test]
    fn extrema_need_reals() {
        let args = [Value::Real(3.0), Value::Real(-1.0), Value::Real(2.0)];
        assert_eq!(call(Function::Min, &args), Ok(Value::Real(-1.0)));
        assert_eq!(call(Function::Max, &args), Ok(Value::Real(3.0)));
        assert_matches!(
            call(Function::Max, &[Value::imaginary_unit()]),
            Err(EvalError::Domain(_))
        );
        assert_matches!(call(Function::Floor, &[Value::imaginary_unit()]), Err(EvalError::Domain(_)));
    }
}
