//! # Function Catalogue
//!
//! Evaluation of `Func` nodes once their arguments are evaluated.
//!
//! - numeric arguments fold to numbers, exactly where the result is exact (`sqrt(9) = 3`,
//!   `sqrt(-4) = 2i`, `ln(1) = 0`, `cos(0) = 1`), in double or complex-double precision otherwise,
//! - array arguments map element-wise,
//! - a few special forms cancel: `exp(ln x) = x`, `ln(exp x) = x`, `sqrt(x^2) = abs(x)`,
//! - symbolic arguments keep the function node.
//!
//! `fact` reads the shared factorial table, `det` is a Leibniz sum over the shared permutation
//! table, `randlist` is gated by the controller's randomness capability.

use crate::symbolic::symbolic_caches::{MAX_FACTORIAL, factorial, permutations};
use crate::symbolic::symbolic_controller::{Controller, random_allowed};
use crate::symbolic::symbolic_engine::{Expr, ExprKind, FuncKind, OpKind};
use crate::symbolic::symbolic_numbers::Number;
use crate::symbolic::symbolic_simplify::{add, compare, mul, neg, pow};
use log::warn;
use num_complex::Complex64;
use rand::Rng;

/// Longest list `randlist` will build.
pub const MAX_RANDOM_LIST: i64 = 1 << 20;
/// Largest matrix `det` expands, the Leibniz sum has `n!` products.
pub const MAX_DETERMINANT_SIZE: usize = 8;

/// Evaluates function `kind` on already evaluated `args`.
///
/// # Arguments
/// * `kind` - function tag
/// * `args` - evaluated arguments, `kind.arity()` of them
/// * `ctrl` - evaluation controller (randomness gate, scratch lists)
/// # Returns
/// the folded value, an error leaf, or the function node rebuilt over `args`
pub fn apply(kind: FuncKind, args: &[Expr], ctrl: Option<&Controller>) -> Expr {
    if let Some(error) = args.iter().find(|a| a.is_error()) {
        return error.clone();
    }
    match (kind, args) {
        (FuncKind::Max | FuncKind::Min, [a, b]) => extremum(kind, a, b),
        (FuncKind::Diff | FuncKind::Solve, [a, b]) => Expr::call2(kind, a.clone(), b.clone()),
        (FuncKind::Det, [m]) => determinant(m, ctrl),
        (FuncKind::Norm, [a]) => norm(a, ctrl),
        (FuncKind::RandList, [n]) => random_list(n, ctrl),
        (_, [a]) => unary(kind, a, ctrl),
        _ => Expr::type_mismatch(&format!(
            "{} expects {} arguments",
            kind.name(),
            kind.arity()
        )),
    }
}

/// One-argument shorthand of [`apply`].
pub fn call(kind: FuncKind, arg: &Expr, ctrl: Option<&Controller>) -> Expr {
    apply(kind, std::slice::from_ref(arg), ctrl)
}

fn unary(kind: FuncKind, a: &Expr, ctrl: Option<&Controller>) -> Expr {
    if let Some(items) = a.as_array() {
        return Expr::array(items.iter().map(|x| unary(kind, x, ctrl)).collect());
    }
    if let Some(n) = a.to_number() {
        return numeric(kind, &n);
    }
    if a.is_constant() {
        return Expr::type_mismatch(&format!("{} expects a number", kind.name()));
    }
    if let Some(simpler) = special_form(kind, a) {
        return simpler;
    }
    Expr::call(kind, a.clone())
}

fn special_form(kind: FuncKind, a: &Expr) -> Option<Expr> {
    match (kind, a.kind(), a.children()) {
        (FuncKind::Exp, ExprKind::Func(FuncKind::Ln, _), [inner])
        | (FuncKind::Ln, ExprKind::Func(FuncKind::Exp, _), [inner]) => Some(inner.clone()),
        (FuncKind::Sqrt, ExprKind::Op(OpKind::Pow, _), [base, exponent])
            if exponent.as_number().and_then(Number::as_int) == Some(2) =>
        {
            Some(Expr::call(FuncKind::Abs, base.clone()))
        }
        (FuncKind::Abs, ExprKind::Op(OpKind::Neg, _), [inner]) => {
            Some(Expr::call(FuncKind::Abs, inner.clone()))
        }
        (FuncKind::Abs, ExprKind::Func(FuncKind::Abs, _), _) => Some(a.clone()),
        _ => None,
    }
}

/// `f(x)` as a double for real `x`, as a complex double otherwise.
fn real_or_complex(n: &Number, real: fn(f64) -> f64, complex: fn(Complex64) -> Complex64) -> Expr {
    match n.to_f64() {
        Some(x) => Expr::real(real(x)),
        None => Expr::number(Number::complex_real(complex(n.to_complex64()))),
    }
}

fn numeric(kind: FuncKind, n: &Number) -> Expr {
    // exact values at zero
    if n.is_zero() {
        match kind {
            FuncKind::Sin
            | FuncKind::Tan
            | FuncKind::Atan
            | FuncKind::Sinh
            | FuncKind::Tanh
            | FuncKind::Sqrt
            | FuncKind::Abs
            | FuncKind::Sign
            | FuncKind::Norm
            | FuncKind::Conj => return Expr::int(0),
            FuncKind::Cos | FuncKind::Cosh | FuncKind::Exp | FuncKind::Fact => return Expr::int(1),
            _ => {}
        }
    }
    match kind {
        FuncKind::Sin => real_or_complex(n, f64::sin, |z| z.sin()),
        FuncKind::Cos => real_or_complex(n, f64::cos, |z| z.cos()),
        FuncKind::Tan => real_or_complex(n, f64::tan, |z| z.tan()),
        FuncKind::Atan => real_or_complex(n, f64::atan, |z| z.atan()),
        FuncKind::Sinh => real_or_complex(n, f64::sinh, |z| z.sinh()),
        FuncKind::Cosh => real_or_complex(n, f64::cosh, |z| z.cosh()),
        FuncKind::Tanh => real_or_complex(n, f64::tanh, |z| z.tanh()),
        FuncKind::Exp => real_or_complex(n, f64::exp, |z| z.exp()),
        FuncKind::Ln => Expr::number(n.ln()),
        FuncKind::Sqrt => Expr::number(n.sqrt()),
        FuncKind::Abs | FuncKind::Norm => Expr::number(n.abs()),
        FuncKind::Sign => Expr::number(n.signum()),
        FuncKind::Conj => Expr::number(n.conj()),
        FuncKind::Fact => match (n.integer_value(), n.to_f64()) {
            (Some(k), _) => factorial(k),
            // integral reals too large for an i64, +inf included
            (None, Some(x)) if x > MAX_FACTORIAL as f64 && (x.is_infinite() || x.fract() == 0.0) => {
                Expr::real(f64::INFINITY)
            }
            _ => Expr::nan(),
        },
        FuncKind::Det => Expr::number(*n),
        _ => Expr::type_mismatch(&format!("{} expects an array", kind.name())),
    }
}

/// `max`/`min` of two real values. Symbolic operands keep the node.
fn extremum(kind: FuncKind, a: &Expr, b: &Expr) -> Expr {
    let op = if kind == FuncKind::Max {
        OpKind::Greater
    } else {
        OpKind::Less
    };
    let decided = compare(op, a, b);
    match decided.as_bool() {
        Some(true) => a.clone(),
        Some(false) if a.is_constant() && b.is_constant() => b.clone(),
        _ if decided.is_error() => decided,
        _ => Expr::call2(kind, a.clone(), b.clone()),
    }
}

/// Euclidean norm of an array, `abs` of a scalar.
fn norm(a: &Expr, ctrl: Option<&Controller>) -> Expr {
    let Some(items) = a.as_array() else {
        return unary(FuncKind::Norm, a, ctrl);
    };
    let squares = items.iter().map(|x| match x.to_number() {
        Some(n) => {
            let magnitude = Expr::number(n.abs());
            mul(&magnitude, &magnitude, ctrl)
        }
        None => pow(x, &Expr::int(2), ctrl),
    });
    let sum = squares.fold(Expr::int(0), |acc, s| add(&acc, &s, ctrl));
    call(FuncKind::Sqrt, &sum, ctrl)
}

/// Leibniz determinant of a square array of arrays.
fn determinant(m: &Expr, ctrl: Option<&Controller>) -> Expr {
    let Some(rows) = m.as_array() else {
        return unary(FuncKind::Det, m, ctrl);
    };
    let n = rows.len();
    if n > MAX_DETERMINANT_SIZE {
        return Expr::out_of_bounds(&format!(
            "determinant of a {}x{} matrix is too large to expand",
            n, n
        ));
    }
    let mut matrix: Vec<&[Expr]> = Vec::with_capacity(n);
    for row in rows {
        match row.as_array() {
            Some(cells) if cells.len() == n => matrix.push(cells),
            _ => return Expr::out_of_bounds("determinant needs a square matrix"),
        }
    }
    let mut total = Expr::int(0);
    for perm in permutations(n).iter() {
        let mut product = Expr::int(perm.sign as i64);
        for (row, &column) in matrix.iter().zip(perm.indices.iter()) {
            product = mul(&product, &row[column], ctrl);
        }
        total = add(&total, &product, ctrl);
    }
    total
}

/// List of `n` uniform samples from [0, 1). Without the randomness capability the node stays unevaluated.
fn random_list(n: &Expr, ctrl: Option<&Controller>) -> Expr {
    if !random_allowed(ctrl) {
        warn!("randlist refused: randomness is not allowed by the controller");
        return Expr::call(FuncKind::RandList, n.clone());
    }
    match n.as_number().and_then(Number::integer_value) {
        Some(len) if (0..=MAX_RANDOM_LIST).contains(&len) => {
            let mut rng = rand::rng();
            Expr::array(
                (0..len)
                    .map(|_| Expr::real(rng.random::<f64>()))
                    .collect(),
            )
        }
        Some(len) => Expr::out_of_bounds(&format!("randlist length {} is out of range", len)),
        None if n.is_constant() => Expr::type_mismatch("randlist expects an integer length"),
        None => Expr::call(FuncKind::RandList, n.clone()),
    }
}

/// `-f(x)` shorthand used by the differentiator.
pub(crate) fn negated_call(kind: FuncKind, arg: &Expr, ctrl: Option<&Controller>) -> Expr {
    neg(&call(kind, arg, ctrl), ctrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::symbolic_errors::ErrorKind;
    use approx::assert_relative_eq;

    fn real(e: &Expr) -> f64 {
        e.as_number().and_then(Number::to_f64).unwrap()
    }

    #[test]
    fn test_exact_values() {
        assert_eq!(call(FuncKind::Sqrt, &Expr::int(9), None), Expr::int(3));
        assert_eq!(
            call(FuncKind::Sqrt, &Expr::int(-4), None),
            Expr::complex_int(0, 2)
        );
        assert_eq!(call(FuncKind::Ln, &Expr::int(1), None), Expr::int(0));
        assert_eq!(call(FuncKind::Cos, &Expr::int(0), None), Expr::int(1));
        assert_eq!(call(FuncKind::Abs, &Expr::int(-7), None), Expr::int(7));
        assert_eq!(call(FuncKind::Sign, &Expr::rational(-1, 3), None), Expr::int(-1));
    }

    #[test]
    fn test_floating_values() {
        assert_relative_eq!(real(&call(FuncKind::Sin, &Expr::real(1.0), None)), 1.0_f64.sin());
        assert_relative_eq!(real(&call(FuncKind::Exp, &Expr::int(2), None)), 2.0_f64.exp());
        assert_relative_eq!(
            real(&call(FuncKind::Atan, &Expr::int(1), None)),
            std::f64::consts::FRAC_PI_4
        );
        let ln_minus_one = call(FuncKind::Ln, &Expr::int(-1), None);
        let z = ln_minus_one.as_number().unwrap().to_complex64();
        assert_relative_eq!(z.im, std::f64::consts::PI);
    }

    #[test]
    fn test_special_forms() {
        let x = Expr::var("x");
        let ln_x = Expr::call(FuncKind::Ln, x.clone());
        assert_eq!(call(FuncKind::Exp, &ln_x, None), x);
        let square = x.clone().pow(Expr::int(2));
        assert_eq!(
            call(FuncKind::Sqrt, &square, None),
            Expr::call(FuncKind::Abs, x.clone())
        );
        assert_eq!(call(FuncKind::Sin, &x, None), Expr::call(FuncKind::Sin, x));
    }

    #[test]
    fn test_factorial() {
        assert_eq!(call(FuncKind::Fact, &Expr::int(5), None), Expr::int(120));
        assert!(call(FuncKind::Fact, &Expr::int(-3), None).is_nan());
        assert!(call(FuncKind::Fact, &Expr::rational(1, 2), None).is_nan());
        let infinity = Expr::real(f64::INFINITY);
        assert_eq!(call(FuncKind::Fact, &Expr::int(171), None), infinity);
        assert_eq!(call(FuncKind::Fact, &Expr::real(1e16), None), infinity);
        assert_eq!(call(FuncKind::Fact, &infinity, None), infinity);
        assert!(call(FuncKind::Fact, &Expr::real(-1e16), None).is_nan());
    }

    #[test]
    fn test_elementwise() {
        let list = Expr::array(vec![Expr::int(4), Expr::int(16)]);
        assert_eq!(
            call(FuncKind::Sqrt, &list, None),
            Expr::array(vec![Expr::int(2), Expr::int(4)])
        );
        assert_eq!(
            call(FuncKind::Norm, &Expr::array(vec![Expr::int(3), Expr::int(4)]), None),
            Expr::int(5)
        );
    }

    #[test]
    fn test_determinant() {
        let m = Expr::array(vec![
            Expr::array(vec![Expr::int(1), Expr::int(2)]),
            Expr::array(vec![Expr::int(3), Expr::int(4)]),
        ]);
        assert_eq!(call(FuncKind::Det, &m, None), Expr::int(-2));
        let m3 = Expr::array(vec![
            Expr::array(vec![Expr::int(2), Expr::int(0), Expr::int(1)]),
            Expr::array(vec![Expr::int(1), Expr::int(3), Expr::int(2)]),
            Expr::array(vec![Expr::int(1), Expr::int(1), Expr::int(2)]),
        ]);
        assert_eq!(call(FuncKind::Det, &m3, None), Expr::int(6));
        let ragged = Expr::array(vec![Expr::array(vec![Expr::int(1), Expr::int(2)])]);
        assert_eq!(
            call(FuncKind::Det, &ragged, None).error_kind(),
            Some(ErrorKind::IndexOutOfBounds)
        );
        let size = MAX_DETERMINANT_SIZE + 4;
        let identity = Expr::array(
            (0..size)
                .map(|i| Expr::array((0..size).map(|j| Expr::int((i == j) as i64)).collect()))
                .collect(),
        );
        assert_eq!(
            call(FuncKind::Det, &identity, None).error_kind(),
            Some(ErrorKind::IndexOutOfBounds)
        );
    }

    #[test]
    fn test_max_min() {
        let args = [Expr::int(3), Expr::rational(7, 2)];
        assert_eq!(apply(FuncKind::Max, &args, None), Expr::rational(7, 2));
        assert_eq!(apply(FuncKind::Min, &args, None), Expr::int(3));
        let x = Expr::var("x");
        let symbolic = [x.clone(), Expr::int(1)];
        assert_eq!(
            apply(FuncKind::Max, &symbolic, None),
            Expr::call2(FuncKind::Max, x, Expr::int(1))
        );
    }

    #[test]
    fn test_random_list_is_gated() {
        let n = Expr::int(4);
        assert_eq!(
            call(FuncKind::RandList, &n, None),
            Expr::call(FuncKind::RandList, n.clone())
        );
        let ctrl = Controller::new().with_random(true);
        let list = call(FuncKind::RandList, &n, Some(&ctrl));
        let items = list.as_array().unwrap();
        assert_eq!(items.len(), 4);
        for item in items {
            let v = real(item);
            assert!((0.0..1.0).contains(&v));
        }
    }
}
