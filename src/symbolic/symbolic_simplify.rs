//! # Arithmetic Engine Module
//!
//! Per-operator `calculate` factories. Every evaluation result and every node built by the
//! differentiator, the solver and the function catalogue goes through these functions, so this is
//! where algebraic simplification happens.
//!
//! ## Evaluation Order of a Binary Operator
//!
//! 1. **Error propagation**: an error leaf (or NaN) operand is returned unchanged, the left one first
//! 2. **Numeric fast path**: two numbers (booleans count as 0/1) are combined on the numeric tower
//! 3. **Structural operands**: arrays (element-wise, scalar broadcast) and text operands
//! 4. **Identities**: neutral and absorbing elements, `a+a -> 2a`, `a-a -> 0`, `a/a -> 1`,
//!    `a*a -> a^2`, like terms `2x+3x -> 5x`, sign extraction `(-a)*b -> -(a*b)`
//! 5. **Term collection**: both operands are unfolded into up/down term lists; once enough raw
//!    terms accumulate the chain is sorted, merged and folded (see `symbolic_terms`)
//! 6. otherwise the raw node is built
//!
//! ## Key Functions
//!
//! - `calculate(op, a, b, ctrl)` - dispatch on the operator tag
//! - `add`, `sub`, `mul`, `div`, `pow`, `neg` - arithmetic
//! - `not`, `compare`, `and`, `or` - logic and comparisons
//! - `combine(op, a, b, ctrl)` - steps 1-4 only, `None` when no rule applies; the term collector
//!   uses it to merge pairs without re-entering collection

use crate::symbolic::symbolic_controller::{Controller, ScratchList};
use crate::symbolic::symbolic_engine::{Expr, ExprKind, FuncKind, OpKind};
use crate::symbolic::symbolic_numbers::Number;
use crate::symbolic::symbolic_terms::{Chain, collect, fill_additive, fill_multiplicative};
use std::cmp::Ordering;

/// Applies operator `op` to `a` and `b`. Unary operators (`Neg`, `Not`) apply to `a` and ignore `b`.
///
/// # Examples
/// ```rust, ignore
/// let r = calculate(OpKind::Add, &Expr::int(2), &Expr::rational(1, 2), None);
/// assert_eq!(r, Expr::rational(5, 2));
/// ```
pub fn calculate(op: OpKind, a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Expr {
    match op {
        OpKind::Add => add(a, b, ctrl),
        OpKind::Sub => sub(a, b, ctrl),
        OpKind::Mul => mul(a, b, ctrl),
        OpKind::Div => div(a, b, ctrl),
        OpKind::Pow => pow(a, b, ctrl),
        OpKind::Neg => neg(a, ctrl),
        OpKind::Not => not(a),
        OpKind::Eq | OpKind::Less | OpKind::Greater | OpKind::LessEq | OpKind::GreaterEq => {
            compare(op, a, b)
        }
        OpKind::And => and(a, b),
        OpKind::Or => or(a, b),
    }
}

pub fn add(a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Expr {
    combine(OpKind::Add, a, b, ctrl).unwrap_or_else(|| collect_or_build(OpKind::Add, a, b, ctrl))
}

pub fn sub(a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Expr {
    combine(OpKind::Sub, a, b, ctrl).unwrap_or_else(|| collect_or_build(OpKind::Sub, a, b, ctrl))
}

pub fn mul(a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Expr {
    combine(OpKind::Mul, a, b, ctrl).unwrap_or_else(|| collect_or_build(OpKind::Mul, a, b, ctrl))
}

pub fn div(a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Expr {
    combine(OpKind::Div, a, b, ctrl).unwrap_or_else(|| collect_or_build(OpKind::Div, a, b, ctrl))
}

pub fn pow(a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Expr {
    combine(OpKind::Pow, a, b, ctrl)
        .unwrap_or_else(|| Expr::binary(OpKind::Pow, a.clone(), b.clone()))
}

/// Steps 1-4 of the evaluation order: errors, numbers, structural operands, identities.
/// `None` means no rule applied and the caller decides what to build.
pub fn combine(op: OpKind, a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Option<Expr> {
    if let Some(error) = first_error(a, b) {
        return Some(error);
    }
    if let (Some(x), Some(y)) = (a.to_number(), b.to_number()) {
        if let Some(result) = numeric(op, &x, &y) {
            return Some(result);
        }
    }
    if let Some(result) = array_op(op, a, b, ctrl) {
        return Some(result);
    }
    if let Some(result) = text_op(op, a, b) {
        return Some(result);
    }
    match op {
        OpKind::Add => add_identities(a, b, ctrl),
        OpKind::Sub => sub_identities(a, b, ctrl),
        OpKind::Mul => mul_identities(a, b, ctrl),
        OpKind::Div => div_identities(a, b, ctrl),
        OpKind::Pow => pow_identities(a, b, ctrl),
        _ => None,
    }
}

fn first_error(a: &Expr, b: &Expr) -> Option<Expr> {
    if a.is_error() {
        Some(a.clone())
    } else if b.is_error() {
        Some(b.clone())
    } else {
        None
    }
}

fn numeric(op: OpKind, x: &Number, y: &Number) -> Option<Expr> {
    let value = match op {
        OpKind::Add => x.add(y),
        OpKind::Sub => x.sub(y),
        OpKind::Mul => x.mul(y),
        OpKind::Div => x.div(y),
        OpKind::Pow => x.pow(y),
        _ => return None,
    };
    Some(Expr::number(value))
}

////////////////////////////////STRUCTURAL OPERANDS/////////////////////////////////

/// Element-wise `+ -` (and `* /` between two arrays), broadcasting of `* / ^` over a scalar.
fn array_op(op: OpKind, a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Option<Expr> {
    let elementwise = |xs: &[Expr], ys: &[Expr]| {
        if xs.len() != ys.len() {
            return Expr::out_of_bounds(&format!(
                "array sizes {} and {} differ",
                xs.len(),
                ys.len()
            ));
        }
        Expr::array(
            xs.iter()
                .zip(ys)
                .map(|(x, y)| calculate(op, x, y, ctrl))
                .collect(),
        )
    };
    match (a.as_array(), b.as_array()) {
        (Some(xs), Some(ys)) => match op {
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div => Some(elementwise(xs, ys)),
            _ => None,
        },
        (Some(xs), None) => match op {
            OpKind::Mul | OpKind::Div | OpKind::Pow => Some(Expr::array(
                xs.iter().map(|x| calculate(op, x, b, ctrl)).collect(),
            )),
            OpKind::Add | OpKind::Sub if b.is_constant() => Some(Expr::type_mismatch(
                "an array can not be combined with a scalar by + or -",
            )),
            _ => None,
        },
        (None, Some(ys)) => match op {
            OpKind::Mul | OpKind::Div => Some(Expr::array(
                ys.iter().map(|y| calculate(op, a, y, ctrl)).collect(),
            )),
            OpKind::Add | OpKind::Sub if a.is_constant() => Some(Expr::type_mismatch(
                "a scalar can not be combined with an array by + or -",
            )),
            _ => None,
        },
        (None, None) => None,
    }
}

/// Strings concatenate under `+`; any other arithmetic between text and a constant is a type error.
fn text_op(op: OpKind, a: &Expr, b: &Expr) -> Option<Expr> {
    let textual = |e: &Expr| matches!(e.kind(), ExprKind::Str(_) | ExprKind::Char(_));
    if !(textual(a) || textual(b)) {
        return None;
    }
    match (op, a.kind(), b.kind()) {
        (OpKind::Add, ExprKind::Str(x), ExprKind::Str(y)) => {
            Some(Expr::string(&format!("{}{}", x, y)))
        }
        _ if a.is_constant() && b.is_constant() => Some(Expr::type_mismatch(&format!(
            "operator {} is not defined for text",
            op
        ))),
        _ => None,
    }
}

////////////////////////////////////IDENTITIES///////////////////////////////////////

/// `c * rest` view of a term: the numeric factor of a multiplication chain, 1 otherwise.
fn split_coefficient(e: &Expr) -> (Number, Expr) {
    match e.as_op(OpKind::Mul) {
        Some([l, r]) => {
            if let Some(c) = l.as_number() {
                return (*c, r.clone());
            }
            if let Some(c) = r.as_number() {
                return (*c, l.clone());
            }
            let (c, rest) = split_coefficient(l);
            if c.is_one() {
                (Number::Int(1), e.clone())
            } else {
                (c, Expr::binary(OpKind::Mul, rest, r.clone()))
            }
        }
        _ => (Number::Int(1), e.clone()),
    }
}

/// `ca*r ± cb*r -> (ca ± cb)*r`
fn like_terms(op: OpKind, a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Option<Expr> {
    let (ca, ra) = split_coefficient(a);
    let (cb, rb) = split_coefficient(b);
    if ra.is_number() || ra != rb {
        return None;
    }
    let c = match op {
        OpKind::Add => ca.add(&cb),
        _ => ca.sub(&cb),
    };
    Some(mul(&Expr::number(c), &ra, ctrl))
}

/// Positive counterpart of a term that carries a visible minus sign.
fn negated(e: &Expr, ctrl: Option<&Controller>) -> Option<Expr> {
    match (e.kind(), e.children()) {
        (ExprKind::Number(n), _) if n.is_negative() => Some(Expr::number(n.neg())),
        (ExprKind::Op(OpKind::Neg, _), [inner]) => Some(inner.clone()),
        (ExprKind::Op(op @ (OpKind::Mul | OpKind::Div), _), [p, q]) => {
            // a numeric leading factor is a coefficient, not a sign
            let leading = if p.is_number() { None } else { negated(p, ctrl) };
            match (leading, q.as_op(OpKind::Neg)) {
                (Some(p), _) => Some(calculate(*op, &p, q, ctrl)),
                (None, Some([q])) if *op == OpKind::Mul => Some(mul(p, q, ctrl)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Puts a minus sign on the factor a product reads first: `x*y -> (-x)*y`, `2*x/y -> (-2)*x/y`.
fn negate_leading_factor(e: &Expr, ctrl: Option<&Controller>) -> Expr {
    match (e.kind(), e.children()) {
        (ExprKind::Op(op @ (OpKind::Mul | OpKind::Div), _), [p, q]) => {
            Expr::binary(*op, negate_leading_factor(p, ctrl), q.clone())
        }
        _ => neg(e, ctrl),
    }
}

fn add_identities(a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Option<Expr> {
    if a.is_zero() {
        return Some(b.clone());
    }
    if b.is_zero() {
        return Some(a.clone());
    }
    if let Some(result) = like_terms(OpKind::Add, a, b, ctrl) {
        return Some(result);
    }
    if let Some(positive) = negated(b, ctrl) {
        return Some(sub(a, &positive, ctrl));
    }
    if let Some(positive) = negated(a, ctrl) {
        return Some(sub(b, &positive, ctrl));
    }
    None
}

fn sub_identities(a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Option<Expr> {
    if b.is_zero() {
        return Some(a.clone());
    }
    if a.is_zero() {
        return Some(neg(b, ctrl));
    }
    if a == b {
        return Some(Expr::int(0));
    }
    if let Some(result) = like_terms(OpKind::Sub, a, b, ctrl) {
        return Some(result);
    }
    if let Some(positive) = negated(b, ctrl) {
        return Some(add(a, &positive, ctrl));
    }
    None
}

/// `(base, exponent)` view of a factor, `(e, 1)` for anything that is not a power.
fn base_exponent(e: &Expr) -> (Expr, Expr) {
    match e.as_op(OpKind::Pow) {
        Some([base, exponent]) => (base.clone(), exponent.clone()),
        _ => (e.clone(), Expr::int(1)),
    }
}

fn mul_identities(a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Option<Expr> {
    if a.is_zero() {
        return Some(a.clone());
    }
    if b.is_zero() {
        return Some(b.clone());
    }
    if a.is_one() {
        return Some(b.clone());
    }
    if b.is_one() {
        return Some(a.clone());
    }
    if a.is_minus_one() {
        return Some(neg(b, ctrl));
    }
    if b.is_minus_one() {
        return Some(neg(a, ctrl));
    }
    match (a.as_number(), b.as_op(OpKind::Neg)) {
        (Some(n), Some([inner])) => return Some(mul(&Expr::number(n.neg()), inner, ctrl)),
        _ => {}
    }
    match (a.as_op(OpKind::Neg), b.as_op(OpKind::Neg)) {
        (Some([p]), Some([q])) => return Some(mul(p, q, ctrl)),
        (Some([p]), None) if !b.is_number() => {
            return Some(negate_leading_factor(&mul(p, b, ctrl), ctrl));
        }
        (None, Some([q])) if !a.is_number() => {
            return Some(negate_leading_factor(&mul(a, q, ctrl), ctrl));
        }
        _ => {}
    }
    let (base_a, exp_a) = base_exponent(a);
    let (base_b, exp_b) = base_exponent(b);
    if !base_a.is_number() && base_a == base_b {
        return Some(pow(&base_a, &add(&exp_a, &exp_b, ctrl), ctrl));
    }
    None
}

fn div_identities(a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Option<Expr> {
    if b.is_one() {
        return Some(a.clone());
    }
    if b.is_minus_one() {
        return Some(neg(a, ctrl));
    }
    if a.is_zero() && !b.is_zero() {
        return Some(a.clone());
    }
    if a == b {
        return Some(Expr::int(1));
    }
    if let (Some([x]), Some([y])) = (a.as_func(FuncKind::Sin), b.as_func(FuncKind::Cos)) {
        if x == y {
            return Some(Expr::call(FuncKind::Tan, x.clone()));
        }
    }
    match (a.as_op(OpKind::Neg), b.as_op(OpKind::Neg)) {
        (Some([p]), Some([q])) => return Some(div(p, q, ctrl)),
        (Some([p]), None) => return Some(negate_leading_factor(&div(p, b, ctrl), ctrl)),
        (None, Some([q])) => return Some(negate_leading_factor(&div(a, q, ctrl), ctrl)),
        _ => {}
    }
    let (base_a, exp_a) = base_exponent(a);
    let (base_b, exp_b) = base_exponent(b);
    if !base_a.is_number() && base_a == base_b {
        let exponent = sub(&exp_a, &exp_b, ctrl);
        if exponent.is_negative_number() {
            let positive = neg(&exponent, ctrl);
            return Some(div(&Expr::int(1), &pow(&base_a, &positive, ctrl), ctrl));
        }
        return Some(pow(&base_a, &exponent, ctrl));
    }
    None
}

fn pow_identities(a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Option<Expr> {
    if b.is_zero() {
        return Some(Expr::int(1));
    }
    if b.is_one() || a.is_one() {
        return Some(a.clone());
    }
    if a.is_zero() && b.as_number().is_some_and(|n| !n.is_complex() && !n.is_negative()) {
        return Some(a.clone());
    }
    if let Some([base, inner]) = a.as_op(OpKind::Pow) {
        if inner.is_number() && b.is_number() {
            return Some(pow(base, &mul(inner, b, ctrl), ctrl));
        }
    }
    if let (Some([inner]), Some(k)) = (
        a.as_op(OpKind::Neg),
        b.as_number().and_then(Number::as_int),
    ) {
        let magnitude = pow(inner, b, ctrl);
        return Some(if k % 2 == 0 {
            magnitude
        } else {
            neg(&magnitude, ctrl)
        });
    }
    None
}

/// Step 5: unfold both operands and collect, or build the raw node when there are too few terms.
fn collect_or_build(op: OpKind, a: &Expr, b: &Expr, ctrl: Option<&Controller>) -> Expr {
    let Some(chain) = Chain::of(op) else {
        return Expr::binary(op, a.clone(), b.clone());
    };
    let fill: fn(&Expr, &mut Vec<Expr>, &mut Vec<Expr>) = match chain {
        Chain::Additive => fill_additive,
        Chain::Multiplicative => fill_multiplicative,
    };
    let mut up = ScratchList::new(ctrl);
    let mut down = ScratchList::new(ctrl);
    fill(a, &mut up, &mut down);
    match op {
        OpKind::Sub | OpKind::Div => fill(b, &mut down, &mut up),
        _ => fill(b, &mut up, &mut down),
    }
    if chain.should_collect(up.len(), down.len()) {
        collect(chain, &mut up, &mut down, ctrl)
    } else {
        Expr::binary(op, a.clone(), b.clone())
    }
}

////////////////////////////////////UNARY////////////////////////////////////////////

pub fn neg(a: &Expr, ctrl: Option<&Controller>) -> Expr {
    if a.is_error() {
        return a.clone();
    }
    if let Some(n) = a.to_number() {
        return Expr::number(n.neg());
    }
    if let Some(items) = a.as_array() {
        return Expr::array(items.iter().map(|x| neg(x, ctrl)).collect());
    }
    if matches!(a.kind(), ExprKind::Str(_) | ExprKind::Char(_)) {
        return Expr::type_mismatch("text can not be negated");
    }
    match (a.op_kind(), a.children()) {
        (Some(OpKind::Neg), [inner]) => return inner.clone(),
        (Some(OpKind::Sub), [p, q]) => return sub(q, p, ctrl),
        (Some(OpKind::Mul), [p, q]) => {
            if let Some(c) = p.as_number() {
                return mul(&Expr::number(c.neg()), q, ctrl);
            }
            if let Some(c) = q.as_number() {
                return mul(&Expr::number(c.neg()), p, ctrl);
            }
        }
        _ => {}
    }
    if let Some(positive) = negated(a, ctrl) {
        return positive;
    }
    let mut up = ScratchList::new(ctrl);
    let mut down = ScratchList::new(ctrl);
    fill_additive(a, &mut down, &mut up);
    if Chain::Additive.should_collect(up.len(), down.len()) {
        collect(Chain::Additive, &mut up, &mut down, ctrl)
    } else {
        Expr::unary(OpKind::Neg, a.clone())
    }
}

pub fn not(a: &Expr) -> Expr {
    if a.is_error() {
        return a.clone();
    }
    if let Some(b) = a.as_bool() {
        return Expr::boolean(!b);
    }
    if let Some(items) = a.as_array() {
        return Expr::array(items.iter().map(not).collect());
    }
    if a.is_constant() {
        return Expr::type_mismatch("not expects a boolean");
    }
    match a.as_op(OpKind::Not) {
        Some([inner]) => inner.clone(),
        _ => Expr::unary(OpKind::Not, a.clone()),
    }
}

//////////////////////////////////COMPARISONS////////////////////////////////////////

fn ordering_holds(op: OpKind, ord: Ordering) -> bool {
    match op {
        OpKind::Eq => ord == Ordering::Equal,
        OpKind::Less => ord == Ordering::Less,
        OpKind::Greater => ord == Ordering::Greater,
        OpKind::LessEq => ord != Ordering::Greater,
        OpKind::GreaterEq => ord != Ordering::Less,
        _ => false,
    }
}

/// `= < > <= >=`. Constants compare to a boolean; symbolic operands keep the comparison node.
pub fn compare(op: OpKind, a: &Expr, b: &Expr) -> Expr {
    if let Some(error) = first_error(a, b) {
        return error;
    }
    if let (Some(x), Some(y)) = (a.to_number(), b.to_number()) {
        if op == OpKind::Eq {
            return Expr::boolean(x.value_eq(&y));
        }
        return match x.compare(&y) {
            Some(ord) => Expr::boolean(ordering_holds(op, ord)),
            None => Expr::type_mismatch("complex values are not ordered"),
        };
    }
    let text_order = match (a.kind(), b.kind()) {
        (ExprKind::Str(x), ExprKind::Str(y)) => Some(x.cmp(y)),
        (ExprKind::Char(x), ExprKind::Char(y)) => Some(x.cmp(y)),
        _ => None,
    };
    if let Some(ord) = text_order {
        return Expr::boolean(ordering_holds(op, ord));
    }
    if a.is_constant() && b.is_constant() {
        return match op {
            OpKind::Eq => Expr::boolean(false),
            _ => Expr::type_mismatch(&format!("operator {} on unrelated constants", op)),
        };
    }
    if a == b {
        return Expr::boolean(ordering_holds(op, Ordering::Equal));
    }
    Expr::binary(op, a.clone(), b.clone())
}

pub fn and(a: &Expr, b: &Expr) -> Expr {
    logical(OpKind::And, a, b)
}

pub fn or(a: &Expr, b: &Expr) -> Expr {
    logical(OpKind::Or, a, b)
}

fn logical(op: OpKind, a: &Expr, b: &Expr) -> Expr {
    if let Some(error) = first_error(a, b) {
        return error;
    }
    // the absorbing element decides alone, the neutral one hands over the other operand
    let absorbing = op == OpKind::Or;
    match (a.as_bool(), b.as_bool()) {
        (Some(x), Some(y)) => return Expr::boolean(if absorbing { x || y } else { x && y }),
        (Some(x), _) if x == absorbing => return Expr::boolean(absorbing),
        (_, Some(y)) if y == absorbing => return Expr::boolean(absorbing),
        (Some(_), _) if !b.is_constant() => return b.clone(),
        (_, Some(_)) if !a.is_constant() => return a.clone(),
        _ => {}
    }
    if a.is_constant() || b.is_constant() {
        return Expr::type_mismatch(&format!("operator {} expects booleans", op));
    }
    Expr::binary(op, a.clone(), b.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::symbolic_errors::ErrorKind;

    fn x() -> Expr {
        Expr::var("x")
    }
    fn y() -> Expr {
        Expr::var("y")
    }

    #[test]
    fn test_numeric_fast_path() {
        assert_eq!(add(&Expr::int(2), &Expr::int(3), None), Expr::int(5));
        assert_eq!(div(&Expr::int(1), &Expr::int(2), None), Expr::rational(1, 2));
        assert!(div(&Expr::int(1), &Expr::int(0), None).is_nan());
        assert_eq!(
            add(&Expr::boolean(true), &Expr::boolean(true), None),
            Expr::int(2)
        );
        assert_eq!(pow(&Expr::int(2), &Expr::int(-2), None), Expr::rational(1, 4));
    }

    #[test]
    fn test_error_operands_propagate_leftmost() {
        let left = Expr::type_mismatch("left");
        let right = Expr::out_of_bounds("right");
        assert_eq!(add(&left, &right, None), left);
        assert_eq!(mul(&x(), &right, None), right);
        assert!(sub(&Expr::nan(), &right, None).is_nan());
        assert_eq!(compare(OpKind::Less, &x(), &left), left);
    }

    #[test]
    fn test_structural_identities() {
        assert_eq!(add(&x(), &x(), None), Expr::int(2) * x());
        assert_eq!(sub(&x(), &x(), None), Expr::int(0));
        assert_eq!(div(&x(), &x(), None), Expr::int(1));
        assert_eq!(mul(&x(), &x(), None), x().pow(Expr::int(2)));
        assert_eq!(add(&x(), &Expr::int(0), None), x());
        assert_eq!(mul(&Expr::int(1), &x(), None), x());
        assert_eq!(mul(&Expr::int(0), &x(), None), Expr::int(0));
        let two_x = Expr::int(2) * x();
        let three_x = x() * Expr::int(3);
        assert_eq!(add(&two_x, &three_x, None), Expr::int(5) * x());
        assert_eq!(sub(&two_x, &three_x, None), -x());
    }

    #[test]
    fn test_sign_extraction() {
        let neg_x = Expr::unary(OpKind::Neg, x());
        assert_eq!(mul(&neg_x, &y(), None), neg_x.clone() * y());
        assert_eq!(mul(&y(), &neg_x, None), -y() * x());
        assert_eq!(neg(&(neg_x.clone() * y()), None), x() * y());
        assert_eq!(div(&neg_x, &y(), None), neg_x.clone() / y());
        assert_eq!(add(&(x() * y()), &(neg_x.clone() * y()), None), Expr::int(0));
        assert_eq!(mul(&neg_x, &neg_x, None), x().pow(Expr::int(2)));
        assert_eq!(mul(&Expr::int(3), &neg_x, None), Expr::int(-3) * x());
        assert_eq!(add(&y(), &neg_x, None), y() - x());
        assert_eq!(sub(&y(), &neg_x, None), Expr::binary(OpKind::Add, x(), y()));
        assert_eq!(neg(&neg_x, None), x());
        assert_eq!(neg(&(x() - y()), None), y() - x());
    }

    #[test]
    fn test_power_identities() {
        let x2 = x().pow(Expr::int(2));
        assert_eq!(mul(&x2, &x(), None), x().pow(Expr::int(3)));
        assert_eq!(div(&x2, &x(), None), x());
        assert_eq!(div(&x(), &x2, None), Expr::int(1) / x());
        assert_eq!(pow(&x2, &Expr::int(3), None), x().pow(Expr::int(6)));
        assert_eq!(pow(&x(), &Expr::int(1), None), x());
        assert_eq!(pow(&x(), &Expr::int(0), None), Expr::int(1));
        let neg_x = Expr::unary(OpKind::Neg, x());
        assert_eq!(pow(&neg_x, &Expr::int(2), None), x2);
        assert_eq!(pow(&neg_x, &Expr::int(3), None), -x().pow(Expr::int(3)));
    }

    #[test]
    fn test_sin_over_cos() {
        let sin = Expr::call(FuncKind::Sin, x());
        let cos = Expr::call(FuncKind::Cos, x());
        assert_eq!(div(&sin, &cos, None), Expr::call(FuncKind::Tan, x()));
    }

    #[test]
    fn test_collection_cancels_terms() {
        // (x + 3) + (y - x) -> 3 + y
        let left = x() + Expr::int(3);
        let right = y() - x();
        assert_eq!(add(&left, &right, None), Expr::int(3) + y());
        // (2*x*y) / (x*4) -> y/2 folded as 1/2*y
        let num = Expr::int(2) * x() * y();
        let den = x() * Expr::int(4);
        assert_eq!(div(&num, &den, None), Expr::rational(1, 2) * y());
    }

    #[test]
    fn test_arrays() {
        let a = Expr::array(vec![Expr::int(1), Expr::int(2)]);
        let b = Expr::array(vec![Expr::int(3), Expr::int(4)]);
        assert_eq!(
            add(&a, &b, None),
            Expr::array(vec![Expr::int(4), Expr::int(6)])
        );
        assert_eq!(
            mul(&a, &Expr::int(2), None),
            Expr::array(vec![Expr::int(2), Expr::int(4)])
        );
        let short = Expr::array(vec![Expr::int(1)]);
        assert_eq!(
            add(&a, &short, None).error_kind(),
            Some(ErrorKind::IndexOutOfBounds)
        );
        assert_eq!(
            add(&a, &Expr::int(1), None).error_kind(),
            Some(ErrorKind::TypeMismatch)
        );
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(
            compare(OpKind::Less, &Expr::rational(1, 3), &Expr::real(0.5)),
            Expr::boolean(true)
        );
        assert_eq!(
            compare(OpKind::Eq, &Expr::int(2), &Expr::real(2.0)),
            Expr::boolean(true)
        );
        assert_eq!(
            compare(OpKind::Less, &Expr::complex_int(1, 1), &Expr::int(1)).error_kind(),
            Some(ErrorKind::TypeMismatch)
        );
        assert_eq!(
            compare(OpKind::Less, &x(), &y()),
            Expr::binary(OpKind::Less, x(), y())
        );
        assert_eq!(and(&Expr::boolean(false), &x()), Expr::boolean(false));
        assert_eq!(or(&Expr::boolean(false), &x()), x());
        assert_eq!(not(&Expr::boolean(true)), Expr::boolean(false));
        assert_eq!(
            and(&Expr::int(1), &Expr::boolean(true)).error_kind(),
            Some(ErrorKind::TypeMismatch)
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            add(&Expr::string("ab"), &Expr::string("cd"), None),
            Expr::string("abcd")
        );
        assert_eq!(
            mul(&Expr::string("ab"), &Expr::int(2), None).error_kind(),
            Some(ErrorKind::TypeMismatch)
        );
    }
}
