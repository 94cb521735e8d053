//! # Equation Solver Module
//!
//! Isolates one variable of an equation `left = right` by peeling operations off the side that
//! holds the variable and applying their inverses to the other side.
//!
//! ## Algorithm
//! 1. classify both sides as `Found`, `Absent` or `Unknown` with respect to the variable. Only
//!    arithmetic operators, negation, `not` and `sqrt` are looked through, any other node is `Unknown`
//! 2. fail when both sides are `Found` or both are `Absent`
//! 3. move the variable side to the left
//! 4. peel while a rule applies. A binary node peels only when its other operand is `Absent`
//! 5. `x = right` on success, otherwise the partially solved equation wrapped in `solve(eq, x)`
//!
//! Square roots are principal: `x^2 = 9` gives `x = 3`.

use crate::symbolic::symbolic_caches::NameId;
use crate::symbolic::symbolic_controller::Controller;
use crate::symbolic::symbolic_engine::{Expr, ExprKind, FuncKind, OpKind};
use crate::symbolic::symbolic_functions::call;
use crate::symbolic::symbolic_simplify::{add, div, mul, neg, not, pow, sub};
use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Found,
    Absent,
    Unknown,
}

impl Presence {
    fn join(self, other: Presence) -> Presence {
        match (self, other) {
            (Presence::Found, _) | (_, Presence::Found) => Presence::Found,
            (Presence::Absent, Presence::Absent) => Presence::Absent,
            _ => Presence::Unknown,
        }
    }
}

fn presence(e: &Expr, var: NameId) -> Presence {
    match e.kind() {
        ExprKind::Var(id) if *id == var => Presence::Found,
        ExprKind::Var(_)
        | ExprKind::Number(_)
        | ExprKind::Bool(_)
        | ExprKind::Char(_)
        | ExprKind::Str(_) => Presence::Absent,
        ExprKind::Op(
            OpKind::Add
            | OpKind::Sub
            | OpKind::Mul
            | OpKind::Div
            | OpKind::Pow
            | OpKind::Neg
            | OpKind::Not,
            children,
        )
        | ExprKind::Func(FuncKind::Sqrt, children) => children
            .iter()
            .map(|c| presence(c, var))
            .fold(Presence::Absent, Presence::join),
        _ => Presence::Unknown,
    }
}

/// One inverse step: the new `(left, right)` pair, or `None` when `left` does not peel.
fn peel(left: &Expr, right: &Expr, var: NameId, ctrl: Option<&Controller>) -> Option<(Expr, Expr)> {
    let absent = |e: &Expr| presence(e, var) == Presence::Absent;
    let peeled = match (left.kind(), left.children()) {
        (ExprKind::Op(OpKind::Add, _), [a, b]) if absent(b) => (a.clone(), sub(right, b, ctrl)),
        (ExprKind::Op(OpKind::Add, _), [a, b]) if absent(a) => (b.clone(), sub(right, a, ctrl)),
        (ExprKind::Op(OpKind::Sub, _), [a, b]) if absent(b) => (a.clone(), add(right, b, ctrl)),
        (ExprKind::Op(OpKind::Sub, _), [a, b]) if absent(a) => (b.clone(), sub(a, right, ctrl)),
        (ExprKind::Op(OpKind::Mul, _), [a, b]) if absent(b) => (a.clone(), div(right, b, ctrl)),
        (ExprKind::Op(OpKind::Mul, _), [a, b]) if absent(a) => (b.clone(), div(right, a, ctrl)),
        (ExprKind::Op(OpKind::Div, _), [a, b]) if absent(b) => (a.clone(), mul(right, b, ctrl)),
        (ExprKind::Op(OpKind::Div, _), [a, b]) if absent(a) => (b.clone(), div(a, right, ctrl)),
        (ExprKind::Op(OpKind::Pow, _), [a, k]) if absent(k) => {
            let root = if *k == Expr::int(2) {
                call(FuncKind::Sqrt, right, ctrl)
            } else {
                pow(right, &div(&Expr::int(1), k, ctrl), ctrl)
            };
            (a.clone(), root)
        }
        (ExprKind::Op(OpKind::Neg, _), [a]) => (a.clone(), neg(right, ctrl)),
        (ExprKind::Op(OpKind::Not, _), [a]) => (a.clone(), not(right)),
        (ExprKind::Func(FuncKind::Sqrt, _), [a]) => (a.clone(), pow(right, &Expr::int(2), ctrl)),
        _ => return None,
    };
    trace!("solve: peeled {:?} -> {:?} = {:?}", left, peeled.0, peeled.1);
    Some(peeled)
}

/// Solves `equation` for `var`.
///
/// # Arguments
/// * `equation` - an `=` node; any other node gives a type mismatch leaf
/// * `var` - the variable to isolate
/// * `ctrl` - controller forwarded to the arithmetic engine
/// # Returns
/// `var = value` when the variable could be isolated, `solve(partial, var)` otherwise
///
/// # Examples
/// ```rust, ignore
/// let x = Expr::var("x");
/// let eq = Expr::equation(Expr::int(2) * x.clone() + Expr::int(3), Expr::int(7));
/// assert_eq!(solve(&eq, x.as_var().unwrap(), None), Expr::equation(x, Expr::int(2)));
/// ```
pub fn solve(equation: &Expr, var: NameId, ctrl: Option<&Controller>) -> Expr {
    if equation.is_error() {
        return equation.clone();
    }
    let Some([lhs, rhs]) = equation.as_op(OpKind::Eq) else {
        return Expr::type_mismatch("solve expects an equation");
    };
    let (mut left, mut right) = match (presence(lhs, var), presence(rhs, var)) {
        (Presence::Found, Presence::Found) | (Presence::Absent, Presence::Absent) => {
            return equation.unresolved_solve(var);
        }
        (_, Presence::Found) => (rhs.clone(), lhs.clone()),
        _ => (lhs.clone(), rhs.clone()),
    };
    while left.as_var() != Some(var) {
        match peel(&left, &right, var, ctrl) {
            Some((l, r)) => {
                left = l;
                right = r;
            }
            None => break,
        }
        if right.is_error() {
            return right;
        }
    }
    let result = Expr::equation(left, right);
    if result.child(0).and_then(Expr::as_var) == Some(var) {
        result
    } else {
        result.unresolved_solve(var)
    }
}

impl Expr {
    /// Solves the equation `self` for the variable named `var`.
    pub fn solve_for(&self, var: &str) -> Expr {
        solve(self, NameId::intern(var), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::var("x")
    }

    #[test]
    fn test_linear() {
        let eq = Expr::equation(Expr::int(2) * x() + Expr::int(3), Expr::int(7));
        assert_eq!(eq.solve_for("x"), Expr::equation(x(), Expr::int(2)));
    }

    #[test]
    fn test_variable_on_the_right() {
        let eq = Expr::equation(Expr::int(4), Expr::int(12) / x());
        assert_eq!(eq.solve_for("x"), Expr::equation(x(), Expr::int(3)));
        let eq = Expr::equation(Expr::int(4), Expr::int(10) - x());
        assert_eq!(eq.solve_for("x"), Expr::equation(x(), Expr::int(6)));
    }

    #[test]
    fn test_unary_peels() {
        let eq = Expr::equation(-x(), Expr::int(5));
        assert_eq!(eq.solve_for("x"), Expr::equation(x(), Expr::int(-5)));
        let eq = Expr::equation(Expr::call(FuncKind::Sqrt, x()), Expr::int(3));
        assert_eq!(eq.solve_for("x"), Expr::equation(x(), Expr::int(9)));
        let eq = Expr::equation(Expr::unary(OpKind::Not, x()), Expr::boolean(true));
        assert_eq!(eq.solve_for("x"), Expr::equation(x(), Expr::boolean(false)));
    }

    #[test]
    fn test_square_gives_principal_root() {
        let eq = Expr::equation(x().pow(Expr::int(2)), Expr::int(9));
        assert_eq!(eq.solve_for("x"), Expr::equation(x(), Expr::int(3)));
    }

    #[test]
    fn test_unsolvable_stays_wrapped() {
        // x on both sides
        let eq = Expr::equation(x(), x() + Expr::int(1));
        assert_eq!(eq.solve_for("x"), eq.unresolved_solve(NameId::intern("x")));
        // x on neither side
        let eq = Expr::equation(Expr::var("y"), Expr::int(2));
        assert_eq!(eq.solve_for("x"), eq.unresolved_solve(NameId::intern("x")));
    }

    #[test]
    fn test_partial_progress_is_kept() {
        let sin = Expr::call(FuncKind::Sin, x());
        let eq = Expr::equation(sin.clone() + Expr::int(1), Expr::int(3));
        let expected = Expr::equation(sin, Expr::int(2)).unresolved_solve(NameId::intern("x"));
        assert_eq!(eq.solve_for("x"), expected);
    }

    #[test]
    fn test_not_an_equation() {
        assert!(x().solve_for("x").is_error());
    }
}
