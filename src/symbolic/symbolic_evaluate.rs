//! # Evaluation Module
//!
//! Recursive-descent evaluation of expression trees against a [`Scope`].
//!
//! ## Key Methods
//! - `evaluate(scope, ctrl)` - resolves bound variables, folds operators and functions through the
//!   arithmetic engine and runs control constructs
//! - `simplify()` / `simplify_with(ctrl)` - evaluation against an empty scope: nothing is bound, so
//!   the result is the algebraically simplified tree
//! - `eval_expression(vars, values)` - numeric shorthand, like the closure-free evaluation of
//!   symbolic engines that only need one value
//!
//! ## Control Constructs
//! - `if` evaluates only the selected branch
//! - `while`, `for` and `sum` need the loop capability; without it the node is returned unevaluated.
//!   They poll the controller's stop flag before every iteration and end with a `Cancelled`
//!   error leaf once it is set
//! - `sleep` waits in slices of the controller's poll interval and returns `true`, or a
//!   `Cancelled` leaf when interrupted
//! - `:=` writes the nearest existing binding, or defines one in the current frame

use crate::symbolic::symbolic_controller::{Controller, is_stopped, loops_allowed};
use crate::symbolic::symbolic_engine::{ControlKind, Expr, ExprKind, FuncKind, OpKind};
use crate::symbolic::symbolic_errors::ErrorKind;
use crate::symbolic::symbolic_functions::apply;
use crate::symbolic::symbolic_numbers::Number;
use crate::symbolic::symbolic_scope::Scope;
use crate::symbolic::symbolic_simplify::{add, calculate, neg, not};
use crate::symbolic::symbolic_solve::solve;
use log::warn;
use std::thread;
use std::time::{Duration, Instant};

/// Longest `sleep` run without a controller, which has no stop flag to end it.
pub const MAX_UNCONTROLLED_SLEEP: Duration = Duration::from_secs(3600);

impl Expr {
    /// Evaluates the tree.
    ///
    /// # Arguments
    /// * `scope` - variable bindings; unbound variables stay symbolic
    /// * `ctrl` - controller with capabilities and the stop flag, `None` grants nothing
    /// # Returns
    /// a new tree (or a shared existing one); the receiver is never modified
    ///
    /// # Examples
    /// ```rust, ignore
    /// let scope = Scope::with_bindings(&[("x", Expr::real(5.0))]);
    /// let f = Expr::real(2.0) * Expr::var("x") + Expr::real(3.0);
    /// assert_eq!(f.evaluate(&scope, None), Expr::real(13.0));
    /// ```
    pub fn evaluate(&self, scope: &Scope, ctrl: Option<&Controller>) -> Expr {
        match self.kind() {
            ExprKind::Var(id) => match scope.lookup_with_outer(*id) {
                // a variable bound to itself (see `solve`) stays symbolic
                Some((value, _)) if value.as_var() == Some(*id) => value,
                Some((value, _)) if value.is_constant() || value.is_error() => value,
                Some((value, Some(outer))) => value.evaluate(outer, ctrl),
                Some((value, None)) => value.evaluate(&Scope::new(), ctrl),
                None => self.clone(),
            },
            ExprKind::Number(_)
            | ExprKind::Bool(_)
            | ExprKind::Char(_)
            | ExprKind::Str(_)
            | ExprKind::Error(_) => self.clone(),
            ExprKind::Array(items) => {
                Expr::array(items.iter().map(|e| e.evaluate(scope, ctrl)).collect())
            }
            ExprKind::Op(op, children) => evaluate_op(*op, children, scope, ctrl),
            ExprKind::Func(kind, args) => evaluate_func(*kind, args, scope, ctrl),
            ExprKind::Control(kind, children) => {
                evaluate_control(self, *kind, children, scope, ctrl)
            }
        }
    }

    /// Simplified form of the tree: evaluation against an empty scope without capabilities.
    pub fn simplify(&self) -> Expr {
        self.evaluate(&Scope::new(), None)
    }

    pub fn simplify_with(&self, ctrl: Option<&Controller>) -> Expr {
        self.evaluate(&Scope::new(), ctrl)
    }

    /// Evaluates with `vars[i] = values[i]` and returns the real value, NaN when the result is not real.
    pub fn eval_expression(&self, vars: &[&str], values: &[f64]) -> f64 {
        let bindings: Vec<(&str, Expr)> = vars
            .iter()
            .zip(values)
            .map(|(name, value)| (*name, Expr::real(*value)))
            .collect();
        let scope = Scope::with_bindings(&bindings);
        self.evaluate(&scope, None)
            .as_number()
            .and_then(Number::to_f64)
            .unwrap_or(f64::NAN)
    }
}

fn evaluate_op(op: OpKind, children: &[Expr], scope: &Scope, ctrl: Option<&Controller>) -> Expr {
    match (op, children) {
        (OpKind::Neg, [a]) => neg(&a.evaluate(scope, ctrl), ctrl),
        (OpKind::Not, [a]) => not(&a.evaluate(scope, ctrl)),
        (OpKind::And | OpKind::Or, [a, b]) => {
            let left = a.evaluate(scope, ctrl);
            let decisive = op == OpKind::Or;
            if left.as_bool() == Some(decisive) {
                return left;
            }
            calculate(op, &left, &b.evaluate(scope, ctrl), ctrl)
        }
        (_, [a, b]) => calculate(op, &a.evaluate(scope, ctrl), &b.evaluate(scope, ctrl), ctrl),
        _ => Expr::type_mismatch(&format!("operator {} has a wrong number of operands", op)),
    }
}

fn evaluate_func(
    kind: FuncKind,
    args: &[Expr],
    scope: &Scope,
    ctrl: Option<&Controller>,
) -> Expr {
    match (kind, args) {
        (FuncKind::Diff, [f, x]) => match x.as_var() {
            // differentiate before binding, so that a bound `x` does not turn `f` into a constant
            Some(id) => {
                let derivative = f.differentiate(id, ctrl);
                let unresolved =
                    matches!(derivative.as_func(FuncKind::Diff), Some([inner, _]) if inner == f);
                if unresolved {
                    derivative
                } else {
                    derivative.evaluate(scope, ctrl)
                }
            }
            None => Expr::type_mismatch("diff expects a variable as second argument"),
        },
        (FuncKind::Solve, [equation, x]) => match x.as_var() {
            Some(id) => {
                let local = scope.child();
                local.bind(id, x.clone());
                solve(&equation.evaluate(&local, ctrl), id, ctrl)
            }
            None => Expr::type_mismatch("solve expects a variable as second argument"),
        },
        _ => {
            let evaluated: Vec<Expr> = args.iter().map(|a| a.evaluate(scope, ctrl)).collect();
            apply(kind, &evaluated, ctrl)
        }
    }
}

fn evaluate_control(
    node: &Expr,
    kind: ControlKind,
    children: &[Expr],
    scope: &Scope,
    ctrl: Option<&Controller>,
) -> Expr {
    match (kind, children) {
        (ControlKind::If, [condition, then, otherwise]) => {
            let test = condition.evaluate(scope, ctrl);
            match test.as_bool() {
                Some(true) => then.evaluate(scope, ctrl),
                Some(false) => otherwise.evaluate(scope, ctrl),
                None if test.is_error() => test,
                None if test.is_constant() => Expr::type_mismatch("test neither true nor false"),
                None => Expr::if_then_else(
                    test,
                    then.evaluate(scope, ctrl),
                    otherwise.evaluate(scope, ctrl),
                ),
            }
        }
        (ControlKind::While, [condition, body]) => {
            if !loops_allowed(ctrl) {
                warn!("while refused: loops are not allowed by the controller");
                return node.clone();
            }
            run_loop(condition, body, None, scope, ctrl)
        }
        (ControlKind::For, [init, condition, step, body]) => {
            if !loops_allowed(ctrl) {
                warn!("for refused: loops are not allowed by the controller");
                return node.clone();
            }
            let local = scope.child();
            let start = init.evaluate(&local, ctrl);
            if start.is_error() {
                return start;
            }
            run_loop(condition, body, Some(step), &local, ctrl)
        }
        (ControlKind::Sum, [body, index, from, to]) => {
            if !loops_allowed(ctrl) {
                warn!("sum refused: loops are not allowed by the controller");
                return node.clone();
            }
            summation(body, index, from, to, scope, ctrl)
        }
        (ControlKind::Sleep, [seconds]) => sleep(&seconds.evaluate(scope, ctrl), ctrl),
        (ControlKind::Assign, [target, value]) => match target.as_var() {
            Some(id) => {
                let result = value.evaluate(scope, ctrl);
                scope.assign(id, result.clone());
                result
            }
            None => Expr::type_mismatch("only variables can be assigned"),
        },
        _ => Expr::type_mismatch(&format!("{} has a wrong number of children", kind)),
    }
}

fn is_cancellation(e: &Expr) -> bool {
    e.error_kind() == Some(ErrorKind::Cancelled)
}

/// Shared body of `while` and `for`. The value is the last body value, NaN when the body never ran.
fn run_loop(
    condition: &Expr,
    body: &Expr,
    step: Option<&Expr>,
    scope: &Scope,
    ctrl: Option<&Controller>,
) -> Expr {
    let mut last = Expr::nan();
    loop {
        if is_stopped(ctrl) {
            warn!("loop cancelled by the controller");
            return Expr::cancelled("Stopped");
        }
        let test = condition.evaluate(scope, ctrl);
        match test.as_bool() {
            Some(true) => {}
            Some(false) => return last,
            None if test.is_error() => return test,
            None => return Expr::type_mismatch("test neither true nor false"),
        }
        last = body.evaluate(scope, ctrl);
        if is_cancellation(&last) {
            return last;
        }
        if let Some(step) = step {
            let stepped = step.evaluate(scope, ctrl);
            if is_cancellation(&stepped) {
                return stepped;
            }
        }
    }
}

fn summation(
    body: &Expr,
    index: &Expr,
    from: &Expr,
    to: &Expr,
    scope: &Scope,
    ctrl: Option<&Controller>,
) -> Expr {
    let Some(id) = index.as_var() else {
        return Expr::type_mismatch("sum expects a variable as index");
    };
    let bounds = (from.evaluate(scope, ctrl), to.evaluate(scope, ctrl));
    for bound in [&bounds.0, &bounds.1] {
        if bound.is_error() {
            return bound.clone();
        }
    }
    let integer = |e: &Expr| e.as_number().and_then(Number::as_int);
    let (Some(first), Some(last)) = (integer(&bounds.0), integer(&bounds.1)) else {
        return Expr::type_mismatch("sum bounds must be integers");
    };
    let local = scope.child();
    let mut total = Expr::int(0);
    for i in first..=last {
        if is_stopped(ctrl) {
            warn!("sum cancelled by the controller");
            return Expr::cancelled("Stopped");
        }
        local.bind(id, Expr::int(i));
        total = add(&total, &body.evaluate(&local, ctrl), ctrl);
        if total.is_error() {
            return total;
        }
    }
    total
}

fn sleep(seconds: &Expr, ctrl: Option<&Controller>) -> Expr {
    if seconds.is_error() {
        return seconds.clone();
    }
    let Some(duration) = seconds
        .as_number()
        .and_then(Number::to_f64)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
    else {
        return Expr::type_mismatch("sleep expects a non-negative number of seconds");
    };
    let Some(ctrl) = ctrl else {
        if duration > MAX_UNCONTROLLED_SLEEP {
            return Expr::out_of_bounds(&format!(
                "sleep of {} s needs a controller to be interrupted",
                duration.as_secs_f64()
            ));
        }
        thread::sleep(duration);
        return Expr::boolean(true);
    };
    // None: the deadline lies beyond what Instant can hold, only the stop flag ends the wait
    let deadline = Instant::now().checked_add(duration);
    loop {
        if ctrl.is_stopped() {
            warn!("sleep interrupted by the controller");
            return Expr::cancelled("Interrupted");
        }
        let poll = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Expr::boolean(true);
                }
                ctrl.sleep_poll().min(deadline - now)
            }
            None => ctrl.sleep_poll(),
        };
        thread::sleep(poll);
    }
}
