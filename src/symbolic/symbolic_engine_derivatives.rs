//! # Symbolic Engine Derivatives Module
//!
//! Symbolic differentiation of expression trees.
//!
//! ## Purpose
//!
//! `differentiate(var, ctrl)` walks the tree once and rebuilds it through the arithmetic engine,
//! so the derivative comes out simplified (`d/dx (x + x) = 2`, not `1 + 1`).
//!
//! ## Rules
//!
//! - **leaves**: the differentiation variable gives 1, every other leaf 0; subtrees that do not
//!   mention the variable give 0
//! - **operators**: sum, difference, product and quotient rules; powers use the elementary rule
//!   for a constant exponent, the exponential rule for the base `e` and `d(b*ln(a)) * a^b` otherwise
//! - **functions**: closed-form table with chain rule (`sin`, `cos`, `tan`, `atan`, `sinh`, `cosh`,
//!   `tanh`, `exp`, `ln`, `sqrt`, `abs`, `norm`, `conj`)
//! - **max/min**: a conditional node `if(a > b, da, db)` whose comparison runs again at every
//!   evaluation, so the selected branch follows the data
//! - **if/sum**: only the branches and the summand are differentiated, the condition and bounds stay
//! - anything else becomes the unresolved node `diff(f, x)`
//!
//! ## Key Methods
//! - `differentiate(var, ctrl)` - derivative by interned name id
//! - `diff(var)` - derivative by name
//! - `diff_multi()` - all partial derivatives
//! - `n_th_derivative(var, n)` - repeated differentiation

use crate::symbolic::symbolic_caches::NameId;
use crate::symbolic::symbolic_controller::Controller;
use crate::symbolic::symbolic_engine::{ControlKind, Expr, ExprKind, FuncKind, OpKind};
use crate::symbolic::symbolic_functions::{call, negated_call};
use crate::symbolic::symbolic_simplify::{add, div, mul, neg, pow, sub};

impl Expr {
    /// Derivative with respect to the variable `var`. The receiver is left untouched.
    ///
    /// # Arguments
    /// * `var` - interned variable name
    /// * `ctrl` - controller forwarded to the arithmetic engine
    pub fn differentiate(&self, var: NameId, ctrl: Option<&Controller>) -> Expr {
        match self.kind() {
            ExprKind::Var(id) => Expr::int((*id == var) as i64),
            ExprKind::Error(_) => self.clone(),
            ExprKind::Number(_) | ExprKind::Bool(_) | ExprKind::Char(_) | ExprKind::Str(_) => {
                Expr::int(0)
            }
            _ if self.is_nan() => self.clone(),
            ExprKind::Array(items) => Expr::array(
                items
                    .iter()
                    .map(|item| item.differentiate(var, ctrl))
                    .collect(),
            ),
            ExprKind::Op(..) | ExprKind::Func(..) if !self.contains_variable(var) => Expr::int(0),
            ExprKind::Op(op, children) => self.differentiate_op(*op, children, var, ctrl),
            ExprKind::Func(kind, args) => self.differentiate_func(*kind, args, var, ctrl),
            ExprKind::Control(kind, children) => match (kind, children.as_slice()) {
                (ControlKind::If, [condition, then, otherwise]) => Expr::if_then_else(
                    condition.clone(),
                    then.differentiate(var, ctrl),
                    otherwise.differentiate(var, ctrl),
                ),
                (ControlKind::Sum, [body, index, from, to]) if index.as_var() != Some(var) => {
                    Expr::sum(
                        body.differentiate(var, ctrl),
                        index.clone(),
                        from.clone(),
                        to.clone(),
                    )
                }
                _ => self.unresolved_derivative(var),
            },
        }
    }

    fn differentiate_op(
        &self,
        op: OpKind,
        children: &[Expr],
        var: NameId,
        ctrl: Option<&Controller>,
    ) -> Expr {
        let d = |e: &Expr| e.differentiate(var, ctrl);
        match (op, children) {
            (OpKind::Neg, [a]) => neg(&d(a), ctrl),
            (OpKind::Add, [a, b]) => add(&d(a), &d(b), ctrl),
            (OpKind::Sub, [a, b]) => sub(&d(a), &d(b), ctrl),
            (OpKind::Mul, [a, b]) => add(&mul(&d(a), b, ctrl), &mul(a, &d(b), ctrl), ctrl),
            (OpKind::Div, [a, b]) => {
                let numerator = sub(&mul(&d(a), b, ctrl), &mul(a, &d(b), ctrl), ctrl);
                div(&numerator, &pow(b, &Expr::int(2), ctrl), ctrl)
            }
            (OpKind::Pow, [a, b]) if !b.contains_variable(var) => {
                let lowered = pow(a, &sub(b, &Expr::int(1), ctrl), ctrl);
                mul(&mul(b, &lowered, ctrl), &d(a), ctrl)
            }
            (OpKind::Pow, [a, b]) if *a == Expr::e() => mul(&d(b), self, ctrl),
            (OpKind::Pow, [a, b]) => {
                let exponent = mul(b, &call(FuncKind::Ln, a, ctrl), ctrl);
                mul(&d(&exponent), self, ctrl)
            }
            _ => self.unresolved_derivative(var),
        }
    }

    fn differentiate_func(
        &self,
        kind: FuncKind,
        args: &[Expr],
        var: NameId,
        ctrl: Option<&Controller>,
    ) -> Expr {
        let two = Expr::int(2);
        match (kind, args) {
            (FuncKind::Max | FuncKind::Min, [a, b]) => {
                let op = if kind == FuncKind::Max {
                    OpKind::Greater
                } else {
                    OpKind::Less
                };
                Expr::if_then_else(
                    Expr::binary(op, a.clone(), b.clone()),
                    a.differentiate(var, ctrl),
                    b.differentiate(var, ctrl),
                )
            }
            (_, [a]) => {
                let da = a.differentiate(var, ctrl);
                let outer = match kind {
                    FuncKind::Sin => call(FuncKind::Cos, a, ctrl),
                    FuncKind::Cos => negated_call(FuncKind::Sin, a, ctrl),
                    FuncKind::Tan => {
                        return div(&da, &pow(&call(FuncKind::Cos, a, ctrl), &two, ctrl), ctrl);
                    }
                    FuncKind::Atan => {
                        let denominator = add(&Expr::int(1), &pow(a, &two, ctrl), ctrl);
                        return div(&da, &denominator, ctrl);
                    }
                    FuncKind::Sinh => call(FuncKind::Cosh, a, ctrl),
                    FuncKind::Cosh => call(FuncKind::Sinh, a, ctrl),
                    FuncKind::Tanh => {
                        return div(&da, &pow(&call(FuncKind::Cosh, a, ctrl), &two, ctrl), ctrl);
                    }
                    FuncKind::Exp => call(FuncKind::Exp, a, ctrl),
                    FuncKind::Ln => return div(&da, a, ctrl),
                    FuncKind::Sqrt => {
                        let denominator = mul(&two, &call(FuncKind::Sqrt, a, ctrl), ctrl);
                        return div(&da, &denominator, ctrl);
                    }
                    FuncKind::Abs => call(FuncKind::Sign, a, ctrl),
                    FuncKind::Norm => {
                        return div(&mul(a, &da, ctrl), &call(FuncKind::Norm, a, ctrl), ctrl);
                    }
                    FuncKind::Conj => return call(FuncKind::Conj, &da, ctrl),
                    _ => return self.unresolved_derivative(var),
                };
                mul(&outer, &da, ctrl)
            }
            _ => self.unresolved_derivative(var),
        }
    }

    /// Derivative with respect to the variable named `var`.
    ///
    /// # Examples
    /// ```rust, ignore
    /// let f = Expr::call(FuncKind::Sin, Expr::var("x"));
    /// assert_eq!(f.diff("x"), Expr::call(FuncKind::Cos, Expr::var("x")));
    /// ```
    pub fn diff(&self, var: &str) -> Expr {
        self.differentiate(NameId::intern(var), None)
    }

    /// Partial derivatives with respect to every variable of the tree, in order of appearance.
    pub fn diff_multi(&self) -> Vec<Expr> {
        self.variables()
            .into_iter()
            .map(|var| self.differentiate(var, None))
            .collect()
    }

    pub fn n_th_derivative(&self, var: &str, n: usize) -> Expr {
        let id = NameId::intern(var);
        (0..n).fold(self.clone(), |acc, _| acc.differentiate(id, None))
    }
}
