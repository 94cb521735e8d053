//! Display implementations for expressions.
//!
//! ## Standard Display (`to_string()` / `{}`)
//! Infix notation with the fewest parentheses that keep the tree shape:
//! - `3 + x + y`, `2*x*y`, `x^(1/2)`, `a - (b + c)`
//! - functions and control constructs print as calls: `max(x, 2)`, `if(x < 0, -x, x)`
//! - arrays print as `{1, x}`, assignments as `y := x + 1`, error leaves as `Exception:"message"`
//!
//! ## LaTeX Format (`to_latex()`)
//! - `\frac{x + 1}{x^{2}}`, `2 \cdot \sin\left(x\right)`, `\sqrt{x}`
//!
//! Every node has a binding priority (leaves 8, `!` 7, `^` 6, `* /` 5, `+ - neg` 4, comparisons 3,
//! `& |` 2, `:=` 1). Negative and complex numbers bind like a sum, rationals like a quotient.
//! A child is wrapped when it binds weaker than its parent, or equally weak on the side where the
//! operator does not associate (`^` associates to the right, everything else to the left).

use crate::symbolic::symbolic_engine::{ControlKind, Expr, ExprKind, FuncKind, OpKind};
use crate::symbolic::symbolic_numbers::Number;
use itertools::Itertools;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq)]
enum FormatMode {
    Standard,
    Latex,
}

/// Expression paired with the notation it is written in.
struct Shown<'a> {
    expr: &'a Expr,
    mode: FormatMode,
}

impl fmt::Display for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(self.expr, f, self.mode)
    }
}

fn shown(expr: &Expr, mode: FormatMode) -> Shown<'_> {
    Shown { expr, mode }
}

fn op_priority(op: OpKind) -> u8 {
    match op {
        OpKind::Not => 7,
        OpKind::Pow => 6,
        OpKind::Mul | OpKind::Div => 5,
        OpKind::Add | OpKind::Sub | OpKind::Neg => 4,
        OpKind::Eq | OpKind::Less | OpKind::Greater | OpKind::LessEq | OpKind::GreaterEq => 3,
        OpKind::And | OpKind::Or => 2,
    }
}

fn priority(e: &Expr) -> u8 {
    match e.kind() {
        ExprKind::Number(n) if n.is_negative() || n.is_complex() => 4,
        ExprKind::Number(Number::Rational(_)) => 5,
        ExprKind::Op(op, _) => op_priority(*op),
        ExprKind::Control(ControlKind::Assign, _) => 1,
        _ => 8,
    }
}

fn write_wrapped(
    e: &Expr,
    f: &mut fmt::Formatter<'_>,
    mode: FormatMode,
    wrap: bool,
) -> fmt::Result {
    match (wrap, mode) {
        (false, _) => write_expr(e, f, mode),
        (true, FormatMode::Standard) => write!(f, "({})", shown(e, mode)),
        (true, FormatMode::Latex) => write!(f, r"\left({}\right)", shown(e, mode)),
    }
}

fn symbol(op: OpKind, mode: FormatMode) -> &'static str {
    match (op, mode) {
        (OpKind::Add, _) => " + ",
        (OpKind::Sub, _) => " - ",
        (OpKind::Mul, FormatMode::Standard) => "*",
        (OpKind::Mul, FormatMode::Latex) => r" \cdot ",
        (OpKind::Div, _) => "/",
        (OpKind::Pow, _) => "^",
        (OpKind::Eq, _) => " = ",
        (OpKind::Less, _) => " < ",
        (OpKind::Greater, _) => " > ",
        (OpKind::LessEq, FormatMode::Standard) => " <= ",
        (OpKind::LessEq, FormatMode::Latex) => r" \le ",
        (OpKind::GreaterEq, FormatMode::Standard) => " >= ",
        (OpKind::GreaterEq, FormatMode::Latex) => r" \ge ",
        (OpKind::And, FormatMode::Standard) => " & ",
        (OpKind::And, FormatMode::Latex) => r" \land ",
        (OpKind::Or, FormatMode::Standard) => " | ",
        (OpKind::Or, FormatMode::Latex) => r" \lor ",
        (OpKind::Neg, _) => "-",
        (OpKind::Not, FormatMode::Standard) => "!",
        (OpKind::Not, FormatMode::Latex) => r"\lnot ",
    }
}

fn write_binary(
    op: OpKind,
    a: &Expr,
    b: &Expr,
    f: &mut fmt::Formatter<'_>,
    mode: FormatMode,
) -> fmt::Result {
    if mode == FormatMode::Latex {
        match op {
            OpKind::Div => return write!(f, r"\frac{{{}}}{{{}}}", shown(a, mode), shown(b, mode)),
            OpKind::Pow => {
                write_wrapped(a, f, mode, priority(a) <= op_priority(op))?;
                return write!(f, "^{{{}}}", shown(b, mode));
            }
            _ => {}
        }
    }
    let p = op_priority(op);
    let (wrap_left, wrap_right) = if op == OpKind::Pow {
        (priority(a) <= p, priority(b) < p)
    } else {
        (priority(a) < p, priority(b) <= p)
    };
    write_wrapped(a, f, mode, wrap_left)?;
    f.write_str(symbol(op, mode))?;
    write_wrapped(b, f, mode, wrap_right)
}

fn write_number(n: &Number, f: &mut fmt::Formatter<'_>, mode: FormatMode) -> fmt::Result {
    match (n, mode) {
        (Number::Rational(r), FormatMode::Latex) => {
            let sign = if r.numer() < &0 { "-" } else { "" };
            write!(f, r"{}\frac{{{}}}{{{}}}", sign, r.numer().abs(), r.denom())
        }
        _ => write!(f, "{}", n),
    }
}

fn latex_function(kind: FuncKind) -> Option<&'static str> {
    match kind {
        FuncKind::Sin => Some(r"\sin"),
        FuncKind::Cos => Some(r"\cos"),
        FuncKind::Tan => Some(r"\tan"),
        FuncKind::Atan => Some(r"\arctan"),
        FuncKind::Sinh => Some(r"\sinh"),
        FuncKind::Cosh => Some(r"\cosh"),
        FuncKind::Tanh => Some(r"\tanh"),
        FuncKind::Exp => Some(r"\exp"),
        FuncKind::Ln => Some(r"\ln"),
        FuncKind::Max => Some(r"\max"),
        FuncKind::Min => Some(r"\min"),
        FuncKind::Det => Some(r"\det"),
        _ => None,
    }
}

fn write_call(
    name: &str,
    args: &[Expr],
    f: &mut fmt::Formatter<'_>,
    mode: FormatMode,
) -> fmt::Result {
    let joined = args.iter().map(|a| shown(a, mode)).join(", ");
    match mode {
        FormatMode::Standard => write!(f, "{}({})", name, joined),
        FormatMode::Latex => write!(f, r"{}\left({}\right)", name, joined),
    }
}

fn write_function(
    kind: FuncKind,
    args: &[Expr],
    f: &mut fmt::Formatter<'_>,
    mode: FormatMode,
) -> fmt::Result {
    if mode == FormatMode::Standard {
        return write_call(kind.name(), args, f, mode);
    }
    match (kind, args) {
        (FuncKind::Sqrt, [a]) => write!(f, r"\sqrt{{{}}}", shown(a, mode)),
        (FuncKind::Abs, [a]) => write!(f, r"\left|{}\right|", shown(a, mode)),
        (FuncKind::Norm, [a]) => write!(f, r"\left\|{}\right\|", shown(a, mode)),
        (FuncKind::Conj, [a]) => write!(f, r"\overline{{{}}}", shown(a, mode)),
        (FuncKind::Fact, [a]) => {
            write_wrapped(a, f, mode, priority(a) < 8)?;
            f.write_str("!")
        }
        (FuncKind::Diff, [g, x]) => write!(
            f,
            r"\frac{{\partial}}{{\partial {}}}\left({}\right)",
            shown(x, mode),
            shown(g, mode)
        ),
        _ => match latex_function(kind) {
            Some(name) => write_call(name, args, f, mode),
            None => write_call(&format!(r"\operatorname{{{}}}", kind.name()), args, f, mode),
        },
    }
}

fn write_expr(e: &Expr, f: &mut fmt::Formatter<'_>, mode: FormatMode) -> fmt::Result {
    match e.kind() {
        ExprKind::Number(n) => write_number(n, f, mode),
        ExprKind::Bool(b) => write!(f, "{}", b),
        ExprKind::Char(c) => write!(f, "'{}'", c),
        ExprKind::Str(s) => match mode {
            FormatMode::Standard => write!(f, "\"{}\"", s),
            FormatMode::Latex => write!(f, r"\text{{{}}}", s),
        },
        ExprKind::Var(id) => write!(f, "{}", id),
        ExprKind::Error(error) => match mode {
            FormatMode::Standard => write!(f, "{}", error),
            FormatMode::Latex => write!(f, r"\text{{Exception: {}}}", error.message),
        },
        ExprKind::Array(items) => {
            let joined = items.iter().map(|a| shown(a, mode)).join(", ");
            match mode {
                FormatMode::Standard => write!(f, "{{{}}}", joined),
                FormatMode::Latex => write!(f, r"\left\{{{}\right\}}", joined),
            }
        }
        ExprKind::Op(op, children) => match children.as_slice() {
            [a] => {
                f.write_str(symbol(*op, mode))?;
                write_wrapped(a, f, mode, priority(a) < op_priority(*op).max(5))
            }
            [a, b] => write_binary(*op, a, b, f, mode),
            _ => write_call(symbol(*op, mode).trim(), children, f, mode),
        },
        ExprKind::Func(kind, args) => write_function(*kind, args, f, mode),
        ExprKind::Control(ControlKind::Assign, children) => match children.as_slice() {
            [target, value] => write!(f, "{} := {}", shown(target, mode), shown(value, mode)),
            _ => write_call("assign", children, f, mode),
        },
        ExprKind::Control(kind, children) => {
            let name: &'static str = (*kind).into();
            match mode {
                FormatMode::Standard => write_call(name, children, f, mode),
                FormatMode::Latex => {
                    write_call(&format!(r"\operatorname{{{}}}", name), children, f, mode)
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(self, f, FormatMode::Standard)
    }
}

impl Expr {
    /// LaTeX rendering of the tree, for math environments.
    pub fn to_latex(&self) -> String {
        shown(self, FormatMode::Latex).to_string()
    }
}
