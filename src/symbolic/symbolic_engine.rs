//! # Symbolic Engine Module
//!
//! The expression-node model of the calculator core. Every formula, intermediate result and
//! evaluation result is an [`Expr`]: an immutable, reference-counted node holding an [`ExprKind`].
//!
//! ## Purpose
//!
//! - represent numbers, strings, booleans, variables, arrays, operators, functions and control
//!   constructs with a handful of structural kinds parameterized by a tag,
//! - expose the tree-construction contract used by parsers and rewriters: arity, indexed child
//!   access and "rebuild with new children",
//! - keep nodes cheap to share: cloning an `Expr` clones an `Arc`, so rewrites reuse untouched subtrees
//!   and the deduplicator can point several parents at one subtree.
//!
//! ## Main Structures and Methods
//!
//! ### `ExprKind`
//! - **Leaves**: `Number`, `Bool`, `Char`, `Str`, `Var(NameId)`, `Error(CalcError)`
//! - **Arrays**: `Array(Vec<Expr>)` of any length
//! - **Operators**: `Op(OpKind, children)` for `+ - * / ^`, negation, `not`, comparisons and `& |`
//! - **Functions**: `Func(FuncKind, args)` for `sin`, `sqrt`, `det`, the unresolved `diff`/`solve` wrappers, ...
//! - **Control constructs**: `Control(ControlKind, children)` for `if`, `while`, `for`, `sum`, `sleep`, `:=`
//!
//! ### Key Methods
//! - `Expr::int`, `Expr::real`, `Expr::rational`, `Expr::var`, `Expr::Symbols` - leaf constructors
//! - `Expr::try_op`, `Expr::try_function`, `Expr::with_children` - checked construction
//! - `arity()`, `child(i)`, `children()` - tree access
//! - `variables()`, `contains_variable()`, `substitute()` - variable utilities
//!
//! ## Interesting Code Features
//!
//! 1. **Shared nodes**: `Expr` wraps `Arc<ExprKind>`; equality short-circuits on pointer identity,
//!    which makes interned small integers compare in O(1).
//! 2. **Operator sugar**: `std::ops` traits build raw (unsimplified) nodes so tests and callers can
//!    write `x.clone() * Expr::int(2) + Expr::int(3)`.
//! 3. **strum-derived names**: function and construct names are parsed and printed through
//!    `EnumString`/`IntoStaticStr`.

use crate::symbolic::symbolic_caches::{NameId, small_int};
use crate::symbolic::symbolic_errors::{CalcError, ErrorKind, NodeError};
use crate::symbolic::symbolic_numbers::{Number, NumericTier};
use regex::Regex;
use std::collections::HashSet;
use std::f64::consts::{E, PI};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Operator tags. The strum name is the glyph used when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum OpKind {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "^")]
    Pow,
    /// unary minus
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<=")]
    LessEq,
    #[strum(serialize = ">=")]
    GreaterEq,
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "|")]
    Or,
}

impl OpKind {
    pub fn arity(self) -> usize {
        match self {
            OpKind::Neg | OpKind::Not => 1,
            _ => 2,
        }
    }
}

/// Named functions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum FuncKind {
    Sin,
    Cos,
    Tan,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Sqrt,
    Abs,
    Sign,
    Norm,
    Conj,
    Fact,
    Det,
    Max,
    Min,
    RandList,
    /// unresolved derivative `diff(f, x)`
    Diff,
    /// unresolved equation `solve(eq, x)`
    Solve,
}

impl FuncKind {
    pub fn arity(self) -> usize {
        match self {
            FuncKind::Max | FuncKind::Min | FuncKind::Diff | FuncKind::Solve => 2,
            _ => 1,
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Control constructs. Evaluated lazily: the evaluator decides which children run and how often.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ControlKind {
    /// if(cond, then, else)
    If,
    /// while(cond, body)
    While,
    /// for(init, cond, step, body)
    For,
    /// sum(body, index, from, to)
    Sum,
    /// sleep(seconds)
    Sleep,
    /// target := value
    Assign,
}

impl ControlKind {
    pub fn arity(self) -> usize {
        match self {
            ControlKind::If => 3,
            ControlKind::While | ControlKind::Assign => 2,
            ControlKind::For | ControlKind::Sum => 4,
            ControlKind::Sleep => 1,
        }
    }
}

/// The variant stored in every node.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(Number),
    Bool(bool),
    Char(char),
    Str(Arc<str>),
    /// variable reference, resolved against the scope at evaluation time
    Var(NameId),
    /// error leaf, see [`ErrorKind`]
    Error(CalcError),
    Array(Vec<Expr>),
    Op(OpKind, Vec<Expr>),
    Func(FuncKind, Vec<Expr>),
    Control(ControlKind, Vec<Expr>),
}

/// Immutable, shared expression node.
#[derive(Clone)]
pub struct Expr(Arc<ExprKind>);

static VALID_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Expr {
    ////////////////////////////////////CONSTRUCTION////////////////////////////////////

    fn new(kind: ExprKind) -> Expr {
        Expr(Arc::new(kind))
    }

    /// Numeric leaf without consulting the small-integer table (used to fill that table).
    pub(crate) fn from_number_uncached(n: Number) -> Expr {
        Expr::new(ExprKind::Number(n))
    }

    /// Numeric leaf; small integers come from the interned table.
    pub fn number(n: Number) -> Expr {
        if let Number::Int(v) = n {
            if let Some(shared) = small_int(v) {
                return shared;
            }
        }
        Expr::from_number_uncached(n)
    }

    pub fn int(value: i64) -> Expr {
        Expr::number(Number::Int(value))
    }

    pub fn real(value: f64) -> Expr {
        Expr::number(Number::Real(value))
    }

    /// Reduced rational `numer/denom`, an integer when the division is exact.
    pub fn rational(numer: i64, denom: i64) -> Expr {
        Expr::number(Number::rational(numer, denom))
    }

    pub fn complex_int(re: i64, im: i64) -> Expr {
        Expr::number(Number::complex_int(re, im))
    }

    pub fn complex(re: f64, im: f64) -> Expr {
        Expr::number(Number::complex_real(num_complex::Complex64::new(re, im)))
    }

    pub fn nan() -> Expr {
        Expr::real(f64::NAN)
    }

    /// Euler's number, the base recognised by the exponential differentiation rule
    pub fn e() -> Expr {
        Expr::real(E)
    }

    pub fn pi() -> Expr {
        Expr::real(PI)
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::new(ExprKind::Bool(value))
    }

    pub fn character(value: char) -> Expr {
        Expr::new(ExprKind::Char(value))
    }

    pub fn string(value: &str) -> Expr {
        Expr::new(ExprKind::Str(Arc::from(value)))
    }

    /// Variable reference; the name is interned.
    pub fn var(name: &str) -> Expr {
        Expr::var_id(NameId::intern(name))
    }

    pub fn var_id(id: NameId) -> Expr {
        Expr::new(ExprKind::Var(id))
    }

    /// Variable reference with a validated identifier.
    pub fn try_variable(name: &str) -> Result<Expr, NodeError> {
        let valid = VALID_NAME
            .as_ref()
            .map_or(!name.is_empty(), |re| re.is_match(name));
        if valid {
            Ok(Expr::var(name))
        } else {
            Err(NodeError::InvalidName(name.to_string()))
        }
    }

    /// Creates several variables from a comma-separated list.
    ///
    /// # Examples
    /// ```rust, ignore
    /// let vars = Expr::Symbols("x, y, z");
    /// assert_eq!(vars.len(), 3);
    /// ```
    pub fn Symbols(symbols: &str) -> Vec<Expr> {
        symbols
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Expr::var)
            .collect()
    }

    pub fn array(items: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Array(items))
    }

    pub fn error(kind: ErrorKind, message: &str) -> Expr {
        Expr::new(ExprKind::Error(CalcError::new(kind, message)))
    }

    pub fn type_mismatch(message: &str) -> Expr {
        Expr::error(ErrorKind::TypeMismatch, message)
    }

    pub fn out_of_bounds(message: &str) -> Expr {
        Expr::error(ErrorKind::IndexOutOfBounds, message)
    }

    pub fn cancelled(message: &str) -> Expr {
        Expr::error(ErrorKind::Cancelled, message)
    }

    /// Raw unary operator node.
    pub fn unary(kind: OpKind, operand: Expr) -> Expr {
        debug_assert_eq!(kind.arity(), 1);
        Expr::new(ExprKind::Op(kind, vec![operand]))
    }

    /// Raw binary operator node.
    pub fn binary(kind: OpKind, left: Expr, right: Expr) -> Expr {
        debug_assert_eq!(kind.arity(), 2);
        Expr::new(ExprKind::Op(kind, vec![left, right]))
    }

    /// Raw one-argument function node.
    pub fn call(kind: FuncKind, arg: Expr) -> Expr {
        debug_assert_eq!(kind.arity(), 1);
        Expr::new(ExprKind::Func(kind, vec![arg]))
    }

    /// Raw two-argument function node.
    pub fn call2(kind: FuncKind, first: Expr, second: Expr) -> Expr {
        debug_assert_eq!(kind.arity(), 2);
        Expr::new(ExprKind::Func(kind, vec![first, second]))
    }

    pub fn pow(self, exponent: Expr) -> Expr {
        Expr::binary(OpKind::Pow, self, exponent)
    }

    pub fn equation(left: Expr, right: Expr) -> Expr {
        Expr::binary(OpKind::Eq, left, right)
    }

    pub fn if_then_else(condition: Expr, then: Expr, otherwise: Expr) -> Expr {
        Expr::new(ExprKind::Control(
            ControlKind::If,
            vec![condition, then, otherwise],
        ))
    }

    pub fn while_loop(condition: Expr, body: Expr) -> Expr {
        Expr::new(ExprKind::Control(ControlKind::While, vec![condition, body]))
    }

    pub fn for_loop(init: Expr, condition: Expr, step: Expr, body: Expr) -> Expr {
        Expr::new(ExprKind::Control(
            ControlKind::For,
            vec![init, condition, step, body],
        ))
    }

    pub fn sum(body: Expr, index: Expr, from: Expr, to: Expr) -> Expr {
        Expr::new(ExprKind::Control(ControlKind::Sum, vec![body, index, from, to]))
    }

    pub fn sleep(seconds: Expr) -> Expr {
        Expr::new(ExprKind::Control(ControlKind::Sleep, vec![seconds]))
    }

    pub fn assign(target: Expr, value: Expr) -> Expr {
        Expr::new(ExprKind::Control(ControlKind::Assign, vec![target, value]))
    }

    /// Unresolved derivative `diff(self, var)`.
    pub fn unresolved_derivative(&self, var: NameId) -> Expr {
        Expr::call2(FuncKind::Diff, self.clone(), Expr::var_id(var))
    }

    /// Unresolved equation `solve(self, var)`.
    pub fn unresolved_solve(&self, var: NameId) -> Expr {
        Expr::call2(FuncKind::Solve, self.clone(), Expr::var_id(var))
    }

    ////////////////////////////////CHECKED CONSTRUCTION////////////////////////////////

    fn check_arity(node: &str, expected: usize, found: usize) -> Result<(), NodeError> {
        if expected == found {
            Ok(())
        } else {
            Err(NodeError::ArityMismatch {
                node: node.to_string(),
                expected,
                found,
            })
        }
    }

    pub fn try_op(kind: OpKind, children: Vec<Expr>) -> Result<Expr, NodeError> {
        Expr::check_arity(kind.into(), kind.arity(), children.len())?;
        Ok(Expr::new(ExprKind::Op(kind, children)))
    }

    pub fn try_func(kind: FuncKind, args: Vec<Expr>) -> Result<Expr, NodeError> {
        Expr::check_arity(kind.name(), kind.arity(), args.len())?;
        Ok(Expr::new(ExprKind::Func(kind, args)))
    }

    /// Function node by name, as handed over by a parser.
    pub fn try_function(name: &str, args: Vec<Expr>) -> Result<Expr, NodeError> {
        let kind =
            FuncKind::from_str(name).map_err(|_| NodeError::UnknownFunction(name.to_string()))?;
        Expr::try_func(kind, args)
    }

    pub fn try_control(kind: ControlKind, children: Vec<Expr>) -> Result<Expr, NodeError> {
        Expr::check_arity(kind.into(), kind.arity(), children.len())?;
        if matches!(kind, ControlKind::Assign | ControlKind::Sum) {
            let target = if kind == ControlKind::Assign {
                &children[0]
            } else {
                &children[1]
            };
            if target.as_var().is_none() {
                return Err(NodeError::NotAVariable(target.to_string()));
            }
        }
        Ok(Expr::new(ExprKind::Control(kind, children)))
    }

    /// Same node kind with new children. Fails when the count does not match the kind's arity.
    pub fn with_children(&self, children: Vec<Expr>) -> Result<Expr, NodeError> {
        match self.kind() {
            ExprKind::Array(_) => Ok(Expr::array(children)),
            ExprKind::Op(kind, _) => Expr::try_op(*kind, children),
            ExprKind::Func(kind, _) => Expr::try_func(*kind, children),
            ExprKind::Control(kind, _) => Expr::try_control(*kind, children),
            _ if children.is_empty() => Ok(self.clone()),
            _ => Err(NodeError::ArityMismatch {
                node: self.to_string(),
                expected: 0,
                found: children.len(),
            }),
        }
    }

    /// `with_children` for callers that preserve the child count by construction.
    pub(crate) fn replace_children(&self, children: Vec<Expr>) -> Expr {
        match self.kind() {
            ExprKind::Array(_) => Expr::array(children),
            ExprKind::Op(kind, _) => Expr::new(ExprKind::Op(*kind, children)),
            ExprKind::Func(kind, _) => Expr::new(ExprKind::Func(*kind, children)),
            ExprKind::Control(kind, _) => Expr::new(ExprKind::Control(*kind, children)),
            _ => self.clone(),
        }
    }

    ////////////////////////////////////TREE ACCESS/////////////////////////////////////

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    /// Pointer identity.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn children(&self) -> &[Expr] {
        match self.kind() {
            ExprKind::Array(items) => items,
            ExprKind::Op(_, children)
            | ExprKind::Func(_, children)
            | ExprKind::Control(_, children) => children,
            _ => &[],
        }
    }

    pub fn arity(&self) -> usize {
        self.children().len()
    }

    pub fn child(&self, index: usize) -> Option<&Expr> {
        self.children().get(index)
    }

    /// Same variant, tag and child count (children themselves are not compared, leaves compare fully).
    pub fn same_head(&self, other: &Expr) -> bool {
        match (self.kind(), other.kind()) {
            (ExprKind::Array(a), ExprKind::Array(b)) => a.len() == b.len(),
            (ExprKind::Op(k1, _), ExprKind::Op(k2, _)) => k1 == k2,
            (ExprKind::Func(k1, _), ExprKind::Func(k2, _)) => k1 == k2,
            (ExprKind::Control(k1, _), ExprKind::Control(k2, _)) => k1 == k2,
            _ => self == other,
        }
    }

    pub fn op_kind(&self) -> Option<OpKind> {
        match self.kind() {
            ExprKind::Op(kind, _) => Some(*kind),
            _ => None,
        }
    }

    pub fn func_kind(&self) -> Option<FuncKind> {
        match self.kind() {
            ExprKind::Func(kind, _) => Some(*kind),
            _ => None,
        }
    }

    pub fn control_kind(&self) -> Option<ControlKind> {
        match self.kind() {
            ExprKind::Control(kind, _) => Some(*kind),
            _ => None,
        }
    }

    /// Children of an operator node of the given kind.
    pub fn as_op(&self, kind: OpKind) -> Option<&[Expr]> {
        match self.kind() {
            ExprKind::Op(k, children) if *k == kind => Some(children),
            _ => None,
        }
    }

    /// Arguments of a function node of the given kind.
    pub fn as_func(&self, kind: FuncKind) -> Option<&[Expr]> {
        match self.kind() {
            ExprKind::Func(k, args) if *k == kind => Some(args),
            _ => None,
        }
    }

    ////////////////////////////////////PREDICATES//////////////////////////////////////

    pub fn as_number(&self) -> Option<&Number> {
        match self.kind() {
            ExprKind::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic: booleans widen to 0/1.
    pub fn to_number(&self) -> Option<Number> {
        match self.kind() {
            ExprKind::Number(n) => Some(*n),
            ExprKind::Bool(b) => Some(Number::Int(*b as i64)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind() {
            ExprKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<NameId> {
        match self.kind() {
            ExprKind::Var(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Expr]> {
        match self.kind() {
            ExprKind::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&CalcError> {
        match self.kind() {
            ExprKind::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Position in the numeric tower; everything that is not a number or boolean is `NonNumeric`.
    pub fn tier(&self) -> NumericTier {
        match self.kind() {
            ExprKind::Bool(_) => NumericTier::Boolean,
            ExprKind::Number(n) => n.tier(),
            _ => NumericTier::NonNumeric,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self.kind(), ExprKind::Number(_))
    }

    /// Numbers, booleans, characters and strings.
    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind(),
            ExprKind::Number(_) | ExprKind::Bool(_) | ExprKind::Char(_) | ExprKind::Str(_)
        )
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(
            self.kind(),
            ExprKind::Array(_) | ExprKind::Op(..) | ExprKind::Func(..) | ExprKind::Control(..)
        )
    }

    pub fn is_nan(&self) -> bool {
        self.as_number().is_some_and(Number::is_nan)
    }

    /// Error leaves and NaN: operands that every operation hands back unchanged.
    pub fn is_error(&self) -> bool {
        matches!(self.kind(), ExprKind::Error(_)) || self.is_nan()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.kind() {
            ExprKind::Error(e) => Some(e.kind),
            _ if self.is_nan() => Some(ErrorKind::NotANumber),
            ExprKind::Func(FuncKind::Diff | FuncKind::Solve, _) => Some(ErrorKind::Unresolved),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_number().is_some_and(Number::is_zero)
    }

    pub fn is_one(&self) -> bool {
        self.as_number().is_some_and(Number::is_one)
    }

    pub fn is_minus_one(&self) -> bool {
        self.as_number().is_some_and(Number::is_minus_one)
    }

    pub fn is_negative_number(&self) -> bool {
        self.as_number().is_some_and(Number::is_negative)
    }

    ////////////////////////////////////VARIABLES///////////////////////////////////////

    /// Distinct variables of the tree in order of first appearance.
    pub fn variables(&self) -> Vec<NameId> {
        fn collect(expr: &Expr, seen: &mut HashSet<NameId>, out: &mut Vec<NameId>) {
            if let ExprKind::Var(id) = expr.kind() {
                if seen.insert(*id) {
                    out.push(*id);
                }
            }
            for child in expr.children() {
                collect(child, seen, out);
            }
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        collect(self, &mut seen, &mut out);
        out
    }

    pub fn contains_variable(&self, var: NameId) -> bool {
        match self.kind() {
            ExprKind::Var(id) => *id == var,
            _ => self.children().iter().any(|c| c.contains_variable(var)),
        }
    }

    /// Replaces every reference to `var` by `replacement`; untouched subtrees are shared.
    pub fn substitute(&self, var: NameId, replacement: &Expr) -> Expr {
        match self.kind() {
            ExprKind::Var(id) if *id == var => replacement.clone(),
            _ if self.is_leaf() || !self.contains_variable(var) => self.clone(),
            _ => self.replace_children(
                self.children()
                    .iter()
                    .map(|c| c.substitute(var, replacement))
                    .collect(),
            ),
        }
    }
}

/// Raw node construction, no simplification.
impl std::ops::Add for Expr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Expr::binary(OpKind::Add, self, rhs)
    }
}

impl std::ops::Sub for Expr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Expr::binary(OpKind::Sub, self, rhs)
    }
}

impl std::ops::Mul for Expr {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Expr::binary(OpKind::Mul, self, rhs)
    }
}

impl std::ops::Div for Expr {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Expr::binary(OpKind::Div, self, rhs)
    }
}

impl std::ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Expr::unary(OpKind::Neg, self)
    }
}
