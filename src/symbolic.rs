#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// error leaves (data flowing through evaluation) and construction errors
pub mod symbolic_errors;
/// interned variable names, the small-integer table, factorials and permutations
pub mod symbolic_caches;
/// numeric tower: integers, rationals, reals and their complex counterparts
pub mod symbolic_numbers;
///____________________________________________________________________________________________________________________________
/// # Symbolic engine
/// the expression-node model: leaves, operators, functions and control constructs
///# Example#
/// ```
/// use RustedCalc::symbolic::symbolic_engine::Expr;
/// use RustedCalc::symbolic::symbolic_scope::Scope;
/// let x = Expr::var("x");
/// let f = Expr::int(2) * x.clone() + Expr::int(3);
/// let scope = Scope::with_bindings(&[("x", Expr::int(5))]);
/// assert_eq!(f.evaluate(&scope, None), Expr::int(13));
/// println!("f = {}, df/dx = {}", f, f.diff("x"));
/// ```
/// ________________________________________________________________________________________________________________________________
pub mod symbolic_engine;
/// symbolic derivatives
pub mod symbolic_engine_derivatives;
/// term collection over addition and multiplication chains
pub mod symbolic_terms;
/// per-operator arithmetic and algebraic identities
pub mod symbolic_simplify;
/// function catalogue: elementary functions, factorial, determinant, norm, max/min, random lists
pub mod symbolic_functions;
/// variable frames used during evaluation
pub mod symbolic_scope;
/// cancellation, capability gates and scratch-buffer pooling
pub mod symbolic_controller;
/// recursive evaluation and control constructs
pub mod symbolic_evaluate;
///
/// isolate a variable of an equation
///# Example#
/// ```
/// use RustedCalc::symbolic::symbolic_engine::Expr;
/// let x = Expr::var("x");
/// let eq = Expr::equation(Expr::int(2) * x.clone() + Expr::int(3), Expr::int(7));
/// assert_eq!(eq.solve_for("x"), Expr::equation(x, Expr::int(2)));
/// ```
pub mod symbolic_solve;
/// hoist repeated subexpressions into auxiliary variables
pub mod symbolic_dedup;
/// infix and LaTeX rendering
pub mod symbolic_display;
///
mod symbolic_engine_tests;
