//! # Term Collection Module
//!
//! Flattens chains of additions/subtractions (or multiplications/divisions) into two term lists,
//! `up` and `down`, sorts them, merges like terms and folds the survivors back into a tree.
//!
//! ## Lists
//!
//! | chain          | `up`                | `down`                         |
//! |----------------|---------------------|--------------------------------|
//! | additive       | addends             | subtrahends                    |
//! | multiplicative | numerator factors   | denominator factors            |
//!
//! Filling recurses through the chain's own operators: `a - (b - c)` lands as `up = [a, c]`,
//! `down = [b]`; `a / b^-2` lands as `up = [a, b^2]`.
//!
//! ## Ordering
//!
//! Terms are sorted by [`TermKey`]: variable factors first, then strings, then function nodes,
//! then numbers, then everything else. Names compare in descending order because the fold walks
//! the list backwards, so the folded tree reads `3 + x + y` and `2*x*y`.
//!
//! ## Algorithm
//!
//! 1. multiplicative chains pull every sign out of the factors into one flag,
//! 2. stable sort of both lists,
//! 3. within a run of equal keys, pairs are combined with the chain's operator (`x + 2x -> 3x`,
//!    `x * x^2 -> x^3`); a result that is still the chain's operator means "no merge",
//! 4. `down` terms cancel against `up` terms with the inverse operator (`x - x -> 0`, `x^3 / x -> x^2`),
//! 5. negative leftovers move to the other list, neutral elements (0 or 1) disappear,
//! 6. the lists fold back into a left-nested tree in reverse sorted order.

use crate::symbolic::symbolic_controller::Controller;
use crate::symbolic::symbolic_engine::{Expr, ExprKind, OpKind};
use crate::symbolic::symbolic_simplify::{combine, neg};
use log::debug;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Additive,
    Multiplicative,
}

impl Chain {
    pub fn of(op: OpKind) -> Option<Chain> {
        match op {
            OpKind::Add | OpKind::Sub | OpKind::Neg => Some(Chain::Additive),
            OpKind::Mul | OpKind::Div => Some(Chain::Multiplicative),
            _ => None,
        }
    }

    pub fn op(self) -> OpKind {
        match self {
            Chain::Additive => OpKind::Add,
            Chain::Multiplicative => OpKind::Mul,
        }
    }

    pub fn inverse(self) -> OpKind {
        match self {
            Chain::Additive => OpKind::Sub,
            Chain::Multiplicative => OpKind::Div,
        }
    }

    fn neutral(self) -> Expr {
        match self {
            Chain::Additive => Expr::int(0),
            Chain::Multiplicative => Expr::int(1),
        }
    }

    fn is_neutral(self, term: &Expr) -> bool {
        match self {
            Chain::Additive => term.is_zero(),
            Chain::Multiplicative => term.is_one(),
        }
    }

    /// Whether `up.len()` / `down.len()` raw terms are worth a collection pass.
    pub fn should_collect(self, up: usize, down: usize) -> bool {
        match self {
            Chain::Additive => up + down > 2 || up == 2 || down == 2,
            Chain::Multiplicative => up + down > 2,
        }
    }
}

/// Sorting key of a term.
#[derive(Debug, Clone, PartialEq)]
pub enum TermKey {
    Variable(Arc<str>),
    Str(Arc<str>),
    Function(&'static str),
    Numeric,
    Other,
}

impl TermKey {
    fn rank(&self) -> u8 {
        match self {
            TermKey::Variable(_) => 0,
            TermKey::Str(_) => 1,
            TermKey::Function(_) => 2,
            TermKey::Numeric => 3,
            TermKey::Other => 4,
        }
    }

    pub fn of(term: &Expr, chain: Chain) -> TermKey {
        match (chain, term.op_kind()) {
            (Chain::Additive, Some(OpKind::Mul)) => {
                let mut factors = Vec::new();
                mul_factors(term, &mut factors);
                factors
                    .into_iter()
                    .map(TermKey::factor)
                    .find(|key| *key != TermKey::Numeric)
                    .unwrap_or(TermKey::Numeric)
            }
            _ => TermKey::factor(term),
        }
    }

    fn factor(term: &Expr) -> TermKey {
        match (term.kind(), term.children()) {
            (ExprKind::Var(id), _) => TermKey::Variable(id.name()),
            (ExprKind::Op(OpKind::Pow, _), [base, _]) => match base.as_var() {
                Some(id) => TermKey::Variable(id.name()),
                None => TermKey::Other,
            },
            (ExprKind::Str(s), _) => TermKey::Str(Arc::clone(s)),
            (ExprKind::Func(kind, _), _) => TermKey::Function(kind.name()),
            (ExprKind::Number(_) | ExprKind::Bool(_), _) => TermKey::Numeric,
            _ => TermKey::Other,
        }
    }

    pub fn compare(&self, other: &TermKey) -> Ordering {
        match (self, other) {
            (TermKey::Variable(a), TermKey::Variable(b)) | (TermKey::Str(a), TermKey::Str(b)) => {
                b.cmp(a)
            }
            (TermKey::Function(a), TermKey::Function(b)) => b.cmp(a),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Factors of a multiplication chain, left to right.
fn mul_factors<'e>(term: &'e Expr, out: &mut Vec<&'e Expr>) {
    match term.as_op(OpKind::Mul) {
        Some([a, b]) => {
            mul_factors(a, out);
            mul_factors(b, out);
        }
        _ => out.push(term),
    }
}

////////////////////////////////////FILLING//////////////////////////////////////////

/// Distributes `term` over addends (`up`) and subtrahends (`down`).
pub fn fill_additive(term: &Expr, up: &mut Vec<Expr>, down: &mut Vec<Expr>) {
    match (term.op_kind(), term.children()) {
        (Some(OpKind::Add), [a, b]) => {
            fill_additive(a, up, down);
            fill_additive(b, up, down);
        }
        (Some(OpKind::Sub), [a, b]) => {
            fill_additive(a, up, down);
            fill_additive(b, down, up);
        }
        (Some(OpKind::Neg), [a]) => fill_additive(a, down, up),
        _ => up.push(term.clone()),
    }
}

/// Distributes `term` over numerator (`up`) and denominator (`down`) factors.
pub fn fill_multiplicative(term: &Expr, up: &mut Vec<Expr>, down: &mut Vec<Expr>) {
    match (term.op_kind(), term.children()) {
        (Some(OpKind::Mul), [a, b]) => {
            fill_multiplicative(a, up, down);
            fill_multiplicative(b, up, down);
        }
        (Some(OpKind::Div), [a, b]) => {
            fill_multiplicative(a, up, down);
            fill_multiplicative(b, down, up);
        }
        (Some(OpKind::Pow), [base, exponent]) if exponent.is_negative_number() => {
            down.push(reciprocal_power(base, exponent));
        }
        _ => up.push(term.clone()),
    }
}

/// `base^(-exponent)` for a negative numeric exponent, plain `base` when that is `base^1`.
fn reciprocal_power(base: &Expr, exponent: &Expr) -> Expr {
    match exponent.as_number() {
        Some(n) if n.is_minus_one() => base.clone(),
        Some(n) => Expr::binary(OpKind::Pow, base.clone(), Expr::number(n.neg())),
        None => Expr::binary(OpKind::Pow, base.clone(), exponent.clone()),
    }
}

////////////////////////////////////COLLECTION///////////////////////////////////////

/// Runs the collection algorithm over already filled lists and folds the result.
///
/// # Arguments
/// * `chain` - which operator family the lists belong to
/// * `up`, `down` - filled term lists, consumed (left empty for reuse)
/// * `ctrl` - evaluation controller, forwarded to every pairwise merge
pub fn collect(
    chain: Chain,
    up: &mut Vec<Expr>,
    down: &mut Vec<Expr>,
    ctrl: Option<&Controller>,
) -> Expr {
    debug!(
        "collecting {:?} chain: {} up, {} down",
        chain,
        up.len(),
        down.len()
    );
    let negative = match chain {
        Chain::Multiplicative => extract_signs(up) != extract_signs(down),
        Chain::Additive => false,
    };
    tidy(chain, up, ctrl);
    tidy(chain, down, ctrl);
    cancel(chain, up, down, ctrl);
    // cancelling may leave several numbers in one list
    tidy(chain, up, ctrl);
    tidy(chain, down, ctrl);
    balance(chain, up, down);
    sort_terms(chain, up);
    sort_terms(chain, down);

    if chain == Chain::Multiplicative && up.iter().any(Expr::is_zero) {
        up.clear();
        down.clear();
        return Expr::int(0);
    }
    up.retain(|t| !chain.is_neutral(t));
    down.retain(|t| !chain.is_neutral(t));

    let result = match chain {
        Chain::Additive => fold_additive(up, down),
        Chain::Multiplicative => fold_multiplicative(up, down, negative, ctrl),
    };
    up.clear();
    down.clear();
    result
}

fn sort_terms(chain: Chain, terms: &mut [Expr]) {
    terms.sort_by(|a, b| TermKey::of(a, chain).compare(&TermKey::of(b, chain)));
}

fn tidy(chain: Chain, terms: &mut Vec<Expr>, ctrl: Option<&Controller>) {
    sort_terms(chain, terms);
    merge_runs(chain, terms, ctrl);
}

/// Replaces negated and negative factors by their positive form; true when an odd number flipped.
fn extract_signs(terms: &mut [Expr]) -> bool {
    let mut negative = false;
    for term in terms.iter_mut() {
        let positive = match (term.kind(), term.children()) {
            (ExprKind::Op(OpKind::Neg, _), [inner]) => inner.clone(),
            (ExprKind::Number(n), _) if n.is_negative() => Expr::number(n.neg()),
            _ => continue,
        };
        *term = positive;
        negative = !negative;
    }
    negative
}

/// Merges equal-key terms of one (sorted) list with the chain operator.
fn merge_runs(chain: Chain, terms: &mut Vec<Expr>, ctrl: Option<&Controller>) {
    let op = chain.op();
    let mut i = 1;
    while i < terms.len() {
        let key = TermKey::of(&terms[i], chain);
        let mut j = i;
        let mut absorbed = false;
        while j > 0 && TermKey::of(&terms[j - 1], chain).compare(&key) == Ordering::Equal {
            j -= 1;
            if let Some(merged) = combine(op, &terms[j], &terms[i], ctrl) {
                if merged.op_kind() != Some(op) {
                    terms[j] = merged;
                    terms.remove(i);
                    absorbed = true;
                    break;
                }
            }
        }
        if !absorbed {
            i += 1;
        }
    }
}

/// Cancels `down` terms against equal-key `up` terms with the inverse operator.
fn cancel(chain: Chain, up: &mut [Expr], down: &mut Vec<Expr>, ctrl: Option<&Controller>) {
    let inverse = chain.inverse();
    down.retain(|d| {
        let key = TermKey::of(d, chain);
        for u in up.iter_mut() {
            if TermKey::of(u, chain).compare(&key) != Ordering::Equal {
                continue;
            }
            if let Some(merged) = combine(inverse, u, d, ctrl) {
                if merged.op_kind() != Some(inverse) {
                    *u = merged;
                    return false;
                }
            }
        }
        true
    });
}

/// Moves terms that read better on the other list: `+(-3)` becomes `-3`, `*x^-2` becomes `/x^2`.
fn balance(chain: Chain, up: &mut Vec<Expr>, down: &mut Vec<Expr>) {
    fn flipped(chain: Chain, term: &Expr) -> Option<Expr> {
        match (chain, term.kind(), term.children()) {
            (Chain::Additive, ExprKind::Number(n), _) if n.is_negative() => {
                Some(Expr::number(n.neg()))
            }
            (Chain::Additive, ExprKind::Op(OpKind::Neg, _), [inner]) => Some(inner.clone()),
            (Chain::Multiplicative, ExprKind::Op(OpKind::Pow, _), [base, exponent])
                if exponent.is_negative_number() =>
            {
                Some(reciprocal_power(base, exponent))
            }
            _ => None,
        }
    }
    fn split(chain: Chain, from: &mut Vec<Expr>) -> Vec<Expr> {
        let mut moved = Vec::new();
        from.retain(|t| match flipped(chain, t) {
            Some(other) => {
                moved.push(other);
                false
            }
            None => true,
        });
        moved
    }
    let to_down = split(chain, up);
    let to_up = split(chain, down);
    up.extend(to_up);
    down.extend(to_down);
}

/// Left-nested fold of `terms` from the last element backwards.
fn fold_reversed(op: OpKind, terms: &[Expr]) -> Option<Expr> {
    let (head, rest) = terms.split_last()?;
    Some(
        rest.iter()
            .rev()
            .fold(head.clone(), |acc, t| Expr::binary(op, acc, t.clone())),
    )
}

fn fold_additive(up: &[Expr], down: &[Expr]) -> Expr {
    let start = match fold_reversed(OpKind::Add, up) {
        Some(sum) => sum,
        None => match down.split_last() {
            Some((head, rest)) => {
                let negated = Expr::unary(OpKind::Neg, head.clone());
                return rest
                    .iter()
                    .rev()
                    .fold(negated, |acc, t| Expr::binary(OpKind::Sub, acc, t.clone()));
            }
            None => return Chain::Additive.neutral(),
        },
    };
    down.iter()
        .rev()
        .fold(start, |acc, t| Expr::binary(OpKind::Sub, acc, t.clone()))
}

fn fold_multiplicative(
    up: &[Expr],
    down: &[Expr],
    negative: bool,
    ctrl: Option<&Controller>,
) -> Expr {
    let mut numerator: Vec<Expr> = up.to_vec();
    if negative {
        // the last sorted factor is the one the folded product reads first
        match numerator.last_mut() {
            Some(first) => *first = neg(first, ctrl),
            None => numerator.push(Expr::int(-1)),
        }
    }
    let top = fold_reversed(OpKind::Mul, &numerator)
        .unwrap_or_else(|| Chain::Multiplicative.neutral());
    match fold_reversed(OpKind::Mul, down) {
        Some(bottom) => Expr::binary(OpKind::Div, top, bottom),
        None => top,
    }
}
