//! # Shared tables
//!
//! Process-wide, append-only tables used by the evaluator:
//! - variable names interned to [`NameId`]s so that variable nodes compare by a `u32`,
//! - canonical singletons for small integers (precomputed, no locking on the read path),
//! - the factorial table (precomputed up to the largest finite `f64` factorial),
//! - permutations with signum, grown lazily per size and read by the determinant.
//!
//! All tables are only ever extended. A published permutation level is an `Arc<[Permutation]>`
//! that is never touched again, so a reader holding it can not observe a half written entry.

use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_numbers::Number;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

/// Interned variable name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameId(u32);

#[derive(Default)]
struct NameTable {
    ids: HashMap<Arc<str>, NameId>,
    names: Vec<Arc<str>>,
}

static NAMES: LazyLock<RwLock<NameTable>> = LazyLock::new(|| RwLock::new(NameTable::default()));

impl NameId {
    /// Returns the id of `name`, registering it on first use.
    pub fn intern(name: &str) -> NameId {
        if let Some(id) = NAMES
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .get(name)
        {
            return *id;
        }
        let mut table = NAMES.write().unwrap_or_else(PoisonError::into_inner);
        // another thread may have registered it between the two locks
        if let Some(id) = table.ids.get(name) {
            return *id;
        }
        let id = NameId(table.names.len() as u32);
        let shared: Arc<str> = Arc::from(name);
        table.names.push(Arc::clone(&shared));
        table.ids.insert(shared, id);
        id
    }

    /// Id of `name` if it was registered before. Never registers.
    pub fn lookup(name: &str) -> Option<NameId> {
        NAMES
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .get(name)
            .copied()
    }

    pub fn name(self) -> Arc<str> {
        let table = NAMES.read().unwrap_or_else(PoisonError::into_inner);
        table
            .names
            .get(self.0 as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from("?"))
    }
}

impl fmt::Debug for NameId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for NameId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

////////////////////////////////SMALL INTEGERS////////////////////////////////////////

pub const SMALL_INT_MIN: i64 = -128;
pub const SMALL_INT_MAX: i64 = 1024;

static SMALL_INTS: LazyLock<Vec<Expr>> = LazyLock::new(|| {
    (SMALL_INT_MIN..=SMALL_INT_MAX)
        .map(|v| Expr::from_number_uncached(Number::Int(v)))
        .collect()
});

/// Canonical leaf for `value` when it lies in the interned range.
pub fn small_int(value: i64) -> Option<Expr> {
    if (SMALL_INT_MIN..=SMALL_INT_MAX).contains(&value) {
        SMALL_INTS.get((value - SMALL_INT_MIN) as usize).cloned()
    } else {
        None
    }
}

////////////////////////////////FACTORIALS////////////////////////////////////////////

/// 170! is the largest factorial representable as a finite f64
pub const MAX_FACTORIAL: i64 = 170;

static FACTORIALS: LazyLock<Vec<Expr>> = LazyLock::new(|| {
    let mut table = Vec::with_capacity(MAX_FACTORIAL as usize + 1);
    let mut exact: Option<i64> = Some(1);
    let mut approx = 1.0_f64;
    for n in 0..=MAX_FACTORIAL {
        if n > 0 {
            exact = exact.and_then(|v| v.checked_mul(n));
            approx *= n as f64;
        }
        table.push(match exact {
            Some(v) => Expr::number(Number::Int(v)),
            None => Expr::number(Number::Real(approx)),
        });
    }
    table
});

/// n! as an interned leaf: exact up to 20!, double up to 170!, +inf above, NaN below zero.
pub fn factorial(n: i64) -> Expr {
    if n < 0 {
        return Expr::nan();
    }
    if n > MAX_FACTORIAL {
        return Expr::real(f64::INFINITY);
    }
    FACTORIALS
        .get(n as usize)
        .cloned()
        .unwrap_or_else(|| Expr::real(f64::INFINITY))
}

////////////////////////////////PERMUTATIONS//////////////////////////////////////////

/// One permutation of `0..n` and its signum (+1 even, -1 odd).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    pub indices: Box<[usize]>,
    pub sign: i8,
}

static PERMUTATIONS: LazyLock<RwLock<Vec<Arc<[Permutation]>>>> = LazyLock::new(|| {
    let identity = Permutation {
        indices: Box::new([]),
        sign: 1,
    };
    RwLock::new(vec![Arc::from(vec![identity])])
});

/// All permutations of size `n`. Levels below `n` are built on demand by the first caller that needs them.
pub fn permutations(n: usize) -> Arc<[Permutation]> {
    if let Some(level) = PERMUTATIONS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(n)
    {
        return Arc::clone(level);
    }
    let mut table = PERMUTATIONS.write().unwrap_or_else(PoisonError::into_inner);
    while table.len() <= n {
        let size = table.len();
        let next = extend_level(&table[size - 1], size);
        table.push(next);
    }
    Arc::clone(&table[n])
}

/// Inserts the element `size - 1` at every position of every permutation of size `size - 1`.
/// Inserting at position k adds `size - 1 - k` inversions.
fn extend_level(previous: &[Permutation], size: usize) -> Arc<[Permutation]> {
    let mut level = Vec::with_capacity(previous.len() * size);
    for perm in previous {
        for k in 0..size {
            let mut indices = Vec::with_capacity(size);
            indices.extend_from_slice(&perm.indices[..k]);
            indices.push(size - 1);
            indices.extend_from_slice(&perm.indices[k..]);
            let sign = if (size - 1 - k) % 2 == 0 {
                perm.sign
            } else {
                -perm.sign
            };
            level.push(Permutation {
                indices: indices.into_boxed_slice(),
                sign,
            });
        }
    }
    Arc::from(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_interning_is_stable() {
        let a = NameId::intern("alpha_cache_test");
        let b = NameId::intern("alpha_cache_test");
        assert_eq!(a, b);
        assert_eq!(&*a.name(), "alpha_cache_test");
        assert_eq!(NameId::lookup("alpha_cache_test"), Some(a));
        assert_eq!(NameId::lookup("never_registered_name_xyz"), None);
    }

    #[test]
    fn test_small_ints_are_shared() {
        let a = small_int(7).unwrap();
        let b = small_int(7).unwrap();
        assert!(a.ptr_eq(&b));
        assert!(small_int(SMALL_INT_MAX + 1).is_none());
    }

    #[test]
    fn test_factorial_table() {
        assert_eq!(factorial(0), Expr::int(1));
        assert_eq!(factorial(5), Expr::int(120));
        assert_eq!(factorial(20), Expr::int(2_432_902_008_176_640_000));
        assert!(matches!(factorial(21).as_number(), Some(Number::Real(_))));
        assert_eq!(factorial(171), Expr::real(f64::INFINITY));
        assert!(factorial(-1).is_nan());
        assert!(factorial(10).ptr_eq(&factorial(10)));
    }

    #[test]
    fn test_permutation_counts_and_signs() {
        assert_eq!(permutations(0).len(), 1);
        assert_eq!(permutations(3).len(), 6);
        assert_eq!(permutations(4).len(), 24);
        for perm in permutations(4).iter() {
            let mut inversions = 0;
            for i in 0..perm.indices.len() {
                for j in i + 1..perm.indices.len() {
                    if perm.indices[i] > perm.indices[j] {
                        inversions += 1;
                    }
                }
            }
            let expected = if inversions % 2 == 0 { 1 } else { -1 };
            assert_eq!(perm.sign, expected);
        }
    }

    #[test]
    fn test_published_levels_are_not_rebuilt() {
        let first = permutations(2);
        let _grow = permutations(5);
        let again = permutations(2);
        assert!(Arc::ptr_eq(&first, &again));
    }
}
