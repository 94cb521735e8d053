//! # Subexpression Deduplication Module
//!
//! Finds structurally equal subtrees and hoists a repeated one into an auxiliary variable
//! (`tmpvar0`, `tmpvar1`, ...).
//!
//! ## Purpose
//!
//! Large derivative trees repeat the same subexpression many times (`cos(x*y)` in every
//! partial derivative, ...). After a hoist every occurrence is the same variable, so the caller
//! evaluates the shared subtree once and binds the result.
//!
//! ## Algorithm
//!
//! The pass works on a shadow arena of wrappers, one per node, each with its parent slot, a
//! reference count and a depth (leaves 0, interior nodes one more than their deepest child).
//! Wrappers are grouped in buckets by depth.
//!
//! 1. buckets are scanned from the leaves upwards. Two wrappers of one bucket are equal when their
//!    heads match and their child slots point to the same wrappers, which is structural equality
//!    because the children were merged one bucket earlier. The later wrapper's parent slot is
//!    redirected to the earlier wrapper and the reference counts move accordingly
//! 2. buckets are walked from the root downwards, the first interior wrapper referenced more than
//!    once is hoisted and the pass stops. Callers re-invoke to flatten further
//! 3. the tree is rebuilt from the arena; subtrees without a hoist are shared with the input
//!
//! ## Example
//! ```rust, ignore
//! let mut vars = Vec::new();
//! let mut subtrees = Vec::new();
//! // sin(x*y) + cos(x*y)  ->  sin(tmpvar0) + cos(tmpvar0), tmpvar0 = x*y
//! let flat = substitute(&f, &mut vars, &mut subtrees)?;
//! ```

use crate::symbolic::symbolic_caches::NameId;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_errors::NodeError;
use itertools::Itertools;
use log::debug;

#[derive(Debug)]
struct Wrapper {
    node: Expr,
    children: Vec<usize>,
    /// (parent wrapper, child slot)
    parent: Option<(usize, usize)>,
    refs: usize,
    depth: usize,
}

#[derive(Debug, Default)]
struct Arena {
    wrappers: Vec<Wrapper>,
    buckets: Vec<Vec<usize>>,
}

impl Arena {
    fn new(root: &Expr) -> (Arena, usize) {
        let mut arena = Arena::default();
        let root = arena.insert(root);
        (arena, root)
    }

    fn insert(&mut self, node: &Expr) -> usize {
        let children: Vec<usize> = node.children().iter().map(|c| self.insert(c)).collect();
        let depth = children
            .iter()
            .map(|&c| self.wrappers[c].depth + 1)
            .max()
            .unwrap_or(0);
        let index = self.wrappers.len();
        for (slot, &child) in children.iter().enumerate() {
            self.wrappers[child].parent = Some((index, slot));
        }
        self.wrappers.push(Wrapper {
            node: node.clone(),
            children,
            parent: None,
            refs: 1,
            depth,
        });
        if self.buckets.len() <= depth {
            self.buckets.resize_with(depth + 1, Vec::new);
        }
        self.buckets[depth].push(index);
        index
    }

    fn equal(&self, a: usize, b: usize) -> bool {
        let (wa, wb) = (&self.wrappers[a], &self.wrappers[b]);
        if wa.node.is_leaf() || wb.node.is_leaf() {
            return wa.node == wb.node;
        }
        wa.node.same_head(&wb.node) && wa.children == wb.children
    }

    fn merge_equal(&mut self) {
        for depth in 0..self.buckets.len() {
            let pairs: Vec<(usize, usize)> = self.buckets[depth]
                .iter()
                .copied()
                .tuple_combinations()
                .collect();
            for (earlier, later) in pairs {
                let alive = |w: usize| self.wrappers[w].refs > 0;
                if !alive(earlier) || !alive(later) || !self.equal(earlier, later) {
                    continue;
                }
                if let Some((parent, slot)) = self.wrappers[later].parent {
                    self.wrappers[parent].children[slot] = earlier;
                }
                self.wrappers[earlier].refs += 1;
                self.wrappers[later].refs -= 1;
            }
        }
    }

    fn first_shared(&self) -> Option<usize> {
        self.buckets.iter().rev().find_map(|bucket| {
            bucket.iter().copied().find(|&w| {
                let wrapper = &self.wrappers[w];
                wrapper.refs > 1 && !wrapper.node.is_leaf()
            })
        })
    }

    fn rebuild(
        &self,
        index: usize,
        hoisted: (usize, &Expr),
        memo: &mut Vec<Option<Expr>>,
    ) -> Result<Expr, NodeError> {
        if let Some(done) = &memo[index] {
            return Ok(done.clone());
        }
        let wrapper = &self.wrappers[index];
        let rebuilt = if index == hoisted.0 {
            hoisted.1.clone()
        } else if wrapper.children.is_empty() {
            wrapper.node.clone()
        } else {
            let children = wrapper
                .children
                .iter()
                .map(|&c| self.rebuild(c, hoisted, memo))
                .collect::<Result<Vec<Expr>, NodeError>>()?;
            let unchanged = children
                .iter()
                .zip(wrapper.node.children())
                .all(|(new, old)| new.ptr_eq(old));
            if unchanged {
                wrapper.node.clone()
            } else {
                wrapper.node.with_children(children)?
            }
        };
        memo[index] = Some(rebuilt.clone());
        Ok(rebuilt)
    }
}

/// First `tmpvar{k}` that is neither used in `root` nor already handed out.
fn fresh_variable(root: &Expr, taken: &[NameId]) -> NameId {
    let used = root.variables();
    (taken.len()..)
        .map(|k| NameId::intern(&format!("tmpvar{}", k)))
        .find(|id| !used.contains(id) && !taken.contains(id))
        .unwrap_or_else(|| NameId::intern("tmpvar"))
}

/// Hoists one repeated subtree of `root`.
///
/// # Arguments
/// * `root` - tree to scan, left untouched
/// * `variables` - receives the auxiliary variable when a hoist happens
/// * `subtrees` - receives the subtree the new variable stands for, parallel to `variables`
/// # Returns
/// the rewritten tree, or `root` itself when nothing repeats
pub fn substitute(
    root: &Expr,
    variables: &mut Vec<NameId>,
    subtrees: &mut Vec<Expr>,
) -> Result<Expr, NodeError> {
    let (mut arena, root_index) = Arena::new(root);
    arena.merge_equal();
    let Some(shared) = arena.first_shared() else {
        return Ok(root.clone());
    };
    let id = fresh_variable(root, variables);
    let subtree = arena.wrappers[shared].node.clone();
    debug!(
        "dedup: hoisting {:?} ({} references) as {}",
        subtree, arena.wrappers[shared].refs, id
    );
    let replacement = Expr::var_id(id);
    let mut memo = vec![None; arena.wrappers.len()];
    let rebuilt = arena.rebuild(root_index, (shared, &replacement), &mut memo)?;
    variables.push(id);
    subtrees.push(subtree);
    Ok(rebuilt)
}

/// Runs [`substitute`] until nothing repeats in the returned tree.
pub fn flatten(
    root: &Expr,
    variables: &mut Vec<NameId>,
    subtrees: &mut Vec<Expr>,
) -> Result<Expr, NodeError> {
    let mut current = root.clone();
    loop {
        let before = variables.len();
        current = substitute(&current, variables, subtrees)?;
        if variables.len() == before {
            return Ok(current);
        }
    }
}

/// Re-inlines hoisted subtrees, latest first, so that nested auxiliaries resolve.
pub fn inline(root: &Expr, variables: &[NameId], subtrees: &[Expr]) -> Expr {
    variables
        .iter()
        .zip(subtrees)
        .rev()
        .fold(root.clone(), |tree, (id, subtree)| tree.substitute(*id, subtree))
}
