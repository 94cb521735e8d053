//! Evaluation scopes.
//!
//! A scope is a frame of named cells with an optional parent. Lookups walk the chain outwards,
//! so a child frame shadows its parent. Frames live on the Rust stack of the evaluation call that
//! opened them (`for`, `sum`, `solve`), which is exactly the lifetime they need.
//! Cells are overwritten in place when a loop re-assigns its counter.

use crate::symbolic::symbolic_caches::NameId;
use crate::symbolic::symbolic_engine::Expr;
use std::cell::RefCell;

#[derive(Debug, Default)]
pub struct Scope<'p> {
    parent: Option<&'p Scope<'p>>,
    cells: RefCell<Vec<(NameId, Expr)>>,
}

impl<'p> Scope<'p> {
    /// Empty root scope.
    pub fn new() -> Scope<'static> {
        Scope {
            parent: None,
            cells: RefCell::new(Vec::new()),
        }
    }

    /// Root scope pre-filled with `(name, value)` pairs.
    ///
    /// # Examples
    /// ```rust, ignore
    /// let scope = Scope::with_bindings(&[("x", Expr::int(5))]);
    /// ```
    pub fn with_bindings(bindings: &[(&str, Expr)]) -> Scope<'static> {
        let scope = Scope::new();
        for (name, value) in bindings {
            scope.bind(NameId::intern(name), value.clone());
        }
        scope
    }

    /// Nested frame whose lookups fall back to `self`.
    pub fn child(&'p self) -> Scope<'p> {
        Scope {
            parent: Some(self),
            cells: RefCell::new(Vec::new()),
        }
    }

    pub fn parent(&self) -> Option<&'p Scope<'p>> {
        self.parent
    }

    /// Defines or overwrites `id` in this frame only.
    pub fn bind(&self, id: NameId, value: Expr) {
        let mut cells = self.cells.borrow_mut();
        match cells.iter_mut().find(|(name, _)| *name == id) {
            Some(cell) => cell.1 = value,
            None => cells.push((id, value)),
        }
    }

    /// Overwrites the nearest existing binding of `id`, or defines it in this frame.
    pub fn assign(&self, id: NameId, value: Expr) {
        let mut frame: Option<&Scope> = Some(self);
        while let Some(current) = frame {
            if current.is_bound_locally(id) {
                current.bind(id, value);
                return;
            }
            frame = current.parent;
        }
        self.bind(id, value);
    }

    pub fn is_bound_locally(&self, id: NameId) -> bool {
        self.cells.borrow().iter().any(|(name, _)| *name == id)
    }

    /// Bound value of `id`, `None` when no frame binds it.
    pub fn lookup(&self, id: NameId) -> Option<Expr> {
        self.lookup_with_outer(id).map(|(value, _)| value)
    }

    /// Bound value together with the frame enclosing the one that owns the binding.
    /// The value is evaluated against that outer frame, so `x := x + 1` style bindings
    /// never resolve against themselves.
    pub fn lookup_with_outer(&self, id: NameId) -> Option<(Expr, Option<&Scope<'p>>)> {
        let found = self
            .cells
            .borrow()
            .iter()
            .find(|(name, _)| *name == id)
            .map(|(_, value)| value.clone());
        match found {
            Some(value) => Some((value, self.parent)),
            None => self.parent?.lookup_with_outer(id),
        }
    }

    /// Number of bindings in this frame.
    pub fn len(&self) -> usize {
        self.cells.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.borrow().is_empty()
    }
}
