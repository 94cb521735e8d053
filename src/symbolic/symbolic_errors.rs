//! Error values of the calculator core.
//!
//! Two families live here:
//! - [`CalcError`] is *data*: it sits inside the tree as an `ExprKind::Error` leaf and flows through
//!   `calculate` like any other operand. Whoever receives an error operand hands it back unchanged.
//! - [`NodeError`] is a Rust-level failure raised only when somebody tries to build a malformed node
//!   (wrong child count, unknown function name, ...). It never appears during evaluation of a well formed tree.

use std::fmt;
use std::sync::Arc;
use strum_macros::{Display, EnumIter};

/// Classification of error leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ErrorKind {
    /// ill-defined numeric result (0/0, factorial of a negative number, ...)
    NotANumber,
    /// out-of-range access or mismatched array sizes
    IndexOutOfBounds,
    /// operation applied to an incompatible variant
    TypeMismatch,
    /// legitimately irreducible symbolic result
    Unresolved,
    /// cooperative abort observed through the controller
    Cancelled,
}

/// Error leaf payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CalcError {
    pub kind: ErrorKind,
    pub message: Arc<str>,
}

impl CalcError {
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        CalcError {
            kind,
            message: Arc::from(message),
        }
    }
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Exception:\"{}\"", self.message)
    }
}

/// Raised by the tree-construction contract when a node would be malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeError {
    ArityMismatch {
        node: String,
        expected: usize,
        found: usize,
    },
    NotAVariable(String),
    InvalidName(String),
    UnknownFunction(String),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NodeError::ArityMismatch {
                node,
                expected,
                found,
            } => write!(
                f,
                "node '{}' expects {} children but {} were given",
                node, expected, found
            ),
            NodeError::NotAVariable(what) => write!(f, "'{}' is not a variable reference", what),
            NodeError::InvalidName(name) => write!(f, "'{}' is not a valid variable name", name),
            NodeError::UnknownFunction(name) => write!(f, "unknown function '{}'", name),
        }
    }
}

impl std::error::Error for NodeError {}
