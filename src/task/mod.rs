/// Result memoization keyed by caller task id
pub mod memo;
/// Solver plugins
pub mod solver;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Handle correlating a submitted task with its future result.
///
/// Issued by a store in strictly increasing order and never reused within
/// that store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(pub u64);

impl Ticket {
    /// Numeric value of the ticket
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coefficients of `a*x^2 + b*x + c = 0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    /// Quadratic coefficient
    pub a: f64,
    /// Linear coefficient
    pub b: f64,
    /// Constant term
    pub c: f64,
}

impl Coefficients {
    /// Create a new set of coefficients
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }
}

impl fmt::Display for Coefficients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.a, self.b, self.c)
    }
}

/// Roots of a quadratic equation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Roots {
    /// No real roots
    NoSolution,
    /// Exactly one root
    One {
        /// The root
        root: f64,
    },
    /// Two distinct roots, smaller first
    Two {
        /// Smaller root
        low: f64,
        /// Larger root
        high: f64,
    },
    /// Every real number is a root
    Infinite,
}

impl fmt::Display for Roots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Roots::NoSolution => write!(f, "no solution"),
            Roots::One { root } => write!(f, "x = {root}"),
            Roots::Two { low, high } => write!(f, "x1 = {low}, x2 = {high}"),
            Roots::Infinite => write!(f, "infinite roots"),
        }
    }
}

/// Unit of work for the remote compute stand-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeTask {
    /// Caller-side identifier, independent of the store ticket
    pub id: u64,
    /// Value to square
    pub value: i64,
}

impl ComputeTask {
    /// Create a new compute task
    pub fn new(id: u64, value: i64) -> Self {
        Self { id, value }
    }
}

impl fmt::Display for ComputeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compute[{}]({})", self.id, self.value)
    }
}

/// Task with a caller-assigned identity.
///
/// Two tasks with the same key are expected to produce the same result,
/// which is what lets [`memo::Memoized`] reuse it.
pub trait Keyed {
    /// Identity type
    type Key: Eq + Hash + Clone + fmt::Display + Send + Sync;

    /// Identity of this task
    fn key(&self) -> Self::Key;
}

impl Keyed for ComputeTask {
    type Key = u64;

    fn key(&self) -> u64 {
        self.id
    }
}

/// Terminal result published for a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome<R> {
    /// The solver produced a value
    Solved(R),
    /// The solver failed; the message describes why
    Failed(String),
}

impl<R> Outcome<R> {
    /// Check if the outcome carries a value
    pub fn is_solved(&self) -> bool {
        matches!(self, Outcome::Solved(_))
    }

    /// Borrow the solved value, if any
    pub fn solved(&self) -> Option<&R> {
        match self {
            Outcome::Solved(value) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    /// Convert into a crate result
    pub fn into_result(self) -> crate::Result<R> {
        match self {
            Outcome::Solved(value) => Ok(value),
            Outcome::Failed(reason) => Err(crate::PipelineError::SolverFailed(reason)),
        }
    }
}

impl<R> From<crate::Result<R>> for Outcome<R> {
    fn from(result: crate::Result<R>) -> Self {
        match result {
            Ok(value) => Outcome::Solved(value),
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

impl<R: fmt::Display> fmt::Display for Outcome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Solved(value) => write!(f, "{value}"),
            Outcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_ordering_and_display() {
        assert!(Ticket(1) < Ticket(2));
        assert_eq!(Ticket(42).to_string(), "#42");
        assert_eq!(Ticket(42).value(), 42);
    }

    #[test]
    fn test_roots_serialization() {
        let json = serde_json::to_value(Roots::Two { low: -2.0, high: 2.0 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "two", "low": -2.0, "high": 2.0}));

        let json = serde_json::to_value(Roots::Infinite).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "infinite"}));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: Outcome<i64> = Ok(4).into();
        assert_eq!(ok, Outcome::Solved(4));
        assert_eq!(ok.solved(), Some(&4));

        let failed: Outcome<i64> = Err(crate::PipelineError::SolverFailed("boom".into())).into();
        assert!(!failed.is_solved());
        assert_eq!(failed.to_string(), "failed: Solver failed: boom");
        assert!(failed.into_result().is_err());
    }
}
