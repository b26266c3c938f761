//! Routing error definitions.

use std::time::Duration;

use thiserror::Error;

/// A problem that makes a route set unpublishable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two or more slots share one route id.
    #[error("Duplicate route id `{id}` at slots {slots:?}")]
    DuplicateId { id: String, slots: Vec<usize> },

    /// A predicate could not be compiled.
    #[error("Route `{route_id}` (slot {slot}) predicate #{position} `{predicate}`: {reason}")]
    MalformedPredicate {
        route_id: String,
        slot: usize,
        position: usize,
        predicate: String,
        reason: String,
    },

    /// A route without predicates can never be matched deliberately.
    #[error("Route `{route_id}` (slot {slot}) has no predicates")]
    MissingPredicates { route_id: String, slot: usize },

    /// The target is not an absolute URI.
    #[error("Route `{route_id}` (slot {slot}) has invalid uri `{uri}`: {reason}")]
    InvalidUri {
        route_id: String,
        slot: usize,
        uri: String,
        reason: String,
    },

    /// A filter with no name.
    #[error("Filter #{position} of {owner} has an empty name")]
    MalformedFilter { owner: String, position: usize },
}

/// Why a compilation did not produce a generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Route table rejected with {} validation error(s)", .0.len())]
    Invalid(Vec<ValidationError>),

    #[error("Compilation exceeded its budget of {0:?}")]
    BudgetExceeded(Duration),

    #[error("Compilation task aborted: {0}")]
    Aborted(String),
}

impl CompileError {
    /// Validation errors carried by this failure, if any.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            CompileError::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

/// A store mutation that does not fit the current working set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("No route at slot {slot} (expected `{id}`)")]
    UnknownRoute { slot: usize, id: String },

    #[error("Slot {slot} holds `{actual}`, not `{expected}`")]
    SlotMismatch {
        slot: usize,
        expected: String,
        actual: String,
    },
}
