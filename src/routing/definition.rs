//! Route definition types.
//!
//! # Responsibilities
//! - Describe a route as configured: id, predicates, filters, target, order
//! - Parse and render the `Name=arg1,arg2` shortcut notation
//!
//! # Design Decisions
//! - Definitions are plain data; predicates stay uncompiled until the
//!   compiler turns them into matchers
//! - Shortcut parsing never fails: a malformed predicate is still a
//!   definition, and the compiler reports it with its location

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A request predicate such as `Path=/api/**` or `Method=GET,POST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateDefinition {
    /// Predicate kind (`Path`, `Method`, `Host`, `Header`, `Query`, `Cookie`).
    pub name: String,
    /// Ordered arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl PredicateDefinition {
    /// Parse shortcut notation.
    pub fn parse(text: &str) -> Self {
        let (name, args) = split_shortcut(text);
        Self { name, args }
    }
}

impl fmt::Display for PredicateDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_shortcut(f, &self.name, &self.args)
    }
}

/// A request/response filter such as `StripPrefix=1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// Filter name.
    pub name: String,
    /// Ordered arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl FilterDefinition {
    /// Parse shortcut notation.
    pub fn parse(text: &str) -> Self {
        let (name, args) = split_shortcut(text);
        Self { name, args }
    }
}

impl fmt::Display for FilterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_shortcut(f, &self.name, &self.args)
    }
}

/// A single route: predicates select requests, the uri names the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Route identifier, unique within a generation.
    pub id: String,

    /// Matching rules, combined with AND semantics.
    #[serde(default)]
    pub predicates: Vec<PredicateDefinition>,

    /// Filters applied to matched requests, in order.
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,

    /// Backend target (e.g. `http://10.0.0.5:8080` or `lb://orders`).
    pub uri: String,

    /// Route order (lower = checked first).
    #[serde(default)]
    pub order: i32,

    /// Free-form metadata carried to the request path.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RouteDefinition {
    /// Create a route with no predicates or filters.
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            predicates: Vec::new(),
            filters: Vec::new(),
            uri: uri.into(),
            order: 0,
            metadata: BTreeMap::new(),
        }
    }

    /// Append a predicate in shortcut notation.
    pub fn with_predicate(mut self, shortcut: &str) -> Self {
        self.predicates.push(PredicateDefinition::parse(shortcut));
        self
    }

    /// Append a filter in shortcut notation.
    pub fn with_filter(mut self, shortcut: &str) -> Self {
        self.filters.push(FilterDefinition::parse(shortcut));
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

fn split_shortcut(text: &str) -> (String, Vec<String>) {
    match text.split_once('=') {
        Some((name, rest)) => {
            let args = rest
                .split(',')
                .map(|arg| arg.trim().to_string())
                .filter(|arg| !arg.is_empty())
                .collect();
            (name.trim().to_string(), args)
        }
        None => (text.trim().to_string(), Vec::new()),
    }
}

fn write_shortcut(f: &mut fmt::Formatter<'_>, name: &str, args: &[String]) -> fmt::Result {
    if args.is_empty() {
        write!(f, "{}", name)
    } else {
        write!(f, "{}={}", name, args.join(","))
    }
}
