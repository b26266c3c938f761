//! Compiled, immutable route table generations.
//!
//! # Responsibilities
//! - Store compiled routes in priority order
//! - Look up the route for a request, or report no match
//! - Expose route definitions by id for the admin surface
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc, no locks)
//! - Path index: routes whose `Path` predicate has a literal first segment
//!   are bucketed by it; the rest sit in a wildcard bucket. A lookup walks
//!   the request's bucket and the wildcard bucket merged in priority order
//! - First match wins; priority is `(order, slot)`

use std::collections::HashMap;
use std::time::SystemTime;

use axum::http::Request;

use crate::routing::definition::RouteDefinition;
use crate::routing::matcher::{AndMatcher, Matcher, RequestView};

/// A route as served: definition with effective filters, plus its matcher.
#[derive(Debug)]
pub struct CompiledRoute {
    pub(crate) slot: usize,
    pub(crate) definition: RouteDefinition,
    pub(crate) matcher: AndMatcher,
}

impl CompiledRoute {
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Definition with default filters prepended to the route's own.
    pub fn definition(&self) -> &RouteDefinition {
        &self.definition
    }
}

/// One published snapshot of the route table.
#[derive(Debug)]
pub struct RouteTableGeneration {
    number: u64,
    revision: u64,
    created_at: SystemTime,
    /// Priority order.
    routes: Vec<CompiledRoute>,
    by_id: HashMap<String, usize>,
    path_index: HashMap<String, Vec<usize>>,
    wildcard: Vec<usize>,
}

impl RouteTableGeneration {
    /// The generation served before any configuration arrives.
    pub fn empty() -> Self {
        Self::from_parts(0, 0, Vec::new(), HashMap::new(), Vec::new())
    }

    pub(crate) fn from_parts(
        number: u64,
        revision: u64,
        routes: Vec<CompiledRoute>,
        path_index: HashMap<String, Vec<usize>>,
        wildcard: Vec<usize>,
    ) -> Self {
        let by_id = routes
            .iter()
            .enumerate()
            .map(|(i, r)| (r.definition.id.clone(), i))
            .collect();
        Self {
            number,
            revision,
            created_at: SystemTime::now(),
            routes,
            by_id,
            path_index,
            wildcard,
        }
    }

    /// Monotonic generation number (0 = initial empty table).
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Store revision this generation was compiled from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&RouteDefinition> {
        self.by_id.get(id).map(|i| &self.routes[*i].definition)
    }

    /// Route definitions in priority order.
    pub fn routes(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.routes.iter().map(|r| &r.definition)
    }

    /// Find the route for a request.
    pub fn match_request<B>(&self, req: &Request<B>) -> Option<&RouteDefinition> {
        self.match_view(&RequestView::new(req))
    }

    pub fn match_view(&self, view: &RequestView<'_>) -> Option<&RouteDefinition> {
        let bucket = self
            .path_index
            .get(view.first_segment())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let (mut i, mut j) = (0, 0);
        while i < bucket.len() || j < self.wildcard.len() {
            // Both buckets are sorted; take the lower position first.
            let next = match (bucket.get(i), self.wildcard.get(j)) {
                (Some(a), Some(b)) if a < b => {
                    i += 1;
                    *a
                }
                (Some(a), None) => {
                    i += 1;
                    *a
                }
                (_, Some(b)) => {
                    j += 1;
                    *b
                }
                (None, None) => break,
            };

            let route = &self.routes[next];
            if route.matcher.matches(view) {
                return Some(&route.definition);
            }
        }
        None
    }
}
