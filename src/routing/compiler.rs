//! Route table compilation.
//!
//! # Responsibilities
//! - Validate a store snapshot (ids, predicates, targets, filters)
//! - Compile predicates into matchers
//! - Order routes and build the path index
//!
//! # Design Decisions
//! - Pure function: snapshot in, generation or errors out
//! - Collects every validation error instead of stopping at the first
//! - Default filters are prepended to each route's own filters

use std::collections::HashMap;

use url::Url;

use crate::routing::definition::{FilterDefinition, RouteDefinition};
use crate::routing::error::{CompileError, ValidationError};
use crate::routing::generation::{CompiledRoute, RouteTableGeneration};
use crate::routing::matcher::{compile_predicate, AndMatcher, Matcher};
use crate::routing::store::StoreSnapshot;

/// Compile `snapshot` into generation `number`.
pub fn compile(snapshot: &StoreSnapshot, number: u64) -> Result<RouteTableGeneration, CompileError> {
    let mut errors = Vec::new();

    errors.extend(duplicate_ids(snapshot));
    errors.extend(check_filters(snapshot.default_filters(), "default filters"));

    let mut compiled = Vec::with_capacity(snapshot.len());
    for (slot, def) in snapshot.routes() {
        match compile_route(slot, def, snapshot.default_filters()) {
            Ok(route) => compiled.push(route),
            Err(route_errors) => errors.extend(route_errors),
        }
    }

    if !errors.is_empty() {
        return Err(CompileError::Invalid(errors));
    }

    compiled.sort_by_key(|(route, _)| (route.definition.order, route.slot));

    let mut path_index: HashMap<String, Vec<usize>> = HashMap::new();
    let mut wildcard = Vec::new();
    let mut routes = Vec::with_capacity(compiled.len());

    for (position, (route, index_keys)) in compiled.into_iter().enumerate() {
        match index_keys {
            Some(mut keys) => {
                keys.sort();
                keys.dedup();
                for key in keys {
                    path_index.entry(key).or_default().push(position);
                }
            }
            None => wildcard.push(position),
        }
        routes.push(route);
    }

    Ok(RouteTableGeneration::from_parts(
        number,
        snapshot.revision(),
        routes,
        path_index,
        wildcard,
    ))
}

fn duplicate_ids(snapshot: &StoreSnapshot) -> Vec<ValidationError> {
    let mut slots_by_id: HashMap<&str, Vec<usize>> = HashMap::new();
    for (slot, def) in snapshot.routes() {
        slots_by_id.entry(def.id.as_str()).or_default().push(slot);
    }

    let mut duplicates: Vec<ValidationError> = slots_by_id
        .into_iter()
        .filter(|(_, slots)| slots.len() > 1)
        .map(|(id, slots)| ValidationError::DuplicateId {
            id: id.to_string(),
            slots,
        })
        .collect();
    duplicates.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    duplicates
}

fn check_filters(filters: &[FilterDefinition], owner: &str) -> Vec<ValidationError> {
    filters
        .iter()
        .enumerate()
        .filter(|(_, f)| f.name.trim().is_empty())
        .map(|(position, _)| ValidationError::MalformedFilter {
            owner: owner.to_string(),
            position,
        })
        .collect()
}

fn check_uri(slot: usize, def: &RouteDefinition) -> Option<ValidationError> {
    let reason = match Url::parse(&def.uri) {
        Ok(url) if url.cannot_be_a_base() => "target must be hierarchical".to_string(),
        Ok(_) => return None,
        Err(e) => e.to_string(),
    };
    Some(ValidationError::InvalidUri {
        route_id: def.id.clone(),
        slot,
        uri: def.uri.clone(),
        reason,
    })
}

type IndexedRoute = (CompiledRoute, Option<Vec<String>>);

fn compile_route(
    slot: usize,
    def: &RouteDefinition,
    default_filters: &[FilterDefinition],
) -> Result<IndexedRoute, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if def.predicates.is_empty() {
        errors.push(ValidationError::MissingPredicates {
            route_id: def.id.clone(),
            slot,
        });
    }
    errors.extend(check_uri(slot, def));
    errors.extend(check_filters(&def.filters, &format!("route `{}`", def.id)));

    let mut matchers: Vec<Box<dyn Matcher>> = Vec::with_capacity(def.predicates.len());
    let mut index_keys = None;

    for (position, predicate) in def.predicates.iter().enumerate() {
        match compile_predicate(predicate) {
            Ok(compiled) => {
                // AND semantics: one indexable Path predicate is enough.
                if index_keys.is_none() {
                    index_keys = compiled.index_keys;
                }
                matchers.push(compiled.matcher);
            }
            Err(reason) => errors.push(ValidationError::MalformedPredicate {
                route_id: def.id.clone(),
                slot,
                position,
                predicate: predicate.to_string(),
                reason,
            }),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut definition = def.clone();
    definition.filters = default_filters
        .iter()
        .chain(def.filters.iter())
        .cloned()
        .collect();

    Ok((
        CompiledRoute {
            slot,
            definition,
            matcher: AndMatcher::new(matchers),
        },
        index_keys,
    ))
}
