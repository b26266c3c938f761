//! The route definition store.
//!
//! # Responsibilities
//! - Hold the live working set of route definitions, keyed by config slot
//! - Hold the default filters applied to every route
//! - Apply bulk replace, clear and partial upsert/remove
//! - Hand out point-in-time snapshots
//!
//! # Design Decisions
//! - One mutex guards all state; a whole reducer verdict is applied inside a
//!   single critical section so snapshots never see half of it
//! - Slots mirror the `routes[n]` index of the upstream configuration, so
//!   two slots may temporarily carry the same id; the compiler rejects that
//! - List entries keep their upstream `[m]` index, which may have gaps after
//!   a deletion, so later events address the entry they name
//! - Every effective mutation bumps the revision

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::events::reducer::{Reduction, Verdict};
use crate::routing::definition::{FilterDefinition, RouteDefinition};
use crate::routing::error::StoreError;

/// Upstream indices of a route's `predicates[m]` and `filters[m]`, parallel
/// to the definition's lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPositions {
    pub predicates: Vec<usize>,
    pub filters: Vec<usize>,
}

impl ListPositions {
    /// Positions `0..n` for a definition that came without gaps.
    pub fn dense(def: &RouteDefinition) -> Self {
        Self {
            predicates: (0..def.predicates.len()).collect(),
            filters: (0..def.filters.len()).collect(),
        }
    }
}

/// Immutable copy of the store at one revision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    revision: u64,
    routes: BTreeMap<usize, RouteDefinition>,
    positions: BTreeMap<usize, ListPositions>,
    default_filters: BTreeMap<usize, FilterDefinition>,
    default_list: Vec<FilterDefinition>,
}

impl StoreSnapshot {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Routes in slot order.
    pub fn routes(&self) -> impl Iterator<Item = (usize, &RouteDefinition)> {
        self.routes.iter().map(|(slot, def)| (*slot, def))
    }

    pub fn route_at(&self, slot: usize) -> Option<&RouteDefinition> {
        self.routes.get(&slot)
    }

    /// Upstream list indices of the route at `slot`.
    pub fn positions_at(&self, slot: usize) -> Option<&ListPositions> {
        self.positions.get(&slot)
    }

    /// Default filters in upstream index order.
    pub fn default_filters(&self) -> &[FilterDefinition] {
        &self.default_list
    }

    /// Default filters keyed by their `default-filters[m]` index.
    pub fn indexed_default_filters(&self) -> &BTreeMap<usize, FilterDefinition> {
        &self.default_filters
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Result of applying a reduction.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Whether anything in the store changed.
    pub changed: bool,
    /// Mutations that were skipped.
    pub errors: Vec<StoreError>,
}

#[derive(Debug, Default)]
struct StoreState {
    revision: u64,
    routes: BTreeMap<usize, RouteDefinition>,
    positions: BTreeMap<usize, ListPositions>,
    default_filters: BTreeMap<usize, FilterDefinition>,
}

impl StoreState {
    fn bump(&mut self) {
        self.revision += 1;
    }

    fn clear(&mut self) -> bool {
        if self.routes.is_empty() {
            return false;
        }
        self.routes.clear();
        self.positions.clear();
        self.bump();
        true
    }

    fn upsert(&mut self, slot: usize, def: RouteDefinition, positions: ListPositions) -> bool {
        if self.routes.get(&slot) == Some(&def) && self.positions.get(&slot) == Some(&positions) {
            return false;
        }
        self.routes.insert(slot, def);
        self.positions.insert(slot, positions);
        self.bump();
        true
    }

    fn remove(&mut self, slot: usize, id: &str) -> Result<RouteDefinition, StoreError> {
        let existing = self
            .routes
            .remove(&slot)
            .ok_or_else(|| StoreError::UnknownRoute {
                slot,
                id: id.to_string(),
            })?;

        if existing.id != id {
            let actual = existing.id.clone();
            self.routes.insert(slot, existing);
            return Err(StoreError::SlotMismatch {
                slot,
                expected: id.to_string(),
                actual,
            });
        }

        self.positions.remove(&slot);
        self.bump();
        Ok(existing)
    }

    fn set_default_filters(&mut self, filters: BTreeMap<usize, FilterDefinition>) -> bool {
        if self.default_filters == filters {
            return false;
        }
        self.default_filters = filters;
        self.bump();
        true
    }
}

fn dense<T>(items: Vec<T>) -> BTreeMap<usize, T> {
    items.into_iter().enumerate().collect()
}

/// Thread-safe owner of the route working set.
#[derive(Debug, Default)]
pub struct RouteStore {
    state: Mutex<StoreState>,
}

impl RouteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // State is only mutated through StoreState methods that leave it
        // consistent, so a poisoned guard is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap the whole route set; slots and list indices are renumbered from zero.
    pub fn replace_all(&self, defs: Vec<RouteDefinition>, default_filters: Vec<FilterDefinition>) {
        let mut state = self.lock();
        state.positions = defs
            .iter()
            .enumerate()
            .map(|(slot, def)| (slot, ListPositions::dense(def)))
            .collect();
        state.routes = dense(defs);
        state.default_filters = dense(default_filters);
        state.bump();
    }

    /// Drop every route. Default filters are kept.
    pub fn clear(&self) -> bool {
        self.lock().clear()
    }

    /// Insert or replace the route at `slot`. Returns whether it changed.
    pub fn upsert(&self, slot: usize, def: RouteDefinition) -> bool {
        let positions = ListPositions::dense(&def);
        self.lock().upsert(slot, def, positions)
    }

    /// Remove the route at `slot`, which must carry `id`.
    pub fn remove(&self, slot: usize, id: &str) -> Result<RouteDefinition, StoreError> {
        self.lock().remove(slot, id)
    }

    pub fn set_default_filters(&self, filters: Vec<FilterDefinition>) -> bool {
        self.lock().set_default_filters(dense(filters))
    }

    /// Apply a reducer verdict atomically.
    ///
    /// Removals run before upserts so a slot whose id changed ends up
    /// holding the new definition. Failed removals are reported and skipped.
    pub fn apply(&self, reduction: &Reduction) -> ApplyReport {
        let mut state = self.lock();
        let mut report = ApplyReport::default();

        match &reduction.verdict {
            Verdict::FullClear => {
                report.changed |= state.clear();
            }
            Verdict::Partial { upserts, removals } => {
                for removal in removals {
                    match state.remove(removal.slot, &removal.id) {
                        Ok(_) => report.changed = true,
                        Err(e) => report.errors.push(e),
                    }
                }
                for upsert in upserts {
                    report.changed |=
                        state.upsert(upsert.slot, upsert.route.clone(), upsert.positions.clone());
                }
            }
        }

        if let Some(filters) = &reduction.default_filters {
            report.changed |= state.set_default_filters(filters.clone());
        }

        report
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        StoreSnapshot {
            revision: state.revision,
            routes: state.routes.clone(),
            positions: state.positions.clone(),
            default_filters: state.default_filters.clone(),
            default_list: state.default_filters.values().cloned().collect(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    pub fn len(&self) -> usize {
        self.lock().routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::reducer::{Removal, Upsert};

    fn route(id: &str) -> RouteDefinition {
        RouteDefinition::new(id, "http://backend").with_predicate("Path=/x")
    }

    #[test]
    fn test_replace_all_renumbers_slots() {
        let store = RouteStore::new();
        store.upsert(7, route("old"));
        store.replace_all(vec![route("a"), route("b")], vec![]);

        let snap = store.snapshot();
        let ids: Vec<_> = snap.routes().map(|(slot, r)| (slot, r.id.clone())).collect();
        assert_eq!(ids, vec![(0, "a".to_string()), (1, "b".to_string())]);
    }

    #[test]
    fn test_upsert_same_definition_keeps_revision() {
        let store = RouteStore::new();
        assert!(store.upsert(0, route("a")));
        let rev = store.revision();
        assert!(!store.upsert(0, route("a")));
        assert_eq!(store.revision(), rev);
    }

    #[test]
    fn test_remove_checks_slot_and_id() {
        let store = RouteStore::new();
        store.upsert(0, route("a"));

        assert_eq!(
            store.remove(1, "a"),
            Err(StoreError::UnknownRoute { slot: 1, id: "a".into() })
        );
        assert_eq!(
            store.remove(0, "b"),
            Err(StoreError::SlotMismatch {
                slot: 0,
                expected: "b".into(),
                actual: "a".into()
            })
        );
        assert_eq!(store.remove(0, "a").unwrap().id, "a");
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = RouteStore::new();
        store.upsert(0, route("a"));
        let snap = store.snapshot();
        store.clear();
        assert_eq!(snap.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_apply_skips_failed_removals() {
        let store = RouteStore::new();
        store.upsert(0, route("a"));

        let reduction = Reduction {
            verdict: Verdict::Partial {
                upserts: vec![Upsert {
                    slot: 1,
                    positions: ListPositions::dense(&route("b")),
                    route: route("b"),
                }],
                removals: vec![Removal { slot: 5, id: "ghost".into() }],
            },
            default_filters: None,
            ignored_keys: vec![],
        };
        let report = store.apply(&reduction);

        assert!(report.changed);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_full_clear_keeps_default_filters() {
        let store = RouteStore::new();
        store.replace_all(vec![route("a")], vec![FilterDefinition::parse("AddRequestHeader=X-A,1")]);

        let report = store.apply(&Reduction {
            verdict: Verdict::FullClear,
            default_filters: None,
            ignored_keys: vec![],
        });

        assert!(report.changed);
        let snap = store.snapshot();
        assert!(snap.is_empty());
        assert_eq!(snap.default_filters().len(), 1);
    }
}
