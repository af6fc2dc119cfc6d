use std::collections::{BTreeSet, VecDeque};

use hashbrown::{HashMap, HashSet};

use super::lifetime::Lifetime;
use crate::middle::ty::Type;

/// Directed "must outlive" obligations between lifetimes
///
/// An edge `stored -> container` means the data of `stored` is held at or
/// behind `container`, so `stored` has to outlive `container`. The graph only
/// ever grows and never rejects an edge. Callers decide what is safe by
/// querying it.
#[derive(Debug, Default)]
pub struct LifetimeGraph {
    /// container -> lifetimes stored directly in it
    precursors: HashMap<Lifetime, HashSet<Lifetime>>,
    /// Type being stored along each edge, when known
    stored_types: HashMap<(Lifetime, Lifetime), Type>,
    edge_count: usize,
}

impl LifetimeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `stored` must outlive `container`. Adding an edge that
    /// already exists is a no-op. Self edges and edges touching the `none`
    /// lifetime carry no information and are dropped.
    pub fn add_stored(&mut self, stored: &Lifetime, container: &Lifetime, ty: Option<&Type>) {
        if stored == container || stored.is_none() || container.is_none() {
            return;
        }

        let inserted = self
            .precursors
            .entry(container.clone())
            .or_default()
            .insert(stored.clone());

        if inserted {
            tracing::trace!(%stored, %container, "stored edge");
            self.edge_count += 1;
        }

        if let Some(ty) = ty {
            self.stored_types
                .entry((stored.clone(), container.clone()))
                .or_insert_with(|| ty.clone());
        }
    }

    /// Makes two lifetimes interchangeable: each must outlive the other
    pub fn add_alias(&mut self, a: &Lifetime, b: &Lifetime) {
        self.add_stored(a, b, None);
        self.add_stored(b, a, None);
    }

    fn direct_precursors(&self, lifetime: &Lifetime) -> impl Iterator<Item = &Lifetime> {
        self.precursors.get(lifetime).into_iter().flatten()
    }

    fn has_edge(&self, stored: &Lifetime, container: &Lifetime) -> bool {
        self.precursors
            .get(container)
            .is_some_and(|stored_set| stored_set.contains(stored))
    }

    /// Every lifetime that must outlive `lifetime`, transitively. Never
    /// contains `lifetime` itself, even when it sits on a cycle.
    pub fn precursors(&self, lifetime: &Lifetime) -> HashSet<Lifetime> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([lifetime]);

        while let Some(next) = queue.pop_front() {
            for precursor in self.direct_precursors(next) {
                if visited.insert(precursor.clone()) {
                    queue.push_back(precursor);
                }
            }
        }

        visited.remove(lifetime);
        visited
    }

    pub fn does_outlive(&self, a: &Lifetime, b: &Lifetime) -> bool {
        a.is_heap() || self.precursors(b).contains(a)
    }

    /// Lifetimes joined to `lifetime` by chains of mutual (alias) edges,
    /// excluding `lifetime` itself
    pub fn equivalents(&self, lifetime: &Lifetime) -> HashSet<Lifetime> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([lifetime]);

        while let Some(next) = queue.pop_front() {
            for partner in self.direct_precursors(next) {
                if self.has_edge(next, partner) && visited.insert(partner.clone()) {
                    queue.push_back(partner);
                }
            }
        }

        visited.remove(lifetime);
        visited
    }

    /// The non-heap roots that the data of `lifetime` depends on, including
    /// `lifetime` itself when it is such a root. A value may only leave its
    /// function or be written to the heap when this is empty.
    pub fn root_dependencies(&self, lifetime: &Lifetime) -> BTreeSet<Lifetime> {
        std::iter::once(lifetime.clone())
            .chain(self.precursors(lifetime))
            .filter(|lt| lt.is_root() && !lt.is_heap() && !lt.is_none())
            .collect()
    }

    pub fn stored_type(&self, stored: &Lifetime, container: &Lifetime) -> Option<&Type> {
        self.stored_types.get(&(stored.clone(), container.clone()))
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::middle::{
        flow::lifetime::{LifetimeOrigin, LifetimeRole},
        path::IdentifierPath,
        ty::TypeContext,
    };

    fn lt(path: &str, role: LifetimeRole, origin: LifetimeOrigin) -> Lifetime {
        Lifetime::new(IdentifierPath::from(path), role, origin)
    }

    fn value(path: &str) -> Lifetime {
        lt(path, LifetimeRole::Alias, LifetimeOrigin::LocalValue)
    }

    #[test]
    fn precursors_are_transitive() {
        let mut graph = LifetimeGraph::new();
        let (a, b, c) = (value("a"), value("b"), value("c"));

        graph.add_stored(&a, &b, None);
        graph.add_stored(&b, &c, None);

        assert_eq!(graph.precursors(&c), HashSet::from([a.clone(), b.clone()]));
        assert_eq!(graph.precursors(&b), HashSet::from([a.clone()]));
        assert!(graph.precursors(&a).is_empty());
        assert!(graph.does_outlive(&a, &c));
        assert!(!graph.does_outlive(&c, &a));
    }

    #[test]
    fn duplicate_edges_are_idempotent() {
        let mut tcx = TypeContext::new();
        let int = tcx.int();
        let mut graph = LifetimeGraph::new();
        let (a, b) = (value("a"), value("b"));

        graph.add_stored(&a, &b, Some(&int));
        let before = graph.precursors(&b);
        graph.add_stored(&a, &b, None);

        assert_eq!(graph.precursors(&b), before);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.stored_type(&a, &b), Some(&int));
    }

    #[test]
    fn cycles_exclude_self() {
        let mut graph = LifetimeGraph::new();
        let (a, b) = (value("a"), value("b"));

        graph.add_alias(&a, &b);

        assert_eq!(graph.precursors(&a), HashSet::from([b.clone()]));
        assert!(!graph.does_outlive(&a, &a));
        assert_eq!(graph.equivalents(&a), HashSet::from([b]));
    }

    #[test]
    fn heap_outlives_everything() {
        let graph = LifetimeGraph::new();
        let a = value("a");

        assert!(graph.does_outlive(&Lifetime::heap(), &a));
        assert!(graph.does_outlive(&Lifetime::heap(), &Lifetime::heap()));
    }

    #[test]
    fn equivalence_requires_mutual_edges() {
        let mut graph = LifetimeGraph::new();
        let (a, b, c, d) = (value("a"), value("b"), value("c"), value("d"));

        graph.add_alias(&a, &b);
        graph.add_alias(&b, &c);
        graph.add_stored(&d, &a, None);

        assert_eq!(graph.equivalents(&a), HashSet::from([b, c]));
    }

    #[test]
    fn root_dependencies_skip_heap_and_aliases() {
        let mut graph = LifetimeGraph::new();
        let param = lt("f::p", LifetimeRole::Root, LifetimeOrigin::LocalValue);
        let region = lt("f::$new_0", LifetimeRole::Root, LifetimeOrigin::Heap);
        let alias = value("f::x");

        graph.add_stored(&param, &alias, None);
        graph.add_stored(&region, &alias, None);

        assert_eq!(
            graph.root_dependencies(&alias),
            BTreeSet::from([param.clone()])
        );
        assert_eq!(graph.root_dependencies(&param), BTreeSet::from([param]));
        assert!(graph.root_dependencies(&region).is_empty());
    }
}
