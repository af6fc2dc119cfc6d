use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::middle::path::IdentifierPath;

/// Dependencies between variables: which variables' data a variable may hold
/// on to (captures) and, inversely, which variables may hold on to a given
/// variable's data (dependents)
#[derive(Debug, Default)]
pub struct VariableGraph {
    dependents: HashMap<IdentifierPath, BTreeSet<IdentifierPath>>,
    captures: HashMap<IdentifierPath, BTreeSet<IdentifierPath>>,
}

impl VariableGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `variable` now holds data depending on `escapee`
    pub fn add_dependency(&mut self, escapee: &IdentifierPath, variable: &IdentifierPath) {
        if escapee == variable {
            return;
        }

        self.dependents
            .entry(escapee.clone())
            .or_default()
            .insert(variable.clone());

        self.captures
            .entry(variable.clone())
            .or_default()
            .insert(escapee.clone());
    }

    /// Variables that transitively depend on `variable`
    pub fn dependents_of(&self, variable: &IdentifierPath) -> BTreeSet<IdentifierPath> {
        Self::closure(&self.dependents, variable)
    }

    /// Variables whose data `variable` transitively holds on to
    pub fn captures_of(&self, variable: &IdentifierPath) -> BTreeSet<IdentifierPath> {
        Self::closure(&self.captures, variable)
    }

    fn closure(
        edges: &HashMap<IdentifierPath, BTreeSet<IdentifierPath>>,
        start: &IdentifierPath,
    ) -> BTreeSet<IdentifierPath> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![start];

        while let Some(next) = stack.pop() {
            for neighbor in edges.get(next).into_iter().flatten() {
                if visited.insert(neighbor.clone()) {
                    stack.push(neighbor);
                }
            }
        }

        visited.remove(start);
        visited
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn dependencies_are_transitive_both_ways() {
        let mut graph = VariableGraph::new();
        let (x, p, q) = (
            IdentifierPath::from("f::x"),
            IdentifierPath::from("f::p"),
            IdentifierPath::from("f::q"),
        );

        graph.add_dependency(&x, &p);
        graph.add_dependency(&p, &q);

        assert_eq!(graph.captures_of(&q), BTreeSet::from([x.clone(), p.clone()]));
        assert_eq!(graph.dependents_of(&x), BTreeSet::from([p.clone(), q.clone()]));
        assert!(graph.captures_of(&x).is_empty());
    }
}
