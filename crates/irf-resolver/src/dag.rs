//! Section dependency graph
//!
//! Edges point from a dependency to the section that depends on it, so a
//! topological order lists upstream sections first.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use irf_schema::{SectionDefinition, SectionId};
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use crate::error::ResolveError;

/// Immutable dependency DAG over the 11 sections
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraphMap<SectionId, ()>,
}

impl DependencyGraph {
    /// Build and validate the graph from section definitions
    ///
    /// # Errors
    /// [`ResolveError::DependencyCycle`] for self-dependencies and cycles
    pub fn build(sections: &[SectionDefinition]) -> Result<Self, ResolveError> {
        let mut graph = DiGraphMap::new();
        for section in sections {
            graph.add_node(section.id);
        }
        for section in sections {
            for &dep in &section.depends_on {
                if dep == section.id {
                    return Err(ResolveError::DependencyCycle {
                        sections: vec![dep],
                    });
                }
                graph.add_edge(dep, section.id, ());
            }
        }

        if is_cyclic_directed(&graph) {
            let mut cycle = tarjan_scc(&graph)
                .into_iter()
                .filter(|scc| scc.len() > 1)
                .map(|mut scc| {
                    scc.sort_unstable();
                    scc
                })
                .min()
                .unwrap_or_default();
            cycle.sort_unstable();
            return Err(ResolveError::DependencyCycle { sections: cycle });
        }

        Ok(Self { graph })
    }

    /// Topological order, ties broken by ascending section id
    #[must_use]
    pub fn topological_order(&self) -> Vec<SectionId> {
        let mut in_degree: BTreeMap<SectionId, usize> = self
            .graph
            .nodes()
            .map(|n| (n, self.graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();

        let mut ready: BinaryHeap<Reverse<SectionId>> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| Reverse(*n))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(d) = in_degree.get_mut(&next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(Reverse(next));
                    }
                }
            }
        }
        order
    }

    /// Sections that list `id` in their `depends_on`
    #[must_use]
    pub fn direct_dependents(&self, id: SectionId) -> BTreeSet<SectionId> {
        self.graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect()
    }

    /// Direct and transitive dependents of `id`
    #[must_use]
    pub fn transitive_dependents(&self, id: SectionId) -> BTreeSet<SectionId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<SectionId> = self.direct_dependents(id).into_iter().collect();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.graph.neighbors_directed(next, Direction::Outgoing));
            }
        }
        seen
    }

    /// Section to all sections downstream of it
    #[must_use]
    pub fn dependents_index(&self) -> BTreeMap<SectionId, BTreeSet<SectionId>> {
        self.graph
            .nodes()
            .map(|n| (n, self.transitive_dependents(n)))
            .collect()
    }

    /// Number of dependency edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irf_schema::base_schema;

    fn sid(n: u32) -> SectionId {
        SectionId::new(n).unwrap()
    }

    fn with_deps(edges: &[(u32, u32)]) -> Vec<SectionDefinition> {
        let mut sections = base_schema().to_vec();
        for &(section, dep) in edges {
            sections[sid(section).index()].depends_on.insert(sid(dep));
        }
        sections
    }

    #[test]
    fn base_order_is_ascending() {
        let graph = DependencyGraph::build(base_schema()).unwrap();
        let order: Vec<u8> = graph.topological_order().iter().map(|s| s.get()).collect();
        assert_eq!(order, (1..=11).collect::<Vec<u8>>());
    }

    #[test]
    fn dependencies_come_first_with_ascending_ties() {
        // 1 depends on 7, 11 depends on 7 and 10
        let graph = DependencyGraph::build(&with_deps(&[(1, 7), (11, 7), (11, 10)])).unwrap();
        let order: Vec<u8> = graph.topological_order().iter().map(|s| s.get()).collect();
        assert_eq!(order, vec![2, 3, 4, 5, 6, 7, 1, 8, 9, 10, 11]);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = DependencyGraph::build(&with_deps(&[(3, 3)])).unwrap_err();
        assert!(matches!(err, ResolveError::DependencyCycle { sections } if sections == vec![sid(3)]));
    }

    #[test]
    fn cycle_is_reported_with_members() {
        let err = DependencyGraph::build(&with_deps(&[(2, 5), (5, 9), (9, 2)])).unwrap_err();
        match err {
            ResolveError::DependencyCycle { sections } => {
                assert_eq!(sections, vec![sid(2), sid(5), sid(9)]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn transitive_dependents_follow_chains() {
        // 11 <- 10 <- 7, 9 <- 7
        let graph = DependencyGraph::build(&with_deps(&[(10, 7), (11, 10), (9, 7)])).unwrap();
        assert_eq!(graph.direct_dependents(sid(7)), [sid(9), sid(10)].into());
        assert_eq!(
            graph.transitive_dependents(sid(7)),
            [sid(9), sid(10), sid(11)].into()
        );
        assert!(graph.transitive_dependents(sid(11)).is_empty());
        assert_eq!(graph.dependents_index().len(), 11);
    }
}
