use std::collections::HashSet;

use petgraph::graphmap::{NodeTrait, UnGraphMap};
use petgraph::visit::Dfs;

/// Connected components of an undirected graph.
///
/// Each component is sorted, and components are returned in the order their
/// first node was inserted into the graph.
pub fn connected_components<N: NodeTrait, E>(graph: &UnGraphMap<N, E>) -> Vec<Vec<N>> {
    let mut seen: HashSet<N> = HashSet::new();
    let mut components = Vec::new();

    for start in graph.nodes() {
        if seen.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut dfs = Dfs::new(graph, start);
        while let Some(node) = dfs.next(graph) {
            seen.insert(node);
            component.push(node);
        }
        component.sort();
        components.push(component);
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_disjoint_parts() {
        let mut graph: UnGraphMap<u32, ()> = UnGraphMap::new();
        graph.add_edge(3, 1, ());
        graph.add_edge(1, 2, ());
        graph.add_edge(7, 8, ());
        graph.add_node(5);

        let components = connected_components(&graph);
        assert_eq!(components, vec![vec![1, 2, 3], vec![7, 8], vec![5]]);
    }

    #[test]
    fn self_loops_stay_single() {
        let mut graph: UnGraphMap<u32, ()> = UnGraphMap::new();
        graph.add_edge(4, 4, ());
        assert_eq!(connected_components(&graph), vec![vec![4]]);
    }
}
