use std::collections::{
    BTreeSet,
    HashMap,
};

use log::{
    debug,
    warn,
};
use petgraph::graph::{
    NodeIndex,
    UnGraph,
};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

use crate::ms::spectrum::SpectrumId;
use crate::network::community::renumber;
use crate::network::edges::SimilarityRecord;

/// An undirected weighted graph built from similarity records.
///
/// A node exists only as the endpoint of at least one edge. Nodes are
/// indexed in ascending identifier order; each unordered pair has at most
/// one edge and there are no self loops.
#[derive(Debug, Clone, Default)]
pub struct SimilarityGraph {
    graph: UnGraph<SpectrumId, f64>,
    node_index: HashMap<SpectrumId, NodeIndex>,
}

impl SimilarityGraph {
    pub fn from_records(records: &[SimilarityRecord]) -> Self {
        let ids: BTreeSet<&SpectrumId> = records
            .iter()
            .filter(|r| r.source != r.target)
            .flat_map(|r| [&r.source, &r.target])
            .collect();

        let mut graph: UnGraph<SpectrumId, f64> =
            UnGraph::with_capacity(ids.len(), records.len());
        let mut node_index: HashMap<SpectrumId, NodeIndex> = HashMap::with_capacity(ids.len());
        for id in ids {
            node_index.insert(id.clone(), graph.add_node(id.clone()));
        }

        for record in records {
            if record.source == record.target {
                warn!("Ignoring self pair for '{}'", record.source);
                continue;
            }
            let (Some(&a), Some(&b)) = (
                node_index.get(&record.source),
                node_index.get(&record.target),
            ) else {
                continue;
            };
            match graph.find_edge(a, b) {
                Some(edge) => {
                    warn!(
                        "Duplicate pair ('{}', '{}'), keeping the last weight",
                        record.source, record.target
                    );
                    graph[edge] = record.similarity;
                },
                None => {
                    graph.add_edge(a, b, record.similarity);
                },
            }
        }

        debug!(
            "Similarity graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        SimilarityGraph { graph, node_index }
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Node identifiers in index order.
    pub fn nodes(&self) -> impl Iterator<Item = &SpectrumId> + '_ {
        self.graph.node_indices().map(move |n| &self.graph[n])
    }

    pub fn index_of(
        &self,
        id: &str,
    ) -> Option<usize> {
        self.node_index.get(id).map(|n| n.index())
    }

    pub fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.node_index.contains_key(id)
    }

    /// `(neighbor, weight)` for every edge at `index`.
    pub fn neighbors(
        &self,
        index: usize,
    ) -> impl Iterator<Item = (usize, f64)> + '_ {
        let node = NodeIndex::new(index);
        self.graph.edges(node).map(move |e| {
            let other = if e.source() == node {
                e.target()
            } else {
                e.source()
            };
            (other.index(), *e.weight())
        })
    }

    /// Edges as `(a, b, weight)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.graph.edge_references().map(|e| {
            let (a, b) = (e.source().index(), e.target().index());
            (a.min(b), a.max(b), *e.weight())
        })
    }

    pub fn edge_weight(
        &self,
        a: &str,
        b: &str,
    ) -> Option<f64> {
        let ia = *self.node_index.get(a)?;
        let ib = *self.node_index.get(b)?;
        self.graph.find_edge(ia, ib).map(|e| self.graph[e])
    }

    pub fn weighted_degree(
        &self,
        index: usize,
    ) -> f64 {
        self.graph
            .edges(NodeIndex::new(index))
            .map(|e| *e.weight())
            .sum()
    }

    pub fn total_weight(&self) -> f64 {
        self.graph.edge_references().map(|e| *e.weight()).sum()
    }

    /// Component id per node index, numbered in order of the lowest node.
    pub fn connected_components(&self) -> Vec<usize> {
        let mut sets: UnionFind<usize> = UnionFind::new(self.graph.node_count());
        for e in self.graph.edge_references() {
            sets.union(e.source().index(), e.target().index());
        }
        renumber(&sets.into_labeling())
    }
}

#[cfg(test)]
mod test_graph {
    use super::*;

    fn rec(
        a: &str,
        b: &str,
        w: f64,
    ) -> SimilarityRecord {
        SimilarityRecord {
            source: a.into(),
            target: b.into(),
            similarity: w,
        }
    }

    #[test]
    fn test_nodes_come_from_edges_only() {
        let graph = SimilarityGraph::from_records(&[rec("b", "c", 0.9), rec("a", "b", 0.7)]);
        let nodes: Vec<String> = graph.nodes().cloned().collect();
        assert_eq!(nodes, vec!["a".to_string(), "b".into(), "c".into()]);
        assert_eq!(graph.num_edges(), 2);
        assert_eq!(graph.edge_weight("c", "b"), Some(0.9));
        assert_eq!(graph.edge_weight("a", "c"), None);
        assert!((graph.weighted_degree(graph.index_of("b").unwrap()) - 1.6).abs() < 1e-12);
        assert!((graph.total_weight() - 1.6).abs() < 1e-12);

        let empty = SimilarityGraph::from_records(&[]);
        assert!(empty.is_empty());
        assert_eq!(empty.num_edges(), 0);
    }

    #[test]
    fn test_no_multi_edges_or_loops() {
        let graph = SimilarityGraph::from_records(&[
            rec("a", "b", 0.6),
            rec("b", "a", 0.8),
            rec("c", "c", 1.0),
        ]);
        assert_eq!(graph.num_nodes(), 2);
        assert_eq!(graph.num_edges(), 1);
        assert_eq!(graph.edge_weight("a", "b"), Some(0.8));
        assert!(!graph.contains("c"));
    }

    #[test]
    fn test_components() {
        let graph = SimilarityGraph::from_records(&[
            rec("a", "b", 0.6),
            rec("c", "d", 0.6),
            rec("d", "e", 0.6),
        ]);
        let comps = graph.connected_components();
        assert_eq!(comps, vec![0, 0, 1, 1, 1]);
        assert_eq!(
            petgraph::algo::connected_components(&graph.graph),
            2
        );

        let mut neighbors: Vec<(usize, f64)> = graph.neighbors(3).collect();
        neighbors.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(neighbors, vec![(2, 0.6), (4, 0.6)]);
        assert!(graph.edges().all(|(a, b, _)| a < b));
    }
}
