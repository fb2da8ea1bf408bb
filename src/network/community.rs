use std::collections::{
    BTreeMap,
    HashMap,
};

use log::warn;
use serde::{
    Deserialize,
    Serialize,
};

use crate::ms::spectrum::SpectrumId;
use crate::network::graph::SimilarityGraph;

pub type CommunityLabel = usize;

/// Community label per graph node.
///
/// Labels are dense (`0..num_communities`) and numbered in order of first
/// appearance when walking the nodes in ascending identifier order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partition {
    labels: BTreeMap<SpectrumId, CommunityLabel>,
}

impl Partition {
    /// `labels[i]` is the (arbitrary) community of node `i`.
    ///
    /// Nodes past the end of `labels` become singletons and extra labels
    /// are ignored, so every node of `graph` ends up labelled.
    pub fn from_node_labels(
        graph: &SimilarityGraph,
        labels: &[usize],
    ) -> Self {
        let n = graph.num_nodes();
        let mut labels = labels.to_vec();
        if labels.len() != n {
            warn!(
                "Got {} community labels for {} nodes, unlabelled nodes become singletons",
                labels.len(),
                n
            );
            labels.truncate(n);
            let mut next = labels.iter().max().map_or(0, |m| m + 1);
            while labels.len() < n {
                labels.push(next);
                next += 1;
            }
        }
        let dense = renumber(&labels);
        let labels = graph.nodes().cloned().zip(dense).collect();
        Partition { labels }
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Option<CommunityLabel> {
        self.labels.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SpectrumId, &CommunityLabel)> {
        self.labels.iter()
    }

    pub fn num_communities(&self) -> usize {
        self.labels.values().max().map_or(0, |m| m + 1)
    }

    pub fn communities(&self) -> BTreeMap<CommunityLabel, Vec<SpectrumId>> {
        let mut out: BTreeMap<CommunityLabel, Vec<SpectrumId>> = BTreeMap::new();
        for (id, label) in self.labels.iter() {
            out.entry(*label).or_default().push(id.clone());
        }
        out
    }

    /// Weighted modularity of this partition on `graph`.
    ///
    /// `sum_c [ w_in(c) / m - resolution * (deg(c) / 2m)^2 ]`, `m` being the
    /// total edge weight. Nodes of `graph` missing from the partition are
    /// treated as singletons; an edgeless graph has modularity 0.
    pub fn modularity(
        &self,
        graph: &SimilarityGraph,
        resolution: f64,
    ) -> f64 {
        let mut next = self.num_communities();
        let labels: Vec<usize> = graph
            .nodes()
            .map(|id| {
                self.get(id).unwrap_or_else(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        modularity(graph, &labels, resolution)
    }
}

pub(crate) fn renumber(labels: &[usize]) -> Vec<usize> {
    let mut seen: HashMap<usize, usize> = HashMap::new();
    labels
        .iter()
        .map(|l| {
            let next = seen.len();
            *seen.entry(*l).or_insert(next)
        })
        .collect()
}

pub(crate) fn modularity(
    graph: &SimilarityGraph,
    labels: &[usize],
    resolution: f64,
) -> f64 {
    let m = graph.total_weight();
    if m <= 0. {
        return 0.;
    }
    let mut internal: HashMap<usize, f64> = HashMap::new();
    let mut degree: HashMap<usize, f64> = HashMap::new();
    for (a, b, w) in graph.edges() {
        *degree.entry(labels[a]).or_default() += w;
        *degree.entry(labels[b]).or_default() += w;
        if labels[a] == labels[b] {
            *internal.entry(labels[a]).or_default() += w;
        }
    }
    degree
        .iter()
        .map(|(c, d)| {
            let w_in = internal.get(c).copied().unwrap_or(0.);
            w_in / m - resolution * (d / (2. * m)).powi(2)
        })
        .sum()
}

/// Graph in, partition out.
pub trait CommunityDetector: Send + Sync {
    fn name(&self) -> &str;
    fn detect(
        &self,
        graph: &SimilarityGraph,
    ) -> Partition;
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommunityMethod {
    #[default]
    Louvain,
    ConnectedComponents,
}

/// One community per connected component.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComponentDetector;

impl CommunityDetector for ComponentDetector {
    fn name(&self) -> &str {
        "connected_components"
    }

    fn detect(
        &self,
        graph: &SimilarityGraph,
    ) -> Partition {
        Partition::from_node_labels(graph, &graph.connected_components())
    }
}

#[cfg(test)]
mod test_partition {
    use super::*;
    use crate::network::edges::SimilarityRecord;

    fn graph(edges: &[(&str, &str, f64)]) -> SimilarityGraph {
        let records: Vec<SimilarityRecord> = edges
            .iter()
            .map(|(a, b, w)| SimilarityRecord {
                source: a.to_string(),
                target: b.to_string(),
                similarity: *w,
            })
            .collect();
        SimilarityGraph::from_records(&records)
    }

    fn assert_close(
        a: f64,
        b: f64,
    ) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_renumber_is_dense() {
        assert_eq!(renumber(&[7, 7, 3, 9, 3]), vec![0, 0, 1, 2, 1]);
        assert!(renumber(&[]).is_empty());
    }

    #[test]
    fn test_modularity_values() {
        let g = graph(&[("a", "b", 1.)]);
        // Both together: 1 - (2/2)^2
        assert_close(modularity(&g, &[0, 0], 1.), 0.);
        // Apart: 2 * (0 - (1/2)^2)
        assert_close(modularity(&g, &[0, 1], 1.), -0.5);

        let two_pairs = graph(&[("a", "b", 1.), ("c", "d", 1.)]);
        assert_close(modularity(&two_pairs, &[0, 0, 1, 1], 1.), 0.5);

        let empty = graph(&[]);
        assert_eq!(modularity(&empty, &[], 1.), 0.);
    }

    #[test]
    fn test_partition_accessors() {
        let g = graph(&[("a", "b", 1.), ("c", "d", 1.)]);
        let p = Partition::from_node_labels(&g, &[5, 5, 2, 2]);
        assert_eq!(p.len(), 4);
        assert_eq!(p.num_communities(), 2);
        assert_eq!(p.get("a"), Some(0));
        assert_eq!(p.get("d"), Some(1));
        assert_eq!(p.get("z"), None);
        assert_close(p.modularity(&g, 1.), 0.5);

        let communities = p.communities();
        assert_eq!(communities[&1], vec!["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn test_label_count_mismatch_is_recovered() {
        let empty = graph(&[]);
        assert!(Partition::from_node_labels(&empty, &[0]).is_empty());

        let g = graph(&[("a", "b", 1.), ("b", "c", 1.)]);
        let short = Partition::from_node_labels(&g, &[4]);
        assert_eq!(short.len(), 3);
        assert_eq!(short.num_communities(), 3);

        let long = Partition::from_node_labels(&g, &[1, 1, 1, 0]);
        assert_eq!(long.len(), 3);
        assert_eq!(long.num_communities(), 1);
    }

    #[test]
    fn test_component_detector() {
        let g = graph(&[("a", "b", 1.), ("b", "c", 1.), ("x", "y", 1.)]);
        let p = ComponentDetector.detect(&g);
        assert_eq!(p.num_communities(), 2);
        assert_eq!(p.get("a"), p.get("c"));
        assert_ne!(p.get("a"), p.get("x"));
    }
}
