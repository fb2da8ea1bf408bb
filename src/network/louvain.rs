use std::collections::BTreeMap;

use log::{
    debug,
    trace,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    Result,
    SpecMeshError,
};
use crate::network::community::{
    renumber,
    CommunityDetector,
    Partition,
};
use crate::network::graph::SimilarityGraph;

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct LouvainConfig {
    /// Seeds the node visiting order.
    pub seed: u64,
    pub resolution: f64,
    /// A pass, or a level after the first, that improves modularity by less
    /// than this ends the search.
    pub min_modularity_gain: f64,
    /// Upper bound on local-move passes per level.
    pub max_passes: Option<usize>,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        LouvainConfig {
            seed: 42,
            resolution: 1.,
            min_modularity_gain: 1e-7,
            max_passes: None,
        }
    }
}

impl LouvainConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.) {
            return Err(SpecMeshError::Config(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if !(self.min_modularity_gain.is_finite() && self.min_modularity_gain >= 0.) {
            return Err(SpecMeshError::Config(format!(
                "min_modularity_gain must be non-negative, got {}",
                self.min_modularity_gain
            )));
        }
        if self.max_passes == Some(0) {
            return Err(SpecMeshError::Config(
                "max_passes must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Weighted graph of one coarsening level. Self loops hold the weight
/// internal to an aggregated node and are kept out of `adjacency`.
struct LevelGraph {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    degrees: Vec<f64>,
    total_weight: f64,
}

impl LevelGraph {
    fn from_graph(graph: &SimilarityGraph) -> Self {
        let n = graph.num_nodes();
        let adjacency: Vec<Vec<(usize, f64)>> =
            (0..n).map(|i| graph.neighbors(i).collect()).collect();
        let degrees = (0..n).map(|i| graph.weighted_degree(i)).collect();
        LevelGraph {
            adjacency,
            self_loops: vec![0.; n],
            degrees,
            total_weight: graph.total_weight(),
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Collapses every community (labels are dense) into a single node.
    fn induce(
        &self,
        labels: &[usize],
        num_communities: usize,
    ) -> Self {
        let mut self_loops = vec![0.; num_communities];
        let mut degrees = vec![0.; num_communities];
        let mut links: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); num_communities];

        for node in 0..self.len() {
            let c = labels[node];
            degrees[c] += self.degrees[node];
            self_loops[c] += self.self_loops[node];
            for (neighbor, w) in &self.adjacency[node] {
                let d = labels[*neighbor];
                if c == d {
                    // Seen from both endpoints.
                    self_loops[c] += w / 2.;
                } else {
                    *links[c].entry(d).or_default() += w;
                }
            }
        }

        LevelGraph {
            adjacency: links.into_iter().map(|l| l.into_iter().collect()).collect(),
            self_loops,
            degrees,
            total_weight: self.total_weight,
        }
    }
}

struct LevelState {
    node2com: Vec<usize>,
    com_degree: Vec<f64>,
    com_internal: Vec<f64>,
}

impl LevelState {
    fn singletons(graph: &LevelGraph) -> Self {
        LevelState {
            node2com: (0..graph.len()).collect(),
            com_degree: graph.degrees.clone(),
            com_internal: graph.self_loops.clone(),
        }
    }

    fn modularity(
        &self,
        graph: &LevelGraph,
        resolution: f64,
    ) -> f64 {
        let m = graph.total_weight;
        self.com_internal
            .iter()
            .zip(self.com_degree.iter())
            .filter(|(_, d)| **d > 0.)
            .map(|(w_in, d)| w_in / m - resolution * (d / (2. * m)).powi(2))
            .sum()
    }

    /// Edge weight from `node` into each neighbouring community.
    fn neighbor_communities(
        &self,
        graph: &LevelGraph,
        node: usize,
    ) -> BTreeMap<usize, f64> {
        let mut out = BTreeMap::new();
        for (neighbor, w) in &graph.adjacency[node] {
            *out.entry(self.node2com[*neighbor]).or_default() += w;
        }
        out
    }

    fn remove(
        &mut self,
        graph: &LevelGraph,
        node: usize,
        com: usize,
        weight_to_com: f64,
    ) {
        self.com_degree[com] -= graph.degrees[node];
        self.com_internal[com] -= weight_to_com + graph.self_loops[node];
        self.node2com[node] = usize::MAX;
    }

    fn insert(
        &mut self,
        graph: &LevelGraph,
        node: usize,
        com: usize,
        weight_to_com: f64,
    ) {
        self.com_degree[com] += graph.degrees[node];
        self.com_internal[com] += weight_to_com + graph.self_loops[node];
        self.node2com[node] = com;
    }
}

/// Greedy multi-level modularity optimization.
///
/// Each level repeatedly visits the nodes in a seeded random order and
/// moves every node into the neighbouring community with the largest
/// modularity gain, if that gain beats staying put. Converged communities
/// are then collapsed into single nodes and the process repeats until a
/// level stops improving modularity.
///
/// Nodes only ever join communities they share an edge with, so a
/// community never spans two connected components.
#[derive(Debug, Default, Clone, Copy)]
pub struct Louvain {
    pub config: LouvainConfig,
}

impl Louvain {
    pub fn new(config: LouvainConfig) -> Self {
        Louvain { config }
    }

    /// Runs local moves until no node moves or a pass gains too little.
    /// Returns whether any node changed community.
    fn one_level(
        &self,
        graph: &LevelGraph,
        state: &mut LevelState,
        rng: &mut StdRng,
    ) -> bool {
        let m = graph.total_weight;
        let resolution = self.config.resolution;
        let mut order: Vec<usize> = (0..graph.len()).collect();
        let mut current = state.modularity(graph, resolution);
        let mut any_moved = false;
        let mut passes = 0;

        loop {
            order.shuffle(rng);
            let mut moved = 0;

            for &node in &order {
                let com = state.node2com[node];
                let k = graph.degrees[node];
                let neighbors = state.neighbor_communities(graph, node);
                let weight_own = neighbors.get(&com).copied().unwrap_or(0.);

                state.remove(graph, node, com, weight_own);

                let gain = |c: usize, w: f64| w - resolution * state.com_degree[c] * k / (2. * m);
                let mut best_com = com;
                let mut best_weight = weight_own;
                let mut best_gain = gain(com, weight_own);
                for (c, w) in neighbors.iter() {
                    let g = gain(*c, *w);
                    if g > best_gain {
                        best_gain = g;
                        best_com = *c;
                        best_weight = *w;
                    }
                }

                state.insert(graph, node, best_com, best_weight);
                if best_com != com {
                    moved += 1;
                }
            }

            passes += 1;
            let new_modularity = state.modularity(graph, resolution);
            trace!(
                "Louvain pass {}: {} moves, modularity {:.6}",
                passes,
                moved,
                new_modularity
            );
            any_moved |= moved > 0;

            if moved == 0 || new_modularity - current < self.config.min_modularity_gain {
                break;
            }
            current = new_modularity;
            if self.config.max_passes.is_some_and(|max| passes >= max) {
                break;
            }
        }
        any_moved
    }
}

impl CommunityDetector for Louvain {
    fn name(&self) -> &str {
        "louvain"
    }

    fn detect(
        &self,
        graph: &SimilarityGraph,
    ) -> Partition {
        let n = graph.num_nodes();
        if graph.total_weight() <= 0. {
            return Partition::from_node_labels(graph, &(0..n).collect::<Vec<_>>());
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let resolution = self.config.resolution;

        // Original node -> node of the current level.
        let mut membership: Vec<usize> = (0..n).collect();
        let mut level = LevelGraph::from_graph(graph);
        let mut best_modularity = f64::NEG_INFINITY;
        let mut num_levels = 0;

        loop {
            let mut state = LevelState::singletons(&level);
            let moved = self.one_level(&level, &mut state, &mut rng);
            let new_modularity = state.modularity(&level, resolution);
            // The first level is always kept.
            if num_levels > 0
                && (!moved || new_modularity - best_modularity < self.config.min_modularity_gain)
            {
                break;
            }

            let labels = renumber(&state.node2com);
            let num_communities = labels.iter().max().map_or(0, |m| m + 1);
            membership.iter_mut().for_each(|x| *x = labels[*x]);
            level = level.induce(&labels, num_communities);
            best_modularity = new_modularity;
            num_levels += 1;
            debug!(
                "Louvain level {}: {} communities, modularity {:.6}",
                num_levels, num_communities, new_modularity
            );
            if !moved {
                break;
            }
        }

        Partition::from_node_labels(graph, &membership)
    }
}

#[cfg(test)]
mod test_louvain {
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

    fn two_triangles() -> SimilarityGraph {
        graph(&[
            ("a", "b", 1.),
            ("a", "c", 1.),
            ("b", "c", 1.),
            ("d", "e", 1.),
            ("d", "f", 1.),
            ("e", "f", 1.),
            ("c", "d", 0.1),
        ])
    }

    #[test]
    fn test_two_triangles() {
        let g = two_triangles();
        let p = Louvain::default().detect(&g);

        assert_eq!(p.len(), 6);
        assert_eq!(p.num_communities(), 2);
        assert_eq!(p.get("a"), p.get("b"));
        assert_eq!(p.get("a"), p.get("c"));
        assert_eq!(p.get("d"), p.get("e"));
        assert_eq!(p.get("d"), p.get("f"));
        assert_ne!(p.get("a"), p.get("d"));

        let singletons = Partition::from_node_labels(&g, &(0..6).collect::<Vec<_>>());
        assert!(p.modularity(&g, 1.) > singletons.modularity(&g, 1.));
    }

    #[test]
    fn test_components_never_share_a_label() {
        let g = graph(&[
            ("a", "b", 0.9),
            ("b", "c", 0.8),
            ("x", "y", 0.7),
            ("p", "q", 0.6),
            ("q", "r", 0.6),
            ("r", "p", 0.6),
        ]);
        let p = Louvain::default().detect(&g);
        let components = g.connected_components();
        for (i, a) in g.nodes().enumerate() {
            for (j, b) in g.nodes().enumerate() {
                if components[i] != components[j] {
                    assert_ne!(p.get(a), p.get(b), "{} and {}", a, b);
                }
            }
        }
        assert!(p.num_communities() <= g.num_nodes());
    }

    #[test]
    fn test_single_edge_merges() {
        let g = graph(&[("a", "b", 1.)]);
        let p = Louvain::default().detect(&g);
        assert_eq!(p.num_communities(), 1);
    }

    #[test]
    fn test_first_level_is_always_kept() {
        let strict = Louvain::new(LouvainConfig {
            min_modularity_gain: 1.,
            ..Default::default()
        });
        let p = strict.detect(&graph(&[("a", "b", 1.)]));
        assert_eq!(p.num_communities(), 1);

        let g = two_triangles();
        let p = strict.detect(&g);
        assert_eq!(p.len(), 6);
        assert!(p.num_communities() < 6);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let g = graph(&[
            ("a", "b", 0.9),
            ("b", "c", 0.8),
            ("c", "a", 0.7),
            ("c", "d", 0.6),
            ("d", "e", 0.9),
            ("e", "f", 0.9),
            ("f", "d", 0.6),
            ("f", "g", 0.55),
            ("g", "h", 0.95),
        ]);
        let louvain = Louvain::new(LouvainConfig {
            seed: 7,
            ..Default::default()
        });
        assert_eq!(louvain.detect(&g), louvain.detect(&g));
    }

    #[test]
    fn test_empty_graph() {
        let p = Louvain::default().detect(&SimilarityGraph::default());
        assert!(p.is_empty());
        assert_eq!(p.num_communities(), 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(LouvainConfig::default().validate().is_ok());
        let bad = LouvainConfig {
            resolution: 0.,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
