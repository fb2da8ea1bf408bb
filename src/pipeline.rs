use std::collections::{
    BTreeMap,
    BTreeSet,
};

use log::info;
use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::Result;
use crate::ms::library::SpectralLibrary;
use crate::ms::spectrum::{
    CleaningConfig,
    RawSpectrum,
    SpectrumId,
    SpectrumSet,
};
use crate::network::community::{
    CommunityDetector,
    CommunityLabel,
    CommunityMethod,
    ComponentDetector,
    Partition,
};
use crate::network::edges::{
    build_edges,
    SimilarityRecord,
};
use crate::network::graph::SimilarityGraph;
use crate::network::louvain::{
    Louvain,
    LouvainConfig,
};
use crate::network::screening::screen_candidates;
use crate::network::NetworkConfig;
use crate::scoring::entropy::EntropyConfig;
use crate::utils;

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PipelineConfig {
    pub community_method: CommunityMethod,
    pub cleaning_config: CleaningConfig,
    pub entropy_config: EntropyConfig,
    pub network_config: NetworkConfig,
    pub louvain_config: LouvainConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.cleaning_config.validate()?;
        self.entropy_config.validate()?;
        self.network_config.validate()?;
        self.louvain_config.validate()?;
        Ok(())
    }

    pub fn detector(&self) -> Box<dyn CommunityDetector> {
        match self.community_method {
            CommunityMethod::Louvain => Box::new(Louvain::new(self.louvain_config)),
            CommunityMethod::ConnectedComponents => Box::new(ComponentDetector),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub id: SpectrumId,
    pub community: CommunityLabel,
    pub set: SpectrumSet,
    pub precursor_mz: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub num_parents: usize,
    pub num_products: usize,
    pub num_excluded: usize,
    pub num_candidates: usize,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub num_communities: usize,
    pub modularity: f64,
    pub communities: BTreeMap<CommunityLabel, Vec<SpectrumId>>,
}

/// Everything one run produces. Nothing in here is shared or mutated
/// after `build_network` returns.
#[derive(Debug)]
pub struct NetworkResult {
    pub library: SpectralLibrary,
    pub candidates: BTreeSet<SpectrumId>,
    pub records: Vec<SimilarityRecord>,
    pub graph: SimilarityGraph,
    pub partition: Partition,
    pub resolution: f64,
}

impl NetworkResult {
    /// Per node metadata, in node order, for exporting or drawing.
    pub fn node_summaries(&self) -> Vec<NodeSummary> {
        self.graph
            .nodes()
            .filter_map(|id| {
                let spectrum = self.library.get(id)?;
                let community = self.partition.get(id)?;
                Some(NodeSummary {
                    id: id.clone(),
                    community,
                    set: spectrum.set,
                    precursor_mz: spectrum.precursor_mz,
                })
            })
            .collect()
    }

    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            num_parents: self.library.parents().len(),
            num_products: self.library.products().len(),
            num_excluded: self.library.excluded().len(),
            num_candidates: self.candidates.len(),
            num_nodes: self.graph.num_nodes(),
            num_edges: self.graph.num_edges(),
            num_communities: self.partition.num_communities(),
            modularity: self.partition.modularity(&self.graph, self.resolution),
            communities: self.partition.communities(),
        }
    }
}

pub fn build_network(
    parents: Vec<RawSpectrum>,
    products: Vec<RawSpectrum>,
    config: &PipelineConfig,
) -> Result<NetworkResult> {
    let detector = config.detector();
    build_network_with(parents, products, config, detector.as_ref())
}

/// Cleans, screens, scores, assembles and partitions.
///
/// Invalid spectra are logged and left out; an invalid configuration is
/// returned as an error before any spectrum is touched.
pub fn build_network_with(
    parents: Vec<RawSpectrum>,
    products: Vec<RawSpectrum>,
    config: &PipelineConfig,
    detector: &dyn CommunityDetector,
) -> Result<NetworkResult> {
    config.validate()?;
    let mut timer = utils::ContextTimer::new("build_network", true, utils::LogLevel::INFO);

    let mut st = timer.start_sub_timer("cleaning");
    let library = SpectralLibrary::build(parents, products, &config.cleaning_config);
    st.stop(true);

    let mut st = timer.start_sub_timer("screening");
    let candidates = screen_candidates(
        library.parents(),
        library.products(),
        &config.entropy_config,
        &config.network_config,
    );
    st.stop(true);
    info!("{} spectra passed screening", candidates.len());

    let mut st = timer.start_sub_timer("edges");
    let records = build_edges(
        &library,
        &candidates,
        &config.entropy_config,
        &config.network_config,
    );
    st.stop(true);
    info!("{} edges above threshold", records.len());

    let graph = SimilarityGraph::from_records(&records);

    let mut st = timer.start_sub_timer(detector.name());
    let partition = detector.detect(&graph);
    st.stop(true);
    info!(
        "{} nodes in {} communities",
        partition.len(),
        partition.num_communities()
    );

    timer.stop(true);
    Ok(NetworkResult {
        library,
        candidates,
        records,
        graph,
        partition,
        resolution: config.louvain_config.resolution,
    })
}
