use std::collections::BTreeSet;

use indicatif::ParallelProgressIterator;
use log::{
    debug,
    warn,
};
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use crate::ms::library::SpectralLibrary;
use crate::ms::spectrum::{
    Spectrum,
    SpectrumId,
};
use crate::network::NetworkConfig;
use crate::scoring::entropy::{
    entropy_similarity,
    EntropyConfig,
};
use crate::utils;

/// A scored pair of distinct spectra, `source < target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub source: SpectrumId,
    pub target: SpectrumId,
    pub similarity: f64,
}

/// Scores every unordered pair of screened spectra, regardless of which set
/// they belong to, and keeps the pairs above the threshold.
///
/// Identifiers are visited in ascending order and only `i < j` is scored,
/// so every pair shows up once with `source < target`. The output is
/// sorted by `(source, target)`.
pub fn build_edges(
    library: &SpectralLibrary,
    candidates: &BTreeSet<SpectrumId>,
    entropy_config: &EntropyConfig,
    network_config: &NetworkConfig,
) -> Vec<SimilarityRecord> {
    let threshold = network_config.similarity_threshold;

    let spectra: Vec<&Spectrum> = candidates
        .iter()
        .filter_map(|id| {
            let spec = library.get(id);
            if spec.is_none() {
                warn!("Screened identifier '{}' is not in the library, skipping", id);
            }
            spec
        })
        .collect();

    let progbar = utils::progress_bar(spectra.len(), network_config.show_progress);
    let mut records: Vec<SimilarityRecord> = spectra
        .par_iter()
        .enumerate()
        .progress_with(progbar)
        .flat_map_iter(|(i, a)| {
            spectra[i + 1..].iter().filter_map(move |b| {
                let similarity = entropy_similarity(a, b, entropy_config);
                if similarity > threshold {
                    Some(SimilarityRecord {
                        source: a.id.clone(),
                        target: b.id.clone(),
                        similarity,
                    })
                } else {
                    None
                }
            })
        })
        .collect();

    records.par_sort_unstable_by(|x, y| {
        x.source
            .cmp(&y.source)
            .then_with(|| x.target.cmp(&y.target))
    });

    let n = spectra.len();
    debug!(
        "Edge building: {} of {} pairs above {}",
        records.len(),
        n * n.saturating_sub(1) / 2,
        threshold
    );
    records
}
