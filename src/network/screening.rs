use std::collections::BTreeSet;

use indicatif::ParallelProgressIterator;
use log::debug;
use rayon::prelude::*;

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

/// Identifiers of every parent and product spectrum that scores above the
/// threshold against at least one spectrum of the other set.
///
/// Only parent x product pairs are scored here. Pairs within one set are
/// left to the edge builder, which runs on the (much smaller) output.
pub fn screen_candidates(
    parents: &[Spectrum],
    products: &[Spectrum],
    entropy_config: &EntropyConfig,
    network_config: &NetworkConfig,
) -> BTreeSet<SpectrumId> {
    let threshold = network_config.similarity_threshold;
    let progbar = utils::progress_bar(parents.len(), network_config.show_progress);

    let hits: Vec<(usize, usize)> = parents
        .par_iter()
        .enumerate()
        .progress_with(progbar)
        .flat_map_iter(|(i, parent)| {
            products
                .iter()
                .enumerate()
                .filter(move |(_, product)| {
                    entropy_similarity(parent, product, entropy_config) > threshold
                })
                .map(move |(j, _)| (i, j))
        })
        .collect();

    debug!(
        "Screening: {} of {} cross-set pairs above {}",
        hits.len(),
        parents.len() * products.len(),
        threshold
    );

    let mut candidates = BTreeSet::new();
    for (i, j) in hits {
        candidates.insert(parents[i].id.clone());
        candidates.insert(products[j].id.clone());
    }
    candidates
}
