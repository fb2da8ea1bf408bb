use std::collections::HashMap;

use log::{
    info,
    warn,
};
use rayon::prelude::*;
use serde::Serialize;

use crate::errors::SpecMeshError;
use crate::ms::spectrum::{
    CleaningConfig,
    RawSpectrum,
    Spectrum,
    SpectrumId,
    SpectrumSet,
};

#[derive(Debug, Clone, Serialize)]
pub struct ExcludedSpectrum {
    pub id: SpectrumId,
    pub set: SpectrumSet,
    pub reason: String,
}

/// The cleaned parent and product spectra of one run.
///
/// Spectra that fail cleaning, and identifiers already taken by an earlier
/// spectrum, are kept aside in `excluded` and never reach the network.
#[derive(Debug, Clone, Default)]
pub struct SpectralLibrary {
    parents: Vec<Spectrum>,
    products: Vec<Spectrum>,
    index: HashMap<SpectrumId, (SpectrumSet, usize)>,
    excluded: Vec<ExcludedSpectrum>,
}

impl SpectralLibrary {
    pub fn build(
        parents: Vec<RawSpectrum>,
        products: Vec<RawSpectrum>,
        config: &CleaningConfig,
    ) -> Self {
        let mut library = SpectralLibrary::default();
        let cleaned_parents = clean_all(parents, SpectrumSet::Parent, config);
        let cleaned_products = clean_all(products, SpectrumSet::Product, config);

        for (id, cleaned) in cleaned_parents.into_iter().chain(cleaned_products) {
            library.insert(id, cleaned);
        }

        info!(
            "Spectral library: {} parent, {} product, {} excluded",
            library.parents.len(),
            library.products.len(),
            library.excluded.len()
        );
        library
    }

    fn insert(
        &mut self,
        id: SpectrumId,
        cleaned: Result<Spectrum, (SpectrumSet, SpecMeshError)>,
    ) {
        let spectrum = match cleaned {
            Ok(spectrum) => spectrum,
            Err((set, e)) => {
                warn!("Excluding {} spectrum: {}", set, e);
                self.excluded.push(ExcludedSpectrum {
                    id,
                    set,
                    reason: e.to_string(),
                });
                return;
            },
        };

        if let Some((first_set, _)) = self.index.get(&spectrum.id) {
            let reason = format!("duplicate identifier, first seen as {}", first_set);
            warn!("Excluding {} spectrum '{}': {}", spectrum.set, spectrum.id, reason);
            self.excluded.push(ExcludedSpectrum {
                id: spectrum.id,
                set: spectrum.set,
                reason,
            });
            return;
        }

        let set = spectrum.set;
        let bucket = match set {
            SpectrumSet::Parent => &mut self.parents,
            SpectrumSet::Product => &mut self.products,
        };
        self.index.insert(spectrum.id.clone(), (set, bucket.len()));
        bucket.push(spectrum);
    }

    pub fn parents(&self) -> &[Spectrum] {
        &self.parents
    }

    pub fn products(&self) -> &[Spectrum] {
        &self.products
    }

    pub fn excluded(&self) -> &[ExcludedSpectrum] {
        &self.excluded
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Option<&Spectrum> {
        self.index.get(id).map(|(set, i)| match set {
            SpectrumSet::Parent => &self.parents[*i],
            SpectrumSet::Product => &self.products[*i],
        })
    }

    pub fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Spectrum> {
        self.parents.iter().chain(self.products.iter())
    }

    pub fn len(&self) -> usize {
        self.parents.len() + self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Cleaned = (SpectrumId, Result<Spectrum, (SpectrumSet, SpecMeshError)>);

fn clean_all(
    raws: Vec<RawSpectrum>,
    set: SpectrumSet,
    config: &CleaningConfig,
) -> Vec<Cleaned> {
    raws.into_par_iter()
        .map(|mut raw| {
            raw.set = set;
            let id = raw.id.clone();
            (id, Spectrum::from_raw(raw, config).map_err(|e| (set, e)))
        })
        .collect()
}
