use std::cmp::Ordering;

use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    Result,
    SpecMeshError,
};
use crate::ms::spectrum::{
    Peak,
    Spectrum,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct EntropyConfig {
    /// Max m/z distance (Da, inclusive) for two peaks to be aligned.
    pub ms2_tolerance_in_da: f64,
    pub weighted: bool,
    /// Spectra with an entropy at or above this are left unweighted.
    pub entropy_cutoff: f64,
    pub weight_start: f64,
    pub weight_slope: f64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        EntropyConfig {
            ms2_tolerance_in_da: 0.01,
            weighted: true,
            entropy_cutoff: 3.0,
            weight_start: 0.25,
            weight_slope: 0.25,
        }
    }
}

impl EntropyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.ms2_tolerance_in_da.is_finite() && self.ms2_tolerance_in_da > 0.) {
            return Err(SpecMeshError::Config(format!(
                "ms2_tolerance_in_da must be positive, got {}",
                self.ms2_tolerance_in_da
            )));
        }
        if self.weighted {
            if !(self.entropy_cutoff.is_finite() && self.entropy_cutoff > 0.) {
                return Err(SpecMeshError::Config(format!(
                    "entropy_cutoff must be positive, got {}",
                    self.entropy_cutoff
                )));
            }
            if !(self.weight_start.is_finite() && self.weight_start > 0.) {
                return Err(SpecMeshError::Config(format!(
                    "weight_start must be positive, got {}",
                    self.weight_start
                )));
            }
            if !(self.weight_slope.is_finite() && self.weight_slope >= 0.) {
                return Err(SpecMeshError::Config(format!(
                    "weight_slope must be non-negative, got {}",
                    self.weight_slope
                )));
            }
        }
        Ok(())
    }
}

/// Shannon entropy (natural log) of the distribution given by `intensities`.
///
/// The values are normalized internally, zeros contribute nothing and a
/// distribution with no mass has entropy 0.
pub fn spectral_entropy(intensities: &[f64]) -> f64 {
    let total: f64 = intensities.iter().sum();
    if total <= 0. {
        return 0.;
    }
    -intensities
        .iter()
        .filter(|x| **x > 0.)
        .map(|x| {
            let p = x / total;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Normalizes to sum one and, for low entropy spectra, raises every
/// intensity to `weight_start + weight_slope * entropy` before normalizing
/// again. Small peaks gain relative weight while the ordering is kept.
fn weighted_intensities(
    peaks: &[Peak],
    config: &EntropyConfig,
) -> Vec<f64> {
    let mut intensities: Vec<f64> = peaks.iter().map(|p| p.intensity).collect();
    normalize(&mut intensities);

    if config.weighted {
        let entropy = spectral_entropy(&intensities);
        if entropy < config.entropy_cutoff {
            let weight = config.weight_start + config.weight_slope * entropy;
            intensities.iter_mut().for_each(|x| *x = x.powf(weight));
            normalize(&mut intensities);
        }
    }
    intensities
}

fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0. {
        values.iter_mut().for_each(|x| *x /= total);
    }
}

/// One position of the merged peak axis, as indices into each spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignedPeak {
    Matched(usize, usize),
    OnlyA(usize),
    OnlyB(usize),
}

/// Aligns two m/z sorted peak lists.
///
/// Every pair within `tolerance` is a candidate; pairs are accepted closest
/// first, and a peak takes part in at most one match. Unmatched peaks of
/// either side are kept on the axis by themselves.
pub fn align_peaks(
    a: &[Peak],
    b: &[Peak],
    tolerance: f64,
) -> Vec<AlignedPeak> {
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    let mut j_start = 0;
    for (i, peak_a) in a.iter().enumerate() {
        while j_start < b.len() && b[j_start].mz < peak_a.mz - tolerance {
            j_start += 1;
        }
        for (j, peak_b) in b.iter().enumerate().skip(j_start) {
            if peak_b.mz > peak_a.mz + tolerance {
                break;
            }
            let dist = (peak_a.mz - peak_b.mz).abs();
            if dist <= tolerance {
                candidates.push((dist, i, j));
            }
        }
    }
    candidates.sort_by(|x, y| {
        x.0.total_cmp(&y.0)
            .then(x.1.cmp(&y.1))
            .then(x.2.cmp(&y.2))
    });

    let mut a_match: Vec<Option<usize>> = vec![None; a.len()];
    let mut b_taken = vec![false; b.len()];
    for (_, i, j) in candidates {
        if a_match[i].is_none() && !b_taken[j] {
            a_match[i] = Some(j);
            b_taken[j] = true;
        }
    }

    let mut out: Vec<AlignedPeak> = a_match
        .iter()
        .enumerate()
        .map(|(i, m)| match m {
            Some(j) => AlignedPeak::Matched(i, *j),
            None => AlignedPeak::OnlyA(i),
        })
        .collect();
    out.extend(
        b_taken
            .iter()
            .enumerate()
            .filter(|(_, taken)| !**taken)
            .map(|(j, _)| AlignedPeak::OnlyB(j)),
    );
    out
}

// Total order on peak lists, used to always score a pair in the same
// orientation so the result is bit-for-bit symmetric.
fn cmp_peak_lists(
    a: &[Peak],
    b: &[Peak],
) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x
            .mz
            .total_cmp(&y.mz)
            .then(x.intensity.total_cmp(&y.intensity));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Entropy similarity of two peak lists sorted by m/z.
///
/// `1 - (2 * S(AB) - S(A) - S(B)) / ln(4)` where `AB` is the merged
/// spectrum `(A + B) / 2` over the aligned axis. The result lies in
/// `[0, 1]`; it is 1 for identical spectra and 0 when no peaks align or
/// either side carries no intensity.
pub fn entropy_similarity_peaks(
    a: &[Peak],
    b: &[Peak],
    config: &EntropyConfig,
) -> f64 {
    let (a, b) = match cmp_peak_lists(a, b) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    };

    let total_a: f64 = a.iter().map(|p| p.intensity).sum();
    let total_b: f64 = b.iter().map(|p| p.intensity).sum();
    if !(total_a > 0. && total_b > 0.) {
        return 0.;
    }

    let aligned = align_peaks(a, b, config.ms2_tolerance_in_da);
    if !aligned
        .iter()
        .any(|x| matches!(x, AlignedPeak::Matched(_, _)))
    {
        return 0.;
    }

    let int_a = weighted_intensities(a, config);
    let int_b = weighted_intensities(b, config);

    let merged: Vec<f64> = aligned
        .iter()
        .map(|x| match *x {
            AlignedPeak::Matched(i, j) => (int_a[i] + int_b[j]) / 2.,
            AlignedPeak::OnlyA(i) => int_a[i] / 2.,
            AlignedPeak::OnlyB(j) => int_b[j] / 2.,
        })
        .collect();

    let entropy_a = spectral_entropy(&int_a);
    let entropy_b = spectral_entropy(&int_b);
    let entropy_merged = spectral_entropy(&merged);

    let similarity = 1. - (2. * entropy_merged - entropy_a - entropy_b) / 4f64.ln();
    similarity.clamp(0., 1.)
}

pub fn entropy_similarity(
    a: &Spectrum,
    b: &Spectrum,
    config: &EntropyConfig,
) -> f64 {
    entropy_similarity_peaks(a.peaks(), b.peaks(), config)
}
