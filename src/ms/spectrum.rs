use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    Result,
    SpecMeshError,
};

pub type SpectrumId = String;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
}

impl Peak {
    pub fn new(
        mz: f64,
        intensity: f64,
    ) -> Self {
        Peak { mz, intensity }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumSet {
    Parent,
    Product,
}

impl std::fmt::Display for SpectrumSet {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            SpectrumSet::Parent => write!(f, "parent"),
            SpectrumSet::Product => write!(f, "product"),
        }
    }
}

/// A spectrum as handed over by a loader, before any cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSpectrum {
    pub id: SpectrumId,
    pub precursor_mz: f64,
    pub peaks: Vec<Peak>,
    pub set: SpectrumSet,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CleaningConfig {
    /// Neighbouring peaks closer than this (Da) are merged into one.
    pub min_ms2_difference_in_da: f64,
    /// Peaks below this fraction of the base peak are dropped.
    pub noise_threshold: Option<f64>,
    pub max_peak_num: Option<usize>,
    pub remove_precursor: bool,
    pub precursor_removal_da: f64,
    pub normalize_intensity: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        CleaningConfig {
            min_ms2_difference_in_da: 0.01,
            noise_threshold: Some(0.01),
            max_peak_num: None,
            remove_precursor: false,
            precursor_removal_da: 1.6,
            normalize_intensity: true,
        }
    }
}

impl CleaningConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_ms2_difference_in_da.is_finite() && self.min_ms2_difference_in_da > 0.) {
            return Err(SpecMeshError::Config(format!(
                "min_ms2_difference_in_da must be positive, got {}",
                self.min_ms2_difference_in_da
            )));
        }
        if let Some(noise) = self.noise_threshold {
            if !(0. ..1.).contains(&noise) {
                return Err(SpecMeshError::Config(format!(
                    "noise_threshold must be in [0, 1), got {}",
                    noise
                )));
            }
        }
        if self.max_peak_num == Some(0) {
            return Err(SpecMeshError::Config(
                "max_peak_num must be at least 1 when set".into(),
            ));
        }
        if self.remove_precursor
            && !(self.precursor_removal_da.is_finite() && self.precursor_removal_da >= 0.)
        {
            return Err(SpecMeshError::Config(format!(
                "precursor_removal_da must be non-negative, got {}",
                self.precursor_removal_da
            )));
        }
        Ok(())
    }
}

/// A cleaned spectrum.
///
/// Peaks are sorted by m/z, all intensities are positive and no two peaks
/// are closer than the merge tolerance used to build it. The peak list is
/// never empty.
#[derive(Debug, Clone, Serialize)]
pub struct Spectrum {
    pub id: SpectrumId,
    pub precursor_mz: f64,
    pub set: SpectrumSet,
    peaks: Vec<Peak>,
}

impl Spectrum {
    pub fn from_raw(
        raw: RawSpectrum,
        config: &CleaningConfig,
    ) -> Result<Self> {
        if !(raw.precursor_mz.is_finite() && raw.precursor_mz > 0.) {
            return Err(SpecMeshError::invalid_spectrum(
                &raw.id,
                format!("precursor m/z must be positive, got {}", raw.precursor_mz),
            ));
        }
        if raw.peaks.is_empty() {
            return Err(SpecMeshError::invalid_spectrum(&raw.id, "empty peak list"));
        }

        let peaks = clean_peaks(raw.peaks, raw.precursor_mz, config);
        if peaks.is_empty() {
            return Err(SpecMeshError::invalid_spectrum(
                &raw.id,
                "no peaks left after cleaning",
            ));
        }

        Ok(Spectrum {
            id: raw.id,
            precursor_mz: raw.precursor_mz,
            set: raw.set,
            peaks,
        })
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn total_intensity(&self) -> f64 {
        self.peaks.iter().map(|p| p.intensity).sum()
    }
}

/// Cleans a peak list.
///
/// 1. Drops peaks with non-finite values or non-positive intensity.
/// 2. Optionally drops peaks near or above the precursor.
/// 3. Merges every run of neighbours closer than the merge tolerance into a
///    single peak at the intensity weighted mean m/z, summing intensities.
///    The run is transitive, so `a~b~c` merges even when `c - a` exceeds the
///    tolerance.
/// 4. Applies the relative noise cut-off and the peak count limit.
/// 5. Normalizes intensities to sum to one.
///
/// The result is sorted by m/z and may be empty.
pub fn clean_peaks(
    mut peaks: Vec<Peak>,
    precursor_mz: f64,
    config: &CleaningConfig,
) -> Vec<Peak> {
    peaks.retain(|p| {
        p.mz.is_finite() && p.mz > 0. && p.intensity.is_finite() && p.intensity > 0.
    });

    if config.remove_precursor {
        let max_mz = precursor_mz - config.precursor_removal_da;
        peaks.retain(|p| p.mz < max_mz);
    }

    peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
    let mut peaks = merge_close_peaks(&peaks, config.min_ms2_difference_in_da);

    if let Some(noise) = config.noise_threshold {
        let max_intensity = peaks.iter().map(|p| p.intensity).fold(0., f64::max);
        let min_intensity = noise * max_intensity;
        peaks.retain(|p| p.intensity >= min_intensity);
    }

    if let Some(max_peak_num) = config.max_peak_num {
        if peaks.len() > max_peak_num {
            peaks.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
            peaks.truncate(max_peak_num);
            peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        }
    }

    if config.normalize_intensity {
        normalize_intensities(&mut peaks);
    }

    peaks
}

/// Expects `peaks` sorted by m/z.
fn merge_close_peaks(
    peaks: &[Peak],
    tolerance: f64,
) -> Vec<Peak> {
    let mut out: Vec<Peak> = Vec::with_capacity(peaks.len());

    let mut run_intensity = 0.;
    let mut run_weighted_mz = 0.;
    let mut last_mz: Option<f64> = None;

    for peak in peaks {
        if let Some(prev) = last_mz {
            if peak.mz - prev >= tolerance {
                out.push(Peak::new(run_weighted_mz / run_intensity, run_intensity));
                run_intensity = 0.;
                run_weighted_mz = 0.;
            }
        }
        run_intensity += peak.intensity;
        run_weighted_mz += peak.mz * peak.intensity;
        last_mz = Some(peak.mz);
    }

    if last_mz.is_some() {
        out.push(Peak::new(run_weighted_mz / run_intensity, run_intensity));
    }

    out
}

pub(crate) fn normalize_intensities(peaks: &mut [Peak]) {
    let total: f64 = peaks.iter().map(|p| p.intensity).sum();
    if total > 0. {
        peaks.iter_mut().for_each(|p| p.intensity /= total);
    }
}

#[cfg(test)]
mod test_cleaning {
    use super::*;

    fn raw(peaks: &[(f64, f64)]) -> RawSpectrum {
        RawSpectrum {
            id: "S1".into(),
            precursor_mz: 300.,
            peaks: peaks.iter().map(|(mz, i)| Peak::new(*mz, *i)).collect(),
            set: SpectrumSet::Parent,
        }
    }

    fn assert_close(
        a: f64,
        b: f64,
    ) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_merge_is_transitive() {
        let config = CleaningConfig {
            noise_threshold: None,
            normalize_intensity: false,
            ..Default::default()
        };
        // 100.000 -> 100.006 -> 100.012 are chained even though the ends are
        // 0.012 apart.
        let peaks = clean_peaks(
            raw(&[(100.012, 1.), (100.0, 1.), (100.006, 2.), (150., 4.)]).peaks,
            300.,
            &config,
        );
        assert_eq!(peaks.len(), 2);
        assert_close(peaks[0].intensity, 4.);
        assert_close(peaks[0].mz, (100.0 + 100.006 * 2. + 100.012) / 4.);
        assert_close(peaks[1].mz, 150.);
    }

    #[test]
    fn test_cleaned_invariants() {
        let config = CleaningConfig::default();
        let spec = Spectrum::from_raw(
            raw(&[
                (205.0, 3.),
                (100.0, 10.),
                (100.004, 5.),
                (101.0, 0.),
                (150.0, 7.),
                (150.009, 1.),
                (150.02, 2.),
            ]),
            &config,
        )
        .unwrap();

        let peaks = spec.peaks();
        for w in peaks.windows(2) {
            assert!(w[1].mz - w[0].mz >= config.min_ms2_difference_in_da);
        }
        assert!(peaks.iter().all(|p| p.intensity > 0.));
        assert_close(spec.total_intensity(), 1.);
        // 101.0 had zero intensity
        assert!(peaks.iter().all(|p| (p.mz - 101.0).abs() > 0.5));
    }

    #[test]
    fn test_noise_and_peak_limit() {
        let config = CleaningConfig {
            noise_threshold: Some(0.1),
            max_peak_num: Some(2),
            normalize_intensity: false,
            ..Default::default()
        };
        let peaks = clean_peaks(
            raw(&[(100., 100.), (110., 5.), (120., 50.), (130., 20.)]).peaks,
            300.,
            &config,
        );
        let mzs: Vec<f64> = peaks.iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![100., 120.]);
    }

    #[test]
    fn test_precursor_removal() {
        let config = CleaningConfig {
            remove_precursor: true,
            noise_threshold: None,
            ..Default::default()
        };
        let peaks = clean_peaks(
            raw(&[(100., 1.), (298.5, 1.), (299., 1.), (301., 1.)]).peaks,
            300.,
            &config,
        );
        assert_eq!(peaks.len(), 1);
        assert_close(peaks[0].mz, 100.);
    }

    #[test]
    fn test_invalid_spectra() {
        let config = CleaningConfig::default();
        let empty = Spectrum::from_raw(raw(&[]), &config);
        assert!(matches!(empty, Err(SpecMeshError::InvalidSpectrum { .. })));

        let all_zero = Spectrum::from_raw(raw(&[(100., 0.), (200., 0.)]), &config);
        match all_zero {
            Err(e) => assert!(!e.is_fatal()),
            Ok(_) => panic!("zero intensity spectrum should be rejected"),
        }

        let mut bad_precursor = raw(&[(100., 1.)]);
        bad_precursor.precursor_mz = -1.;
        assert!(Spectrum::from_raw(bad_precursor, &config).is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(CleaningConfig::default().validate().is_ok());
        let bad = CleaningConfig {
            min_ms2_difference_in_da: 0.,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = CleaningConfig {
            noise_threshold: Some(1.5),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
