use std::io::Read;
use std::path::Path;

use log::{
    info,
    warn,
};
use serde::Deserialize;

use crate::errors::{
    Result,
    SpecMeshError,
};
use crate::ms::spectrum::{
    Peak,
    RawSpectrum,
    SpectrumSet,
};
use crate::network::edges::SimilarityRecord;
use crate::pipeline::{
    NetworkSummary,
    NodeSummary,
};

const ID_COLUMN: &str = "ID";
const MZ_COLUMN: &str = "mz";
const PEAKS_COLUMN: &str = "MS2";

#[derive(Debug, Deserialize)]
struct SpectrumRow {
    #[serde(rename = "ID")]
    id: String,
    mz: f64,
    #[serde(rename = "MS2")]
    ms2: String,
}

/// Parses `"mz:intensity mz:intensity ..."`.
pub fn parse_peak_string(peaks: &str) -> Result<Vec<Peak>> {
    peaks
        .split_whitespace()
        .map(|token| {
            let (mz, intensity) = token.split_once(':').ok_or_else(|| SpecMeshError::PeakParse {
                token: token.to_string(),
                reason: "expected 'mz:intensity'".into(),
            })?;
            let parse = |x: &str| {
                x.trim().parse::<f64>().map_err(|e| SpecMeshError::PeakParse {
                    token: token.to_string(),
                    reason: e.to_string(),
                })
            };
            Ok(Peak::new(parse(mz)?, parse(intensity)?))
        })
        .collect()
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") | Some("tab") | Some("txt") => b'\t',
        _ => b',',
    }
}

/// Reads a spectrum table with `ID`, `mz` and `MS2` columns.
///
/// Rows whose peak string cannot be parsed are logged and skipped, a
/// missing column fails the whole read.
pub fn read_spectra_table(
    path: impl AsRef<Path>,
    set: SpectrumSet,
) -> Result<Vec<RawSpectrum>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let out = read_spectra(file, delimiter_for(path), set, &path.display().to_string())?;
    info!("Read {} {} spectra from {}", out.len(), set, path.display());
    Ok(out)
}

pub fn read_spectra<R: Read>(
    reader: R,
    delimiter: u8,
    set: SpectrumSet,
    source_name: &str,
) -> Result<Vec<RawSpectrum>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    for column in [ID_COLUMN, MZ_COLUMN, PEAKS_COLUMN] {
        if !headers.iter().any(|h| h == column) {
            return Err(SpecMeshError::MissingColumn {
                column: column.to_string(),
                path: source_name.to_string(),
            });
        }
    }

    let mut out = Vec::new();
    for (line, row) in rdr.deserialize::<SpectrumRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping row {} of {}: {}", line + 1, source_name, e);
                continue;
            },
        };
        match parse_peak_string(&row.ms2) {
            Ok(peaks) => out.push(RawSpectrum {
                id: row.id,
                precursor_mz: row.mz,
                peaks,
                set,
            }),
            Err(e) => warn!("Skipping spectrum '{}' in {}: {}", row.id, source_name, e),
        }
    }
    Ok(out)
}

pub fn write_similarities_csv(
    records: &[SimilarityRecord],
    path: impl AsRef<Path>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_partition_csv(
    nodes: &[NodeSummary],
    path: impl AsRef<Path>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for node in nodes {
        wtr.serialize(node)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_summary_json(
    summary: &NetworkSummary,
    path: impl AsRef<Path>,
) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)?;
    Ok(())
}
