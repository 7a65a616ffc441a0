//! Native spectrum-id resolution and Universal Spectrum Identifier
//! construction.
//!
//! Every search engine / instrument vendor references spectra inside its
//! files with a different convention, declared per spectral-file reference
//! as a controlled-vocabulary accession. Resolution is a pure dispatch over
//! that closed set of conventions; an unparsable id degrades to the raw
//! string rather than aborting the run.

use serde::{Deserialize, Serialize};

/// USI scheme prefix. The string built under it is the stable primary key
/// for spectrum evidence
pub const SPECTRUM_PREFIX: &str = "mzspec:";

/// Native spectrum-id conventions declared by spectral-file references.
/// Closed set: adding a vendor means adding a variant and its parse rule
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NativeIdFormat {
    /// `query=N`, 0-based Mascot query number
    MascotQueryNumber,
    /// `index=N`, 0-based position in a multi-spectrum peak list
    MultiPeakListNativeId,
    /// `file=...`, one spectrum per file
    SinglePeakListNativeId,
    /// `mzMLid=...`, an mzML spectrum id
    MzmlId,
    /// `scan=N`, bare scan number
    ScanNumberNativeId,
    /// Full vendor spectrum id, e.g. `controllerType=0 controllerNumber=1 scan=175`
    SpectrumNativeId,
    /// Sciex WIFF sample/cycle/experiment reference
    WiffNativeId,
    /// Declared format was missing or unrecognized
    None,
}

impl NativeIdFormat {
    /// Map the CV accession declared on a spectral-file reference
    pub fn from_accession(accession: &str) -> Self {
        match accession {
            "MS:1001528" => NativeIdFormat::MascotQueryNumber,
            "MS:1000774" => NativeIdFormat::MultiPeakListNativeId,
            "MS:1000775" => NativeIdFormat::SinglePeakListNativeId,
            "MS:1001530" => NativeIdFormat::MzmlId,
            "MS:1000776" => NativeIdFormat::ScanNumberNativeId,
            "MS:1000777" => NativeIdFormat::SpectrumNativeId,
            "MS:1000770" => NativeIdFormat::WiffNativeId,
            _ => NativeIdFormat::None,
        }
    }
}

/// A spectrum lookup key resolved from a PSM's raw source id
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResolvedKey {
    /// 1-based position within the file
    Index(u64),
    /// Bare scan number, kept as reported
    Scan(String),
    /// Anything addressed by its native string id
    Native(String),
}

impl std::fmt::Display for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedKey::Index(index) => write!(f, "{}", index),
            ResolvedKey::Scan(scan) => f.write_str(scan),
            ResolvedKey::Native(native) => f.write_str(native),
        }
    }
}

/// Resolve a PSM's raw source id to a lookup key under the declared native
/// id convention. Total: an id that does not parse under its convention
/// degrades to the untouched raw string. `title` is the PSM's spectrum
/// title, used for conventions this pipeline has no parse rule for
pub fn resolve(format: NativeIdFormat, source_id: &str, title: Option<&str>) -> ResolvedKey {
    match format {
        // Mascot queries are 0-based at this layer; the lookup convention
        // is 1-based
        NativeIdFormat::MascotQueryNumber => one_based_index(source_id, "query="),
        NativeIdFormat::MultiPeakListNativeId => one_based_index(source_id, "index="),
        NativeIdFormat::SinglePeakListNativeId => {
            ResolvedKey::Native(strip(source_id, "file=").to_string())
        }
        NativeIdFormat::MzmlId => ResolvedKey::Native(strip(source_id, "mzMLid=").to_string()),
        NativeIdFormat::ScanNumberNativeId => {
            ResolvedKey::Scan(strip(source_id, "scan=").to_string())
        }
        NativeIdFormat::SpectrumNativeId
        | NativeIdFormat::WiffNativeId
        | NativeIdFormat::None => match title {
            Some(title) => ResolvedKey::Native(title.to_string()),
            None => ResolvedKey::Native(source_id.to_string()),
        },
    }
}

fn strip<'a>(source_id: &'a str, prefix: &str) -> &'a str {
    source_id.strip_prefix(prefix).unwrap_or(source_id)
}

fn one_based_index(source_id: &str, prefix: &str) -> ResolvedKey {
    match strip(source_id, prefix).trim().parse::<u64>() {
        Ok(index) => ResolvedKey::Index(index + 1),
        Err(_) => ResolvedKey::Native(source_id.to_string()),
    }
}

/// Tag placed in the USI marking how the trailing key addresses the file
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanType {
    Index,
    Scan,
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanType::Index => f.write_str("INDEX"),
            ScanType::Scan => f.write_str("SCAN"),
        }
    }
}

impl ScanType {
    pub fn for_format(format: NativeIdFormat) -> Self {
        match format {
            NativeIdFormat::MascotQueryNumber | NativeIdFormat::MultiPeakListNativeId => {
                ScanType::Index
            }
            NativeIdFormat::MzmlId | NativeIdFormat::SpectrumNativeId => ScanType::Scan,
            _ => ScanType::Index,
        }
    }
}

/// Build the Universal Spectrum Identifier for one resolved spectrum:
/// `mzspec:<project>:<file base name>:<scan type>:<key>`. Pure and total;
/// identical inputs always yield the identical string
pub fn build_usi(
    project_accession: &str,
    file_location: &str,
    format: NativeIdFormat,
    key: &ResolvedKey,
) -> String {
    let file_name = base_name(file_location);
    let scan_type = ScanType::for_format(format);
    let value = match scan_type {
        // Scan-typed keys may carry a full vendor id; only the numeric
        // portion after the last `scan=` belongs in the USI
        ScanType::Scan => {
            let rendered = key.to_string();
            match rendered.rsplit_once("scan=") {
                Some((_, rest)) => {
                    let digits: String = rest
                        .trim()
                        .chars()
                        .take_while(|c| c.is_ascii_digit())
                        .collect();
                    if digits.is_empty() {
                        rest.trim().to_string()
                    } else {
                        digits
                    }
                }
                None => rendered,
            }
        }
        ScanType::Index => key.to_string(),
    };
    format!(
        "{}{}:{}:{}:{}",
        SPECTRUM_PREFIX, project_accession, file_name, scan_type, value
    )
}

/// File-system base name of a declared file location, tolerating both
/// separator conventions
pub fn base_name(location: &str) -> &str {
    location
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(location)
}
