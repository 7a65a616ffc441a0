//! The spectrum shape the aggregator consumes, and the lookup seam
//! implemented by the file index

use crate::spectrum_id::ResolvedKey;

/// One spectrum served by a point lookup. Peaks are (m/z, intensity)
/// pairs in ascending m/z order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Spectrum {
    pub ms_level: u8,
    pub precursor_mz: Option<f64>,
    pub precursor_charge: Option<i32>,
    pub peaks: Vec<(f64, f64)>,
}

/// Random-access spectrum lookup, shared read-only across evidence tasks
/// for the duration of one assay run
pub trait SpectrumSource: Sync {
    fn spectrum(&self, file_path: &str, key: &ResolvedKey) -> Result<Spectrum, SpectrumLookupError>;
}

/// A spectrum lookup failure. Recoverable at PSM granularity: the caller
/// skips the PSM and the assay run continues
#[derive(Debug)]
pub enum SpectrumLookupError {
    FileOpen {
        path: String,
        source: std::io::Error,
    },
    UnsupportedFormat {
        path: String,
    },
    Malformed {
        path: String,
        detail: String,
    },
    KeyNotFound {
        path: String,
        key: ResolvedKey,
    },
    UnknownFile {
        path: String,
    },
}

impl std::fmt::Display for SpectrumLookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpectrumLookupError::FileOpen { path, source } => {
                write!(f, "failed to open spectrum file {}: {}", path, source)
            }
            SpectrumLookupError::UnsupportedFormat { path } => {
                write!(f, "no spectrum reader for file format of {}", path)
            }
            SpectrumLookupError::Malformed { path, detail } => {
                write!(f, "malformed spectrum file {}: {}", path, detail)
            }
            SpectrumLookupError::KeyNotFound { path, key } => {
                write!(f, "spectrum {} not present in {}", key, path)
            }
            SpectrumLookupError::UnknownFile { path } => {
                write!(f, "{} is not part of this assay's spectrum index", path)
            }
        }
    }
}

impl std::error::Error for SpectrumLookupError {}
