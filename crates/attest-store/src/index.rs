//! The per-assay spectrum file index: one randomly-queryable reader per
//! spectral file, built single-threaded before the evidence fan-out and
//! shared read-only across worker tasks.

use crate::mgf::MgfReader;
use crate::mzml::MzmlReader;
use crate::paths;
use attest_core::report::{
    ResolvedSpectrumFile, SpectraDataRef, SpectrumFileFormat, SpectrumFilePlan,
};
use attest_core::spectrum::{Spectrum, SpectrumLookupError, SpectrumSource};
use attest_core::spectrum_id::{base_name, NativeIdFormat, ResolvedKey};
use fnv::FnvHashMap;

enum FileReader {
    Mgf(MgfReader),
    MzML(MzmlReader),
}

pub struct SpectrumFileIndex {
    readers: FnvHashMap<String, FileReader>,
}

impl SpectrumFileIndex {
    /// Open a reader for every file in the plan. Construction is the only
    /// mutating operation; a file that cannot be opened or parsed aborts
    /// the assay run here rather than failing PSM by PSM
    pub fn build(plan: &SpectrumFilePlan) -> Result<Self, SpectrumLookupError> {
        let mut readers = FnvHashMap::default();
        for file in plan.by_ref.values().chain(plan.embedded.iter()) {
            if readers.contains_key(&file.path) {
                continue;
            }
            log::info!("indexing spectra from {}", file.path);
            readers.insert(file.path.clone(), open_reader(file)?);
        }
        Ok(SpectrumFileIndex { readers })
    }

    pub fn files(&self) -> usize {
        self.readers.len()
    }
}

fn open_reader(file: &ResolvedSpectrumFile) -> Result<FileReader, SpectrumLookupError> {
    let format = match file.format {
        // an embedded results file is addressed by whatever format its
        // name declares
        SpectrumFileFormat::Results => {
            SpectrumFileFormat::from_file_name(&file.path).ok_or_else(|| {
                SpectrumLookupError::UnsupportedFormat {
                    path: file.path.clone(),
                }
            })?
        }
        other => other,
    };
    match format {
        SpectrumFileFormat::Mgf => Ok(FileReader::Mgf(MgfReader::open(&file.path)?)),
        SpectrumFileFormat::MzML => Ok(FileReader::MzML(MzmlReader::open(&file.path)?)),
        _ => Err(SpectrumLookupError::UnsupportedFormat {
            path: file.path.clone(),
        }),
    }
}

impl SpectrumSource for SpectrumFileIndex {
    fn spectrum(&self, file_path: &str, key: &ResolvedKey) -> Result<Spectrum, SpectrumLookupError> {
        match self.readers.get(file_path) {
            Some(FileReader::Mgf(reader)) => reader.get(key),
            Some(FileReader::MzML(reader)) => reader.get(key),
            None => Err(SpectrumLookupError::UnknownFile {
                path: file_path.to_string(),
            }),
        }
    }
}

/// Pair every declared spectral-file reference with an on-disk path. A
/// related file whose (uncompressed) base name matches the declared
/// location wins; otherwise the declared name is resolved under the
/// assay's build path
pub fn combine_spectrum_files(
    build_path: &str,
    related_files: &[String],
    spectra_data: &[SpectraDataRef],
) -> SpectrumFilePlan {
    let mut plan = SpectrumFilePlan::default();
    for data in spectra_data {
        let declared = paths::uncompressed_name(base_name(&data.location));
        let path = related_files
            .iter()
            .find(|related| {
                paths::uncompressed_name(base_name(related)).eq_ignore_ascii_case(declared)
            })
            .map(|related| paths::join(build_path, paths::uncompressed_name(related)))
            .unwrap_or_else(|| paths::join(build_path, declared));
        plan.by_ref.insert(
            data.id.clone(),
            ResolvedSpectrumFile {
                path,
                id_format: data.id_format,
                format: data.file_format,
            },
        );
    }
    plan
}

/// Plan for an assay that declares no separate spectral files: the results
/// file itself is the sole spectral source, keyed by raw source id
pub fn embedded_plan(results_path: &str) -> SpectrumFilePlan {
    SpectrumFilePlan {
        by_ref: FnvHashMap::default(),
        embedded: Some(ResolvedSpectrumFile {
            path: results_path.to_string(),
            id_format: NativeIdFormat::None,
            format: SpectrumFileFormat::Results,
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn related_files_match_by_uncompressed_base_name() {
        let spectra_data = vec![SpectraDataRef {
            id: "SD1".into(),
            location: "file:///submitted/Run1.MGF".into(),
            id_format: NativeIdFormat::MultiPeakListNativeId,
            file_format: SpectrumFileFormat::Mgf,
        }];
        let related = vec!["run1.mgf.gz".to_string()];
        let plan = combine_spectrum_files("/data/2019/07/PXD1/internal/", &related, &spectra_data);
        assert_eq!(
            plan.by_ref["SD1"].path,
            "/data/2019/07/PXD1/internal/run1.mgf"
        );
        assert!(plan.embedded.is_none());
    }

    #[test]
    fn unmatched_references_fall_back_to_declared_name() {
        let spectra_data = vec![SpectraDataRef {
            id: "SD1".into(),
            location: "C:\\data\\run2.mzML".into(),
            id_format: NativeIdFormat::MzmlId,
            file_format: SpectrumFileFormat::MzML,
        }];
        let plan = combine_spectrum_files("/p/internal/", &[], &spectra_data);
        assert_eq!(plan.by_ref["SD1"].path, "/p/internal/run2.mzML");
    }

    #[test]
    fn embedded_plan_has_no_references() {
        let plan = embedded_plan("/p/internal/result.mgf");
        assert!(plan.by_ref.is_empty());
        assert_eq!(plan.embedded.as_ref().unwrap().path, "/p/internal/result.mgf");
    }
}
