//! Input data model: the ranked protein/peptide/PSM report produced by the
//! external inference engine for one assay. Immutable for the duration of a
//! run; the quality gate derives filtered copies from it.

use crate::param::CvTerm;
use crate::spectrum_id::NativeIdFormat;
use fnv::{FnvHashMap, FnvHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InferenceResult {
    pub proteins: Vec<ReportProtein>,
    /// Spectral file references declared by the result file. May be empty,
    /// in which case the result file itself is the sole spectral source
    pub spectra_data: Vec<SpectraDataRef>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportProtein {
    /// Representative accession of the protein group
    pub accession: String,
    /// Other members of the inference group
    #[serde(default)]
    pub group_members: Vec<String>,
    #[serde(default)]
    pub decoy: bool,
    /// Database sequence, when the result file carried one. Resolved via an
    /// external lookup otherwise
    pub sequence: Option<String>,
    pub score: Option<f64>,
    pub q_value: Option<f64>,
    pub peptides: Vec<ReportPeptide>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportPeptide {
    pub sequence: String,
    #[serde(default)]
    pub decoy: bool,
    pub q_value: Option<f64>,
    /// Per-method scores keyed by the engine's short names
    #[serde(default)]
    pub scores: FnvHashMap<String, f64>,
    #[serde(default)]
    pub missed_cleavages: u32,
    /// Modifications keyed by 1-based residue offset within the peptide.
    /// 0 is the N-terminus, `sequence.len() + 1` the C-terminus
    #[serde(default)]
    pub modifications: BTreeMap<u32, ModificationRef>,
    /// Where this peptide occurs within its proteins. May be empty if the
    /// engine could not map the peptide
    #[serde(default)]
    pub occurrences: Vec<AccessionOccurrence>,
    pub psms: Vec<ReportPsm>,
}

impl ReportPeptide {
    /// Stable string id used to match a protein's peptide against the
    /// assay-wide deduplicated peptide list: sequence plus the ordered
    /// modification positions and accessions
    pub fn string_id(&self) -> String {
        let mut id = self.sequence.clone();
        for (position, modification) in &self.modifications {
            let _ = write!(
                id,
                ";{}@{}",
                modification.accession.as_deref().unwrap_or("-"),
                position
            );
        }
        id
    }
}

/// One occurrence of a peptide within a protein sequence, 1-based and
/// inclusive. A negative start marks an occurrence the engine reported but
/// could not place
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessionOccurrence {
    pub accession: String,
    pub start: i64,
    pub end: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportPsm {
    pub sequence: String,
    pub charge: i32,
    /// Observed precursor m/z
    pub mass_to_charge: f64,
    pub retention_time: Option<f64>,
    /// Per-method scores keyed by the engine's short names
    #[serde(default)]
    pub scores: FnvHashMap<String, f64>,
    /// Raw native spectrum reference, e.g. `index=41` or `query=12`
    pub source_id: String,
    /// Spectrum title, when the source format carries one
    pub spectrum_title: Option<String>,
    /// Id of the `SpectraDataRef` this PSM's spectrum lives in. Absent when
    /// the assay has no separate spectral files
    pub spectra_data_ref: Option<String>,
    #[serde(default)]
    pub decoy: bool,
    #[serde(default)]
    pub missed_cleavages: u32,
    #[serde(default)]
    pub modifications: BTreeMap<u32, ModificationRef>,
}

/// A reported post-translational modification. An absent accession marks a
/// modification the engine could not map to a CV entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModificationRef {
    pub cv_label: Option<String>,
    pub accession: Option<String>,
    pub name: Option<String>,
    /// Monoisotopic mass delta
    pub mass: f64,
    pub neutral_loss: Option<CvTerm>,
    #[serde(default)]
    pub probabilities: Vec<CvTerm>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpectraDataRef {
    /// Id referenced by `ReportPsm::spectra_data_ref`
    pub id: String,
    /// File location as declared inside the result file
    pub location: String,
    pub id_format: NativeIdFormat,
    pub file_format: SpectrumFileFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpectrumFileFormat {
    Mgf,
    MzML,
    MzXml,
    Ms2,
    Apl,
    /// The identification/results file itself, used when an assay embeds
    /// its spectra in the results file
    Results,
}

impl SpectrumFileFormat {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let lower = lower.strip_suffix(".gz").unwrap_or(&lower);
        if lower.ends_with(".mgf") {
            Some(SpectrumFileFormat::Mgf)
        } else if lower.ends_with(".mzml") {
            Some(SpectrumFileFormat::MzML)
        } else if lower.ends_with(".mzxml") {
            Some(SpectrumFileFormat::MzXml)
        } else if lower.ends_with(".ms2") {
            Some(SpectrumFileFormat::Ms2)
        } else if lower.ends_with(".apl") {
            Some(SpectrumFileFormat::Apl)
        } else {
            None
        }
    }
}

/// One spectral file resolved to an on-disk path, ready for the index
#[derive(Clone, Debug)]
pub struct ResolvedSpectrumFile {
    pub path: String,
    pub id_format: NativeIdFormat,
    pub format: SpectrumFileFormat,
}

/// The set of spectral files one assay run reads from, keyed by the
/// declared `SpectraDataRef` id. When the assay declares no spectral files,
/// `embedded` holds the results file and PSMs are keyed by raw source id
#[derive(Clone, Debug, Default)]
pub struct SpectrumFilePlan {
    pub by_ref: FnvHashMap<String, ResolvedSpectrumFile>,
    pub embedded: Option<ResolvedSpectrumFile>,
}

impl InferenceResult {
    /// Filtered copy of this result: proteins by protein-level q-value,
    /// peptides by peptide-level q-value, PSMs by PSM-level q-value.
    /// Thresholds of 1.0 keep everything. Records without the relevant
    /// q-value are kept, since the threshold cannot judge them. Peptides
    /// whose PSMs were all rejected are retained - the quality gate's
    /// sanity check depends on seeing that imbalance
    pub fn apply_thresholds(&self, q_value: f64, protein_fdr: f64) -> InferenceResult {
        let proteins = self
            .proteins
            .iter()
            .filter(|protein| protein.q_value.map_or(true, |q| q <= protein_fdr))
            .map(|protein| {
                let peptides = protein
                    .peptides
                    .iter()
                    .filter(|peptide| peptide.q_value.map_or(true, |q| q <= q_value))
                    .map(|peptide| {
                        let psms = peptide
                            .psms
                            .iter()
                            .filter(|psm| {
                                psm.scores
                                    .get(crate::param::PSM_QVALUE_KEY)
                                    .map_or(true, |q| *q <= q_value)
                            })
                            .cloned()
                            .collect();
                        ReportPeptide {
                            psms,
                            ..peptide.clone()
                        }
                    })
                    .collect();
                ReportProtein {
                    peptides,
                    ..protein.clone()
                }
            })
            .collect();

        InferenceResult {
            proteins,
            spectra_data: self.spectra_data.clone(),
        }
    }

    /// Number of distinct peptides, deduplicated across proteins by
    /// stable string id
    pub fn peptide_count(&self) -> usize {
        let mut seen = FnvHashSet::default();
        for protein in &self.proteins {
            for peptide in &protein.peptides {
                seen.insert(peptide.string_id());
            }
        }
        seen.len()
    }

    /// Number of distinct PSMs, deduplicated by (source id, sequence)
    pub fn psm_count(&self) -> usize {
        self.distinct_psms(|_| true)
    }

    /// Number of distinct decoy PSMs
    pub fn decoy_psm_count(&self) -> usize {
        self.distinct_psms(|psm| psm.decoy)
    }

    fn distinct_psms<F: Fn(&ReportPsm) -> bool>(&self, keep: F) -> usize {
        let mut seen = FnvHashSet::default();
        for protein in &self.proteins {
            for peptide in &protein.peptides {
                for psm in &peptide.psms {
                    if keep(psm) {
                        seen.insert((psm.source_id.clone(), psm.sequence.clone()));
                    }
                }
            }
        }
        seen.len()
    }

    /// Assay-wide peptide list deduplicated by stable string id, first
    /// occurrence wins
    pub fn deduplicated_peptides(&self) -> FnvHashMap<String, &ReportPeptide> {
        let mut map: FnvHashMap<String, &ReportPeptide> = FnvHashMap::default();
        for protein in &self.proteins {
            for peptide in &protein.peptides {
                map.entry(peptide.string_id()).or_insert(peptide);
            }
        }
        map
    }

}
