//! Derived evidence records, created once per (project, assay) run and
//! persisted idempotently. Field sets mirror what the downstream document
//! store indexes.

use crate::modification::ModificationEvidence;
use crate::param::CvTerm;
use crate::report::ModificationRef;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProteinEvidence {
    pub reported_accession: String,
    pub is_decoy: bool,
    pub group_members: Vec<String>,
    pub sequence: Option<String>,
    pub best_score: Option<CvTerm>,
    pub additional_scores: Vec<CvTerm>,
    pub project_accession: String,
    pub assay_accession: String,
    pub ptms: Vec<ModificationEvidence>,
    /// Exact count of peptides aggregated into this protein in this run
    pub number_peptides: usize,
    /// Exact count of PSMs aggregated into this protein in this run
    pub number_psms: usize,
    /// Fraction of the protein sequence covered by its peptides
    pub sequence_coverage: f64,
    pub is_valid: bool,
    pub quality_methods: Vec<CvTerm>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeptideEvidence {
    pub project_accession: String,
    pub assay_accession: String,
    pub protein_accession: String,
    /// Deterministic hash of sequence + modifications
    pub peptide_accession: String,
    pub peptide_sequence: String,
    pub is_decoy: bool,
    /// 1-based protein-global start/end of this peptide, zero when the
    /// engine reported no occurrence for the protein
    pub start_position: u64,
    pub end_position: u64,
    pub missed_cleavages: u32,
    pub ptms: Vec<ModificationEvidence>,
    pub psm_accessions: Vec<PeptideSpectrumOverview>,
    pub additional_scores: Vec<CvTerm>,
    pub is_valid: bool,
    pub quality_methods: Vec<CvTerm>,
}

/// Compact (usi, charge, precursor mass) reference from a peptide to one
/// of its spectra
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeptideSpectrumOverview {
    pub usi: String,
    pub charge: i32,
    pub precursor_mass: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PsmEvidence {
    /// Universal Spectrum Identifier, the record's primary key
    pub usi: String,
    pub project_accession: String,
    pub assay_accession: String,
    pub peptide_sequence: String,
    /// Hash of sequence + modifications, shared with the peptide record
    pub peptide_accession: String,
    pub spectrum_file: String,
    pub is_decoy: bool,
    pub charge: i32,
    pub precursor_mz: f64,
    pub retention_time: Option<f64>,
    pub ms_level: u8,
    pub masses: Vec<f64>,
    pub intensities: Vec<f64>,
    pub num_peaks: usize,
    pub scores: Vec<CvTerm>,
    pub best_search_engine_score: Option<CvTerm>,
    /// Observed minus theoretical precursor m/z, when computable
    pub delta_mass: Option<f64>,
    pub modifications: Vec<ModificationEvidence>,
    pub missed_cleavages: u32,
    pub is_valid: bool,
    pub quality_methods: Vec<CvTerm>,
}

/// Assay-level rollup produced at the end of a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssaySummary {
    pub project_accession: String,
    pub assay_accession: String,
    pub number_proteins: usize,
    pub number_peptides: usize,
    pub number_psms: usize,
    pub number_modified_peptides: usize,
    /// Occurrence count per modification type across peptides
    pub modification_counts: Vec<(CvTerm, usize)>,
    pub is_valid: bool,
    pub quality_methods: Vec<CvTerm>,
    /// Fraction of resolved PSMs whose precursor delta exceeded the
    /// outlier bound. Diagnostic only
    pub delta_mass_error_rate: f64,
}

/// Deterministic peptide accession: SHA-256 over the sequence and the
/// ordered (position, accession, mass) modification triples
pub fn peptide_accession(sequence: &str, modifications: &BTreeMap<u32, ModificationRef>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sequence.as_bytes());
    for (position, modification) in modifications {
        hasher.update(position.to_string().as_bytes());
        hasher.update(modification.accession.as_deref().unwrap_or("-").as_bytes());
        hasher.update(modification.mass.to_string().as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn modification(accession: &str) -> ModificationRef {
        ModificationRef {
            cv_label: Some("UNIMOD".into()),
            accession: Some(accession.into()),
            name: None,
            mass: 79.96633,
            neutral_loss: None,
            probabilities: Vec::new(),
        }
    }

    #[test]
    fn peptide_accessions_are_stable_and_distinct() {
        let bare = BTreeMap::new();
        let mut modified = BTreeMap::new();
        modified.insert(2, modification("UNIMOD:21"));

        assert_eq!(
            peptide_accession("PEPTIDE", &bare),
            peptide_accession("PEPTIDE", &bare)
        );
        assert_ne!(
            peptide_accession("PEPTIDE", &bare),
            peptide_accession("PEPTIDE", &modified)
        );
        assert_ne!(
            peptide_accession("PEPTIDE", &bare),
            peptide_accession("PEPTIDES", &bare)
        );

        let mut shifted = BTreeMap::new();
        shifted.insert(3, modification("UNIMOD:21"));
        assert_ne!(
            peptide_accession("PEPTIDE", &modified),
            peptide_accession("PEPTIDE", &shifted)
        );
    }
}
