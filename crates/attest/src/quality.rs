//! Assay-level FDR gating. The thresholded report is accepted only when the
//! decoy-based sanity conditions hold; otherwise every downstream step works
//! from the unfiltered report. The fallback is an intentional policy, not a
//! failure.

use crate::param::{CvTerm, DECOY_VALIDATION};
use crate::report::InferenceResult;

#[derive(Copy, Clone, Debug)]
pub struct QualityGate {
    pub q_value_threshold: f64,
    pub protein_fdr_threshold: f64,
}

/// The gate's decision for one assay run. `result` is the effective report
/// the aggregator indexes; `is_valid` is assay-wide and stamped uniformly
/// onto every evidence record of the run
#[derive(Clone, Debug)]
pub struct GateOutcome {
    pub result: InferenceResult,
    pub is_valid: bool,
    pub decoy_psms: usize,
    /// Counts of the accepted (high-quality) sets, zero when the gate
    /// fell back
    pub high_quality_proteins: usize,
    pub high_quality_peptides: usize,
    pub high_quality_psms: usize,
    pub quality_methods: Vec<CvTerm>,
}

impl QualityGate {
    pub fn apply(&self, unfiltered: &InferenceResult) -> GateOutcome {
        let all = unfiltered.apply_thresholds(1.0, 1.0);
        let high_quality =
            unfiltered.apply_thresholds(self.q_value_threshold, self.protein_fdr_threshold);

        let decoy_psms = all.decoy_psm_count();
        let proteins = high_quality.proteins.len();
        let peptides = high_quality.peptide_count();
        let psms = high_quality.psm_count();

        // The filtered report is only trustworthy when decoys were present
        // to estimate FDR from, every level is non-empty, and the PSM set
        // is at least as large as the peptide set
        let is_valid =
            decoy_psms > 0 && proteins > 0 && peptides > 0 && psms > 0 && psms >= peptides;

        let result = if is_valid {
            high_quality
        } else {
            log::info!(
                "threshold q={} fdr={} produced no usable set ({} decoys, {} proteins, {} peptides, {} psms); indexing unfiltered report",
                self.q_value_threshold,
                self.protein_fdr_threshold,
                decoy_psms,
                proteins,
                peptides,
                psms
            );
            all
        };

        GateOutcome {
            result,
            is_valid,
            decoy_psms,
            high_quality_proteins: if is_valid { proteins } else { 0 },
            high_quality_peptides: if is_valid { peptides } else { 0 },
            high_quality_psms: if is_valid { psms } else { 0 },
            quality_methods: vec![CvTerm::with_value(&DECOY_VALIDATION, is_valid)],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::report::{ReportPeptide, ReportProtein, ReportPsm};

    fn psm(source_id: &str, sequence: &str, q: f64, decoy: bool) -> ReportPsm {
        let mut scores = fnv::FnvHashMap::default();
        scores.insert(crate::param::PSM_QVALUE_KEY.to_string(), q);
        ReportPsm {
            sequence: sequence.into(),
            charge: 2,
            mass_to_charge: 450.0,
            retention_time: None,
            scores,
            source_id: source_id.into(),
            spectrum_title: None,
            spectra_data_ref: None,
            decoy,
            missed_cleavages: 0,
            modifications: Default::default(),
        }
    }

    fn result(
        proteins: usize,
        peptides_per_protein: usize,
        psms_per_peptide: usize,
        decoys: usize,
    ) -> InferenceResult {
        let mut decoys_left = decoys;
        let proteins = (0..proteins)
            .map(|p| {
                let peptides = (0..peptides_per_protein)
                    .map(|i| {
                        let sequence = format!("PEPTIDEK{}N{}", p, i);
                        let psms = (0..psms_per_peptide)
                            .map(|j| {
                                let decoy = decoys_left > 0;
                                if decoy {
                                    decoys_left -= 1;
                                }
                                psm(
                                    &format!("index={}{}{}", p, i, j),
                                    &sequence,
                                    0.001,
                                    decoy,
                                )
                            })
                            .collect();
                        ReportPeptide {
                            sequence,
                            decoy: false,
                            q_value: Some(0.001),
                            scores: Default::default(),
                            missed_cleavages: 0,
                            modifications: Default::default(),
                            occurrences: Vec::new(),
                            psms,
                        }
                    })
                    .collect();
                ReportProtein {
                    accession: format!("P{}", p),
                    group_members: Vec::new(),
                    decoy: false,
                    sequence: None,
                    score: None,
                    q_value: Some(0.001),
                    peptides,
                }
            })
            .collect();
        InferenceResult {
            proteins,
            spectra_data: Vec::new(),
        }
    }

    #[test]
    fn no_decoys_falls_back_to_unfiltered() {
        let gate = QualityGate {
            q_value_threshold: 0.01,
            protein_fdr_threshold: 1.0,
        };
        let outcome = gate.apply(&result(5, 2, 2, 0));
        assert!(!outcome.is_valid);
        assert_eq!(outcome.high_quality_proteins, 0);
        // fallback still carries the full unfiltered report
        assert_eq!(outcome.result.proteins.len(), 5);
        assert_eq!(
            outcome.quality_methods[0].value.as_deref(),
            Some("false")
        );
    }

    #[test]
    fn decoys_and_consistent_counts_are_accepted() {
        let gate = QualityGate {
            q_value_threshold: 0.01,
            protein_fdr_threshold: 1.0,
        };
        // 10 proteins x 2 peptides x 2 psms, 3 decoys: psms >= peptides
        let outcome = gate.apply(&result(10, 2, 2, 3));
        assert!(outcome.is_valid);
        assert_eq!(outcome.high_quality_proteins, 10);
        assert_eq!(outcome.high_quality_peptides, 20);
        assert_eq!(outcome.high_quality_psms, 40);
        assert_eq!(outcome.quality_methods[0].value.as_deref(), Some("true"));
    }

    #[test]
    fn fewer_psms_than_peptides_is_rejected() {
        let gate = QualityGate {
            q_value_threshold: 0.01,
            protein_fdr_threshold: 1.0,
        };
        // every peptide's psm fails the threshold, so the filtered report
        // has peptides but no psms
        let mut source = result(3, 2, 1, 2);
        for protein in &mut source.proteins {
            for peptide in &mut protein.peptides {
                for psm in &mut peptide.psms {
                    psm.scores
                        .insert(crate::param::PSM_QVALUE_KEY.to_string(), 0.5);
                }
            }
        }
        let outcome = gate.apply(&source);
        assert!(!outcome.is_valid);
        assert_eq!(outcome.high_quality_psms, 0);
    }
}
