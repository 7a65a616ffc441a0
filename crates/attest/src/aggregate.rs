//! Per-assay evidence aggregation: walks every accepted protein, its
//! peptides and their PSMs, resolving each PSM back to its originating
//! spectrum and handing the derived records to a checkpointed sink.
//!
//! Spectrum lookups are fanned out with rayon over peptides and, within a
//! peptide, over PSMs. A failed lookup skips that PSM only; the run always
//! carries on with the remaining records.

use crate::evidence::{
    peptide_accession, AssaySummary, PeptideEvidence, PeptideSpectrumOverview, ProteinEvidence,
    PsmEvidence,
};
use crate::mass::{delta_mz, DELTA_MZ_OUTLIER};
use crate::modification::{project_to_peptide_coordinates, project_to_protein_coordinates};
use crate::param::{
    CvTerm, BEST_SCORE_KEY, DELTA_MZ, PEPTIDE_FDRSCORE, PEPTIDE_FDRSCORE_KEY, PEPTIDE_QVALUE,
    PROTEIN_QVALUE, PROTEIN_SCORE, SCORE_METHODS,
};
use crate::quality::GateOutcome;
use crate::report::{
    ReportPeptide, ReportProtein, ReportPsm, ResolvedSpectrumFile, SpectrumFilePlan,
};
use crate::spectrum::SpectrumSource;
use crate::spectrum_id::{build_usi, resolve, ResolvedKey};
use fnv::FnvHashMap;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Everything scoped to one (project, assay) analysis run. Owned by the
/// run and torn down with it; no state survives between assays
#[derive(Clone, Debug)]
pub struct AssayContext {
    pub project_accession: String,
    pub assay_accession: String,
}

/// Outcome of a single document-store upsert. A duplicate key is a
/// successful no-op: the record already exists from a prior partial run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    AlreadyExists,
    Failed(String),
}

/// The document store seam, keyed by a natural key per record type
pub trait EvidenceStore: Sync {
    fn upsert_protein(&self, record: &ProteinEvidence) -> UpsertOutcome;
    fn upsert_peptide(&self, record: &PeptideEvidence) -> UpsertOutcome;
    fn upsert_psm(&self, record: &PsmEvidence) -> UpsertOutcome;
}

/// Where the aggregator hands finished records. Implementations must be
/// safe for concurrent calls with distinct keys
pub trait EvidenceSink: Sync {
    fn write_protein(&self, record: &ProteinEvidence) -> Result<(), SinkError>;
    fn write_peptide(&self, record: &PeptideEvidence) -> Result<(), SinkError>;
    fn write_psm(&self, record: &PsmEvidence) -> Result<(), SinkError>;
}

#[derive(Debug)]
pub enum SinkError {
    Backup(std::io::Error),
    Serialize(serde_json::Error),
    Store { key: String, reason: String },
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Backup(e) => write!(f, "backup write failed: {}", e),
            SinkError::Serialize(e) => write!(f, "record serialization failed: {}", e),
            SinkError::Store { key, reason } => {
                write!(f, "store upsert failed for {}: {}", key, reason)
            }
        }
    }
}

impl std::error::Error for SinkError {}

/// External protein-detail lookup, consulted only for proteins whose
/// sequence the result file did not carry
pub trait ProteinDetailLookup: Sync {
    fn details(&self, accessions: &[String]) -> FnvHashMap<String, String>;
}

/// Lookup that resolves nothing
pub struct NoDetailLookup;

impl ProteinDetailLookup for NoDetailLookup {
    fn details(&self, _accessions: &[String]) -> FnvHashMap<String, String> {
        FnvHashMap::default()
    }
}

/// Counts reported at the end of one aggregation run
#[derive(Clone, Debug)]
pub struct RunReport {
    pub summary: AssaySummary,
    pub proteins_written: usize,
    pub peptides_written: usize,
    pub psms_written: usize,
    /// PSMs skipped because their spectrum could not be resolved
    pub skipped_psms: usize,
    /// Records whose persistence failed (replayable from the backup trail)
    pub failed_records: usize,
    /// Peptide-local modifications with no protein anchor
    pub dropped_modifications: usize,
}

pub struct EvidenceAggregator<'a> {
    pub context: &'a AssayContext,
    pub plan: &'a SpectrumFilePlan,
    pub spectra: &'a dyn SpectrumSource,
    pub sink: &'a dyn EvidenceSink,
    pub details: &'a dyn ProteinDetailLookup,
}

struct Counters {
    resolved_psms: AtomicUsize,
    delta_outliers: AtomicUsize,
    skipped_psms: AtomicUsize,
    failed_records: AtomicUsize,
    peptides_written: AtomicUsize,
    psms_written: AtomicUsize,
}

impl Counters {
    fn new() -> Self {
        Counters {
            resolved_psms: AtomicUsize::new(0),
            delta_outliers: AtomicUsize::new(0),
            skipped_psms: AtomicUsize::new(0),
            failed_records: AtomicUsize::new(0),
            peptides_written: AtomicUsize::new(0),
            psms_written: AtomicUsize::new(0),
        }
    }
}

impl<'a> EvidenceAggregator<'a> {
    pub fn run(&self, gate: &GateOutcome) -> RunReport {
        let start = Instant::now();
        let result = &gate.result;
        let deduplicated = result.deduplicated_peptides();
        let counters = Counters::new();

        let missing: Vec<String> = result
            .proteins
            .iter()
            .filter(|protein| protein.sequence.is_none())
            .map(|protein| protein.accession.clone())
            .collect();
        let fetched = if missing.is_empty() {
            FnvHashMap::default()
        } else {
            log::info!("resolving {} protein sequences externally", missing.len());
            self.details.details(&missing)
        };

        let mut proteins_written = 0;
        let mut dropped_modifications = 0;

        for protein in &result.proteins {
            let sequence = protein
                .sequence
                .clone()
                .or_else(|| fetched.get(&protein.accession).cloned());

            let peptides: Vec<&ReportPeptide> = protein.peptides.iter().collect();
            let projection = project_to_protein_coordinates(
                &protein.accession,
                &peptides,
                sequence.as_ref().map(|s| s.len()),
            );
            dropped_modifications += projection.dropped;

            let record = self.protein_evidence(gate, protein, sequence, projection.modifications);
            match self.sink.write_protein(&record) {
                Ok(()) => proteins_written += 1,
                Err(e) => {
                    counters.failed_records.fetch_add(1, Ordering::Relaxed);
                    log::error!(
                        "protein evidence {}/{}/{} not persisted: {}",
                        self.context.project_accession,
                        self.context.assay_accession,
                        record.reported_accession,
                        e
                    );
                }
            }

            protein.peptides.par_iter().for_each(|peptide| {
                match deduplicated.get(&peptide.string_id()) {
                    Some(&global) => self.index_peptide(gate, protein, peptide, global, &counters),
                    None => log::warn!(
                        "peptide {} missing from the assay-wide peptide list",
                        peptide.sequence
                    ),
                }
            });
        }

        let resolved = counters.resolved_psms.load(Ordering::Relaxed);
        let outliers = counters.delta_outliers.load(Ordering::Relaxed);
        let delta_mass_error_rate = if resolved > 0 {
            outliers as f64 / resolved as f64
        } else {
            0.0
        };
        log::info!(
            "- delta mass rate: {:.5} ({} / {} psms)",
            delta_mass_error_rate,
            outliers,
            resolved
        );
        log::info!(
            "- indexed {} proteins in {}ms",
            proteins_written,
            start.elapsed().as_millis()
        );
        if dropped_modifications > 0 {
            log::info!(
                "- {} peptide modifications had no protein anchor and were not projected",
                dropped_modifications
            );
        }

        RunReport {
            summary: self.summary(gate, delta_mass_error_rate),
            proteins_written,
            peptides_written: counters.peptides_written.load(Ordering::Relaxed),
            psms_written: counters.psms_written.load(Ordering::Relaxed),
            skipped_psms: counters.skipped_psms.load(Ordering::Relaxed),
            failed_records: counters.failed_records.load(Ordering::Relaxed),
            dropped_modifications,
        }
    }

    fn protein_evidence(
        &self,
        gate: &GateOutcome,
        protein: &ReportProtein,
        sequence: Option<String>,
        ptms: Vec<crate::modification::ModificationEvidence>,
    ) -> ProteinEvidence {
        let mut additional_scores = Vec::new();
        let mut best_score = None;
        if let Some(q_value) = protein.q_value.filter(|q| q.is_finite()) {
            let term = CvTerm::with_value(&PROTEIN_QVALUE, q_value);
            best_score = Some(term.clone());
            additional_scores.push(term);
        }
        if let Some(score) = protein.score.filter(|s| s.is_finite()) {
            let term = CvTerm::with_value(&PROTEIN_SCORE, score);
            best_score = Some(term.clone());
            additional_scores.push(term);
        }

        let number_psms = protein.peptides.iter().map(|p| p.psms.len()).sum();
        let sequence_coverage = sequence_coverage(protein, sequence.as_deref());

        ProteinEvidence {
            reported_accession: protein.accession.clone(),
            is_decoy: protein.decoy,
            group_members: protein.group_members.clone(),
            sequence,
            best_score,
            additional_scores,
            project_accession: self.context.project_accession.clone(),
            assay_accession: self.context.assay_accession.clone(),
            ptms,
            number_peptides: protein.peptides.len(),
            number_psms,
            sequence_coverage,
            is_valid: gate.is_valid,
            quality_methods: gate.quality_methods.clone(),
        }
    }

    fn index_peptide(
        &self,
        gate: &GateOutcome,
        protein: &ReportProtein,
        peptide: &ReportPeptide,
        global: &ReportPeptide,
        counters: &Counters,
    ) {
        // Task-local accumulation: each PSM task returns its overview tuple
        // and the merge happens after the whole set completes
        let overview: Vec<PeptideSpectrumOverview> = global
            .psms
            .par_iter()
            .filter_map(|psm| self.resolve_psm(gate, peptide, global, psm, counters))
            .collect();

        let (start_position, end_position) = match global
            .occurrences
            .iter()
            .find(|occ| occ.accession.eq_ignore_ascii_case(&protein.accession))
        {
            Some(occurrence) => (
                occurrence.start.max(0) as u64,
                occurrence.end.max(0) as u64,
            ),
            None => {
                log::info!(
                    "no position for peptide {} within {}",
                    peptide.sequence,
                    protein.accession
                );
                (0, 0)
            }
        };

        let mut additional_scores = Vec::new();
        if let Some(q_value) = global.q_value.filter(|q| q.is_finite()) {
            additional_scores.push(CvTerm::with_value(&PEPTIDE_QVALUE, q_value));
        }
        if let Some(fdr_score) = global
            .scores
            .get(PEPTIDE_FDRSCORE_KEY)
            .filter(|s| s.is_finite())
        {
            additional_scores.push(CvTerm::with_value(&PEPTIDE_FDRSCORE, fdr_score));
        }

        let record = PeptideEvidence {
            project_accession: self.context.project_accession.clone(),
            assay_accession: self.context.assay_accession.clone(),
            protein_accession: protein.accession.clone(),
            peptide_accession: peptide_accession(&peptide.sequence, &peptide.modifications),
            peptide_sequence: peptide.sequence.clone(),
            is_decoy: global.decoy,
            start_position,
            end_position,
            missed_cleavages: global.missed_cleavages,
            ptms: project_to_peptide_coordinates(&global.modifications),
            psm_accessions: overview,
            additional_scores,
            is_valid: gate.is_valid,
            quality_methods: gate.quality_methods.clone(),
        };

        match self.sink.write_peptide(&record) {
            Ok(()) => {
                counters.peptides_written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed_records.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "peptide evidence {}/{}/{} not persisted: {}",
                    self.context.project_accession,
                    self.context.assay_accession,
                    record.peptide_accession,
                    e
                );
            }
        }
    }

    fn spectrum_file(&self, psm: &ReportPsm) -> Option<(&ResolvedSpectrumFile, bool)> {
        match &psm.spectra_data_ref {
            Some(ref_id) => self.plan.by_ref.get(ref_id).map(|file| (file, false)),
            None => self.plan.embedded.as_ref().map(|file| (file, true)),
        }
    }

    fn resolve_psm(
        &self,
        gate: &GateOutcome,
        peptide: &ReportPeptide,
        global: &ReportPeptide,
        psm: &ReportPsm,
        counters: &Counters,
    ) -> Option<PeptideSpectrumOverview> {
        let (file, embedded) = match self.spectrum_file(psm) {
            Some(found) => found,
            None => {
                counters.skipped_psms.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "skipping psm {}: no spectral file for reference {:?}",
                    psm.source_id,
                    psm.spectra_data_ref
                );
                return None;
            }
        };

        // An assay without separate spectral files keys the results file
        // by the PSM's own raw source id
        let key = if embedded {
            ResolvedKey::Native(psm.source_id.clone())
        } else {
            resolve(file.id_format, &psm.source_id, psm.spectrum_title.as_deref())
        };

        let spectrum = match self.spectra.spectrum(&file.path, &key) {
            Ok(spectrum) => spectrum,
            Err(e) => {
                counters.skipped_psms.fetch_add(1, Ordering::Relaxed);
                log::warn!("skipping psm {}: {}", psm.source_id, e);
                return None;
            }
        };

        counters.resolved_psms.fetch_add(1, Ordering::Relaxed);
        let usi = build_usi(
            &self.context.project_accession,
            &file.path,
            file.id_format,
            &key,
        );

        let mut scores = Vec::new();
        let mut best_search_engine_score = None;
        for (method, reference) in SCORE_METHODS {
            if let Some(value) = psm.scores.get(*method).filter(|v| v.is_finite()) {
                let term = CvTerm::with_value(reference, value);
                if *method == BEST_SCORE_KEY {
                    best_search_engine_score = Some(term.clone());
                }
                scores.push(term);
            }
        }
        if let Some(q_value) = global.q_value.filter(|q| q.is_finite()) {
            scores.push(CvTerm::with_value(&PEPTIDE_QVALUE, q_value));
        }

        let modification_masses: Vec<f64> =
            psm.modifications.values().map(|m| m.mass).collect();
        let delta_mass = delta_mz(
            psm.mass_to_charge,
            &psm.sequence,
            psm.charge,
            &modification_masses,
        );
        if let Some(delta) = delta_mass {
            if delta.abs() > DELTA_MZ_OUTLIER {
                counters.delta_outliers.fetch_add(1, Ordering::Relaxed);
            }
            scores.push(CvTerm::with_value(&DELTA_MZ, delta));
        }

        let (masses, intensities): (Vec<f64>, Vec<f64>) = spectrum.peaks.iter().copied().unzip();
        let record = PsmEvidence {
            usi: usi.clone(),
            project_accession: self.context.project_accession.clone(),
            assay_accession: self.context.assay_accession.clone(),
            peptide_sequence: psm.sequence.clone(),
            peptide_accession: peptide_accession(&peptide.sequence, &peptide.modifications),
            spectrum_file: crate::spectrum_id::base_name(&file.path).to_string(),
            is_decoy: psm.decoy,
            charge: psm.charge,
            precursor_mz: spectrum.precursor_mz.unwrap_or(psm.mass_to_charge),
            retention_time: psm.retention_time,
            ms_level: spectrum.ms_level,
            num_peaks: masses.len(),
            masses,
            intensities,
            scores,
            best_search_engine_score,
            delta_mass,
            modifications: project_to_peptide_coordinates(&psm.modifications),
            missed_cleavages: psm.missed_cleavages,
            is_valid: gate.is_valid,
            quality_methods: gate.quality_methods.clone(),
        };

        match self.sink.write_psm(&record) {
            Ok(()) => {
                counters.psms_written.fetch_add(1, Ordering::Relaxed);
                Some(PeptideSpectrumOverview {
                    usi,
                    charge: psm.charge,
                    precursor_mass: psm.mass_to_charge,
                })
            }
            Err(e) => {
                counters.failed_records.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "psm evidence {}/{}/{} not persisted: {}",
                    self.context.project_accession,
                    self.context.assay_accession,
                    record.usi,
                    e
                );
                None
            }
        }
    }

    fn summary(&self, gate: &GateOutcome, delta_mass_error_rate: f64) -> AssaySummary {
        let mut modification_counts: Vec<(CvTerm, usize)> = Vec::new();
        let mut number_modified_peptides = 0;
        if gate.is_valid {
            for peptide in gate.result.deduplicated_peptides().values() {
                if peptide.modifications.is_empty() {
                    continue;
                }
                number_modified_peptides += 1;
                for modification in peptide.modifications.values() {
                    let accession = modification.accession.as_deref().unwrap_or_default();
                    match modification_counts
                        .iter_mut()
                        .find(|(term, _)| term.accession == accession)
                    {
                        Some((_, count)) => *count += 1,
                        None => modification_counts.push((
                            CvTerm {
                                cv_label: modification.cv_label.clone().unwrap_or_default(),
                                accession: accession.to_string(),
                                name: modification.name.clone().unwrap_or_default(),
                                value: Some(modification.mass.to_string()),
                            },
                            1,
                        )),
                    }
                }
            }
        }

        AssaySummary {
            project_accession: self.context.project_accession.clone(),
            assay_accession: self.context.assay_accession.clone(),
            number_proteins: gate.high_quality_proteins,
            number_peptides: gate.high_quality_peptides,
            number_psms: gate.high_quality_psms,
            number_modified_peptides,
            modification_counts,
            is_valid: gate.is_valid,
            quality_methods: gate.quality_methods.clone(),
            delta_mass_error_rate,
        }
    }
}

/// Fraction of the protein sequence covered by at least one peptide
/// occurrence. Zero when no sequence is known
pub fn sequence_coverage(protein: &ReportProtein, sequence: Option<&str>) -> f64 {
    let length = match sequence {
        Some(sequence) if !sequence.is_empty() => sequence.len() as i64,
        _ => return 0.0,
    };

    let mut intervals: Vec<(i64, i64)> = protein
        .peptides
        .iter()
        .flat_map(|peptide| peptide.occurrences.iter())
        .filter(|occ| occ.accession.eq_ignore_ascii_case(&protein.accession) && occ.start > 0)
        .map(|occ| (occ.start, occ.end.min(length)))
        .filter(|(start, end)| end >= start)
        .collect();
    intervals.sort_unstable();

    let mut covered = 0i64;
    let mut cursor = 0i64;
    for (start, end) in intervals {
        let start = start.max(cursor + 1);
        if end >= start {
            covered += end - start + 1;
            cursor = end;
        } else {
            cursor = cursor.max(end);
        }
    }
    covered as f64 / length as f64
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::quality::QualityGate;
    use crate::report::{
        AccessionOccurrence, InferenceResult, ModificationRef, SpectraDataRef, SpectrumFileFormat,
    };
    use crate::spectrum::{Spectrum, SpectrumLookupError};
    use crate::spectrum_id::NativeIdFormat;
    use std::sync::Mutex;

    struct StubSource;

    impl SpectrumSource for StubSource {
        fn spectrum(
            &self,
            _path: &str,
            key: &ResolvedKey,
        ) -> Result<Spectrum, SpectrumLookupError> {
            match key {
                ResolvedKey::Index(42) => Ok(Spectrum {
                    ms_level: 2,
                    precursor_mz: Some(400.68),
                    precursor_charge: Some(2),
                    peaks: vec![(101.0, 5.0), (202.0, 10.0)],
                }),
                other => Err(SpectrumLookupError::KeyNotFound {
                    path: "run1.mzml".into(),
                    key: other.clone(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct MemorySink {
        proteins: Mutex<Vec<ProteinEvidence>>,
        peptides: Mutex<Vec<PeptideEvidence>>,
        psms: Mutex<Vec<PsmEvidence>>,
    }

    impl EvidenceSink for MemorySink {
        fn write_protein(&self, record: &ProteinEvidence) -> Result<(), SinkError> {
            self.proteins.lock().unwrap().push(record.clone());
            Ok(())
        }
        fn write_peptide(&self, record: &PeptideEvidence) -> Result<(), SinkError> {
            self.peptides.lock().unwrap().push(record.clone());
            Ok(())
        }
        fn write_psm(&self, record: &PsmEvidence) -> Result<(), SinkError> {
            self.psms.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn scenario() -> InferenceResult {
        let mut modifications = std::collections::BTreeMap::new();
        modifications.insert(
            2,
            ModificationRef {
                cv_label: Some("MOD".into()),
                accession: Some("MOD:1".into()),
                name: Some("test modification".into()),
                mass: 79.96633,
                neutral_loss: None,
                probabilities: Vec::new(),
            },
        );
        let mut scores = fnv::FnvHashMap::default();
        scores.insert(crate::param::PSM_QVALUE_KEY.to_string(), 0.001);
        scores.insert(BEST_SCORE_KEY.to_string(), 0.002);

        InferenceResult {
            proteins: vec![
                ReportProtein {
                    accession: "P1".into(),
                    group_members: vec!["P1-2".into()],
                    decoy: false,
                    sequence: Some("PEPTIDEKK".into()),
                    score: Some(12.5),
                    q_value: Some(0.001),
                    peptides: vec![ReportPeptide {
                        sequence: "PEPTIDE".into(),
                        decoy: false,
                        q_value: Some(0.001),
                        scores: Default::default(),
                        missed_cleavages: 0,
                        modifications: modifications.clone(),
                        occurrences: vec![AccessionOccurrence {
                            accession: "P1".into(),
                            start: 1,
                            end: 7,
                        }],
                        psms: vec![ReportPsm {
                            sequence: "PEPTIDE".into(),
                            charge: 2,
                            mass_to_charge: 440.67,
                            retention_time: Some(1200.0),
                            scores,
                            source_id: "index=41".into(),
                            spectrum_title: None,
                            spectra_data_ref: Some("SD1".into()),
                            decoy: false,
                            missed_cleavages: 0,
                            modifications,
                        }],
                    }],
                },
                // decoy protein so the gate accepts the thresholded report
                ReportProtein {
                    accession: "DECOY_P9".into(),
                    group_members: Vec::new(),
                    decoy: true,
                    sequence: None,
                    score: None,
                    q_value: Some(0.002),
                    peptides: vec![ReportPeptide {
                        sequence: "ELVISK".into(),
                        decoy: true,
                        q_value: Some(0.003),
                        scores: Default::default(),
                        missed_cleavages: 0,
                        modifications: Default::default(),
                        occurrences: Vec::new(),
                        psms: vec![ReportPsm {
                            sequence: "ELVISK".into(),
                            charge: 2,
                            mass_to_charge: 351.2,
                            retention_time: None,
                            scores: Default::default(),
                            source_id: "index=7".into(),
                            spectrum_title: None,
                            spectra_data_ref: Some("SD1".into()),
                            decoy: true,
                            missed_cleavages: 0,
                            modifications: Default::default(),
                        }],
                    }],
                },
            ],
            spectra_data: vec![SpectraDataRef {
                id: "SD1".into(),
                location: "run1.mzml".into(),
                id_format: NativeIdFormat::MultiPeakListNativeId,
                file_format: SpectrumFileFormat::MzML,
            }],
        }
    }

    #[test]
    fn end_to_end_protein_peptide_psm() {
        let result = scenario();
        let gate = QualityGate {
            q_value_threshold: 0.01,
            protein_fdr_threshold: 1.0,
        }
        .apply(&result);
        assert!(gate.is_valid);

        let mut plan = SpectrumFilePlan::default();
        plan.by_ref.insert(
            "SD1".into(),
            ResolvedSpectrumFile {
                path: "run1.mzml".into(),
                id_format: NativeIdFormat::MultiPeakListNativeId,
                format: SpectrumFileFormat::MzML,
            },
        );

        let context = AssayContext {
            project_accession: "PXD000001".into(),
            assay_accession: "12345".into(),
        };
        let sink = MemorySink::default();
        let aggregator = EvidenceAggregator {
            context: &context,
            plan: &plan,
            spectra: &StubSource,
            sink: &sink,
            details: &NoDetailLookup,
        };
        let report = aggregator.run(&gate);

        assert_eq!(report.proteins_written, 2);
        assert_eq!(report.peptides_written, 2);
        // the decoy psm (index=7 -> 8) is absent from the stub source
        assert_eq!(report.psms_written, 1);
        assert_eq!(report.skipped_psms, 1);

        let psms = sink.psms.lock().unwrap();
        assert_eq!(psms[0].usi, "mzspec:PXD000001:run1.mzml:INDEX:42");
        assert_eq!(psms[0].num_peaks, 2);
        assert!(psms[0].is_valid);
        assert!(psms[0].best_search_engine_score.is_some());

        let proteins = sink.proteins.lock().unwrap();
        let p1 = proteins
            .iter()
            .find(|p| p.reported_accession == "P1")
            .unwrap();
        // local position 2 at occurrence start 1: protein position 2
        assert_eq!(p1.ptms[0].positions[0].position, 2);
        assert_eq!(p1.number_peptides, 1);
        assert_eq!(p1.number_psms, 1);
        assert!((p1.sequence_coverage - 7.0 / 9.0).abs() < 1e-9);

        let peptides = sink.peptides.lock().unwrap();
        let pep = peptides
            .iter()
            .find(|p| p.peptide_sequence == "PEPTIDE")
            .unwrap();
        assert_eq!(pep.psm_accessions.len(), 1);
        assert_eq!(pep.psm_accessions[0].usi, psms[0].usi);
        assert_eq!(pep.start_position, 1);
        assert_eq!(pep.end_position, 7);
    }

    #[test]
    fn coverage_merges_overlapping_occurrences() {
        let mut protein = scenario().proteins.remove(0);
        protein.peptides[0].occurrences.push(AccessionOccurrence {
            accession: "P1".into(),
            start: 5,
            end: 9,
        });
        let coverage = sequence_coverage(&protein, Some("PEPTIDEKK"));
        assert!((coverage - 1.0).abs() < 1e-9);
    }
}
