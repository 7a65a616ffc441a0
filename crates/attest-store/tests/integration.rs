//! End-to-end: inference report -> quality gate -> spectrum index ->
//! evidence aggregation -> checkpointed persistence, plus the crash
//! recovery paths (idempotent re-run, replay from backup files).

use attest_core::aggregate::{AssayContext, EvidenceAggregator, NoDetailLookup};
use attest_core::quality::QualityGate;
use attest_core::report::{
    AccessionOccurrence, InferenceResult, ModificationRef, ReportPeptide, ReportProtein,
    ReportPsm, SpectraDataRef, SpectrumFileFormat,
};
use attest_core::spectrum_id::NativeIdFormat;
use attest_store::checkpoint::{restore_all, restore_assay, CheckpointedWriter};
use attest_store::fs_store::FsEvidenceStore;
use attest_store::index::{combine_spectrum_files, SpectrumFileIndex};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "attest-it-{}-{}-{}",
        tag,
        std::process::id(),
        DIR_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// 42 tiny spectra so that `index=41` (0-based) resolves to query 42
fn write_mgf(dir: &PathBuf) -> String {
    let path = dir.join("run1.mgf");
    let mut file = std::fs::File::create(&path).unwrap();
    for i in 0..42 {
        writeln!(file, "BEGIN IONS").unwrap();
        writeln!(file, "TITLE=query_{}", i).unwrap();
        writeln!(file, "PEPMASS=4{}.5", i).unwrap();
        writeln!(file, "CHARGE=2+").unwrap();
        writeln!(file, "10{}.0 1.0", i).unwrap();
        writeln!(file, "20{}.0 2.0", i).unwrap();
        writeln!(file, "END IONS").unwrap();
    }
    path.to_str().unwrap().to_string()
}

fn modification() -> ModificationRef {
    ModificationRef {
        cv_label: Some("MOD".into()),
        accession: Some("MOD:1".into()),
        name: Some("test modification".into()),
        mass: 79.96633,
        neutral_loss: None,
        probabilities: Vec::new(),
    }
}

fn report() -> InferenceResult {
    let mut modifications = std::collections::BTreeMap::new();
    modifications.insert(2, modification());

    let mut scores = fnv::FnvHashMap::default();
    scores.insert("psm_q_value".to_string(), 0.001);
    scores.insert("psm_fdr_score".to_string(), 0.002);

    InferenceResult {
        proteins: vec![
            ReportProtein {
                accession: "P1".into(),
                group_members: Vec::new(),
                decoy: false,
                sequence: Some("PEPTIDEKK".into()),
                score: Some(10.0),
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
                        retention_time: Some(88.2),
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
            ReportProtein {
                accession: "DECOY_P2".into(),
                group_members: Vec::new(),
                decoy: true,
                sequence: None,
                score: None,
                q_value: Some(0.004),
                peptides: vec![ReportPeptide {
                    sequence: "ELVISK".into(),
                    decoy: true,
                    q_value: Some(0.004),
                    scores: Default::default(),
                    missed_cleavages: 1,
                    modifications: Default::default(),
                    occurrences: Vec::new(),
                    psms: vec![ReportPsm {
                        sequence: "ELVISK".into(),
                        charge: 2,
                        mass_to_charge: 344.72,
                        retention_time: None,
                        scores: Default::default(),
                        source_id: "index=7".into(),
                        spectrum_title: None,
                        spectra_data_ref: Some("SD1".into()),
                        decoy: true,
                        missed_cleavages: 1,
                        modifications: Default::default(),
                    }],
                }],
            },
        ],
        spectra_data: vec![SpectraDataRef {
            id: "SD1".into(),
            location: "file:///submitted/run1.mgf".into(),
            id_format: NativeIdFormat::MultiPeakListNativeId,
            file_format: SpectrumFileFormat::Mgf,
        }],
    }
}

struct Run {
    backup_root: PathBuf,
    store_root: PathBuf,
    plan: attest_core::report::SpectrumFilePlan,
    gate: attest_core::quality::GateOutcome,
    context: AssayContext,
}

fn setup(tag: &str) -> Run {
    let spectra_dir = scratch_dir(&format!("{}-spectra", tag));
    write_mgf(&spectra_dir);
    let build_path = format!("{}/", spectra_dir.to_str().unwrap());

    let result = report();
    let plan = combine_spectrum_files(&build_path, &[], &result.spectra_data);
    let gate = QualityGate {
        q_value_threshold: 0.01,
        protein_fdr_threshold: 1.0,
    }
    .apply(&result);
    assert!(gate.is_valid);

    Run {
        backup_root: scratch_dir(&format!("{}-backup", tag)),
        store_root: scratch_dir(&format!("{}-store", tag)),
        plan,
        gate,
        context: AssayContext {
            project_accession: "PXD000001".into(),
            assay_accession: "12345".into(),
        },
    }
}

fn aggregate(run: &Run, store: &FsEvidenceStore) -> attest_core::aggregate::RunReport {
    let index = SpectrumFileIndex::build(&run.plan).unwrap();
    let sink = CheckpointedWriter::create(
        &run.backup_root,
        store,
        &run.context.project_accession,
        &run.context.assay_accession,
    )
    .unwrap();
    let aggregator = EvidenceAggregator {
        context: &run.context,
        plan: &run.plan,
        spectra: &index,
        sink: &sink,
        details: &NoDetailLookup,
    };
    aggregator.run(&run.gate)
}

#[test]
fn aggregation_persists_all_records() {
    let run = setup("full");
    let store = FsEvidenceStore::open(&run.store_root).unwrap();
    let report = aggregate(&run, &store);

    assert_eq!(report.proteins_written, 2);
    assert_eq!(report.peptides_written, 2);
    assert_eq!(report.psms_written, 2);
    assert_eq!(report.skipped_psms, 0);
    assert_eq!(report.failed_records, 0);

    assert_eq!(store.count("proteins").unwrap(), 2);
    assert_eq!(store.count("peptides").unwrap(), 2);
    assert_eq!(store.count("psms").unwrap(), 2);

    // the expected usi appears verbatim in the psm backup file
    let backup = attest_store::backup::backup_file(
        &run.backup_root,
        "PXD000001",
        "12345",
        attest_store::backup::RecordType::Psm,
    );
    let records: Vec<attest_core::evidence::PsmEvidence> =
        attest_store::backup::read_records(&backup).unwrap();
    assert!(records
        .iter()
        .any(|r| r.usi == "mzspec:PXD000001:run1.mgf:INDEX:42"));
}

#[test]
fn rerunning_an_assay_is_idempotent() {
    let run = setup("rerun");
    let store = FsEvidenceStore::open(&run.store_root).unwrap();

    let first = aggregate(&run, &store);
    let after_first = store.total().unwrap();
    assert_eq!(first.failed_records, 0);

    // second run: every upsert is a duplicate-key no-op
    let second = aggregate(&run, &store);
    assert_eq!(second.failed_records, 0);
    assert_eq!(second.psms_written, first.psms_written);
    assert_eq!(store.total().unwrap(), after_first);
}

#[test]
fn backup_replay_reconstructs_the_store() {
    let run = setup("replay");
    let store = FsEvidenceStore::open(&run.store_root).unwrap();
    aggregate(&run, &store);
    let expected = store.total().unwrap();

    // a fresh store rebuilt purely from the backup trail
    let rebuilt_root = scratch_dir("replay-rebuilt");
    let rebuilt = FsEvidenceStore::open(&rebuilt_root).unwrap();
    let report = restore_assay(&rebuilt, &run.backup_root, "PXD000001", "12345").unwrap();
    assert_eq!(report.proteins, 2);
    assert_eq!(report.peptides, 2);
    assert_eq!(report.psms, 2);
    assert_eq!(rebuilt.total().unwrap(), expected);

    // replaying again on top changes nothing
    let again = restore_assay(&rebuilt, &run.backup_root, "PXD000001", "12345").unwrap();
    assert_eq!(again.proteins, 2);
    assert_eq!(rebuilt.total().unwrap(), expected);

    // the directory-scoped variant finds the same files
    let swept_root = scratch_dir("replay-swept");
    let swept = FsEvidenceStore::open(&swept_root).unwrap();
    let report = restore_all(&swept, &run.backup_root).unwrap();
    assert_eq!(report.psms, 2);
    assert_eq!(swept.total().unwrap(), expected);
}
