//! Checkpointed evidence persistence: every record lands in the backup
//! trail first, then in the document store. A duplicate key from the store
//! means a prior partial run already persisted the record and is a
//! successful no-op, which makes whole-assay re-runs safe.

use crate::backup::{backup_file, read_records, BackupError, BackupWriter, RecordType};
use attest_core::aggregate::{EvidenceSink, EvidenceStore, SinkError, UpsertOutcome};
use attest_core::evidence::{PeptideEvidence, ProteinEvidence, PsmEvidence};
use std::path::Path;

pub struct CheckpointedWriter<'a> {
    backup: BackupWriter,
    store: &'a dyn EvidenceStore,
}

impl<'a> CheckpointedWriter<'a> {
    pub fn create(
        backup_root: &Path,
        store: &'a dyn EvidenceStore,
        project: &str,
        assay: &str,
    ) -> Result<Self, BackupError> {
        Ok(CheckpointedWriter {
            backup: BackupWriter::create(backup_root, project, assay)?,
            store,
        })
    }
}

fn sink_error(e: BackupError) -> SinkError {
    match e {
        BackupError::Io(_, e) => SinkError::Backup(e),
        BackupError::Json(e) => SinkError::Serialize(e),
    }
}

fn finish(outcome: UpsertOutcome, key: &str) -> Result<(), SinkError> {
    match outcome {
        UpsertOutcome::Inserted => Ok(()),
        UpsertOutcome::AlreadyExists => {
            log::debug!("{} already present in the store", key);
            Ok(())
        }
        UpsertOutcome::Failed(reason) => Err(SinkError::Store {
            key: key.to_string(),
            reason,
        }),
    }
}

impl EvidenceSink for CheckpointedWriter<'_> {
    fn write_protein(&self, record: &ProteinEvidence) -> Result<(), SinkError> {
        self.backup.write_protein(record).map_err(sink_error)?;
        finish(self.store.upsert_protein(record), &record.reported_accession)
    }

    fn write_peptide(&self, record: &PeptideEvidence) -> Result<(), SinkError> {
        self.backup.write_peptide(record).map_err(sink_error)?;
        finish(self.store.upsert_peptide(record), &record.peptide_accession)
    }

    fn write_psm(&self, record: &PsmEvidence) -> Result<(), SinkError> {
        self.backup.write_psm(record).map_err(sink_error)?;
        finish(self.store.upsert_psm(record), &record.usi)
    }
}

/// Counts of records replayed into the document store
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub proteins: usize,
    pub peptides: usize,
    pub psms: usize,
}

impl RestoreReport {
    fn merge(&mut self, other: RestoreReport) {
        self.proteins += other.proteins;
        self.peptides += other.peptides;
        self.psms += other.psms;
    }
}

/// Replay one assay's backup files into the document store. Missing files
/// are skipped with a warning so a partially-written scope can still be
/// recovered
pub fn restore_assay(
    store: &dyn EvidenceStore,
    backup_root: &Path,
    project: &str,
    assay: &str,
) -> Result<RestoreReport, BackupError> {
    let mut report = RestoreReport::default();
    for record_type in [RecordType::Protein, RecordType::Peptide, RecordType::Psm] {
        let path = backup_file(backup_root, project, assay, record_type);
        if !path.exists() {
            log::warn!("no backup file {}", path.display());
            continue;
        }
        report.merge(restore_file(store, &path)?);
    }
    Ok(report)
}

/// Replay every backup file under one project's backup directory
pub fn restore_project(
    store: &dyn EvidenceStore,
    backup_root: &Path,
    project: &str,
) -> Result<RestoreReport, BackupError> {
    let dir = backup_root.join(project);
    let entries = std::fs::read_dir(&dir).map_err(|e| BackupError::Io(dir.clone(), e))?;
    let mut report = RestoreReport::default();
    for entry in entries {
        let entry = entry.map_err(|e| BackupError::Io(dir.clone(), e))?;
        if entry.path().is_file() {
            report.merge(restore_file(store, &entry.path())?);
        }
    }
    Ok(report)
}

/// Replay the entire backup root, project directory by project directory
pub fn restore_all(
    store: &dyn EvidenceStore,
    backup_root: &Path,
) -> Result<RestoreReport, BackupError> {
    let entries =
        std::fs::read_dir(backup_root).map_err(|e| BackupError::Io(backup_root.into(), e))?;
    let mut report = RestoreReport::default();
    for entry in entries {
        let entry = entry.map_err(|e| BackupError::Io(backup_root.into(), e))?;
        if entry.path().is_dir() {
            let project = entry.file_name().to_string_lossy().into_owned();
            report.merge(restore_project(store, backup_root, &project)?);
        }
    }
    Ok(report)
}

/// Replay a single backup file, dispatching on its file-name suffix.
/// Files that are not evidence backups are ignored. A failed upsert is
/// logged and does not stop the replay of sibling records
fn restore_file(store: &dyn EvidenceStore, path: &Path) -> Result<RestoreReport, BackupError> {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return Ok(RestoreReport::default()),
    };
    let mut report = RestoreReport::default();
    match RecordType::from_file_name(name) {
        Some(RecordType::Protein) => {
            for record in read_records::<ProteinEvidence>(path)? {
                if replayed(store.upsert_protein(&record), &record.reported_accession) {
                    report.proteins += 1;
                }
            }
        }
        Some(RecordType::Peptide) => {
            for record in read_records::<PeptideEvidence>(path)? {
                if replayed(store.upsert_peptide(&record), &record.peptide_accession) {
                    report.peptides += 1;
                }
            }
        }
        Some(RecordType::Psm) => {
            for record in read_records::<PsmEvidence>(path)? {
                if replayed(store.upsert_psm(&record), &record.usi) {
                    report.psms += 1;
                }
            }
        }
        None => log::debug!("ignoring {}", path.display()),
    }
    Ok(report)
}

fn replayed(outcome: UpsertOutcome, key: &str) -> bool {
    match outcome {
        UpsertOutcome::Inserted | UpsertOutcome::AlreadyExists => true,
        UpsertOutcome::Failed(reason) => {
            log::error!("restore of {} failed: {}", key, reason);
            false
        }
    }
}
