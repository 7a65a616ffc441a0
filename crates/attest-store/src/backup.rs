//! Newline-delimited-JSON backup files, one per (project, assay, record
//! type). Every record is written here before any document-store attempt,
//! so a crashed run can be replayed without re-running inference or
//! spectrum resolution. The file naming is part of the on-disk contract.

use attest_core::evidence::{PeptideEvidence, ProteinEvidence, PsmEvidence};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const JSON_EXT: &str = ".json";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordType {
    Protein,
    Peptide,
    Psm,
}

impl RecordType {
    pub fn type_name(self) -> &'static str {
        match self {
            RecordType::Protein => "ProteinEvidence",
            RecordType::Peptide => "PeptideEvidence",
            RecordType::Psm => "PsmEvidence",
        }
    }

    /// Recover the record type from a backup file name
    pub fn from_file_name(name: &str) -> Option<Self> {
        [RecordType::Protein, RecordType::Peptide, RecordType::Psm]
            .into_iter()
            .find(|rt| {
                name.ends_with(&format!("{}{}", rt.type_name(), JSON_EXT))
            })
    }
}

/// `<root>/<project>/<project>_<assay>_<RecordType>.json`
pub fn backup_file(root: &Path, project: &str, assay: &str, record_type: RecordType) -> PathBuf {
    root.join(project).join(format!(
        "{}_{}_{}{}",
        project,
        assay,
        record_type.type_name(),
        JSON_EXT
    ))
}

#[derive(Debug)]
pub enum BackupError {
    Io(PathBuf, std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for BackupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupError::Io(path, e) => write!(f, "backup file {}: {}", path.display(), e),
            BackupError::Json(e) => write!(f, "backup record: {}", e),
        }
    }
}

impl std::error::Error for BackupError {}

struct LineWriter {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl LineWriter {
    fn create(path: PathBuf) -> Result<Self, BackupError> {
        let file = File::create(&path).map_err(|e| BackupError::Io(path.clone(), e))?;
        Ok(LineWriter {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write<T: Serialize>(&self, record: &T) -> Result<(), BackupError> {
        let line = serde_json::to_string(record).map_err(BackupError::Json)?;
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            // flushed per record so the backup trail is complete before the
            // store upsert runs
            .and_then(|_| writer.flush())
            .map_err(|e| BackupError::Io(self.path.clone(), e))
    }
}

/// Append-only writers for one assay's three evidence streams. Existing
/// files are truncated: a re-run rebuilds its backup trail from scratch
pub struct BackupWriter {
    proteins: LineWriter,
    peptides: LineWriter,
    psms: LineWriter,
}

impl BackupWriter {
    pub fn create(root: &Path, project: &str, assay: &str) -> Result<Self, BackupError> {
        let dir = root.join(project);
        std::fs::create_dir_all(&dir).map_err(|e| BackupError::Io(dir.clone(), e))?;
        Ok(BackupWriter {
            proteins: LineWriter::create(backup_file(root, project, assay, RecordType::Protein))?,
            peptides: LineWriter::create(backup_file(root, project, assay, RecordType::Peptide))?,
            psms: LineWriter::create(backup_file(root, project, assay, RecordType::Psm))?,
        })
    }

    pub fn write_protein(&self, record: &ProteinEvidence) -> Result<(), BackupError> {
        self.proteins.write(record)
    }

    pub fn write_peptide(&self, record: &PeptideEvidence) -> Result<(), BackupError> {
        self.peptides.write(record)
    }

    pub fn write_psm(&self, record: &PsmEvidence) -> Result<(), BackupError> {
        self.psms.write(record)
    }
}

/// Read every record of a backup file, one JSON document per line
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, BackupError> {
    let file = File::open(path).map_err(|e| BackupError::Io(path.to_path_buf(), e))?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| BackupError::Io(path.to_path_buf(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line).map_err(BackupError::Json)?);
    }
    Ok(records)
}
