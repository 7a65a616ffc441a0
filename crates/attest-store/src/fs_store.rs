//! Filesystem-backed document store. One JSON file per record, named by a
//! digest of the record's natural key; `create_new` gives the same
//! distinguishable duplicate-key behavior a remote document store reports.

use attest_core::aggregate::{EvidenceStore, UpsertOutcome};
use attest_core::evidence::{PeptideEvidence, ProteinEvidence, PsmEvidence};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FsEvidenceStore {
    root: PathBuf,
}

const COLLECTIONS: [&str; 3] = ["proteins", "peptides", "psms"];

impl FsEvidenceStore {
    pub fn open(root: &Path) -> std::io::Result<Self> {
        for collection in COLLECTIONS {
            std::fs::create_dir_all(root.join(collection))?;
        }
        Ok(FsEvidenceStore { root: root.into() })
    }

    /// Number of records in one collection, for reconciliation after a
    /// restore
    pub fn count(&self, collection: &str) -> std::io::Result<usize> {
        Ok(std::fs::read_dir(self.root.join(collection))?.count())
    }

    pub fn total(&self) -> std::io::Result<usize> {
        let mut total = 0;
        for collection in COLLECTIONS {
            total += self.count(collection)?;
        }
        Ok(total)
    }

    fn upsert<T: Serialize>(&self, collection: &str, key: &str, record: &T) -> UpsertOutcome {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        let mut name = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(name, "{:02x}", byte);
        }
        name.push_str(".json");

        let path = self.root.join(collection).join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => match serde_json::to_writer(file, record) {
                Ok(()) => UpsertOutcome::Inserted,
                Err(e) => UpsertOutcome::Failed(e.to_string()),
            },
            Err(e) if e.kind() == ErrorKind::AlreadyExists => UpsertOutcome::AlreadyExists,
            Err(e) => UpsertOutcome::Failed(e.to_string()),
        }
    }
}

impl EvidenceStore for FsEvidenceStore {
    fn upsert_protein(&self, record: &ProteinEvidence) -> UpsertOutcome {
        let key = format!(
            "{}:{}:{}",
            record.project_accession, record.assay_accession, record.reported_accession
        );
        self.upsert("proteins", &key, record)
    }

    fn upsert_peptide(&self, record: &PeptideEvidence) -> UpsertOutcome {
        let key = format!(
            "{}:{}:{}:{}",
            record.project_accession,
            record.assay_accession,
            record.protein_accession,
            record.peptide_accession
        );
        self.upsert("peptides", &key, record)
    }

    fn upsert_psm(&self, record: &PsmEvidence) -> UpsertOutcome {
        self.upsert("psms", &record.usi, record)
    }
}
