use crate::input::Job;
use anyhow::Context;
use attest_core::aggregate::{
    AssayContext, EvidenceAggregator, NoDetailLookup, ProteinDetailLookup,
};
use attest_core::quality::QualityGate;
use attest_core::report::InferenceResult;
use attest_store::checkpoint::{restore_all, restore_assay, restore_project, CheckpointedWriter};
use attest_store::fs_store::FsEvidenceStore;
use attest_store::index::{combine_spectrum_files, embedded_plan, SpectrumFileIndex};
use fnv::FnvHashMap;
use log::info;
use std::time::Instant;

pub struct Runner {
    pub job: Job,
}

/// Protein sequences preloaded from a JSON accession -> sequence map
struct MapDetailLookup {
    sequences: FnvHashMap<String, String>,
}

impl ProteinDetailLookup for MapDetailLookup {
    fn details(&self, accessions: &[String]) -> FnvHashMap<String, String> {
        accessions
            .iter()
            .filter_map(|accession| {
                self.sequences
                    .get(accession)
                    .map(|sequence| (accession.clone(), sequence.clone()))
            })
            .collect()
    }
}

impl Runner {
    pub fn new(job: Job) -> Self {
        Runner { job }
    }

    pub fn run_analysis(&self) -> anyhow::Result<()> {
        let start = Instant::now();
        info!(
            "analyzing project {} assay {}",
            self.job.project_accession, self.job.assay_accession
        );

        let contents = std::fs::read_to_string(&self.job.result_file).with_context(|| {
            format!(
                "failed to read inference result from `{}`",
                self.job.result_file
            )
        })?;
        let result: InferenceResult = serde_json::from_str(&contents).with_context(|| {
            format!(
                "failed to parse inference result from `{}`",
                self.job.result_file
            )
        })?;
        info!(
            "- loaded {} proteins, {} spectral file references in {}ms",
            result.proteins.len(),
            result.spectra_data.len(),
            start.elapsed().as_millis()
        );

        let gate = QualityGate {
            q_value_threshold: self.job.q_value_threshold,
            protein_fdr_threshold: self.job.protein_fdr_threshold,
        }
        .apply(&result);
        info!(
            "- gate: valid={} decoys={} proteins={} peptides={} psms={}",
            gate.is_valid,
            gate.decoy_psms,
            gate.high_quality_proteins,
            gate.high_quality_peptides,
            gate.high_quality_psms
        );

        let plan = if result.spectra_data.is_empty() {
            embedded_plan(&self.job.result_file)
        } else {
            combine_spectrum_files(
                &self.job.build_path,
                &self.job.related_files,
                &result.spectra_data,
            )
        };

        let index_start = Instant::now();
        let index = SpectrumFileIndex::build(&plan)
            .with_context(|| "failed to build the spectrum file index")?;
        info!(
            "- indexed {} spectrum files in {}ms",
            index.files(),
            index_start.elapsed().as_millis()
        );

        let store = FsEvidenceStore::open(&self.job.store_root).with_context(|| {
            format!(
                "failed to open evidence store at `{}`",
                self.job.store_root.display()
            )
        })?;
        let sink = CheckpointedWriter::create(
            &self.job.backup_root,
            &store,
            &self.job.project_accession,
            &self.job.assay_accession,
        )
        .with_context(|| "failed to create backup files")?;

        let details = self.load_details()?;
        let fallback = NoDetailLookup;
        let context = AssayContext {
            project_accession: self.job.project_accession.clone(),
            assay_accession: self.job.assay_accession.clone(),
        };
        let lookup: &dyn ProteinDetailLookup = match &details {
            Some(lookup) => lookup,
            None => &fallback,
        };
        let aggregator = EvidenceAggregator {
            context: &context,
            plan: &plan,
            spectra: &index,
            sink: &sink,
            details: lookup,
        };
        let report = aggregator.run(&gate);

        info!(
            "- wrote {} proteins, {} peptides, {} psms ({} skipped, {} failed)",
            report.proteins_written,
            report.peptides_written,
            report.psms_written,
            report.skipped_psms,
            report.failed_records
        );
        info!("finished in {}ms", start.elapsed().as_millis());
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
        Ok(())
    }

    fn load_details(&self) -> anyhow::Result<Option<MapDetailLookup>> {
        let path = match &self.job.protein_details {
            Some(path) => path,
            None => return Ok(None),
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read protein details from `{}`", path))?;
        let sequences: FnvHashMap<String, String> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse protein details from `{}`", path))?;
        Ok(Some(MapDetailLookup { sequences }))
    }

    /// Replay backup files into the document store: one assay, one
    /// project, or the whole backup root depending on which accessions
    /// were given
    pub fn run_restore(&self, project: Option<&str>, assay: Option<&str>) -> anyhow::Result<()> {
        let start = Instant::now();
        let store = FsEvidenceStore::open(&self.job.store_root).with_context(|| {
            format!(
                "failed to open evidence store at `{}`",
                self.job.store_root.display()
            )
        })?;

        let report = match (project, assay) {
            (Some(project), Some(assay)) => {
                restore_assay(&store, &self.job.backup_root, project, assay)?
            }
            (Some(project), None) => restore_project(&store, &self.job.backup_root, project)?,
            _ => restore_all(&store, &self.job.backup_root)?,
        };

        info!(
            "restored {} proteins, {} peptides, {} psms in {}ms",
            report.proteins,
            report.peptides,
            report.psms,
            start.elapsed().as_millis()
        );
        Ok(())
    }
}
