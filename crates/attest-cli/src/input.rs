use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;

/// Job parameters deserialized from the JSON configuration file
#[derive(Deserialize)]
pub struct Input {
    project_accession: String,
    assay_accession: String,
    /// The inference engine's exported report for this assay
    result_file: String,
    /// `YYYY-MM` publication date, required when `production_root` is set
    publication_date: Option<String>,
    /// Archive root; when set, files resolve under
    /// `<root>/<year>/<month>/<project>/internal/`
    production_root: Option<String>,
    /// Spectral files submitted alongside the result file
    related_files: Option<Vec<String>>,
    /// Optional accession -> sequence map for proteins whose sequence the
    /// result file does not carry
    protein_details: Option<String>,
    q_value_threshold: Option<f64>,
    protein_fdr_threshold: Option<f64>,
    backup_root: String,
    store_root: String,
}

/// Validated parameters for one assay run
pub struct Job {
    pub project_accession: String,
    pub assay_accession: String,
    pub result_file: String,
    pub build_path: String,
    pub related_files: Vec<String>,
    pub protein_details: Option<String>,
    pub q_value_threshold: f64,
    pub protein_fdr_threshold: f64,
    pub backup_root: PathBuf,
    pub store_root: PathBuf,
}

impl Input {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration from `{}`", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse configuration from `{}`", path))
    }

    pub fn build(self) -> anyhow::Result<Job> {
        let (build_path, result_file) = match (&self.production_root, &self.publication_date) {
            (Some(root), Some(date)) => {
                // a date that cannot be decomposed aborts before anything
                // is written
                let (year, month) =
                    attest_store::paths::year_month(&self.project_accession, date)?;
                let build_path = attest_store::paths::build_internal_path(
                    root,
                    &year,
                    &month,
                    &self.project_accession,
                );
                let result_file = attest_store::paths::join(
                    &build_path,
                    attest_store::paths::uncompressed_name(&self.result_file),
                );
                (build_path, result_file)
            }
            (Some(_), None) => anyhow::bail!(
                "production_root requires a publication_date for project {}",
                self.project_accession
            ),
            (None, _) => {
                let build_path = match self.result_file.rfind('/') {
                    Some(i) => self.result_file[..=i].to_string(),
                    None => "./".to_string(),
                };
                (build_path, self.result_file.clone())
            }
        };

        Ok(Job {
            project_accession: self.project_accession,
            assay_accession: self.assay_accession,
            result_file,
            build_path,
            related_files: self.related_files.unwrap_or_default(),
            protein_details: self.protein_details,
            q_value_threshold: self.q_value_threshold.unwrap_or(0.01),
            protein_fdr_threshold: self.protein_fdr_threshold.unwrap_or(1.0),
            backup_root: self.backup_root.into(),
            store_root: self.store_root.into(),
        })
    }
}
