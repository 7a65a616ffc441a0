//! Production-archive path construction. The layout is part of the on-disk
//! contract: `<root>/<year>/<month>/<project>/internal/<file>`.

#[derive(Debug)]
pub enum PathError {
    /// The project's publication date could not be decomposed into a year
    /// and month. Fatal for the assay run: without them no result file
    /// path exists
    MissingYearMonth { project: String, date: String },
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::MissingYearMonth { project, date } => write!(
                f,
                "no year/month in publication date `{}` for project {}",
                date, project
            ),
        }
    }
}

impl std::error::Error for PathError {}

/// Decompose a `YYYY-MM` or `YYYY-MM-DD` publication date
pub fn year_month(project: &str, publication_date: &str) -> Result<(String, String), PathError> {
    let mut parts = publication_date.split('-');
    match (parts.next(), parts.next()) {
        (Some(year), Some(month))
            if year.len() == 4
                && !month.is_empty()
                && year.bytes().all(|b| b.is_ascii_digit())
                && month.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Ok((year.to_string(), month.to_string()))
        }
        _ => Err(PathError::MissingYearMonth {
            project: project.to_string(),
            date: publication_date.to_string(),
        }),
    }
}

/// Directory holding a project's submitted files for one publication month
pub fn build_internal_path(root: &str, year: &str, month: &str, project: &str) -> String {
    let root = root.strip_suffix('/').unwrap_or(root);
    format!("{}/{}/{}/{}/internal/", root, year, month, project)
}

/// File names are archived compressed; readers address the uncompressed name
pub fn uncompressed_name(name: &str) -> &str {
    name.strip_suffix(".gz").unwrap_or(name)
}

/// Join a declared file name onto a build path unless it is already absolute
pub fn join(build_path: &str, name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("{}{}", build_path, name)
    }
}
