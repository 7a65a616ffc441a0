use serde::{Deserialize, Serialize};

/// A controlled-vocabulary term with an optional value, as stamped onto
/// evidence records
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CvTerm {
    pub cv_label: String,
    pub accession: String,
    pub name: String,
    pub value: Option<String>,
}

impl CvTerm {
    pub fn new<S: Into<String>>(cv_label: S, accession: S, name: S, value: Option<String>) -> Self {
        CvTerm {
            cv_label: cv_label.into(),
            accession: accession.into(),
            name: name.into(),
            value,
        }
    }

    pub fn with_value<V: ToString>(reference: &CvReference, value: V) -> Self {
        CvTerm {
            cv_label: reference.cv_label.into(),
            accession: reference.accession.into(),
            name: reference.name.into(),
            value: Some(value.to_string()),
        }
    }
}

/// A fixed CV accession known to the pipeline
pub struct CvReference {
    pub cv_label: &'static str,
    pub accession: &'static str,
    pub name: &'static str,
}

pub const PSM_QVALUE: CvReference = CvReference {
    cv_label: "MS",
    accession: "MS:1002354",
    name: "PSM-level q-value",
};

pub const PSM_FDRSCORE: CvReference = CvReference {
    cv_label: "MS",
    accession: "MS:1002355",
    name: "PSM-level FDRScore",
};

pub const PEPTIDE_QVALUE: CvReference = CvReference {
    cv_label: "MS",
    accession: "MS:1001868",
    name: "q-value for peptides",
};

pub const PEPTIDE_FDRSCORE: CvReference = CvReference {
    cv_label: "MS",
    accession: "MS:1002360",
    name: "distinct peptide-level FDRScore",
};

pub const PROTEIN_QVALUE: CvReference = CvReference {
    cv_label: "MS",
    accession: "MS:1002373",
    name: "protein group-level q-value",
};

pub const PROTEIN_SCORE: CvReference = CvReference {
    cv_label: "MS",
    accession: "MS:1002394",
    name: "PIA:protein score",
};

pub const DELTA_MZ: CvReference = CvReference {
    cv_label: "MS",
    accession: "MS:1001975",
    name: "delta m/z",
};

pub const DECOY_VALIDATION: CvReference = CvReference {
    cv_label: "MS",
    accession: "MS:1001194",
    name: "quality estimation with decoy database",
};

/// Scoring methods reported by the inference engine, keyed by the short
/// names it uses in per-PSM score maps. Scores under any other key are not
/// CV-mapped and are left off the evidence records.
pub const SCORE_METHODS: &[(&str, CvReference)] = &[
    (
        "mascot_score",
        CvReference {
            cv_label: "MS",
            accession: "MS:1001171",
            name: "Mascot:score",
        },
    ),
    (
        "xtandem_expect",
        CvReference {
            cv_label: "MS",
            accession: "MS:1001330",
            name: "X!Tandem:expect",
        },
    ),
    (
        "sequest_xcorr",
        CvReference {
            cv_label: "MS",
            accession: "MS:1001155",
            name: "SEQUEST:xcorr",
        },
    ),
    (
        "msgf_spec_evalue",
        CvReference {
            cv_label: "MS",
            accession: "MS:1002052",
            name: "MS-GF:SpecEValue",
        },
    ),
    (
        "omssa_evalue",
        CvReference {
            cv_label: "MS",
            accession: "MS:1001328",
            name: "OMSSA:evalue",
        },
    ),
    ("psm_q_value", PSM_QVALUE),
    ("psm_fdr_score", PSM_FDRSCORE),
];

/// Key in PSM score maps holding the engine's PSM-level q-value
pub const PSM_QVALUE_KEY: &str = "psm_q_value";

/// Key in PSM score maps treated as the best search engine score
pub const BEST_SCORE_KEY: &str = "psm_fdr_score";

/// Key in peptide score maps holding the engine's peptide-level FDR score
pub const PEPTIDE_FDRSCORE_KEY: &str = "peptide_fdr_score";
