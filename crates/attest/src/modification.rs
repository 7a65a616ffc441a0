//! Projection of peptide-local modification positions into peptide- and
//! protein-coordinate evidence, merging duplicate modification types into
//! one accumulator entry per CV accession.

use crate::param::CvTerm;
use crate::report::{ModificationRef, ReportPeptide};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One modification type with every position it was observed at
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModificationEvidence {
    /// The modification's CV term; `value` carries the monoisotopic mass
    pub modification: CvTerm,
    pub neutral_loss: Option<CvTerm>,
    pub positions: Vec<ModificationPosition>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModificationPosition {
    pub position: u32,
    pub probabilities: Vec<CvTerm>,
}

/// Result of a protein-coordinate projection. `dropped` counts
/// peptide-local modifications that could not be anchored to the protein
/// (missing or unplaced occurrence, terminal position with no terminal
/// anchor) - those are not propagated
#[derive(Clone, Debug, Default)]
pub struct ProteinProjection {
    pub modifications: Vec<ModificationEvidence>,
    pub dropped: usize,
}

fn term(modification: &ModificationRef) -> CvTerm {
    CvTerm {
        cv_label: modification.cv_label.clone().unwrap_or_default(),
        accession: modification.accession.clone().unwrap_or_default(),
        name: modification.name.clone().unwrap_or_default(),
        value: Some(modification.mass.to_string()),
    }
}

fn merge(
    accumulator: &mut Vec<ModificationEvidence>,
    modification: &ModificationRef,
    position: u32,
) {
    let accession = modification.accession.as_deref().unwrap_or_default();
    let probabilities = modification.probabilities.clone();
    match accumulator
        .iter_mut()
        .find(|entry| entry.modification.accession.eq_ignore_ascii_case(accession))
    {
        Some(entry) => entry.positions.push(ModificationPosition {
            position,
            probabilities,
        }),
        None => accumulator.push(ModificationEvidence {
            modification: term(modification),
            neutral_loss: modification.neutral_loss.clone(),
            positions: vec![ModificationPosition {
                position,
                probabilities,
            }],
        }),
    }
}

/// Project a peptide modification map onto peptide coordinates.
/// Modifications without a CV accession cannot be reported and are skipped
pub fn project_to_peptide_coordinates(
    modifications: &BTreeMap<u32, ModificationRef>,
) -> Vec<ModificationEvidence> {
    let mut accumulator = Vec::new();
    for (position, modification) in modifications {
        if modification.accession.is_none() {
            continue;
        }
        merge(&mut accumulator, modification, *position);
    }
    accumulator
}

/// Project the modifications of every peptide belonging to `protein_accession`
/// onto protein-global coordinates: `protein_position = start + position - 1`
/// for each occurrence of the peptide within that protein.
///
/// Peptide-terminal positions (0 and `len + 1`) only anchor to the protein
/// when the peptide itself sits at the corresponding protein terminus;
/// `protein_length` is needed to check the C-terminal case and comes from
/// the resolved protein sequence when one exists.
pub fn project_to_protein_coordinates(
    protein_accession: &str,
    peptides: &[&ReportPeptide],
    protein_length: Option<usize>,
) -> ProteinProjection {
    let mut projection = ProteinProjection::default();

    for peptide in peptides {
        let c_terminus = peptide.sequence.len() as u32 + 1;
        for (position, modification) in &peptide.modifications {
            if modification.accession.is_none() {
                continue;
            }

            let mut placed = false;
            for occurrence in &peptide.occurrences {
                if !occurrence.accession.eq_ignore_ascii_case(protein_accession)
                    || occurrence.start < 0
                {
                    continue;
                }
                let start = occurrence.start as u32;
                let protein_position = match *position {
                    0 => {
                        // N-terminal: only meaningful when the peptide
                        // starts the protein
                        if start != 1 {
                            continue;
                        }
                        0
                    }
                    p if p == c_terminus => match protein_length {
                        Some(length) if occurrence.end == length as i64 => length as u32 + 1,
                        _ => continue,
                    },
                    p => start + p - 1,
                };
                merge(&mut projection.modifications, modification, protein_position);
                placed = true;
            }
            if !placed {
                projection.dropped += 1;
            }
        }
    }
    projection
}
