//! Monoisotopic masses and precursor delta-mass arithmetic

pub const H2O: f64 = 18.010565;
pub const PROTON: f64 = 1.0072764;

/// Observed-vs-theoretical precursor deltas larger than this (in Da) are
/// counted as outliers for the assay's delta-mass error rate
pub const DELTA_MZ_OUTLIER: f64 = 0.9;

pub fn monoisotopic(residue: u8) -> Option<f64> {
    let mass = match residue {
        b'A' => 71.03711,
        b'R' => 156.1011,
        b'N' => 114.04293,
        b'D' => 115.02694,
        b'C' => 103.00919,
        b'E' => 129.04259,
        b'Q' => 128.05858,
        b'G' => 57.02146,
        b'H' => 137.05891,
        b'I' => 113.08406,
        b'L' => 113.08406,
        b'K' => 128.09496,
        b'M' => 131.0405,
        b'F' => 147.0684,
        b'P' => 97.05276,
        b'S' => 87.03203,
        b'T' => 101.04768,
        b'W' => 186.07931,
        b'Y' => 163.06333,
        b'V' => 99.06841,
        b'U' => 150.95363,
        b'O' => 237.14773,
        _ => return None,
    };
    Some(mass)
}

/// Theoretical precursor m/z for a peptide sequence carrying the given
/// modification mass deltas at the given charge. `None` when the sequence
/// contains a residue outside the table or the charge is non-positive
pub fn theoretical_mz(sequence: &str, charge: i32, modification_masses: &[f64]) -> Option<f64> {
    if charge <= 0 {
        return None;
    }
    let mut mass = H2O;
    for residue in sequence.as_bytes() {
        mass += monoisotopic(*residue)?;
    }
    for delta in modification_masses {
        mass += delta;
    }
    Some((mass + charge as f64 * PROTON) / charge as f64)
}

/// Observed minus theoretical precursor m/z
pub fn delta_mz(
    observed_mz: f64,
    sequence: &str,
    charge: i32,
    modification_masses: &[f64],
) -> Option<f64> {
    theoretical_mz(sequence, charge, modification_masses).map(|theoretical| observed_mz - theoretical)
}
