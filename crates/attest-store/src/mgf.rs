//! Random-access MGF reader. The whole file is scanned once at
//! construction; lookups afterwards are read-only and index by 1-based
//! query position or by spectrum title.

use attest_core::spectrum::{Spectrum, SpectrumLookupError};
use fnv::FnvHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

pub struct MgfReader {
    path: String,
    spectra: Vec<Spectrum>,
    by_title: FnvHashMap<String, usize>,
}

impl MgfReader {
    pub fn open(path: &str) -> Result<Self, SpectrumLookupError> {
        let file = File::open(path).map_err(|source| SpectrumLookupError::FileOpen {
            path: path.to_string(),
            source,
        })?;
        // archives keep peak lists gzipped; address them by content
        let reader: Box<dyn Read> = if path.ends_with(".gz") {
            Box::new(flate2::read::MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Self::parse(path, BufReader::new(reader))
    }

    fn parse<R: BufRead>(path: &str, reader: R) -> Result<Self, SpectrumLookupError> {
        let mut spectra = Vec::new();
        let mut by_title = FnvHashMap::default();

        let mut in_ions = false;
        let mut current = Spectrum {
            ms_level: 2,
            ..Default::default()
        };
        let mut title: Option<String> = None;

        for line in reader.lines() {
            let line = line.map_err(|source| SpectrumLookupError::FileOpen {
                path: path.to_string(),
                source,
            })?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "BEGIN IONS" {
                in_ions = true;
                continue;
            }
            if line == "END IONS" {
                current.peaks.sort_by(|a, b| a.0.total_cmp(&b.0));
                if let Some(title) = title.take() {
                    by_title.entry(title).or_insert(spectra.len());
                }
                spectra.push(std::mem::replace(
                    &mut current,
                    Spectrum {
                        ms_level: 2,
                        ..Default::default()
                    },
                ));
                in_ions = false;
                continue;
            }
            if !in_ions {
                continue;
            }

            if let Some(value) = line.strip_prefix("TITLE=") {
                title = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("PEPMASS=") {
                current.precursor_mz = value
                    .split_whitespace()
                    .next()
                    .and_then(|mz| mz.parse().ok());
            } else if let Some(value) = line.strip_prefix("CHARGE=") {
                current.precursor_charge = parse_charge(value);
            } else if line.contains('=') {
                // other header fields are not needed for evidence records
            } else {
                let mut fields = line.split_whitespace();
                let mz = fields.next().and_then(|v| v.parse::<f64>().ok());
                let intensity = fields
                    .next()
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(0.0);
                if let Some(mz) = mz {
                    current.peaks.push((mz, intensity));
                }
            }
        }

        Ok(MgfReader {
            path: path.to_string(),
            spectra,
            by_title,
        })
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Spectrum at a 1-based query position
    pub fn by_index(&self, index: u64) -> Option<&Spectrum> {
        if index == 0 {
            return None;
        }
        self.spectra.get(index as usize - 1)
    }

    pub fn by_title(&self, title: &str) -> Option<&Spectrum> {
        self.by_title.get(title).map(|&i| &self.spectra[i])
    }

    /// Serve a resolved key: index keys by position, anything else by
    /// title first and as a bare position number second
    pub fn get(
        &self,
        key: &attest_core::spectrum_id::ResolvedKey,
    ) -> Result<Spectrum, SpectrumLookupError> {
        use attest_core::spectrum_id::ResolvedKey;
        let found = match key {
            ResolvedKey::Index(index) => self.by_index(*index),
            ResolvedKey::Scan(value) | ResolvedKey::Native(value) => {
                self.by_title(value).or_else(|| {
                    value
                        .trim()
                        .parse::<u64>()
                        .ok()
                        .and_then(|index| self.by_index(index))
                })
            }
        };
        found
            .cloned()
            .ok_or_else(|| SpectrumLookupError::KeyNotFound {
                path: self.path.clone(),
                key: key.clone(),
            })
    }
}

/// MGF charge fields look like `2+`, `+2`, `3-` or a bare integer
fn parse_charge(value: &str) -> Option<i32> {
    let value = value.trim();
    let (digits, negative) = if let Some(rest) = value.strip_suffix('+') {
        (rest, false)
    } else if let Some(rest) = value.strip_suffix('-') {
        (rest, true)
    } else if let Some(rest) = value.strip_prefix('+') {
        (rest, false)
    } else if let Some(rest) = value.strip_prefix('-') {
        (rest, true)
    } else {
        (value, false)
    };
    digits
        .parse::<i32>()
        .ok()
        .map(|charge| if negative { -charge } else { charge })
}

#[cfg(test)]
mod test {
    use super::*;
    use attest_core::spectrum_id::ResolvedKey;
    use std::io::Cursor;

    const MGF: &str = "\
BEGIN IONS
TITLE=spec_one
PEPMASS=445.12 1000.0
CHARGE=2+
RTINSECONDS=100.2
100.1 10.0
200.2 20.0
END IONS

BEGIN IONS
TITLE=spec_two
PEPMASS=512.77
CHARGE=3+
300.3 30.0
END IONS
";

    fn reader() -> MgfReader {
        MgfReader::parse("test.mgf", Cursor::new(MGF)).unwrap()
    }

    #[test]
    fn indexes_are_one_based() {
        let reader = reader();
        assert_eq!(reader.len(), 2);
        let first = reader.by_index(1).unwrap();
        assert_eq!(first.precursor_mz, Some(445.12));
        assert_eq!(first.precursor_charge, Some(2));
        assert_eq!(first.peaks, vec![(100.1, 10.0), (200.2, 20.0)]);
        assert!(reader.by_index(0).is_none());
        assert!(reader.by_index(3).is_none());
    }

    #[test]
    fn titles_resolve() {
        let reader = reader();
        let second = reader.by_title("spec_two").unwrap();
        assert_eq!(second.precursor_charge, Some(3));
        assert!(reader.by_title("missing").is_none());
    }

    #[test]
    fn resolved_keys_fall_back_to_positions() {
        let reader = reader();
        assert!(reader.get(&ResolvedKey::Index(2)).is_ok());
        assert!(reader.get(&ResolvedKey::Native("spec_one".into())).is_ok());
        assert!(reader.get(&ResolvedKey::Native("2".into())).is_ok());
        assert!(matches!(
            reader.get(&ResolvedKey::Index(9)),
            Err(SpectrumLookupError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn charge_field_variants() {
        assert_eq!(parse_charge("2+"), Some(2));
        assert_eq!(parse_charge("+3"), Some(3));
        assert_eq!(parse_charge("2-"), Some(-2));
        assert_eq!(parse_charge("4"), Some(4));
        assert_eq!(parse_charge("x"), None);
    }
}
