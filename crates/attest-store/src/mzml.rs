//! Random-access mzML reader. A single pull-parser pass collects every
//! spectrum's native id, list index, scan number, precursor and peak
//! arrays; lookups afterwards are read-only map hits.

use attest_core::spectrum::{Spectrum, SpectrumLookupError};
use attest_core::spectrum_id::ResolvedKey;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use fnv::FnvHashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

const MS_LEVEL: &str = "MS:1000511";

const SELECTED_ION_MZ: &str = "MS:1000744";
const SELECTED_ION_CHARGE: &str = "MS:1000041";

// MUST supply only one of the following
const ZLIB_COMPRESSION: &str = "MS:1000574";
const NO_COMPRESSION: &str = "MS:1000576";

// MUST supply only one of the following
const INTENSITY_ARRAY: &str = "MS:1000515";
const MZ_ARRAY: &str = "MS:1000514";

// MUST supply only one of the following
const FLOAT_64: &str = "MS:1000523";
const FLOAT_32: &str = "MS:1000521";

#[derive(Copy, Clone, Debug)]
enum BinaryKind {
    Mz,
    Intensity,
}

#[derive(Copy, Clone, Debug)]
enum Dtype {
    F32,
    F64,
}

pub struct MzmlReader {
    path: String,
    spectra: Vec<Spectrum>,
    by_id: FnvHashMap<String, usize>,
    /// Keyed by the spectrum's 0-based list index
    by_index: FnvHashMap<u64, usize>,
    by_scan: FnvHashMap<u64, usize>,
}

impl MzmlReader {
    pub fn open(path: &str) -> Result<Self, SpectrumLookupError> {
        let file = File::open(path).map_err(|source| SpectrumLookupError::FileOpen {
            path: path.to_string(),
            source,
        })?;
        let reader: Box<dyn Read> = if path.ends_with(".gz") {
            Box::new(flate2::read::MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Self::parse(path, BufReader::new(reader))
    }

    fn parse<R: BufRead>(path: &str, source: R) -> Result<Self, SpectrumLookupError> {
        let malformed = |detail: String| SpectrumLookupError::Malformed {
            path: path.to_string(),
            detail,
        };

        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);
        let mut buf = Vec::new();

        let mut spectra = Vec::new();
        let mut by_id = FnvHashMap::default();
        let mut by_index = FnvHashMap::default();
        let mut by_scan = FnvHashMap::default();

        let mut in_spectrum = false;
        let mut in_binary = false;
        let mut current = Spectrum::default();
        let mut current_id = String::new();
        let mut current_index: Option<u64> = None;
        let mut current_scan: Option<u64> = None;

        let mut compression = false;
        let mut dtype = Dtype::F64;
        let mut kind: Option<BinaryKind> = None;
        let mut mz_array: Vec<f64> = Vec::new();
        let mut intensity_array: Vec<f64> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    match e.local_name().as_ref() {
                        b"spectrum" => {
                            in_spectrum = true;
                            current = Spectrum::default();
                            current_id = attribute(e, "id").unwrap_or_default();
                            current_index =
                                attribute(e, "index").and_then(|v| v.parse().ok());
                            current_scan = scan_number(&current_id);
                            mz_array.clear();
                            intensity_array.clear();
                        }
                        b"cvParam" if in_spectrum => {
                            let accession = attribute(e, "accession").unwrap_or_default();
                            let value = attribute(e, "value");
                            match accession.as_str() {
                                MS_LEVEL => {
                                    current.ms_level = value
                                        .as_deref()
                                        .and_then(|v| v.parse().ok())
                                        .unwrap_or(0)
                                }
                                SELECTED_ION_MZ => {
                                    current.precursor_mz =
                                        value.as_deref().and_then(|v| v.parse().ok())
                                }
                                SELECTED_ION_CHARGE => {
                                    current.precursor_charge =
                                        value.as_deref().and_then(|v| v.parse().ok())
                                }
                                ZLIB_COMPRESSION => compression = true,
                                NO_COMPRESSION => compression = false,
                                MZ_ARRAY => kind = Some(BinaryKind::Mz),
                                INTENSITY_ARRAY => kind = Some(BinaryKind::Intensity),
                                FLOAT_64 => dtype = Dtype::F64,
                                FLOAT_32 => dtype = Dtype::F32,
                                _ => {}
                            }
                        }
                        b"binary" if in_spectrum => in_binary = true,
                        _ => {}
                    }
                }
                Ok(Event::Text(ref t)) if in_binary => {
                    let text = t
                        .unescape()
                        .map_err(|e| malformed(e.to_string()))?;
                    let values = decode_binary(&text, compression, dtype)
                        .map_err(&malformed)?;
                    match kind {
                        Some(BinaryKind::Mz) => mz_array = values,
                        Some(BinaryKind::Intensity) => intensity_array = values,
                        None => return Err(malformed("binary array without type".into())),
                    }
                }
                Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                    b"binary" => in_binary = false,
                    b"binaryDataArray" => {
                        compression = false;
                        dtype = Dtype::F64;
                        kind = None;
                    }
                    b"spectrum" => {
                        if mz_array.len() != intensity_array.len() {
                            return Err(malformed(format!(
                                "m/z and intensity arrays disagree for {}",
                                current_id
                            )));
                        }
                        current.peaks = mz_array
                            .drain(..)
                            .zip(intensity_array.drain(..))
                            .collect();
                        current
                            .peaks
                            .sort_by(|a, b| a.0.total_cmp(&b.0));

                        let position = spectra.len();
                        if !current_id.is_empty() {
                            by_id.insert(current_id.clone(), position);
                        }
                        by_index.insert(current_index.unwrap_or(position as u64), position);
                        if let Some(scan) = current_scan {
                            by_scan.insert(scan, position);
                        }
                        spectra.push(std::mem::take(&mut current));
                        in_spectrum = false;
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(malformed(e.to_string())),
            }
            buf.clear();
        }

        Ok(MzmlReader {
            path: path.to_string(),
            spectra,
            by_id,
            by_index,
            by_scan,
        })
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Serve a resolved key: native ids verbatim, scan numbers against the
    /// scan map, 1-based index keys against the 0-based list index
    pub fn get(&self, key: &ResolvedKey) -> Result<Spectrum, SpectrumLookupError> {
        let found = match key {
            ResolvedKey::Index(index) => self
                .by_index
                .get(&index.saturating_sub(1))
                .or_else(|| self.by_scan.get(index)),
            ResolvedKey::Scan(value) => value
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(|scan| self.by_scan.get(&scan)),
            ResolvedKey::Native(value) => self.by_id.get(value.as_str()).or_else(|| {
                scan_number(value).and_then(|scan| self.by_scan.get(&scan))
            }),
        };
        found
            .map(|&i| self.spectra[i].clone())
            .ok_or_else(|| SpectrumLookupError::KeyNotFound {
                path: self.path.clone(),
                key: key.clone(),
            })
    }
}

fn attribute(e: &BytesStart, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Trailing scan number of a vendor spectrum id, e.g.
/// `controllerType=0 controllerNumber=1 scan=175`
fn scan_number(id: &str) -> Option<u64> {
    let (_, rest) = id.rsplit_once("scan=")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn decode_binary(text: &str, compression: bool, dtype: Dtype) -> Result<Vec<f64>, String> {
    let raw = BASE64
        .decode(text.trim().as_bytes())
        .map_err(|e| e.to_string())?;
    let bytes = if compression {
        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(raw.as_slice())
            .read_to_end(&mut out)
            .map_err(|e| e.to_string())?;
        out
    } else {
        raw
    };
    let values = match dtype {
        Dtype::F64 => bytes
            .chunks_exact(8)
            .map(|chunk| f64::from_le_bytes(chunk.try_into().expect("exact chunk")))
            .collect(),
        Dtype::F32 => bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("exact chunk")) as f64)
            .collect(),
    };
    Ok(values)
}
