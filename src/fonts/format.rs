//! Font container detection and conversion to the rasterizer's native sfnt.
//!
//! | Signature | Container | Handling |
//! |---|---|---|
//! | `00 01 00 00`, `true` | TrueType | pass-through |
//! | `OTTO` | OpenType (CFF) | pass-through |
//! | `ttcf` | Collection | pass-through (face 0 is used) |
//! | `wOFF` | WOFF 1.0 | tables inflated, sfnt rebuilt in-crate |
//! | `wOF2` | WOFF 2.0 | `wuff` decoder |
//!
//! Detection is by signature only; file extensions and URL suffixes are
//! never consulted.

use flate2::read::ZlibDecoder;
use std::io::Read;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("unrecognized font container (leading bytes {0:02x?})")]
    Unsupported(Vec<u8>),
    #[error("invalid WOFF data: {0}")]
    Woff(String),
    #[error("WOFF2 decode failed: {0}")]
    Woff2(String),
    #[error("font data does not parse: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    TrueType,
    OpenTypeCff,
    Collection,
    Woff,
    Woff2,
}

impl FontFormat {
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match bytes.get(..4)? {
            [0x00, 0x01, 0x00, 0x00] | b"true" => Some(Self::TrueType),
            b"OTTO" => Some(Self::OpenTypeCff),
            b"ttcf" => Some(Self::Collection),
            b"wOFF" => Some(Self::Woff),
            b"wOF2" => Some(Self::Woff2),
            _ => None,
        }
    }

    pub fn is_native(self) -> bool {
        matches!(self, Self::TrueType | Self::OpenTypeCff | Self::Collection)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TrueType => "truetype",
            Self::OpenTypeCff => "opentype",
            Self::Collection => "collection",
            Self::Woff => "woff",
            Self::Woff2 => "woff2",
        }
    }
}

/// Convert any supported container into native sfnt bytes.
///
/// Returns the detected source format alongside the converted bytes.
pub fn to_native(bytes: Vec<u8>) -> Result<(FontFormat, Vec<u8>), FormatError> {
    let format = FontFormat::detect(&bytes)
        .ok_or_else(|| FormatError::Unsupported(bytes.iter().take(4).copied().collect()))?;
    let native = match format {
        FontFormat::TrueType | FontFormat::OpenTypeCff | FontFormat::Collection => bytes,
        FontFormat::Woff => decode_woff(&bytes)?,
        FontFormat::Woff2 => {
            wuff::decompress_woff2(&bytes).map_err(|e| FormatError::Woff2(format!("{e:?}")))?
        }
    };
    Ok((format, native))
}

/// Check that bytes parse as a font the rasterizer can open.
pub fn validate(bytes: &[u8]) -> Result<(), FormatError> {
    ttf_parser::Face::parse(bytes, 0)
        .map(|_| ())
        .map_err(|e| FormatError::Corrupt(e.to_string()))
}

// ============================================================================
// WOFF 1.0
// ============================================================================

const WOFF_HEADER_LEN: usize = 44;
const WOFF_ENTRY_LEN: usize = 20;
const SFNT_HEADER_LEN: usize = 12;
const SFNT_RECORD_LEN: usize = 16;
/// The sfnt directory's u16 search fields cap the table count.
const MAX_TABLES: usize = 4095;
/// Upper bound on a decoded font, checked before anything is inflated.
const MAX_SFNT_BYTES: usize = 256 * 1024 * 1024;

struct WoffEntry {
    tag: [u8; 4],
    offset: usize,
    comp_length: usize,
    orig_length: usize,
    checksum: u32,
}

fn read_u16(data: &[u8], at: usize) -> Result<u16, FormatError> {
    data.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| FormatError::Woff(format!("truncated at byte {at}")))
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, FormatError> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| FormatError::Woff(format!("truncated at byte {at}")))
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

/// Inflate every table and lay them out again behind a fresh sfnt
/// offset table. Tables keep the directory order (sorted by tag) and
/// their original checksums.
fn decode_woff(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    let flavor = read_u32(data, 4)?;
    let num_tables = read_u16(data, 12)? as usize;
    if num_tables == 0 {
        return Err(FormatError::Woff("no tables".into()));
    }
    if num_tables > MAX_TABLES {
        return Err(FormatError::Woff(format!(
            "{num_tables} tables exceeds the sfnt limit of {MAX_TABLES}"
        )));
    }

    let mut entries = Vec::with_capacity(num_tables);
    for i in 0..num_tables {
        let at = WOFF_HEADER_LEN + i * WOFF_ENTRY_LEN;
        let tag = data
            .get(at..at + 4)
            .and_then(|b| <[u8; 4]>::try_from(b).ok())
            .ok_or_else(|| FormatError::Woff("truncated table directory".into()))?;
        entries.push(WoffEntry {
            tag,
            offset: read_u32(data, at + 4)? as usize,
            comp_length: read_u32(data, at + 8)? as usize,
            orig_length: read_u32(data, at + 12)? as usize,
            checksum: read_u32(data, at + 16)?,
        });
    }
    let declared = entries
        .iter()
        .map(|e| e.orig_length)
        .fold(0usize, usize::saturating_add);
    if declared > MAX_SFNT_BYTES {
        return Err(FormatError::Woff(format!(
            "tables declare {declared} bytes, more than {MAX_SFNT_BYTES}"
        )));
    }

    let mut tables = Vec::with_capacity(num_tables);
    for entry in &entries {
        let tag = String::from_utf8_lossy(&entry.tag).into_owned();
        let end = entry
            .offset
            .checked_add(entry.comp_length)
            .ok_or_else(|| FormatError::Woff(format!("table '{tag}' overflows")))?;
        let raw = data
            .get(entry.offset..end)
            .ok_or_else(|| FormatError::Woff(format!("table '{tag}' lies outside the file")))?;
        let table = if entry.comp_length < entry.orig_length {
            let mut out = Vec::new();
            // One byte past the declared length is enough to detect a liar.
            ZlibDecoder::new(raw)
                .take(entry.orig_length as u64 + 1)
                .read_to_end(&mut out)
                .map_err(|e| FormatError::Woff(format!("table '{tag}': {e}")))?;
            if out.len() != entry.orig_length {
                return Err(FormatError::Woff(format!(
                    "table '{tag}' inflated to {} bytes, expected {}",
                    out.len(),
                    entry.orig_length
                )));
            }
            out
        } else if entry.comp_length == entry.orig_length {
            raw.to_vec()
        } else {
            return Err(FormatError::Woff(format!(
                "table '{tag}' is larger compressed than uncompressed"
            )));
        };
        tables.push(table);
    }

    let (search_range, entry_selector, range_shift) = search_fields(num_tables);

    let directory_len = SFNT_HEADER_LEN + num_tables * SFNT_RECORD_LEN;
    let total = directory_len + tables.iter().map(|t| padded(t.len())).sum::<usize>();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&flavor.to_be_bytes());
    out.extend_from_slice(&(num_tables as u16).to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    let mut offset = directory_len;
    for (entry, table) in entries.iter().zip(&tables) {
        out.extend_from_slice(&entry.tag);
        out.extend_from_slice(&entry.checksum.to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(table.len() as u32).to_be_bytes());
        offset += padded(table.len());
    }
    for table in &tables {
        out.extend_from_slice(table);
        out.resize(padded(out.len()), 0);
    }
    Ok(out)
}

/// `(searchRange, entrySelector, rangeShift)` for an sfnt directory of
/// `num_tables` entries, `1 <= num_tables <= MAX_TABLES`.
fn search_fields(num_tables: usize) -> (u16, u16, u16) {
    let entry_selector = num_tables.ilog2();
    let search_range = (1usize << entry_selector) * SFNT_RECORD_LEN;
    let range_shift = num_tables * SFNT_RECORD_LEN - search_range;
    (search_range as u16, entry_selector as u16, range_shift as u16)
}
