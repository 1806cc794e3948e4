//! Shared test utilities: synthetic fonts and document builders.
//!
//! Text tests must not depend on fonts installed on the host, so this module
//! assembles a minimal TrueType font in memory:
//!
//! | Glyph | Chars | Outline | Advance |
//! |---|---|---|---|
//! | 0 | (missing) | empty | 500 |
//! | 1 | space | empty | 300 |
//! | 2..=95 | `!`..=`~` | square x∈[100,500], y∈[0,600] | 600 |
//!
//! Units per em is 1000, ascender 800, descender −200. At font size `S`
//! a printable glyph is therefore a `0.4S × 0.6S` box whose bottom sits on
//! the baseline, `0.8S` below the line top.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let font = write_font(tmp.path(), "square.ttf");
//! let doc = document(400, 300, "#000000", &[text_block("Hi", "mc", &font)]);
//! ```

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde_json::{Value, json};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const UNITS_PER_EM: u16 = 1000;
pub const ASCENDER: i16 = 800;
pub const DESCENDER: i16 = -200;
pub const GLYPH_ADVANCE: u16 = 600;
pub const SPACE_ADVANCE: u16 = 300;
const NUM_GLYPHS: u16 = 96;

// =========================================================================
// Synthetic TrueType font
// =========================================================================

fn be16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn be32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn table_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

fn square_glyph() -> Vec<u8> {
    let mut g = Vec::new();
    be16(&mut g, 1); // numberOfContours
    for v in [100i16, 0, 500, 600] {
        be16(&mut g, v as u16); // bbox
    }
    be16(&mut g, 3); // endPtsOfContours[0]
    be16(&mut g, 0); // instructionLength
    g.extend_from_slice(&[0x01; 4]); // on-curve, 16-bit deltas
    for dx in [100i16, 400, 0, -400] {
        be16(&mut g, dx as u16);
    }
    for dy in [0i16, 0, 600, 0] {
        be16(&mut g, dy as u16);
    }
    g
}

fn cmap() -> Vec<u8> {
    let mut t = Vec::new();
    be16(&mut t, 0); // version
    be16(&mut t, 1); // numTables
    be16(&mut t, 3); // platform: Windows
    be16(&mut t, 1); // encoding: Unicode BMP
    be32(&mut t, 12);
    // format 4, two segments: 0x20..=0x7E and the 0xFFFF terminator
    be16(&mut t, 4);
    be16(&mut t, 32);
    be16(&mut t, 0);
    be16(&mut t, 4); // segCountX2
    be16(&mut t, 4); // searchRange
    be16(&mut t, 1); // entrySelector
    be16(&mut t, 0); // rangeShift
    be16(&mut t, 0x7E);
    be16(&mut t, 0xFFFF);
    be16(&mut t, 0); // reservedPad
    be16(&mut t, 0x20);
    be16(&mut t, 0xFFFF);
    be16(&mut t, (-31i16) as u16); // 0x20 -> glyph 1
    be16(&mut t, 1);
    be16(&mut t, 0);
    be16(&mut t, 0);
    t
}

fn head() -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, 0x0001_0000); // version
    be32(&mut t, 0x0001_0000); // fontRevision
    be32(&mut t, 0); // checkSumAdjustment
    be32(&mut t, 0x5F0F_3CF5); // magic
    be16(&mut t, 0); // flags
    be16(&mut t, UNITS_PER_EM);
    t.extend_from_slice(&[0; 16]); // created, modified
    for v in [0i16, DESCENDER, 500, ASCENDER] {
        be16(&mut t, v as u16);
    }
    be16(&mut t, 0); // macStyle
    be16(&mut t, 8); // lowestRecPPEM
    be16(&mut t, 2); // fontDirectionHint
    be16(&mut t, 0); // indexToLocFormat: short
    be16(&mut t, 0); // glyphDataFormat
    t
}

fn hhea() -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, 0x0001_0000);
    be16(&mut t, ASCENDER as u16);
    be16(&mut t, DESCENDER as u16);
    be16(&mut t, 0); // lineGap
    be16(&mut t, GLYPH_ADVANCE); // advanceWidthMax
    be16(&mut t, 0); // minLeftSideBearing
    be16(&mut t, 0); // minRightSideBearing
    be16(&mut t, 500); // xMaxExtent
    be16(&mut t, 1); // caretSlopeRise
    be16(&mut t, 0); // caretSlopeRun
    be16(&mut t, 0); // caretOffset
    t.extend_from_slice(&[0; 8]);
    be16(&mut t, 0); // metricDataFormat
    be16(&mut t, NUM_GLYPHS);
    t
}

/// Lay out tables as an sfnt: offset table, sorted directory, then
/// 4-byte-aligned table data in directory order.
pub fn build_sfnt(flavor: u32, tables: &mut [([u8; 4], Vec<u8>)]) -> Vec<u8> {
    tables.sort_by(|a, b| a.0.cmp(&b.0));
    let n = tables.len() as u16;
    let mut selector = 0u16;
    while (2u16 << selector) <= n {
        selector += 1;
    }
    let search_range = (1u16 << selector) * 16;

    let mut out = Vec::new();
    be32(&mut out, flavor);
    be16(&mut out, n);
    be16(&mut out, search_range);
    be16(&mut out, selector);
    be16(&mut out, n * 16 - search_range);

    let mut offset = 12 + tables.len() * 16;
    for (tag, data) in tables.iter() {
        out.extend_from_slice(tag);
        be32(&mut out, table_checksum(data));
        be32(&mut out, offset as u32);
        be32(&mut out, data.len() as u32);
        offset += (data.len() + 3) & !3;
    }
    for (_, data) in tables.iter() {
        out.extend_from_slice(data);
        out.resize((out.len() + 3) & !3, 0);
    }
    out
}

/// The synthetic square-glyph font described in the module docs.
pub fn synthetic_ttf() -> Vec<u8> {
    let square = square_glyph();
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    be16(&mut loca, 0); // glyph 0
    be16(&mut loca, 0); // glyph 1
    for _ in 2..NUM_GLYPHS {
        be16(&mut loca, (glyf.len() / 2) as u16);
        glyf.extend_from_slice(&square);
    }
    be16(&mut loca, (glyf.len() / 2) as u16);

    let mut hmtx = Vec::new();
    be16(&mut hmtx, 500);
    be16(&mut hmtx, 0);
    be16(&mut hmtx, SPACE_ADVANCE);
    be16(&mut hmtx, 0);
    for _ in 2..NUM_GLYPHS {
        be16(&mut hmtx, GLYPH_ADVANCE);
        be16(&mut hmtx, 100);
    }

    let mut maxp = Vec::new();
    be32(&mut maxp, 0x0000_5000);
    be16(&mut maxp, NUM_GLYPHS);

    build_sfnt(
        0x0001_0000,
        &mut [
            (*b"cmap", cmap()),
            (*b"glyf", glyf),
            (*b"head", head()),
            (*b"hhea", hhea()),
            (*b"hmtx", hmtx),
            (*b"loca", loca),
            (*b"maxp", maxp),
        ],
    )
}

/// Wrap an sfnt in a WOFF 1.0 container. With `compress`, tables are
/// zlib-compressed whenever that makes them smaller.
pub fn woff_from_sfnt(sfnt: &[u8], compress: bool) -> Vec<u8> {
    let rd16 = |at: usize| u16::from_be_bytes([sfnt[at], sfnt[at + 1]]);
    let rd32 = |at: usize| u32::from_be_bytes([sfnt[at], sfnt[at + 1], sfnt[at + 2], sfnt[at + 3]]);
    let flavor = rd32(0);
    let n = rd16(4) as usize;

    let mut entries = Vec::new();
    for i in 0..n {
        let rec = 12 + i * 16;
        let tag = [sfnt[rec], sfnt[rec + 1], sfnt[rec + 2], sfnt[rec + 3]];
        let checksum = rd32(rec + 4);
        let offset = rd32(rec + 8) as usize;
        let length = rd32(rec + 12) as usize;
        let data = &sfnt[offset..offset + length];
        let stored = if compress {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
            enc.write_all(data).unwrap();
            let packed = enc.finish().unwrap();
            if packed.len() < data.len() {
                packed
            } else {
                data.to_vec()
            }
        } else {
            data.to_vec()
        };
        entries.push((tag, checksum, length, stored));
    }

    let mut body = Vec::new();
    let mut directory = Vec::new();
    let mut offset = 44 + n * 20;
    for (tag, checksum, orig_len, stored) in &entries {
        directory.extend_from_slice(tag);
        be32(&mut directory, offset as u32);
        be32(&mut directory, stored.len() as u32);
        be32(&mut directory, *orig_len as u32);
        be32(&mut directory, *checksum);
        body.extend_from_slice(stored);
        body.resize((body.len() + 3) & !3, 0);
        offset = 44 + n * 20 + body.len();
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"wOFF");
    be32(&mut out, flavor);
    be32(&mut out, (44 + directory.len() + body.len()) as u32);
    be16(&mut out, n as u16);
    be16(&mut out, 0);
    be32(&mut out, sfnt.len() as u32);
    be16(&mut out, 1);
    be16(&mut out, 0);
    out.extend_from_slice(&[0; 20]); // no metadata, no private block
    out.extend_from_slice(&directory);
    out.extend_from_slice(&body);
    out
}

/// Write the synthetic font under `dir` and return its path.
pub fn write_font(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, synthetic_ttf()).unwrap();
    path
}

// =========================================================================
// Document builders
// =========================================================================

/// A text block JSON value drawn in the font at `font_path`.
pub fn text_block(content: &str, grid_position: &str, font_path: &Path) -> Value {
    json!({
        "type": "title",
        "content": content,
        "gridPosition": grid_position,
        "font": {
            "name": "Square",
            "faces": [{
                "name": "Square",
                "url": font_path.to_string_lossy(),
                "weight": "normal",
                "style": "normal"
            }]
        },
        "fontSize": 40,
        "color": "#ffffff"
    })
}

/// A custom-resolution, solid-background document JSON value.
pub fn document(width: u32, height: u32, background: &str, texts: &[Value]) -> Value {
    json!({
        "Thumbnail": {
            "Resolution": {"type": "custom", "width": width, "height": height},
            "Background": {"type": "solid", "color": background},
            "Texts": texts
        },
        "TemplateMeta": {"name": "test", "shareable": false}
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_font_parses_with_expected_metrics() {
        let data = synthetic_ttf();
        let face = ttf_parser::Face::parse(&data, 0).unwrap();
        assert_eq!(face.units_per_em(), UNITS_PER_EM);
        assert_eq!(face.ascender(), ASCENDER);
        assert_eq!(face.number_of_glyphs(), NUM_GLYPHS);

        let a = face.glyph_index('A').unwrap();
        assert_eq!(face.glyph_hor_advance(a), Some(GLYPH_ADVANCE));
        let bbox = face.glyph_bounding_box(a).unwrap();
        assert_eq!((bbox.x_min, bbox.y_max), (100, 600));

        let space = face.glyph_index(' ').unwrap();
        assert_eq!(space.0, 1);
        assert_eq!(face.glyph_hor_advance(space), Some(SPACE_ADVANCE));
        assert!(face.glyph_index('é').is_none());
    }
}
