//! `data:` URL decoding, shared by inline fonts and inline background images.

use base64::Engine;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("not a data: URL")]
    NotDataUrl,
    #[error("data URL has no ',' separating header and payload")]
    MissingPayload,
    #[error("invalid base64 payload: {0}")]
    Base64(String),
    #[error("invalid percent-escape in payload")]
    PercentEscape,
}

/// A decoded `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Media type from the header, if one was given (`image/png`, `font/ttf`).
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

pub fn decode(url: &str) -> Result<DataUrl, DataUrlError> {
    let rest = url
        .trim_start()
        .strip_prefix("data:")
        .ok_or(DataUrlError::NotDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUrlError::MissingPayload)?;

    let mut is_base64 = false;
    let mut mime = None;
    for (idx, segment) in header.split(';').enumerate() {
        let seg = segment.trim();
        if seg.eq_ignore_ascii_case("base64") {
            is_base64 = true;
        } else if idx == 0 && seg.contains('/') {
            mime = Some(seg.to_ascii_lowercase());
        }
    }

    let bytes = if is_base64 {
        // Line-wrapped payloads are common in hand-edited documents.
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| DataUrlError::Base64(e.to_string()))?
    } else {
        percent_decode(payload)?
    };

    Ok(DataUrl { mime, bytes })
}

fn percent_decode(input: &str) -> Result<Vec<u8>, DataUrlError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .ok_or(DataUrlError::PercentEscape)?;
            let value = (hex_value(hex[0]) << 4) | hex_value(hex[1]);
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Value of an ASCII hex digit; callers check `is_ascii_hexdigit` first.
fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}
