//! Font resolution: from a face declared in a document to a native font
//! file on local disk.
//!
//! | Stage | Module |
//! |---|---|
//! | **Acquire** bytes (remote / local / inline) | [`source`] |
//! | **Convert** WOFF / WOFF2 to sfnt, validate | [`format`] |
//! | **Cache** atomically under `<fonts_dir>` | [`cache`] |
//!
//! Which face a block draws with is decided by [`select_face`].

pub mod cache;
pub mod format;
pub mod source;

pub use cache::{
    FaceKey, FailedFace, FontCache, FontReport, NATIVE_EXTENSION, ResolvedFace, collect_faces,
    sanitize,
};
pub use format::{FontFormat, FormatError};
pub use source::{FontFetcher, HttpFetcher, SourceError};

use crate::dsl::{FontFace, TextBlock};
use std::path::PathBuf;
use thiserror::Error;

/// A face could not be made available. Always names the face.
#[derive(Error, Debug)]
#[error("font {face} could not be resolved: {cause}")]
pub struct FontResolutionError {
    pub face: FaceKey,
    #[source]
    pub cause: FontErrorCause,
}

#[derive(Error, Debug)]
pub enum FontErrorCause {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("cannot write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("the text block declares no font faces and no fallback font is configured")]
    NoFace,
}

/// The face a block draws with: the first whose sanitized weight and style
/// match the block's, else the first face listed.
pub fn select_face(block: &TextBlock) -> Option<&FontFace> {
    let weight = sanitize(&block.font_weight);
    let style = sanitize(&block.font_style);
    block
        .font
        .faces
        .iter()
        .find(|f| sanitize(&f.weight) == weight && sanitize(&f.style) == style)
        .or_else(|| block.font.faces.first())
}
