//! `.thl` packages: a document bundled with the fonts it draws with.
//!
//! A package is a zip archive:
//!
//! ```text
//! thumbnail.json              the document text, byte for byte
//! fonts/<name>-<weight>-<style>.ttf
//! ```
//!
//! Font entries are named exactly like their cache files, so installing a
//! package is a copy into the font cache. Packaging is lenient: a face that
//! cannot be resolved is reported and left out, the package is still
//! written.

use crate::dsl::{ThumbnailDocument, ValidationError};
use crate::fonts::{FaceKey, FailedFace, FontCache, FontResolutionError, collect_faces};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DOCUMENT_ENTRY: &str = "thumbnail.json";
pub const FONTS_DIR: &str = "fonts";
pub const PACKAGE_EXTENSION: &str = "thl";

#[derive(Error, Debug)]
pub enum PackageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid package archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("{0} has no {DOCUMENT_ENTRY}")]
    MissingDocument(PathBuf),
    #[error(transparent)]
    Font(#[from] FontResolutionError),
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> PackageError + '_ {
    move |source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Archive path of a face's font entry.
pub fn font_entry_name(key: &FaceKey) -> String {
    format!("{FONTS_DIR}/{}", key.file_name())
}

#[derive(Debug)]
pub struct PackageReport {
    pub path: PathBuf,
    pub packed: Vec<FaceKey>,
    pub failed: Vec<FailedFace>,
}

/// Bundle `json` and the fonts of its enabled text blocks into `out`.
///
/// The archive is written to a temp file next to `out` and renamed into
/// place once complete.
pub fn write_package(json: &str, cache: &FontCache, out: &Path) -> Result<PackageReport, PackageError> {
    let doc = ThumbnailDocument::from_json(json)?;
    let faces = collect_faces(&doc.texts);
    let report = cache.ensure_all(&faces);
    for failed in &report.failed {
        warn!(face = %failed.key, error = %failed.error, "font left out of package");
    }

    let dir = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    let tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_error(&dir))?;

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(tmp);
    zip.start_file(DOCUMENT_ENTRY, options)?;
    zip.write_all(json.as_bytes()).map_err(io_error(out))?;

    let mut packed = Vec::new();
    for face in &report.resolved {
        let bytes = std::fs::read(&face.path).map_err(io_error(&face.path))?;
        zip.start_file(font_entry_name(&face.key), options)?;
        zip.write_all(&bytes).map_err(io_error(out))?;
        debug!(face = %face.key, bytes = bytes.len(), "packed font");
        packed.push(face.key.clone());
    }

    let tmp = zip.finish()?;
    tmp.persist(out).map_err(|e| PackageError::Io {
        path: out.to_path_buf(),
        source: e.error,
    })?;

    Ok(PackageReport {
        path: out.to_path_buf(),
        packed,
        failed: report.failed,
    })
}

/// A package read back from disk.
#[derive(Debug)]
pub struct InstalledPackage {
    /// The document text exactly as packaged.
    pub json: String,
    pub document: ThumbnailDocument,
    /// Faces whose font entry was found in the archive.
    pub installed: Vec<FaceKey>,
}

/// Open a package, copy its fonts into `cache` and return its document.
///
/// Only entries for faces the document references are read. Fonts already
/// in the cache are kept as they are.
pub fn install_package(path: &Path, cache: &FontCache) -> Result<InstalledPackage, PackageError> {
    let file = std::fs::File::open(path).map_err(io_error(path))?;
    let mut archive = ZipArchive::new(file)?;

    let mut json = String::new();
    match archive.by_name(DOCUMENT_ENTRY) {
        Ok(mut entry) => {
            entry.read_to_string(&mut json).map_err(io_error(path))?;
        }
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(PackageError::MissingDocument(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    }
    let document = ThumbnailDocument::from_json(&json)?;

    let mut installed = Vec::new();
    for face in collect_faces(&document.texts) {
        let key = FaceKey::of(&face);
        let mut entry = match archive.by_name(&font_entry_name(&key)) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => continue,
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(io_error(path))?;
        let dest = cache.insert_native(&key, &bytes)?;
        debug!(face = %key, path = %dest.display(), "installed packaged font");
        installed.push(key);
    }

    Ok(InstalledPackage {
        json,
        document,
        installed,
    })
}

/// Whether `path` names a package rather than a bare document.
pub fn is_package_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(PACKAGE_EXTENSION))
}
