//! On-disk font cache.
//!
//! One file per face at `<root>/<name>-<weight>-<style>.ttf`, every part
//! passed through [`sanitize`]. The file name is the whole cache key: an
//! existing file is a hit and is returned without touching the face's
//! source, even if that source has since moved or gone away.
//!
//! ## Concurrency
//!
//! Misses are filled by writing a temp file inside the cache directory and
//! renaming it into place, so a reader never observes a partial file. Within
//! one process a per-key mutex serializes misses for the same face, so two
//! rayon workers (or two preview renders) fetch it once. Across processes the
//! worst case is a redundant fetch; the last rename wins with identical
//! content.

use super::format::{self, FontFormat};
use super::source::{self, FontFetcher, HttpFetcher};
use super::{FontErrorCause, FontResolutionError};
use crate::dsl::{FontFace, TextBlock};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Extension of every cached face: the sfnt container the rasterizer reads.
pub const NATIVE_EXTENSION: &str = "ttf";

/// Map a string to a filesystem-safe token: ASCII alphanumerics, `-` and `_`
/// are kept, every other char becomes one `_`.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sanitized identity of a face. Two faces with the same key share one
/// cache file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceKey {
    pub name: String,
    pub weight: String,
    pub style: String,
}

impl FaceKey {
    pub fn new(name: &str, weight: &str, style: &str) -> Self {
        Self {
            name: sanitize(name),
            weight: sanitize(weight),
            style: sanitize(style),
        }
    }

    pub fn of(face: &FontFace) -> Self {
        Self::new(&face.name, &face.weight, &face.style)
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.{NATIVE_EXTENSION}",
            self.name, self.weight, self.style
        )
    }
}

impl fmt::Display for FaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.weight, self.style)
    }
}

/// Every face referenced by the given blocks, deduplicated by [`FaceKey`],
/// first occurrence wins. Disabled blocks contribute nothing.
pub fn collect_faces<'a>(texts: impl IntoIterator<Item = &'a TextBlock>) -> Vec<FontFace> {
    let mut seen = HashSet::new();
    texts
        .into_iter()
        .filter(|t| t.enabled)
        .flat_map(|t| t.font.faces.iter())
        .filter(|face| seen.insert(FaceKey::of(face)))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFace {
    pub key: FaceKey,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct FailedFace {
    pub key: FaceKey,
    pub error: FontResolutionError,
}

/// Outcome of resolving a set of faces: one entry per face, successes kept
/// apart from failures so callers choose how strict to be.
#[derive(Debug, Default)]
pub struct FontReport {
    pub resolved: Vec<ResolvedFace>,
    pub failed: Vec<FailedFace>,
}

impl FontReport {
    pub fn path_for(&self, key: &FaceKey) -> Option<&Path> {
        self.resolved
            .iter()
            .find(|r| &r.key == key)
            .map(|r| r.path.as_path())
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Strict view: the first failure becomes the error.
    pub fn into_result(mut self) -> Result<Vec<ResolvedFace>, FontResolutionError> {
        if self.failed.is_empty() {
            Ok(self.resolved)
        } else {
            Err(self.failed.remove(0).error)
        }
    }
}

/// The font cache service. Cheap to share behind `&`; all methods take
/// `&self`.
pub struct FontCache {
    root: PathBuf,
    fetcher: Arc<dyn FontFetcher>,
    locks: Mutex<HashMap<FaceKey, Arc<Mutex<()>>>>,
}

impl FontCache {
    /// Cache at `root` fetching remote faces over HTTP.
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::with_fetcher(root, Arc::new(HttpFetcher::new(timeout)))
    }

    pub fn with_fetcher(root: impl Into<PathBuf>, fetcher: Arc<dyn FontFetcher>) -> Self {
        Self {
            root: root.into(),
            fetcher,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_path(&self, face: &FontFace) -> PathBuf {
        self.path_for_key(&FaceKey::of(face))
    }

    pub fn path_for_key(&self, key: &FaceKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Make sure the face exists in the cache and return its path.
    pub fn ensure_font(&self, face: &FontFace) -> Result<PathBuf, FontResolutionError> {
        let key = FaceKey::of(face);
        let path = self.path_for_key(&key);
        if path.is_file() {
            debug!(face = %key, path = %path.display(), "font cache hit");
            return Ok(path);
        }

        let key_lock = self.key_lock(&key);
        let outcome = {
            let _guard = key_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if path.is_file() {
                debug!(face = %key, "font cached by a concurrent resolver");
                Ok(path)
            } else {
                self.acquire_into(face, &key, path)
            }
        };
        drop(key_lock);
        self.release_key_lock(&key);
        outcome
    }

    /// Fetch, convert, validate and store one face. Caller holds its key lock.
    fn acquire_into(
        &self,
        face: &FontFace,
        key: &FaceKey,
        path: PathBuf,
    ) -> Result<PathBuf, FontResolutionError> {
        let fail = |cause: FontErrorCause| FontResolutionError {
            face: key.clone(),
            cause,
        };

        debug!(face = %key, source = %face.source, "acquiring font");
        let bytes = source::acquire(&face.source, self.fetcher.as_ref())
            .map_err(|e| fail(e.into()))?;
        let (from, native) = format::to_native(bytes).map_err(|e| fail(e.into()))?;
        if from != FontFormat::TrueType {
            debug!(face = %key, from = from.name(), "converted font container");
        }
        format::validate(&native).map_err(|e| fail(e.into()))?;
        self.write_atomic(&path, &native).map_err(|source| {
            fail(FontErrorCause::Write {
                path: path.clone(),
                source,
            })
        })?;
        debug!(face = %key, path = %path.display(), bytes = native.len(), "font cached");
        Ok(path)
    }

    /// Resolve every face in parallel. Never short-circuits: each face gets
    /// its own entry in the report, in input order.
    pub fn ensure_all(&self, faces: &[FontFace]) -> FontReport {
        let outcomes: Vec<_> = faces
            .par_iter()
            .map(|face| (FaceKey::of(face), self.ensure_font(face)))
            .collect();

        let mut report = FontReport::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(path) => report.resolved.push(ResolvedFace { key, path }),
                Err(error) => report.failed.push(FailedFace { key, error }),
            }
        }
        report
    }

    /// Store ready-made native bytes under `key`, keeping an existing entry.
    pub fn insert_native(&self, key: &FaceKey, bytes: &[u8]) -> Result<PathBuf, FontResolutionError> {
        let path = self.path_for_key(key);
        if path.is_file() {
            return Ok(path);
        }
        let fail = |cause: FontErrorCause| FontResolutionError {
            face: key.clone(),
            cause,
        };
        format::validate(bytes).map_err(|e| fail(e.into()))?;
        self.write_atomic(&path, bytes).map_err(|source| {
            fail(FontErrorCause::Write {
                path: path.clone(),
                source,
            })
        })?;
        Ok(path)
    }

    fn key_lock(&self, key: &FaceKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Drop the key's lock entry once no resolver holds it.
    fn release_key_lock(&self, key: &FaceKey) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn live_key_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
