//! Engine configuration.
//!
//! Read from an optional TOML file. Every key has a default, so a config
//! file only lists what it changes. Without `--config`, a
//! `thumbnail-maker.toml` in the working directory is picked up if present.
//!
//! ## Configuration Options
//!
//! ```toml
//! fonts_dir = "fonts"          # font cache directory
//!
//! [fetch]
//! timeout_secs = 30            # remote font download timeout
//! max_font_mib = 64            # largest accepted font download
//!
//! [layout]
//! margin = 20                  # anchor inset in pixels
//!
//! [output]
//! format = "png"               # png | jpeg
//! jpeg_quality = 90            # 1-100
//! # fallback_font = "/path/to/font.ttf"
//!
//! [processing]
//! # max_threads = 4            # omit for CPU count
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::fonts::{FontCache, HttpFetcher};
use crate::layout::MARGIN;
use crate::render::{OutputFormat, RenderOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Looked up in the working directory when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "thumbnail-maker.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Font cache directory.
    pub fonts_dir: PathBuf,
    pub fetch: FetchConfig,
    pub layout: LayoutConfig,
    pub output: OutputConfig,
    pub processing: ProcessingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fonts_dir: PathBuf::from("fonts"),
            fetch: FetchConfig::default(),
            layout: LayoutConfig::default(),
            output: OutputConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be at least 1".into(),
            ));
        }
        if self.fetch.max_font_mib == 0 {
            return Err(ConfigError::Validation(
                "fetch.max_font_mib must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::Validation(
                "output.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be at least 1".into(),
            ));
        }
        if self.fonts_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation("fonts_dir must not be empty".into()));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            margin: self.layout.margin,
            format: self.output.format,
            jpeg_quality: self.output.jpeg_quality,
            fallback_font: self.output.fallback_font.clone(),
        }
    }

    /// Font cache rooted at `fonts_dir`, fetching over HTTP.
    pub fn font_cache(&self) -> FontCache {
        let fetcher = HttpFetcher::new(self.fetch_timeout())
            .with_max_bytes(self.fetch.max_font_mib.saturating_mul(1024 * 1024));
        FontCache::with_fetcher(&self.fonts_dir, Arc::new(fetcher))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Whole-request timeout for remote font downloads.
    pub timeout_secs: u64,
    /// Largest font download accepted, in MiB.
    pub max_font_mib: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_font_mib: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Inset of anchored text from the canvas edges, in pixels.
    pub margin: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { margin: MARGIN }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Used when the output path's extension names no format.
    pub format: OutputFormat,
    pub jpeg_quality: u8,
    /// Font for text blocks that declare no faces.
    pub fallback_font: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            jpeg_quality: 90,
            fallback_font: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum rayon worker threads. When absent, defaults to the number of
    /// CPU cores. Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load the engine config.
///
/// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] in
/// `dir` is used when present, stock defaults otherwise.
pub fn load_config(path: Option<&Path>, dir: &Path) -> Result<EngineConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let candidate = dir.join(DEFAULT_CONFIG_FILE);
            if !candidate.is_file() {
                return Ok(EngineConfig::default());
            }
            candidate
        }
    };
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    parse_config(&content)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# thumbnail-maker configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass the file with --config, or name it thumbnail-maker.toml in the
# directory you run from. Unknown keys will cause an error.

# Directory holding downloaded and converted fonts, one
# <name>-<weight>-<style>.ttf per face. Shared across runs.
fonts_dir = "fonts"

# ---------------------------------------------------------------------------
# Remote font downloads
# ---------------------------------------------------------------------------
[fetch]
# Whole-request timeout in seconds.
timeout_secs = 30

# Largest font download accepted, in MiB. Full CJK faces can pass 20 MiB.
max_font_mib = 64

# ---------------------------------------------------------------------------
# Text placement
# ---------------------------------------------------------------------------
[layout]
# Distance in pixels between anchored text and the canvas edges.
margin = 20

# ---------------------------------------------------------------------------
# Encoded output
# ---------------------------------------------------------------------------
[output]
# png or jpeg. An output path ending in .png/.jpg/.jpeg takes precedence.
format = "png"

# JPEG quality (1-100).
jpeg_quality = 90

# Font used by text blocks that declare no font faces.
# fallback_font = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"

# ---------------------------------------------------------------------------
# Parallelism
# ---------------------------------------------------------------------------
[processing]
# Maximum worker threads for font resolution and compositing.
# Omit to use all CPU cores. Larger values are clamped to the core count.
# max_threads = 4
"##
}
