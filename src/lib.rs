//! # thumbnail-maker
//!
//! Renders declarative thumbnail documents into images: a canvas size, a
//! background (solid color, gradient or cover-fitted image) and text blocks
//! anchored to a 3×3 grid, each with its own font, color and optional
//! outline.
//!
//! # Pipeline
//!
//! ```text
//! JSON ─► dsl::ThumbnailDocument ─► resolution::resolve ─┬─► fonts::FontCache::ensure_all ─┬─► text ─► encode
//!                                                        └─► background::compose ─────────┘
//! ```
//!
//! Validation happens once, up front: everything after [`dsl`] works on
//! typed values and never re-checks field presence.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`dsl`] | Document model and validator; errors name the field path |
//! | [`color`] | `#rgb`/`#rrggbb`/`#rrggbbaa` and named colors |
//! | [`resolution`] | Presets, fixed ratios and custom sizes to pixels |
//! | [`fonts`] | Font acquisition, WOFF/WOFF2 conversion and the on-disk face cache |
//! | [`data_url`] | `data:` URL decoding for inline fonts and images |
//! | [`background`] | Solid, gradient and image backgrounds |
//! | [`layout`] | Line splitting, word wrap and anchor math |
//! | [`text`] | Glyph outlines, measurement, stroke and fill |
//! | [`render`] | The pipeline above, plus PNG/JPEG encoding |
//! | [`overrides`] | Title/subtitle/background replacement for `genthumb` |
//! | [`package`] | `.thl` archives bundling a document with its fonts |
//! | [`preview`] | Editor state to document, and a latest-result-wins preview worker |
//! | [`config`] | Engine configuration file |
//! | [`output`] | CLI output formatting |
//!
//! # Font Cache
//!
//! Every face is identified by its sanitized `(name, weight, style)` and
//! stored once as `<fonts_dir>/<name>-<weight>-<style>.ttf`. Once a face is
//! cached its source is never touched again, so remote fonts are downloaded
//! once per cache directory. Writes go through a temp file and a rename:
//! concurrent renders may both fetch a missing face, but nobody reads a
//! half-written file.

pub mod background;
pub mod color;
pub mod config;
pub mod data_url;
pub mod dsl;
pub mod fonts;
pub mod layout;
pub mod output;
pub mod overrides;
pub mod package;
pub mod preview;
pub mod render;
pub mod resolution;
pub mod text;

#[cfg(test)]
pub(crate) mod test_helpers;
