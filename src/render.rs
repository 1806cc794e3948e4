//! Rendering pipeline: document in, encoded image out.
//!
//! ```text
//! validate ─► resolve size ─┬─► ensure fonts ────────┬─► draw texts ─► encode
//!                           └─► compose background ──┘
//! ```
//!
//! Font resolution and background composition are independent and run
//! side by side on rayon. Any font failure aborts the render: the strict
//! reading of [`FontReport`](crate::fonts::FontReport).

use crate::background::{self, BackgroundError};
use crate::dsl::{TextBlock, ThumbnailDocument, ValidationError};
use crate::fonts::{self, FaceKey, FontCache, FontErrorCause, FontResolutionError, collect_faces};
use crate::layout::{self, LayoutParams};
use crate::resolution::{self, ResolutionError};
use crate::text::{self, TextError, Typeface};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tiny_skia::{IntSize, Pixmap};
use tracing::debug;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Font(#[from] FontResolutionError),
    #[error(transparent)]
    Background(#[from] BackgroundError),
    #[error("cannot read font file {path}: {source}")]
    FontRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Text {
        path: PathBuf,
        #[source]
        source: TextError,
    },
    #[error("canvas {width}x{height} is too large or cannot be rasterized")]
    Canvas { width: u32, height: u32 },
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("cannot write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Largest canvas the renderer will allocate: 8192 × 8192 pixels.
pub const MAX_CANVAS_PIXELS: u64 = 8192 * 8192;

/// Encoded output container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Format implied by a file extension, if it names one.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub margin: u32,
    pub format: OutputFormat,
    /// 1–100, used only for JPEG.
    pub jpeg_quality: u8,
    /// Font for blocks that declare no faces.
    pub fallback_font: Option<PathBuf>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            margin: layout::MARGIN,
            format: OutputFormat::Png,
            jpeg_quality: 90,
            fallback_font: None,
        }
    }
}

pub struct Renderer {
    cache: FontCache,
    options: RenderOptions,
}

impl Renderer {
    pub fn new(cache: FontCache, options: RenderOptions) -> Self {
        Self { cache, options }
    }

    pub fn cache(&self) -> &FontCache {
        &self.cache
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Validate JSON text and render it.
    pub fn render_json(&self, json: &str) -> Result<Vec<u8>, RenderError> {
        let doc = ThumbnailDocument::from_json(json)?;
        self.render(&doc)
    }

    /// Render and encode in the configured format.
    pub fn render(&self, doc: &ThumbnailDocument) -> Result<Vec<u8>, RenderError> {
        let canvas = self.render_canvas(doc)?;
        encode(&canvas, self.options.format, self.options.jpeg_quality)
    }

    /// Render and write to `path`, creating parent directories.
    pub fn render_to_path(&self, doc: &ThumbnailDocument, path: &Path) -> Result<(), RenderError> {
        let bytes = self.render(doc)?;
        let output_error = |source| RenderError::Output {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(output_error)?;
        }
        std::fs::write(path, bytes).map_err(output_error)
    }

    /// Render to an in-memory RGBA canvas without encoding.
    pub fn render_canvas(&self, doc: &ThumbnailDocument) -> Result<RgbaImage, RenderError> {
        let started = Instant::now();
        let (width, height) = resolution::resolve(&doc.resolution)?;
        check_canvas_size(width, height)?;
        let faces = collect_faces(doc.enabled_texts());

        let (report, background) = rayon::join(
            || self.cache.ensure_all(&faces),
            || background::compose(&doc.background, width, height),
        );
        let resolved: HashMap<FaceKey, PathBuf> = report
            .into_result()?
            .into_iter()
            .map(|r| (r.key, r.path))
            .collect();
        let canvas = background?;
        debug!(width, height, faces = resolved.len(), elapsed = ?started.elapsed(), "fonts and background ready");

        let mut draws = Vec::new();
        for block in doc.enabled_texts() {
            draws.push((block, self.font_path_for(block, &resolved)?));
        }

        let mut font_data: HashMap<&Path, Vec<u8>> = HashMap::new();
        for (_, path) in &draws {
            if !font_data.contains_key(path.as_path()) {
                let bytes = std::fs::read(path).map_err(|source| RenderError::FontRead {
                    path: path.clone(),
                    source,
                })?;
                font_data.insert(path.as_path(), bytes);
            }
        }

        let mut pixmap = to_pixmap(canvas)?;
        for (block, path) in &draws {
            let data = font_data.get(path.as_path()).map(Vec::as_slice).unwrap_or(&[]);
            let typeface = Typeface::from_bytes(data).map_err(|source| RenderError::Text {
                path: path.clone(),
                source,
            })?;
            let params = LayoutParams {
                canvas: (width, height),
                margin: self.options.margin,
                font_size: block.font_size,
                line_height: block.line_height,
                word_wrap: block.word_wrap,
                position: block.grid_position,
            };
            let placed = layout::layout_block(&block.content, &params, |line| {
                typeface.line_width(line, block.font_size)
            });
            for line in &placed.lines {
                text::draw_line(
                    &mut pixmap,
                    &typeface,
                    &line.text,
                    block.font_size,
                    line.x,
                    line.top,
                    block.color,
                    block.outline,
                );
            }
        }

        debug!(elapsed = ?started.elapsed(), blocks = draws.len(), "render complete");
        Ok(from_pixmap(&pixmap))
    }

    /// File the block draws with: its selected face from the cache, else the
    /// configured fallback.
    fn font_path_for(
        &self,
        block: &TextBlock,
        resolved: &HashMap<FaceKey, PathBuf>,
    ) -> Result<PathBuf, RenderError> {
        let face = match fonts::select_face(block) {
            Some(face) => FaceKey::of(face),
            None => match &self.options.fallback_font {
                Some(path) => return Ok(path.clone()),
                None => FaceKey::new(&block.font.name, &block.font_weight, &block.font_style),
            },
        };
        resolved.get(&face).cloned().ok_or_else(|| {
            FontResolutionError {
                face,
                cause: FontErrorCause::NoFace,
            }
            .into()
        })
    }
}

fn check_canvas_size(width: u32, height: u32) -> Result<(), RenderError> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_CANVAS_PIXELS {
        return Err(RenderError::Canvas { width, height });
    }
    Ok(())
}

fn to_pixmap(canvas: RgbaImage) -> Result<Pixmap, RenderError> {
    let (width, height) = canvas.dimensions();
    let size = IntSize::from_wh(width, height).ok_or(RenderError::Canvas { width, height })?;
    // The background is opaque, so straight and premultiplied bytes agree.
    Pixmap::from_vec(canvas.into_raw(), size).ok_or(RenderError::Canvas { width, height })
}

fn from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    out
}

/// Encode a canvas. Output is 8-bit RGB; the canvas is always opaque.
pub fn encode(canvas: &RgbaImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>, RenderError> {
    let rgb = image::DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
    let mut out = Vec::new();
    match format {
        OutputFormat::Png => PngEncoder::new(&mut out).write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )?,
        OutputFormat::Jpeg => JpegEncoder::new_with_quality(&mut out, jpeg_quality.clamp(1, 100))
            .write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )?,
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::source::tests::MockFetcher;
    use crate::test_helpers::{document, text_block, write_font};
    use serde_json::json;
    use sha2::{Digest, Sha256};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn renderer(tmp: &TempDir) -> (Renderer, Arc<MockFetcher>) {
        let mock = Arc::new(MockFetcher::new());
        let cache = FontCache::with_fetcher(tmp.path().join("cache"), mock.clone());
        (Renderer::new(cache, RenderOptions::default()), mock)
    }

    fn px(img: &RgbaImage, x: u32, y: u32) -> [u8; 3] {
        let p = img.get_pixel(x, y);
        [p[0], p[1], p[2]]
    }

    #[test]
    fn solid_document_without_text() {
        let tmp = TempDir::new().unwrap();
        let (r, _) = renderer(&tmp);
        let doc = ThumbnailDocument::from_value(&document(64, 48, "#336699", &[])).unwrap();
        let canvas = r.render_canvas(&doc).unwrap();
        assert_eq!(canvas.dimensions(), (64, 48));
        assert!(canvas.pixels().all(|p| p.0 == [0x33, 0x66, 0x99, 255]));
    }

    #[test]
    fn oversized_canvas_is_an_error_not_an_allocation() {
        let tmp = TempDir::new().unwrap();
        let (r, mock) = renderer(&tmp);
        for (w, h) in [(4_000_000_000, 4_000_000_000), (8193, 8192), (100_000, 1)] {
            let doc = ThumbnailDocument::from_value(&document(w, h, "#000000", &[])).unwrap();
            match r.render_canvas(&doc) {
                Err(RenderError::Canvas { width, height }) => assert_eq!((width, height), (w, h)),
                other => panic!("expected canvas error for {w}x{h}, got {other:?}"),
            }
        }
        assert!(mock.get_requests().is_empty());
    }

    #[test]
    fn largest_canvas_passes_the_size_check() {
        assert!(check_canvas_size(8192, 8192).is_ok());
        assert!(check_canvas_size(1, 8192 * 8192).is_ok());
    }

    #[test]
    fn text_is_drawn_at_its_anchor() {
        let tmp = TempDir::new().unwrap();
        let font = write_font(tmp.path(), "square.ttf");
        let (r, _) = renderer(&tmp);
        // "A" at 40px: 24px advance, glyph box 16x24 under a 32px ascent.
        let doc = ThumbnailDocument::from_value(&document(
            200,
            100,
            "#000000",
            &[text_block("A", "tl", &font)],
        ))
        .unwrap();
        let canvas = r.render_canvas(&doc).unwrap();

        // pen at (20, 20); glyph x 24..40, y 28..52
        assert_eq!(px(&canvas, 30, 40), [255, 255, 255]);
        assert_eq!(px(&canvas, 10, 40), [0, 0, 0]);
        assert_eq!(px(&canvas, 150, 80), [0, 0, 0]);
    }

    #[test]
    fn bottom_right_anchor_keeps_text_inside_the_margin() {
        let tmp = TempDir::new().unwrap();
        let font = write_font(tmp.path(), "square.ttf");
        let (r, _) = renderer(&tmp);
        let doc = ThumbnailDocument::from_value(&document(
            200,
            100,
            "#000000",
            &[text_block("A", "br", &font)],
        ))
        .unwrap();
        let canvas = r.render_canvas(&doc).unwrap();

        // block 24x44 at (156, 36): glyph x 160..176, y 44..68
        assert_eq!(px(&canvas, 168, 56), [255, 255, 255]);
        assert_eq!(px(&canvas, 190, 56), [0, 0, 0]);
    }

    #[test]
    fn later_blocks_paint_over_earlier_ones() {
        let tmp = TempDir::new().unwrap();
        let font = write_font(tmp.path(), "square.ttf");
        let (r, _) = renderer(&tmp);
        let mut red = text_block("A", "tl", &font);
        red["color"] = json!("#ff0000");
        let doc = ThumbnailDocument::from_value(&document(
            200,
            100,
            "#000000",
            &[text_block("A", "tl", &font), red],
        ))
        .unwrap();
        let canvas = r.render_canvas(&doc).unwrap();
        assert_eq!(px(&canvas, 30, 40), [255, 0, 0]);
    }

    #[test]
    fn disabled_blocks_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let font = write_font(tmp.path(), "square.ttf");
        let (r, _) = renderer(&tmp);
        let mut block = text_block("A", "tl", &font);
        block["enabled"] = json!(false);
        let doc = ThumbnailDocument::from_value(&document(200, 100, "#000000", &[block])).unwrap();
        let canvas = r.render_canvas(&doc).unwrap();
        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn font_failure_aborts_the_render() {
        let tmp = TempDir::new().unwrap();
        let (r, _) = renderer(&tmp);
        let doc = ThumbnailDocument::from_value(&document(
            200,
            100,
            "#000000",
            &[text_block("A", "tl", &tmp.path().join("missing.ttf"))],
        ))
        .unwrap();
        let err = r.render(&doc).unwrap_err();
        match err {
            RenderError::Font(e) => assert_eq!(e.face.name, "Square"),
            other => panic!("expected a font error, got {other}"),
        }
    }

    #[test]
    fn block_without_faces_uses_fallback_font() {
        let tmp = TempDir::new().unwrap();
        let font = write_font(tmp.path(), "fallback.ttf");
        let mut block = text_block("A", "tl", &tmp.path().join("unused.ttf"));
        block["font"] = json!({"name": "None", "faces": []});
        let doc = ThumbnailDocument::from_value(&document(200, 100, "#000000", &[block])).unwrap();

        let (r, _) = renderer(&tmp);
        assert!(matches!(
            r.render_canvas(&doc),
            Err(RenderError::Font(FontResolutionError {
                cause: FontErrorCause::NoFace,
                ..
            }))
        ));

        let cache = FontCache::with_fetcher(tmp.path().join("cache"), Arc::new(MockFetcher::new()));
        let with_fallback = Renderer::new(
            cache,
            RenderOptions {
                fallback_font: Some(font),
                ..RenderOptions::default()
            },
        );
        let canvas = with_fallback.render_canvas(&doc).unwrap();
        assert_eq!(px(&canvas, 30, 40), [255, 255, 255]);
    }

    #[test]
    fn rendering_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let font = write_font(tmp.path(), "square.ttf");
        let (r, _) = renderer(&tmp);
        let mut block = text_block("Hello\nWorld", "mc", &font);
        block["outline"] = json!({"thickness": 3, "color": "#ff00ff"});
        let raw = json!({
            "Thumbnail": {
                "Resolution": {"type": "preset", "value": "16:9"},
                "Background": {"type": "gradient", "colors": ["#102030", "#a0b0c0", "#000000"]},
                "Texts": [block]
            }
        })
        .to_string();

        let first = Sha256::digest(r.render_json(&raw).unwrap());
        let second = Sha256::digest(r.render_json(&raw).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn font_is_fetched_once_across_renders() {
        let tmp = TempDir::new().unwrap();
        let url = "https://fonts.test/Square.ttf";
        let mock = Arc::new(MockFetcher::serving(url, crate::test_helpers::synthetic_ttf()));
        let cache = FontCache::with_fetcher(tmp.path().join("cache"), mock.clone());
        let r = Renderer::new(cache, RenderOptions::default());
        let mut block = text_block("A", "tl", Path::new("unused"));
        block["font"]["faces"][0]["url"] = json!(url);
        let doc = ThumbnailDocument::from_value(&document(100, 100, "#000", &[block.clone(), block]))
            .unwrap();

        r.render(&doc).unwrap();
        r.render(&doc).unwrap();
        assert_eq!(mock.get_requests().len(), 1);
    }

    #[test]
    fn render_to_path_writes_requested_format() {
        let tmp = TempDir::new().unwrap();
        let cache = FontCache::with_fetcher(tmp.path().join("cache"), Arc::new(MockFetcher::new()));
        let r = Renderer::new(
            cache,
            RenderOptions {
                format: OutputFormat::Jpeg,
                ..RenderOptions::default()
            },
        );
        let doc = ThumbnailDocument::from_value(&document(32, 16, "#808080", &[])).unwrap();
        let out = tmp.path().join("nested/dir/thumb.jpg");
        r.render_to_path(&doc, &out).unwrap();

        let decoded = image::open(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
        assert_eq!(image::guess_format(&std::fs::read(&out).unwrap()).unwrap(), image::ImageFormat::Jpeg);
    }

    #[test]
    fn invalid_json_is_a_validation_error() {
        let tmp = TempDir::new().unwrap();
        let (r, _) = renderer(&tmp);
        assert!(matches!(r.render_json("[]"), Err(RenderError::Validation(_))));
    }

    #[test]
    fn output_format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a.PNG")), Some(OutputFormat::Png));
        assert_eq!(OutputFormat::from_path(Path::new("a.jpeg")), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_path(Path::new("a.webp")), None);
        assert_eq!(OutputFormat::from_path(Path::new("noext")), None);
    }
}
