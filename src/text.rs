//! Glyph measurement and drawing.
//!
//! Outlines come from `ttf-parser` and are rasterized with `tiny-skia`.
//! A line is one path: glyphs are placed left to right by their `hmtx`
//! advance, chars without a glyph use glyph 0. An outlined line is stroked
//! first and then filled over, so the visible outline is `thickness` px
//! wide outside the glyph edge.

use crate::color::Rgba8;
use crate::dsl::Outline;
use thiserror::Error;
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};
use ttf_parser::{GlyphId, OutlineBuilder};

#[derive(Error, Debug)]
pub enum TextError {
    #[error("font cannot be parsed: {0}")]
    Parse(String),
}

/// A parsed font face borrowed from its file bytes.
pub struct Typeface<'a> {
    face: ttf_parser::Face<'a>,
}

impl<'a> Typeface<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Result<Self, TextError> {
        ttf_parser::Face::parse(data, 0)
            .map(|face| Self { face })
            .map_err(|e| TextError::Parse(e.to_string()))
    }

    fn scale(&self, size: f32) -> f32 {
        size / self.face.units_per_em() as f32
    }

    fn glyph(&self, c: char) -> GlyphId {
        self.face.glyph_index(c).unwrap_or(GlyphId(0))
    }

    /// Distance from the line top to the baseline at `size`.
    pub fn ascent(&self, size: f32) -> f32 {
        self.face.ascender() as f32 * self.scale(size)
    }

    /// Advance width of `text` at `size`, in pixels.
    pub fn line_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .map(|c| self.face.glyph_hor_advance(self.glyph(c)).unwrap_or(0) as u32)
            .sum();
        units as f32 * self.scale(size)
    }

    /// Outline of a whole line with its pen starting at `x` on `baseline`.
    /// `None` when no glyph has an outline (empty or all-space lines).
    pub fn line_path(&self, text: &str, size: f32, x: f32, baseline: f32) -> Option<Path> {
        let scale = self.scale(size);
        let mut pen = PathPen {
            builder: PathBuilder::new(),
            scale,
            x,
            y: baseline,
        };
        for c in text.chars() {
            let glyph = self.glyph(c);
            // Glyphs with no outline (spaces) return None and add nothing.
            let _ = self.face.outline_glyph(glyph, &mut pen);
            pen.x += self.face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
        }
        pen.builder.finish()
    }
}

/// Maps font units (y up) onto canvas pixels (y down) at the pen position.
struct PathPen {
    builder: PathBuilder,
    scale: f32,
    x: f32,
    y: f32,
}

impl OutlineBuilder for PathPen {
    fn move_to(&mut self, px: f32, py: f32) {
        self.builder
            .move_to(self.x + px * self.scale, self.y - py * self.scale);
    }

    fn line_to(&mut self, px: f32, py: f32) {
        self.builder
            .line_to(self.x + px * self.scale, self.y - py * self.scale);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, px: f32, py: f32) {
        self.builder.quad_to(
            self.x + x1 * self.scale,
            self.y - y1 * self.scale,
            self.x + px * self.scale,
            self.y - py * self.scale,
        );
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, px: f32, py: f32) {
        self.builder.cubic_to(
            self.x + x1 * self.scale,
            self.y - y1 * self.scale,
            self.x + x2 * self.scale,
            self.y - y2 * self.scale,
            self.x + px * self.scale,
            self.y - py * self.scale,
        );
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn paint_for(color: Rgba8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

/// Draw one line of text whose line box starts at (`x`, `top`).
#[allow(clippy::too_many_arguments)]
pub fn draw_line(
    pixmap: &mut Pixmap,
    typeface: &Typeface<'_>,
    text: &str,
    size: f32,
    x: f32,
    top: f32,
    color: Rgba8,
    outline: Option<Outline>,
) {
    let baseline = top + typeface.ascent(size);
    let Some(path) = typeface.line_path(text, size, x, baseline) else {
        return;
    };

    if let Some(outline) = outline {
        let stroke = Stroke {
            width: 2.0 * outline.thickness as f32,
            line_join: LineJoin::Round,
            line_cap: LineCap::Round,
            ..Default::default()
        };
        pixmap.stroke_path(&path, &paint_for(outline.color), &stroke, Transform::identity(), None);
    }
    pixmap.fill_path(&path, &paint_for(color), FillRule::Winding, Transform::identity(), None);
}
