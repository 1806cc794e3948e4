//! Pure text layout: line splitting, word wrap and anchor placement.
//!
//! Nothing here touches fonts directly. Widths come from a `measure`
//! closure so the math is testable with fixed-advance fakes.
//!
//! Placement against the 3×3 grid, with `m` the margin:
//!
//! | | left | center | right |
//! |---|---|---|---|
//! | **top** | `x = m`, `y = m` | `x = (W − w)/2` | `x = W − m − w` |
//! | **middle** | `y = (H − h)/2` | | |
//! | **bottom** | `y = H − m − h` | | |
//!
//! where `w × h` is the block's box. Each line is aligned inside the box by
//! the same column rule, so centered blocks have centered lines.

use crate::dsl::{Column, GridPosition, Row};

/// Default inset from the canvas edge, in pixels.
pub const MARGIN: u32 = 20;

/// Split content on `\n`, dropping a trailing `\r` from each line.
/// An empty string is one empty line.
pub fn split_lines(content: &str) -> Vec<String> {
    content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Greedy word wrap at whitespace. A word wider than `max_width` on its own
/// stays on its own line rather than being broken.
pub fn wrap_line(line: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    if measure(line) <= max_width {
        return vec![line.to_string()];
    }
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            out.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

/// Inputs to [`layout_block`] that do not depend on the font.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub canvas: (u32, u32),
    pub margin: u32,
    pub font_size: f32,
    pub line_height: f32,
    pub word_wrap: bool,
    pub position: GridPosition,
}

impl LayoutParams {
    /// Distance between the tops of consecutive lines.
    pub fn line_advance(&self) -> f32 {
        self.font_size * self.line_height
    }

    /// Width available to wrapped text.
    pub fn wrap_width(&self) -> f32 {
        self.canvas.0 as f32 - 2.0 * self.margin as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    /// Left edge of the line's pen start.
    pub x: f32,
    /// Top of the line box; the baseline is one ascender below.
    pub top: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockLayout {
    pub bounds: Rect,
    pub lines: Vec<PlacedLine>,
}

/// Top-left corner of a `width × height` box anchored at `position`.
pub fn anchor_origin(
    position: GridPosition,
    (width, height): (f32, f32),
    (canvas_w, canvas_h): (u32, u32),
    margin: u32,
) -> (f32, f32) {
    let (cw, ch, m) = (canvas_w as f32, canvas_h as f32, margin as f32);
    let x = column_x(position.column, width, cw, m);
    let y = match position.row {
        Row::Top => m,
        Row::Middle => (ch - height) / 2.0,
        Row::Bottom => ch - m - height,
    };
    (x, y)
}

fn column_x(column: Column, width: f32, canvas_w: f32, margin: f32) -> f32 {
    match column {
        Column::Left => margin,
        Column::Center => (canvas_w - width) / 2.0,
        Column::Right => canvas_w - margin - width,
    }
}

/// Lay out one block: split, optionally wrap, size the box and place every
/// line. Positions are snapped to whole pixels.
pub fn layout_block(content: &str, params: &LayoutParams, measure: impl Fn(&str) -> f32) -> BlockLayout {
    let mut lines = split_lines(content);
    if params.word_wrap {
        let limit = params.wrap_width();
        lines = lines
            .iter()
            .flat_map(|line| wrap_line(line, limit, &measure))
            .collect();
    }

    let widths: Vec<f32> = lines.iter().map(|l| measure(l)).collect();
    let block_w = widths.iter().copied().fold(0.0f32, f32::max);
    let block_h = lines.len() as f32 * params.line_advance();
    let (x, y) = anchor_origin(params.position, (block_w, block_h), params.canvas, params.margin);

    let placed = lines
        .into_iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (text, width))| {
            let inner = match params.position.column {
                Column::Left => 0.0,
                Column::Center => (block_w - width) / 2.0,
                Column::Right => block_w - width,
            };
            PlacedLine {
                text,
                x: (x + inner).round(),
                top: (y + i as f32 * params.line_advance()).round(),
                width,
            }
        })
        .collect();

    BlockLayout {
        bounds: Rect {
            x,
            y,
            width: block_w,
            height: block_h,
        },
        lines: placed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every char is 10px wide.
    fn mono(s: &str) -> f32 {
        s.chars().count() as f32 * 10.0
    }

    fn params(position: &str) -> LayoutParams {
        LayoutParams {
            canvas: (400, 300),
            margin: MARGIN,
            font_size: 40.0,
            line_height: 1.0,
            word_wrap: false,
            position: position.parse().unwrap(),
        }
    }

    // =========================================================================
    // Line splitting
    // =========================================================================

    #[test]
    fn split_on_newline() {
        assert_eq!(split_lines("A\nB"), vec!["A", "B"]);
    }

    #[test]
    fn split_strips_carriage_returns() {
        assert_eq!(split_lines("A\r\nB\r\n"), vec!["A", "B", ""]);
    }

    #[test]
    fn split_empty_is_one_empty_line() {
        assert_eq!(split_lines(""), vec![""]);
    }

    // =========================================================================
    // Word wrap
    // =========================================================================

    #[test]
    fn short_line_is_untouched() {
        assert_eq!(wrap_line("hello  world", 500.0, mono), vec!["hello  world"]);
    }

    #[test]
    fn wraps_greedily_at_spaces() {
        let lines = wrap_line("aaa bbb ccc ddd", 75.0, mono);
        assert_eq!(lines, vec!["aaa bbb", "ccc ddd"]);
        assert!(lines.iter().all(|l| mono(l) <= 75.0));
    }

    #[test]
    fn long_word_stays_on_its_own_line() {
        assert_eq!(
            wrap_line("a incomprehensibilities b", 50.0, mono),
            vec!["a", "incomprehensibilities", "b"]
        );
    }

    #[test]
    fn wrap_applies_per_line_in_layout() {
        let mut p = params("tl");
        p.canvas = (120, 300);
        p.word_wrap = true;
        // wrap width = 120 - 40 = 80
        let layout = layout_block("aaa bbb ccc\nshort", &p, mono);
        let texts: Vec<&str> = layout.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["aaa bbb", "ccc", "short"]);
    }

    #[test]
    fn without_wrap_lines_may_overflow() {
        let mut p = params("tl");
        p.canvas = (120, 300);
        let layout = layout_block("aaaaaaaaaaaaaaaaaaaa", &p, mono);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.bounds.width, 200.0);
    }

    // =========================================================================
    // Anchoring
    // =========================================================================

    #[test]
    fn all_nine_anchors() {
        // block: 100 x 40 on a 400 x 300 canvas, margin 20
        let cases = [
            ("tl", (20.0, 20.0)),
            ("tc", (150.0, 20.0)),
            ("tr", (280.0, 20.0)),
            ("ml", (20.0, 130.0)),
            ("mc", (150.0, 130.0)),
            ("mr", (280.0, 130.0)),
            ("bl", (20.0, 240.0)),
            ("bc", (150.0, 240.0)),
            ("br", (280.0, 240.0)),
        ];
        for (token, expected) in cases {
            let layout = layout_block("0123456789", &params(token), mono);
            assert_eq!((layout.bounds.x, layout.bounds.y), expected, "{token}");
            assert_eq!((layout.lines[0].x, layout.lines[0].top), expected, "{token}");
        }
    }

    #[test]
    fn block_height_counts_lines_and_line_height() {
        let mut p = params("tl");
        p.line_height = 1.5;
        let layout = layout_block("a\nb\nc", &p, mono);
        assert_eq!(layout.bounds.height, 3.0 * 40.0 * 1.5);
        let tops: Vec<f32> = layout.lines.iter().map(|l| l.top).collect();
        assert_eq!(tops, vec![20.0, 80.0, 140.0]);
    }

    #[test]
    fn lines_align_inside_the_block_by_column() {
        let centered = layout_block("aaaa\naa", &params("mc"), mono);
        assert_eq!(centered.lines[0].x, 180.0);
        assert_eq!(centered.lines[1].x, 190.0);

        let right = layout_block("aaaa\naa", &params("br"), mono);
        assert_eq!(right.lines[0].x + right.lines[0].width, 380.0);
        assert_eq!(right.lines[1].x + right.lines[1].width, 380.0);

        let left = layout_block("aaaa\naa", &params("bl"), mono);
        assert_eq!(left.lines[0].x, left.lines[1].x);
    }

    #[test]
    fn middle_row_centers_multi_line_blocks() {
        let layout = layout_block("a\nb", &params("ml"), mono);
        // height 80 on 300: top at 110
        assert_eq!(layout.bounds.y, 110.0);
        assert_eq!(layout.bounds.y + layout.bounds.height, 190.0);
    }
}
