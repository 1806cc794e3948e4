//! CLI output formatting for every command.
//!
//! Each command has a pure `format_*` function returning display lines and a
//! `print_*` wrapper that writes them to stdout. The primary line names what
//! was produced; details are indented below it.
//!
//! # Output Format
//!
//! ## Generate
//!
//! ```text
//! Thumbnail 1280x720 → thumbnail.png
//!     Background: solid #a3e635
//!     001 title @ tl: 10초만에 / 썸네일 만드는 법
//!         Font: SBAggroB (bold normal) 48px
//!     002 subtitle @ bl: 쉽고 빠르게...
//!         Font: SBAggroB (normal normal) 24px
//! ```
//!
//! Disabled blocks are listed with `(disabled)` and no font line.
//!
//! ## Package
//!
//! ```text
//! Package → thumbnail.thl
//!     Document: thumbnail.json
//!     Font: SBAggroB (bold normal) packed
//!     Font: Other (normal normal) skipped: failed to fetch ...
//! ```
//!
//! ## Install
//!
//! ```text
//! Installed template.thl
//!     Font: SBAggroB (bold normal)
//! ```

use crate::dsl::{BackgroundSpec, ImageSource, TextBlock, ThumbnailDocument};
use crate::package::{DOCUMENT_ENTRY, InstalledPackage, PackageReport};
use crate::resolution;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

/// One-line rendering of block content: lines joined with ` / `.
fn content_summary(content: &str) -> String {
    let joined = content.lines().collect::<Vec<_>>().join(" / ");
    truncate(&joined, 40)
}

fn background_line(background: &BackgroundSpec) -> String {
    match background {
        BackgroundSpec::Solid(color) => format!("solid {color}"),
        BackgroundSpec::Gradient(stops) => {
            let stops: Vec<String> = stops.iter().map(ToString::to_string).collect();
            format!("gradient {}", stops.join(" → "))
        }
        BackgroundSpec::Image {
            source,
            opacity,
            blur_radius,
        } => {
            let source = match source {
                ImageSource::Path(path) => path.display().to_string(),
                ImageSource::DataUrl(url) => format!("inline image ({} bytes)", url.len()),
            };
            format!("image {source} (opacity {opacity}, blur {blur_radius})")
        }
    }
}

fn block_lines(index: usize, block: &TextBlock) -> Vec<String> {
    let header = format!(
        "{}{} {} @ {}: {}",
        indent(1),
        format_index(index),
        block.kind.name(),
        block.grid_position,
        content_summary(&block.content)
    );
    if !block.enabled {
        return vec![format!("{header} (disabled)")];
    }
    vec![
        header,
        format!(
            "{}Font: {} ({} {}) {}px",
            indent(2),
            block.font.name,
            block.font_weight,
            block.font_style,
            block.font_size
        ),
    ]
}

// ============================================================================
// Generate
// ============================================================================

/// Format the summary of a rendered thumbnail.
pub fn format_render_output(doc: &ThumbnailDocument, output: &Path) -> Vec<String> {
    let size = match resolution::resolve(&doc.resolution) {
        Ok((w, h)) => format!("{w}x{h}"),
        Err(_) => "?".to_string(),
    };
    let mut lines = vec![
        format!("Thumbnail {size} → {}", output.display()),
        format!("{}Background: {}", indent(1), background_line(&doc.background)),
    ];
    for (i, block) in doc.texts.iter().enumerate() {
        lines.extend(block_lines(i + 1, block));
    }
    lines
}

pub fn print_render_output(doc: &ThumbnailDocument, output: &Path) {
    for line in format_render_output(doc, output) {
        println!("{}", line);
    }
}

// ============================================================================
// Package
// ============================================================================

/// Format a package report: packed faces first, then skipped ones.
pub fn format_package_report(report: &PackageReport) -> Vec<String> {
    let mut lines = vec![
        format!("Package → {}", report.path.display()),
        format!("{}Document: {DOCUMENT_ENTRY}", indent(1)),
    ];
    for key in &report.packed {
        lines.push(format!("{}Font: {} packed", indent(1), key));
    }
    for failed in &report.failed {
        lines.push(format!(
            "{}Font: {} skipped: {}",
            indent(1),
            failed.key,
            failed.error
        ));
    }
    lines
}

pub fn print_package_report(report: &PackageReport) {
    for line in format_package_report(report) {
        println!("{}", line);
    }
}

/// Format what installing a package added to the font cache.
pub fn format_install_output(package: &InstalledPackage, path: &Path) -> Vec<String> {
    let mut lines = vec![format!("Installed {}", path.display())];
    for key in &package.installed {
        lines.push(format!("{}Font: {}", indent(1), key));
    }
    lines
}

pub fn print_install_output(package: &InstalledPackage, path: &Path) {
    for line in format_install_output(package, path) {
        println!("{}", line);
    }
}
