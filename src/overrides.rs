//! Command-line overrides applied to a loaded document.
//!
//! `genthumb` lets the caller swap the title, the subtitle and the
//! background image without editing the document. Override text arrives
//! from shells that disagree on how to spell a newline, so it is normalized
//! first: `\r\n` and `\r` become `\n`, then the two-character sequence
//! backslash-`n` becomes `\n` as well.

use crate::dsl::{BackgroundSpec, ImageSource, TextKind, ThumbnailDocument};
use std::path::PathBuf;

pub fn normalize_override(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n").replace("\\n", "\n")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub background_image: Option<PathBuf>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.subtitle.is_none() && self.background_image.is_none()
    }

    /// Apply to `doc` in place.
    ///
    /// Title and subtitle replace the content of every block of that kind.
    /// A background image turns the background into an image background,
    /// keeping opacity and blur when it already was one.
    pub fn apply(&self, doc: &mut ThumbnailDocument) {
        for block in &mut doc.texts {
            let replacement = match block.kind {
                TextKind::Title => self.title.as_deref(),
                TextKind::Subtitle => self.subtitle.as_deref(),
                TextKind::Custom => None,
            };
            if let Some(text) = replacement {
                block.content = normalize_override(text);
            }
        }

        if let Some(path) = &self.background_image {
            let (opacity, blur_radius) = match doc.background {
                BackgroundSpec::Image {
                    opacity,
                    blur_radius,
                    ..
                } => (opacity, blur_radius),
                _ => (1.0, 0.0),
            };
            doc.background = BackgroundSpec::Image {
                source: ImageSource::Path(path.clone()),
                opacity,
                blur_radius,
            };
        }
    }
}
