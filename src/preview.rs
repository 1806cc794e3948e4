//! Widget-free preview model for an interactive editor.
//!
//! An editor keeps a [`ViewState`] of plain values (what its controls show)
//! and calls [`build_document`] whenever it wants a preview. Rendering runs on
//! a [`PreviewWorker`]; each request is numbered and only the newest request's
//! result ever lands in the worker's single result slot. A slower, older
//! render that finishes late is dropped.
//!
//! ```text
//! ViewState ─► build_document ─► submit(doc) = gen N ─► thread ─► publish if N is newest
//!                                                                      │
//!                                               editor ◄─ take()/wait ─┘
//! ```

use crate::color::Rgba8;
use crate::dsl::{AspectRatio, GridPosition, Preset, ThumbnailDocument, ValidationError};
use crate::render::{RenderError, Renderer};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Web font used by a fresh editor.
pub const DEFAULT_FONT_URL: &str = "https://fastly.jsdelivr.net/gh/projectnoonnu/noonfonts_2108@1.1/SBAggroB.woff";
pub const DEFAULT_FONT_NAME: &str = "SBAggroB";

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    Preset,
    FixedRatio,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMode {
    Solid,
    /// From the background color down to black.
    Gradient,
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FontChoice {
    Url(String),
    LocalFile(PathBuf),
}

impl FontChoice {
    fn as_source(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::LocalFile(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// Controls for one text block.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPanel {
    pub content: String,
    pub position: GridPosition,
    /// Empty means [`DEFAULT_FONT_NAME`].
    pub font_name: String,
    pub font: FontChoice,
    pub font_size: f32,
    pub color: Rgba8,
    pub weight: String,
    pub style: String,
    /// Outline thickness when the outline box is ticked.
    pub outline: Option<u32>,
}

impl TextPanel {
    fn block_json(&self, kind: &str) -> Value {
        let name = if self.font_name.trim().is_empty() {
            DEFAULT_FONT_NAME.to_string()
        } else {
            self.font_name.clone()
        };
        let outline = match self.outline {
            Some(thickness) => json!({"thickness": thickness, "color": Rgba8::BLACK.to_string()}),
            None => Value::Null,
        };
        json!({
            "type": kind,
            "content": self.content,
            "gridPosition": self.position.to_string(),
            "font": {
                "name": name,
                "faces": [{
                    "name": name,
                    "url": self.font.as_source(),
                    "weight": self.weight,
                    "style": self.style
                }]
            },
            "fontSize": self.font_size,
            "color": self.color.to_string(),
            "fontWeight": self.weight,
            "fontStyle": self.style,
            "lineHeight": crate::dsl::DEFAULT_LINE_HEIGHT,
            "wordWrap": false,
            "outline": outline,
            "enabled": true
        })
    }
}

/// Everything an editor's controls hold, with no widget types.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub resolution_mode: ResolutionMode,
    /// Used by `Preset` and `FixedRatio`.
    pub aspect_ratio: AspectRatio,
    pub width: u32,
    /// Used by `Custom` only; fixed ratio derives it.
    pub height: u32,
    pub background_mode: BackgroundMode,
    pub background_color: Rgba8,
    /// `Image` mode without a path falls back to a solid background.
    pub background_image: Option<PathBuf>,
    /// 0..=100
    pub image_opacity_percent: u8,
    pub image_blur: u32,
    pub title: TextPanel,
    pub subtitle: TextPanel,
    pub subtitle_visible: bool,
    pub template_name: String,
}

impl Default for ViewState {
    fn default() -> Self {
        let font = FontChoice::Url(DEFAULT_FONT_URL.to_string());
        Self {
            resolution_mode: ResolutionMode::Preset,
            aspect_ratio: Preset::Widescreen.ratio(),
            width: 480,
            height: 270,
            background_mode: BackgroundMode::Solid,
            background_color: Rgba8::opaque(0xa3, 0xe6, 0x35),
            background_image: None,
            image_opacity_percent: 100,
            image_blur: 0,
            title: TextPanel {
                content: "10초만에\n썸네일 만드는 법".to_string(),
                position: GridPosition::default(),
                font_name: DEFAULT_FONT_NAME.to_string(),
                font: font.clone(),
                font_size: 48.0,
                color: Rgba8::opaque(0x4a, 0xde, 0x80),
                weight: "bold".to_string(),
                style: "normal".to_string(),
                outline: None,
            },
            subtitle: TextPanel {
                content: "쉽고 빠르게 썸네일을 만드는 법\n= 퀵썸네일 쓰기".to_string(),
                position: GridPosition {
                    row: crate::dsl::Row::Bottom,
                    column: crate::dsl::Column::Left,
                },
                font_name: DEFAULT_FONT_NAME.to_string(),
                font,
                font_size: 24.0,
                color: Rgba8::WHITE,
                weight: "normal".to_string(),
                style: "normal".to_string(),
                outline: None,
            },
            subtitle_visible: true,
            template_name: String::new(),
        }
    }
}

/// The document JSON a view state describes, in the wire format.
///
/// This is what an editor saves or packages; [`build_document`] validates it.
pub fn document_json(state: &ViewState) -> Value {
    let resolution = match state.resolution_mode {
        ResolutionMode::Preset => json!({"type": "preset", "value": state.aspect_ratio.to_string()}),
        ResolutionMode::FixedRatio => json!({
            "type": "fixedRatio",
            "ratioValue": state.aspect_ratio.to_string(),
            "width": state.width
        }),
        ResolutionMode::Custom => json!({"type": "custom", "width": state.width, "height": state.height}),
    };

    let color = state.background_color.to_string();
    let background = match (state.background_mode, &state.background_image) {
        (BackgroundMode::Image, Some(path)) => json!({
            "type": "image",
            "imagePath": path.to_string_lossy(),
            "imageOpacity": f32::from(state.image_opacity_percent.min(100)) / 100.0,
            "imageBlur": state.image_blur
        }),
        (BackgroundMode::Gradient, _) => json!({
            "type": "gradient",
            "colors": [color, Rgba8::BLACK.to_string()]
        }),
        _ => json!({"type": "solid", "color": color}),
    };

    let mut texts = vec![state.title.block_json("title")];
    if state.subtitle_visible {
        texts.push(state.subtitle.block_json("subtitle"));
    }

    json!({
        "Thumbnail": {
            "Resolution": resolution,
            "Background": background,
            "Texts": texts
        },
        "TemplateMeta": {"name": state.template_name, "shareable": false}
    })
}

/// Build the typed document for the current view state.
pub fn build_document(state: &ViewState) -> Result<ThumbnailDocument, PreviewError> {
    Ok(ThumbnailDocument::from_value(&document_json(state))?)
}

/// A finished preview render.
#[derive(Debug)]
pub struct Preview<T> {
    pub generation: u64,
    pub output: T,
}

/// Single-slot mailbox holding the newest published preview.
///
/// Generations only move forward: once a preview is published, nothing
/// older can replace it, even after the editor has taken it.
pub struct LatestResult<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

struct Slot<T> {
    preview: Option<Preview<T>>,
    published: u64,
}

impl<T> LatestResult<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                preview: None,
                published: 0,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Store `preview` unless a newer generation was requested or already
    /// published. Returns whether it was stored.
    fn publish(&self, preview: Preview<T>, requested: &AtomicU64) -> bool {
        let mut slot = self.lock();
        let generation = preview.generation;
        if generation <= slot.published || generation < requested.load(Ordering::SeqCst) {
            return false;
        }
        slot.published = generation;
        slot.preview = Some(preview);
        self.ready.notify_all();
        true
    }

    /// Remove and return the slot's preview, if any.
    pub fn take(&self) -> Option<Preview<T>> {
        self.lock().preview.take()
    }

    /// Block until a preview is available or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Preview<T>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        while slot.preview.is_none() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            slot = self
                .ready
                .wait_timeout(slot, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|p| p.into_inner().0);
        }
        slot.preview.take()
    }
}

type RenderFn<T> = dyn Fn(&ThumbnailDocument) -> T + Send + Sync;

/// Renders documents off the caller's thread, keeping only the newest result.
///
/// Every [`submit`](Self::submit) starts its own render thread. Nothing is
/// cancelled: a superseded render runs to completion and its output is
/// dropped.
pub struct PreviewWorker<T> {
    render: Arc<RenderFn<T>>,
    requested: Arc<AtomicU64>,
    latest: Arc<LatestResult<T>>,
}

impl<T: Send + 'static> PreviewWorker<T> {
    pub fn new(render: impl Fn(&ThumbnailDocument) -> T + Send + Sync + 'static) -> Self {
        Self {
            render: Arc::new(render),
            requested: Arc::new(AtomicU64::new(0)),
            latest: Arc::new(LatestResult::new()),
        }
    }

    /// Queue a render of `doc` and return its generation number.
    pub fn submit(&self, doc: ThumbnailDocument) -> u64 {
        let generation = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        let render = Arc::clone(&self.render);
        let requested = Arc::clone(&self.requested);
        let latest = Arc::clone(&self.latest);
        std::thread::spawn(move || {
            let output = render(&doc);
            if !latest.publish(Preview { generation, output }, &requested) {
                debug!(generation, "discarding superseded preview");
            }
        });
        generation
    }

    /// Generation of the most recent [`submit`](Self::submit), 0 before any.
    pub fn latest_generation(&self) -> u64 {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn results(&self) -> &LatestResult<T> {
        &self.latest
    }
}

impl PreviewWorker<Result<Vec<u8>, PreviewError>> {
    /// Worker producing encoded images with `renderer`.
    pub fn from_renderer(renderer: Arc<Renderer>) -> Self {
        Self::new(move |doc| renderer.render(doc).map_err(PreviewError::from))
    }
}
