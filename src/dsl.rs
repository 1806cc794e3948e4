//! Thumbnail document model and validator.
//!
//! A thumbnail document is a JSON object describing one image:
//!
//! ```text
//! {
//!   "Thumbnail": {
//!     "Resolution": { "type": "preset", "value": "16:9" },
//!     "Background": { "type": "solid", "color": "#202020" },
//!     "Texts": [ { "type": "title", "content": "Hello", "gridPosition": "mc", ... } ]
//!   },
//!   "TemplateMeta": { "name": "", "shareable": false }
//! }
//! ```
//!
//! Parsing walks the untyped [`serde_json::Value`] tree by hand rather than
//! deriving `Deserialize`, so every failure can name the exact field that
//! caused it (`Thumbnail.Texts[1].gridPosition`). The result is a typed
//! [`ThumbnailDocument`] whose sum types carry only the fields valid for
//! their kind: downstream stages never check for field presence.
//!
//! Unknown keys are ignored so newer documents still load. Missing keys
//! take the defaults the original desktop tool used (48px text, `tl`
//! anchor, 1.1 line height, 16:9 preset, white background, ...).

use crate::color::Rgba8;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_FONT_SIZE: f32 = 48.0;
pub const DEFAULT_LINE_HEIGHT: f32 = 1.1;
pub const DEFAULT_OUTLINE_THICKNESS: u32 = 4;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("document is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("invalid `{field}`: {message}")]
    Field { field: String, message: String },
}

impl ValidationError {
    fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Path of the offending field, if the error is about a specific field.
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Self::Syntax(_) => None,
            Self::Field { field, .. } => Some(field),
        }
    }
}

// ============================================================================
// Typed model
// ============================================================================

/// A validated thumbnail document. Immutable input to one render.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailDocument {
    pub resolution: ResolutionSpec,
    pub background: BackgroundSpec,
    /// Draw order: later blocks paint over earlier ones.
    pub texts: Vec<TextBlock>,
    pub meta: TemplateMeta,
}

/// Template metadata. Carried through untouched; the engine never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateMeta {
    pub name: String,
    pub shareable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSpec {
    Preset(Preset),
    FixedRatio { ratio: AspectRatio, edge: RatioEdge },
    Custom { width: u32, height: u32 },
}

impl Default for ResolutionSpec {
    fn default() -> Self {
        Self::Preset(Preset::Widescreen)
    }
}

/// The named canvas presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// `16:9`
    Widescreen,
    /// `9:16`
    Vertical,
    /// `4:3`
    Standard,
    /// `1:1`
    Square,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Widescreen,
        Preset::Vertical,
        Preset::Standard,
        Preset::Square,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Widescreen => "16:9",
            Preset::Vertical => "9:16",
            Preset::Standard => "4:3",
            Preset::Square => "1:1",
        }
    }

    pub fn ratio(self) -> AspectRatio {
        // Preset names are valid ratio strings by construction.
        let (w, h) = self.name().split_once(':').unwrap_or(("1", "1"));
        AspectRatio {
            width: w.parse().unwrap_or(1),
            height: h.parse().unwrap_or(1),
        }
    }
}

/// A `W:H` ratio with positive integer terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| format!("'{s}' is not of the form W:H"))?;
        let term = |t: &str| -> Result<u32, String> {
            match t.trim().parse::<u32>() {
                Ok(v) if v > 0 => Ok(v),
                _ => Err(format!("'{s}' must use positive integers on both sides")),
            }
        };
        Ok(Self {
            width: term(w)?,
            height: term(h)?,
        })
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// Which edge of a fixed-ratio canvas is given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioEdge {
    Width(u32),
    Height(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundSpec {
    Solid(Rgba8),
    /// Top-to-bottom, at least two stops.
    Gradient(Vec<Rgba8>),
    Image {
        source: ImageSource,
        /// `[0, 1]`
        opacity: f32,
        /// Gaussian sigma in pixels; `0` disables the blur.
        blur_radius: f32,
    },
}

impl Default for BackgroundSpec {
    fn default() -> Self {
        Self::Solid(Rgba8::WHITE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    /// Full `data:image/<fmt>;base64,<payload>` URL.
    DataUrl(String),
}

impl ImageSource {
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with("data:") {
            Self::DataUrl(raw.to_string())
        } else {
            Self::Path(PathBuf::from(raw))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKind {
    Title,
    Subtitle,
    Custom,
}

impl TextKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "subtitle" => Some(Self::Subtitle),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Subtitle => "subtitle",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Row {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Left,
    Center,
    Right,
}

/// One cell of the 3×3 anchor grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPosition {
    pub row: Row,
    pub column: Column,
}

impl GridPosition {
    pub const TOKENS: [&'static str; 9] = ["tl", "tc", "tr", "ml", "mc", "mr", "bl", "bc", "br"];
}

impl Default for GridPosition {
    fn default() -> Self {
        Self {
            row: Row::Top,
            column: Column::Left,
        }
    }
}

impl FromStr for GridPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(r), Some(c), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(format!("'{s}' is not one of {}", Self::TOKENS.join(", ")));
        };
        let row = match r {
            't' => Row::Top,
            'm' => Row::Middle,
            'b' => Row::Bottom,
            _ => return Err(format!("'{s}' is not one of {}", Self::TOKENS.join(", "))),
        };
        let column = match c {
            'l' => Column::Left,
            'c' => Column::Center,
            'r' => Column::Right,
            _ => return Err(format!("'{s}' is not one of {}", Self::TOKENS.join(", "))),
        };
        Ok(Self { row, column })
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = match self.row {
            Row::Top => 't',
            Row::Middle => 'm',
            Row::Bottom => 'b',
        };
        let c = match self.column {
            Column::Left => 'l',
            Column::Center => 'c',
            Column::Right => 'r',
        };
        write!(f, "{r}{c}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub kind: TextKind,
    /// May contain `\n`.
    pub content: String,
    pub grid_position: GridPosition,
    pub font: FontRef,
    pub font_size: f32,
    pub color: Rgba8,
    pub font_weight: String,
    pub font_style: String,
    /// Multiplier on `font_size` for the distance between baselines.
    pub line_height: f32,
    pub word_wrap: bool,
    pub outline: Option<Outline>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontRef {
    pub name: String,
    pub faces: Vec<FontFace>,
}

/// One concrete (name, weight, style) font, backed by one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFace {
    pub name: String,
    pub source: FaceSource,
    pub weight: String,
    pub style: String,
}

/// Where a face's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceSource {
    Remote(String),
    Local(PathBuf),
    /// Full `data:` URL.
    Inline(String),
}

impl FaceSource {
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with("data:") {
            Self::Inline(raw.to_string())
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Remote(raw.to_string())
        } else if let Some(path) = raw.strip_prefix("file://") {
            Self::Local(PathBuf::from(path))
        } else {
            Self::Local(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for FaceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Inline(data) => write!(f, "inline data ({} bytes)", data.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outline {
    pub thickness: u32,
    pub color: Rgba8,
}

impl ThumbnailDocument {
    /// Parse and validate a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Validate an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let root = Node::root(value).object()?;
        let thumbnail = match root.get("Thumbnail") {
            Some(node) => node.object()?,
            None => return Err(ValidationError::field("Thumbnail", "is required")),
        };

        let resolution = match thumbnail.get("Resolution") {
            Some(node) => parse_resolution(&node.object()?)?,
            None => ResolutionSpec::default(),
        };
        let background = match thumbnail.get("Background") {
            Some(node) => parse_background(&node.object()?)?,
            None => BackgroundSpec::default(),
        };
        let texts = match thumbnail.get("Texts") {
            Some(node) => node
                .array()?
                .iter()
                .map(|t| parse_text(&t.object()?))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let meta = match root.get("TemplateMeta") {
            Some(node) => {
                let obj = node.object()?;
                TemplateMeta {
                    name: obj.opt_str("name")?.unwrap_or_default().to_string(),
                    shareable: obj.opt_bool("shareable")?.unwrap_or(false),
                }
            }
            None => TemplateMeta::default(),
        };

        Ok(Self {
            resolution,
            background,
            texts,
            meta,
        })
    }

    /// Text blocks that will actually be drawn, in draw order.
    pub fn enabled_texts(&self) -> impl Iterator<Item = &TextBlock> {
        self.texts.iter().filter(|t| t.enabled)
    }
}

// ============================================================================
// Untyped tree walking
// ============================================================================

/// A JSON value together with its path from the document root.
struct Node<'a> {
    value: &'a Value,
    path: String,
}

/// A JSON object together with its path.
struct Obj<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Node<'a> {
    fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    fn display_path(&self) -> &str {
        if self.path.is_empty() {
            "(document)"
        } else {
            &self.path
        }
    }

    fn error(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::field(self.display_path(), message)
    }

    fn object(&self) -> Result<Obj<'a>, ValidationError> {
        match self.value {
            Value::Object(map) => Ok(Obj {
                map,
                path: self.path.clone(),
            }),
            _ => Err(self.error("must be an object")),
        }
    }

    fn array(&self) -> Result<Vec<Node<'a>>, ValidationError> {
        match self.value {
            Value::Array(items) => Ok(items
                .iter()
                .enumerate()
                .map(|(i, value)| Node {
                    value,
                    path: format!("{}[{i}]", self.path),
                })
                .collect()),
            _ => Err(self.error("must be an array")),
        }
    }

    fn str(&self) -> Result<&'a str, ValidationError> {
        self.value
            .as_str()
            .ok_or_else(|| self.error("must be a string"))
    }

    fn f64(&self) -> Result<f64, ValidationError> {
        self.value
            .as_f64()
            .ok_or_else(|| self.error("must be a number"))
    }

    /// Strings are taken as-is; numbers are rendered (`700` → `"700"`).
    fn string_like(&self) -> Result<String, ValidationError> {
        match self.value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(self.error("must be a string or a number")),
        }
    }

    fn positive_u32(&self) -> Result<u32, ValidationError> {
        let v = self.f64()?;
        if v.fract() != 0.0 || v < 1.0 || v > u32::MAX as f64 {
            return Err(self.error("must be a positive integer"));
        }
        Ok(v as u32)
    }

    fn positive_f32(&self) -> Result<f32, ValidationError> {
        let v = self.f64()?;
        if !v.is_finite() || v <= 0.0 {
            return Err(self.error("must be a positive number"));
        }
        Ok(v as f32)
    }

    fn color(&self) -> Result<Rgba8, ValidationError> {
        self.str()?
            .parse::<Rgba8>()
            .map_err(|e| self.error(e.to_string()))
    }
}

impl<'a> Obj<'a> {
    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    /// A present, non-null member.
    fn get(&self, key: &str) -> Option<Node<'a>> {
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(Node {
                value,
                path: self.child_path(key),
            }),
        }
    }

    fn require(&self, key: &str) -> Result<Node<'a>, ValidationError> {
        self.get(key)
            .ok_or_else(|| ValidationError::field(self.child_path(key), "is required"))
    }

    fn opt_str(&self, key: &str) -> Result<Option<&'a str>, ValidationError> {
        self.get(key).map(|n| n.str()).transpose()
    }

    fn opt_bool(&self, key: &str) -> Result<Option<bool>, ValidationError> {
        self.get(key)
            .map(|n| n.value.as_bool().ok_or_else(|| n.error("must be a boolean")))
            .transpose()
    }

    fn opt_string_like(&self, key: &str) -> Result<Option<String>, ValidationError> {
        self.get(key).map(|n| n.string_like()).transpose()
    }

    fn opt_color(&self, key: &str) -> Result<Option<Rgba8>, ValidationError> {
        self.get(key).map(|n| n.color()).transpose()
    }

    fn opt_positive_f32(&self, key: &str) -> Result<Option<f32>, ValidationError> {
        self.get(key).map(|n| n.positive_f32()).transpose()
    }

    fn kind(&self) -> Result<(&'a str, Node<'a>), ValidationError> {
        let node = self.require("type")?;
        Ok((node.str()?, node))
    }
}

// ============================================================================
// Section parsers
// ============================================================================

fn parse_resolution(obj: &Obj<'_>) -> Result<ResolutionSpec, ValidationError> {
    let (kind, kind_node) = obj.kind()?;
    match kind {
        "preset" => {
            let node = obj.require("value")?;
            let name = node.str()?;
            let preset = Preset::from_name(name).ok_or_else(|| {
                let names: Vec<&str> = Preset::ALL.iter().map(|p| p.name()).collect();
                node.error(format!("unknown preset '{name}' (expected one of {})", names.join(", ")))
            })?;
            Ok(ResolutionSpec::Preset(preset))
        }
        "fixedRatio" => {
            let node = obj.require("ratioValue")?;
            let ratio = node.str()?.parse::<AspectRatio>().map_err(|e| node.error(e))?;
            let edge = match (obj.get("width"), obj.get("height")) {
                (Some(w), _) => RatioEdge::Width(w.positive_u32()?),
                (None, Some(h)) => RatioEdge::Height(h.positive_u32()?),
                (None, None) => {
                    return Err(ValidationError::field(
                        format!("{}.width", obj.path),
                        "fixedRatio needs a width or a height",
                    ));
                }
            };
            Ok(ResolutionSpec::FixedRatio { ratio, edge })
        }
        "custom" => Ok(ResolutionSpec::Custom {
            width: obj.require("width")?.positive_u32()?,
            height: obj.require("height")?.positive_u32()?,
        }),
        other => Err(kind_node.error(format!(
            "unknown resolution type '{other}' (expected preset, fixedRatio or custom)"
        ))),
    }
}

fn parse_background(obj: &Obj<'_>) -> Result<BackgroundSpec, ValidationError> {
    let (kind, kind_node) = obj.kind()?;
    match kind {
        "solid" => Ok(BackgroundSpec::Solid(
            obj.opt_color("color")?.unwrap_or(Rgba8::WHITE),
        )),
        "gradient" => {
            let node = obj.require("colors")?;
            let colors = node
                .array()?
                .iter()
                .map(|c| c.color())
                .collect::<Result<Vec<_>, _>>()?;
            if colors.len() < 2 {
                return Err(node.error("a gradient needs at least two colors"));
            }
            Ok(BackgroundSpec::Gradient(colors))
        }
        "image" => {
            let node = obj.require("imagePath")?;
            let raw = node.str()?;
            if raw.trim().is_empty() {
                return Err(node.error("must not be empty"));
            }
            let opacity = match obj.get("imageOpacity") {
                Some(n) => {
                    let v = n.f64()?;
                    if !(0.0..=1.0).contains(&v) {
                        return Err(n.error("must be between 0 and 1"));
                    }
                    v as f32
                }
                None => 1.0,
            };
            let blur_radius = match obj.get("imageBlur") {
                Some(n) => {
                    let v = n.f64()?;
                    if !v.is_finite() || v < 0.0 {
                        return Err(n.error("must be zero or positive"));
                    }
                    v as f32
                }
                None => 0.0,
            };
            Ok(BackgroundSpec::Image {
                source: ImageSource::classify(raw),
                opacity,
                blur_radius,
            })
        }
        other => Err(kind_node.error(format!(
            "unknown background type '{other}' (expected solid, gradient or image)"
        ))),
    }
}

fn parse_text(obj: &Obj<'_>) -> Result<TextBlock, ValidationError> {
    let kind = match obj.get("type") {
        Some(node) => {
            let name = node.str()?;
            TextKind::from_name(name).ok_or_else(|| {
                node.error(format!(
                    "unknown text type '{name}' (expected title, subtitle or custom)"
                ))
            })?
        }
        None => TextKind::Custom,
    };

    let grid_position = match obj.get("gridPosition") {
        Some(node) => node.str()?.parse().map_err(|e: String| node.error(e))?,
        None => GridPosition::default(),
    };

    let font = match obj.get("font") {
        Some(node) => parse_font(&node.object()?)?,
        None => FontRef {
            name: String::new(),
            faces: Vec::new(),
        },
    };

    let outline = match obj.get("outline") {
        Some(node) => {
            let o = node.object()?;
            let thickness = match o.get("thickness") {
                Some(t) => {
                    let v = t.f64()?;
                    if v.fract() != 0.0 || v < 1.0 || v > u32::MAX as f64 {
                        return Err(t.error("outline thickness must be an integer >= 1"));
                    }
                    v as u32
                }
                None => DEFAULT_OUTLINE_THICKNESS,
            };
            Some(Outline {
                thickness,
                color: o.opt_color("color")?.unwrap_or(Rgba8::BLACK),
            })
        }
        None => None,
    };

    Ok(TextBlock {
        kind,
        content: obj.opt_str("content")?.unwrap_or_default().to_string(),
        grid_position,
        font,
        font_size: obj.opt_positive_f32("fontSize")?.unwrap_or(DEFAULT_FONT_SIZE),
        color: obj.opt_color("color")?.unwrap_or(Rgba8::BLACK),
        font_weight: obj
            .opt_string_like("fontWeight")?
            .unwrap_or_else(|| "normal".to_string()),
        font_style: obj
            .opt_string_like("fontStyle")?
            .unwrap_or_else(|| "normal".to_string()),
        line_height: obj
            .opt_positive_f32("lineHeight")?
            .unwrap_or(DEFAULT_LINE_HEIGHT),
        word_wrap: obj.opt_bool("wordWrap")?.unwrap_or(false),
        outline,
        enabled: obj.opt_bool("enabled")?.unwrap_or(true),
    })
}

fn parse_font(obj: &Obj<'_>) -> Result<FontRef, ValidationError> {
    let name = obj.opt_str("name")?.unwrap_or_default().to_string();
    let faces = match obj.get("faces") {
        Some(node) => node
            .array()?
            .iter()
            .map(|f| parse_face(&f.object()?, &name))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(FontRef { name, faces })
}

fn parse_face(obj: &Obj<'_>, family: &str) -> Result<FontFace, ValidationError> {
    let url_node = obj.require("url")?;
    let url = url_node.str()?;
    if url.trim().is_empty() {
        return Err(url_node.error("must not be empty"));
    }
    Ok(FontFace {
        name: obj
            .opt_str("name")?
            .filter(|n| !n.is_empty())
            .unwrap_or(family)
            .to_string(),
        source: FaceSource::classify(url),
        weight: obj
            .opt_string_like("weight")?
            .unwrap_or_else(|| "normal".to_string()),
        style: obj
            .opt_string_like("style")?
            .unwrap_or_else(|| "normal".to_string()),
    })
}
