//! Annotation data model
//!
//! Annotations are anchored to a 1-based page number and store their geometry in
//! unscaled page-content coordinates: top-left origin, y growing downward, one unit per
//! document point at zoom 1.0. Zoom is applied only when mapping to the viewport.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// Stable identifier assigned when an annotation is created.
pub type AnnotationId = uuid::Uuid;

/// Largest box a signature stamp may occupy, in page units.
pub const SIGNATURE_MAX_WIDTH: f32 = 160.0;
pub const SIGNATURE_MAX_HEIGHT: f32 = 80.0;

/// Point in page-content space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned box in page-content space, anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> PagePoint {
        PagePoint::new(self.x, self.y)
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

/// Opaque RGB color, written as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);
    pub const CYAN: Color = Color::rgb(0, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components in the 0.0..=1.0 range used by PDF color operators.
    pub fn to_normalized(&self) -> (f32, f32, f32) {
        (self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::RED
    }
}

impl FromStr for Color {
    type Err = ModelError;

    /// Accepts `#rrggbb` and the `#rgb` shorthand; the leading `#` is optional.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidColor(value.to_owned());
        let hex = value.trim().trim_start_matches('#');

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());

        match hex.len() {
            6 => Ok(Color::rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                let short = |index: usize| channel(&hex[index..index + 1]).map(|v| v * 17);
                Ok(Color::rgb(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

/// Encoded signature bitmap, kept as the `data:` URL produced by the signature pad.
///
/// May be empty when a signature was stamped before any signature was drawn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureImage(String);

impl SignatureImage {
    pub fn new(data_url: impl Into<String>) -> Self {
        Self(data_url.into())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base64 payload of the data URL, if it carries one.
    pub fn base64_payload(&self) -> Option<&str> {
        let (header, payload) = self.0.split_once(',')?;
        header.ends_with(";base64").then_some(payload)
    }
}

/// Discriminant of [`AnnotationKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    Highlight,
    Underline,
    Comment,
    Signature,
}

impl AnnotationType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationType::Highlight => "highlight",
            AnnotationType::Underline => "underline",
            AnnotationType::Comment => "comment",
            AnnotationType::Signature => "signature",
        }
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific annotation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Selection bounding box plus the selected text
    Highlight { area: PageRect, text: String },
    /// Selection bounding box plus the selected text
    Underline { area: PageRect, text: String },
    /// Sticky comment marker
    Comment { at: PagePoint, text: String },
    /// Signature image stamped at a point
    Signature { at: PagePoint, image: SignatureImage },
}

impl AnnotationKind {
    pub fn annotation_type(&self) -> AnnotationType {
        match self {
            AnnotationKind::Highlight { .. } => AnnotationType::Highlight,
            AnnotationKind::Underline { .. } => AnnotationType::Underline,
            AnnotationKind::Comment { .. } => AnnotationType::Comment,
            AnnotationKind::Signature { .. } => AnnotationType::Signature,
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            AnnotationKind::Highlight { area, .. } | AnnotationKind::Underline { area, .. } => {
                area.is_finite()
            }
            AnnotationKind::Comment { at, .. } | AnnotationKind::Signature { at, .. } => {
                at.is_finite()
            }
        }
    }
}

/// A typed, page-anchored marking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    id: AnnotationId,
    page_number: u32,
    color: Color,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    kind: AnnotationKind,
}

impl Annotation {
    /// Create an annotation with a fresh id and the current time.
    pub fn new(page_number: u32, kind: AnnotationKind, color: Color) -> Result<Self, ModelError> {
        if page_number == 0 {
            return Err(ModelError::InvalidPageNumber(page_number));
        }

        if !kind.is_finite() {
            return Err(ModelError::NonFiniteGeometry);
        }

        Ok(Self {
            id: AnnotationId::new_v4(),
            page_number,
            color,
            created_at: Utc::now(),
            kind,
        })
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: AnnotationId) {
        self.id = id;
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn kind(&self) -> &AnnotationKind {
        &self.kind
    }

    pub fn annotation_type(&self) -> AnnotationType {
        self.kind.annotation_type()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Creation time as an ISO-8601 string with millisecond precision
    pub fn timestamp(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Anchor point: top-left for boxes, placement point for markers and stamps
    pub fn anchor(&self) -> PagePoint {
        match &self.kind {
            AnnotationKind::Highlight { area, .. } | AnnotationKind::Underline { area, .. } => {
                area.origin()
            }
            AnnotationKind::Comment { at, .. } | AnnotationKind::Signature { at, .. } => *at,
        }
    }

    /// Selection box for highlight and underline annotations
    pub fn area(&self) -> Option<PageRect> {
        match &self.kind {
            AnnotationKind::Highlight { area, .. } | AnnotationKind::Underline { area, .. } => {
                Some(*area)
            }
            AnnotationKind::Comment { .. } | AnnotationKind::Signature { .. } => None,
        }
    }

    /// Text content or encoded signature image
    pub fn content(&self) -> &str {
        match &self.kind {
            AnnotationKind::Highlight { text, .. }
            | AnnotationKind::Underline { text, .. }
            | AnnotationKind::Comment { text, .. } => text,
            AnnotationKind::Signature { image, .. } => image.as_str(),
        }
    }

    /// Copy of this record with its text replaced; id, page and timestamp are kept.
    ///
    /// Signatures carry image data rather than text and are returned unchanged.
    pub fn with_text(&self, new_text: impl Into<String>) -> Self {
        let mut updated = self.clone();
        match &mut updated.kind {
            AnnotationKind::Highlight { text, .. }
            | AnnotationKind::Underline { text, .. }
            | AnnotationKind::Comment { text, .. } => *text = new_text.into(),
            AnnotationKind::Signature { .. } => {}
        }
        updated
    }
}
