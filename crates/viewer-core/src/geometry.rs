//! Viewport <-> page coordinate mapping
//!
//! Viewport coordinates are pixels on the display surface. Page coordinates are unscaled
//! document units with the page's top-left corner at the origin. The two differ by the
//! page's on-screen origin and the zoom scale.

use doc_model::{PagePoint, PageRect};
use serde::Serialize;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 2.0;
pub const ZOOM_STEP: f32 = 0.1;

/// Zoom factor, always within `[MIN_ZOOM, MAX_ZOOM]` and on a `ZOOM_STEP` increment
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ZoomScale(f32);

impl ZoomScale {
    pub fn new(scale: f32) -> Self {
        if !scale.is_finite() {
            return Self::default();
        }

        let tenths = (scale.clamp(MIN_ZOOM, MAX_ZOOM) / ZOOM_STEP).round();
        Self(tenths / 10.0)
    }

    pub fn from_percent(percent: u16) -> Self {
        Self::new(f32::from(percent) / 100.0)
    }

    pub fn get(self) -> f32 {
        self.0
    }

    pub fn percent(self) -> u16 {
        (self.0 * 100.0).round() as u16
    }

    pub fn zoom_in(self) -> Self {
        Self::new(self.0 + ZOOM_STEP)
    }

    pub fn zoom_out(self) -> Self {
        Self::new(self.0 - ZOOM_STEP)
    }

    pub fn is_max(self) -> bool {
        self.0 >= MAX_ZOOM
    }

    pub fn is_min(self) -> bool {
        self.0 <= MIN_ZOOM
    }
}

impl Default for ZoomScale {
    fn default() -> Self {
        Self(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ViewportPoint {
    pub x: f32,
    pub y: f32,
}

impl ViewportPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> ViewportPoint {
        ViewportPoint::new(self.x, self.y)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Edges are inclusive
    pub fn contains_point(&self, point: ViewportPoint) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    pub fn contains_rect(&self, other: &ViewportRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

pub fn viewport_to_page(point: ViewportPoint, page_origin: ViewportPoint, scale: ZoomScale) -> PagePoint {
    let scale = scale.get();
    PagePoint::new((point.x - page_origin.x) / scale, (point.y - page_origin.y) / scale)
}

pub fn page_to_viewport(point: PagePoint, page_origin: ViewportPoint, scale: ZoomScale) -> ViewportPoint {
    let scale = scale.get();
    ViewportPoint::new(page_origin.x + point.x * scale, page_origin.y + point.y * scale)
}

pub fn viewport_rect_to_page(rect: ViewportRect, page_origin: ViewportPoint, scale: ZoomScale) -> PageRect {
    let origin = viewport_to_page(rect.origin(), page_origin, scale);
    PageRect::new(origin.x, origin.y, rect.width / scale.get(), rect.height / scale.get())
}

pub fn page_rect_to_viewport(rect: PageRect, page_origin: ViewportPoint, scale: ZoomScale) -> ViewportRect {
    let origin = page_to_viewport(rect.origin(), page_origin, scale);
    ViewportRect::new(origin.x, origin.y, rect.width * scale.get(), rect.height * scale.get())
}
