//! Overlay descriptors for the visible page
//!
//! Overlays are recomputed from the store on every pass and never cached, so a zoom
//! change only needs another `compose` call.

use doc_model::{
    Annotation, AnnotationId, AnnotationKind, AnnotationStore, AnnotationType, Color, PageRect,
    SignatureImage, SIGNATURE_MAX_HEIGHT, SIGNATURE_MAX_WIDTH,
};
use serde::Serialize;

use crate::geometry::{page_rect_to_viewport, page_to_viewport, ViewportPoint, ViewportRect, ZoomScale};

pub const HIGHLIGHT_OPACITY: f32 = 0.4;
pub const UNDERLINE_THICKNESS_PX: f32 = 2.0;
pub const COMMENT_BADGE_PX: f32 = 24.0;
const DEFAULT_HIGHLIGHT_SIZE: (f32, f32) = (100.0, 20.0);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub id: AnnotationId,
    pub kind: AnnotationType,
    pub color: Color,
    /// Hover text
    pub title: String,
    pub shape: OverlayShape,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum OverlayShape {
    FilledRect { rect: ViewportRect, opacity: f32 },
    Bar { rect: ViewportRect },
    Badge { rect: ViewportRect, number: usize },
    /// Signature image fitted inside `rect`, aspect ratio preserved
    Stamp { rect: ViewportRect, image: SignatureImage },
}

impl OverlayShape {
    pub fn rect(&self) -> ViewportRect {
        match self {
            Self::FilledRect { rect, .. }
            | Self::Bar { rect }
            | Self::Badge { rect, .. }
            | Self::Stamp { rect, .. } => *rect,
        }
    }
}

/// Overlays for `page_number`, in store order, positioned for a page drawn at `page_origin`
pub fn compose(
    store: &AnnotationStore,
    page_number: u32,
    page_origin: ViewportPoint,
    scale: ZoomScale,
) -> Vec<Overlay> {
    store
        .query(page_number)
        .into_iter()
        .enumerate()
        .map(|(index, annotation)| overlay_for(annotation, index + 1, page_origin, scale))
        .collect()
}

fn overlay_for(
    annotation: &Annotation,
    number: usize,
    page_origin: ViewportPoint,
    scale: ZoomScale,
) -> Overlay {
    let (title, shape) = match annotation.kind() {
        AnnotationKind::Highlight { area, text } => {
            let area = sized_or_default(*area);
            (
                title_or(text, "Highlighted text"),
                OverlayShape::FilledRect {
                    rect: page_rect_to_viewport(area, page_origin, scale),
                    opacity: HIGHLIGHT_OPACITY,
                },
            )
        }
        AnnotationKind::Underline { area, text } => {
            let boxed = page_rect_to_viewport(*area, page_origin, scale);
            (
                title_or(text, "Underlined text"),
                OverlayShape::Bar {
                    rect: ViewportRect::new(boxed.x, boxed.bottom(), boxed.width, UNDERLINE_THICKNESS_PX),
                },
            )
        }
        AnnotationKind::Comment { at, text } => {
            let corner = page_to_viewport(*at, page_origin, scale);
            let title = if text.is_empty() { "Click to add comment text" } else { "Click to edit comment" };
            (
                title.to_owned(),
                OverlayShape::Badge {
                    rect: ViewportRect::new(corner.x, corner.y, COMMENT_BADGE_PX, COMMENT_BADGE_PX),
                    number,
                },
            )
        }
        AnnotationKind::Signature { at, image } => {
            let stamp = PageRect::new(at.x, at.y, SIGNATURE_MAX_WIDTH, SIGNATURE_MAX_HEIGHT);
            (
                "Signature".to_owned(),
                OverlayShape::Stamp {
                    rect: page_rect_to_viewport(stamp, page_origin, scale),
                    image: image.clone(),
                },
            )
        }
    };

    Overlay {
        id: annotation.id(),
        kind: annotation.annotation_type(),
        color: annotation.color(),
        title,
        shape,
    }
}

fn sized_or_default(area: PageRect) -> PageRect {
    if area.width > 0.0 && area.height > 0.0 {
        return area;
    }
    PageRect::new(area.x, area.y, DEFAULT_HIGHLIGHT_SIZE.0, DEFAULT_HIGHLIGHT_SIZE.1)
}

fn title_or(text: &str, fallback: &str) -> String {
    if text.is_empty() {
        fallback.to_owned()
    } else {
        text.to_owned()
    }
}

/// Topmost comment badge under `point`
pub fn hit_comment_badge(overlays: &[Overlay], point: ViewportPoint) -> Option<AnnotationId> {
    overlays
        .iter()
        .rev()
        .find(|overlay| {
            matches!(overlay.shape, OverlayShape::Badge { .. }) && overlay.shape.rect().contains_point(point)
        })
        .map(|overlay| overlay.id)
}
