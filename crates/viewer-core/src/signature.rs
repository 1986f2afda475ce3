//! Freehand signature capture
//!
//! Strokes are kept as point lists in pad pixels and only rasterized on `encode`, which
//! produces the PNG data URL stored in signature annotations.

use base64::{engine::general_purpose::STANDARD, Engine};
use doc_model::{Color, SignatureImage};
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

pub const DEFAULT_PEN_WIDTH: f32 = 2.5;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signature pad is empty")]
    Empty,
    #[error("signature pad size {width}x{height} cannot be rasterized")]
    InvalidSize { width: u32, height: u32 },
    #[error("failed to encode signature: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    pen_color: Color,
    pen_width: f32,
    strokes: Vec<Vec<(f32, f32)>>,
}

impl SignaturePad {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pen_color: Color::BLACK,
            pen_width: DEFAULT_PEN_WIDTH,
            strokes: Vec::new(),
        }
    }

    pub fn with_pen(mut self, color: Color, width: f32) -> Self {
        self.pen_color = color;
        self.pen_width = width.max(0.5);
        self
    }

    pub fn pen_color(&self) -> Color {
        self.pen_color
    }

    /// Applies to every stroke on the next rasterize, including ones already drawn
    pub fn set_pen_color(&mut self, color: Color) {
        self.pen_color = color;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Record one pen-down..pen-up stroke. Non-finite points are dropped; a stroke with
    /// no usable points is ignored.
    pub fn add_stroke(&mut self, points: impl IntoIterator<Item = (f32, f32)>) {
        let stroke: Vec<(f32, f32)> =
            points.into_iter().filter(|(x, y)| x.is_finite() && y.is_finite()).collect();

        if !stroke.is_empty() {
            self.strokes.push(stroke);
        }
    }

    pub fn strokes(&self) -> &[Vec<(f32, f32)>] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    /// Draw all strokes onto a transparent surface
    pub fn rasterize(&self) -> Result<Pixmap, SignatureError> {
        let mut pixmap = Pixmap::new(self.width, self.height)
            .ok_or(SignatureError::InvalidSize { width: self.width, height: self.height })?;

        let mut paint = Paint::default();
        paint.set_color_rgba8(self.pen_color.r, self.pen_color.g, self.pen_color.b, 255);
        paint.anti_alias = true;

        let stroke = Stroke {
            width: self.pen_width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        };

        for points in &self.strokes {
            // A tap leaves a dot
            if let [(x, y)] = points.as_slice() {
                if let Some(dot) = PathBuilder::from_circle(*x, *y, self.pen_width / 2.0) {
                    pixmap.fill_path(&dot, &paint, FillRule::Winding, Transform::identity(), None);
                }
                continue;
            }

            let mut pb = PathBuilder::new();
            let (x0, y0) = points[0];
            pb.move_to(x0, y0);
            for (x, y) in &points[1..] {
                pb.line_to(*x, *y);
            }

            if let Some(path) = pb.finish() {
                pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
        }

        Ok(pixmap)
    }

    /// PNG data URL of the current drawing
    pub fn encode(&self) -> Result<SignatureImage, SignatureError> {
        if self.is_empty() {
            return Err(SignatureError::Empty);
        }

        let png = self
            .rasterize()?
            .encode_png()
            .map_err(|err| SignatureError::Encode(err.to_string()))?;

        log::debug!("encoded signature: {} strokes, {} png bytes", self.strokes.len(), png.len());
        Ok(SignatureImage::new(format!("data:image/png;base64,{}", STANDARD.encode(png))))
    }
}
