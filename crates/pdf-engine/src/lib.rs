//! PDF collaborators for docsign
//!
//! `PdfEngine` is the rendering side (page count, page boxes, page surfaces) and
//! [`export`] bakes stored annotations into a copy of the source document.

pub mod cancel;
pub mod export;

pub use cancel::CancellationToken;
pub use export::{export_annotated, ExportError, PageFrame};

use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Page size used when a page carries no usable box (US Letter).
const FALLBACK_PAGE_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAGE_EDGE: Rgba<u8> = Rgba([220, 220, 220, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
}

/// Rendering collaborator: page metadata and rasterized page surfaces
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, Vec<PageSize>>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let sizes: Vec<PageSize> = doc
            .get_pages()
            .into_values()
            .map(|page_id| {
                let [x0, y0, x1, y1] = visible_page_box(&doc, page_id);
                let (width_pt, height_pt) = ((x1 - x0).abs(), (y1 - y0).abs());
                match page_rotation(&doc, page_id) {
                    90 | 270 => PageSize { width_pt: height_pt, height_pt: width_pt },
                    _ => PageSize { width_pt, height_pt },
                }
            })
            .collect();

        if sizes.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        Ok(sizes)
    }

    fn sizes(&self, handle: DocumentHandle) -> Result<&[PageSize], PdfEngineError> {
        self.docs
            .get(&handle)
            .map(Vec::as_slice)
            .ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;
        log::debug!("opened document with {} pages", page_sizes.len());

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, page_sizes);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.sizes(handle)?.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let sizes = self.sizes(handle)?;
        sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut surface = RgbaImage::from_pixel(width, height, PAPER);
        outline_page(&mut surface);

        Ok(surface)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

/// One-pixel page edge so a blank page stays visible against the container
fn outline_page(surface: &mut RgbaImage) {
    let (width, height) = surface.dimensions();
    if width < 4 || height < 4 {
        return;
    }

    for (x, y, pixel) in surface.enumerate_pixels_mut() {
        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
            *pixel = PAGE_EDGE;
        }
    }
}

/// The box a viewer displays: CropBox when present, otherwise MediaBox, following
/// inheritance through the page tree. Returned as `[llx, lly, urx, ury]`.
pub(crate) fn visible_page_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    inherited_box(doc, page_id, b"CropBox")
        .or_else(|| inherited_box(doc, page_id, b"MediaBox"))
        .unwrap_or(FALLBACK_PAGE_BOX)
}

/// Clockwise display rotation of a page (`/Rotate`, inheritable), normalized to 0, 90,
/// 180 or 270. Values that are not a multiple of 90 are treated as 0.
pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> u16 {
    let Some(raw) = inherited(doc, page_id, b"Rotate") else {
        return 0;
    };

    let degrees = match raw {
        Object::Reference(id) => doc.get_object(*id).and_then(Object::as_i64),
        other => other.as_i64(),
    };

    match degrees.map(|value| value.rem_euclid(360)) {
        Ok(value @ (0 | 90 | 180 | 270)) => value as u16,
        Ok(value) => {
            log::warn!("ignoring /Rotate {value} on page {page_id:?}");
            0
        }
        Err(_) => 0,
    }
}

fn inherited_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
    parse_box(doc, inherited(doc, page_id, key)?)
}

/// Look `key` up on the page, then on each ancestor in the page tree
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);

    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;

        if let Ok(raw) = dict.get(key) {
            return Some(raw);
        }

        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

fn parse_box(doc: &Document, raw: &Object) -> Option<[f32; 4]> {
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };

    let array = resolved.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;

    Some([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}
