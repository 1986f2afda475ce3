//! Export serializer
//!
//! Bakes stored annotations into a copy of the source PDF. Annotation geometry lives in
//! top-left page space; every page is mapped into its native bottom-left PDF space via
//! [`PageFrame`] before anything is drawn.
//!
//! - highlight: translucent filled rectangle in the page content
//! - underline: stroked line along the bottom edge of the selection box
//! - comment: `/Text` annotation object (sticky note)
//! - signature: RGB image XObject with an alpha `/SMask`, drawn into the page content
//!
//! The source bytes are never modified; a failed or cancelled export returns an error and
//! nothing else.

use base64::{engine::general_purpose::STANDARD, Engine};
use doc_model::{
    Annotation, AnnotationKind, Color, PagePoint, PageRect, SignatureImage, SIGNATURE_MAX_HEIGHT,
    SIGNATURE_MAX_WIDTH,
};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, HashMap};

use crate::cancel::CancellationToken;
use crate::{page_rotation, visible_page_box};

const HIGHLIGHT_ALPHA: f32 = 0.4;
const HIGHLIGHT_STATE: &str = "DsHighlight";
const UNDERLINE_WIDTH_PT: f32 = 1.5;
const COMMENT_ICON_PT: f32 = 24.0;
/// Annotation flag bit 3: print the annotation
const ANNOT_FLAG_PRINT: i64 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to load source document: {0}")]
    Load(#[source] lopdf::Error),
    #[error("PDF mutation failed: {0}")]
    Mutation(#[from] lopdf::Error),
    #[error("failed to write annotated document: {0}")]
    Save(String),
    #[error("annotation on page {page} but document has {page_count} pages")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("signature image could not be decoded: {0}")]
    SignatureDecode(String),
    #[error("page object {0:?} is not a dictionary")]
    MalformedPage(ObjectId),
    #[error("export cancelled")]
    Cancelled,
}

/// Native frame of one page: lower-left corner and size of its visible box in points,
/// plus the clockwise `/Rotate` a viewer applies when displaying it.
///
/// Page points are top-left based and measured on the page as displayed, so on a page
/// rotated by 90 or 270 degrees the displayed width is the box height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    pub llx: f32,
    pub lly: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: u16,
}

impl PageFrame {
    pub fn from_box(page_box: [f32; 4]) -> Self {
        Self::rotated(page_box, 0)
    }

    pub fn rotated([x0, y0, x1, y1]: [f32; 4], rotation: u16) -> Self {
        Self { llx: x0, lly: y0, width: x1 - x0, height: y1 - y0, rotation: rotation % 360 }
    }

    /// Displayed top-left page point to bottom-left PDF user space
    pub fn to_pdf_point(&self, point: PagePoint) -> (f32, f32) {
        let PagePoint { x, y } = point;
        let (dx, dy) = match self.rotation {
            90 => (y, x),
            180 => (self.width - x, y),
            270 => (self.width - y, self.height - x),
            _ => (x, self.height - y),
        };
        (self.llx + dx, self.lly + dy)
    }

    /// Displayed top-left page box to `[llx, lly, urx, ury]` in PDF user space
    pub fn to_pdf_rect(&self, rect: PageRect) -> [f32; 4] {
        let (ax, ay) = self.to_pdf_point(rect.origin());
        let (bx, by) = self.to_pdf_point(PagePoint::new(rect.right(), rect.bottom()));
        [ax.min(bx), ay.min(by), ax.max(bx), ay.max(by)]
    }

    /// `cm` operands placing a unit-square image upright over the displayed box `rect`
    fn image_matrix(&self, rect: PageRect) -> [f32; 6] {
        let (ex, ey) = self.to_pdf_point(PagePoint::new(rect.x, rect.bottom()));
        let (rx, ry) = self.to_pdf_point(PagePoint::new(rect.right(), rect.bottom()));
        let (ux, uy) = self.to_pdf_point(rect.origin());
        [rx - ex, ry - ey, ux - ex, uy - ey, ex, ey]
    }
}

/// Produce a new document with `annotations` baked in.
pub fn export_annotated<'a, I>(
    source: &[u8],
    annotations: I,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, ExportError>
where
    I: IntoIterator<Item = &'a Annotation>,
{
    let mut doc = Document::load_mem(source).map_err(ExportError::Load)?;
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;

    let mut by_page: BTreeMap<u32, Vec<&Annotation>> = BTreeMap::new();
    for annotation in annotations {
        by_page.entry(annotation.page_number()).or_default().push(annotation);
    }

    let mut images = ImageCache::default();

    for (page_number, page_annotations) in by_page {
        let page_id = *pages
            .get(&page_number)
            .ok_or(ExportError::PageOutOfRange { page: page_number, page_count })?;

        let mut painter = PagePainter::new(&doc, page_id);
        for annotation in page_annotations {
            if cancel.is_cancelled() {
                log::info!("export cancelled before page {page_number} was finished");
                return Err(ExportError::Cancelled);
            }
            painter.paint(&mut doc, &mut images, annotation)?;
        }
        painter.commit(&mut doc)?;
    }

    if cancel.is_cancelled() {
        return Err(ExportError::Cancelled);
    }

    let mut output = Vec::new();
    doc.save_to(&mut output).map_err(|err| ExportError::Save(err.to_string()))?;

    log::info!("exported {} bytes across {page_count} pages", output.len());
    Ok(output)
}

/// Signature XObjects already embedded in this export, keyed by data URL
#[derive(Default)]
struct ImageCache {
    embedded: HashMap<String, EmbeddedImage>,
}

#[derive(Clone, Copy)]
struct EmbeddedImage {
    id: ObjectId,
    width_px: u32,
    height_px: u32,
}

impl ImageCache {
    fn embed(
        &mut self,
        doc: &mut Document,
        image: &SignatureImage,
    ) -> Result<EmbeddedImage, ExportError> {
        if let Some(existing) = self.embedded.get(image.as_str()) {
            return Ok(*existing);
        }

        let payload = image
            .base64_payload()
            .ok_or_else(|| ExportError::SignatureDecode("not a base64 data URL".to_owned()))?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|err| ExportError::SignatureDecode(err.to_string()))?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| ExportError::SignatureDecode(err.to_string()))?
            .to_rgba8();

        let (width_px, height_px) = decoded.dimensions();
        let mut rgb = Vec::with_capacity((width_px * height_px * 3) as usize);
        let mut alpha = Vec::with_capacity((width_px * height_px) as usize);
        for pixel in decoded.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let smask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width_px as i64,
                "Height" => height_px as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));
        let id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width_px as i64,
                "Height" => height_px as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "SMask" => smask_id,
            },
            rgb,
        ));

        let embedded = EmbeddedImage { id, width_px, height_px };
        self.embedded.insert(image.as_str().to_owned(), embedded);
        Ok(embedded)
    }
}

/// Accumulates drawing operations, resources and annotation objects for one page
struct PagePainter {
    page_id: ObjectId,
    frame: PageFrame,
    content: String,
    ext_gstates: Dictionary,
    xobjects: Dictionary,
    annots: Vec<Object>,
}

impl PagePainter {
    fn new(doc: &Document, page_id: ObjectId) -> Self {
        let page_box = visible_page_box(doc, page_id);
        Self {
            page_id,
            frame: PageFrame::rotated(page_box, page_rotation(doc, page_id)),
            content: String::new(),
            ext_gstates: Dictionary::new(),
            xobjects: Dictionary::new(),
            annots: Vec::new(),
        }
    }

    fn paint(
        &mut self,
        doc: &mut Document,
        images: &mut ImageCache,
        annotation: &Annotation,
    ) -> Result<(), ExportError> {
        let color = annotation.color();

        match annotation.kind() {
            AnnotationKind::Highlight { area, .. } => self.fill_highlight(*area, color),
            AnnotationKind::Underline { area, .. } => self.stroke_underline(*area, color),
            AnnotationKind::Comment { at, text } => {
                let annot_id = doc.add_object(self.comment_dict(annotation, *at, text, color));
                self.annots.push(Object::Reference(annot_id));
            }
            AnnotationKind::Signature { at, image } => {
                if image.is_empty() {
                    log::warn!("skipping signature {} without image data", annotation.id());
                    return Ok(());
                }
                let embedded = images.embed(doc, image)?;
                self.draw_signature(*at, embedded);
            }
        }

        Ok(())
    }

    fn fill_highlight(&mut self, area: PageRect, color: Color) {
        if !self.ext_gstates.has(HIGHLIGHT_STATE.as_bytes()) {
            self.ext_gstates.set(
                HIGHLIGHT_STATE,
                dictionary! {
                    "Type" => "ExtGState",
                    "ca" => HIGHLIGHT_ALPHA,
                    "CA" => HIGHLIGHT_ALPHA,
                },
            );
        }

        let [x0, y0, x1, y1] = self.frame.to_pdf_rect(area);
        let (r, g, b) = color.to_normalized();
        self.content.push_str(&format!(
            "q /{HIGHLIGHT_STATE} gs {r:.3} {g:.3} {b:.3} rg {x0:.3} {y0:.3} {:.3} {:.3} re f Q\n",
            x1 - x0,
            y1 - y0,
        ));
    }

    fn stroke_underline(&mut self, area: PageRect, color: Color) {
        let (x0, y0) = self.frame.to_pdf_point(PagePoint::new(area.x, area.bottom()));
        let (x1, y1) = self.frame.to_pdf_point(PagePoint::new(area.right(), area.bottom()));
        let (r, g, b) = color.to_normalized();
        self.content.push_str(&format!(
            "q {r:.3} {g:.3} {b:.3} RG {UNDERLINE_WIDTH_PT:.3} w {x0:.3} {y0:.3} m {x1:.3} {y1:.3} l S Q\n"
        ));
    }

    fn draw_signature(&mut self, at: PagePoint, image: EmbeddedImage) {
        let name = format!("DsSig{}", image.id.0);
        self.xobjects.set(name.as_str(), Object::Reference(image.id));

        let (width, height) = fit_signature(image.width_px as f32, image.height_px as f32);
        let [a, b, c, d, e, f] = self.frame.image_matrix(PageRect::new(at.x, at.y, width, height));
        self.content.push_str(&format!(
            "q {a:.3} {b:.3} {c:.3} {d:.3} {e:.3} {f:.3} cm /{name} Do Q\n"
        ));
    }

    fn comment_dict(&self, annotation: &Annotation, at: PagePoint, text: &str, color: Color) -> Dictionary {
        let [x0, y0, x1, y1] =
            self.frame.to_pdf_rect(PageRect::new(at.x, at.y, COMMENT_ICON_PT, COMMENT_ICON_PT));
        let (r, g, b) = color.to_normalized();
        let modified = annotation.created_at().format("D:%Y%m%d%H%M%SZ").to_string();

        dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "Rect" => vec![
                Object::Real(x0),
                Object::Real(y0),
                Object::Real(x1),
                Object::Real(y1),
            ],
            "Contents" => text_string(text),
            "C" => vec![Object::Real(r), Object::Real(g), Object::Real(b)],
            "Name" => "Comment",
            "NM" => Object::String(annotation.id().to_string().into_bytes(), StringFormat::Literal),
            "M" => Object::String(modified.into_bytes(), StringFormat::Literal),
            "F" => ANNOT_FLAG_PRINT,
            "P" => self.page_id,
        }
    }

    /// Write the collected content, resources and annotations into the page.
    fn commit(self, doc: &mut Document) -> Result<(), ExportError> {
        if self.content.is_empty() && self.annots.is_empty() {
            return Ok(());
        }

        let mut resources = resolve_dict(doc, inherited_resources(doc, self.page_id));
        merge_subdict(doc, &mut resources, b"ExtGState", &self.ext_gstates);
        merge_subdict(doc, &mut resources, b"XObject", &self.xobjects);

        let mut contents = existing_contents(doc, self.page_id)?;
        if !self.content.is_empty() {
            if !contents.is_empty() {
                // Keep the original content's graphics state from leaking into ours
                let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
                let close = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
                contents.insert(0, Object::Reference(open));
                contents.push(Object::Reference(close));
            }
            let ours = doc.add_object(Stream::new(Dictionary::new(), self.content.into_bytes()));
            contents.push(Object::Reference(ours));
        }

        let mut annots = existing_annots(doc, self.page_id);
        annots.extend(self.annots);

        let page = doc
            .get_object_mut(self.page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| ExportError::MalformedPage(self.page_id))?;

        page.set("Resources", resources);
        if !contents.is_empty() {
            page.set("Contents", contents);
        }
        if !annots.is_empty() {
            page.set("Annots", annots);
        }

        Ok(())
    }
}

/// Shrink a signature to fit the stamp box, never enlarging it
fn fit_signature(width_px: f32, height_px: f32) -> (f32, f32) {
    if width_px <= 0.0 || height_px <= 0.0 {
        return (SIGNATURE_MAX_WIDTH, SIGNATURE_MAX_HEIGHT);
    }

    let factor = (SIGNATURE_MAX_WIDTH / width_px).min(SIGNATURE_MAX_HEIGHT / height_px).min(1.0);
    (width_px * factor, height_px * factor)
}

/// PDF text string: literal for ASCII, UTF-16BE with byte order mark otherwise
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<Object> {
    let mut current = Some(page_id);

    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(resources) = dict.get(b"Resources") {
            return Some(resources.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

/// Owned copy of a dictionary that may be given directly or by reference
fn resolve_dict(doc: &Document, object: Option<Object>) -> Dictionary {
    match object {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc.get_dictionary(id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

fn merge_subdict(doc: &Document, resources: &mut Dictionary, key: &[u8], additions: &Dictionary) {
    if additions.is_empty() {
        return;
    }

    let mut merged = resolve_dict(doc, resources.get(key).ok().cloned());
    for (name, value) in additions.iter() {
        merged.set(name.clone(), value.clone());
    }
    resources.set(key.to_vec(), merged);
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, ExportError> {
    let page = doc.get_dictionary(page_id).map_err(|_| ExportError::MalformedPage(page_id))?;

    let contents = match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    Ok(contents)
}

fn existing_annots(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };

    match page.get(b"Annots") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => {
            doc.get_object(*id).and_then(Object::as_array).cloned().unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{letter_pdf, pdf_with_boxes, rotated_letter_pdf};
    use doc_model::SignatureImage;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn annotation(page: u32, kind: AnnotationKind) -> Annotation {
        Annotation::new(page, kind, Color::YELLOW).expect("valid annotation")
    }

    fn highlight(page: u32, area: PageRect) -> Annotation {
        annotation(page, AnnotationKind::Highlight { area, text: "quoted".to_owned() })
    }

    fn comment(page: u32, text: &str) -> Annotation {
        annotation(
            page,
            AnnotationKind::Comment { at: PagePoint::new(40.0, 60.0), text: text.to_owned() },
        )
    }

    fn signature_png(width: u32, height: u32) -> SignatureImage {
        let image = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).expect("encode png");
        SignatureImage::new(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }

    fn first_page(doc: &Document) -> ObjectId {
        *doc.get_pages().get(&1).expect("page 1 exists")
    }

    fn page_content(doc: &Document) -> String {
        let bytes = doc.get_page_content(first_page(doc)).expect("page content readable");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn page_annots(doc: &Document) -> Vec<Dictionary> {
        let page = doc.get_dictionary(first_page(doc)).expect("page dictionary");
        let annots = page.get(b"Annots").and_then(Object::as_array).cloned().unwrap_or_default();
        annots
            .iter()
            .map(|entry| {
                let id = entry.as_reference().expect("annotation reference");
                doc.get_dictionary(id).expect("annotation dictionary").clone()
            })
            .collect()
    }

    fn page_resource(doc: &Document, key: &[u8]) -> Dictionary {
        let page = doc.get_dictionary(first_page(doc)).expect("page dictionary");
        let resources = page.get(b"Resources").and_then(Object::as_dict).expect("resources");
        resources.get(key).and_then(Object::as_dict).cloned().expect("resource subdictionary")
    }

    #[test]
    fn frame_flips_y_axis_and_applies_box_offset() {
        let frame = PageFrame::from_box([10.0, 20.0, 310.0, 420.0]);

        assert_eq!(frame.to_pdf_point(PagePoint::new(0.0, 0.0)), (10.0, 420.0));
        assert_eq!(frame.to_pdf_point(PagePoint::new(300.0, 400.0)), (310.0, 20.0));
        assert_eq!(
            frame.to_pdf_rect(PageRect::new(50.0, 100.0, 200.0, 20.0)),
            [60.0, 300.0, 260.0, 320.0]
        );
    }

    #[test]
    fn rotated_frame_maps_displayed_corners() {
        let letter = [0.0, 0.0, 612.0, 792.0];
        let origin = PagePoint::new(0.0, 0.0);

        let quarter = PageFrame::rotated(letter, 90);
        assert_eq!(quarter.to_pdf_point(origin), (0.0, 0.0));
        assert_eq!(quarter.to_pdf_point(PagePoint::new(792.0, 612.0)), (612.0, 792.0));

        let half = PageFrame::rotated(letter, 180);
        assert_eq!(half.to_pdf_point(origin), (612.0, 0.0));
        assert_eq!(half.to_pdf_point(PagePoint::new(612.0, 792.0)), (0.0, 792.0));

        let three_quarter = PageFrame::rotated(letter, 270);
        assert_eq!(three_quarter.to_pdf_point(origin), (612.0, 792.0));
        assert_eq!(three_quarter.to_pdf_point(PagePoint::new(792.0, 612.0)), (0.0, 0.0));
    }

    #[test]
    fn rotated_page_places_marks_where_they_were_seen() {
        let source = rotated_letter_pdf(90, false);
        let annotations = [
            highlight(1, PageRect::new(0.0, 0.0, 100.0, 10.0)),
            annotation(
                1,
                AnnotationKind::Underline {
                    area: PageRect::new(10.0, 30.0, 100.0, 12.0),
                    text: String::new(),
                },
            ),
            comment(1, "Sideways"),
            annotation(
                1,
                AnnotationKind::Signature {
                    at: PagePoint::new(100.0, 100.0),
                    image: signature_png(40, 20),
                },
            ),
        ];

        let output = export_annotated(&source, &annotations, &CancellationToken::new())
            .expect("export should succeed");

        let doc = Document::load_mem(&output).expect("output should parse");
        let content = page_content(&doc);
        assert!(content.contains("0.000 0.000 10.000 100.000 re f"));
        assert!(content.contains("42.000 10.000 m 42.000 110.000 l S"));
        assert!(content.contains("0.000 40.000 -20.000 0.000 120.000 100.000 cm"));

        let annots = page_annots(&doc);
        let rect: Vec<f32> = annots[0]
            .get(b"Rect")
            .and_then(Object::as_array)
            .expect("rect")
            .iter()
            .map(|value| value.as_float().expect("numeric"))
            .collect();
        assert_eq!(rect, vec![60.0, 40.0, 84.0, 64.0]);
    }

    #[test]
    fn highlight_becomes_translucent_filled_rect() {
        let source = letter_pdf(1);
        let annotations = [highlight(1, PageRect::new(50.0, 100.0, 200.0, 20.0))];

        let output = export_annotated(&source, &annotations, &CancellationToken::new())
            .expect("export should succeed");

        let doc = Document::load_mem(&output).expect("output should parse");
        let content = page_content(&doc);
        assert!(content.contains("/DsHighlight gs"));
        assert!(content.contains("50.000 672.000 200.000 20.000 re f"));

        let states = page_resource(&doc, b"ExtGState");
        let state = states.get(b"DsHighlight").and_then(Object::as_dict).expect("state");
        let alpha = state.get(b"ca").and_then(Object::as_float).expect("fill alpha");
        assert!((alpha - 0.4).abs() < 1e-4);
    }

    #[test]
    fn underline_is_stroked_along_bottom_edge() {
        let source = letter_pdf(1);
        let annotations = [annotation(
            1,
            AnnotationKind::Underline {
                area: PageRect::new(10.0, 30.0, 100.0, 12.0),
                text: String::new(),
            },
        )];

        let output = export_annotated(&source, &annotations, &CancellationToken::new())
            .expect("export should succeed");

        let content = page_content(&Document::load_mem(&output).expect("output should parse"));
        assert!(content.contains("10.000 750.000 m 110.000 750.000 l S"));
    }

    #[test]
    fn comment_becomes_text_annotation() {
        let source = letter_pdf(1);
        let annotations = [comment(1, "Needs review")];

        let output = export_annotated(&source, &annotations, &CancellationToken::new())
            .expect("export should succeed");

        let doc = Document::load_mem(&output).expect("output should parse");
        let annots = page_annots(&doc);
        assert_eq!(annots.len(), 1);

        let annot = &annots[0];
        assert_eq!(annot.get(b"Subtype").and_then(Object::as_name).ok(), Some(&b"Text"[..]));
        assert_eq!(
            annot.get(b"Contents").and_then(Object::as_str).ok(),
            Some(&b"Needs review"[..])
        );

        let rect = annot.get(b"Rect").and_then(Object::as_array).expect("rect");
        let top = rect[3].as_float().expect("numeric");
        assert_eq!(top, 732.0);
    }

    #[test]
    fn non_ascii_comment_is_utf16_encoded() {
        match text_string("café") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
                assert_eq!(bytes.len(), 2 + 4 * 2);
            }
            other => panic!("unexpected encoding: {other:?}"),
        }
    }

    #[test]
    fn restamped_signature_is_embedded_once() {
        let source = letter_pdf(1);
        let image = signature_png(40, 20);
        let annotations = [
            annotation(
                1,
                AnnotationKind::Signature { at: PagePoint::new(100.0, 100.0), image: image.clone() },
            ),
            annotation(1, AnnotationKind::Signature { at: PagePoint::new(300.0, 500.0), image }),
        ];

        let output = export_annotated(&source, &annotations, &CancellationToken::new())
            .expect("export should succeed");

        let doc = Document::load_mem(&output).expect("output should parse");
        assert_eq!(page_resource(&doc, b"XObject").len(), 1);

        let content = page_content(&doc);
        assert_eq!(content.matches(" Do Q").count(), 2);
        assert!(content.contains("40.000 0.000 0.000 20.000 100.000 672.000 cm"));
    }

    #[test]
    fn oversized_signature_is_shrunk_to_stamp_box() {
        assert_eq!(fit_signature(400.0, 128.0), (160.0, 51.2));
        assert_eq!(fit_signature(40.0, 20.0), (40.0, 20.0));
        assert_eq!(fit_signature(100.0, 400.0), (20.0, 80.0));
    }

    #[test]
    fn empty_signature_is_skipped() {
        let source = letter_pdf(1);
        let annotations = [annotation(
            1,
            AnnotationKind::Signature { at: PagePoint::new(1.0, 1.0), image: SignatureImage::empty() },
        )];

        let output = export_annotated(&source, &annotations, &CancellationToken::new())
            .expect("export should succeed");

        let doc = Document::load_mem(&output).expect("output should parse");
        let page = doc.get_dictionary(first_page(&doc)).expect("page dictionary");
        assert!(page.get(b"Contents").is_err());
    }

    #[test]
    fn undecodable_signature_fails_export() {
        let source = letter_pdf(1);
        let annotations = [annotation(
            1,
            AnnotationKind::Signature {
                at: PagePoint::new(1.0, 1.0),
                image: SignatureImage::new("data:image/png;base64,!!!"),
            },
        )];

        let err = export_annotated(&source, &annotations, &CancellationToken::new())
            .expect_err("bad image data");
        assert!(matches!(err, ExportError::SignatureDecode(_)));
    }

    #[test]
    fn annotations_land_on_their_own_pages() {
        let source = pdf_with_boxes(&[[0, 0, 612, 792], [0, 0, 300, 400]]);
        let annotations = [comment(2, "second page")];

        let output = export_annotated(&source, &annotations, &CancellationToken::new())
            .expect("export should succeed");

        let doc = Document::load_mem(&output).expect("output should parse");
        assert!(page_annots(&doc).is_empty());

        let second = *doc.get_pages().get(&2).expect("page 2 exists");
        let page = doc.get_dictionary(second).expect("page dictionary");
        assert_eq!(page.get(b"Annots").and_then(Object::as_array).map(Vec::len).ok(), Some(1));
    }

    #[test]
    fn missing_page_fails_export() {
        let source = letter_pdf(1);
        let annotations = [comment(4, "nowhere")];

        let err = export_annotated(&source, &annotations, &CancellationToken::new())
            .expect_err("page 4 does not exist");
        assert!(matches!(err, ExportError::PageOutOfRange { page: 4, page_count: 1 }));
    }

    #[test]
    fn cancelled_export_produces_nothing() {
        let source = letter_pdf(1);
        let annotations = [comment(1, "x")];
        let token = CancellationToken::new();
        token.cancel();

        let err = export_annotated(&source, &annotations, &token).expect_err("cancelled");
        assert!(matches!(err, ExportError::Cancelled));
    }

    #[test]
    fn malformed_source_is_a_load_error() {
        let err = export_annotated(
            b"%PDF-1.7 truncated",
            std::iter::empty::<&Annotation>(),
            &CancellationToken::new(),
        )
            .expect_err("garbage source");
        assert!(matches!(err, ExportError::Load(_)));
    }

    #[test]
    fn existing_content_is_isolated_in_its_own_graphics_state() {
        let mut doc = Document::load_mem(&letter_pdf(1)).expect("fixture parses");
        let page_id = first_page(&doc);
        let original =
            doc.add_object(Stream::new(Dictionary::new(), b"2 0 0 2 0 0 cm".to_vec()));
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .expect("page dictionary")
            .set("Contents", Object::Reference(original));
        let mut source = Vec::new();
        doc.save_to(&mut source).expect("fixture serializes");

        let annotations = [highlight(1, PageRect::new(0.0, 0.0, 10.0, 10.0))];
        let output = export_annotated(&source, &annotations, &CancellationToken::new())
            .expect("export should succeed");

        let content = page_content(&Document::load_mem(&output).expect("output should parse"));
        let original_at = content.find("2 0 0 2 0 0 cm").expect("original content kept");
        let restore_at = content.find("\nQ\n").expect("restore after original");
        let ours_at = content.find("DsHighlight").expect("highlight drawn");
        assert!(content.trim_start().starts_with('q'));
        assert!(original_at < restore_at && restore_at < ours_at);
    }
}
