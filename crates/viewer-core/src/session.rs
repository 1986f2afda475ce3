//! Per-document annotation session
//!
//! [`AnnotationSession`] is the single owner of everything a user touches while working
//! on one PDF: the loaded bytes, navigation and zoom, the annotation store, the pending
//! text selection, the comment editor, the signature pad and the notification queue.
//! Uploading another file replaces all of it.

use doc_model::{
    Annotation, AnnotationId, AnnotationKind, AnnotationStore, AnnotationType, Color, ModelError,
    Preferences, Tool,
};
use pdf_engine::{
    export_annotated, CancellationToken, ExportError, OpenSource, PageSize, PdfEngine, PdfEngineError,
    RenderRequest, RgbaImage,
};
use serde::Serialize;

use crate::compositor::{compose, hit_comment_badge, Overlay};
use crate::geometry::{ViewportPoint, ViewportRect, ZoomScale};
use crate::notify::Notification;
use crate::signature::{SignatureError, SignaturePad, DEFAULT_PEN_WIDTH};
use crate::translator::{
    CaptureContext, IgnoreReason, InputEvent, LiveSelection, SelectionSource, SelectionTranslator,
    TextSelection, Translation,
};
use crate::upload::UploadedFile;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no file selected")]
    NoFileSelected,
    #[error("expected a single file, got {0}")]
    TooManyFiles(usize),
    #[error("unsupported file type {0:?}, expected application/pdf")]
    InvalidFileType(String),
    #[error("no document loaded")]
    NoDocument,
    #[error("failed to render document: {0}")]
    Render(#[from] PdfEngineError),
    #[error("color {0} is not in the palette")]
    ColorNotInPalette(Color),
    #[error("signature is empty")]
    EmptySignature,
    #[error(transparent)]
    Signature(SignatureError),
    #[error("no comment is being edited")]
    NoOpenComment,
    #[error("annotation {0} is not a comment")]
    NotAComment(AnnotationId),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

impl From<SignatureError> for SessionError {
    fn from(value: SignatureError) -> Self {
        match value {
            SignatureError::Empty => Self::EmptySignature,
            other => Self::Signature(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum ViewerStatus {
    Empty,
    Ready,
    /// Last load failed; uploading again retries
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub name: String,
    pub bytes: Vec<u8>,
    pub page_sizes: Vec<PageSize>,
}

impl LoadedDocument {
    pub fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    pub fn page_size(&self, page_number: u32) -> Option<PageSize> {
        let index = page_number.checked_sub(1)?;
        self.page_sizes.get(index as usize).copied()
    }
}

/// Where the viewing container and the current page sit on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub container: ViewportRect,
    pub page_origin: ViewportPoint,
}

impl PageLayout {
    pub fn with_margin(container: ViewportRect, margin: f32) -> Self {
        Self {
            container,
            page_origin: ViewportPoint::new(container.x + margin, container.y + margin),
        }
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::with_margin(ViewportRect::new(0.0, 0.0, 1280.0, 900.0), 16.0)
    }
}

/// Comment currently open for editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEditor {
    pub annotation_id: AnnotationId,
    /// Text the editor opened with
    pub draft: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Created { id: AnnotationId, annotation_type: AnnotationType },
    CommentOpened(AnnotationId),
    Ignored(IgnoreReason),
}

impl From<Translation> for InputOutcome {
    fn from(value: Translation) -> Self {
        match value {
            Translation::Created { id, annotation_type } => Self::Created { id, annotation_type },
            Translation::Ignored(reason) => Self::Ignored(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct AnnotationSession {
    preferences: Preferences,
    document: Option<LoadedDocument>,
    status: ViewerStatus,
    current_page: u32,
    zoom: ZoomScale,
    layout: PageLayout,
    store: AnnotationStore,
    translator: SelectionTranslator,
    selection: LiveSelection,
    comment_editor: Option<CommentEditor>,
    signature_pad: SignaturePad,
    notifications: Vec<Notification>,
}

impl AnnotationSession {
    pub fn new(preferences: Preferences) -> Self {
        let layout = PageLayout::with_margin(PageLayout::default().container, preferences.page_margin_px);
        let signature_pad =
            SignaturePad::new(preferences.signature_pad_width_px, preferences.signature_pad_height_px)
                .with_pen(preferences.default_color, DEFAULT_PEN_WIDTH);

        Self {
            zoom: ZoomScale::from_percent(preferences.initial_zoom_percent),
            store: AnnotationStore::with_color(preferences.default_color),
            document: None,
            status: ViewerStatus::Empty,
            current_page: 1,
            layout,
            translator: SelectionTranslator::new(),
            selection: LiveSelection::new(),
            comment_editor: None,
            signature_pad,
            notifications: Vec::new(),
            preferences,
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn status(&self) -> &ViewerStatus {
        &self.status
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, LoadedDocument::page_count)
    }

    pub fn zoom(&self) -> ZoomScale {
        self.zoom
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    pub fn set_layout(&mut self, layout: PageLayout) {
        self.layout = layout;
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn tool(&self) -> Tool {
        self.store.tool()
    }

    pub fn color(&self) -> Color {
        self.store.color()
    }

    pub fn comment_editor(&self) -> Option<&CommentEditor> {
        self.comment_editor.as_ref()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, notification: Notification) {
        log::debug!("notify: {} - {}", notification.title, notification.description);
        self.notifications.push(notification);
    }

    /// Accept exactly one PDF, replacing the current document and all annotation state.
    pub fn upload<E: PdfEngine>(
        &mut self,
        files: Vec<UploadedFile>,
        engine: &mut E,
    ) -> Result<(), SessionError> {
        let file = match <[UploadedFile; 1]>::try_from(files) {
            Ok([file]) => file,
            Err(files) if files.is_empty() => {
                self.notify(Notification::error("No file selected", "Please upload a PDF document"));
                return Err(SessionError::NoFileSelected);
            }
            Err(files) => {
                self.notify(Notification::error("Too many files", "Please upload a single PDF document"));
                return Err(SessionError::TooManyFiles(files.len()));
            }
        };

        if !file.is_pdf() {
            log::warn!("rejected upload {} ({})", file.name, file.mime_type);
            self.notify(Notification::error("Invalid file type", "Please upload a PDF document"));
            return Err(SessionError::InvalidFileType(file.mime_type));
        }

        self.reset_document_state();

        let page_sizes = match read_page_sizes(engine, &file.bytes) {
            Ok(sizes) => sizes,
            Err(err) => {
                log::warn!("failed to load {}: {err}", file.name);
                self.status = ViewerStatus::Failed(err.to_string());
                self.notify(Notification::error("Failed to load PDF", err.to_string()));
                return Err(err.into());
            }
        };

        log::info!("loaded {} ({} pages)", file.name, page_sizes.len());
        self.notify(Notification::info(
            "Document uploaded",
            format!("{} has been uploaded successfully.", file.name),
        ));
        self.document = Some(LoadedDocument { name: file.name, bytes: file.bytes, page_sizes });
        self.status = ViewerStatus::Ready;

        Ok(())
    }

    fn reset_document_state(&mut self) {
        self.document = None;
        self.status = ViewerStatus::Empty;
        self.current_page = 1;
        self.zoom = ZoomScale::from_percent(self.preferences.initial_zoom_percent);
        self.store = AnnotationStore::with_color(self.preferences.default_color);
        self.translator.forget_signature();
        self.selection.clear();
        self.comment_editor = None;
        self.signature_pad.clear();
        self.signature_pad.set_pen_color(self.preferences.default_color);
    }

    pub fn next_page(&mut self) -> u32 {
        self.go_to_page(self.current_page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> u32 {
        self.go_to_page(self.current_page.saturating_sub(1))
    }

    /// Move to `page`, clamped to the document's page range
    pub fn go_to_page(&mut self, page: u32) -> u32 {
        let last = self.page_count().max(1);
        self.current_page = page.clamp(1, last);
        self.selection.clear();
        self.current_page
    }

    pub fn zoom_in(&mut self) -> ZoomScale {
        self.set_zoom(self.zoom.zoom_in().get())
    }

    pub fn zoom_out(&mut self) -> ZoomScale {
        self.set_zoom(self.zoom.zoom_out().get())
    }

    pub fn set_zoom(&mut self, scale: f32) -> ZoomScale {
        self.zoom = ZoomScale::new(scale);
        log::debug!("zoom now {}%", self.zoom.percent());
        self.zoom
    }

    pub fn select_tool(&mut self, tool: Tool) {
        self.store.set_tool(tool);

        let hint = match tool {
            Tool::Highlight => Some(("Highlight Tool Selected", "Select text in the document to highlight it.")),
            Tool::Underline => Some(("Underline Tool Selected", "Select text in the document to underline it.")),
            Tool::Comment => Some(("Comment Tool Selected", "Click anywhere on the document to add a comment.")),
            Tool::Signature | Tool::None => None,
        };
        if let Some((title, description)) = hint {
            self.notify(Notification::info(title, description));
        }
    }

    pub fn cancel_tool(&mut self) {
        self.store.set_tool(Tool::None);
    }

    /// Annotation and signature pen color. An empty palette accepts any color.
    pub fn set_color(&mut self, color: Color) -> Result<(), SessionError> {
        let palette = &self.preferences.palette;
        if !palette.is_empty() && !palette.contains(&color) {
            return Err(SessionError::ColorNotInPalette(color));
        }

        self.store.set_color(color);
        self.signature_pad.set_pen_color(color);
        Ok(())
    }

    /// Screen rectangle of the current page at the current zoom
    pub fn page_rect(&self) -> Option<ViewportRect> {
        let size = self.document.as_ref()?.page_size(self.current_page)?;
        let origin = self.layout.page_origin;
        let scale = self.zoom.get();

        Some(ViewportRect::new(origin.x, origin.y, size.width_pt * scale, size.height_pt * scale))
    }

    fn capture_context(&self) -> Option<CaptureContext> {
        if self.status != ViewerStatus::Ready {
            return None;
        }

        Some(CaptureContext {
            page_number: self.current_page,
            page: self.page_rect()?,
            container: self.layout.container,
            scale: self.zoom,
        })
    }

    /// Rasterize the current page at the current zoom
    pub fn render_current_page<E: PdfEngine>(&self, engine: &mut E) -> Result<RgbaImage, SessionError> {
        let document = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        let handle = engine.open(OpenSource::Bytes(document.bytes.clone()))?;
        let request = RenderRequest { page_index: self.current_page - 1, scale: self.zoom.get() };

        let rendered = engine.render_page(handle, request);
        engine.close(handle)?;
        Ok(rendered?)
    }

    pub fn set_live_selection(&mut self, selection: TextSelection) {
        self.selection.set(selection);
    }

    pub fn live_selection(&self) -> Option<&TextSelection> {
        self.selection.current()
    }

    pub fn handle_input(&mut self, event: &InputEvent) -> Result<InputOutcome, SessionError> {
        let Some(context) = self.capture_context() else {
            return Ok(InputOutcome::Ignored(IgnoreReason::NoDocument));
        };

        if let InputEvent::Click { at } = event {
            if let Some(id) = hit_comment_badge(&self.overlays(), *at) {
                self.open_comment(id)?;
                return Ok(InputOutcome::CommentOpened(id));
            }
        }

        let translation =
            self.translator.translate(event, &context, &mut self.selection, &mut self.store)?;

        if let Translation::Created { id, annotation_type: AnnotationType::Comment } = translation {
            self.open_comment(id)?;
        }

        Ok(translation.into())
    }

    pub fn click_at(&mut self, at: ViewportPoint) -> Result<InputOutcome, SessionError> {
        self.handle_input(&InputEvent::Click { at })
    }

    pub fn open_comment(&mut self, id: AnnotationId) -> Result<(), SessionError> {
        let annotation = self.store.get(id).ok_or(ModelError::UnknownAnnotation(id))?;
        let AnnotationKind::Comment { text, .. } = annotation.kind() else {
            return Err(SessionError::NotAComment(id));
        };

        self.comment_editor = Some(CommentEditor { annotation_id: id, draft: text.clone() });
        Ok(())
    }

    pub fn save_comment(&mut self, text: impl Into<String>) -> Result<AnnotationId, SessionError> {
        let editor = self.comment_editor.take().ok_or(SessionError::NoOpenComment)?;
        let id = editor.annotation_id;

        let updated = self.store.get(id).ok_or(ModelError::UnknownAnnotation(id))?.with_text(text);
        self.store.update(id, updated)?;

        self.notify(Notification::info("Comment saved", "Your comment has been saved successfully."));
        Ok(id)
    }

    pub fn delete_comment(&mut self) -> Result<AnnotationId, SessionError> {
        let editor = self.comment_editor.take().ok_or(SessionError::NoOpenComment)?;
        self.store.remove(editor.annotation_id)?;

        self.notify(Notification::info("Comment deleted", "Your comment has been removed."));
        Ok(editor.annotation_id)
    }

    /// Close the editor without touching the comment
    pub fn cancel_comment(&mut self) {
        self.comment_editor = None;
    }

    pub fn signature_pad(&self) -> &SignaturePad {
        &self.signature_pad
    }

    pub fn signature_pad_mut(&mut self) -> &mut SignaturePad {
        &mut self.signature_pad
    }

    pub fn clear_signature_pad(&mut self) {
        self.signature_pad.clear();
    }

    /// Encode the pad, remember it for stamping and place a first copy on the page
    pub fn save_signature(&mut self) -> Result<AnnotationId, SessionError> {
        let page_count = self.document.as_ref().ok_or(SessionError::NoDocument)?.page_count();

        let image = match self.signature_pad.encode() {
            Ok(image) => image,
            Err(SignatureError::Empty) => {
                self.notify(Notification::warning(
                    "Empty signature",
                    "Please draw your signature before saving.",
                ));
                return Err(SessionError::EmptySignature);
            }
            Err(err) => return Err(err.into()),
        };

        let placement = self.preferences.signature_placement;
        let annotation = Annotation::new(
            placement.page_number.min(page_count),
            AnnotationKind::Signature { at: placement.at, image: image.clone() },
            self.store.color(),
        )?;

        self.translator.remember_signature(image);
        let id = self.store.add(annotation);
        self.signature_pad.clear();

        self.notify(Notification::info(
            "Signature created",
            "Click on the document to place your signature.",
        ));
        Ok(id)
    }

    pub fn clear_annotations(&mut self) {
        self.store.clear();
        self.translator.forget_signature();
        self.comment_editor = None;
    }

    /// Overlay descriptors for the current page
    pub fn overlays(&self) -> Vec<Overlay> {
        if self.document.is_none() {
            return Vec::new();
        }
        compose(&self.store, self.current_page, self.layout.page_origin, self.zoom)
    }

    /// Bake every stored annotation into a copy of the document.
    ///
    /// The store is left untouched whatever the outcome.
    pub fn export(&mut self, cancel: &CancellationToken) -> Result<ExportedFile, SessionError> {
        if self.document.is_none() {
            return Err(SessionError::NoDocument);
        }
        self.notify(Notification::info("Preparing document", "Your annotated PDF is being generated..."));

        let document = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        let file_name = self.preferences.export_file_name(&document.name);
        let result = export_annotated(&document.bytes, self.store.iter(), cancel);

        match result {
            Ok(bytes) => {
                log::info!("exported {} annotations to {file_name}", self.store.len());
                self.notify(Notification::info(
                    "Export successful",
                    "Your annotated PDF has been downloaded.",
                ));
                Ok(ExportedFile { file_name, bytes })
            }
            Err(ExportError::Cancelled) => {
                self.notify(Notification::info("Export cancelled", "No file was written."));
                Err(ExportError::Cancelled.into())
            }
            Err(err) => {
                log::warn!("export of {file_name} failed: {err}");
                self.notify(Notification::error(
                    "Export failed",
                    "There was an error exporting your PDF. Please try again.",
                ));
                Err(err.into())
            }
        }
    }
}

impl Default for AnnotationSession {
    fn default() -> Self {
        Self::new(Preferences::default())
    }
}

fn read_page_sizes<E: PdfEngine>(engine: &mut E, bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
    let handle = engine.open(OpenSource::Bytes(bytes.to_vec()))?;

    let sizes = (0..engine.page_count(handle)?)
        .map(|index| engine.page_size(handle, index))
        .collect::<Result<Vec<_>, _>>();

    engine.close(handle)?;
    let sizes = sizes?;

    if sizes.is_empty() {
        return Err(PdfEngineError::NoPages);
    }
    Ok(sizes)
}
