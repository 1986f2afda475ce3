//! Turns raw pointer input into annotations according to the active tool
//!
//! | Tool                  | Pointer release          | Click                 |
//! |-----------------------|--------------------------|-----------------------|
//! | none                  | ignored                  | ignored               |
//! | highlight / underline | consume live selection   | ignored               |
//! | comment               | ignored                  | empty comment at point|
//! | signature             | ignored                  | stamp signature       |

use doc_model::{
    Annotation, AnnotationId, AnnotationKind, AnnotationStore, AnnotationType, ModelError,
    SignatureImage, Tool,
};

use crate::geometry::{viewport_rect_to_page, viewport_to_page, ViewportPoint, ViewportRect, ZoomScale};

/// Text currently selected in the page's text layer
#[derive(Debug, Clone, PartialEq)]
pub struct TextSelection {
    pub text: String,
    /// Bounding box of the selected glyphs, in viewport pixels
    pub bounds: ViewportRect,
    /// Where the selection started; must lie inside the viewing container
    pub anchor: ViewportPoint,
}

/// Read access to the live text selection, plus the ability to consume it
pub trait SelectionSource {
    fn current(&self) -> Option<&TextSelection>;
    fn clear(&mut self);
}

/// Selection held in memory, set by whoever owns the text layer
#[derive(Debug, Clone, Default)]
pub struct LiveSelection {
    selection: Option<TextSelection>,
}

impl LiveSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, selection: TextSelection) {
        self.selection = Some(selection);
    }
}

impl SelectionSource for LiveSelection {
    fn current(&self) -> Option<&TextSelection> {
        self.selection.as_ref()
    }

    fn clear(&mut self) {
        self.selection = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer released after a drag, the moment a text selection settles
    PointerRelease,
    Click { at: ViewportPoint },
}

/// Where the current page sits on screen while input is being translated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureContext {
    pub page_number: u32,
    /// Rendered page surface in viewport pixels
    pub page: ViewportRect,
    /// Scrollable viewing container the page lives in
    pub container: ViewportRect,
    pub scale: ZoomScale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No page is ready to receive input
    NoDocument,
    Idle,
    EmptySelection,
    OutOfBoundsSelection,
    OutsidePage,
    UnsupportedInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    Created { id: AnnotationId, annotation_type: AnnotationType },
    Ignored(IgnoreReason),
}

impl Translation {
    pub fn created(&self) -> Option<AnnotationId> {
        match self {
            Self::Created { id, .. } => Some(*id),
            Self::Ignored(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionTranslator {
    saved_signature: Option<SignatureImage>,
}

impl SelectionTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image used for subsequent signature stamps
    pub fn remember_signature(&mut self, image: SignatureImage) {
        self.saved_signature = Some(image);
    }

    pub fn saved_signature(&self) -> Option<&SignatureImage> {
        self.saved_signature.as_ref()
    }

    pub fn forget_signature(&mut self) {
        self.saved_signature = None;
    }

    pub fn translate(
        &self,
        event: &InputEvent,
        context: &CaptureContext,
        selection: &mut dyn SelectionSource,
        store: &mut AnnotationStore,
    ) -> Result<Translation, ModelError> {
        let translation = match (store.tool(), event) {
            (Tool::None, _) => Translation::Ignored(IgnoreReason::Idle),
            (Tool::Highlight | Tool::Underline, InputEvent::PointerRelease) => {
                self.capture_text(context, selection, store)?
            }
            (Tool::Comment | Tool::Signature, InputEvent::Click { at }) => {
                self.capture_point(*at, context, store)?
            }
            _ => Translation::Ignored(IgnoreReason::UnsupportedInput),
        };

        match translation {
            Translation::Created { id, annotation_type } => {
                log::debug!("{annotation_type} {id} created on page {}", context.page_number);
            }
            Translation::Ignored(reason) => {
                log::debug!("input {event:?} ignored under tool {}: {reason:?}", store.tool());
            }
        }

        Ok(translation)
    }

    fn capture_text(
        &self,
        context: &CaptureContext,
        selection: &mut dyn SelectionSource,
        store: &mut AnnotationStore,
    ) -> Result<Translation, ModelError> {
        let Some(current) = selection.current() else {
            return Ok(Translation::Ignored(IgnoreReason::EmptySelection));
        };

        if current.text.trim().is_empty() || current.bounds.is_empty() {
            return Ok(Translation::Ignored(IgnoreReason::EmptySelection));
        }

        if !context.container.contains_point(current.anchor)
            || !context.page.contains_rect(&current.bounds)
        {
            return Ok(Translation::Ignored(IgnoreReason::OutOfBoundsSelection));
        }

        let area = viewport_rect_to_page(current.bounds, context.page.origin(), context.scale);
        let text = current.text.trim().to_owned();
        let kind = match store.tool() {
            Tool::Underline => AnnotationKind::Underline { area, text },
            _ => AnnotationKind::Highlight { area, text },
        };

        let annotation = Annotation::new(context.page_number, kind, store.color())?;
        let annotation_type = annotation.annotation_type();
        let id = store.add(annotation);
        selection.clear();

        Ok(Translation::Created { id, annotation_type })
    }

    fn capture_point(
        &self,
        at: ViewportPoint,
        context: &CaptureContext,
        store: &mut AnnotationStore,
    ) -> Result<Translation, ModelError> {
        if !context.page.contains_point(at) {
            return Ok(Translation::Ignored(IgnoreReason::OutsidePage));
        }

        let at = viewport_to_page(at, context.page.origin(), context.scale);
        let kind = match store.tool() {
            Tool::Signature => AnnotationKind::Signature { at, image: self.stamp_image(store) },
            _ => AnnotationKind::Comment { at, text: String::new() },
        };

        let annotation = Annotation::new(context.page_number, kind, store.color())?;
        let annotation_type = annotation.annotation_type();
        let id = store.add(annotation);

        Ok(Translation::Created { id, annotation_type })
    }

    /// Empty until the store holds a signature; then the last saved pad image, else the
    /// newest stamped one
    fn stamp_image(&self, store: &AnnotationStore) -> SignatureImage {
        let Some(latest) = store.latest_of_type(AnnotationType::Signature) else {
            return SignatureImage::empty();
        };

        if let Some(saved) = &self.saved_signature {
            return saved.clone();
        }

        match latest.kind() {
            AnnotationKind::Signature { image, .. } => image.clone(),
            _ => SignatureImage::empty(),
        }
    }
}
