//! Viewer core for docsign
//!
//! Coordinate mapping between the display surface and page space, input translation,
//! overlay composition, signature capture and the session object that ties them to one
//! loaded document.

pub mod compositor;
pub mod geometry;
pub mod input;
pub mod notify;
pub mod session;
pub mod signature;
pub mod translator;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use compositor::{compose, hit_comment_badge, Overlay, OverlayShape};
pub use geometry::{ViewportPoint, ViewportRect, ZoomScale};
pub use input::{InputHub, Subscription, ViewerSurface};
pub use notify::{Notification, Severity};
pub use session::{
    AnnotationSession, CommentEditor, ExportedFile, InputOutcome, LoadedDocument, PageLayout,
    SessionError, ViewerStatus,
};
pub use signature::{SignatureError, SignaturePad};
pub use translator::{
    CaptureContext, IgnoreReason, InputEvent, LiveSelection, SelectionSource, SelectionTranslator,
    TextSelection, Translation,
};
pub use upload::{UploadedFile, PDF_MIME};
