//! Annotation model for docsign
//!
//! Page-anchored annotations, the ordered store that owns them, the active tool/color
//! state and user preferences.

pub mod annotation;
pub mod preferences;
pub mod store;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationType, Color, PagePoint, PageRect,
    SignatureImage, SIGNATURE_MAX_HEIGHT, SIGNATURE_MAX_WIDTH,
};
pub use preferences::{Preferences, SignaturePlacement};
pub use store::{AnnotationStore, Tool};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("page numbers are 1-based, got {0}")]
    InvalidPageNumber(u32),
    #[error("annotation geometry must be finite")]
    NonFiniteGeometry,
    #[error("invalid color {0:?}, expected #rrggbb")]
    InvalidColor(String),
    #[error("no annotation with id {0}")]
    UnknownAnnotation(AnnotationId),
    #[error("annotation index {index} out of range (len={len})")]
    IndexOutOfRange { index: usize, len: usize },
}
