//! Annotation store
//!
//! Ordered collection of annotations plus the active tool and color. Records are keyed
//! by their stable id; the id list keeps append order for page queries and for the
//! positional accessors, which stay valid only until the next mutation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::annotation::{Annotation, AnnotationId, AnnotationType, Color};
use crate::ModelError;

/// Active annotation tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    None,
    Highlight,
    Underline,
    Comment,
    Signature,
}

impl Tool {
    /// Annotation type this tool produces, `None` for the idle tool
    pub fn annotation_type(self) -> Option<AnnotationType> {
        match self {
            Tool::None => None,
            Tool::Highlight => Some(AnnotationType::Highlight),
            Tool::Underline => Some(AnnotationType::Underline),
            Tool::Comment => Some(AnnotationType::Comment),
            Tool::Signature => Some(AnnotationType::Signature),
        }
    }
}

impl From<AnnotationType> for Tool {
    fn from(value: AnnotationType) -> Self {
        match value {
            AnnotationType::Highlight => Tool::Highlight,
            AnnotationType::Underline => Tool::Underline,
            AnnotationType::Comment => Tool::Comment,
            AnnotationType::Signature => Tool::Signature,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.annotation_type() {
            Some(kind) => kind.fmt(f),
            None => f.write_str("none"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    records: HashMap<AnnotationId, Annotation>,
    order: Vec<AnnotationId>,
    tool: Tool,
    color: Color,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color(color: Color) -> Self {
        Self { color, ..Self::default() }
    }

    /// Append an annotation and return its id
    pub fn add(&mut self, annotation: Annotation) -> AnnotationId {
        let id = annotation.id();
        log::debug!(
            "adding {} annotation {id} on page {}",
            annotation.annotation_type(),
            annotation.page_number()
        );

        if self.records.insert(id, annotation).is_none() {
            self.order.push(id);
        }
        id
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.records.contains_key(&id)
    }

    /// Replace the record stored under `id`. The replacement takes over the id.
    pub fn update(&mut self, id: AnnotationId, mut annotation: Annotation) -> Result<(), ModelError> {
        let slot = self.records.get_mut(&id).ok_or(ModelError::UnknownAnnotation(id))?;
        annotation.set_id(id);
        *slot = annotation;
        Ok(())
    }

    pub fn remove(&mut self, id: AnnotationId) -> Result<Annotation, ModelError> {
        let annotation = self.records.remove(&id).ok_or(ModelError::UnknownAnnotation(id))?;
        self.order.retain(|existing| *existing != id);
        Ok(annotation)
    }

    pub fn clear(&mut self) {
        log::debug!("clearing {} annotations", self.order.len());
        self.records.clear();
        self.order.clear();
    }

    /// Annotations on `page_number`, in append order
    pub fn query(&self, page_number: u32) -> Vec<&Annotation> {
        self.iter().filter(|annotation| annotation.page_number() == page_number).collect()
    }

    /// All annotations in append order
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn position(&self, id: AnnotationId) -> Option<usize> {
        self.order.iter().position(|existing| *existing == id)
    }

    pub fn id_at(&self, index: usize) -> Result<AnnotationId, ModelError> {
        self.order
            .get(index)
            .copied()
            .ok_or(ModelError::IndexOutOfRange { index, len: self.order.len() })
    }

    pub fn update_at(&mut self, index: usize, annotation: Annotation) -> Result<(), ModelError> {
        let id = self.id_at(index)?;
        self.update(id, annotation)
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Annotation, ModelError> {
        let id = self.id_at(index)?;
        self.remove(id)
    }

    /// Most recently added annotation of the given type
    pub fn latest_of_type(&self, annotation_type: AnnotationType) -> Option<&Annotation> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.records.get(id))
            .find(|annotation| annotation.annotation_type() == annotation_type)
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationKind, PagePoint, PageRect};

    fn comment(page: u32, text: &str) -> Annotation {
        Annotation::new(
            page,
            AnnotationKind::Comment { at: PagePoint::new(10.0, 10.0), text: text.to_owned() },
            Color::RED,
        )
        .expect("valid annotation")
    }

    fn highlight(page: u32) -> Annotation {
        Annotation::new(
            page,
            AnnotationKind::Highlight {
                area: PageRect::new(0.0, 0.0, 50.0, 12.0),
                text: "text".to_owned(),
            },
            Color::YELLOW,
        )
        .expect("valid annotation")
    }

    fn contents(store: &AnnotationStore) -> Vec<&str> {
        store.iter().map(|annotation| annotation.content()).collect()
    }

    #[test]
    fn add_keeps_append_order() {
        let mut store = AnnotationStore::new();
        store.add(comment(1, "a"));
        store.add(comment(2, "b"));
        store.add(comment(1, "c"));

        assert_eq!(contents(&store), vec!["a", "b", "c"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn remove_shifts_positions_of_later_records() {
        let mut store = AnnotationStore::new();
        store.add(comment(1, "A"));
        store.add(comment(1, "B"));
        store.add(comment(1, "C"));

        store.remove_at(0).expect("index 0 exists");
        assert_eq!(contents(&store), vec!["B", "C"]);

        let replacement = comment(1, "X");
        store.update_at(0, replacement).expect("index 0 exists");
        assert_eq!(contents(&store), vec!["X", "C"]);
    }

    #[test]
    fn update_preserves_slot_identity() {
        let mut store = AnnotationStore::new();
        let id = store.add(comment(1, "draft"));

        store.update(id, comment(1, "final")).expect("id exists");

        let stored = store.get(id).expect("record still present");
        assert_eq!(stored.id(), id);
        assert_eq!(stored.content(), "final");
        assert_eq!(store.position(id), Some(0));
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut store = AnnotationStore::new();
        store.add(comment(1, "only"));

        let err = store.update_at(5, comment(1, "x")).expect_err("index 5 is out of range");
        assert!(matches!(err, ModelError::IndexOutOfRange { index: 5, len: 1 }));

        let err = store.remove_at(1).expect_err("index 1 is out of range");
        assert!(matches!(err, ModelError::IndexOutOfRange { index: 1, len: 1 }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let mut store = AnnotationStore::new();
        let stray = comment(1, "never added");

        let err = store.update(stray.id(), stray.clone()).expect_err("id was never added");
        assert!(matches!(err, ModelError::UnknownAnnotation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn query_is_page_scoped() {
        let mut store = AnnotationStore::new();
        for page in [1, 2, 3, 2, 1, 2] {
            store.add(highlight(page));
        }

        let page_two = store.query(2);
        assert_eq!(page_two.len(), 3);
        assert!(page_two.iter().all(|annotation| annotation.page_number() == 2));
        assert!(store.query(7).is_empty());
    }

    #[test]
    fn clear_empties_every_page() {
        let mut store = AnnotationStore::new();
        store.add(highlight(1));
        store.add(comment(4, "x"));

        store.clear();

        assert!(store.is_empty());
        for page in 1..=4 {
            assert!(store.query(page).is_empty());
        }
    }

    #[test]
    fn latest_of_type_returns_most_recent() {
        let mut store = AnnotationStore::new();
        store.add(comment(1, "first"));
        store.add(highlight(1));
        store.add(comment(2, "second"));

        let latest = store.latest_of_type(AnnotationType::Comment).expect("comment present");
        assert_eq!(latest.content(), "second");
        assert!(store.latest_of_type(AnnotationType::Signature).is_none());
    }

    #[test]
    fn tool_and_color_do_not_touch_existing_records() {
        let mut store = AnnotationStore::new();
        let id = store.add(highlight(1));

        store.set_tool(Tool::Comment);
        store.set_color(Color::BLUE);

        assert_eq!(store.tool(), Tool::Comment);
        assert_eq!(store.color(), Color::BLUE);
        assert_eq!(store.get(id).map(|a| a.color()), Some(Color::YELLOW));
    }

    #[test]
    fn tool_maps_to_annotation_type() {
        assert_eq!(Tool::None.annotation_type(), None);
        assert_eq!(Tool::Signature.annotation_type(), Some(AnnotationType::Signature));
        assert_eq!(Tool::from(AnnotationType::Underline), Tool::Underline);
        assert_eq!(Tool::None.to_string(), "none");
    }
}
