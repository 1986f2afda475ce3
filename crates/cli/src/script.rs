//! Scripted user actions replayed against a session
//!
//! A script is a JSON array of steps, each tagged by `action`:
//!
//! ```json
//! [
//!   { "action": "tool", "tool": "highlight" },
//!   { "action": "select", "text": "Total", "x": 40, "y": 60, "width": 80, "height": 14 },
//!   { "action": "tool", "tool": "comment" },
//!   { "action": "click", "x": 200, "y": 300 },
//!   { "action": "comment_text", "text": "Check this" }
//! ]
//! ```
//!
//! Coordinates are viewport pixels, the same space a pointer would report.

use anyhow::{Context, Result};
use doc_model::{Color, Tool};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use viewer_core::{
    AnnotationSession, InputEvent, SessionError, TextSelection, ViewportPoint, ViewportRect,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Tool { tool: Tool },
    Color { color: Color },
    /// Select text and release the pointer
    Select { text: String, x: f32, y: f32, width: f32, height: f32 },
    Click { x: f32, y: f32 },
    ZoomIn,
    ZoomOut,
    Zoom { percent: u16 },
    NextPage,
    PrevPage,
    GoToPage { page: u32 },
    CommentText { text: String },
    DeleteComment,
    CancelComment,
    DrawSignature { strokes: Vec<Vec<[f32; 2]>> },
    ClearSignature,
    SaveSignature,
    Clear,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Tool { .. } => "tool",
            Step::Color { .. } => "color",
            Step::Select { .. } => "select",
            Step::Click { .. } => "click",
            Step::ZoomIn => "zoom_in",
            Step::ZoomOut => "zoom_out",
            Step::Zoom { .. } => "zoom",
            Step::NextPage => "next_page",
            Step::PrevPage => "prev_page",
            Step::GoToPage { .. } => "go_to_page",
            Step::CommentText { .. } => "comment_text",
            Step::DeleteComment => "delete_comment",
            Step::CancelComment => "cancel_comment",
            Step::DrawSignature { .. } => "draw_signature",
            Step::ClearSignature => "clear_signature",
            Step::SaveSignature => "save_signature",
            Step::Clear => "clear",
        }
    }
}

pub fn load(path: &Path) -> Result<Vec<Step>> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("invalid script {}", path.display()))
}

/// Apply every step in order. A rejected step is reported and the replay continues,
/// the way a user would simply try the next thing.
pub fn replay(session: &mut AnnotationSession, steps: &[Step]) -> Vec<String> {
    let mut problems = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        if let Err(err) = apply(session, step) {
            log::warn!("step {} ({}) rejected: {err}", index + 1, step.name());
            problems.push(format!("step {} ({}): {err}", index + 1, step.name()));
        }

        for notification in session.take_notifications() {
            log::info!("{}: {}", notification.title, notification.description);
        }
    }

    problems
}

fn apply(session: &mut AnnotationSession, step: &Step) -> Result<(), SessionError> {
    match step {
        Step::Tool { tool } => session.select_tool(*tool),
        Step::Color { color } => session.set_color(*color)?,
        Step::Select { text, x, y, width, height } => {
            session.set_live_selection(TextSelection {
                text: text.clone(),
                bounds: ViewportRect::new(*x, *y, *width, *height),
                anchor: ViewportPoint::new(*x, *y),
            });
            let outcome = session.handle_input(&InputEvent::PointerRelease)?;
            log::debug!("select -> {outcome:?}");
        }
        Step::Click { x, y } => {
            let outcome = session.click_at(ViewportPoint::new(*x, *y))?;
            log::debug!("click -> {outcome:?}");
        }
        Step::ZoomIn => {
            session.zoom_in();
        }
        Step::ZoomOut => {
            session.zoom_out();
        }
        Step::Zoom { percent } => {
            session.set_zoom(f32::from(*percent) / 100.0);
        }
        Step::NextPage => {
            session.next_page();
        }
        Step::PrevPage => {
            session.previous_page();
        }
        Step::GoToPage { page } => {
            session.go_to_page(*page);
        }
        Step::CommentText { text } => {
            session.save_comment(text.clone())?;
        }
        Step::DeleteComment => {
            session.delete_comment()?;
        }
        Step::CancelComment => session.cancel_comment(),
        Step::DrawSignature { strokes } => {
            let pad = session.signature_pad_mut();
            for stroke in strokes {
                pad.add_stroke(stroke.iter().map(|[x, y]| (*x, *y)));
            }
        }
        Step::ClearSignature => session.clear_signature_pad(),
        Step::SaveSignature => {
            session.save_signature()?;
        }
        Step::Clear => session.clear_annotations(),
    }

    Ok(())
}
