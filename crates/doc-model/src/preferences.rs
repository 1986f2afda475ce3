use serde::{Deserialize, Serialize};

use crate::annotation::{Color, PagePoint};

/// Where a freshly saved signature is placed before the user stamps it elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignaturePlacement {
    pub page_number: u32,
    pub at: PagePoint,
}

impl Default for SignaturePlacement {
    fn default() -> Self {
        Self { page_number: 1, at: PagePoint::new(100.0, 100.0) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub default_color: Color,
    pub palette: Vec<Color>,
    pub initial_zoom_percent: u16,
    pub export_prefix: String,
    pub signature_placement: SignaturePlacement,
    pub signature_pad_width_px: u32,
    pub signature_pad_height_px: u32,
    /// Gap between the viewing container edge and the page surface
    pub page_margin_px: f32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_color: Color::RED,
            palette: vec![
                Color::RED,
                Color::GREEN,
                Color::BLUE,
                Color::YELLOW,
                Color::MAGENTA,
                Color::CYAN,
                Color::BLACK,
            ],
            initial_zoom_percent: 100,
            export_prefix: "annotated-".to_owned(),
            signature_placement: SignaturePlacement::default(),
            signature_pad_width_px: 400,
            signature_pad_height_px: 128,
            page_margin_px: 16.0,
        }
    }
}

impl Preferences {
    /// File name offered for an exported copy of `original`
    pub fn export_file_name(&self, original: &str) -> String {
        format!("{}{}", self.export_prefix, original)
    }
}
